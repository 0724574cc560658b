use crate::core::errors::ExchangeError;
use crate::core::types::Params;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Current epoch time in milliseconds, as sent in the `timestamp` parameter.
///
/// Computed on every call; the server rejects stale timestamps.
pub fn timestamp_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}

/// Signer trait for request authentication
///
/// Implementations only provide the digest; the canonical query layout is
/// shared by [`Signer::signed_query`].
pub trait Signer: Send + Sync {
    /// Hex-encoded signature of `payload`
    fn signature(&self, payload: &str) -> Result<String, ExchangeError>;

    /// Build the query string for `params`, appending `signature` when the
    /// parameters carry a timestamp.
    fn signed_query(&self, params: &Params) -> Result<String, ExchangeError> {
        let mut query = params.to_query_string();
        if params.is_signed() {
            let signature = self.signature(&query)?;
            query.push_str("&signature=");
            query.push_str(&signature);
        }
        Ok(query)
    }
}

/// HMAC-SHA256 signer keyed by the account's API secret
pub struct HmacSigner {
    secret: Secret<String>,
}

impl HmacSigner {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn signature(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
