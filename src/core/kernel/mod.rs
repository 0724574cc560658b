/// Transport kernel shared by the exchange clients
///
/// The kernel holds only transport logic: request signing, HTTP dispatch and
/// the push-data session. Exchange specifics (endpoints, frame formats) live
/// in `crate::exchanges`.
///
/// ## Transport Layer
/// - `RestClient` / `ReqwestRest`: signed HTTP dispatch with one error surface
/// - `WsSession`: one push connection with subscription replay
///
/// ## Authentication
/// - `Signer`: canonical query layout plus digest
/// - `HmacSigner`: HMAC-SHA256 keyed by the API secret
///
/// ## Message Handling
/// - `WsCodec`: exchange-specific control frames and message decoding
///
/// # Example
/// ```rust,no_run
/// use binance_spot_stream::core::kernel::*;
/// use binance_spot_stream::core::types::Params;
/// use reqwest::Method;
/// use secrecy::Secret;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let rest = RestClientBuilder::new(RestClientConfig::new(
///     "https://api.binance.com".to_string(),
///     "binance".to_string(),
/// ))
/// .with_api_key(Secret::new("api_key".to_string()))
/// .with_signer(Arc::new(HmacSigner::new(Secret::new("secret".to_string()))))
/// .build()?;
///
/// let account = rest
///     .send(Method::GET, "/api/v3/account", Some(&Params::signed()))
///     .await?;
/// println!("{account}");
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

pub use codec::WsCodec;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig, API_KEY_HEADER};
pub use signer::{timestamp_millis, HmacSigner, Signer};
pub use ws::{StreamMode, WsConfig, WsSession};
