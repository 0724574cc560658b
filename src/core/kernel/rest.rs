use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::Signer;
use crate::core::types::Params;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, trace};

/// Header carrying the API key on every request
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// REST client trait for making HTTP requests
///
/// Every failure, transport or server-side, surfaces as [`ExchangeError`].
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Send a request and return the decoded JSON body
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - The API endpoint path
    /// * `params` - Query parameters; signed when they carry a timestamp
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<Value, ExchangeError>;
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 30,
            user_agent: "binance-spot-stream/0.1".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    api_key: Option<Secret<String>>,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            api_key: None,
            signer: None,
        }
    }

    /// API key sent as a fixed header on every request
    pub fn with_api_key(mut self, api_key: Secret<String>) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Signer for requests whose parameters carry a timestamp
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            let mut value = HeaderValue::from_str(api_key.expose_secret()).map_err(|e| {
                ExchangeError::ConfigurationError(format!("Invalid API key header: {}", e))
            })?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ExchangeError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
        })
    }
}

/// Error envelope returned by the exchange on non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i32,
    msg: String,
}

/// Implementation of `RestClient` using reqwest
///
/// Holds one pooled HTTP client for its whole lifetime. The pool is released
/// when the value is dropped or passed to [`ReqwestRest::dispose`].
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Release the underlying connection pool
    pub fn dispose(self) {
        debug!(exchange = %self.config.exchange_name, "disposing REST client");
        drop(self);
    }

    fn build_url(&self, endpoint: &str, query: Option<&str>) -> String {
        match query {
            Some(query) if !query.is_empty() => {
                format!("{}{}?{}", self.config.base_url, endpoint, query)
            }
            _ => format!("{}{}", self.config.base_url, endpoint),
        }
    }

    fn encode_params(&self, params: &Params) -> Result<String, ExchangeError> {
        if !params.is_signed() {
            return Ok(params.to_query_string());
        }
        let signer = self.signer.as_ref().ok_or_else(|| {
            ExchangeError::AuthError(
                "Authentication required but no signer provided".to_string(),
            )
        })?;
        signer.signed_query(params)
    }

    fn interpret(status: reqwest::StatusCode, body: &str) -> Result<Value, ExchangeError> {
        let data: Value = serde_json::from_str(body)?;
        if status.is_success() {
            return Ok(data);
        }

        let error: ErrorBody = serde_json::from_value(data)?;
        Err(ExchangeError::ApiError {
            code: error.code,
            message: error.msg,
        })
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(
        skip(self, params),
        fields(exchange = %self.config.exchange_name, method = %method, endpoint = %endpoint)
    )]
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<Value, ExchangeError> {
        let query = params.map(|p| self.encode_params(p)).transpose()?;
        let url = self.build_url(endpoint, query.as_deref());

        let response = self
            .client
            .request(method, &url)
            .send()
            .await
            .map_err(|e| {
                debug!("request failed: {}", e);
                ExchangeError::connection_failure()
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            debug!("failed to read response body: {}", e);
            ExchangeError::connection_failure()
        })?;

        trace!(status = %status, "Response body: {}", body);
        Self::interpret(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::signer::HmacSigner;
    use reqwest::StatusCode;

    fn client(signer: bool) -> ReqwestRest {
        let mut builder = RestClientBuilder::new(RestClientConfig::new(
            "https://api.binance.com".to_string(),
            "binance".to_string(),
        ));
        if signer {
            builder = builder.with_signer(Arc::new(HmacSigner::new(Secret::new(
                "secret".to_string(),
            ))));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_build_url_omits_empty_query() {
        let rest = client(false);
        assert_eq!(
            rest.build_url("/api/v3/time", None),
            "https://api.binance.com/api/v3/time"
        );
        assert_eq!(
            rest.build_url("/api/v3/time", Some("")),
            "https://api.binance.com/api/v3/time"
        );
        assert_eq!(
            rest.build_url("/api/v3/depth", Some("symbol=BTCUSDT")),
            "https://api.binance.com/api/v3/depth?symbol=BTCUSDT"
        );
    }

    #[test]
    fn test_signed_params_require_signer() {
        let rest = client(false);
        let err = rest
            .encode_params(&Params::new().with("timestamp", "1"))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AuthError(_)));
    }

    #[test]
    fn test_signed_params_get_signature() {
        let rest = client(true);
        let query = rest
            .encode_params(&Params::new().with("timestamp", "1"))
            .unwrap();
        assert!(query.starts_with("timestamp=1&signature="));
    }

    #[test]
    fn test_interpret_success_returns_body() {
        let value = ReqwestRest::interpret(StatusCode::OK, r#"{"serverTime":1}"#).unwrap();
        assert_eq!(value["serverTime"], 1);
    }

    #[test]
    fn test_interpret_error_envelope() {
        let err = ReqwestRest::interpret(
            StatusCode::BAD_REQUEST,
            r#"{"code":-1013,"msg":"filter failure"}"#,
        )
        .unwrap_err();
        match err {
            ExchangeError::ApiError { code, message } => {
                assert_eq!(code, -1013);
                assert_eq!(message, "filter failure");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_interpret_malformed_error_body() {
        let err = ReqwestRest::interpret(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
            .unwrap_err();
        assert!(matches!(err, ExchangeError::JsonError(_)));

        let err =
            ReqwestRest::interpret(StatusCode::BAD_REQUEST, r#"{"error":"nope"}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::JsonError(_)));
    }
}
