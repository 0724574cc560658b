use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

pub const MAINNET_REST_URL: &str = "https://api.binance.com";
pub const TESTNET_REST_URL: &str = "https://testnet.binance.vision";
pub const MAINNET_WS_URL: &str = "wss://stream.binance.com:9443";
pub const TESTNET_WS_URL: &str = "wss://testnet.binance.vision";

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
    pub testnet: bool,
    pub base_url: Option<String>,
    pub ws_base_url: Option<String>,
}

// Credentials never leave the process through serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 5)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("api_secret", "[REDACTED]")?;
        state.serialize_field("testnet", &self.testnet)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("ws_base_url", &self.ws_base_url)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ExchangeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ExchangeConfigHelper {
            api_key: String,
            api_secret: String,
            #[serde(default)]
            testnet: bool,
            base_url: Option<String>,
            ws_base_url: Option<String>,
        }

        let helper = ExchangeConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            api_secret: Secret::new(helper.api_secret),
            testnet: helper.testnet,
            base_url: helper.base_url,
            ws_base_url: helper.ws_base_url,
        })
    }
}

impl ExchangeConfig {
    /// Create a new production configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            api_secret: Secret::new(api_secret),
            testnet: false,
            base_url: None,
            ws_base_url: None,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY` (e.g., `BINANCE_API_KEY`)
    /// - `{PREFIX}_API_SECRET`
    /// - `{PREFIX}_TESTNET` (optional, defaults to false)
    /// - `{PREFIX}_BASE_URL` (optional)
    /// - `{PREFIX}_WS_BASE_URL` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let api_key_var = format!("{}_API_KEY", prefix);
        let api_secret_var = format!("{}_API_SECRET", prefix);

        let api_key = env::var(&api_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(api_key_var))?;
        let api_secret = env::var(&api_secret_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(api_secret_var))?;

        let testnet = match env::var(format!("{}_TESTNET", prefix)) {
            Ok(value) => parse_flag(&value)?,
            Err(_) => false,
        };

        Ok(Self {
            api_key: Secret::new(api_key),
            api_secret: Secret::new(api_secret),
            testnet,
            base_url: env::var(format!("{}_BASE_URL", prefix)).ok(),
            ws_base_url: env::var(format!("{}_WS_BASE_URL", prefix)).ok(),
        })
    }

    /// Load a `.env` file (if present) and then read the configuration from
    /// the environment.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Override the REST base URL (takes precedence over `testnet`)
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Override the websocket base URL (takes precedence over `testnet`)
    #[must_use]
    pub fn ws_base_url(mut self, ws_base_url: String) -> Self {
        self.ws_base_url = Some(ws_base_url);
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.api_secret.expose_secret().is_empty()
    }

    pub fn rest_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            if self.testnet {
                TESTNET_REST_URL.to_string()
            } else {
                MAINNET_REST_URL.to_string()
            }
        })
    }

    pub fn ws_url(&self) -> String {
        self.ws_base_url.clone().unwrap_or_else(|| {
            if self.testnet {
                TESTNET_WS_URL.to_string()
            } else {
                MAINNET_WS_URL.to_string()
            }
        })
    }
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        other => Err(ConfigError::InvalidConfiguration(format!(
            "Invalid boolean flag: {}",
            other
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("API key and secret are required")]
    MissingCredentials,
}
