pub mod client;
pub mod codec;
pub mod market_data;
pub mod types;
pub mod user_data;

use crate::core::config::{ConfigError, ExchangeConfig};
use crate::core::errors::ExchangeError;
use std::sync::Arc;

pub use client::BinanceClient;
pub use codec::{stream_name, BinanceCodec};
pub use market_data::{kline_topic, KlineStream};
pub use types::{
    CombinedFrame, Kline, KlineEvent, ListenKeyResponse, OrderRequest, OrderSide, OrderType,
    ServerTimeResponse, TimeInForce,
};
pub use user_data::{renew_listen_key, RenewalSchedule, RenewalTask, UserDataStream};

/// Create a user data stream sharing `client` for listen key management
///
/// Listen keys belong to an account, so `config` must carry credentials.
pub fn create_user_data_stream(
    client: Arc<BinanceClient>,
    config: &ExchangeConfig,
) -> Result<UserDataStream<BinanceClient>, ExchangeError> {
    if !config.has_credentials() {
        return Err(ConfigError::MissingCredentials.into());
    }
    Ok(UserDataStream::new(client, config.ws_url()))
}

/// Create a candlestick stream on the endpoint selected by `config`
pub fn create_kline_stream(config: &ExchangeConfig) -> KlineStream {
    KlineStream::new(config.ws_url())
}
