//! Candlestick push data over the combined stream endpoint.

use crate::core::kernel::{StreamMode, WsConfig, WsSession};
use crate::exchanges::binance::codec::{stream_name, BinanceCodec};
use crate::exchanges::binance::types::{CombinedFrame, KlineEvent};
use futures_util::future;
use futures_util::stream::{Stream, StreamExt};
use serde_json::Value;
use tracing::{instrument, warn};

/// Candlestick topic for `symbol` at `interval`, e.g. `btcusdt@kline_1m`
pub fn kline_topic(symbol: &str, interval: &str) -> String {
    stream_name(symbol, &format!("kline_{}", interval))
}

fn kline_topics(items: &[(&str, &str)]) -> Vec<String> {
    items
        .iter()
        .map(|(symbol, interval)| kline_topic(symbol, interval))
        .collect()
}

/// Candlestick updates for any number of `(symbol, interval)` pairs, all
/// multiplexed over one connection.
///
/// Subscriptions are kept across reconnects: every call to
/// [`KlineStream::klines`] replays them on the new connection.
pub struct KlineStream {
    session: WsSession<BinanceCodec>,
}

impl KlineStream {
    pub fn new(ws_base_url: String) -> Self {
        Self {
            session: WsSession::new(ws_base_url, "binance".to_string(), BinanceCodec),
        }
    }

    pub fn with_ws_config(mut self, config: WsConfig) -> Self {
        self.session = self.session.with_config(config);
        self
    }

    pub fn session(&self) -> &WsSession<BinanceCodec> {
        &self.session
    }

    #[instrument(skip(self, items), fields(exchange = "binance", count = items.len()))]
    pub async fn subscribe(&self, items: &[(&str, &str)]) {
        self.session.add_subscriptions(&kline_topics(items)).await;
    }

    #[instrument(skip(self, items), fields(exchange = "binance", count = items.len()))]
    pub async fn unsubscribe(&self, items: &[(&str, &str)]) {
        self.session.remove_subscriptions(&kline_topics(items)).await;
    }

    /// Connect and yield candlestick updates until the connection goes away.
    ///
    /// Frames that are not candlesticks are logged and skipped.
    pub fn klines(&self) -> impl Stream<Item = KlineEvent> + Send + '_ {
        self.session
            .messages(StreamMode::Combined)
            .filter_map(|frame| future::ready(decode_kline(frame)))
    }
}

fn decode_kline(frame: Value) -> Option<KlineEvent> {
    match serde_json::from_value::<CombinedFrame<KlineEvent>>(frame) {
        Ok(frame) => Some(frame.data),
        Err(e) => {
            warn!("dropping frame that is not a kline: {}", e);
            None
        }
    }
}
