use crate::core::errors::ExchangeError;
use crate::core::kernel::WsCodec;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Raw-text marker of a subscription acknowledgement, used when the frame
/// does not carry the structured `id`/`result` pair.
pub const ACK_PREFIX: &str = r#"{"return""#;

/// Binance push-data codec; application messages are passed through as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceCodec;

impl BinanceCodec {
    fn control_frame(method: &str, streams: &[String], id: u64) -> Message {
        let frame = json!({
            "method": method,
            "params": streams,
            "id": id,
        });
        Message::Text(frame.to_string())
    }
}

/// Replies to control frames echo the request `id` and carry either
/// `result` or `error`; data frames carry an event type or a stream name.
fn is_control_reply(value: &Value) -> bool {
    value.as_object().is_some_and(|object| {
        object.contains_key("id")
            && (object.contains_key("result") || object.contains_key("error"))
            && !object.contains_key("e")
            && !object.contains_key("stream")
    })
}

impl WsCodec for BinanceCodec {
    type Message = Value;

    fn encode_subscription(&self, streams: &[String], id: u64) -> Result<Message, ExchangeError> {
        Ok(Self::control_frame("SUBSCRIBE", streams, id))
    }

    fn encode_unsubscription(
        &self,
        streams: &[String],
        id: u64,
    ) -> Result<Message, ExchangeError> {
        Ok(Self::control_frame("UNSUBSCRIBE", streams, id))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                ExchangeError::NetworkError(format!("Invalid UTF-8 in binary message: {}", e))
            })?,
            _ => return Ok(None),
        };

        if text.trim_start().starts_with(ACK_PREFIX) {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&text)?;
        if is_control_reply(&value) {
            if let Some(error) = value.get("error") {
                warn!("subscription request rejected: {}", error);
            }
            return Ok(None);
        }

        Ok(Some(value))
    }
}

/// Stream name for a symbol and channel, e.g. `btcusdt@trade`
pub fn stream_name(symbol: &str, channel: &str) -> String {
    format!("{}@{}", symbol.to_lowercase(), channel)
}
