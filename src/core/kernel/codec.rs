use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for handling exchange-specific WebSocket message encoding/decoding
///
/// Converts between raw WebSocket frames and the exchange's application
/// messages, and builds the control frames used to manage subscriptions.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed messages from this exchange
    type Message: Send + Sync;

    /// Encode a subscription request for `streams`
    ///
    /// `id` identifies the request on the connection it is sent over.
    fn encode_subscription(&self, streams: &[String], id: u64) -> Result<Message, ExchangeError>;

    /// Encode an unsubscription request for `streams`
    fn encode_unsubscription(&self, streams: &[String], id: u64)
        -> Result<Message, ExchangeError>;

    /// Decode a data frame
    ///
    /// Ping, pong and close frames are handled by the session and never
    /// reach the codec.
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Application message
    /// - `Ok(None)` - Control acknowledgement or frame to ignore
    /// - `Err(error)` - Frame could not be decoded
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
