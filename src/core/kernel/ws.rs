use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use futures_util::stream::{self, SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Addressing mode of the push endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// `/ws`: frames of the subscribed streams delivered as-is
    Raw,
    /// `/stream`: frames wrapped as `{"stream": ..., "data": ...}`
    Combined,
}

impl StreamMode {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Raw => "/ws",
            Self::Combined => "/stream",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

/// One push-data connection and the subscriptions replayed onto it.
///
/// The subscription list is local state: it can be edited while
/// disconnected and is sent in full every time [`WsSession::messages`]
/// connects. Only one message stream should be consumed at a time.
pub struct WsSession<C: WsCodec> {
    base_url: String,
    exchange_name: String,
    codec: C,
    config: WsConfig,
    subscriptions: Mutex<Vec<String>>,
    writer: Mutex<Option<WsSink>>,
    /// Set when a dropped connection could not clear `writer` itself
    writer_stale: AtomicBool,
    closed_by_error: AtomicBool,
    last_request_id: AtomicU64,
}

impl<C: WsCodec> WsSession<C> {
    /// Create a new session
    ///
    /// # Arguments
    /// * `base_url` - Push endpoint root, without the `/ws` or `/stream` suffix
    /// * `exchange_name` - Name of the exchange for logging/tracing
    /// * `codec` - The codec to handle message encoding/decoding
    pub fn new(base_url: String, exchange_name: String, codec: C) -> Self {
        Self {
            base_url,
            exchange_name,
            codec,
            config: WsConfig::default(),
            subscriptions: Mutex::new(Vec::new()),
            writer: Mutex::new(None),
            writer_stale: AtomicBool::new(false),
            closed_by_error: AtomicBool::new(false),
            last_request_id: AtomicU64::new(0),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(&self, mode: StreamMode) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), mode.path())
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.lock_writer().await.is_some()
    }

    /// Whether the last connection ended with a transport error rather than
    /// a close
    pub fn closed_by_error(&self) -> bool {
        self.closed_by_error.load(Ordering::SeqCst)
    }

    /// Add streams to the subscription list and subscribe on the live
    /// connection, if any
    #[instrument(
        skip(self, streams),
        fields(exchange = %self.exchange_name, stream_count = streams.len())
    )]
    pub async fn add_subscriptions(&self, streams: &[String]) {
        if streams.is_empty() {
            return;
        }
        {
            let mut subscriptions = self.subscriptions.lock().await;
            for stream in streams {
                if !subscriptions.contains(stream) {
                    subscriptions.push(stream.clone());
                }
            }
        }
        self.send_control(streams, true).await;
    }

    /// Remove streams from the subscription list and unsubscribe on the live
    /// connection, if any
    #[instrument(
        skip(self, streams),
        fields(exchange = %self.exchange_name, stream_count = streams.len())
    )]
    pub async fn remove_subscriptions(&self, streams: &[String]) {
        if streams.is_empty() {
            return;
        }
        self.subscriptions
            .lock()
            .await
            .retain(|s| !streams.contains(s));
        self.send_control(streams, false).await;
    }

    /// Connect and yield decoded messages until the connection goes away.
    ///
    /// The stream never fails: connect errors, closes and transport errors
    /// all end it after being logged.
    pub fn messages(&self, mode: StreamMode) -> impl Stream<Item = C::Message> + Send + '_ {
        stream::unfold(Phase::Connect, move |phase| async move {
            let mut connection = match phase {
                Phase::Connect => match self.connect(mode).await {
                    Ok(read) => Connection::new(self, read),
                    Err(e) => {
                        error!(
                            exchange = %self.exchange_name,
                            "unable to connect websocket: {}", e
                        );
                        self.closed_by_error.store(true, Ordering::SeqCst);
                        return None;
                    }
                },
                Phase::Open(connection) => connection,
            };

            match self.receive(&mut connection.read).await {
                Some(message) => Some((message, Phase::Open(connection))),
                None => {
                    connection.release().await;
                    None
                }
            }
        })
    }

    /// Lock the write half, discarding it first if its connection is gone
    async fn lock_writer(&self) -> MutexGuard<'_, Option<WsSink>> {
        let mut writer = self.writer.lock().await;
        if self.writer_stale.swap(false, Ordering::SeqCst) {
            writer.take();
        }
        writer
    }

    fn next_request_id(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let previous = match self.last_request_id.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(now.max(last + 1)),
        ) {
            Ok(last) | Err(last) => last,
        };
        now.max(previous + 1)
    }

    async fn write_control(
        &self,
        sink: &mut WsSink,
        streams: &[String],
        subscribe: bool,
    ) -> Result<(), ExchangeError> {
        let id = self.next_request_id();
        let message = if subscribe {
            self.codec.encode_subscription(streams, id)?
        } else {
            self.codec.encode_unsubscription(streams, id)?
        };
        sink.send(message).await.map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to send WebSocket message: {}", e))
        })
    }

    async fn send_control(&self, streams: &[String], subscribe: bool) {
        let mut writer = self.lock_writer().await;
        let Some(sink) = writer.as_mut() else {
            warn!("websocket is disconnected, subscription change applies on next connect");
            return;
        };
        if let Err(e) = self.write_control(sink, streams, subscribe).await {
            warn!("unable to send subscription message: {}", e);
        }
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name))]
    async fn connect(&self, mode: StreamMode) -> Result<WsSource, ExchangeError> {
        let url = self.url(mode);
        info!("connecting websocket: {}", url);

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                ExchangeError::ConnectionTimeout("WebSocket connection timeout".to_string())
            })?
            .map_err(|e| {
                ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e))
            })?;
        info!("connected websocket: {}", url);

        let (mut write, read) = ws_stream.split();

        // Holding the writer lock keeps concurrent subscribe calls behind the replay
        let mut writer = self.writer.lock().await;
        self.writer_stale.store(false, Ordering::SeqCst);
        let subscriptions = self.subscriptions.lock().await.clone();
        if !subscriptions.is_empty() {
            info!("subscribing to streams {:?}", subscriptions);
            if let Err(e) = self.write_control(&mut write, &subscriptions, true).await {
                warn!("unable to send subscription message: {}", e);
            }
        }
        *writer = Some(write);
        self.closed_by_error.store(false, Ordering::SeqCst);

        Ok(read)
    }

    async fn receive(&self, read: &mut WsSource) -> Option<C::Message> {
        loop {
            match read.next().await {
                Some(Ok(message)) => match message {
                    Message::Text(_) | Message::Binary(_) => {
                        if let Message::Text(text) = &message {
                            trace!("received raw message: {}", text);
                        }
                        match self.codec.decode_message(message) {
                            Ok(Some(decoded)) => return Some(decoded),
                            Ok(None) => debug!("ignoring control response"),
                            Err(e) => warn!("dropping undecodable frame: {}", e),
                        }
                    }
                    Message::Ping(data) => self.send_pong(data).await,
                    Message::Close(frame) => {
                        warn!(exchange = %self.exchange_name, ?frame, "disconnected websocket");
                        return None;
                    }
                    Message::Pong(_) | Message::Frame(_) => {}
                },
                Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                ))
                | None => {
                    warn!(exchange = %self.exchange_name, "disconnected websocket");
                    return None;
                }
                Some(Err(e)) => {
                    error!(exchange = %self.exchange_name, "unknown error in websocket: {}", e);
                    self.closed_by_error.store(true, Ordering::SeqCst);
                    return None;
                }
            }
        }
    }

    async fn send_pong(&self, data: Vec<u8>) {
        if let Some(sink) = self.lock_writer().await.as_mut() {
            if let Err(e) = sink.send(Message::Pong(data)).await {
                warn!("Failed to send pong response: {}", e);
            }
        }
    }
}

enum Phase<'a, C: WsCodec> {
    Connect,
    Open(Connection<'a, C>),
}

/// Read half of a live connection; releases the session's write half when
/// the message stream ends or is dropped.
struct Connection<'a, C: WsCodec> {
    session: &'a WsSession<C>,
    read: WsSource,
    released: bool,
}

impl<'a, C: WsCodec> Connection<'a, C> {
    fn new(session: &'a WsSession<C>, read: WsSource) -> Self {
        Self {
            session,
            read,
            released: false,
        }
    }

    async fn release(mut self) {
        self.session.writer.lock().await.take();
        self.released = true;
    }
}

impl<C: WsCodec> Drop for Connection<'_, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.session.writer.try_lock() {
            Ok(mut writer) => {
                writer.take();
            }
            Err(_) => self.session.writer_stale.store(true, Ordering::SeqCst),
        }
    }
}
