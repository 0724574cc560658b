//! Self-healing user data stream.
//!
//! Each connection cycle owns one listen key and one renewal task. When the
//! connection drops, the key is unsubscribed and its renewal task aborted
//! before a fresh key is created and a new connection opened.

use crate::core::kernel::{StreamMode, WsConfig, WsSession};
use crate::core::traits::ListenKeyApi;
use crate::exchanges::binance::codec::BinanceCodec;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::slice;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{debug, error, info};

/// Listen keys expire after 60 minutes without a keep-alive.
pub const RENEW_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const RETRY_INTERVAL: Duration = Duration::from_secs(60);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalSchedule {
    /// Wait between successful keep-alives
    pub renew_interval: Duration,
    /// Wait between failed keep-alive attempts
    pub retry_interval: Duration,
}

impl Default for RenewalSchedule {
    fn default() -> Self {
        Self {
            renew_interval: RENEW_INTERVAL,
            retry_interval: RETRY_INTERVAL,
        }
    }
}

/// Keep `listen_key` alive forever.
///
/// Sleeps `renew_interval`, then retries the keep-alive every
/// `retry_interval` until it succeeds. Never returns; stop it by aborting
/// the task running it.
pub async fn renew_listen_key<L: ListenKeyApi>(
    api: Arc<L>,
    listen_key: String,
    schedule: RenewalSchedule,
) {
    info!("renew listen key task started");
    let api = api.as_ref();
    let key = listen_key.as_str();

    loop {
        sleep(schedule.renew_interval).await;

        let retry = FixedInterval::new(schedule.retry_interval);
        let renewed = Retry::start(retry, move || async move {
            info!("renewing listen key");
            api.keep_alive_listen_key(key).await.map_err(|e| {
                error!("unable to renew listen key: {}", e);
                e
            })
        })
        .await;

        if renewed.is_ok() {
            debug!("listen key renewed");
        }
    }
}

/// Handle to a spawned [`renew_listen_key`] task; aborts it when cancelled
/// or dropped.
#[derive(Debug)]
pub struct RenewalTask {
    listen_key: String,
    handle: JoinHandle<()>,
}

impl RenewalTask {
    pub fn spawn<L: ListenKeyApi + 'static>(
        api: Arc<L>,
        listen_key: String,
        schedule: RenewalSchedule,
    ) -> Self {
        let handle = tokio::spawn(renew_listen_key(api, listen_key.clone(), schedule));
        Self { listen_key, handle }
    }

    pub fn listen_key(&self) -> &str {
        &self.listen_key
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        debug!("cancelling listen key renewal");
        drop(self);
    }
}

impl Drop for RenewalTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One listen key, its renewal task and the messages of its connection
struct Cycle<'a> {
    listen_key: String,
    renewal: RenewalTask,
    messages: BoxStream<'a, Value>,
}

/// User account events over a raw stream keyed by a listen key.
///
/// [`UserDataStream::stream`] never ends and never fails: disconnects are
/// healed by creating a new listen key and reconnecting, with no marker in
/// the message sequence.
pub struct UserDataStream<L: ListenKeyApi + 'static> {
    api: Arc<L>,
    session: WsSession<BinanceCodec>,
    schedule: RenewalSchedule,
    reconnect_delay: Duration,
}

impl<L: ListenKeyApi + 'static> std::fmt::Debug for UserDataStream<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDataStream")
            .field("schedule", &self.schedule)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}

impl<L: ListenKeyApi + 'static> UserDataStream<L> {
    pub fn new(api: Arc<L>, ws_base_url: String) -> Self {
        Self {
            api,
            session: WsSession::new(ws_base_url, "binance".to_string(), BinanceCodec),
            schedule: RenewalSchedule::default(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_schedule(mut self, schedule: RenewalSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Wait applied after a connection error or a failed listen key request
    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    pub fn with_ws_config(mut self, config: WsConfig) -> Self {
        self.session = self.session.with_config(config);
        self
    }

    pub fn session(&self) -> &WsSession<BinanceCodec> {
        &self.session
    }

    pub fn stream(&self) -> impl Stream<Item = Value> + Send + '_ {
        stream::unfold(None::<Cycle<'_>>, move |cycle| async move {
            let mut cycle = match cycle {
                Some(cycle) => cycle,
                None => self.start_cycle().await,
            };

            loop {
                if let Some(message) = cycle.messages.next().await {
                    return Some((message, Some(cycle)));
                }

                self.end_cycle(cycle).await;
                if self.session.closed_by_error() {
                    sleep(self.reconnect_delay).await;
                }
                cycle = self.start_cycle().await;
            }
        })
    }

    async fn create_listen_key(&self) -> String {
        loop {
            match self.api.create_listen_key().await {
                Ok(listen_key) => return listen_key,
                Err(e) => {
                    error!("unable to create listen key: {}", e);
                    sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    async fn start_cycle(&self) -> Cycle<'_> {
        // left behind when a previous stream was dropped mid-cycle
        let stale = self.session.subscriptions().await;
        if !stale.is_empty() {
            self.session.remove_subscriptions(&stale).await;
        }

        let listen_key = self.create_listen_key().await;
        let renewal = RenewalTask::spawn(self.api.clone(), listen_key.clone(), self.schedule);
        self.session
            .add_subscriptions(slice::from_ref(&listen_key))
            .await;

        Cycle {
            listen_key,
            renewal,
            messages: self.session.messages(StreamMode::Raw).boxed(),
        }
    }

    async fn end_cycle(&self, cycle: Cycle<'_>) {
        let Cycle {
            listen_key,
            renewal,
            messages,
        } = cycle;
        drop(messages);

        self.session
            .remove_subscriptions(slice::from_ref(&listen_key))
            .await;
        renewal.cancel();
        info!("user data connection ended, renewing listen key");
    }
}
