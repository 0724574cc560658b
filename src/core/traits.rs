use crate::core::errors::ExchangeError;
use async_trait::async_trait;

/// Server-side user data session management.
///
/// A listen key identifies one user data push session; it expires unless
/// kept alive.
#[async_trait]
pub trait ListenKeyApi: Send + Sync {
    /// Open a new user data session and return its listen key
    async fn create_listen_key(&self) -> Result<String, ExchangeError>;

    /// Extend the validity of `listen_key`
    async fn keep_alive_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError>;

    /// Close the session identified by `listen_key`
    async fn close_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError>;
}
