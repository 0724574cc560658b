use binance_spot_stream::core::config::ExchangeConfig;
use binance_spot_stream::exchanges::binance::{create_user_data_stream, BinanceClient};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{error, info};

/// Logs every user data event of the configured account.
///
/// Reads `BINANCE_API_KEY`, `BINANCE_API_SECRET` and `BINANCE_TESTNET` from
/// the environment (or a `.env` file).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    #[cfg(feature = "env-file")]
    let config = ExchangeConfig::from_env_file("BINANCE", ".env")?;
    #[cfg(not(feature = "env-file"))]
    let config = ExchangeConfig::from_env("BINANCE")?;

    let client = Arc::new(BinanceClient::from_config(&config)?);
    let user_data = create_user_data_stream(client, &config)?;
    let messages = user_data.stream();
    tokio::pin!(messages);

    loop {
        tokio::select! {
            Some(message) = messages.next() => {
                match message.get("e").and_then(|e| e.as_str()) {
                    Some(
                        "outboundAccountPosition"
                        | "balanceUpdate"
                        | "executionReport"
                        | "listStatus"
                        | "listenKeyExpired",
                    ) => info!("{}", message),
                    _ => error!("unknown message data: {}", message),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}
