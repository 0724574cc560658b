pub mod core;
pub mod exchanges;

pub use core::{
    config::ExchangeConfig, errors::ExchangeError, traits::ListenKeyApi, types::Params,
};
pub use exchanges::binance::{BinanceClient, KlineStream, UserDataStream};
