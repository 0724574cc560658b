use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{HmacSigner, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::traits::ListenKeyApi;
use crate::core::types::Params;
use crate::exchanges::binance::types::{ListenKeyResponse, OrderRequest, ServerTimeResponse};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

const SERVER_TIME: &str = "/api/v3/time";
const ACCOUNT: &str = "/api/v3/account";
const EXCHANGE_INFO: &str = "/api/v3/exchangeInfo";
const MY_TRADES: &str = "/api/v3/myTrades";
const ORDER: &str = "/api/v3/order";
const OPEN_ORDERS: &str = "/api/v3/openOrders";
const ALL_ORDERS: &str = "/api/v3/allOrders";
const TICKER_PRICE: &str = "/api/v3/ticker/price";
const DEPTH: &str = "/api/v3/depth";
const USER_DATA_STREAM: &str = "/api/v3/userDataStream";

/// Binance spot REST client
///
/// Each method forwards its arguments as ordered parameters to the
/// dispatcher; private endpoints start their parameters with a timestamp so
/// they get signed. Responses are returned as JSON.
#[derive(Debug, Clone)]
pub struct BinanceClient<R: RestClient = ReqwestRest> {
    rest: R,
}

impl BinanceClient<ReqwestRest> {
    /// Build a client with a pooled HTTP connection for `config`
    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        let rest = RestClientBuilder::new(RestClientConfig::new(
            config.rest_url(),
            "binance".to_string(),
        ))
        .with_api_key(config.api_key.clone())
        .with_signer(Arc::new(HmacSigner::new(config.api_secret.clone())))
        .build()?;

        Ok(Self::new(rest))
    }

    /// Release the HTTP connection pool
    pub fn dispose(self) {
        self.rest.dispose();
    }
}

impl<R: RestClient> BinanceClient<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    pub fn rest(&self) -> &R {
        &self.rest
    }

    #[instrument(skip(self))]
    pub async fn server_time(&self) -> Result<ServerTimeResponse, ExchangeError> {
        let value = self.rest.send(Method::GET, SERVER_TIME, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip(self))]
    pub async fn account_info(&self) -> Result<Value, ExchangeError> {
        self.rest
            .send(Method::GET, ACCOUNT, Some(&Params::signed()))
            .await
    }

    #[instrument(skip(self))]
    pub async fn exchange_info(&self) -> Result<Value, ExchangeError> {
        self.rest.send(Method::GET, EXCHANGE_INFO, None).await
    }

    /// Account trades for `symbol`, oldest first from `from_id` when given
    #[instrument(skip(self))]
    pub async fn my_trades(
        &self,
        symbol: &str,
        from_id: Option<u64>,
        start_time: Option<u64>,
        end_time: Option<u64>,
        limit: u32,
    ) -> Result<Value, ExchangeError> {
        let params = Params::signed()
            .with("symbol", symbol)
            .with("limit", limit.to_string())
            .with_opt("fromId", from_id)
            .with_opt("startTime", start_time)
            .with_opt("endTime", end_time);
        self.rest.send(Method::GET, MY_TRADES, Some(&params)).await
    }

    /// Place a new order; the response is the `ACK` form
    #[instrument(skip(self), fields(symbol = %order.symbol))]
    pub async fn place_order(&self, order: &OrderRequest) -> Result<Value, ExchangeError> {
        let params = Params::signed()
            .with("symbol", order.symbol.as_str())
            .with("side", order.side.as_str())
            .with("type", order.order_type.as_str())
            .with("newOrderRespType", "ACK")
            .with_opt("quantity", order.quantity.as_deref())
            .with_opt("price", order.price.as_deref())
            .with_opt("timeInForce", order.time_in_force.map(|t| t.as_str()))
            .with_opt("stopPrice", order.stop_price.as_deref());
        self.rest.send(Method::POST, ORDER, Some(&params)).await
    }

    #[instrument(skip(self))]
    pub async fn order_status(&self, symbol: &str, order_id: u64) -> Result<Value, ExchangeError> {
        let params = Params::signed()
            .with("symbol", symbol)
            .with("orderId", order_id.to_string());
        self.rest.send(Method::GET, ORDER, Some(&params)).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<Value, ExchangeError> {
        let params = Params::signed()
            .with("symbol", symbol)
            .with("orderId", order_id.to_string());
        self.rest.send(Method::DELETE, ORDER, Some(&params)).await
    }

    /// Cancel every open order on `symbol`, OCO orders included
    #[instrument(skip(self))]
    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let params = Params::signed().with("symbol", symbol);
        self.rest.send(Method::DELETE, OPEN_ORDERS, Some(&params)).await
    }

    /// Open orders on `symbol`, or on every symbol when `None` (heavy weight)
    #[instrument(skip(self))]
    pub async fn open_orders(&self, symbol: Option<&str>) -> Result<Value, ExchangeError> {
        let params = Params::signed().with_opt("symbol", symbol);
        self.rest.send(Method::GET, OPEN_ORDERS, Some(&params)).await
    }

    /// All orders on `symbol`: active, canceled or filled
    #[instrument(skip(self))]
    pub async fn all_orders(
        &self,
        symbol: &str,
        from_id: Option<u64>,
        start_time: Option<u64>,
        end_time: Option<u64>,
        limit: u32,
    ) -> Result<Value, ExchangeError> {
        let params = Params::signed()
            .with("symbol", symbol)
            .with("limit", limit.to_string())
            .with_opt("orderId", from_id)
            .with_opt("startTime", start_time)
            .with_opt("endTime", end_time);
        self.rest.send(Method::GET, ALL_ORDERS, Some(&params)).await
    }

    #[instrument(skip(self))]
    pub async fn latest_price(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let params = Params::new().with("symbol", symbol);
        self.rest.send(Method::GET, TICKER_PRICE, Some(&params)).await
    }

    #[instrument(skip(self))]
    pub async fn latest_prices(&self) -> Result<Value, ExchangeError> {
        self.rest.send(Method::GET, TICKER_PRICE, None).await
    }

    #[instrument(skip(self))]
    pub async fn order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<Value, ExchangeError> {
        let params = Params::new().with("symbol", symbol).with_opt("limit", limit);
        self.rest.send(Method::GET, DEPTH, Some(&params)).await
    }
}

#[async_trait]
impl<R: RestClient> ListenKeyApi for BinanceClient<R> {
    #[instrument(skip(self))]
    async fn create_listen_key(&self) -> Result<String, ExchangeError> {
        let value = self.rest.send(Method::POST, USER_DATA_STREAM, None).await?;
        let response: ListenKeyResponse = serde_json::from_value(value)?;
        info!("created listen key");
        Ok(response.listen_key)
    }

    #[instrument(skip(self, listen_key))]
    async fn keep_alive_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError> {
        let params = Params::new().with("listenKey", listen_key);
        self.rest
            .send(Method::PUT, USER_DATA_STREAM, Some(&params))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, listen_key))]
    async fn close_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError> {
        let params = Params::new().with("listenKey", listen_key);
        self.rest
            .send(Method::DELETE, USER_DATA_STREAM, Some(&params))
            .await
            .map(|_| ())
    }
}
