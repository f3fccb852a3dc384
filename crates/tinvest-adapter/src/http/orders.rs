/*
[INPUT]:  Order requests and order identifiers
[OUTPUT]: Active orders, limit/market placement results, cancellation
[POS]:    HTTP layer - trading endpoints
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use reqwest::Method;

use crate::http::{OpenApiClient, Result};
use crate::types::{Empty, LimitOrderRequest, MarketOrderRequest, Order, PlacedLimitOrder, PlacedMarketOrder};

impl OpenApiClient {
    /// Active orders
    ///
    /// GET orders?brokerAccountId={account}
    pub async fn orders(&self) -> Result<Vec<Order>> {
        let builder = self.account_request(Method::GET, "orders")?;
        self.send_json(builder).await
    }

    /// Place a limit order
    ///
    /// POST orders/limit-order?figi={figi}&brokerAccountId={account}
    pub async fn limit_order(&self, figi: &str, req: &LimitOrderRequest) -> Result<PlacedLimitOrder> {
        let builder = self
            .account_request(Method::POST, "orders/limit-order")?
            .query(&[("figi", figi)])
            .json(req);
        self.send_json(builder).await
    }

    /// Place a market order
    ///
    /// POST orders/market-order?figi={figi}&brokerAccountId={account}
    pub async fn market_order(&self, figi: &str, req: &MarketOrderRequest) -> Result<PlacedMarketOrder> {
        let builder = self
            .account_request(Method::POST, "orders/market-order")?
            .query(&[("figi", figi)])
            .json(req);
        self.send_json(builder).await
    }

    /// Cancel an active order
    ///
    /// POST orders/cancel?orderId={order_id}&brokerAccountId={account}
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let builder = self
            .account_request(Method::POST, "orders/cancel")?
            .query(&[("orderId", order_id)]);
        let _: Empty = self.send_json(builder).await?;
        Ok(())
    }
}
