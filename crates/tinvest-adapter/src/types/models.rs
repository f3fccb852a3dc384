/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{
    BrokerAccountType, CandleInterval, Currency, InstrumentType, Operation, OperationKind,
    OperationStatus, OrderStatus, OrderType, TradeStatus,
};
use crate::http::InvestError;

/// Number of order book price levels, 1..=20
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Depth(u8);

impl Depth {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;

    pub fn new(levels: u8) -> Result<Self, InvestError> {
        if (Self::MIN..=Self::MAX).contains(&levels) {
            Ok(Self(levels))
        } else {
            Err(InvestError::InvalidParameter(format!(
                "order book depth must be within {}..={}, got {}",
                Self::MIN,
                Self::MAX,
                levels
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Depth {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for Depth {
    type Error = InvestError;

    fn try_from(levels: u8) -> Result<Self, Self::Error> {
        Self::new(levels)
    }
}

impl From<Depth> for u8 {
    fn from(depth: Depth) -> Self {
        depth.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInstrument {
    pub figi: String,
    pub ticker: String,
    pub isin: Option<String>,
    pub min_price_increment: Option<Decimal>,
    pub lot: u32,
    pub min_quantity: Option<u32>,
    pub currency: Option<Currency>,
    pub name: String,
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInstrumentList {
    pub total: u32,
    pub instruments: Vec<MarketInstrument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Orderbook {
    pub figi: String,
    pub depth: Depth,
    pub bids: Vec<OrderResponse>,
    pub asks: Vec<OrderResponse>,
    pub trade_status: TradeStatus,
    pub min_price_increment: Decimal,
    pub face_value: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub close_price: Option<Decimal>,
    pub limit_up: Option<Decimal>,
    pub limit_down: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub figi: String,
    pub interval: CandleInterval,
    pub o: Decimal,
    pub c: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub v: Decimal,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candles {
    pub figi: String,
    pub interval: CandleInterval,
    pub candles: Vec<Candle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyAmount {
    pub currency: Currency,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPosition {
    pub figi: String,
    pub ticker: Option<String>,
    pub isin: Option<String>,
    pub instrument_type: InstrumentType,
    pub balance: Decimal,
    pub blocked: Option<Decimal>,
    pub expected_yield: Option<MoneyAmount>,
    pub lots: u32,
    pub average_position_price: Option<MoneyAmount>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub positions: Vec<PortfolioPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub figi: String,
    pub operation: Operation,
    pub status: OrderStatus,
    pub requested_lots: u32,
    pub executed_lots: u32,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedLimitOrder {
    pub order_id: String,
    pub operation: Operation,
    pub status: OrderStatus,
    pub reject_reason: Option<String>,
    pub message: Option<String>,
    pub requested_lots: u32,
    pub executed_lots: u32,
    pub commission: Option<MoneyAmount>,
}

/// Result of `POST orders/market-order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedMarketOrder {
    pub order_id: String,
    pub operation: Operation,
    pub status: OrderStatus,
    pub reject_reason: Option<String>,
    pub message: Option<String>,
    pub requested_lots: u32,
    pub executed_lots: u32,
    pub commission: Option<MoneyAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPosition {
    pub currency: Currency,
    pub balance: Decimal,
    pub blocked: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currencies {
    pub currencies: Vec<CurrencyPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationTrade {
    pub trade_id: String,
    pub date: DateTime<Utc>,
    pub price: Decimal,
    pub quantity: i64,
}

/// One entry of the account operation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOperation {
    pub id: String,
    pub status: OperationStatus,
    #[serde(default)]
    pub trades: Vec<OperationTrade>,
    pub commission: Option<MoneyAmount>,
    pub currency: Currency,
    pub payment: Decimal,
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
    pub quantity_executed: Option<i64>,
    pub figi: Option<String>,
    pub instrument_type: Option<InstrumentType>,
    #[serde(default)]
    pub is_margin_call: bool,
    pub date: DateTime<Utc>,
    pub operation_type: Option<OperationKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operations {
    pub operations: Vec<AccountOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub broker_account_type: BrokerAccountType,
    pub broker_account_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccounts {
    pub accounts: Vec<UserAccount>,
}

/// Instrument lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstrumentId {
    Figi(String),
    Ticker(String),
}

impl InstrumentId {
    pub fn figi(figi: impl Into<String>) -> Self {
        InstrumentId::Figi(figi.into())
    }

    pub fn ticker(ticker: impl Into<String>) -> Self {
        InstrumentId::Ticker(ticker.into())
    }

    pub fn matches(&self, figi: &str, ticker: Option<&str>) -> bool {
        match self {
            InstrumentId::Figi(wanted) => wanted == figi,
            InstrumentId::Ticker(wanted) => ticker == Some(wanted.as_str()),
        }
    }
}
