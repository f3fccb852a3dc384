/*
[INPUT]:  Order parameters from callers
[OUTPUT]: Serializable request bodies
[POS]:    Data layer - request type definitions
[UPDATE]: When API request schema changes
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{BrokerAccountType, Currency, Operation};

/// Body of `POST orders/limit-order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrderRequest {
    pub lots: u32,
    pub operation: Operation,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Body of `POST orders/market-order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    pub lots: u32,
    pub operation: Operation,
}

/// Body of `POST sandbox/register`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxRegisterRequest {
    pub broker_account_type: BrokerAccountType,
}

/// Body of `POST sandbox/positions/balance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxSetPositionBalanceRequest {
    pub figi: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// Body of `POST sandbox/currencies/balance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxSetCurrencyBalanceRequest {
    pub currency: Currency,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}
