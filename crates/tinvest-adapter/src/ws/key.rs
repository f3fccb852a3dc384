/*
[INPUT]:  Channel kind, instrument FIGI and channel parameters
[OUTPUT]: ChannelKey identifying one logical subscription
[POS]:    WebSocket layer - subscription identity
[UPDATE]: When adding streaming channels or channel parameters
*/

use std::fmt;

use crate::types::{CandleInterval, Depth};

/// Streaming channel family, as used in `event` names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Orderbook,
    Candle,
    InstrumentInfo,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Orderbook => "orderbook",
            ChannelKind::Candle => "candle",
            ChannelKind::InstrumentInfo => "instrument_info",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one logical subscription. Equal keys share one wire subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKey {
    Orderbook { figi: String, depth: Depth },
    Candle { figi: String, interval: CandleInterval },
    InstrumentInfo { figi: String },
}

impl ChannelKey {
    pub fn orderbook(figi: impl Into<String>, depth: Depth) -> Self {
        ChannelKey::Orderbook {
            figi: figi.into(),
            depth,
        }
    }

    pub fn candle(figi: impl Into<String>, interval: CandleInterval) -> Self {
        ChannelKey::Candle {
            figi: figi.into(),
            interval,
        }
    }

    pub fn instrument_info(figi: impl Into<String>) -> Self {
        ChannelKey::InstrumentInfo { figi: figi.into() }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelKey::Orderbook { .. } => ChannelKind::Orderbook,
            ChannelKey::Candle { .. } => ChannelKind::Candle,
            ChannelKey::InstrumentInfo { .. } => ChannelKind::InstrumentInfo,
        }
    }

    pub fn figi(&self) -> &str {
        match self {
            ChannelKey::Orderbook { figi, .. }
            | ChannelKey::Candle { figi, .. }
            | ChannelKey::InstrumentInfo { figi } => figi,
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Orderbook { figi, depth } => {
                write!(f, "orderbook:{}:{}", figi, depth.get())
            }
            ChannelKey::Candle { figi, interval } => write!(f, "candle:{}:{}", figi, interval),
            ChannelKey::InstrumentInfo { figi } => write!(f, "instrument_info:{}", figi),
        }
    }
}
