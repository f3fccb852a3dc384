/*
[INPUT]:  Raw WebSocket text frames / subscription intents
[OUTPUT]: Typed streaming payloads / encoded subscribe-unsubscribe commands
[POS]:    WebSocket layer - wire codec
[UPDATE]: When adding new message types or changing format
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::key::{ChannelKey, ChannelKind};
use crate::types::{CandleInterval, Depth, TradeStatus};

/// `[price, quantity]` pair
pub type PriceLevel = (Decimal, Decimal);

/// Order book update
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderbookStreaming {
    pub figi: String,
    pub depth: Depth,
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

/// Candle tick
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CandleStreaming {
    pub figi: String,
    pub interval: CandleInterval,
    pub o: Decimal,
    pub c: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub v: Decimal,
    pub time: DateTime<Utc>,
}

/// Instrument trading status
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstrumentInfoStreaming {
    pub figi: String,
    pub trade_status: TradeStatus,
    pub min_price_increment: Decimal,
    pub lot: u32,
    pub accrued_interest: Option<Decimal>,
    pub limit_up: Option<Decimal>,
    pub limit_down: Option<Decimal>,
}

/// Server-side error envelope (`event: "error"`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerErrorPayload {
    pub error: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Decoded data payload, one variant per channel kind
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingPayload {
    Orderbook(OrderbookStreaming),
    Candle(CandleStreaming),
    InstrumentInfo(InstrumentInfoStreaming),
}

impl StreamingPayload {
    /// Resolve the subscription this payload belongs to
    pub fn channel_key(&self) -> ChannelKey {
        match self {
            StreamingPayload::Orderbook(book) => ChannelKey::orderbook(book.figi.clone(), book.depth),
            StreamingPayload::Candle(candle) => {
                ChannelKey::candle(candle.figi.clone(), candle.interval)
            }
            StreamingPayload::InstrumentInfo(info) => ChannelKey::instrument_info(info.figi.clone()),
        }
    }
}

/// Any frame the dispatcher understands
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Data(StreamingPayload),
    ServerError(ServerErrorPayload),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a valid event envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("invalid `{event}` payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Decode one inbound text frame
pub fn decode_frame(raw: &str) -> Result<InboundFrame, FrameError> {
    let frame: RawFrame = serde_json::from_str(raw).map_err(FrameError::Malformed)?;

    let invalid = |source| FrameError::InvalidPayload {
        event: frame.event.clone(),
        source,
    };

    match frame.event.as_str() {
        "orderbook" => serde_json::from_value(frame.payload.clone())
            .map(|book| InboundFrame::Data(StreamingPayload::Orderbook(book)))
            .map_err(invalid),
        "candle" => serde_json::from_value(frame.payload.clone())
            .map(|candle| InboundFrame::Data(StreamingPayload::Candle(candle)))
            .map_err(invalid),
        "instrument_info" => serde_json::from_value(frame.payload.clone())
            .map(|info| InboundFrame::Data(StreamingPayload::InstrumentInfo(info)))
            .map_err(invalid),
        "error" => serde_json::from_value(frame.payload.clone())
            .map(InboundFrame::ServerError)
            .map_err(invalid),
        other => Err(FrameError::UnknownEvent(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Subscribe,
    Unsubscribe,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Subscribe => "subscribe",
            Intent::Unsubscribe => "unsubscribe",
        }
    }
}

/// Not-yet-sent subscribe/unsubscribe command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub intent: Intent,
    pub key: ChannelKey,
    pub request_id: String,
}

impl OutboundCommand {
    pub fn subscribe(key: ChannelKey) -> Self {
        Self::new(Intent::Subscribe, key)
    }

    pub fn unsubscribe(key: ChannelKey) -> Self {
        Self::new(Intent::Unsubscribe, key)
    }

    fn new(intent: Intent, key: ChannelKey) -> Self {
        Self {
            intent,
            key,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Wire event name, e.g. `orderbook:subscribe`
    pub fn event(&self) -> String {
        format!("{}:{}", self.key.kind().as_str(), self.intent.as_str())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut msg = serde_json::json!({
            "event": self.event(),
            "figi": self.key.figi(),
            "requestId": self.request_id,
        });
        match &self.key {
            ChannelKey::Orderbook { depth, .. } => {
                msg["depth"] = serde_json::json!(depth.get());
            }
            ChannelKey::Candle { interval, .. } => {
                msg["interval"] = serde_json::json!(interval.as_str());
            }
            ChannelKey::InstrumentInfo { .. } => {}
        }
        msg
    }

    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }

    pub fn kind(&self) -> ChannelKind {
        self.key.kind()
    }
}
