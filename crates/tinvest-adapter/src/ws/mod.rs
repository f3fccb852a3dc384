/*
[INPUT]:  Access token, streaming configuration and channel subscriptions
[OUTPUT]: Real-time orderbook, candle and instrument_info updates
[POS]:    WebSocket layer - streaming market data
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod heartbeat;
pub mod key;
pub mod message;
pub mod queue;
pub mod registry;

pub use client::{Callback, ChannelPayload, StreamingClient, SubscriptionHandle, Updates};
pub use config::StreamingConfig;
pub use connection::ConnectionState;
pub use key::{ChannelKey, ChannelKind};
pub use message::{
    CandleStreaming,
    FrameError,
    InboundFrame,
    InstrumentInfoStreaming,
    OrderbookStreaming,
    OutboundCommand,
    ServerErrorPayload,
    StreamingPayload,
};
