/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Tinkoff Invest adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::SecretToken;

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    InvestError,
    OpenApiClient,
    Result,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    Callback,
    CandleStreaming,
    ChannelKey,
    ConnectionState,
    InstrumentInfoStreaming,
    OrderbookStreaming,
    StreamingClient,
    StreamingConfig,
    StreamingPayload,
    SubscriptionHandle,
    Updates,
};
