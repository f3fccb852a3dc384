/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod market;
pub mod orders;
pub mod portfolio;
pub mod sandbox;

pub use error::{InvestError, Result};

pub use client::{ClientConfig, OpenApiClient};
