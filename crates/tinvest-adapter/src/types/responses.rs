/*
[INPUT]:  Raw REST response bodies
[OUTPUT]: Envelope types wrapping every API payload
[POS]:    Data layer - response type definitions
[UPDATE]: When API response envelope changes
*/

use serde::{Deserialize, Serialize};

/// Envelope returned by every REST endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub tracking_id: String,
    pub status: String,
    pub payload: T,
}

/// Payload of an error envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Payload of endpoints that return nothing useful
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}
