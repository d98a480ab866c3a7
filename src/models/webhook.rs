//! Webhook event models for notifications sent by the aggregator.
//!
//! # Webhook Flow
//!
//! 1. The aggregator POSTs an event to `/webhooks` with a `fuse-verification` header
//! 2. The header carries a base64 HMAC-SHA256 of the canonical JSON event body
//! 3. Verified `financial_connection.sync_data` events are forwarded to the sync endpoint
//!
//! The body is verified as raw JSON so every field the aggregator signed is covered;
//! only the routing fields below are read in typed form.

use serde::Deserialize;
use serde_json::Value;

/// Header carrying the aggregator's signature.
pub const VERIFICATION_HEADER: &str = "fuse-verification";

/// Event types this service routes on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum WebhookType {
    /// New data is ready to be synced for a financial connection.
    #[serde(rename = "financial_connection.sync_data")]
    SyncData,

    #[serde(rename = "financial_connection.disconnected")]
    Disconnected,

    /// Any type without dedicated handling.
    #[serde(other)]
    Other,
}

/// Routing view over a verified event body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: WebhookType,
    #[serde(default)]
    pub financial_connection_id: Option<String>,
}

impl WebhookEvent {
    /// Read the routing fields, treating a missing or malformed `type` as `Other`.
    pub fn from_body(body: &Value) -> Self {
        WebhookEvent::deserialize(body).unwrap_or(WebhookEvent {
            kind: WebhookType::Other,
            financial_connection_id: None,
        })
    }
}
