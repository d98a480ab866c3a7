//! Data models for the aggregator API and the relay's own endpoints.

/// Aggregator API request and response types
pub mod fuse;
/// Inbound request bodies and query strings
pub mod requests;
/// Webhook event types
pub mod webhook;
