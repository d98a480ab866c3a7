//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, query string, headers)
//! 2. Calls the matching service, which talks to the aggregator
//! 3. Returns the aggregator's answer with its status code

/// Financial connection data endpoints
pub mod financial_connections;
/// Liveness endpoint
pub mod health;
/// Account linking endpoints
pub mod link;
/// Aggregator webhook endpoint
pub mod webhooks;
