//! Fuse Link Relay
//!
//! A backend relay for a bank-account-linking flow through the Fuse
//! financial-data-aggregation API. It creates linking sessions and link tokens,
//! exchanges public tokens for durable credentials, passes account, balance,
//! owner and transaction queries through to the aggregator, and verifies the
//! aggregator's webhooks.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Aggregator Client**: reqwest with credential headers set once at startup
//! - **Webhooks**: HMAC-SHA256 over canonical JSON, constant-time comparison
//! - **Format**: JSON requests/responses
//!
//! Nothing is persisted. Access tokens are supplied by the caller on every request.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
