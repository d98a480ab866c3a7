//! Business logic services.
//!
//! Services build aggregator requests and call the aggregator, separated from
//! the HTTP handlers that expose them.

pub mod backoff;
pub mod financial_data_service;
pub mod fuse_client;
pub mod link_service;
pub mod webhook_service;
