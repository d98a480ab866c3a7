//! Router construction and shared application state.

use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::ConfigError;
use crate::handlers;
use crate::services::backoff::BackoffPolicy;
use crate::services::fuse_client::FuseClient;
use crate::services::webhook_service::WebhookVerifier;

/// State shared by every handler.
///
/// Built once from [`Config`] and read-only afterwards; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub fuse: FuseClient,
    pub verifier: WebhookVerifier,
    pub backoff: BackoffPolicy,
    pub link_client_name: String,
    pub exchange_deadline: Duration,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            fuse: FuseClient::new(config)?,
            verifier: WebhookVerifier::new(&config.fuse_api_key),
            backoff: config.backoff_policy(),
            link_client_name: config.link_client_name.clone(),
            exchange_deadline: config.exchange_deadline(),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Account linking
        .route("/create-session", post(handlers::link::create_session))
        .route("/create-link-token", post(handlers::link::create_link_token))
        .route(
            "/exchange-public-token",
            post(handlers::link::exchange_public_token),
        )
        // Financial connection data
        .route("/accounts", get(handlers::financial_connections::get_accounts))
        .route(
            "/account-details",
            get(handlers::financial_connections::get_account_details),
        )
        .route("/balances", get(handlers::financial_connections::get_balances))
        .route("/owners", get(handlers::financial_connections::get_owners))
        .route(
            "/transactions",
            get(handlers::financial_connections::get_transactions),
        )
        // Aggregator notifications
        .route("/webhooks", post(handlers::webhooks::receive_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
