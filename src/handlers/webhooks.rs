//! HTTP handler for aggregator webhooks.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::models::webhook::VERIFICATION_HEADER;
use crate::router::AppState;
use crate::services::webhook_service;

/// Receive a webhook event from the aggregator.
///
/// # Checks
///
/// 1. `fuse-verification` header present and non-empty, otherwise 403 before the body is parsed
/// 2. Body is JSON, otherwise 400
/// 3. Header matches the HMAC of the canonical body, otherwise 403
///
/// # Response
///
/// 200 with no body once the event is verified, whatever its type. A sync
/// event's forwarding call runs in the background and does not affect the status.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(header) = headers
        .get(VERIFICATION_HEADER)
        .filter(|value| !value.is_empty())
    else {
        tracing::warn!("Webhook rejected: verification header missing");
        return StatusCode::FORBIDDEN;
    };

    let Ok(event) = serde_json::from_slice::<serde_json::Value>(&body) else {
        tracing::warn!("Webhook rejected: body is not JSON");
        return StatusCode::BAD_REQUEST;
    };

    // A header that is not valid text cannot match a base64 digest
    let verification = header.to_str().unwrap_or_default();
    if let Err(rejection) = state.verifier.verify(Some(verification), &event) {
        tracing::warn!("Webhook rejected: {}", rejection);
        return StatusCode::FORBIDDEN;
    }

    let kind = webhook_service::dispatch(&state.fuse, verification, event);
    tracing::debug!(?kind, "Webhook accepted");

    StatusCode::OK
}
