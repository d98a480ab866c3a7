//! Account linking HTTP handlers.
//!
//! This module implements the endpoints the front end calls while connecting a bank:
//! - POST /create-session - Start a linking session
//! - POST /create-link-token - Scope a connection attempt to one institution
//! - POST /exchange-public-token - Trade the public token for durable credentials

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    error::AppError,
    models::{
        fuse::{CreateLinkTokenResponse, CreateSessionResponse, ExchangePublicTokenResponse},
        requests::{CreateLinkTokenBody, CreateSessionBody, ExchangePublicTokenBody, require},
    },
    router::AppState,
    services::link_service,
};

/// Create a linking session.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": "u1",
///   "access_token": "optional, reconnects an existing connection",
///   "is_web_view": false
/// }
/// ```
///
/// # Response
///
/// The aggregator's session object, including the `client_secret` the front end
/// SDK needs to list institutions.
pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let Json(request) = payload?;
    require("user_id", &request.user_id)?;

    let response = link_service::create_session(
        &state.fuse,
        &request.user_id,
        request.access_token,
        request.is_web_view,
    )
    .await?;

    Ok((response.status, Json(response.data)))
}

/// Create a link token once the user has picked an institution.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": "u1",
///   "institution_id": "inst_1",
///   "client_secret": "<client_secret from /create-session>"
/// }
/// ```
pub async fn create_link_token(
    State(state): State<AppState>,
    payload: Result<Json<CreateLinkTokenBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateLinkTokenResponse>), AppError> {
    let Json(request) = payload?;
    require("user_id", &request.user_id)?;
    require("institution_id", &request.institution_id)?;
    require("client_secret", &request.client_secret)?;

    let response = link_service::create_link_token(
        &state.fuse,
        &state.link_client_name,
        &request.user_id,
        &request.institution_id,
        &request.client_secret,
    )
    .await?;

    Ok((response.status, Json(response.data)))
}

/// Exchange the public token from the front end SDK.
///
/// The connection's data is prefetched before responding; see
/// [`link_service::exchange_public_token`].
///
/// # Response (200)
///
/// ```json
/// {
///   "access_token": "access-...",
///   "financial_connection_id": "fc_...",
///   "request_id": "..."
/// }
/// ```
///
/// The caller must store the access token; it is not kept here.
pub async fn exchange_public_token(
    State(state): State<AppState>,
    payload: Result<Json<ExchangePublicTokenBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ExchangePublicTokenResponse>), AppError> {
    let Json(request) = payload?;
    require("public_token", &request.public_token)?;

    let response = link_service::exchange_public_token(
        &state.fuse,
        &state.backoff,
        state.exchange_deadline,
        &request.public_token,
    )
    .await?;

    Ok((response.status, Json(response.data)))
}
