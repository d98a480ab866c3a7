//! Account linking flow: session, link token, public token exchange.
//!
//! # Flow
//!
//! 1. `create_session` returns a `client_secret` the front end uses to list institutions
//! 2. `create_link_token` scopes one connection attempt to the chosen institution
//! 3. `exchange_public_token` trades the front end's public token for durable credentials
//!
//! The access token and financial connection id from step 3 belong to the caller.
//! This service never stores them.

use std::time::Duration;

use crate::error::AppError;
use crate::models::fuse::{
    Aggregator, AggregatorConfig, CreateLinkTokenRequest, CreateLinkTokenResponse,
    CreateSessionRequest, CreateSessionResponse, Entity, ExchangePublicTokenRequest,
    ExchangePublicTokenResponse, Product,
};
use crate::models::requests::MAX_RECORDS_PER_PAGE;
use crate::services::backoff::BackoffPolicy;
use crate::services::financial_data_service;
use crate::services::fuse_client::{FuseClient, FuseResponse};

const SUPPORTED_AGGREGATORS: [Aggregator; 3] =
    [Aggregator::Plaid, Aggregator::Mx, Aggregator::Teller];

const REQUESTED_PRODUCTS: [Product; 4] = [
    Product::Balance,
    Product::AccountDetails,
    Product::Ownership,
    Product::Transactions,
];

/// Start a linking session for a user.
///
/// Passing the access token of an existing connection starts a reconnection.
/// `is_web_view` should be `false` for browser front ends; the aggregator
/// assumes `true` when it is omitted.
pub async fn create_session(
    client: &FuseClient,
    user_id: &str,
    access_token: Option<String>,
    is_web_view: Option<bool>,
) -> Result<FuseResponse<CreateSessionResponse>, AppError> {
    let request = build_session_request(user_id, access_token, is_web_view);
    let response = client.create_session(&request).await?;

    tracing::info!(
        user_id,
        reconnect = request.access_token.is_some(),
        "Session created"
    );
    Ok(response)
}

/// Create a link token for the institution the user picked.
pub async fn create_link_token(
    client: &FuseClient,
    client_name: &str,
    user_id: &str,
    institution_id: &str,
    session_client_secret: &str,
) -> Result<FuseResponse<CreateLinkTokenResponse>, AppError> {
    let request =
        build_link_token_request(client_name, user_id, institution_id, session_client_secret);
    let response = client.create_link_token(&request).await?;

    tracing::info!(user_id, institution_id, "Link token created");
    Ok(response)
}

/// Exchange a public token and prefetch the new connection's data.
///
/// After the exchange, accounts, account details, balances, owners and the
/// first page of transactions are fetched in that order. The aggregator
/// prepares a new connection's data on first access, so this warms it before
/// the caller's own requests arrive. The fetched data is discarded.
///
/// The exchange response is returned so the caller can store the access
/// token and financial connection id.
///
/// # Errors
///
/// - Any failing sub-call aborts the remaining sequence and is returned
/// - `DeadlineExceeded`: the prefetch did not finish within `deadline`
pub async fn exchange_public_token(
    client: &FuseClient,
    backoff: &BackoffPolicy,
    deadline: Duration,
    public_token: &str,
) -> Result<FuseResponse<ExchangePublicTokenResponse>, AppError> {
    let exchanged = client
        .exchange_public_token(&ExchangePublicTokenRequest {
            public_token: public_token.to_string(),
        })
        .await?;

    tracing::info!(
        financial_connection_id = %exchanged.data.financial_connection_id,
        "Public token exchanged"
    );

    // The public token is spent by now, so a failure here orphans the connection
    let prefetched = tokio::time::timeout(
        deadline,
        prefetch_connection_data(client, backoff, &exchanged.data.access_token),
    )
    .await
    .unwrap_or(Err(AppError::DeadlineExceeded));

    if let Err(e) = prefetched {
        tracing::warn!(
            financial_connection_id = %exchanged.data.financial_connection_id,
            error = %e,
            "Prefetch failed after exchange"
        );
        return Err(e);
    }

    Ok(exchanged)
}

async fn prefetch_connection_data(
    client: &FuseClient,
    backoff: &BackoffPolicy,
    access_token: &str,
) -> Result<(), AppError> {
    financial_data_service::get_accounts(client, access_token).await?;
    financial_data_service::get_account_details(client, access_token).await?;
    financial_data_service::get_balances(client, backoff, access_token, None).await?;
    financial_data_service::get_owners(client, access_token).await?;
    financial_data_service::get_transactions(
        client,
        backoff,
        access_token,
        1,
        MAX_RECORDS_PER_PAGE,
    )
    .await?;
    Ok(())
}

pub fn build_session_request(
    user_id: &str,
    access_token: Option<String>,
    is_web_view: Option<bool>,
) -> CreateSessionRequest {
    CreateSessionRequest {
        supported_financial_institution_aggregators: SUPPORTED_AGGREGATORS.to_vec(),
        products: REQUESTED_PRODUCTS.to_vec(),
        entity: Entity {
            id: user_id.to_string(),
        },
        // An empty token means "new connection", not "reconnect with an empty token".
        access_token: access_token.filter(|token| !token.is_empty()),
        is_web_view,
    }
}

pub fn build_link_token_request(
    client_name: &str,
    user_id: &str,
    institution_id: &str,
    session_client_secret: &str,
) -> CreateLinkTokenRequest {
    CreateLinkTokenRequest {
        entity: Entity {
            id: user_id.to_string(),
        },
        institution_id: institution_id.to_string(),
        client_name: client_name.to_string(),
        session_client_secret: session_client_secret.to_string(),
        mx: AggregatorConfig::default(),
        plaid: AggregatorConfig::default(),
    }
}
