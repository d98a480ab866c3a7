//! Financial connection data HTTP handlers.
//!
//! All endpoints take the caller's `access_token` as a query parameter:
//! - GET /accounts
//! - GET /account-details
//! - GET /balances?remote_account_ids=a,b
//! - GET /owners
//! - GET /transactions?page=1&records_per_page=100

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
};

use crate::{
    error::AppError,
    models::{
        fuse::{
            AccountDetailsResponse, AccountsResponse, BalancesResponse, OwnersResponse,
            TransactionsResponse,
        },
        requests::{AccessTokenQuery, BalancesQuery, TransactionsQuery, require},
    },
    router::AppState,
    services::financial_data_service,
};

/// Accounts plus the financial connection they belong to.
pub async fn get_accounts(
    State(state): State<AppState>,
    query: Result<Query<AccessTokenQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<AccountsResponse>), AppError> {
    let Query(query) = query?;
    require("access_token", &query.access_token)?;

    let response = financial_data_service::get_accounts(&state.fuse, &query.access_token).await?;
    Ok((response.status, Json(response.data)))
}

pub async fn get_account_details(
    State(state): State<AppState>,
    query: Result<Query<AccessTokenQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<AccountDetailsResponse>), AppError> {
    let Query(query) = query?;
    require("access_token", &query.access_token)?;

    let response =
        financial_data_service::get_account_details(&state.fuse, &query.access_token).await?;
    Ok((response.status, Json(response.data)))
}

/// Balances, optionally narrowed with `remote_account_ids`.
///
/// Retried with backoff on transient failures.
pub async fn get_balances(
    State(state): State<AppState>,
    query: Result<Query<BalancesQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<BalancesResponse>), AppError> {
    let Query(query) = query?;
    require("access_token", &query.access_token)?;

    let response = financial_data_service::get_balances(
        &state.fuse,
        &state.backoff,
        &query.access_token,
        query.remote_account_ids,
    )
    .await?;
    Ok((response.status, Json(response.data)))
}

pub async fn get_owners(
    State(state): State<AppState>,
    query: Result<Query<AccessTokenQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<OwnersResponse>), AppError> {
    let Query(query) = query?;
    require("access_token", &query.access_token)?;

    let response = financial_data_service::get_owners(&state.fuse, &query.access_token).await?;
    Ok((response.status, Json(response.data)))
}

/// One page of transactions from the trailing three months.
///
/// # Pagination
///
/// Start at `page=1` and keep incrementing until `transactions` comes back empty.
/// `records_per_page` defaults to and is capped at 100.
///
/// # Response (200)
///
/// ```json
/// {
///   "transactions": [ ... ],
///   "total_transactions": 231
/// }
/// ```
pub async fn get_transactions(
    State(state): State<AppState>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<TransactionsResponse>), AppError> {
    let Query(query) = query?;
    require("access_token", &query.access_token)?;

    let response = financial_data_service::get_transactions(
        &state.fuse,
        &state.backoff,
        &query.access_token,
        query.page,
        query.page_size(),
    )
    .await?;
    Ok((response.status, Json(response.data)))
}
