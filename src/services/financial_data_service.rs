//! Read operations on an established financial connection.
//!
//! Every operation takes the caller's access token, builds the aggregator
//! request and returns the aggregator's answer. Nothing is stored.
//!
//! Balance and transaction requests may time out the first time they are made
//! for a new connection, so those two are retried with exponential backoff.

use chrono::{Months, NaiveDate, Utc};

use crate::error::AppError;
use crate::models::fuse::{
    AccessTokenRequest, AccountDetailsResponse, AccountsResponse, BalancesOptions,
    BalancesRequest, BalancesResponse, OwnersResponse, TransactionsRequest, TransactionsResponse,
};
use crate::models::requests::MAX_RECORDS_PER_PAGE;
use crate::services::backoff::BackoffPolicy;
use crate::services::fuse_client::{FuseClient, FuseResponse};

/// How far back transaction history is requested.
const TRANSACTION_WINDOW_MONTHS: u32 = 3;

/// Fetch the accounts attached to a financial connection.
pub async fn get_accounts(
    client: &FuseClient,
    access_token: &str,
) -> Result<FuseResponse<AccountsResponse>, AppError> {
    let response = client
        .get_accounts(&AccessTokenRequest {
            access_token: access_token.to_string(),
        })
        .await?;

    tracing::info!(
        financial_connection_id = %response.data.financial_connection.id,
        accounts = response.data.accounts.len(),
        "Fetched accounts"
    );
    Ok(response)
}

pub async fn get_account_details(
    client: &FuseClient,
    access_token: &str,
) -> Result<FuseResponse<AccountDetailsResponse>, AppError> {
    let response = client
        .get_account_details(&AccessTokenRequest {
            access_token: access_token.to_string(),
        })
        .await?;

    tracing::info!(
        financial_connection_id = %response.data.financial_connection.id,
        account_details = response.data.account_details.len(),
        "Fetched account details"
    );
    Ok(response)
}

/// Fetch balances, optionally narrowed to some accounts.
///
/// A remote account id is the `remote_id` returned by [`get_accounts`]. An
/// empty list is the same as no list: every account is included.
pub async fn get_balances(
    client: &FuseClient,
    backoff: &BackoffPolicy,
    access_token: &str,
    remote_account_ids: Option<Vec<String>>,
) -> Result<FuseResponse<BalancesResponse>, AppError> {
    let request = build_balances_request(access_token, remote_account_ids);

    let response = backoff
        .retry(|| client.get_balances(&request), AppError::is_transient)
        .await?;

    tracing::info!(balances = response.data.balances.len(), "Fetched balances");
    Ok(response)
}

pub async fn get_owners(
    client: &FuseClient,
    access_token: &str,
) -> Result<FuseResponse<OwnersResponse>, AppError> {
    let response = client
        .get_owners(&AccessTokenRequest {
            access_token: access_token.to_string(),
        })
        .await?;

    for account in &response.data.accounts {
        tracing::info!(
            remote_id = %account.remote_id,
            owners = account.owners.len(),
            "Fetched account owners"
        );
    }
    Ok(response)
}

/// Fetch one page of transactions from the trailing three months.
///
/// Pages start at 1. Callers keep incrementing `page` until the returned
/// `transactions` array is empty.
pub async fn get_transactions(
    client: &FuseClient,
    backoff: &BackoffPolicy,
    access_token: &str,
    page: u32,
    records_per_page: u32,
) -> Result<FuseResponse<TransactionsResponse>, AppError> {
    if page == 0 {
        return Err(AppError::InvalidRequest("page starts at 1".to_string()));
    }

    let request = build_transactions_request(
        access_token,
        Utc::now().date_naive(),
        page,
        records_per_page,
    );

    let response = backoff
        .retry(|| client.get_transactions(&request), AppError::is_transient)
        .await?;

    tracing::info!(
        page,
        returned = response.data.transactions.len(),
        total_transactions = response.data.total_transactions,
        "Fetched transactions"
    );
    Ok(response)
}

pub fn build_balances_request(
    access_token: &str,
    remote_account_ids: Option<Vec<String>>,
) -> BalancesRequest {
    BalancesRequest {
        access_token: access_token.to_string(),
        options: remote_account_ids
            .filter(|ids| !ids.is_empty())
            .map(|remote_account_ids| BalancesOptions { remote_account_ids }),
    }
}

pub fn build_transactions_request(
    access_token: &str,
    today: NaiveDate,
    page: u32,
    records_per_page: u32,
) -> TransactionsRequest {
    let (start_date, end_date) = trailing_window(today);
    TransactionsRequest {
        access_token: access_token.to_string(),
        start_date,
        end_date,
        page,
        records_per_page: records_per_page.clamp(1, MAX_RECORDS_PER_PAGE),
    }
}

/// `(start, end)` covering the three months up to and including `today`.
///
/// Month arithmetic clamps to the end of shorter months: May 31 starts on Feb 28/29.
pub fn trailing_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_months(Months::new(TRANSACTION_WINDOW_MONTHS))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}
