//! Inbound request bodies and query strings accepted by the relay endpoints.

use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// Largest page the aggregator will return for transactions.
pub const MAX_RECORDS_PER_PAGE: u32 = 100;

/// Body of `POST /create-session`.
///
/// # Example
///
/// ```json
/// {
///   "user_id": "u1",
///   "access_token": "access-sandbox-...",
///   "is_web_view": false
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub user_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub is_web_view: Option<bool>,
}

/// Body of `POST /create-link-token`.
#[derive(Debug, Deserialize)]
pub struct CreateLinkTokenBody {
    pub user_id: String,
    pub institution_id: String,
    pub client_secret: String,
}

/// Body of `POST /exchange-public-token`.
#[derive(Debug, Deserialize)]
pub struct ExchangePublicTokenBody {
    pub public_token: String,
}

/// Query string for the accounts, account details and owners endpoints.
#[derive(Debug, Deserialize)]
pub struct AccessTokenQuery {
    pub access_token: String,
}

/// Query string for `GET /balances`.
///
/// `remote_account_ids` is a comma separated list: `?remote_account_ids=a,b`.
#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    pub access_token: String,
    #[serde(default, deserialize_with = "comma_separated")]
    pub remote_account_ids: Option<Vec<String>>,
}

/// Query string for `GET /transactions`.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub access_token: String,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub records_per_page: Option<u32>,
}

fn first_page() -> u32 {
    1
}

impl TransactionsQuery {
    /// Page size actually requested upstream, clamped to `1..=100`.
    pub fn page_size(&self) -> u32 {
        self.records_per_page
            .unwrap_or(MAX_RECORDS_PER_PAGE)
            .clamp(1, MAX_RECORDS_PER_PAGE)
    }
}

fn comma_separated<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }))
}

/// Reject blank identifiers before any aggregator call is made.
pub fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidRequest(format!("{field} is required")));
    }
    Ok(())
}
