//! Request and response types for the aggregator API.
//!
//! Response types name the fields this service relies on and keep everything
//! else in a flattened `extra` map, so a response deserialized here serializes
//! back to the body the aggregator sent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Downstream aggregators reachable through the unified API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    Plaid,
    Mx,
    Teller,
}

/// Data products requested when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    Balance,
    AccountDetails,
    Ownership,
    Transactions,
}

/// The end user on whose behalf a session or link token is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub id: String,
}

/// Body of `POST /v1/session`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub supported_financial_institution_aggregators: Vec<Aggregator>,
    pub products: Vec<Product>,
    pub entity: Entity,

    /// Present only when reconnecting an existing financial connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// The aggregator assumes `true` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_web_view: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub client_secret: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregator specific link configuration, forwarded as an opaque object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatorConfig {
    pub config: Map<String, Value>,
}

/// Body of `POST /v1/link/token`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateLinkTokenRequest {
    pub entity: Entity,
    pub institution_id: String,
    pub client_name: String,
    pub session_client_secret: String,
    pub mx: AggregatorConfig,
    pub plaid: AggregatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkTokenResponse {
    pub link_token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangePublicTokenRequest {
    pub public_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangePublicTokenResponse {
    pub access_token: String,
    pub financial_connection_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body shared by the accounts, account details and owners calls.
#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenRequest {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialConnection {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An account as reported by the aggregator.
///
/// `remote_id` can change across reconnections even for the same institution,
/// since a different downstream aggregator may serve the reconnection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub remote_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsResponse {
    pub accounts: Vec<Account>,
    pub financial_connection: FinancialConnection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetailsResponse {
    pub account_details: Vec<Value>,
    pub financial_connection: FinancialConnection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalancesOptions {
    pub remote_account_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalancesRequest {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<BalancesOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub balances: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOwners {
    pub remote_id: String,
    pub owners: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnersResponse {
    pub accounts: Vec<AccountOwners>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /v1/financial_connections/transactions`.
///
/// Dates serialize as `YYYY-MM-DD`. Pages start at 1.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionsRequest {
    pub access_token: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub page: u32,
    pub records_per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Value>,
    pub total_transactions: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_request_omits_absent_optionals() {
        let request = CreateSessionRequest {
            supported_financial_institution_aggregators: vec![Aggregator::Plaid],
            products: vec![Product::AccountDetails],
            entity: Entity { id: "u1".into() },
            access_token: None,
            is_web_view: None,
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "supported_financial_institution_aggregators": ["plaid"],
                "products": ["account_details"],
                "entity": {"id": "u1"}
            })
        );
    }

    #[test]
    fn responses_keep_unknown_fields() {
        let body = json!({
            "accounts": [{"remote_id": "acc_1", "name": "Checking", "type": "depository"}],
            "financial_connection": {"id": "fc_1", "connection_status": "connected"},
            "request_id": "req_1"
        });
        let parsed: AccountsResponse = serde_json::from_value(body.clone()).unwrap();

        assert_eq!(parsed.accounts[0].remote_id, "acc_1");
        assert_eq!(parsed.financial_connection.id, "fc_1");
        assert_eq!(serde_json::to_value(&parsed).unwrap(), body);
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let body = json!({"expiration": "2024-01-01T00:00:00Z"});
        assert!(serde_json::from_value::<CreateSessionResponse>(body).is_err());
    }

    #[test]
    fn transactions_request_dates_are_iso() {
        let request = TransactionsRequest {
            access_token: "tok".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 4, 15).unwrap(),
            page: 1,
            records_per_page: 100,
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["start_date"], "2024-01-15");
        assert_eq!(value["end_date"], "2024-04-15");
        assert_eq!(value["records_per_page"], 100);
    }
}
