//! HTTP client for the aggregator API.
//!
//! One `FuseClient` is built at startup and shared by every request. It holds
//! the base URL and a `reqwest::Client` whose default headers carry the
//! credential set, so individual calls only supply their JSON body.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::config::Config;
use crate::error::{AppError, ConfigError};
use crate::models::fuse::{
    AccessTokenRequest, AccountDetailsResponse, AccountsResponse, BalancesRequest,
    BalancesResponse, CreateLinkTokenRequest, CreateLinkTokenResponse, CreateSessionRequest,
    CreateSessionResponse, ExchangePublicTokenRequest, ExchangePublicTokenResponse,
    OwnersResponse, TransactionsRequest, TransactionsResponse,
};
use crate::models::webhook::VERIFICATION_HEADER;

const SESSION_PATH: &str = "/v1/session";
const LINK_TOKEN_PATH: &str = "/v1/link/token";
const EXCHANGE_PATH: &str = "/v1/financial_connections/public_token/exchange";
const ACCOUNTS_PATH: &str = "/v1/financial_connections/accounts";
const ACCOUNT_DETAILS_PATH: &str = "/v1/financial_connections/accounts/details";
const BALANCES_PATH: &str = "/v1/financial_connections/balances";
const OWNERS_PATH: &str = "/v1/financial_connections/owners";
const TRANSACTIONS_PATH: &str = "/v1/financial_connections/transactions";
const SYNC_PATH: &str = "/v1/financial_connections/sync";

/// A successful aggregator response together with the status it arrived with.
#[derive(Debug, Clone)]
pub struct FuseResponse<T> {
    pub status: StatusCode,
    pub data: T,
}

#[derive(Debug, Clone)]
pub struct FuseClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FuseClient {
    /// Build the client from configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidBaseUrl`: `FUSE_BASE_PATH` is not a URL
    /// - `InvalidHeader`: a credential contains characters not allowed in a header
    /// - `Client`: the TLS backend could not be initialized
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.fuse_base_path)?;

        let http = reqwest::Client::builder()
            .default_headers(credential_headers(config)?)
            .timeout(config.upstream_timeout())
            .build()?;

        Ok(Self { http, base_url })
    }

    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<FuseResponse<CreateSessionResponse>, AppError> {
        self.post(SESSION_PATH, request).await
    }

    pub async fn create_link_token(
        &self,
        request: &CreateLinkTokenRequest,
    ) -> Result<FuseResponse<CreateLinkTokenResponse>, AppError> {
        self.post(LINK_TOKEN_PATH, request).await
    }

    pub async fn exchange_public_token(
        &self,
        request: &ExchangePublicTokenRequest,
    ) -> Result<FuseResponse<ExchangePublicTokenResponse>, AppError> {
        self.post(EXCHANGE_PATH, request).await
    }

    pub async fn get_accounts(
        &self,
        request: &AccessTokenRequest,
    ) -> Result<FuseResponse<AccountsResponse>, AppError> {
        self.post(ACCOUNTS_PATH, request).await
    }

    pub async fn get_account_details(
        &self,
        request: &AccessTokenRequest,
    ) -> Result<FuseResponse<AccountDetailsResponse>, AppError> {
        self.post(ACCOUNT_DETAILS_PATH, request).await
    }

    pub async fn get_balances(
        &self,
        request: &BalancesRequest,
    ) -> Result<FuseResponse<BalancesResponse>, AppError> {
        self.post(BALANCES_PATH, request).await
    }

    pub async fn get_owners(
        &self,
        request: &AccessTokenRequest,
    ) -> Result<FuseResponse<OwnersResponse>, AppError> {
        self.post(OWNERS_PATH, request).await
    }

    pub async fn get_transactions(
        &self,
        request: &TransactionsRequest,
    ) -> Result<FuseResponse<TransactionsResponse>, AppError> {
        self.post(TRANSACTIONS_PATH, request).await
    }

    /// Forward a verified webhook event so the aggregator syncs the connection.
    ///
    /// The verification header is passed along so the aggregator can check that
    /// the event really originated from it. The response body is ignored.
    pub async fn sync_financial_connection_data(
        &self,
        verification: &str,
        event: &serde_json::Value,
    ) -> Result<StatusCode, AppError> {
        let response = self
            .http
            .post(self.endpoint(SYNC_PATH))
            .header(VERIFICATION_HEADER, verification)
            .json(event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(AppError::Upstream {
                status,
                body: error_body(&bytes),
            });
        }
        Ok(status)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<FuseResponse<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.post(self.endpoint(path)).json(body).send().await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        tracing::debug!(path, status = status.as_u16(), "aggregator responded");

        if !status.is_success() {
            return Err(AppError::Upstream {
                status,
                body: error_body(&bytes),
            });
        }

        let data = serde_json::from_slice(&bytes).map_err(AppError::UnexpectedResponse)?;
        Ok(FuseResponse { status, data })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

/// Error bodies are usually JSON; anything else is kept as a string.
fn error_body(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Headers sent with every aggregator call.
///
/// Optional per-aggregator credentials are only sent when configured.
fn credential_headers(config: &Config) -> Result<HeaderMap, ConfigError> {
    let credentials: [(&'static str, Option<&str>); 10] = [
        ("fuse-client-id", Some(config.fuse_client_id.as_str())),
        ("fuse-api-key", Some(config.fuse_api_key.as_str())),
        ("plaid-client-id", config.plaid_client_id.as_deref()),
        ("plaid-secret", config.plaid_secret.as_deref()),
        ("teller-application-id", config.teller_application_id.as_deref()),
        ("teller-certificate", config.teller_certificate.as_deref()),
        ("teller-private-key", config.teller_private_key.as_deref()),
        ("teller-signing-secret", config.teller_signing_secret.as_deref()),
        ("mx-client-id", config.mx_client_id.as_deref()),
        ("mx-api-key", config.mx_api_key.as_deref()),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in credentials {
        let Some(value) = value else { continue };
        let mut value = HeaderValue::from_str(value)
            .map_err(|source| ConfigError::InvalidHeader { name, source })?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}
