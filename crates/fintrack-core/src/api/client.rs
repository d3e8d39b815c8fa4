//! API client for communicating with the FinTrack REST API.
//!
//! This module provides the `ApiClient` struct for authenticating and for
//! reading and mutating budgets, categories and transactions.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    Budget, Category, NewBudget, NewCategory, NewTransaction, Transaction,
};

use super::traits::{AuthApi, DashboardApi, LoginResponse};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when neither config nor environment provides one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

// Collection endpoints answer `{"budgets": [...]}` etc. Go encodes an
// empty result as `null`, hence the Options.

#[derive(Debug, Deserialize)]
struct BudgetsResponse {
    budgets: Option<Vec<Budget>>,
}

#[derive(Debug, Deserialize)]
struct CategoriesResponse {
    categories: Option<Vec<Category>>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Option<Vec<Transaction>>,
}

#[derive(Debug, Deserialize)]
struct CategoryCreated {
    category: Category,
}

#[derive(Debug, Deserialize)]
struct TransactionCreated {
    transaction: Transaction,
}

#[derive(Debug, Deserialize)]
struct BudgetCreated {
    budget: Budget,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest<'a> {
    identifier: &'a str,
    new_password: &'a str,
    confirm_password: &'a str,
}

/// Body of `GET /profile`: the id the server resolved from the token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(rename = "userID")]
    pub user_id: u64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

/// API client for the FinTrack backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for the given base URL (e.g. `http://host:8080/api/v1`)
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request, backing off exponentially while the server answers 429.
    /// `build` is called again for every attempt.
    async fn send_with_retry<F>(&self, method: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .send_with_retry("GET", &url, || self.client.get(&url).bearer_auth(token))
            .await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        let response = self
            .send_with_retry("POST", &url, || {
                let request = self.client.post(&url).json(body);
                match token {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn delete(&self, path: &str, token: &str) -> Result<()> {
        let url = self.url(path);
        self.send_with_retry("DELETE", &url, || self.client.delete(&url).bearer_auth(token))
            .await?;
        Ok(())
    }

    // ===== Authentication =====

    /// Create a new account. The caller still has to log in afterwards.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<()> {
        let body = RegisterRequest {
            username,
            email,
            password,
        };
        let _: serde_json::Value = self.post("/auth/register", None, &body).await?;
        debug!(username, "Account registered");
        Ok(())
    }

    /// Set a new password for the account matching `identifier` (username
    /// or email). The server rejects mismatched confirmations.
    pub async fn reset_password(
        &self,
        identifier: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        let body = ResetPasswordRequest {
            identifier,
            new_password,
            confirm_password,
        };
        let _: serde_json::Value = self.post("/auth/reset-password", None, &body).await?;
        debug!(identifier, "Password reset");
        Ok(())
    }

    /// Check the token against a protected endpoint.
    pub async fn fetch_profile(&self, token: &str) -> Result<Profile> {
        self.get("/profile", token).await
    }

    // ===== Mutations =====

    pub async fn create_category(&self, token: &str, category: &NewCategory) -> Result<Category> {
        let created: CategoryCreated = self.post("/categories", Some(token), category).await?;
        debug!(id = created.category.id, "Category created");
        Ok(created.category)
    }

    pub async fn create_transaction(&self, token: &str, tx: &NewTransaction) -> Result<Transaction> {
        let created: TransactionCreated = self.post("/transactions", Some(token), tx).await?;
        debug!(id = created.transaction.id, "Transaction created");
        Ok(created.transaction)
    }

    pub async fn delete_transaction(&self, token: &str, id: u64) -> Result<()> {
        self.delete(&format!("/transactions/{}", id), token).await?;
        debug!(id, "Transaction deleted");
        Ok(())
    }

    pub async fn create_budget(&self, token: &str, budget: &NewBudget) -> Result<Budget> {
        let created: BudgetCreated = self.post("/budgets", Some(token), budget).await?;
        debug!(id = created.budget.id, "Budget created");
        Ok(created.budget)
    }
}

#[async_trait]
impl DashboardApi for ApiClient {
    async fn fetch_budgets(&self, token: &str) -> Result<Vec<Budget>> {
        let response: BudgetsResponse = self.get("/budgets", token).await?;
        Ok(response.budgets.unwrap_or_default())
    }

    async fn fetch_categories(&self, token: &str) -> Result<Vec<Category>> {
        let response: CategoriesResponse = self.get("/categories", token).await?;
        Ok(response.categories.unwrap_or_default())
    }

    async fn fetch_transactions(&self, token: &str) -> Result<Vec<Transaction>> {
        let response: TransactionsResponse = self.get("/transactions", token).await?;
        Ok(response.transactions.unwrap_or_default())
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            identifier,
            password,
        };
        self.post("/auth/login", None, &body)
            .await
            .context("Failed to authenticate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = ApiClient::new("http://localhost:8080/api/v1/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:8080/api/v1");
        assert_eq!(api.url("/budgets"), "http://localhost:8080/api/v1/budgets");
    }

    #[test]
    fn test_parse_collection_responses() {
        let json = r#"{"budgets": [{"ID": 1, "CategoryID": null, "LimitAmount": 50,
            "RemainingAmount": 50, "StartDate": "2025-01-01T00:00:00Z",
            "EndDate": "2025-01-31T00:00:00Z"}]}"#;
        let parsed: BudgetsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.budgets.unwrap().len(), 1);

        // Go marshals an empty slice that was never allocated as null
        let parsed: TransactionsResponse = serde_json::from_str(r#"{"transactions": null}"#).unwrap();
        assert!(parsed.transactions.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_parse_created_category() {
        let json = r#"{"message": "Category created successfully",
            "category": {"ID": 9, "UserID": 1, "Name": "Travel"}}"#;
        let parsed: CategoryCreated = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.category.name, "Travel");
    }

    #[test]
    fn test_parse_login_response() {
        let parsed: LoginResponse =
            serde_json::from_str(r#"{"message": "Login successful", "token": "eyJ.abc"}"#).unwrap();
        assert_eq!(parsed.token, "eyJ.abc");
        assert_eq!(parsed.message.as_deref(), Some("Login successful"));
    }

    #[test]
    fn test_reset_password_request_wire_names() {
        let body = ResetPasswordRequest {
            identifier: "alice@example.com",
            new_password: "newpass1",
            confirm_password: "newpass1",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "identifier": "alice@example.com",
                "newPassword": "newpass1",
                "confirmPassword": "newpass1"
            })
        );
    }

    #[test]
    fn test_parse_profile() {
        let parsed: Profile = serde_json::from_str(
            r#"{"message": "Protected route accessed successfully", "userID": 7}"#,
        )
        .unwrap();
        assert_eq!(parsed.user_id, 7);
        assert_eq!(parsed.message.as_deref(), Some("Protected route accessed successfully"));

        let bare: Profile = serde_json::from_str(r#"{"userID": 3}"#).unwrap();
        assert!(bare.message.is_none());
    }

    #[test]
    fn test_login_request_wire_names() {
        let body = LoginRequest { identifier: "alice", password: "secret1" };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"identifier": "alice", "password": "secret1"})
        );
    }
}
