//! Seams between the session layer and the remote API.
//!
//! `ApiClient` implements both traits against the real backend; tests
//! substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Budget, Category, Transaction};

/// Fetch-by-token access to the three dashboard collections.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn fetch_budgets(&self, token: &str) -> Result<Vec<Budget>>;

    async fn fetch_categories(&self, token: &str) -> Result<Vec<Category>>;

    async fn fetch_transactions(&self, token: &str) -> Result<Vec<Transaction>>;
}

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Credential exchange for a bearer token.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `identifier` is a username or email address.
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse>;
}
