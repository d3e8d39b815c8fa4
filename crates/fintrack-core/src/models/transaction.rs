use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "CategoryID", default)]
    pub category_id: Option<u64>,
    #[serde(rename = "TransactionDate")]
    pub transaction_date: DateTime<Utc>,
}

/// Body for `POST /transactions`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub category_id: Option<u64>,
    pub amount: f64,
    pub description: String,
    /// `YYYY-MM-DD`
    pub transaction_date: String,
}
