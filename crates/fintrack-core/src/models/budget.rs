use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A spending limit over a date range.
///
/// A budget with no category is global ("Other" in listings).
/// `RemainingAmount` is computed by the server from the transactions
/// that fall inside the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "CategoryID", default)]
    pub category_id: Option<u64>,
    #[serde(rename = "LimitAmount")]
    pub limit_amount: f64,
    #[serde(rename = "RemainingAmount", default)]
    pub remaining_amount: f64,
    #[serde(rename = "StartDate")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "EndDate")]
    pub end_date: DateTime<Utc>,
}

impl Budget {
    /// Amount already spent against the limit.
    pub fn spent(&self) -> f64 {
        self.limit_amount - self.remaining_amount
    }

    pub fn is_over_limit(&self) -> bool {
        self.remaining_amount < 0.0
    }

    /// Fraction of the limit used, clamped to 0..=1 for progress bars.
    pub fn usage_ratio(&self) -> f64 {
        if self.limit_amount <= 0.0 {
            return 0.0;
        }
        (self.spent() / self.limit_amount).clamp(0.0, 1.0)
    }

    pub fn period_display(&self) -> String {
        format!(
            "{} - {}",
            self.start_date.format("%b %d, %Y"),
            self.end_date.format("%b %d, %Y")
        )
    }
}

/// Body for `POST /budgets`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBudget {
    pub category_id: Option<u64>,
    pub limit_amount: f64,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(limit: f64, remaining: f64) -> Budget {
        Budget {
            id: 1,
            category_id: None,
            limit_amount: limit,
            remaining_amount: remaining,
            start_date: "2025-01-01T00:00:00Z".parse().unwrap(),
            end_date: "2025-01-31T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_parse_server_budget() {
        let json = r#"{
            "ID": 7,
            "UserID": 3,
            "CategoryID": 2,
            "LimitAmount": 500,
            "RemainingAmount": 125.5,
            "StartDate": "2025-03-01T00:00:00Z",
            "EndDate": "2025-03-31T00:00:00Z",
            "CreatedAt": "2025-03-01T10:00:00.123-05:00",
            "DeletedAt": null
        }"#;
        let b: Budget = serde_json::from_str(json).unwrap();
        assert_eq!(b.id, 7);
        assert_eq!(b.category_id, Some(2));
        assert_eq!(b.limit_amount, 500.0);
        assert_eq!(b.spent(), 374.5);
    }

    #[test]
    fn test_global_budget_has_no_category() {
        let json = r#"{"ID":1,"CategoryID":null,"LimitAmount":100,
            "StartDate":"2025-01-01T00:00:00Z","EndDate":"2025-01-31T00:00:00Z"}"#;
        let b: Budget = serde_json::from_str(json).unwrap();
        assert_eq!(b.category_id, None);
        assert_eq!(b.remaining_amount, 0.0);
    }

    #[test]
    fn test_usage_ratio() {
        assert_eq!(budget(200.0, 150.0).usage_ratio(), 0.25);
        assert_eq!(budget(200.0, -50.0).usage_ratio(), 1.0);
        assert_eq!(budget(0.0, 0.0).usage_ratio(), 0.0);
        assert!(budget(200.0, -0.01).is_over_limit());
        assert!(!budget(200.0, 0.0).is_over_limit());
    }

    #[test]
    fn test_period_display() {
        assert_eq!(budget(1.0, 1.0).period_display(), "Jan 01, 2025 - Jan 31, 2025");
    }

    #[test]
    fn test_new_budget_wire_names() {
        let body = NewBudget {
            category_id: None,
            limit_amount: 300.0,
            start_date: "2025-04-01".to_string(),
            end_date: "2025-04-30".to_string(),
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["limitAmount"], 300.0);
        assert_eq!(v["startDate"], "2025-04-01");
        assert!(v["categoryId"].is_null());
    }
}
