use serde::{Deserialize, Serialize};

use super::category::OTHER_CATEGORY;
use super::{Budget, Category, Transaction};

/// Label used for transactions with no (or an unknown) category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The three dashboard collections for the current session.
///
/// Always replaced wholesale by a refresh, never merged field by field.
/// Missing collections in persisted JSON read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(default)]
    pub budgets: Vec<Budget>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Total spending for one category label.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySpending {
    pub label: String,
    pub total: f64,
}

impl DashboardSnapshot {
    pub fn new(budgets: Vec<Budget>, categories: Vec<Category>, transactions: Vec<Transaction>) -> Self {
        Self {
            budgets,
            categories,
            transactions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty() && self.categories.is_empty() && self.transactions.is_empty()
    }

    pub fn category(&self, id: u64) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Case-insensitive lookup by name.
    pub fn find_category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.matches_name(name))
    }

    fn category_label(&self, id: Option<u64>, fallback: &str) -> String {
        id.and_then(|id| self.category(id))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn total_expenses(&self) -> f64 {
        self.transactions.iter().map(|tx| tx.amount).sum()
    }

    /// Spending grouped by category, in order of first appearance.
    pub fn spending_by_category(&self) -> Vec<CategorySpending> {
        let mut totals: Vec<(Option<u64>, f64)> = Vec::new();
        for tx in &self.transactions {
            // Unknown ids fold into the uncategorized bucket
            let key = tx.category_id.filter(|id| self.category(*id).is_some());
            match totals.iter_mut().find(|(k, _)| *k == key) {
                Some((_, total)) => *total += tx.amount,
                None => totals.push((key, tx.amount)),
            }
        }

        totals
            .into_iter()
            .map(|(id, total)| CategorySpending {
                label: self.category_label(id, UNCATEGORIZED),
                total,
            })
            .collect()
    }

    /// Newest `limit` transactions by date.
    pub fn recent_transactions(&self, limit: usize) -> Vec<&Transaction> {
        let mut txs: Vec<&Transaction> = self.transactions.iter().collect();
        txs.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        txs.truncate(limit);
        txs
    }

    /// Budgets with their category label, ordered by label.
    pub fn sorted_budgets(&self) -> Vec<(String, &Budget)> {
        let mut budgets: Vec<(String, &Budget)> = self
            .budgets
            .iter()
            .map(|b| (self.category_label(b.category_id, OTHER_CATEGORY), b))
            .collect();
        budgets.sort_by(|(a, _), (b, _)| crate::utils::cmp_ignore_case(a, b));
        budgets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64, amount: f64, category_id: Option<u64>, date: &str) -> Transaction {
        Transaction {
            id,
            description: format!("tx {}", id),
            amount,
            category_id,
            transaction_date: format!("{}T00:00:00Z", date).parse().unwrap(),
        }
    }

    fn cat(id: u64, name: &str) -> Category {
        Category { id, name: name.to_string() }
    }

    fn budget(id: u64, category_id: Option<u64>) -> Budget {
        Budget {
            id,
            category_id,
            limit_amount: 100.0,
            remaining_amount: 100.0,
            start_date: "2025-01-01T00:00:00Z".parse().unwrap(),
            end_date: "2025-01-31T00:00:00Z".parse().unwrap(),
        }
    }

    fn sample() -> DashboardSnapshot {
        DashboardSnapshot::new(
            vec![budget(1, Some(2)), budget(2, None), budget(3, Some(1))],
            vec![cat(1, "rent"), cat(2, "Food")],
            vec![
                tx(1, 10.0, Some(2), "2025-01-03"),
                tx(2, 5.5, None, "2025-01-09"),
                tx(3, 800.0, Some(1), "2025-01-01"),
                tx(4, 4.5, Some(2), "2025-01-10"),
                tx(5, 1.0, Some(99), "2025-01-05"),
            ],
        )
    }

    #[test]
    fn test_default_is_empty_aggregate() {
        let s = DashboardSnapshot::default();
        assert!(s.is_empty());
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            serde_json::json!({"budgets": [], "categories": [], "transactions": []})
        );
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let s: DashboardSnapshot =
            serde_json::from_str(r#"{"categories":[{"ID":1,"Name":"Fun"}]}"#).unwrap();
        assert!(s.budgets.is_empty());
        assert!(s.transactions.is_empty());
        assert_eq!(s.categories.len(), 1);
    }

    #[test]
    fn test_total_expenses() {
        assert_eq!(sample().total_expenses(), 821.0);
        assert_eq!(DashboardSnapshot::default().total_expenses(), 0.0);
    }

    #[test]
    fn test_spending_by_category_groups_in_first_seen_order() {
        let spending = sample().spending_by_category();
        assert_eq!(
            spending,
            vec![
                CategorySpending { label: "Food".to_string(), total: 14.5 },
                CategorySpending { label: UNCATEGORIZED.to_string(), total: 6.5 },
                CategorySpending { label: "rent".to_string(), total: 800.0 },
            ]
        );
    }

    #[test]
    fn test_recent_transactions_newest_first() {
        let s = sample();
        let ids: Vec<u64> = s.recent_transactions(3).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 2, 5]);
        assert_eq!(s.recent_transactions(50).len(), 5);
    }

    #[test]
    fn test_sorted_budgets_by_label() {
        let s = sample();
        let labels: Vec<String> = s.sorted_budgets().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["Food", "Other", "rent"]);
    }

    #[test]
    fn test_find_category_case_insensitive() {
        let s = sample();
        assert_eq!(s.find_category("FOOD").map(|c| c.id), Some(2));
        assert!(s.find_category("travel").is_none());
    }
}
