//! Data models for FinTrack entities.
//!
//! Field names follow the backend's JSON, which serializes the Go model
//! structs with their PascalCase field names:
//!
//! - `Budget`: spending limit over a date range, optionally per category
//! - `Category`: user-defined label, unique by case-insensitive name
//! - `Transaction`: a single expense
//! - `DashboardSnapshot`: the three collections cached for the session
//!
//! The `New*` types are request bodies for the create endpoints.

pub mod budget;
pub mod category;
pub mod dashboard;
pub mod transaction;

pub use budget::{Budget, NewBudget};
pub use category::{is_uncategorized_name, Category, NewCategory, OTHER_CATEGORY};
pub use dashboard::{CategorySpending, DashboardSnapshot, UNCATEGORIZED};
pub use transaction::{NewTransaction, Transaction};
