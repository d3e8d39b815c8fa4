//! FinTrack core - session handling, dashboard cache and API client for the
//! FinTrack personal finance backend.
//!
//! The entry point is [`SessionManager`]: build it over an API client and two
//! key-value stores, call `initialize`, then log in and read the cached
//! dashboard snapshot.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError, AuthApi, DashboardApi};
pub use auth::SessionData;
pub use config::Config;
pub use models::DashboardSnapshot;
pub use session::{RefreshOutcome, SessionError, SessionEvent, SessionManager};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
