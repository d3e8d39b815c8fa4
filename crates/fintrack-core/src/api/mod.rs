//! REST API client module for the FinTrack backend.
//!
//! This module provides the `ApiClient` for authenticating against the
//! backend and for reading and mutating budgets, categories and
//! transactions.
//!
//! Protected endpoints take a JWT bearer token obtained from
//! `POST /auth/login`.

pub mod client;
pub mod error;
pub mod traits;

pub use client::{ApiClient, Profile, DEFAULT_API_BASE_URL};
pub use error::ApiError;
pub use traits::{AuthApi, DashboardApi, LoginResponse};
