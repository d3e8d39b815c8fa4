//! Authentication types.
//!
//! This module provides:
//! - `SessionData`: the bearer token and identity of a login
//! - `CredentialStore`: optional remembered passwords via the OS keyring
//!
//! Persisting and clearing a session is the job of
//! [`SessionManager`](crate::session::SessionManager).

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::SessionData;
