//! Client-side session and dashboard cache.
//!
//! [`SessionManager`] is the single owner of the login state and of the
//! dashboard snapshot derived from it. Callers observe changes through
//! accessors or by subscribing to [`SessionEvent`]s.

pub mod error;
pub mod events;
pub mod manager;

pub use error::SessionError;
pub use events::{RefreshOutcome, SessionEvent};
pub use manager::SessionManager;
