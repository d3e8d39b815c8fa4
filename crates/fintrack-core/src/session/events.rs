use chrono::{DateTime, Utc};

use super::SessionError;

/// Change notifications broadcast by the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// `initialize` finished; `authenticated` tells whether a session was restored.
    Initialized { authenticated: bool },
    LoggedIn { username: Option<String> },
    LoggedOut,
    /// A refresh replaced the dashboard snapshot.
    SnapshotUpdated { cached_at: DateTime<Utc> },
    /// A refresh failed and the previous snapshot was kept.
    RefreshFailed(SessionError),
    /// A corrupt persisted entry was discarded.
    StorageRecovered(SessionError),
}

/// Result of a refresh that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No session, nothing fetched.
    Skipped,
    /// The fetched collections are now the current snapshot.
    Applied,
    /// Fetched, but a newer refresh or a session change got there first.
    Superseded,
}
