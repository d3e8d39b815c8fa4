//! Session/cache manager.
//!
//! Owns the authenticated identity, persists it to durable storage, and
//! keeps the dashboard snapshot (budgets, categories, transactions) cached
//! in memory and in volatile storage.
//!
//! Lifecycle: [`SessionManager::new`] → [`initialize`](SessionManager::initialize)
//! → operations → [`dispose`](SessionManager::dispose). Clones share state.
//!
//! The snapshot is only ever populated while a session exists. Every write
//! to the `user`, `dashboardData` and `theme` keys goes through here so that
//! logout can clear them together.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{AuthApi, DashboardApi};
use crate::auth::SessionData;
use crate::models::{Budget, Category, DashboardSnapshot, Transaction};
use crate::storage::{CachedData, KeyValueStore};

use super::{RefreshOutcome, SessionError, SessionEvent};

// ============================================================================
// Constants
// ============================================================================

/// Durable key holding the serialized `SessionData`.
const USER_KEY: &str = "user";

/// Volatile key holding the last snapshot as `CachedData<OwnedSnapshot>`.
const DASHBOARD_KEY: &str = "dashboardData";

/// Display preference, cleared on logout with everything else.
const THEME_KEY: &str = "theme";

const ALL_KEYS: [&str; 3] = [USER_KEY, DASHBOARD_KEY, THEME_KEY];

/// Buffer size for the event broadcast channel.
/// Slow subscribers miss old events rather than block the manager.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Persisted form of the snapshot, stamped with the session it was fetched
/// for. An entry without a matching owner is never adopted.
#[derive(Debug, Serialize, Deserialize)]
struct OwnedSnapshot {
    #[serde(default)]
    owner: Option<String>,
    #[serde(flatten)]
    snapshot: DashboardSnapshot,
}

#[derive(Serialize)]
struct OwnedSnapshotRef<'a> {
    owner: &'a str,
    #[serde(flatten)]
    snapshot: &'a DashboardSnapshot,
}

struct SessionState {
    user: Option<SessionData>,
    snapshot: Arc<DashboardSnapshot>,
    snapshot_cached_at: Option<DateTime<Utc>>,
    initialized: bool,
    last_refresh_error: Option<SessionError>,
    /// Bumped whenever the session identity changes; refreshes started
    /// under an older epoch are never applied.
    epoch: u64,
    /// Generation of the refresh that produced `snapshot` (0 = none).
    committed_generation: u64,
}

impl SessionState {
    fn clear_snapshot(&mut self) {
        self.snapshot = Arc::new(DashboardSnapshot::default());
        self.snapshot_cached_at = None;
    }
}

struct Inner {
    api: Arc<dyn DashboardApi>,
    durable: Arc<dyn KeyValueStore>,
    volatile: Arc<dyn KeyValueStore>,
    state: RwLock<SessionState>,
    next_generation: AtomicU64,
    background: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

/// Handle to the session and its cached dashboard data.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        durable: Arc<dyn KeyValueStore>,
        volatile: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                api,
                durable,
                volatile,
                state: RwLock::new(SessionState {
                    user: None,
                    snapshot: Arc::new(DashboardSnapshot::default()),
                    snapshot_cached_at: None,
                    initialized: false,
                    last_refresh_error: None,
                    epoch: 0,
                    committed_generation: 0,
                }),
                next_generation: AtomicU64::new(0),
                background: Mutex::new(None),
                disposed: AtomicBool::new(false),
                events,
            }),
        }
    }

    // The lock is never held across an await, so a poisoned lock only
    // means a panic elsewhere; the state itself is still consistent.
    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn background(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.background.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn user(&self) -> Option<SessionData> {
        self.read_state().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read_state().user.as_ref().map(|u| u.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().user.is_some()
    }

    /// False until `initialize` has checked storage for a session.
    pub fn is_initialized(&self) -> bool {
        self.read_state().initialized
    }

    /// The current snapshot. Refreshes swap the whole `Arc`, so a snapshot
    /// obtained here is never partially updated.
    pub fn dashboard_data(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&self.read_state().snapshot)
    }

    /// Capture time of the current snapshot, if it came from a fetch.
    pub fn snapshot_cached_at(&self) -> Option<DateTime<Utc>> {
        self.read_state().snapshot_cached_at
    }

    /// Error of the most recent failed refresh, cleared by the next success.
    pub fn last_refresh_error(&self) -> Option<SessionError> {
        self.read_state().last_refresh_error.clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restore a persisted session and its cached snapshot, then start a
    /// background refresh. Runs once; later calls do nothing. Corrupt
    /// storage is discarded, never reported as an error.
    pub fn initialize(&self) {
        let authenticated = {
            let mut state = self.write_state();
            if state.initialized {
                debug!("Session manager already initialized");
                return;
            }

            let session = self.load_persisted_session();
            match session {
                Some(session) => {
                    if let Some(cached) = self.load_cached_snapshot(&session) {
                        debug!(cached_at = %cached.cached_at, "Adopted cached dashboard snapshot");
                        state.snapshot_cached_at = Some(cached.cached_at);
                        state.snapshot = Arc::new(cached.data);
                    }
                    debug!(username = session.display_name(), "Restored persisted session");
                    state.user = Some(session);
                }
                None => {
                    // A snapshot must not outlive its session
                    self.remove_entry(&*self.inner.volatile, DASHBOARD_KEY);
                }
            }

            state.epoch += 1;
            state.initialized = true;
            state.user.is_some()
        };

        info!(authenticated, "Session manager initialized");
        self.emit(SessionEvent::Initialized { authenticated });

        if authenticated {
            self.spawn_background_refresh();
        }
    }

    /// Stop background work. The manager stays readable, but no further
    /// background refreshes are started.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.background().take() {
            handle.abort();
        }
        debug!("Session manager disposed");
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Adopt `session` as the current login and persist it.
    ///
    /// A session without a token is rejected and nothing changes. The
    /// dashboard refresh runs in the background; await
    /// [`wait_for_background_refresh`](Self::wait_for_background_refresh) or
    /// call [`refresh_dashboard_data`](Self::refresh_dashboard_data) when
    /// fresh data is needed right away.
    pub fn login(&self, session: SessionData) -> Result<(), SessionError> {
        if !session.has_token() {
            error!(username = ?session.username, "Invalid session data for login: missing token");
            return Err(SessionError::InvalidSessionInput(
                "session data has no token".to_string(),
            ));
        }

        {
            let mut state = self.write_state();
            let identity_changed = state
                .user
                .as_ref()
                .map_or(true, |current| current.is_different_identity(&session));

            if identity_changed {
                state.epoch += 1;
                state.last_refresh_error = None;
                if state.snapshot_cached_at.is_some() || !state.snapshot.is_empty() {
                    debug!("Identity changed, dropping previous snapshot");
                    state.clear_snapshot();
                    self.remove_entry(&*self.inner.volatile, DASHBOARD_KEY);
                }
            }

            self.persist_session(&session);
            state.user = Some(session.clone());
        }

        info!(username = session.display_name(), "Logged in");
        self.emit(SessionEvent::LoggedIn {
            username: session.username,
        });
        self.spawn_background_refresh();
        Ok(())
    }

    /// Exchange credentials for a token via `auth`, then [`login`](Self::login).
    pub async fn authenticate<A>(
        &self,
        auth: &A,
        identifier: &str,
        password: &str,
    ) -> Result<SessionData, SessionError>
    where
        A: AuthApi + ?Sized,
    {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(SessionError::AuthenticationFailed(
                "username and password required".to_string(),
            ));
        }

        let response = auth.login(identifier, password).await.map_err(|e| {
            warn!(identifier, error = %e, "Login request failed");
            SessionError::AuthenticationFailed(format!("{:#}", e))
        })?;

        let mut extra = Map::new();
        if let Some(message) = response.message {
            extra.insert("message".to_string(), Value::String(message));
        }
        let session = SessionData {
            token: response.token,
            username: Some(identifier.to_string()),
            extra,
        };

        self.login(session.clone())?;
        Ok(session)
    }

    /// End the session: clears the user and the snapshot together and
    /// removes every session key from both stores. Safe to call repeatedly.
    pub fn logout(&self) {
        let previous = {
            let mut state = self.write_state();
            let previous = state.user.take();
            state.clear_snapshot();
            state.last_refresh_error = None;
            state.epoch += 1;

            for key in ALL_KEYS {
                self.remove_entry(&*self.inner.durable, key);
                self.remove_entry(&*self.inner.volatile, key);
            }
            previous
        };

        // The epoch bump already prevents it from applying; stop the fetches too
        if let Some(handle) = self.background().take() {
            handle.abort();
        }

        if let Some(previous) = previous {
            info!(username = previous.display_name(), "Logged out");
            self.emit(SessionEvent::LoggedOut);
        } else {
            debug!("Logout without an active session");
        }
    }

    // =========================================================================
    // Dashboard refresh
    // =========================================================================

    /// Fetch budgets, categories and transactions concurrently and replace
    /// the snapshot with the result.
    ///
    /// Without a session this returns `Skipped` and fetches nothing. If any
    /// fetch fails the previous snapshot is kept and the error returned.
    /// A result is dropped (`Superseded`) when a refresh started later has
    /// already been applied, or when the session changed meanwhile.
    pub async fn refresh_dashboard_data(&self) -> Result<RefreshOutcome, SessionError> {
        let (token, epoch) = {
            let state = self.read_state();
            match state.user.as_ref() {
                Some(user) => (user.token.clone(), state.epoch),
                None => {
                    debug!("No session, skipping dashboard refresh");
                    return Ok(RefreshOutcome::Skipped);
                }
            }
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "Refreshing dashboard data");

        let api = &self.inner.api;
        let (budgets, categories, transactions) = tokio::join!(
            api.fetch_budgets(&token),
            api.fetch_categories(&token),
            api.fetch_transactions(&token),
        );

        match Self::collect_snapshot(budgets, categories, transactions) {
            Ok(snapshot) => Ok(self.commit_snapshot(snapshot, epoch, generation)),
            Err(e) => {
                self.record_refresh_failure(&e, epoch, generation);
                Err(e)
            }
        }
    }

    fn collect_snapshot(
        budgets: Result<Vec<Budget>>,
        categories: Result<Vec<Category>>,
        transactions: Result<Vec<Transaction>>,
    ) -> Result<DashboardSnapshot, SessionError> {
        let budgets = budgets.map_err(|e| SessionError::refresh_failed("budgets", &e))?;
        let categories = categories.map_err(|e| SessionError::refresh_failed("categories", &e))?;
        let transactions =
            transactions.map_err(|e| SessionError::refresh_failed("transactions", &e))?;
        Ok(DashboardSnapshot::new(budgets, categories, transactions))
    }

    fn commit_snapshot(
        &self,
        snapshot: DashboardSnapshot,
        epoch: u64,
        generation: u64,
    ) -> RefreshOutcome {
        let cached_at = {
            let mut state = self.write_state();
            if state.epoch != epoch || state.user.is_none() {
                debug!(generation, "Session changed during refresh, discarding result");
                return RefreshOutcome::Superseded;
            }
            if generation < state.committed_generation {
                debug!(
                    generation,
                    committed = state.committed_generation,
                    "Newer refresh already applied, discarding result"
                );
                return RefreshOutcome::Superseded;
            }

            let owner = state.user.as_ref().map(SessionData::cache_owner).unwrap_or_default();
            let cached = CachedData::new(snapshot);
            self.save_cached_snapshot(&owner, &cached);

            info!(
                budgets = cached.data.budgets.len(),
                categories = cached.data.categories.len(),
                transactions = cached.data.transactions.len(),
                generation,
                "Dashboard data refreshed"
            );

            state.snapshot_cached_at = Some(cached.cached_at);
            state.snapshot = Arc::new(cached.data);
            state.committed_generation = generation;
            state.last_refresh_error = None;
            cached.cached_at
        };

        self.emit(SessionEvent::SnapshotUpdated { cached_at });
        RefreshOutcome::Applied
    }

    fn record_refresh_failure(&self, err: &SessionError, epoch: u64, generation: u64) {
        warn!(error = %err, generation, "Dashboard refresh failed");

        let relevant = {
            let mut state = self.write_state();
            let relevant = state.epoch == epoch && generation > state.committed_generation;
            if relevant {
                state.last_refresh_error = Some(err.clone());
            }
            relevant
        };

        if relevant {
            self.emit(SessionEvent::RefreshFailed(err.clone()));
        }
    }

    /// Run a refresh on the runtime without waiting for it. Failures end up
    /// in `last_refresh_error` and as `SessionEvent::RefreshFailed`.
    fn spawn_background_refresh(&self) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            debug!("Manager disposed, not starting background refresh");
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime available, skipping background refresh");
                return;
            }
        };

        let manager = self.clone();
        let handle = runtime.spawn(async move {
            match manager.refresh_dashboard_data().await {
                Ok(outcome) => debug!(?outcome, "Background refresh finished"),
                Err(e) => error!(error = %e, "Failed to prefetch dashboard data"),
            }
        });

        // An earlier background refresh keeps running detached; generation
        // tagging decides which result sticks.
        *self.background() = Some(handle);
    }

    /// Wait for the most recently started background refresh, if any.
    pub async fn wait_for_background_refresh(&self) {
        let handle = self.background().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Background refresh task panicked");
                }
            }
        }
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    pub fn theme(&self) -> Option<String> {
        let raw = match self.inner.durable.get(THEME_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read theme preference");
                return None;
            }
        };
        match serde_json::from_str::<String>(&raw) {
            Ok(theme) => Some(theme),
            Err(e) => {
                self.recover_corrupt(&*self.inner.durable, THEME_KEY, e.to_string());
                None
            }
        }
    }

    pub fn set_theme(&self, theme: &str) -> Result<()> {
        let value = serde_json::to_string(theme)?;
        self.inner
            .durable
            .set(THEME_KEY, &value)
            .context("Failed to save theme preference")
    }

    // =========================================================================
    // Storage helpers
    // =========================================================================

    fn load_persisted_session(&self) -> Option<SessionData> {
        let raw = match self.inner.durable.get(USER_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                return None;
            }
        };

        match serde_json::from_str::<SessionData>(&raw) {
            Ok(session) if session.has_token() => Some(session),
            Ok(_) => {
                self.recover_corrupt(&*self.inner.durable, USER_KEY, "session has no token".to_string());
                None
            }
            Err(e) => {
                self.recover_corrupt(&*self.inner.durable, USER_KEY, e.to_string());
                None
            }
        }
    }

    fn persist_session(&self, session: &SessionData) {
        let result = serde_json::to_string(session)
            .context("Failed to serialize session")
            .and_then(|json| self.inner.durable.set(USER_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to save session");
        }
    }

    fn load_cached_snapshot(&self, session: &SessionData) -> Option<CachedData<DashboardSnapshot>> {
        let raw = match self.inner.volatile.get(DASHBOARD_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read cached dashboard data");
                return None;
            }
        };

        let cached: CachedData<OwnedSnapshot> = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                self.recover_corrupt(&*self.inner.volatile, DASHBOARD_KEY, e.to_string());
                return None;
            }
        };

        let expected = session.cache_owner();
        if cached.data.owner.as_deref() != Some(expected.as_str()) {
            warn!(
                owner = ?cached.data.owner,
                username = session.display_name(),
                "Cached dashboard data belongs to another session, discarding"
            );
            self.remove_entry(&*self.inner.volatile, DASHBOARD_KEY);
            return None;
        }

        Some(CachedData {
            data: cached.data.snapshot,
            cached_at: cached.cached_at,
        })
    }

    fn save_cached_snapshot(&self, owner: &str, cached: &CachedData<DashboardSnapshot>) {
        let stamped = CachedData {
            data: OwnedSnapshotRef {
                owner,
                snapshot: &cached.data,
            },
            cached_at: cached.cached_at,
        };
        let result = serde_json::to_string(&stamped)
            .context("Failed to serialize dashboard data")
            .and_then(|json| self.inner.volatile.set(DASHBOARD_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to cache dashboard data");
        }
    }

    fn remove_entry(&self, store: &dyn KeyValueStore, key: &str) {
        if let Err(e) = store.remove(key) {
            warn!(key, error = %e, "Failed to remove storage entry");
        }
    }

    fn recover_corrupt(&self, store: &dyn KeyValueStore, key: &'static str, message: String) {
        let err = SessionError::StorageCorrupt { key, message };
        warn!(error = %err, "Discarding corrupt storage entry");
        self.remove_entry(store, key);
        self.emit(SessionEvent::StorageRecovered(err));
    }
}

// ============================================================================
// Tests
// ============================================================================
