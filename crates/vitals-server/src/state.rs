//! Shared application state.

use std::sync::Arc;
use vitals_common_async::{RetryPolicy, ShutdownHandle};
use vitals_core::MetricStore;
use vitals_database::DatabaseStore;
use vitals_storage::MemoryStore;

/// The configured storage backend.
///
/// A tagged variant rather than a bare trait object so the router can probe
/// optional capabilities (the `/ping` route exists only for the relational
/// backend) at build time.
#[derive(Clone)]
pub enum Store {
    Memory(Arc<MemoryStore>),
    Database(Arc<DatabaseStore>),
}

impl Store {
    /// The common capability set.
    pub fn metrics(&self) -> &dyn MetricStore {
        match self {
            Self::Memory(store) => store.as_ref(),
            Self::Database(store) => store.as_ref(),
        }
    }

    /// The relational backend, when that is what's configured.
    pub fn database(&self) -> Option<&Arc<DatabaseStore>> {
        match self {
            Self::Database(store) => Some(store),
            Self::Memory(_) => None,
        }
    }
}

/// State shared by every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend.
    pub store: Store,
    /// HMAC key for request verification and response signing.
    pub key: String,
    /// Whether mutations should publish update notifications (synchronous
    /// snapshot mode).
    pub notify_on_update: bool,
    /// Policy for the server-side retry middleware.
    pub retry_policy: RetryPolicy,
    /// Root cancellation token.
    pub shutdown: ShutdownHandle,
}

impl AppState {
    /// Create state over an in-memory store with default wiring, used by
    /// tests.
    pub fn for_memory(store: Arc<MemoryStore>, key: impl Into<String>, notify: bool) -> Self {
        Self {
            store: Store::Memory(store),
            key: key.into(),
            notify_on_update: notify,
            retry_policy: RetryPolicy::default(),
            shutdown: ShutdownHandle::new(),
        }
    }
}
