// ============================================================================
// Sync Store
// ============================================================================
//
// Explicit, dependency-injected container for the synchronized slices:
//
// - auth identity  (persisted)
// - profile        (persisted, TTL-gated)
// - connections    (never persisted, TTL-gated)
//
// Commands live in `connections.rs` and `profile.rs`; session init/teardown
// in `session.rs`. Locks are never held across a transport call. Session
// writes and sign-out take `session_guard`, so a late write cannot restore
// a session that was already torn down.
//
// ============================================================================

pub mod connections;
pub mod profile;
pub mod session;
pub mod state;

pub use state::{CollectionStatus, ConnectionsState, ProfileState};

use crate::config::SyncConfig;
use crate::core::{Clock, Result, SyncError, SystemClock};
use crate::model::AuthIdentity;
use crate::persist::{FileSessionStorage, SessionPersistence, SessionStorage};
use crate::transport::{ConnectionTransport, ProfileRepository};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Result of a gated refresh command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The collaborator was called and its answer reconciled
    Fetched(usize),
    /// The cache is within its TTL; no call was made
    Fresh,
    /// Nobody is signed in; no call was made
    Unauthenticated,
    /// The answer arrived after a newer one and was dropped
    Superseded,
}

impl FetchOutcome {
    pub fn hit_network(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_) | FetchOutcome::Superseded)
    }
}

pub struct SyncStore {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    connection_transport: Arc<dyn ConnectionTransport>,
    profile_repository: Arc<dyn ProfileRepository>,
    persistence: Option<SessionPersistence>,
    /// Serializes snapshot writes with sign-out
    session_guard: Mutex<()>,
    auth: RwLock<Option<AuthIdentity>>,
    connections: RwLock<ConnectionsState>,
    profile: RwLock<ProfileState>,
}

impl SyncStore {
    pub fn builder(
        connection_transport: Arc<dyn ConnectionTransport>,
        profile_repository: Arc<dyn ProfileRepository>,
    ) -> SyncStoreBuilder {
        SyncStoreBuilder {
            config: SyncConfig::default(),
            clock: Arc::new(SystemClock),
            connection_transport,
            profile_repository,
            session_storage: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the connection slice for selectors
    pub async fn connections(&self) -> ConnectionsState {
        self.connections.read().await.clone()
    }

    /// Snapshot of the profile slice for selectors
    pub async fn profile(&self) -> ProfileState {
        self.profile.read().await.clone()
    }
}

pub struct SyncStoreBuilder {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    connection_transport: Arc<dyn ConnectionTransport>,
    profile_repository: Arc<dyn ProfileRepository>,
    session_storage: Option<Arc<dyn SessionStorage>>,
}

impl SyncStoreBuilder {
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist the session here instead of `config.session_dir`
    pub fn session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    pub fn build(self) -> Result<SyncStore> {
        self.config.validate().map_err(SyncError::Config)?;

        let storage: Option<Arc<dyn SessionStorage>> =
            match (self.session_storage, &self.config.session_dir) {
                (Some(storage), _) => Some(storage),
                (None, Some(dir)) => Some(Arc::new(FileSessionStorage::new(dir)?)),
                (None, None) => None,
            };
        let persistence = storage
            .map(|storage| SessionPersistence::new(storage, self.config.session_key.clone()));

        Ok(SyncStore {
            config: self.config,
            clock: self.clock,
            connection_transport: self.connection_transport,
            profile_repository: self.profile_repository,
            persistence,
            session_guard: Mutex::new(()),
            auth: RwLock::new(None),
            connections: RwLock::new(ConnectionsState::default()),
            profile: RwLock::new(ProfileState::default()),
        })
    }
}
