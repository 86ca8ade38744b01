// ============================================================================
// chaptersync Library
// ============================================================================
//
// Client-side entity synchronization for a chapter directory: normalized
// caches for the connection graph and the signed-in user's profile, with
// freshness gating, ordered reconciliation of command results, and the
// connection lifecycle state machine.
//
// ============================================================================

pub mod config;
pub mod core;
pub mod freshness;
pub mod lifecycle;
pub mod model;
pub mod persist;
pub mod selectors;
pub mod storage;
pub mod store;
pub mod transport;

// Re-export main types for convenience
pub use config::SyncConfig;
pub use crate::core::{
    Clock, ConnectionId, ManualClock, Result, SyncError, SystemClock, UserId,
};
pub use freshness::{DEFAULT_TTL, should_fetch};
pub use lifecycle::{ActorRole, ConnectionStatus, TransitionRefusal, ViewerStatus};
pub use model::{
    AuthIdentity, Connection, NewConnectionRequest, Profile, ProfileField, ProfileRole,
    ProfileSummary, ProfileUpdate,
};
pub use persist::{FileSessionStorage, MemorySessionStorage, PersistedSession, SessionStorage};
pub use storage::{Entity, EntityTable};
pub use store::{CollectionStatus, ConnectionsState, FetchOutcome, ProfileState, SyncStore};
pub use transport::{
    CallCount, ConnectionTransport, HttpTransport, InMemoryBackend, ListHold, ProfileRepository,
    TransportError,
};
