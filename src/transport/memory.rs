use super::{ConnectionTransport, ProfileRepository, TransportError};
use crate::core::{Clock, SystemClock};
use crate::lifecycle::ConnectionStatus;
use crate::model::{
    Connection, NewConnectionRequest, Profile, ProfileRole, ProfileSummary, ProfileUpdate,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;

/// Number of calls each endpoint has received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCount {
    pub list_connections: usize,
    pub create_connection: usize,
    pub update_connection_status: usize,
    pub delete_connection: usize,
    pub get_profile: usize,
    pub update_profile: usize,
}

impl CallCount {
    pub fn total(&self) -> usize {
        self.list_connections
            + self.create_connection
            + self.update_connection_status
            + self.delete_connection
            + self.get_profile
            + self.update_profile
    }
}

#[derive(Default)]
struct Counters {
    list_connections: AtomicUsize,
    create_connection: AtomicUsize,
    update_connection_status: AtomicUsize,
    delete_connection: AtomicUsize,
    get_profile: AtomicUsize,
    update_profile: AtomicUsize,
}

/// Handle to a `list_connections` response held by
/// [`InMemoryBackend::hold_next_list`]
#[derive(Debug, Clone)]
pub struct ListHold(Arc<Semaphore>);

impl ListHold {
    pub fn release(&self) {
        self.0.add_permits(1);
    }
}

#[derive(Default)]
struct BackendState {
    connections: HashMap<String, Connection>,
    profiles: HashMap<String, Profile>,
}

/// In-process stand-in for the remote collaborator.
///
/// Enforces the server-side rules the cache trusts upstream for: no
/// self-connections, at most one live record per pair, and a developer flag
/// derived from the role on every profile write.
pub struct InMemoryBackend {
    clock: Arc<dyn Clock>,
    state: RwLock<BackendState>,
    calls: Counters,
    fail_next: Mutex<Option<TransportError>>,
    list_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(BackendState::default()),
            calls: Counters::default(),
            fail_next: Mutex::new(None),
            list_gate: Mutex::new(None),
        }
    }

    /// Store a profile as-is, recomputing the developer flag
    pub async fn seed_profile(&self, mut profile: Profile) {
        profile.is_developer = developer_access(profile.role);
        self.state
            .write()
            .await
            .profiles
            .insert(profile.id.clone(), profile);
    }

    /// Store a connection record bypassing the pair checks
    pub async fn seed_connection(&self, connection: Connection) {
        self.state
            .write()
            .await
            .connections
            .insert(connection.id.clone(), connection);
    }

    pub async fn connection(&self, id: &str) -> Option<Connection> {
        self.state.read().await.connections.get(id).cloned()
    }

    pub async fn profile(&self, id: &str) -> Option<Profile> {
        self.state.read().await.profiles.get(id).cloned()
    }

    pub fn calls(&self) -> CallCount {
        CallCount {
            list_connections: self.calls.list_connections.load(Ordering::SeqCst),
            create_connection: self.calls.create_connection.load(Ordering::SeqCst),
            update_connection_status: self.calls.update_connection_status.load(Ordering::SeqCst),
            delete_connection: self.calls.delete_connection.load(Ordering::SeqCst),
            get_profile: self.calls.get_profile.load(Ordering::SeqCst),
            update_profile: self.calls.update_profile.load(Ordering::SeqCst),
        }
    }

    /// Make the next call, whichever endpoint it hits, fail with `error`
    pub fn fail_next(&self, error: TransportError) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    /// Hold the response of the next `list_connections` call until the
    /// returned handle is released.
    ///
    /// The listing is captured when the call arrives, so a held response
    /// carries the data as it was at request time. Later calls are not held.
    pub fn hold_next_list(&self) -> ListHold {
        let gate = Arc::new(Semaphore::new(0));
        *self.list_gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(gate.clone());
        ListHold(gate)
    }

    fn take_failure(&self) -> Result<(), TransportError> {
        match self.fail_next.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn summary(profiles: &HashMap<String, Profile>, id: &str) -> Option<ProfileSummary> {
        profiles.get(id).map(|p| ProfileSummary {
            id: p.id.clone(),
            full_name: p.full_name.clone(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            chapter: p.chapter.clone(),
            avatar_url: p.avatar_url.clone(),
        })
    }
}

fn developer_access(role: ProfileRole) -> bool {
    matches!(role, ProfileRole::Developer | ProfileRole::Admin)
}

#[async_trait]
impl ConnectionTransport for InMemoryBackend {
    async fn list_connections(&self, user_id: &str) -> Result<Vec<Connection>, TransportError> {
        let gate = self.list_gate.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.calls.list_connections.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let listing: Vec<Connection> = self
            .state
            .read()
            .await
            .connections
            .values()
            .filter(|c| c.involves(user_id))
            .cloned()
            .collect();

        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        Ok(listing)
    }

    async fn create_connection(
        &self,
        request: &NewConnectionRequest,
    ) -> Result<Connection, TransportError> {
        self.calls.create_connection.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        if request.requester_id == request.recipient_id {
            return Err(TransportError::new(400, "You cannot connect with yourself"));
        }

        let mut state = self.state.write().await;
        let exists = state.connections.values().any(|c| {
            c.joins(&request.requester_id, &request.recipient_id)
                && c.status != ConnectionStatus::Declined
        });
        if exists {
            return Err(TransportError::new(
                409,
                "A connection already exists between these users",
            ));
        }

        let now = self.clock.now();
        let connection = Connection {
            id: Uuid::new_v4().to_string(),
            requester_id: request.requester_id.clone(),
            recipient_id: request.recipient_id.clone(),
            status: ConnectionStatus::Pending,
            message: request.message.clone(),
            created_at: now,
            updated_at: now,
            requester: Self::summary(&state.profiles, &request.requester_id),
            recipient: Self::summary(&state.profiles, &request.recipient_id),
        };

        state
            .connections
            .insert(connection.id.clone(), connection.clone());
        Ok(connection)
    }

    async fn update_connection_status(
        &self,
        id: &str,
        status: ConnectionStatus,
    ) -> Result<Connection, TransportError> {
        self.calls.update_connection_status.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let now = self.clock.now();
        let mut state = self.state.write().await;
        let connection = state
            .connections
            .get_mut(id)
            .ok_or_else(|| TransportError::not_found("Connection not found"))?;

        connection.status = status;
        connection.updated_at = now;
        Ok(connection.clone())
    }

    async fn delete_connection(&self, id: &str) -> Result<(), TransportError> {
        self.calls.delete_connection.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        match self.state.write().await.connections.remove(id) {
            Some(_) => Ok(()),
            None => Err(TransportError::not_found("Connection not found")),
        }
    }
}

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, TransportError> {
        self.calls.get_profile.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, TransportError> {
        self.calls.update_profile.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let now = self.clock.now();
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| TransportError::not_found("Profile not found"))?;

        for field in update.fields() {
            profile.apply_field(field);
        }
        profile.is_developer = developer_access(profile.role);
        profile.updated_at = now;

        Ok(profile.clone())
    }
}
