// ============================================================================
// Transport Collaborators
// ============================================================================
//
// The synchronization layer never talks to the network directly. Commands go
// through these two traits; `HttpTransport` speaks the REST contract and
// `InMemoryBackend` plays the server inside the process.
//
// ============================================================================

pub mod http;
pub mod memory;

use crate::core::SyncError;
use crate::lifecycle::ConnectionStatus;
use crate::model::{Connection, NewConnectionRequest, Profile, ProfileUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpTransport;
pub use memory::{CallCount, InMemoryBackend, ListHold};

/// Failure reported by a collaborator.
///
/// `message` is the collaborator's own human-readable text and is surfaced
/// verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Failure with no HTTP status (connection refused, timeout, decode error)
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        if err.is_not_found() {
            SyncError::NotFound(err.message)
        } else {
            SyncError::Transport(err.message)
        }
    }
}

/// Connection endpoints
#[async_trait]
pub trait ConnectionTransport: Send + Sync {
    /// `GET connections?userId=<id>`
    async fn list_connections(&self, user_id: &str) -> Result<Vec<Connection>, TransportError>;

    /// `POST connections`
    async fn create_connection(
        &self,
        request: &NewConnectionRequest,
    ) -> Result<Connection, TransportError>;

    /// `PATCH connections/<id>`
    async fn update_connection_status(
        &self,
        id: &str,
        status: ConnectionStatus,
    ) -> Result<Connection, TransportError>;

    /// `DELETE connections/<id>`
    async fn delete_connection(&self, id: &str) -> Result<(), TransportError>;
}

/// Direct data access for the signed-in user's profile
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, TransportError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, TransportError>;
}

// ============================================================================
// Wire envelopes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsEnvelope {
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEnvelope {
    pub connection: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: ConnectionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
