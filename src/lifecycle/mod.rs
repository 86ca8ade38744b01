// ============================================================================
// Connection Lifecycle
// ============================================================================
//
// Legal command surface:
//
// ```text
//            accept (recipient)
//   pending ───────────────────> accepted
//      │  decline (recipient)       │
//      ├───────────────────> declined
//      │                            │
//      │  block (either)            │ block (either)
//      ├───────────────────> blocked <┘
//      │
//      └── cancel (requester) ──> (deleted)
// ```
//
// No terminal state is enforced beyond what the command surface allows.
//
// ============================================================================

use crate::model::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored status of a connection record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Declined,
    Blocked,
}

impl ConnectionStatus {
    pub const ALL: [ConnectionStatus; 4] = [
        ConnectionStatus::Pending,
        ConnectionStatus::Accepted,
        ConnectionStatus::Declined,
        ConnectionStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Declined => "declined",
            ConnectionStatus::Blocked => "blocked",
        }
    }

    /// Whether the pair still has a relationship (not declined or blocked)
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionStatus::Pending | ConnectionStatus::Accepted)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ConnectionStatus::Pending),
            "accepted" => Ok(ConnectionStatus::Accepted),
            "declined" => Ok(ConnectionStatus::Declined),
            "blocked" => Ok(ConnectionStatus::Blocked),
            other => Err(format!("unknown connection status '{}'", other)),
        }
    }
}

/// Which side of a connection an actor is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorRole {
    Requester,
    Recipient,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Requester => f.write_str("requester"),
            ActorRole::Recipient => f.write_str("recipient"),
        }
    }
}

/// Status of a connection as seen by one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerStatus {
    None,
    PendingSent,
    PendingReceived,
    Accepted,
    Declined,
    Blocked,
}

impl ViewerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerStatus::None => "none",
            ViewerStatus::PendingSent => "pending_sent",
            ViewerStatus::PendingReceived => "pending_received",
            ViewerStatus::Accepted => "accepted",
            ViewerStatus::Declined => "declined",
            ViewerStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for ViewerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a lifecycle command was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRefusal {
    /// No record with this id is known
    UnknownConnection,
    /// The actor is neither requester nor recipient
    NotParticipant { actor: String },
    /// The record's current status does not allow the move
    IllegalSource {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },
    /// The move is legal, but not for this side of the connection
    RoleNotPermitted {
        role: ActorRole,
        to: ConnectionStatus,
    },
    /// Only the requester may cancel
    CancelNotRequester,
    /// Cancellation is only possible while pending
    CancelNotPending(ConnectionStatus),
}

impl fmt::Display for TransitionRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionRefusal::UnknownConnection => f.write_str("connection does not exist"),
            TransitionRefusal::NotParticipant { actor } => {
                write!(f, "user '{}' is not part of this connection", actor)
            }
            TransitionRefusal::IllegalSource { from, to } => {
                write!(f, "a {} connection cannot become {}", from, to)
            }
            TransitionRefusal::RoleNotPermitted { role, to } => {
                write!(f, "the {} cannot mark a connection {}", role, to)
            }
            TransitionRefusal::CancelNotRequester => {
                f.write_str("only the requester can cancel a connection request")
            }
            TransitionRefusal::CancelNotPending(status) => {
                write!(f, "a {} connection can no longer be cancelled", status)
            }
        }
    }
}

/// Check a status move against the legal command surface
pub fn validate_transition(
    connection: Option<&Connection>,
    actor_id: &str,
    target: ConnectionStatus,
) -> Result<ActorRole, TransitionRefusal> {
    let connection = connection.ok_or(TransitionRefusal::UnknownConnection)?;
    let role = connection
        .role_of(actor_id)
        .ok_or_else(|| TransitionRefusal::NotParticipant {
            actor: actor_id.to_string(),
        })?;

    check_move(connection.status, target, role)?;
    Ok(role)
}

/// Check a cancellation (hard delete) against the legal command surface
pub fn validate_cancel(
    connection: Option<&Connection>,
    actor_id: &str,
) -> Result<(), TransitionRefusal> {
    let connection = connection.ok_or(TransitionRefusal::UnknownConnection)?;
    let role = connection
        .role_of(actor_id)
        .ok_or_else(|| TransitionRefusal::NotParticipant {
            actor: actor_id.to_string(),
        })?;

    if role != ActorRole::Requester {
        return Err(TransitionRefusal::CancelNotRequester);
    }
    if connection.status != ConnectionStatus::Pending {
        return Err(TransitionRefusal::CancelNotPending(connection.status));
    }
    Ok(())
}

fn check_move(
    from: ConnectionStatus,
    to: ConnectionStatus,
    role: ActorRole,
) -> Result<(), TransitionRefusal> {
    use ConnectionStatus::*;

    match (from, to) {
        (Pending, Accepted) | (Pending, Declined) => {
            if role == ActorRole::Recipient {
                Ok(())
            } else {
                Err(TransitionRefusal::RoleNotPermitted { role, to })
            }
        }
        (Pending, Blocked) | (Accepted, Blocked) => Ok(()),
        _ => Err(TransitionRefusal::IllegalSource { from, to }),
    }
}

/// Derive the label `viewer_id` sees for `connection`.
///
/// Always computed from stored state; the result must not be cached on the
/// record since the same record is shown to both participants.
pub fn viewer_status(viewer_id: &str, connection: Option<&Connection>) -> ViewerStatus {
    let Some(connection) = connection else {
        return ViewerStatus::None;
    };

    match connection.status {
        ConnectionStatus::Pending => match connection.role_of(viewer_id) {
            Some(ActorRole::Requester) => ViewerStatus::PendingSent,
            Some(ActorRole::Recipient) => ViewerStatus::PendingReceived,
            None => ViewerStatus::None,
        },
        ConnectionStatus::Accepted => ViewerStatus::Accepted,
        ConnectionStatus::Declined => ViewerStatus::Declined,
        ConnectionStatus::Blocked => ViewerStatus::Blocked,
    }
}
