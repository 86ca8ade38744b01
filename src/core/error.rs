use crate::lifecycle::TransitionRefusal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("{0}")]
    Transport(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(TransitionRefusal),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Message stored in a collection's `error` field.
    ///
    /// Transport and not-found messages come from the collaborator and are
    /// passed through untouched.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Transport(message) | SyncError::NotFound(message) => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, SyncError::InvalidTransition(_))
    }
}

impl From<TransitionRefusal> for SyncError {
    fn from(refusal: TransitionRefusal) -> Self {
        Self::InvalidTransition(refusal)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ConnectionStatus;

    #[test]
    fn test_transport_message_is_verbatim() {
        let err = SyncError::Transport("Connection already exists".into());
        assert_eq!(err.user_message(), "Connection already exists");
        assert_eq!(err.to_string(), "Connection already exists");
    }

    #[test]
    fn test_invalid_transition_is_distinct() {
        let err: SyncError = TransitionRefusal::IllegalSource {
            from: ConnectionStatus::Declined,
            to: ConnectionStatus::Accepted,
        }
        .into();

        assert!(err.is_invalid_transition());
        assert!(err.user_message().starts_with("Invalid transition"));
        assert!(!SyncError::NotFound("gone".into()).is_invalid_transition());
    }
}
