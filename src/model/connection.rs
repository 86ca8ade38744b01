use crate::core::{ConnectionId, UserId};
use crate::lifecycle::{ActorRole, ConnectionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only projection of a profile embedded in a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: UserId,
    #[serde(alias = "full_name")]
    pub full_name: String,
    #[serde(default, alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
}

impl ProfileSummary {
    pub fn new(id: impl Into<UserId>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            first_name: None,
            last_name: None,
            chapter: None,
            avatar_url: None,
        }
    }
}

/// A social connection between two users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    #[serde(alias = "requester_id")]
    pub requester_id: UserId,
    #[serde(alias = "recipient_id")]
    pub recipient_id: UserId,
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<ProfileSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ProfileSummary>,
}

impl Connection {
    /// Role `user_id` plays in this connection, if any
    pub fn role_of(&self, user_id: &str) -> Option<ActorRole> {
        if self.requester_id == user_id {
            Some(ActorRole::Requester)
        } else if self.recipient_id == user_id {
            Some(ActorRole::Recipient)
        } else {
            None
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.role_of(user_id).is_some()
    }

    /// Id of the participant that is not `viewer_id`
    pub fn counterpart_id(&self, viewer_id: &str) -> Option<&str> {
        match self.role_of(viewer_id)? {
            ActorRole::Requester => Some(&self.recipient_id),
            ActorRole::Recipient => Some(&self.requester_id),
        }
    }

    /// Embedded summary of the participant that is not `viewer_id`
    pub fn counterpart(&self, viewer_id: &str) -> Option<&ProfileSummary> {
        match self.role_of(viewer_id)? {
            ActorRole::Requester => self.recipient.as_ref(),
            ActorRole::Recipient => self.requester.as_ref(),
        }
    }

    /// Whether this record joins exactly `a` and `b`, in either direction
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.requester_id == a && self.recipient_id == b)
            || (self.requester_id == b && self.recipient_id == a)
    }
}

/// Field-level updates a connection record accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionPatch {
    Status {
        status: ConnectionStatus,
        updated_at: DateTime<Utc>,
    },
    Message(Option<String>),
}

/// Body of a "send request" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConnectionRequest {
    pub requester_id: UserId,
    pub recipient_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Connection {
        let now = Utc::now();
        Connection {
            id: "c1".into(),
            requester_id: "u1".into(),
            recipient_id: "u2".into(),
            status: ConnectionStatus::Pending,
            message: Some("Let's connect".into()),
            created_at: now,
            updated_at: now,
            requester: Some(ProfileSummary::new("u1", "Ada Lovelace")),
            recipient: Some(ProfileSummary::new("u2", "Grace Hopper")),
        }
    }

    #[test]
    fn test_roles_and_counterparts() {
        let conn = sample();
        assert_eq!(conn.role_of("u1"), Some(ActorRole::Requester));
        assert_eq!(conn.role_of("u2"), Some(ActorRole::Recipient));
        assert_eq!(conn.role_of("u3"), None);

        assert_eq!(conn.counterpart_id("u1"), Some("u2"));
        assert_eq!(
            conn.counterpart("u2").map(|p| p.full_name.as_str()),
            Some("Ada Lovelace")
        );
        assert!(conn.joins("u2", "u1"));
        assert!(!conn.joins("u1", "u3"));
    }

    #[test]
    fn test_deserialize_accepts_snake_case() {
        let json = r#"{
            "id": "c9",
            "requester_id": "u1",
            "recipient_id": "u2",
            "status": "accepted",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-02T10:00:00Z",
            "requester": { "id": "u1", "full_name": "Ada Lovelace", "chapter": "Alpha" }
        }"#;

        let conn: Connection = serde_json::from_str(json).unwrap();
        assert_eq!(conn.status, ConnectionStatus::Accepted);
        assert_eq!(conn.recipient_id, "u2");
        assert_eq!(conn.message, None);
        assert_eq!(
            conn.requester.and_then(|p| p.chapter),
            Some("Alpha".to_string())
        );
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["requesterId"], "u1");
        assert_eq!(value["status"], "pending");
        assert!(value.get("requester_id").is_none());
    }
}
