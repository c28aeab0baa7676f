//! CRM record types
//!
//! Wire shapes for the entities the list views page over, plus the auth
//! endpoint's request/response pair. Every payload is an explicit serde
//! type; nothing duck-typed crosses the gateway boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Session, UserProfile};

/// A follow-up task on the operations board
///
/// Identity is server-assigned and never mutated client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: bool,
    #[serde(default)]
    pub complete: bool,
    /// Client this task belongs to, if any
    #[serde(default)]
    pub client: Option<u64>,
}

/// A client of the monitoring service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Payload for creating a task
#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub priority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<u64>,
}

impl TaskDraft {
    /// Create a draft with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Builder method: set description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method: set due date
    pub fn due(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Builder method: flag as priority
    pub fn priority(mut self) -> Self {
        self.priority = true;
        self
    }

    /// Builder method: attach to a client
    pub fn client(mut self, client_id: u64) -> Self {
        self.client = Some(client_id);
        self
    }
}

/// Partial update for a task; only set fields are sent
#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
}

impl TaskPatch {
    /// Patch that marks a task complete
    pub fn completed() -> Self {
        Self {
            complete: Some(true),
            ..Self::default()
        }
    }
}

/// Login request body
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Login response body
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

impl From<LoginResponse> for Session {
    fn from(response: LoginResponse) -> Self {
        Session {
            access_token: response.access_token,
            user: response.user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserialize_sparse() {
        // Optional fields may be absent from the wire entirely
        let task: Task = serde_json::from_str(r#"{"id": 3, "title": "Replace probe"}"#).unwrap();
        assert_eq!(task.id, 3);
        assert!(!task.priority);
        assert!(!task.complete);
        assert_eq!(task.client, None);
    }

    #[test]
    fn test_draft_builder() {
        let draft = TaskDraft::new("Calibrate sensor").priority().client(12);
        assert_eq!(draft.title, "Calibrate sensor");
        assert!(draft.priority);
        assert_eq!(draft.client, Some(12));

        let json = serde_json::to_value(&draft).unwrap();
        // Unset optionals are omitted, not sent as null
        assert!(json.get("description").is_none());
        assert!(json.get("due_date").is_none());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let json = serde_json::to_value(TaskPatch::completed()).unwrap();
        assert_eq!(json, serde_json::json!({"complete": true}));
    }

    #[test]
    fn test_login_response_into_session() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"access_token": "tok", "user": {"id": 1, "username": "ines"}}"#,
        )
        .unwrap();

        let session: Session = response.into();
        assert_eq!(session.access_token, "tok");
        assert_eq!(session.user.username, "ines");
    }
}
