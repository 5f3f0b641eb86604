use serde::Serialize;
use serde_json::{Map, Value};

use crate::users::User;

/// Kind of change carried by an [`ChangeEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    /// Client-originated broadcast relayed as-is
    UserUpdate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::UserUpdate => "user_update",
        }
    }
}

/// A change to a user record, as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecordChange {
    Create { user: User },
    Update { user: User },
    Delete { user_id: i64 },
}

/// Body of an outbound `user_update` message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Record(RecordChange),
    Relay(Map<String, Value>),
}

/// An event published to a group.
///
/// Built through the constructors only, so the action always matches the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    action: Action,
    payload: EventPayload,
}

impl ChangeEvent {
    pub fn created(user: User) -> Self {
        Self {
            action: Action::Create,
            payload: EventPayload::Record(RecordChange::Create { user }),
        }
    }

    pub fn updated(user: User) -> Self {
        Self {
            action: Action::Update,
            payload: EventPayload::Record(RecordChange::Update { user }),
        }
    }

    pub fn deleted(user_id: i64) -> Self {
        Self {
            action: Action::Delete,
            payload: EventPayload::Record(RecordChange::Delete { user_id }),
        }
    }

    /// Relay client-supplied data to every member unchanged
    pub fn relayed(data: Map<String, Value>) -> Self {
        Self {
            action: Action::UserUpdate,
            payload: EventPayload::Relay(data),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn into_payload(self) -> EventPayload {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_created_payload_shape() {
        let event = ChangeEvent::created(user());
        assert_eq!(event.action(), Action::Create);

        let value = serde_json::to_value(event.payload()).unwrap();
        assert_eq!(value["action"], "create");
        assert_eq!(value["user"]["id"], 7);
        assert_eq!(value["user"]["first_name"], "John");
        assert_eq!(value["user"]["last_name"], "Doe");
    }

    #[test]
    fn test_updated_payload_shape() {
        let value = serde_json::to_value(ChangeEvent::updated(user()).payload()).unwrap();
        assert_eq!(value["action"], "update");
        assert!(value["user"].is_object());
    }

    #[test]
    fn test_deleted_payload_shape() {
        let event = ChangeEvent::deleted(7);
        assert_eq!(event.action(), Action::Delete);
        assert_eq!(
            serde_json::to_value(event.payload()).unwrap(),
            json!({"action": "delete", "user_id": 7})
        );
    }

    #[test]
    fn test_relayed_payload_is_verbatim() {
        let mut data = Map::new();
        data.insert("first_name".to_string(), json!("Jim"));
        data.insert("nested".to_string(), json!({"a": [1, 2]}));

        let event = ChangeEvent::relayed(data);
        assert_eq!(event.action(), Action::UserUpdate);
        assert_eq!(
            serde_json::to_value(event.into_payload()).unwrap(),
            json!({"first_name": "Jim", "nested": {"a": [1, 2]}})
        );
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::Create.as_str(), "create");
        assert_eq!(Action::UserUpdate.as_str(), "user_update");
        assert_eq!(serde_json::to_value(Action::UserUpdate).unwrap(), json!("user_update"));
    }
}
