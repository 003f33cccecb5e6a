use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A verified `{userId, username}` pair attached to a gateway channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

/// A message ready to be persisted. Never constructed with both `text`
/// and `file` empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: Uuid,
    pub recipient: Uuid,
    pub text: Option<String>,
    pub file: Option<String>,
}

impl NewMessage {
    /// Returns `None` when there is nothing to store. Empty strings count as absent.
    pub fn new(
        sender: Uuid,
        recipient: Uuid,
        text: Option<String>,
        file: Option<String>,
    ) -> Option<Self> {
        let text = text.filter(|t| !t.is_empty());
        let file = file.filter(|f| !f.is_empty());
        if text.is_none() && file.is_none() {
            return None;
        }
        Some(Self {
            sender,
            recipient,
            text,
            file,
        })
    }
}

/// A persisted direct message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: Uuid,
    pub sender: Uuid,
    pub recipient: Uuid,
    pub text: Option<String>,
    pub file: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_requires_content() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(NewMessage::new(a, b, None, None).is_none());
        assert!(NewMessage::new(a, b, Some(String::new()), None).is_none());
        assert!(NewMessage::new(a, b, Some(String::new()), Some(String::new())).is_none());

        let msg = NewMessage::new(a, b, Some(String::new()), Some("1.png".into())).unwrap();
        assert_eq!(msg.text, None);
        assert_eq!(msg.file.as_deref(), Some("1.png"));
    }

    #[test]
    fn identity_uses_camel_case() {
        let id = Uuid::nil();
        let json = serde_json::to_value(Identity::new(id, "ana")).unwrap();
        assert_eq!(json["userId"], id.to_string());
        assert_eq!(json["username"], "ana");
    }
}
