use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Identity;

/// Events sent FROM server TO client over the gateway.
///
/// The wire shapes are untagged: a presence update is `{ "online": [...] }`
/// and a delivered message is the bare message object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerEvent {
    /// Full list of identified channels, one entry per channel
    Presence { online: Vec<Identity> },

    /// A direct message addressed to this client
    Message(DeliveredMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredMessage {
    pub text: Option<String>,
    pub sender: Uuid,
    pub recipient: Uuid,
    /// Stored filename, servable under `/uploads/`
    pub file: Option<String>,
    pub id: Uuid,
}

/// Commands sent FROM client TO server over the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub recipient: Uuid,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file: Option<FileUpload>,
}

/// An inline attachment. `data` is a data URL: `<meta>,<base64>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUpload {
    pub name: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presence_wire_shape() {
        let id = Uuid::new_v4();
        let event = ServerEvent::Presence {
            online: vec![Identity::new(id, "bo")],
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "online": [{ "userId": id, "username": "bo" }] })
        );
    }

    #[test]
    fn delivered_message_wire_shape() {
        let (sender, recipient, id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let event = ServerEvent::Message(DeliveredMessage {
            text: Some("hi".into()),
            sender,
            recipient,
            file: None,
            id,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "text": "hi", "sender": sender, "recipient": recipient, "file": null, "id": id })
        );
    }

    #[test]
    fn send_message_requires_recipient() {
        assert!(serde_json::from_str::<SendMessage>(r#"{"text":"hi"}"#).is_err());

        let recipient = Uuid::new_v4();
        let cmd: SendMessage =
            serde_json::from_value(json!({ "recipient": recipient, "file": { "name": "a.png", "data": "x,AAAA" } }))
                .unwrap();
        assert_eq!(cmd.recipient, recipient);
        assert!(cmd.text.is_none());
        assert_eq!(cmd.file.unwrap().name, "a.png");
    }
}
