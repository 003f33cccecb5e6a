use std::sync::Arc;

use tracing::{debug, info, warn};

use parley_types::events::{DeliveredMessage, FileUpload, SendMessage, ServerEvent};
use parley_types::models::NewMessage;

use crate::error::GatewayError;
use crate::registry::{ChannelId, ConnectionRegistry, Outbound};
use crate::store::MessageStore;
use crate::uploads::{FileStore, decode_data_url, stored_filename};

/// Result of relaying one message.
#[derive(Debug)]
pub struct Delivery {
    pub message: DeliveredMessage,
    /// Recipient channels that accepted the event
    pub channels: usize,
}

/// Validates, persists and forwards direct messages.
#[derive(Clone)]
pub struct MessageRelay {
    registry: ConnectionRegistry,
    messages: Arc<dyn MessageStore>,
    files: Arc<dyn FileStore>,
}

impl MessageRelay {
    pub fn new(
        registry: ConnectionRegistry,
        messages: Arc<dyn MessageStore>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            registry,
            messages,
            files,
        }
    }

    /// Handle one inbound text frame from `channel`.
    ///
    /// Nothing is delivered unless the record was persisted, and no record is
    /// created for an attachment whose bytes were not stored. The sender's own
    /// channels are not echoed unless the sender is also the recipient.
    pub async fn handle_inbound(
        &self,
        channel: ChannelId,
        payload: &str,
    ) -> Result<Delivery, GatewayError> {
        let command: SendMessage = serde_json::from_str(payload)
            .map_err(|e| GatewayError::malformed(e.to_string()))?;

        let text = command.text.filter(|t| !t.is_empty());
        if text.is_none() && command.file.is_none() {
            return Err(GatewayError::malformed("neither text nor file"));
        }

        let sender = self
            .registry
            .identity(channel)
            .await
            .ok_or(GatewayError::AnonymousSender)?;

        let file = match &command.file {
            Some(upload) => Some(self.store_upload(upload).await?),
            None => None,
        };

        let message = NewMessage::new(sender.user_id, command.recipient, text, file)
            .ok_or_else(|| GatewayError::malformed("neither text nor file"))?;
        let id = match self.messages.create_message(message.clone()).await {
            Ok(id) => id,
            Err(e) => {
                if let Some(name) = &message.file {
                    self.discard_upload(name).await;
                }
                return Err(e);
            }
        };

        let delivered = DeliveredMessage {
            text: message.text,
            sender: message.sender,
            recipient: message.recipient,
            file: message.file,
            id,
        };
        let payload = serde_json::to_string(&ServerEvent::Message(delivered.clone()))
            .map_err(|e| GatewayError::Persistence(format!("serialize message {}: {}", id, e)))?;

        let channels = self
            .registry
            .send_to_user(delivered.recipient, Outbound::Text(payload))
            .await;

        debug!(
            "{} ({}) -> {}: message {} delivered to {} channels",
            sender.username, sender.user_id, delivered.recipient, id, channels
        );

        Ok(Delivery {
            message: delivered,
            channels,
        })
    }

    /// Name, decode, then write the attachment; the name exists before any
    /// path is built from it.
    async fn store_upload(&self, upload: &FileUpload) -> Result<String, GatewayError> {
        let name = stored_filename(&upload.name, chrono::Utc::now());
        let bytes = decode_data_url(&upload.data)?;
        self.files.write_file(&name, &bytes).await?;

        info!("Stored upload {} as {}", upload.name, name);
        Ok(name)
    }

    async fn discard_upload(&self, name: &str) {
        match self.files.remove_file(name).await {
            Ok(()) => debug!("Discarded unrecorded upload {}", name),
            Err(e) => warn!("Failed to discard unrecorded upload {}: {}", name, e),
        }
    }
}
