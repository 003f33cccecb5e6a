use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

use parley_db::Database;
use parley_types::models::NewMessage;

use crate::error::GatewayError;

/// Durable message storage. Returns the id of the created record.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, message: NewMessage) -> Result<Uuid, GatewayError>;
}

pub struct SqliteMessageStore {
    db: Arc<Database>,
}

impl SqliteMessageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn create_message(&self, message: NewMessage) -> Result<Uuid, GatewayError> {
        let id = Uuid::new_v4();

        // Run blocking DB insert off the async runtime
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            db.insert_message(
                &id.to_string(),
                &message.sender.to_string(),
                &message.recipient.to_string(),
                message.text.as_deref(),
                message.file.as_deref(),
            )
        })
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            GatewayError::Persistence(e.to_string())
        })?
        .map_err(|e| GatewayError::Persistence(e.to_string()))?;

        Ok(id)
    }
}
