use tracing::{debug, error};

use parley_types::events::ServerEvent;

use crate::registry::{ConnectionRegistry, Outbound};

/// Pushes the full online list to every open channel.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: ConnectionRegistry,
}

impl PresenceBroadcaster {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Snapshot the registry and send the same `{ "online": [...] }` payload
    /// to every channel, anonymous ones and the triggering one included.
    /// Returns how many channels accepted it.
    pub async fn announce(&self) -> usize {
        let online = self.registry.snapshot().await;
        let count = online.len();

        let payload = match serde_json::to_string(&ServerEvent::Presence { online }) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize presence: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        self.registry
            .for_each(|_, _, tx| {
                if tx.send(Outbound::Text(payload.clone())).is_ok() {
                    delivered += 1;
                }
            })
            .await;

        debug!("Presence: {} online, announced to {} channels", count, delivered);
        delivered
    }
}
