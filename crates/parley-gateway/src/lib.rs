//! Parley gateway: the persistent-channel core.
//!
//! Every open WebSocket is a channel in the [`ConnectionRegistry`]. Each
//! channel runs a [`LivenessMonitor`] heartbeat, the [`PresenceBroadcaster`]
//! pushes the full online list on every membership change, and the
//! [`MessageRelay`] persists inbound messages before forwarding them to the
//! recipient's channels.

pub mod auth;
pub mod connection;
pub mod error;
pub mod liveness;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod store;
pub mod uploads;

use std::sync::Arc;
use std::time::Duration;

pub use auth::{CredentialVerifier, JwtVerifier};
pub use error::GatewayError;
pub use liveness::{LivenessMonitor, LivenessState};
pub use presence::PresenceBroadcaster;
pub use registry::{ChannelId, ConnectionRegistry, Outbound};
pub use relay::MessageRelay;
pub use store::{MessageStore, SqliteMessageStore};
pub use uploads::{DiskFileStore, FileStore};

/// Heartbeat timing for every channel.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Time between pings.
    pub heartbeat_interval: Duration,
    /// How long a ping may go unanswered before the channel is terminated.
    pub heartbeat_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(1),
        }
    }
}

/// Everything a connection task needs, cheap to clone into each one.
#[derive(Clone)]
pub struct Gateway {
    pub registry: ConnectionRegistry,
    pub presence: PresenceBroadcaster,
    pub relay: MessageRelay,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        verifier: Arc<dyn CredentialVerifier>,
        messages: Arc<dyn MessageStore>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        let registry = ConnectionRegistry::new();
        let presence = PresenceBroadcaster::new(registry.clone());
        let relay = MessageRelay::new(registry.clone(), messages, files);
        Self {
            registry,
            presence,
            relay,
            verifier,
            config,
        }
    }
}
