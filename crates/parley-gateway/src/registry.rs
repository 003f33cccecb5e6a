use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use parley_types::models::Identity;

/// Opaque handle for one open channel. Ids grow with admission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Frames queued for a channel's socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized server event
    Text(String),
    /// Transport-level ping
    Ping,
    /// Stop writing and drop the socket
    Close,
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

struct ChannelEntry {
    identity: Option<Identity>,
    tx: OutboundSender,
}

/// The live set of open channels.
///
/// All membership changes go through `admit`, `resolve_identity` and `evict`.
/// Readers hold the same lock, so nobody observes a half-admitted or
/// half-evicted channel.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Channels>>,
}

#[derive(Default)]
struct Channels {
    next_id: u64,
    entries: BTreeMap<ChannelId, ChannelEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unauthenticated channel. Returns its new id.
    pub async fn admit(&self, tx: OutboundSender) -> ChannelId {
        let mut channels = self.inner.write().await;
        channels.next_id += 1;
        let id = ChannelId(channels.next_id);
        channels.entries.insert(id, ChannelEntry { identity: None, tx });
        id
    }

    /// Attach an identity to a channel. Only the first call for a channel has
    /// any effect; later calls, and calls for unknown channels, return `false`.
    pub async fn resolve_identity(&self, id: ChannelId, identity: Identity) -> bool {
        let mut channels = self.inner.write().await;
        match channels.entries.get_mut(&id) {
            Some(entry) if entry.identity.is_none() => {
                entry.identity = Some(identity);
                true
            }
            _ => false,
        }
    }

    /// Remove a channel. Returns `false` if it was not registered.
    pub async fn evict(&self, id: ChannelId) -> bool {
        self.inner.write().await.entries.remove(&id).is_some()
    }

    pub async fn contains(&self, id: ChannelId) -> bool {
        self.inner.read().await.entries.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    pub async fn identity(&self, id: ChannelId) -> Option<Identity> {
        self.inner
            .read()
            .await
            .entries
            .get(&id)
            .and_then(|entry| entry.identity.clone())
    }

    /// Identities of every identified channel, in admission order.
    /// A user with several channels appears once per channel.
    pub async fn snapshot(&self) -> Vec<Identity> {
        self.inner
            .read()
            .await
            .entries
            .values()
            .filter_map(|entry| entry.identity.clone())
            .collect()
    }

    /// Apply `f` to every live channel while holding the read lock.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(ChannelId, Option<&Identity>, &OutboundSender),
    {
        let channels = self.inner.read().await;
        for (id, entry) in &channels.entries {
            f(*id, entry.identity.as_ref(), &entry.tx);
        }
    }

    /// Queue a frame on every channel owned by `user_id`. Returns how many
    /// channels accepted it.
    pub async fn send_to_user(&self, user_id: Uuid, frame: Outbound) -> usize {
        let mut delivered = 0;
        self.for_each(|_, identity, tx| {
            if identity.is_some_and(|i| i.user_id == user_id) && tx.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        })
        .await;
        delivered
    }
}
