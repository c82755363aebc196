//! In-memory store.

use crate::domain::ChannelResult;
use crate::ports::outbound::{ChannelUsage, Store};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::Hash;
use std::collections::HashMap;
use zeroize::Zeroizing;

/// Keys and bookkeeping held in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    keys: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
    endpoints: RwLock<HashMap<String, u64>>,
    channels: RwLock<HashMap<Hash, ChannelUsage>>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a named signing key.
    pub fn insert_key(&self, name: &str, secret: &[u8]) {
        self.keys
            .write()
            .insert(name.to_string(), Zeroizing::new(secret.to_vec()));
    }

    /// When an endpoint was last marked used.
    pub fn endpoint_last_used(&self, url: &str) -> Option<u64> {
        self.endpoints.read().get(url).copied()
    }

    /// Last recorded usage of a channel.
    pub fn channel_usage(&self, channel_id: &Hash) -> Option<ChannelUsage> {
        self.channels.read().get(channel_id).cloned()
    }

    /// Number of channels with recorded usage.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("keys", &self.keys.read().len())
            .field("endpoints", &self.endpoints.read().len())
            .field("channels", &self.channels.read().len())
            .finish()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn signing_key(&self, name: &str) -> ChannelResult<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.keys.read().get(name).cloned())
    }

    async fn mark_endpoint_used(&self, url: &str, at: u64) -> ChannelResult<()> {
        self.endpoints.write().insert(url.to_string(), at);
        Ok(())
    }

    async fn record_channel(&self, usage: ChannelUsage) -> ChannelResult<()> {
        self.channels.write().insert(usage.channel_id, usage);
        Ok(())
    }
}
