//! In-memory view of channel states driven by this client.
//!
//! Holds nothing that survives a restart. A transition is begun before the
//! coordinator is asked for a certificate and either committed after the
//! on-chain call confirms or rolled back.

use super::errors::{ChannelError, ChannelResult};
use parking_lot::RwLock;
use shared_types::{ChannelInfo, ChannelStatus, Hash};
use std::collections::HashMap;
use tracing::debug;

/// Per-channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRecord {
    /// Channel.
    pub channel_id: Hash,
    /// Lifecycle state.
    pub status: ChannelStatus,
    /// Last accepted certificate version, if known.
    pub version: Option<u64>,
}

/// Channel state table.
#[derive(Debug, Default)]
pub struct ChannelBook {
    records: RwLock<HashMap<Hash, ChannelRecord>>,
}

impl ChannelBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record.
    pub fn get(&self, channel_id: &Hash) -> Option<ChannelRecord> {
        self.records.read().get(channel_id).copied()
    }

    /// Learn about a channel from the coordinator, unless already tracked.
    pub fn seed(&self, info: &ChannelInfo) {
        self.records
            .write()
            .entry(info.channel_id)
            .or_insert(ChannelRecord {
                channel_id: info.channel_id,
                status: info.status,
                version: Some(info.version),
            });
    }

    /// Move to an in-flight state. Returns the state to roll back to.
    pub fn begin(&self, channel_id: Hash, next: ChannelStatus) -> ChannelResult<ChannelStatus> {
        let mut records = self.records.write();
        let record = records.entry(channel_id).or_insert(ChannelRecord {
            channel_id,
            status: ChannelStatus::Unopened,
            version: None,
        });
        let from = record.status;
        if !from.can_transition_to(next) {
            return Err(ChannelError::InvalidTransition {
                channel_id,
                from,
                to: next,
            });
        }
        record.status = next;
        debug!(channel_id = ?channel_id, %from, to = %next, "[sc-03] Channel transition begun");
        Ok(from)
    }

    /// Restore the pre-transition state after a failure.
    pub fn rollback(&self, channel_id: Hash, to: ChannelStatus) {
        let mut records = self.records.write();
        if to == ChannelStatus::Unopened {
            records.remove(&channel_id);
        } else if let Some(record) = records.get_mut(&channel_id) {
            record.status = to;
        }
        debug!(channel_id = ?channel_id, to = %to, "[sc-03] Channel transition rolled back");
    }

    /// Record a confirmed transition.
    pub fn commit(&self, channel_id: Hash, status: ChannelStatus, version: u64) {
        let mut records = self.records.write();
        let record = records.entry(channel_id).or_insert(ChannelRecord {
            channel_id,
            status,
            version: None,
        });
        record.status = status;
        record.version = Some(version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Address, U256};

    fn id() -> Hash {
        Hash::repeat_byte(0x42)
    }

    #[test]
    fn test_create_rollback_forgets_channel() {
        let book = ChannelBook::new();
        let prev = book.begin(id(), ChannelStatus::Creating).unwrap();
        assert_eq!(prev, ChannelStatus::Unopened);
        book.rollback(id(), prev);
        assert!(book.get(&id()).is_none());
    }

    #[test]
    fn test_concurrent_resize_rejected() {
        let book = ChannelBook::new();
        book.commit(id(), ChannelStatus::Open, 1);
        book.begin(id(), ChannelStatus::Resizing).unwrap();
        assert!(matches!(
            book.begin(id(), ChannelStatus::Resizing),
            Err(ChannelError::InvalidTransition { from: ChannelStatus::Resizing, .. })
        ));
        assert!(book.begin(id(), ChannelStatus::Closing).is_err());
    }

    #[test]
    fn test_commit_updates_version() {
        let book = ChannelBook::new();
        book.commit(id(), ChannelStatus::Open, 0);
        book.begin(id(), ChannelStatus::Resizing).unwrap();
        book.commit(id(), ChannelStatus::Open, 1);
        assert_eq!(book.get(&id()).unwrap().version, Some(1));
    }

    #[test]
    fn test_seed_does_not_override_tracked_state() {
        let book = ChannelBook::new();
        book.commit(id(), ChannelStatus::Open, 5);
        book.seed(&ChannelInfo {
            channel_id: id(),
            participant: Address::zero(),
            chain_id: 1,
            token: Address::zero(),
            status: ChannelStatus::Open,
            amount: U256::zero(),
            version: 2,
        });
        assert_eq!(book.get(&id()).unwrap().version, Some(5));
    }

    #[test]
    fn test_closed_is_terminal() {
        let book = ChannelBook::new();
        book.commit(id(), ChannelStatus::Closed, 9);
        assert!(book.begin(id(), ChannelStatus::Resizing).is_err());
    }
}
