//! Correlation table: request id to one-shot reply slot.
//!
//! Flow:
//! 1. Caller takes a fresh id from `RequestIdGenerator`
//! 2. Caller calls `register()` *before* writing the frame
//! 3. The read loop calls `complete()` for every inbound response
//! 4. Caller awaits its receiver, then drops its `PendingGuard`
//!
//! The read loop is the only writer on the deliver side. Locks are held
//! only for map lookup/insert/remove, never across I/O.

use super::envelope::RpcMessage;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Completed ids remembered for duplicate suppression.
pub const DEFAULT_COMPLETED_WINDOW: usize = 1024;

/// Generates request ids from wall-clock milliseconds.
///
/// Ids are `max(now_ms, last + 1)`, so they stay ordered and unique even
/// when several calls start within the same millisecond.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    last: AtomicU64,
}

impl RequestIdGenerator {
    /// New generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id.
    pub fn next_id(&self) -> u64 {
        let now = now_millis();
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(prev.saturating_add(1))
    }
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// What happened to an inbound response.
#[derive(Debug)]
pub enum Delivery {
    /// Handed to the waiting caller.
    Delivered,
    /// A reply for this id was already delivered; dropped.
    Duplicate,
    /// No caller is waiting for this id; returned to be treated as an event.
    Unmatched(RpcMessage),
}

struct PendingRequest {
    sender: oneshot::Sender<RpcMessage>,
    created_at: Instant,
    method: String,
}

/// Statistics for the correlation table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Slots registered
    pub total_registered: AtomicU64,
    /// Replies delivered
    pub total_completed: AtomicU64,
    /// Duplicate replies dropped
    pub total_duplicates: AtomicU64,
    /// Slots removed without a reply (caller gone or session closed)
    pub total_cancelled: AtomicU64,
}

/// Bounded FIFO set of recently completed ids.
struct CompletedWindow {
    order: VecDeque<u64>,
    ids: HashSet<u64>,
    capacity: usize,
}

impl CompletedWindow {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn insert(&mut self, id: u64) {
        if self.capacity == 0 || !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }
}

/// Pending request store shared by callers and the read loop.
pub struct PendingRequestStore {
    pending: DashMap<u64, PendingRequest>,
    completed: Mutex<CompletedWindow>,
    stats: Arc<PendingStats>,
}

impl Default for PendingRequestStore {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETED_WINDOW)
    }
}

impl PendingRequestStore {
    /// Create a store remembering `completed_window` delivered ids.
    pub fn new(completed_window: usize) -> Self {
        Self {
            pending: DashMap::new(),
            completed: Mutex::new(CompletedWindow::new(completed_window)),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a slot for `request_id` and get its receiver.
    pub fn register(&self, request_id: u64, method: &str) -> oneshot::Receiver<RpcMessage> {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            sender: tx,
            created_at: Instant::now(),
            method: method.to_string(),
        };

        if self.pending.insert(request_id, request).is_some() {
            warn!(request_id, method, "[sc-02] Replaced pending slot with reused request id");
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(request_id, method, "[sc-02] Registered pending request");
        rx
    }

    /// Route an inbound response to its caller.
    pub fn complete(&self, message: RpcMessage) -> Delivery {
        let request_id = message.request_id();

        let Some((_, pending)) = self.pending.remove(&request_id) else {
            if self.completed.lock().contains(request_id) {
                self.stats.total_duplicates.fetch_add(1, Ordering::Relaxed);
                warn!(
                    request_id,
                    method = message.method(),
                    "[sc-02] Dropping duplicate reply"
                );
                return Delivery::Duplicate;
            }
            return Delivery::Unmatched(message);
        };

        self.completed.lock().insert(request_id);
        let response_time = pending.created_at.elapsed();

        match pending.sender.send(message) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id,
                    method = pending.method,
                    response_time_ms = response_time.as_millis() as u64,
                    "[sc-02] Completed pending request"
                );
            }
            Err(_) => {
                // Caller stopped waiting between lookup and send
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id,
                    method = pending.method,
                    "[sc-02] Pending request receiver dropped"
                );
            }
        }
        Delivery::Delivered
    }

    /// Remove a slot without delivering. Returns true if it was present.
    pub fn cancel(&self, request_id: u64) -> bool {
        if self.pending.remove(&request_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drop every slot. Waiting receivers observe a closed channel.
    pub fn drain(&self) -> usize {
        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Number of slots awaiting a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a request id is pending
    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Removes its slot when dropped, so a slot never outlives its caller.
pub struct PendingGuard<'a> {
    store: &'a PendingRequestStore,
    request_id: u64,
}

impl<'a> PendingGuard<'a> {
    /// Guard `request_id` in `store`.
    pub fn new(store: &'a PendingRequestStore, request_id: u64) -> Self {
        Self { store, request_id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.store.pending.remove(&self.request_id);
    }
}
