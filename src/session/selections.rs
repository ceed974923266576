//! Pending item per sender, awaiting a level choice

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::SenderId;

pub const DEFAULT_SELECTION_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_SELECTION_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct PendingItem {
    token: String,
    inserted_at: Instant,
}

/// Sender id → token of the item they are choosing a level for
///
/// Entries expire after the TTL. When full, inserting evicts the oldest entry.
#[derive(Debug)]
pub struct PendingSelections {
    items: Mutex<HashMap<SenderId, PendingItem>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for PendingSelections {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_TTL, DEFAULT_SELECTION_CAPACITY)
    }
}

impl PendingSelections {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remember `token` for `sender`, replacing any previous one
    pub fn insert(&self, sender: SenderId, token: impl Into<String>) {
        self.insert_at(sender, token.into(), Instant::now());
    }

    /// Remove and return the sender's token unless it has expired
    pub fn take(&self, sender: SenderId) -> Option<String> {
        self.take_at(sender, Instant::now())
    }

    /// Whether `sender` has an unexpired pending token
    pub fn contains(&self, sender: SenderId) -> bool {
        self.contains_at(sender, Instant::now())
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn insert_at(&self, sender: SenderId, token: String, now: Instant) {
        let mut items = self.items.lock();

        if !items.contains_key(&sender) && items.len() >= self.capacity {
            let oldest = items
                .iter()
                .min_by_key(|(_, item)| item.inserted_at)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                items.remove(&oldest);
                tracing::debug!(sender = oldest, "evicted oldest pending selection");
            }
        }

        items.insert(
            sender,
            PendingItem {
                token,
                inserted_at: now,
            },
        );
    }

    fn take_at(&self, sender: SenderId, now: Instant) -> Option<String> {
        let item = self.items.lock().remove(&sender)?;
        if now.saturating_duration_since(item.inserted_at) > self.ttl {
            return None;
        }
        Some(item.token)
    }

    fn contains_at(&self, sender: SenderId, now: Instant) -> bool {
        self.items
            .lock()
            .get(&sender)
            .is_some_and(|item| now.saturating_duration_since(item.inserted_at) <= self.ttl)
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|_, item| now.saturating_duration_since(item.inserted_at) <= self.ttl);
        before - items.len()
    }
}
