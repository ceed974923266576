//! Pending buffer of chat ids awaiting a flush

use crate::types::ChatId;

/// Ordered chat ids recorded since the last successful flush
///
/// Owned by the recorder behind its mutex. A failed flush leaves the contents
/// in place and pushes the size trigger one threshold further out, so a
/// broken store is retried on the next batch or timer tick rather than on
/// every single append.
#[derive(Debug)]
pub struct PendingBuffer {
    keys: Vec<ChatId>,
    threshold: usize,
    next_size_trigger: usize,
}

impl PendingBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            keys: Vec::with_capacity(threshold),
            threshold,
            next_size_trigger: threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[ChatId] {
        &self.keys
    }

    /// Append unless the buffer already holds `ceiling` keys
    pub fn push(&mut self, chat_id: ChatId, ceiling: usize) -> bool {
        if self.keys.len() >= ceiling {
            return false;
        }
        self.keys.push(chat_id);
        true
    }

    pub fn size_trigger_reached(&self) -> bool {
        self.keys.len() >= self.next_size_trigger
    }

    /// Everything was persisted
    pub fn clear(&mut self) {
        self.keys.clear();
        self.next_size_trigger = self.threshold;
    }

    /// A flush failed; keep the keys and wait for another threshold's worth
    pub fn defer_size_trigger(&mut self) {
        self.next_size_trigger = self.keys.len() + self.threshold;
    }
}
