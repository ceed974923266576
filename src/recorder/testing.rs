//! Fault-injecting store for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::storage::{SqliteStore, Storage, StorageTx, StoreError, StoreResult};
use crate::types::{ChatId, NewEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    Begin,
    Upsert,
    Insert,
    Panic,
}

/// SqliteStore wrapper that can fail or panic at a chosen step
pub(crate) struct FaultyStore {
    inner: SqliteStore,
    fault: Mutex<Option<Fault>>,
    begin_calls: AtomicUsize,
    begin_threads: Mutex<Vec<ThreadId>>,
    query_calls: AtomicUsize,
    insert_sizes: Mutex<Vec<usize>>,
    call_log: Mutex<Vec<&'static str>>,
}

impl FaultyStore {
    pub(crate) fn create() -> (Self, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let inner = SqliteStore::open(temp_dir.path().join("stats.db")).unwrap();
        let store = Self {
            inner,
            fault: Mutex::new(None),
            begin_calls: AtomicUsize::new(0),
            begin_threads: Mutex::new(Vec::new()),
            query_calls: AtomicUsize::new(0),
            insert_sizes: Mutex::new(Vec::new()),
            call_log: Mutex::new(Vec::new()),
        };
        (store, temp_dir)
    }

    pub(crate) fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    pub(crate) fn set_fault(&self, fault: Option<Fault>) {
        *self.fault.lock() = fault;
    }

    pub(crate) fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    /// Threads every transaction was opened on
    pub(crate) fn begin_threads(&self) -> Vec<ThreadId> {
        self.begin_threads.lock().clone()
    }

    pub(crate) fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn insert_sizes(&self) -> Vec<usize> {
        self.insert_sizes.lock().clone()
    }

    pub(crate) fn call_log(&self) -> Vec<&'static str> {
        self.call_log.lock().clone()
    }

    fn fault(&self) -> Option<Fault> {
        *self.fault.lock()
    }
}

impl Storage for FaultyStore {
    fn begin(&self) -> StoreResult<Box<dyn StorageTx + '_>> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        self.begin_threads.lock().push(std::thread::current().id());
        if self.fault() == Some(Fault::Begin) {
            return Err(StoreError::Transaction("injected begin failure".to_string()));
        }
        let inner = self.inner.begin()?;
        Ok(Box::new(FaultyTx { inner, store: self }))
    }

    fn count_events_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count_events_since(since)
    }

    fn count_distinct_chats(&self) -> StoreResult<u64> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count_distinct_chats()
    }
}

struct FaultyTx<'a> {
    inner: Box<dyn StorageTx + 'a>,
    store: &'a FaultyStore,
}

impl StorageTx for FaultyTx<'_> {
    fn upsert_chat(&mut self, chat_id: ChatId, seen_at: DateTime<Utc>) -> StoreResult<()> {
        self.store.call_log.lock().push("upsert");
        if self.store.fault() == Some(Fault::Upsert) {
            return Err(StoreError::Transaction("injected upsert failure".to_string()));
        }
        self.inner.upsert_chat(chat_id, seen_at)
    }

    fn insert_events(&mut self, events: &[NewEvent]) -> StoreResult<()> {
        self.store.call_log.lock().push("insert");
        self.store.insert_sizes.lock().push(events.len());
        match self.store.fault() {
            Some(Fault::Insert) => {
                Err(StoreError::Transaction("injected insert failure".to_string()))
            }
            Some(Fault::Panic) => panic!("injected panic during insert"),
            _ => self.inner.insert_events(events),
        }
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let FaultyTx { inner, .. } = *self;
        inner.commit()
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        let FaultyTx { inner, .. } = *self;
        inner.rollback()
    }
}
