// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recording mocks for the replay engine's collaborators.
//!
//! Every mock records the calls it receives for assertions and can be told
//! to fail (or, for messaging, to hang) to exercise error paths.

use batchlog_replay::cluster::{BoxFuture, Endpoint, HintStore, MessagingService};
use batchlog_replay::error::ReplayError;
use batchlog_replay::mutation::Mutation;
use batchlog_replay::store::{
    BatchlogEntry, BatchlogEntrySummary, BatchlogStore, LocalStorage, MemoryBatchlogStore,
    SegmentDescriptor,
};
use batchlog_replay::ManualClock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

// =========================================================================
// Batchlog store
// =========================================================================

/// In-memory batchlog that records fetches and deletes.
#[derive(Default)]
pub struct MockBatchlogStore {
    inner: MemoryBatchlogStore,
    gets: RwLock<Vec<Uuid>>,
    deletes: RwLock<Vec<Uuid>>,
    /// Ids removed right after being listed (scan/fetch race)
    vanishing: Mutex<HashSet<Uuid>>,
    fail_list: AtomicBool,
    fail_delete: AtomicBool,
}

impl MockBatchlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` disappear between the scan and the fetch.
    pub fn vanish_after_scan(&self, id: Uuid) {
        self.vanishing.lock().unwrap().insert(id);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner.contains(id).await
    }

    pub async fn fetched(&self) -> Vec<Uuid> {
        self.gets.read().await.clone()
    }

    pub async fn deleted(&self) -> Vec<Uuid> {
        self.deletes.read().await.clone()
    }
}

impl BatchlogStore for MockBatchlogStore {
    fn list_all(&self) -> BoxFuture<'_, Vec<BatchlogEntrySummary>> {
        Box::pin(async move {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ReplayError::storage("list_all", "simulated read failure"));
            }
            let summaries = self.inner.list_all().await?;
            let vanishing: Vec<Uuid> = self.vanishing.lock().unwrap().drain().collect();
            for id in vanishing {
                self.inner.delete(id).await?;
            }
            Ok(summaries)
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<BatchlogEntry>> {
        Box::pin(async move {
            self.gets.write().await.push(id);
            self.inner.get(id).await
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(ReplayError::storage("delete", "simulated write failure"));
            }
            self.deletes.write().await.push(id);
            self.inner.delete(id).await
        })
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        self.inner.count()
    }

    fn insert(&self, entry: BatchlogEntry) -> BoxFuture<'_, ()> {
        self.inner.insert(entry)
    }
}

// =========================================================================
// Local storage
// =========================================================================

/// Local storage engine that records applies, flushes, and compactions.
#[derive(Default)]
pub struct MockLocalStorage {
    applied: RwLock<Vec<Mutation>>,
    flushes: AtomicUsize,
    segments: Mutex<Vec<SegmentDescriptor>>,
    compactions: RwLock<Vec<Vec<SegmentDescriptor>>>,
    fail_apply: AtomicBool,
    fail_flush: AtomicBool,
}

impl MockLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments reported after the next flush.
    pub fn set_segments(&self, names: &[&str]) {
        *self.segments.lock().unwrap() = names
            .iter()
            .map(|name| SegmentDescriptor(name.to_string()))
            .collect();
    }

    pub fn fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }

    pub fn fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    pub async fn applied(&self) -> Vec<Mutation> {
        self.applied.read().await.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub async fn compactions(&self) -> Vec<Vec<SegmentDescriptor>> {
        self.compactions.read().await.clone()
    }
}

impl LocalStorage for MockLocalStorage {
    fn apply(&self, mutation: &Mutation) -> BoxFuture<'_, ()> {
        let mutation = mutation.clone();
        Box::pin(async move {
            if self.fail_apply.load(Ordering::SeqCst) {
                return Err(ReplayError::storage("apply", "simulated apply failure"));
            }
            self.applied.write().await.push(mutation);
            Ok(())
        })
    }

    fn force_blocking_flush_batchlog(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.fail_flush.load(Ordering::SeqCst) {
                return Err(ReplayError::storage("flush", "simulated flush failure"));
            }
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn batchlog_segments(&self) -> BoxFuture<'_, Vec<SegmentDescriptor>> {
        Box::pin(async move { Ok(self.segments.lock().unwrap().clone()) })
    }

    fn compact_batchlog(&self, segments: Vec<SegmentDescriptor>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.compactions.write().await.push(segments);
            // Compaction leaves one segment behind
            let mut current = self.segments.lock().unwrap();
            current.truncate(1);
            Ok(())
        })
    }
}

// =========================================================================
// Messaging
// =========================================================================

/// How a mock replica answers a mutation RPC.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Acknowledge immediately.
    Ack,
    /// Answer with a failure.
    Fail,
    /// Never answer.
    Hang,
    /// Acknowledge after a delay.
    AckAfter(Duration),
}

/// Decrements the in-flight count when a request future is dropped.
struct InFlight(Arc<AtomicUsize>, Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
        self.1.fetch_add(1, Ordering::SeqCst);
    }
}

/// Messaging service with scripted per-endpoint replies.
pub struct MockMessaging {
    replies: Mutex<HashMap<Endpoint, Reply>>,
    default_reply: Reply,
    sent: Arc<Mutex<Vec<(Endpoint, Mutation)>>>,
    in_flight: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    sent_notify: Arc<Notify>,
    /// Advance this clock on every send (time passing during delivery)
    clock_skew: Mutex<Option<(Arc<ManualClock>, i64)>>,
}

impl Default for MockMessaging {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessaging {
    /// Create a mock where every replica acknowledges.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            default_reply: Reply::Ack,
            sent: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
            sent_notify: Arc::new(Notify::new()),
            clock_skew: Mutex::new(None),
        }
    }

    pub fn set_reply(&self, endpoint: Endpoint, reply: Reply) {
        self.replies.lock().unwrap().insert(endpoint, reply);
    }

    /// Advance `clock` by `millis` each time a mutation is sent.
    pub fn advance_clock_on_send(&self, clock: Arc<ManualClock>, millis: i64) {
        *self.clock_skew.lock().unwrap() = Some((clock, millis));
    }

    /// Notified once per dispatched RPC.
    pub fn sent_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.sent_notify)
    }

    pub fn sent(&self) -> Vec<(Endpoint, Mutation)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self) -> Vec<Endpoint> {
        self.sent().into_iter().map(|(endpoint, _)| endpoint).collect()
    }

    /// Requests not yet answered, abandoned, or aborted.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Requests whose future completed or was dropped.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl MessagingService for MockMessaging {
    fn send_mutation(&self, mutation: Arc<Mutation>, endpoint: Endpoint) -> BoxFuture<'static, ()> {
        self.sent.lock().unwrap().push((endpoint, (*mutation).clone()));
        if let Some((clock, millis)) = self.clock_skew.lock().unwrap().as_ref() {
            clock.advance_millis(*millis);
        }
        self.sent_notify.notify_one();

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&endpoint)
            .copied()
            .unwrap_or(self.default_reply);

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(Arc::clone(&self.in_flight), Arc::clone(&self.finished));

        Box::pin(async move {
            let _guard = guard;
            match reply {
                Reply::Ack => Ok(()),
                Reply::Fail => Err(ReplayError::delivery(endpoint, "simulated failure response")),
                Reply::Hang => std::future::pending().await,
                Reply::AckAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            }
        })
    }
}

// =========================================================================
// Hints
// =========================================================================

/// A recorded write_hint() call.
#[derive(Debug, Clone)]
pub struct HintCall {
    pub endpoint: Endpoint,
    pub ttl_seconds: i64,
    pub mutation: Mutation,
}

/// Hint store that records every hint.
#[derive(Default)]
pub struct MockHintStore {
    hints: RwLock<Vec<HintCall>>,
    fail: AtomicBool,
}

impl MockHintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn hints(&self) -> Vec<HintCall> {
        self.hints.read().await.clone()
    }

    pub async fn hinted_endpoints(&self) -> Vec<Endpoint> {
        self.hints.read().await.iter().map(|h| h.endpoint).collect()
    }
}

impl HintStore for MockHintStore {
    fn write_hint(&self, mutation: &Mutation, ttl_seconds: i64, endpoint: Endpoint) -> BoxFuture<'_, ()> {
        let mutation = mutation.clone();
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ReplayError::storage("write_hint", "simulated hint failure"));
            }
            self.hints.write().await.push(HintCall {
                endpoint,
                ttl_seconds,
                mutation,
            });
            Ok(())
        })
    }
}
