//! In-memory query cache with subscriber counting and tag invalidation.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::entry::{CacheStatus, EntrySnapshot};
use super::key::QueryKey;
use super::tags::Tag;
use super::traits::{CacheResult, CacheSource};
use crate::error::ApiError;

/// A factory for the future that fetches an entry's value.
type FetcherFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;

type Entries = Mutex<HashMap<QueryKey, Entry>>;

/// Transitions buffered per subscriber before the oldest are dropped.
const TRANSITION_CAPACITY: usize = 16;

struct Entry {
  snapshot: EntrySnapshot,
  provides: BTreeSet<Tag>,
  subscribers: usize,
  retention: Duration,
  last_unsubscribe: Option<Instant>,
  fetcher: FetcherFn,
  /// Identifies the fetch whose result may land; older results are dropped.
  fetch_seq: u64,
  eviction: Option<JoinHandle<()>>,
  tx: watch::Sender<EntrySnapshot>,
  /// Every published state in order; the watch channel only keeps the latest.
  transitions: broadcast::Sender<EntrySnapshot>,
}

impl Entry {
  fn new(provides: BTreeSet<Tag>, retention: Duration, fetcher: FetcherFn) -> Self {
    let (tx, _rx) = watch::channel(EntrySnapshot::uninitialized());
    let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
    Self {
      snapshot: EntrySnapshot::uninitialized(),
      provides,
      subscribers: 0,
      retention,
      last_unsubscribe: None,
      fetcher,
      fetch_seq: 0,
      eviction: None,
      tx,
      transitions,
    }
  }

  fn set_status(&mut self, status: CacheStatus) {
    self.snapshot.status = status;
    self.publish();
  }

  fn publish(&self) {
    self.tx.send_replace(self.snapshot.clone());
    // No receivers is fine: nobody is subscribed.
    let _ = self.transitions.send(self.snapshot.clone());
  }

  fn is_expired(&self, now: Instant) -> bool {
    self.subscribers == 0
      && self
        .last_unsubscribe
        .is_some_and(|at| now.duration_since(at) >= self.retention)
  }
}

/// Query result cache shared by every domain of one client.
///
/// Exactly one entry exists per [`QueryKey`]. Entries are created by the first
/// subscription, refreshed through their fetcher, marked stale by
/// [`invalidate`], and evicted once unsubscribed for longer than their
/// retention window. Fetches run on spawned tasks, so a fetch started for a
/// subscriber that goes away still lands for everyone else.
///
/// Must be used from within a tokio runtime.
///
/// [`invalidate`]: CacheStore::invalidate
#[derive(Clone, Default)]
pub struct CacheStore {
  entries: Arc<Entries>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    // Entry mutations never panic midway; a poisoned map is still consistent.
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Subscribe to `key`, fetching if the entry is absent, failed, or stale.
  ///
  /// A subscriber arriving while a fetch is in flight attaches to it. The
  /// returned handle unsubscribes when dropped.
  pub fn subscribe<F, Fut>(
    &self,
    key: QueryKey,
    provides: &[Tag],
    retention: Duration,
    fetcher: F,
  ) -> Subscription
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
  {
    let fetcher: FetcherFn =
      Arc::new(move || -> BoxFuture<'static, Result<Value, ApiError>> { Box::pin(fetcher()) });

    let mut entries = self.lock();
    sweep_expired(&mut entries, Instant::now());

    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(provides.iter().copied().collect(), retention, fetcher));

    if let Some(timer) = entry.eviction.take() {
      timer.abort();
    }
    entry.subscribers += 1;

    let cached_at = match entry.snapshot.status {
      CacheStatus::Fresh => entry.snapshot.fetched_at,
      _ => None,
    };

    match entry.snapshot.status {
      CacheStatus::Fresh | CacheStatus::Fetching => {
        tracing::trace!(key = %key, status = ?entry.snapshot.status, "reusing entry");
      }
      CacheStatus::Uninitialized | CacheStatus::Stale | CacheStatus::Evicted => {
        self.start_fetch(&key, entry);
      }
    }

    let rx = entry.tx.subscribe();
    let transitions = entry.transitions.subscribe();
    drop(entries);

    Subscription {
      key,
      store: self.clone(),
      rx,
      transitions,
      cached_at,
    }
  }

  /// Drop one subscriber from `key`; at zero the retention window starts.
  pub fn unsubscribe(&self, key: &QueryKey) {
    let mut entries = self.lock();
    let Some(entry) = entries.get_mut(key) else {
      return;
    };
    if entry.subscribers == 0 {
      tracing::warn!(key = %key, "unsubscribe without a matching subscription");
      return;
    }

    entry.subscribers -= 1;
    if entry.subscribers > 0 {
      return;
    }

    entry.last_unsubscribe = Some(Instant::now());
    // Without a runtime the entry is reclaimed by the next sweep instead.
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
      let store = Arc::downgrade(&self.entries);
      let retention = entry.retention;
      let key = key.clone();
      entry.eviction = Some(handle.spawn(async move {
        tokio::time::sleep(retention).await;
        evict_if_idle(&store, &key);
      }));
    }
  }

  /// Mark every entry providing any of `tags` stale.
  ///
  /// Entries with subscribers are refetched immediately; the rest stay stale
  /// until the next subscription. In-flight fetches of matching entries are
  /// superseded so their (possibly pre-write) results are discarded. Returns
  /// the number of entries marked.
  pub fn invalidate(&self, tags: &[Tag]) -> usize {
    if tags.is_empty() {
      return 0;
    }

    let mut marked = 0;
    let mut entries = self.lock();
    for (key, entry) in entries.iter_mut() {
      if !entry.provides.iter().any(|t| tags.contains(t)) {
        continue;
      }
      marked += 1;
      entry.fetch_seq += 1;
      entry.set_status(CacheStatus::Stale);
      if entry.subscribers > 0 {
        self.start_fetch(key, entry);
      }
    }

    tracing::debug!(tags = ?tags, marked, "invalidated cache entries");
    marked
  }

  /// Force a new fetch of a subscribed entry, or join the one in flight.
  pub fn refetch(&self, key: &QueryKey) {
    let mut entries = self.lock();
    if let Some(entry) = entries.get_mut(key) {
      if entry.subscribers > 0 && entry.snapshot.status != CacheStatus::Fetching {
        self.start_fetch(key, entry);
      }
    }
  }

  /// Current status of `key`, or `None` if no entry exists.
  pub fn status(&self, key: &QueryKey) -> Option<CacheStatus> {
    self.lock().get(key).map(|e| e.snapshot.status)
  }

  pub fn subscriber_count(&self, key: &QueryKey) -> usize {
    self.lock().get(key).map_or(0, |e| e.subscribers)
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Remove every entry whose retention window has elapsed.
  pub fn evict_expired(&self) -> usize {
    sweep_expired(&mut self.lock(), Instant::now())
  }

  fn start_fetch(&self, key: &QueryKey, entry: &mut Entry) {
    entry.fetch_seq += 1;
    let seq = entry.fetch_seq;
    entry.snapshot.error = None;
    entry.set_status(CacheStatus::Fetching);

    tracing::debug!(key = %key, seq, "fetching");

    let fetch = (entry.fetcher)();
    let store = Arc::downgrade(&self.entries);
    let key = key.clone();
    tokio::spawn(async move {
      let result = fetch.await;
      complete_fetch(&store, &key, seq, result);
    });
  }
}

fn complete_fetch(store: &Weak<Entries>, key: &QueryKey, seq: u64, result: Result<Value, ApiError>) {
  let Some(entries) = store.upgrade() else {
    return;
  };
  let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
  let Some(entry) = entries.get_mut(key) else {
    tracing::debug!(key = %key, "entry evicted before fetch completed");
    return;
  };
  if entry.fetch_seq != seq {
    tracing::debug!(key = %key, seq, "discarding superseded fetch");
    return;
  }

  match result {
    Ok(value) => {
      entry.snapshot.value = Some(value);
      entry.snapshot.fetched_at = Some(Utc::now());
      entry.snapshot.error = None;
      entry.set_status(CacheStatus::Fresh);
    }
    Err(err) => {
      tracing::debug!(key = %key, error = %err, "fetch failed");
      entry.snapshot.error = Some(err);
      let status = if entry.snapshot.value.is_some() {
        CacheStatus::Stale
      } else {
        CacheStatus::Uninitialized
      };
      entry.set_status(status);
    }
  }
}

fn evict_if_idle(store: &Weak<Entries>, key: &QueryKey) {
  let Some(entries) = store.upgrade() else {
    return;
  };
  let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
  let expired = entries
    .get(key)
    .is_some_and(|e| e.is_expired(Instant::now()));
  if expired {
    if let Some(mut entry) = entries.remove(key) {
      entry.set_status(CacheStatus::Evicted);
      tracing::debug!(key = %key, "evicted");
    }
  }
}

fn sweep_expired(entries: &mut HashMap<QueryKey, Entry>, now: Instant) -> usize {
  let before = entries.len();
  entries.retain(|key, entry| {
    let keep = !entry.is_expired(now);
    if !keep {
      entry.set_status(CacheStatus::Evicted);
      tracing::debug!(key = %key, "evicted");
    }
    keep
  });
  before - entries.len()
}

/// A live interest in one cache entry.
///
/// Dropping the handle unsubscribes. A fetch already in flight keeps running
/// for other subscribers; its result is simply not delivered here.
pub struct Subscription {
  key: QueryKey,
  store: CacheStore,
  rx: watch::Receiver<EntrySnapshot>,
  transitions: broadcast::Receiver<EntrySnapshot>,
  /// Fetch time of the value that was already fresh when subscribing.
  cached_at: Option<DateTime<Utc>>,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn snapshot(&self) -> EntrySnapshot {
    self.rx.borrow().clone()
  }

  /// Next state the entry went through since subscribing, in order.
  ///
  /// Unlike [`snapshot`](Self::snapshot) this sees short-lived states such
  /// as STALE right before a refetch. A subscriber that falls too far behind
  /// skips the oldest transitions. Returns `None` once the entry is gone.
  pub async fn changed(&mut self) -> Option<EntrySnapshot> {
    loop {
      match self.transitions.recv().await {
        Ok(snapshot) => return Some(snapshot),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          tracing::debug!(key = %self.key, skipped, "subscriber lagged behind entry transitions");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  /// Wait until the entry is fresh or its latest fetch failed.
  pub async fn settled(&mut self) -> Result<CacheResult<Value>, ApiError> {
    let snapshot = self
      .rx
      .wait_for(EntrySnapshot::is_settled)
      .await
      .map(|s| s.clone())
      .map_err(|_| ApiError::Cancelled)?;

    match (snapshot.status, snapshot.value) {
      (CacheStatus::Fresh, Some(value)) => {
        let source = if self.cached_at.is_some() && self.cached_at == snapshot.fetched_at {
          CacheSource::Cache
        } else {
          CacheSource::Network
        };
        Ok(CacheResult::new(value, source, snapshot.fetched_at))
      }
      _ => Err(snapshot.error.unwrap_or(ApiError::Cancelled)),
    }
  }

  /// Ask for a new fetch of this entry.
  pub fn refetch(&self) {
    self.store.refetch(&self.key);
  }

  /// Explicitly end the subscription. Equivalent to dropping it.
  pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.store.unsubscribe(&self.key);
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .field("status", &self.rx.borrow().status)
      .finish_non_exhaustive()
  }
}
