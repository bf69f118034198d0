//! Remote data cache.
//!
//! Records are keyed by a logical query key ("posts", "products", ...). A key has at most
//! one fetch in flight at any time; every caller resolving the key while that fetch runs
//! waits on the same settlement. Fetches run on their own task, so a caller that gives up
//! early never cancels the upstream request: the result still lands in the cache.
//!
//! Each fetch carries a sequence token. Invalidating a key orphans its in-flight fetch by
//! issuing a newer token, and a settlement whose token is no longer the latest for its
//! record is discarded instead of overwriting fresher data.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use utoipa::ToSchema;

use crate::error::FetchError;

/// Payload of a successful query, shared between the cache and every reader.
pub type QueryData = Arc<serde_json::Value>;

/// Outcome handed back by a fetch function.
pub type FetchResult = Result<serde_json::Value, FetchError>;

/// QueryStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Error,
    Success,
}

/// QuerySnapshot
///
/// Point-in-time view of one query record. Only built through the constructors below,
/// which keep `data` and `error` mutually exclusive.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuerySnapshot {
    pub key: String,
    pub status: QueryStatus,
    #[schema(value_type = Option<Object>)]
    pub data: Option<QueryData>,
    pub error: Option<FetchError>,
    /// Time of the last successful fetch.
    pub updated_at: Option<DateTime<Utc>>,
    /// A fetch for this key is currently running.
    pub is_fetching: bool,
    /// The data is older than the freshness window or was invalidated.
    pub is_stale: bool,
}

impl QuerySnapshot {
    fn pending(key: &str, is_fetching: bool) -> Self {
        Self {
            key: key.to_string(),
            status: QueryStatus::Pending,
            data: None,
            error: None,
            updated_at: None,
            is_fetching,
            is_stale: true,
        }
    }

    fn success(key: &str, data: QueryData, updated_at: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            updated_at: Some(updated_at),
            is_fetching: false,
            is_stale: false,
        }
    }

    fn failure(key: &str, error: FetchError) -> Self {
        Self {
            key: key.to_string(),
            status: QueryStatus::Error,
            data: None,
            error: Some(error),
            updated_at: None,
            is_fetching: false,
            is_stale: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

enum Settled {
    Success {
        data: QueryData,
        updated_at: DateTime<Utc>,
        fetched_at: Instant,
    },
    Failure {
        error: FetchError,
    },
}

type Settlement = watch::Receiver<Option<QuerySnapshot>>;

struct QueryRecord {
    settled: Option<Settled>,
    invalidated: bool,
    // Token of the most recently started fetch.
    seq: u64,
    in_flight: Option<Settlement>,
    observers: usize,
    // Set whenever the observer count drops to zero.
    released_at: Option<Instant>,
}

impl QueryRecord {
    fn new(now: Instant) -> Self {
        Self {
            settled: None,
            invalidated: false,
            seq: 0,
            in_flight: None,
            observers: 0,
            released_at: Some(now),
        }
    }

    fn is_fresh(&self, stale_time: Duration, now: Instant) -> bool {
        match &self.settled {
            Some(Settled::Success { fetched_at, .. }) => {
                !self.invalidated && now.saturating_duration_since(*fetched_at) < stale_time
            }
            _ => false,
        }
    }

    fn has_data(&self) -> bool {
        matches!(self.settled, Some(Settled::Success { .. }))
    }

    fn snapshot(&self, key: &str, stale_time: Duration, now: Instant) -> QuerySnapshot {
        let mut snapshot = match &self.settled {
            None => QuerySnapshot::pending(key, false),
            Some(Settled::Success {
                data, updated_at, ..
            }) => QuerySnapshot::success(key, data.clone(), *updated_at),
            Some(Settled::Failure { error }) => QuerySnapshot::failure(key, error.clone()),
        };
        snapshot.is_fetching = self.in_flight.is_some();
        if snapshot.is_success() {
            snapshot.is_stale = !self.is_fresh(stale_time, now);
        }
        snapshot
    }
}

struct CacheInner {
    records: Mutex<HashMap<String, QueryRecord>>,
    next_seq: AtomicU64,
    stale_time: Duration,
    gc_time: Duration,
}

impl CacheInner {
    fn issue_token(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Applies a finished fetch to its record, unless a newer fetch has been started since.
    fn settle(&self, key: &str, token: u64, outcome: FetchResult) -> QuerySnapshot {
        let now = Instant::now();
        let mut records = self.records.lock();

        match records.get_mut(key) {
            Some(record) if record.seq == token => {
                record.settled = Some(match outcome {
                    Ok(data) => {
                        tracing::debug!(key, "query settled with data");
                        Settled::Success {
                            data: Arc::new(data),
                            updated_at: Utc::now(),
                            fetched_at: now,
                        }
                    }
                    Err(error) => {
                        tracing::warn!(key, %error, "query settled with error");
                        Settled::Failure { error }
                    }
                });
                record.in_flight = None;
                record.invalidated = false;
                record.snapshot(key, self.stale_time, now)
            }
            _ => {
                tracing::debug!(key, token, "discarding superseded fetch result");
                match outcome {
                    Ok(data) => QuerySnapshot::success(key, Arc::new(data), Utc::now()),
                    Err(error) => QuerySnapshot::failure(key, error),
                }
            }
        }
    }
}

enum Plan {
    Ready(QuerySnapshot),
    Wait(Settlement),
}

impl Plan {
    async fn settle(self, key: &str) -> QuerySnapshot {
        match self {
            Plan::Ready(snapshot) => snapshot,
            Plan::Wait(settlement) => wait_for_settlement(key, settlement).await,
        }
    }
}

/// QueryCache
///
/// Cheap to clone; all clones share the same records. One instance lives for the whole
/// application session inside `AppState`.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                records: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                stale_time,
                gc_time,
            }),
        }
    }

    /// resolve
    ///
    /// Fetch-or-return-cached. Fresh data is returned immediately. Stale data is returned
    /// immediately as well while one background refetch runs. Without usable data the call
    /// waits for the (shared) fetch to settle.
    pub async fn resolve<F, Fut>(&self, key: &str, fetch: F) -> QuerySnapshot
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        if let Some(plan) = self.reuse(key) {
            return plan.settle(key).await;
        }

        // The fetch function runs without the records lock held; another caller may have
        // started a fetch in the meantime, in which case ours is dropped unpolled.
        let fut = fetch();
        let plan = {
            let now = Instant::now();
            let mut records = self.inner.records.lock();
            let record = records
                .entry(key.to_string())
                .or_insert_with(|| QueryRecord::new(now));

            match self.reuse_record(key, record, now) {
                Some(plan) => plan,
                None => {
                    let settlement = self.start(key, record, fut);
                    if record.has_data() {
                        tracing::debug!(key, "serving stale data while revalidating");
                        Plan::Ready(record.snapshot(key, self.inner.stale_time, now))
                    } else {
                        Plan::Wait(settlement)
                    }
                }
            }
        };

        plan.settle(key).await
    }

    /// What `resolve` can answer without a new fetch, if anything.
    fn reuse(&self, key: &str) -> Option<Plan> {
        let now = Instant::now();
        let mut records = self.inner.records.lock();
        let record = records
            .entry(key.to_string())
            .or_insert_with(|| QueryRecord::new(now));
        self.reuse_record(key, record, now)
    }

    fn reuse_record(&self, key: &str, record: &QueryRecord, now: Instant) -> Option<Plan> {
        if let Some(in_flight) = &record.in_flight {
            if record.has_data() {
                Some(Plan::Ready(record.snapshot(key, self.inner.stale_time, now)))
            } else {
                Some(Plan::Wait(in_flight.clone()))
            }
        } else if record.is_fresh(self.inner.stale_time, now) {
            Some(Plan::Ready(record.snapshot(key, self.inner.stale_time, now)))
        } else {
            None
        }
    }

    /// refetch
    ///
    /// Forces a fetch regardless of freshness and waits for it. Joins the running fetch if
    /// one is already in flight.
    pub async fn refetch<F, Fut>(&self, key: &str, fetch: F) -> QuerySnapshot
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let joined = self
            .inner
            .records
            .lock()
            .get(key)
            .and_then(|record| record.in_flight.clone());
        if let Some(in_flight) = joined {
            return wait_for_settlement(key, in_flight).await;
        }

        let fut = fetch();
        let settlement = {
            let now = Instant::now();
            let mut records = self.inner.records.lock();
            let record = records
                .entry(key.to_string())
                .or_insert_with(|| QueryRecord::new(now));

            match &record.in_flight {
                Some(in_flight) => in_flight.clone(),
                None => self.start(key, record, fut),
            }
        };

        wait_for_settlement(key, settlement).await
    }

    /// Current snapshot of `key` without triggering a fetch.
    pub fn peek(&self, key: &str) -> Option<QuerySnapshot> {
        let now = Instant::now();
        self.inner
            .records
            .lock()
            .get(key)
            .map(|record| record.snapshot(key, self.inner.stale_time, now))
    }

    /// invalidate
    ///
    /// Marks `key` stale so the next resolution refetches. A fetch still in flight is
    /// orphaned: its result reaches its own waiters but is not written to the cache.
    /// Returns false when the key is unknown.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut records = self.inner.records.lock();
        let Some(record) = records.get_mut(key) else {
            return false;
        };
        record.invalidated = true;
        if record.in_flight.take().is_some() {
            record.seq = self.inner.issue_token();
        }
        tracing::debug!(key, "query invalidated");
        true
    }

    /// Invalidates every record. Returns how many were marked.
    pub fn invalidate_all(&self) -> usize {
        let keys = self.keys();
        keys.iter().filter(|key| self.invalidate(key)).count()
    }

    /// observe
    ///
    /// Registers a consumer of `key`. While the returned guard is alive the record is
    /// exempt from garbage collection.
    pub fn observe(&self, key: &str) -> QueryObserver {
        let now = Instant::now();
        let mut records = self.inner.records.lock();
        let record = records
            .entry(key.to_string())
            .or_insert_with(|| QueryRecord::new(now));
        record.observers += 1;
        record.released_at = None;

        QueryObserver {
            inner: self.inner.clone(),
            key: key.to_string(),
        }
    }

    /// collect_garbage
    ///
    /// Drops records that nobody observes, that have no fetch in flight, and whose
    /// retention window has elapsed. Returns the number of records removed.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.gc_time;
        let mut records = self.inner.records.lock();
        let before = records.len();

        records.retain(|_, record| {
            record.observers > 0
                || record.in_flight.is_some()
                || record
                    .released_at
                    .is_none_or(|released| now.saturating_duration_since(released) < gc_time)
        });

        before - records.len()
    }

    /// Spawns the periodic garbage collection sweep for this cache.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let removed = cache.collect_garbage();
                if removed > 0 {
                    tracing::debug!(removed, "garbage collected unobserved queries");
                }
            }
        })
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.records.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Starts a fetch for `record` and returns its settlement channel. Caller holds the lock,
    /// so `fut` must already be built.
    fn start<Fut>(&self, key: &str, record: &mut QueryRecord, fut: Fut) -> Settlement
    where
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let token = self.inner.issue_token();
        let (tx, rx) = watch::channel(None);
        record.seq = token;
        record.in_flight = Some(rx.clone());

        tracing::debug!(key, token, "starting fetch");

        let inner = self.inner.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let outcome = match tokio::spawn(fut).await {
                Ok(outcome) => outcome,
                Err(err) => Err(FetchError::Transport {
                    message: format!("fetch task failed: {err}"),
                }),
            };
            let snapshot = inner.settle(&key, token, outcome);
            tx.send_replace(Some(snapshot));
        });

        rx
    }
}

async fn wait_for_settlement(key: &str, mut settlement: Settlement) -> QuerySnapshot {
    let settled = settlement
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|snapshot| snapshot.clone());

    settled.unwrap_or_else(|| {
        QuerySnapshot::failure(
            key,
            FetchError::Transport {
                message: "fetch was dropped before settling".to_string(),
            },
        )
    })
}

/// QueryObserver
///
/// RAII registration of a consumer. Dropping the last observer of a key starts its
/// retention window.
pub struct QueryObserver {
    inner: Arc<CacheInner>,
    key: String,
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        let mut records = self.inner.records.lock();
        if let Some(record) = records.get_mut(&self.key) {
            record.observers = record.observers.saturating_sub(1);
            if record.observers == 0 {
                record.released_at = Some(Instant::now());
            }
        }
    }
}
