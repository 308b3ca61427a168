//! Query cache with tag-based invalidation.
//!
//! Every read goes through [`QueryCache::query`] under a [`CacheKey`] and
//! declares the [`Tag`]s it provides. Writes go through
//! [`QueryCache::mutate`] and name the tags they invalidate. A read issued
//! after a successful write that invalidated one of its tags always
//! refetches, and identical reads issued concurrently share one request.

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::error::AppResult;

// ---------------------------------------------------------------------------
// Keys and tags
// ---------------------------------------------------------------------------

/// Identity of a cached read: endpoint plus canonical JSON of its arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub endpoint: &'static str,
    pub args: String,
}

impl CacheKey {
    pub fn new<A: Serialize + ?Sized>(endpoint: &'static str, args: &A) -> Self {
        // Serializing plain data (strings, enums, numbers) does not fail.
        let args = serde_json::to_string(args).unwrap_or_default();
        Self { endpoint, args }
    }

    pub fn unit(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            args: String::new(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.endpoint, self.args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Book,
    Borrow,
}

/// Label grouping cache entries that must be invalidated together.
///
/// A tag without an id stands for the whole kind: invalidating it also
/// invalidates every id-scoped tag of that kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub id: Option<String>,
}

impl Tag {
    pub fn books() -> Self {
        Self { kind: TagKind::Book, id: None }
    }

    pub fn book(id: impl Into<String>) -> Self {
        Self { kind: TagKind::Book, id: Some(id.into()) }
    }

    pub fn borrows() -> Self {
        Self { kind: TagKind::Borrow, id: None }
    }

    /// Whether invalidating `self` invalidates entries providing `provided`
    pub fn covers(&self, provided: &Tag) -> bool {
        self.kind == provided.kind && (self.id.is_none() || self.id == provided.id)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{:?}:{}", self.kind, id),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

type Settled = Option<AppResult<Value>>;

struct Entry {
    value: Value,
    valid: bool,
    fetched_at: Instant,
}

struct InFlight {
    generation: u64,
    result: watch::Receiver<Settled>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    tags: HashMap<Tag, HashSet<CacheKey>>,
    in_flight: HashMap<CacheKey, InFlight>,
    next_generation: u64,
}

impl CacheState {
    fn register(&mut self, key: &CacheKey, provides: &[Tag]) {
        for tag in provides {
            self.tags.entry(tag.clone()).or_default().insert(key.clone());
        }
    }

    /// Remove `key` from every tag set, dropping sets left empty
    fn unregister(&mut self, key: &CacheKey) {
        self.tags.retain(|_, keys| {
            keys.remove(key);
            !keys.is_empty()
        });
    }

    /// Release a key that neither holds a value nor has a request in flight
    fn release_if_unused(&mut self, key: &CacheKey) {
        if !self.entries.contains_key(key) && !self.in_flight.contains_key(key) {
            self.unregister(key);
        }
    }

    fn covered_keys(&self, tags: &[Tag]) -> HashSet<CacheKey> {
        self.tags
            .iter()
            .filter(|(provided, _)| tags.iter().any(|t| t.covers(provided)))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    fn fresh_value(&self, key: &CacheKey, stale_after: Option<Duration>) -> Option<Value> {
        let entry = self.entries.get(key)?;
        let expired = stale_after.is_some_and(|ttl| entry.fetched_at.elapsed() >= ttl);
        (entry.valid && !expired).then(|| entry.value.clone())
    }
}

enum Role {
    Hit(Value),
    Wait(watch::Receiver<Settled>),
    Lead(u64, watch::Sender<Settled>),
}

/// Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
    stale_after: Option<Duration>,
}

impl QueryCache {
    pub fn new(stale_after: Option<Duration>) -> Self {
        Self {
            state: Arc::default(),
            stale_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, key: &CacheKey, provides: &[Tag]) -> Role {
        let mut state = self.lock();
        if let Some(value) = state.fresh_value(key, self.stale_after) {
            return Role::Hit(value);
        }
        if let Some(flight) = state.in_flight.get(key) {
            return Role::Wait(flight.result.clone());
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let (tx, rx) = watch::channel(None);
        state.in_flight.insert(key.clone(), InFlight { generation, result: rx });
        state.register(key, provides);
        Role::Lead(generation, tx)
    }

    /// Serve `key` from the cache, join the request already in flight for
    /// it, or run `fetch` and store its value.
    ///
    /// Failures are returned as-is and leave any previous value in place.
    pub async fn query<F, Fut>(&self, key: CacheKey, provides: &[Tag], fetch: F) -> AppResult<Value>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<Value>>,
    {
        loop {
            match self.claim(&key, provides) {
                Role::Hit(value) => {
                    tracing::debug!(%key, "Cache hit");
                    return Ok(value);
                }
                Role::Wait(mut rx) => {
                    tracing::debug!(%key, "Joining in-flight request");
                    loop {
                        let settled = (*rx.borrow_and_update()).clone();
                        if let Some(result) = settled {
                            return result;
                        }
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                    // Check the channel once more: the leader may have sent
                    // right before dropping its sender.
                    let settled = (*rx.borrow()).clone();
                    if let Some(result) = settled {
                        return result;
                    }
                    tracing::debug!(%key, "In-flight request was abandoned, retrying");
                }
                Role::Lead(generation, tx) => {
                    tracing::debug!(%key, "Cache miss, fetching");
                    let mut guard = FlightGuard {
                        cache: self,
                        key: &key,
                        generation,
                        armed: true,
                    };
                    let result = fetch().await;
                    guard.settle(&result);
                    // Nobody listening is fine.
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// Run a write and, only if it succeeds, invalidate `invalidates`
    /// before returning.
    pub async fn mutate<T, Fut>(&self, invalidates: &[Tag], run: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        let output = run.await?;
        self.invalidate(invalidates);
        Ok(output)
    }

    /// Mark every entry depending on `tags` invalid and detach their
    /// in-flight requests. Returns the number of keys affected.
    pub fn invalidate(&self, tags: &[Tag]) -> usize {
        let mut state = self.lock();
        let keys = state.covered_keys(tags);

        for key in &keys {
            if let Some(entry) = state.entries.get_mut(key) {
                entry.valid = false;
            }
            state.in_flight.remove(key);
        }

        let names: Vec<String> = tags.iter().map(Tag::to_string).collect();
        tracing::debug!(tags = ?names, affected = keys.len(), "Invalidated cache tags");
        keys.len()
    }

    /// Drop every entry depending on `tags` along with its tag
    /// registrations. In-flight requests are detached. Returns the number
    /// of keys removed.
    pub fn evict(&self, tags: &[Tag]) -> usize {
        let mut state = self.lock();
        let keys = state.covered_keys(tags);

        for key in &keys {
            state.entries.remove(key);
            state.in_flight.remove(key);
            state.unregister(key);
        }

        tracing::debug!(removed = keys.len(), "Evicted cache entries");
        keys.len()
    }

    /// Last stored value for `key`, valid or not
    pub fn peek(&self, key: &CacheKey) -> Option<Value> {
        self.lock().entries.get(key).map(|e| e.value.clone())
    }

    pub fn is_valid(&self, key: &CacheKey) -> bool {
        self.lock().fresh_value(key, self.stale_after).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and tag registration. Requests already in flight
    /// finish without writing back.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.tags.clear();
        state.in_flight.clear();
    }
}

/// Releases the key if the leading fetch is dropped before it settles
struct FlightGuard<'a> {
    cache: &'a QueryCache,
    key: &'a CacheKey,
    generation: u64,
    armed: bool,
}

impl FlightGuard<'_> {
    /// Finish the flight. Only a flight still attached to its key may
    /// write: a detached one was invalidated while running.
    fn settle(&mut self, result: &AppResult<Value>) {
        self.armed = false;
        let mut state = self.cache.lock();
        let attached = state
            .in_flight
            .get(self.key)
            .is_some_and(|f| f.generation == self.generation);
        if !attached {
            tracing::debug!(key = %self.key, "Discarding result of invalidated request");
            state.release_if_unused(self.key);
            return;
        }
        state.in_flight.remove(self.key);

        match result {
            Ok(value) => {
                state.entries.insert(
                    self.key.clone(),
                    Entry {
                        value: value.clone(),
                        valid: true,
                        fetched_at: Instant::now(),
                    },
                );
            }
            Err(e) => {
                tracing::debug!(key = %self.key, "Fetch failed, cache untouched: {}", e);
                state.release_if_unused(self.key);
            }
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.cache.lock();
        if state
            .in_flight
            .get(self.key)
            .is_some_and(|f| f.generation == self.generation)
        {
            state.in_flight.remove(self.key);
            state.release_if_unused(self.key);
        }
    }
}
