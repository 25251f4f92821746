//! Cached queries and uncached mutations.
//!
//! Every [`Query`] result lives in an entry keyed by the operation's name and
//! the request it produced. The first [`Subscription`] to an entry kicks off
//! the fetch on a background task, and everyone else subscribing while it is
//! in flight shares that one request. Entries outlive their last subscriber
//! by a grace period so navigating back and forth doesn't refetch
//! everything, then they are evicted.

use crate::{
    endpoints::{Mutation, Query},
    transport::{Request, Transport, TransportError},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    collections::HashMap,
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle, time::Instant};

/// How long an entry with no subscribers is kept around by default.
pub const DEFAULT_KEEP_UNUSED_FOR: Duration = Duration::from_secs(60);

/// The raw state of a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState {
    Uninitialized,
    Loading,
    Success(Value),
    Error(TransportError),
}

/// Why a query or mutation didn't produce a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("{}", _0)]
    Transport(#[from] TransportError),
    #[error("Unable to decode the response: {}", _0)]
    Decode(String),
    #[error("The cache was reset before the request completed")]
    Reset,
}

impl RequestError {
    /// The message the backend attached to the failure, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            RequestError::Transport(e) => e.message(),
            _ => None,
        }
    }
}

/// What a UI component sees when it subscribes to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<RequestError>,
}

impl<T: DeserializeOwned> QueryState<T> {
    fn from_cache(state: &CacheState) -> Self {
        let mut query_state = QueryState {
            data: None,
            is_loading: false,
            is_error: false,
            error: None,
        };

        match state {
            CacheState::Uninitialized => {},
            CacheState::Loading => query_state.is_loading = true,
            CacheState::Success(raw) => {
                match serde_json::from_value(raw.clone()) {
                    Ok(data) => query_state.data = Some(data),
                    Err(e) => {
                        query_state.is_error = true;
                        query_state.error =
                            Some(RequestError::Decode(e.to_string()));
                    },
                }
            },
            CacheState::Error(e) => {
                query_state.is_error = true;
                query_state.error = Some(RequestError::Transport(e.clone()));
            },
        }

        query_state
    }
}

impl<T> QueryState<T> {
    pub fn into_result(self) -> Result<T, RequestError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(err)) => Err(err),
            (None, None) => Err(RequestError::Reset),
        }
    }
}

struct Entry {
    /// Distinguishes this entry from a later one with the same key.
    id: u64,
    name: &'static str,
    request: Request,
    state: watch::Sender<CacheState>,
    subscribers: usize,
    idle_since: Option<Instant>,
    generation: u64,
    fetch: Option<JoinHandle<()>>,
}

impl Entry {
    fn is_expired(&self, now: Instant, keep_unused_for: Duration) -> bool {
        self.subscribers == 0
            && self
                .idle_since
                .map_or(false, |since| now.duration_since(since) >= keep_unused_for)
    }

    /// Stop any in-flight fetch and tell existing subscribers the data is
    /// gone. The channel closes once the entry is dropped.
    fn discard(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        self.state.send_replace(CacheState::Uninitialized);
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    keep_unused_for: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

/// A shared cache of query results.
///
/// Cloning is cheap and every clone refers to the same entries. Subscribing
/// spawns tasks, so it must happen inside a tokio runtime.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<Shared>,
}

impl QueryCache {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        QueryCache::with_grace_period(transport, DEFAULT_KEEP_UNUSED_FOR)
    }

    pub fn with_grace_period(
        transport: Arc<dyn Transport>,
        keep_unused_for: Duration,
    ) -> Self {
        QueryCache {
            shared: Arc::new(Shared {
                transport,
                keep_unused_for,
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> { &self.shared.transport }

    /// Start watching a query's result, fetching it if nobody has yet.
    pub fn subscribe<Q: Query>(&self, args: &Q::Args) -> Subscription<Q> {
        let request = Q::request(args);
        let key = format!("{}:{}", Q::NAME, request.identity());

        let mut entries = self.entries();
        self.evict_expired_locked(&mut entries);

        let shared = &self.shared;
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            let (state, _) = watch::channel(CacheState::Uninitialized);
            Entry {
                id: shared.next_id.fetch_add(1, Ordering::Relaxed),
                name: Q::NAME,
                request,
                state,
                subscribers: 0,
                idle_since: None,
                generation: 0,
                fetch: None,
            }
        });

        entry.subscribers += 1;
        entry.idle_since = None;

        // failures are never served from the cache, the next subscriber
        // gets another attempt
        let needs_fetch = matches!(
            *entry.state.borrow(),
            CacheState::Uninitialized | CacheState::Error(_)
        );
        if needs_fetch {
            self.start_fetch(&key, entry);
        }

        Subscription {
            cache: self.clone(),
            entry_id: entry.id,
            receiver: entry.state.subscribe(),
            key,
            _query: PhantomData,
        }
    }

    /// Subscribe to a query and wait for it to settle.
    pub async fn fetch<Q: Query>(
        &self,
        args: &Q::Args,
    ) -> Result<Q::Output, RequestError> {
        let mut subscription = self.subscribe::<Q>(args);
        subscription.resolved().await.into_result()
    }

    pub fn mutation<M: Mutation>(&self) -> MutationHandle<M> {
        MutationHandle {
            cache: self.clone(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            _mutation: PhantomData,
        }
    }

    /// Send a one-off mutation.
    pub async fn trigger<M: Mutation>(
        &self,
        args: &M::Args,
    ) -> Result<M::Output, RequestError> {
        self.mutation::<M>().trigger(args).await
    }

    /// Mark every entry for the named queries as stale. Entries somebody is
    /// watching get refetched, the rest are dropped.
    pub fn invalidate(&self, names: &[&str]) {
        if names.is_empty() {
            return;
        }

        let mut entries = self.entries();
        let mut unwatched = Vec::new();

        for (key, entry) in entries.iter_mut() {
            if !names.contains(&entry.name) {
                continue;
            }

            if entry.subscribers > 0 {
                log::debug!("Refetching {} after invalidation", key);
                self.start_fetch(key, entry);
            } else {
                unwatched.push(key.clone());
            }
        }

        for key in unwatched {
            if let Some(mut entry) = entries.remove(&key) {
                log::trace!("Dropping {} after invalidation", key);
                entry.discard();
            }
        }
    }

    /// Forget every cached result.
    ///
    /// In-flight fetches are cancelled and current subscribers see the
    /// `Uninitialized` state, after which they stop receiving updates.
    pub fn reset(&self) {
        let mut entries = self.entries();

        if entries.is_empty() {
            return;
        }

        log::debug!("Resetting {} cached queries", entries.len());
        for (_, mut entry) in entries.drain() {
            entry.discard();
        }
    }

    /// Drop entries which have gone unused for longer than the grace period.
    pub fn evict_expired(&self) {
        let mut entries = self.entries();
        self.evict_expired_locked(&mut entries);
    }

    /// The number of cached entries.
    pub fn len(&self) -> usize { self.entries().len() }

    pub fn is_empty(&self) -> bool { self.entries().is_empty() }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_expired_locked(&self, entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        let keep_unused_for = self.shared.keep_unused_for;

        entries.retain(|key, entry| {
            if entry.is_expired(now, keep_unused_for) {
                log::trace!("Evicting {}", key);
                entry.discard();
                false
            } else {
                true
            }
        });
    }

    fn start_fetch(&self, key: &str, entry: &mut Entry) {
        if let Some(previous) = entry.fetch.take() {
            previous.abort();
        }

        entry.generation += 1;
        entry.state.send_replace(CacheState::Loading);

        let cache = self.clone();
        let key = key.to_string();
        let request = entry.request.clone();
        let entry_id = entry.id;
        let generation = entry.generation;

        log::debug!("Fetching {}", key);
        entry.fetch = Some(tokio::spawn(async move {
            let outcome = cache.shared.transport.send(request).await;
            cache.complete(&key, entry_id, generation, outcome);
        }));
    }

    fn complete(
        &self,
        key: &str,
        entry_id: u64,
        generation: u64,
        outcome: Result<Value, TransportError>,
    ) {
        let mut entries = self.entries();

        match entries.get_mut(key) {
            Some(entry)
                if entry.id == entry_id && entry.generation == generation =>
            {
                entry.fetch = None;
                let state = match outcome {
                    Ok(data) => CacheState::Success(data),
                    Err(e) => {
                        log::debug!("Fetching {} failed: {}", key, e);
                        CacheState::Error(e)
                    },
                };
                entry.state.send_replace(state);
            },
            _ => log::trace!("Discarding a stale response for {}", key),
        }
    }

    fn refetch(&self, key: &str, entry_id: u64) {
        let mut entries = self.entries();

        if let Some(entry) = entries.get_mut(key) {
            if entry.id == entry_id {
                self.start_fetch(key, entry);
            }
        }
    }

    fn release(&self, key: &str, entry_id: u64) {
        let mut entries = self.entries();

        let evict_now = match entries.get_mut(key) {
            Some(entry) if entry.id == entry_id => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                if entry.subscribers == 0 {
                    entry.idle_since = Some(Instant::now());
                    self.shared.keep_unused_for == Duration::from_secs(0)
                } else {
                    false
                }
            },
            _ => false,
        };

        if evict_now {
            if let Some(mut entry) = entries.remove(key) {
                entry.discard();
            }
        }
    }
}

/// A live view of one query's cache entry.
///
/// Dropping the subscription lets the entry expire. A subscription that
/// outlived a [`QueryCache::reset()`] stays `Uninitialized` for good;
/// subscribe again to fetch fresh data.
pub struct Subscription<Q: Query> {
    cache: QueryCache,
    key: String,
    entry_id: u64,
    receiver: watch::Receiver<CacheState>,
    _query: PhantomData<fn() -> Q>,
}

impl<Q: Query> Subscription<Q> {
    pub fn key(&self) -> &str { &self.key }

    pub fn state(&self) -> QueryState<Q::Output> {
        QueryState::from_cache(&self.receiver.borrow())
    }

    /// Wait for the entry to change. Returns `false` once the entry has been
    /// reset or evicted and no more updates will arrive.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until the query is no longer loading.
    pub async fn resolved(&mut self) -> QueryState<Q::Output> {
        loop {
            let loading =
                matches!(*self.receiver.borrow_and_update(), CacheState::Loading);

            if !loading || self.receiver.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Send the request again, going back to the loading state.
    pub fn refetch(&self) { self.cache.refetch(&self.key, self.entry_id); }
}

impl<Q: Query> Drop for Subscription<Q> {
    fn drop(&mut self) { self.cache.release(&self.key, self.entry_id); }
}

/// A way to trigger a [`Mutation`] while keeping track of whether it is in
/// flight.
pub struct MutationHandle<M: Mutation> {
    cache: QueryCache,
    in_flight: Arc<AtomicUsize>,
    _mutation: PhantomData<fn() -> M>,
}

impl<M: Mutation> Clone for MutationHandle<M> {
    fn clone(&self) -> Self {
        MutationHandle {
            cache: self.cache.clone(),
            in_flight: Arc::clone(&self.in_flight),
            _mutation: PhantomData,
        }
    }
}

impl<M: Mutation> MutationHandle<M> {
    pub fn is_loading(&self) -> bool { self.in_flight.load(Ordering::SeqCst) > 0 }

    /// Send the mutation. Every call sends exactly one request.
    pub async fn trigger(&self, args: &M::Args) -> Result<M::Output, RequestError> {
        let request = M::request(args);
        let _in_flight = InFlight::start(&self.in_flight);

        log::debug!("Triggering {}", M::NAME);
        let raw = self.cache.shared.transport.send(request).await?;

        self.cache.invalidate(M::INVALIDATES);

        serde_json::from_value(raw).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) { self.0.fetch_sub(1, Ordering::SeqCst); }
}
