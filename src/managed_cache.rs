use crate::config::CacheConfig;
use crate::fallback::FallbackSet;
use crate::hydration::pull::{fetch_with_retry, InFlight};
use crate::hydration::Trigger;
use crate::key::FetchKey;
use crate::record::NormalizedRecord;
use crate::resolver::{self, Resolution, ResolvedView};
use crate::source_of_record::{FetchResult, Fetcher, SourceOfRecord};
use crate::store::memory::MemoryStore;
use crate::store::retention::RetainedStore;
use crate::store::{CacheEntry, CacheStoreStrategy};
use crate::subscription::Subscription;
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One source of record, its cache, its fallback data and its refresh machinery.
///
/// Every clone shares the same state. Build one per source and hand clones to subscribers.
pub struct ManagedCache<T: NormalizedRecord> {
    inner: Arc<Inner<T>>,
}

impl<T: NormalizedRecord> Clone for ManagedCache<T> {
    fn clone(&self) -> Self {
        ManagedCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: NormalizedRecord> {
    fetcher: Fetcher<T>,
    config: CacheConfig<T>,
    fallback: Option<FallbackSet<T>>,
    store: Mutex<RetainedStore<CacheEntry<T>>>,
    in_flight: InFlight<T>,
    generation: watch::Sender<u64>,
}

pub struct ManagedCacheBuilder<T: NormalizedRecord> {
    source: Arc<dyn SourceOfRecord<T>>,
    config: CacheConfig<T>,
    fallback: Option<FallbackSet<T>>,
    store: Option<Box<dyn CacheStoreStrategy<FetchKey, CacheEntry<T>>>>,
}

impl<T: NormalizedRecord> ManagedCacheBuilder<T> {
    pub fn config(mut self, config: CacheConfig<T>) -> Self {
        self.config = config;
        self
    }

    pub fn fallback(mut self, fallback: FallbackSet<T>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Replaces the default in-memory store.
    pub fn store(mut self, store: Box<dyn CacheStoreStrategy<FetchKey, CacheEntry<T>>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> ManagedCache<T> {
        let store = self.store.unwrap_or_else(|| Box::new(MemoryStore::new()));
        let (generation, _) = watch::channel(0);

        ManagedCache {
            inner: Arc::new(Inner {
                fetcher: Fetcher::new(self.source),
                store: Mutex::new(RetainedStore::new(self.config.cache_time, store)),
                config: self.config,
                fallback: self.fallback,
                in_flight: InFlight::default(),
                generation,
            }),
        }
    }
}

impl<T: NormalizedRecord> ManagedCache<T> {
    pub fn builder(source: Arc<dyn SourceOfRecord<T>>) -> ManagedCacheBuilder<T> {
        ManagedCacheBuilder {
            source,
            config: CacheConfig::default(),
            fallback: None,
            store: None,
        }
    }

    pub fn new(source: Arc<dyn SourceOfRecord<T>>, config: CacheConfig<T>) -> Self {
        Self::builder(source).config(config).build()
    }

    pub fn config(&self) -> &CacheConfig<T> {
        &self.inner.config
    }

    pub fn fallback(&self) -> Option<&FallbackSet<T>> {
        self.inner.fallback.as_ref()
    }

    pub fn source_name(&self) -> &str {
        self.inner.fetcher.source_name()
    }

    /// The view a consumer should render for `key` right now.
    pub fn view(&self, key: &FetchKey) -> ResolvedView<T> {
        let entry = self.inner.lock_store().get(key);
        resolver::resolve(entry.as_ref(), self.fallback(), Instant::now())
    }

    pub fn entry(&self, key: &FetchKey) -> Option<CacheEntry<T>> {
        self.inner.lock_store().get(key)
    }

    /// Registers interest in a key. Results for keys nobody retains are discarded.
    pub fn retain(&self, key: &FetchKey) {
        let mut store = self.inner.lock_store();
        let subscribers = store.retain(key);
        if !store.contains(key) {
            store.put(key, CacheEntry::pending(key.clone()));
        }
        debug!(%key, subscribers, "retained key");
    }

    pub fn release(&self, key: &FetchKey) {
        let now = Instant::now();
        let mut store = self.inner.lock_store();
        let subscribers = store.release(key, now);
        store.evict_expired(now);
        debug!(%key, subscribers, "released key");
    }

    pub fn is_retained(&self, key: &FetchKey) -> bool {
        self.inner.lock_store().is_retained(key)
    }

    pub fn is_fetching(&self, key: &FetchKey) -> bool {
        self.inner.in_flight.is_running(key)
    }

    pub fn needs_fetch(&self, trigger: Trigger, key: &FetchKey) -> bool {
        let entry = self.entry(key);
        trigger.should_fetch(entry.as_ref(), Instant::now())
    }

    /// Manual refresh. Always fetches unless a fetch for the key is already running, in which
    /// case it waits for that one instead of issuing another request.
    pub async fn refresh(&self, key: &FetchKey) -> FetchResult<Vec<T>> {
        self.refresh_with(key, Trigger::Manual).await
    }

    pub async fn refresh_with(&self, key: &FetchKey, trigger: Trigger) -> FetchResult<Vec<T>> {
        if !self.needs_fetch(trigger, key) {
            debug!(%key, ?trigger, "entry is fresh, skipping fetch");
            return self
                .entry(key)
                .map(|entry| entry.result)
                .unwrap_or(FetchResult::Pending);
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let fetch = self.inner.in_flight.join_or_start(key, move || {
            async move {
                debug!(key = %owned_key, ?trigger, "starting fetch");
                let outcome =
                    fetch_with_retry(&inner.fetcher, &owned_key, &inner.config.retry_policy())
                        .await;
                inner.apply(&owned_key, outcome.clone());
                inner.in_flight.finish(&owned_key);
                outcome
            }
            .boxed()
        });

        fetch.await
    }

    /// Bumped after every applied fetch.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }

    pub fn subscribe(&self, key: FetchKey) -> Subscription<T> {
        Subscription::new(self.clone(), key)
    }

    /// Drops every cached entry. Subscriptions stay attached and refill on their next fetch.
    pub fn flush(&self) {
        let mut store = self.inner.lock_store();
        let retained: Vec<FetchKey> = store
            .get_keys()
            .filter(|key| store.is_retained(key))
            .collect();
        store.flush();
        for key in &retained {
            store.put(key, CacheEntry::pending(key.clone()));
        }
        drop(store);

        self.inner.generation.send_modify(|generation| *generation += 1);
        info!(source = self.source_name(), "flushed cache");
    }
}

impl<T: NormalizedRecord> Inner<T> {
    fn lock_store(&self) -> MutexGuard<'_, RetainedStore<CacheEntry<T>>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, key: &FetchKey, outcome: FetchResult<Vec<T>>) {
        let now = Instant::now();
        let mut store = self.lock_store();

        if !store.is_retained(key) {
            warn!(%key, "discarding result for a key nobody subscribes to");
            store.evict_expired(now);
            return;
        }

        let resolution = Resolution {
            stale_time: self.config.stale_time,
            merge: self.config.merge,
            validate: self.config.validate.as_ref(),
        };
        let entry = resolver::apply(store.get(key), key, outcome, &resolution);
        store.put(key, entry);
        store.evict_expired(now);
        drop(store);

        self.generation.send_modify(|generation| *generation += 1);
    }
}
