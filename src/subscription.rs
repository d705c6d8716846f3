use crate::hydration::polling::PollingHandle;
use crate::hydration::Trigger;
use crate::key::FetchKey;
use crate::managed_cache::ManagedCache;
use crate::record::NormalizedRecord;
use crate::resolver::ResolvedView;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// A consumer attached to one key of a [`ManagedCache`].
///
/// While active the subscription keeps its key retained and, when the cache is configured with a
/// refresh interval, drives a polling timer for it. Moving to another key releases the old one
/// first, so a late result for the old key can never show up under the new one.
pub struct Subscription<T: NormalizedRecord> {
    id: Uuid,
    cache: ManagedCache<T>,
    key: FetchKey,
    active: bool,
    poller: Option<PollingHandle>,
}

impl<T: NormalizedRecord> Subscription<T> {
    pub(crate) fn new(cache: ManagedCache<T>, key: FetchKey) -> Self {
        Subscription {
            id: Uuid::new_v4(),
            cache,
            key,
            active: false,
            poller: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &FetchKey {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Attaches to the cache. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.active {
            return;
        }

        self.active = true;
        self.cache.retain(&self.key);
        self.start_polling();
        info!(id = %self.id, key = %self.key, source = self.cache.source_name(), "subscription started");

        self.spawn_fetch(Trigger::Mount);
    }

    pub fn stop(&mut self) {
        if !self.active {
            return;
        }

        self.active = false;
        self.stop_polling();
        self.cache.release(&self.key);
        info!(id = %self.id, key = %self.key, "subscription stopped");
    }

    /// Switches to another key. A no-op when the key is unchanged.
    pub fn set_key(&mut self, key: FetchKey) {
        if key == self.key {
            return;
        }

        if !self.active {
            self.key = key;
            return;
        }

        self.stop_polling();
        self.cache.release(&self.key);
        debug!(id = %self.id, from = %self.key, to = %key, "switching key");

        self.key = key;
        self.cache.retain(&self.key);
        self.start_polling();
        self.spawn_fetch(Trigger::KeyChange);
    }

    /// Fetches now and returns the resulting view. An inactive subscription just reports the
    /// current view.
    pub async fn refresh_now(&self) -> ResolvedView<T> {
        if self.active {
            self.cache.refresh(&self.key).await;
        }
        self.view()
    }

    pub fn view(&self) -> ResolvedView<T> {
        self.cache.view(&self.key)
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.cache.changes()
    }

    fn spawn_fetch(&self, trigger: Trigger) {
        if !self.cache.needs_fetch(trigger, &self.key) {
            return;
        }

        let cache = self.cache.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            cache.refresh_with(&key, trigger).await;
        });
    }

    fn start_polling(&mut self) {
        if let Some(period) = self.cache.config().refresh_interval {
            self.poller = Some(PollingHandle::start(
                self.cache.clone(),
                self.key.clone(),
                period,
            ));
        }
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }
}

impl<T: NormalizedRecord> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
