use crate::hydration::RetryPolicy;
use crate::key::FetchKey;
use crate::source_of_record::{FetchResult, Fetcher};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{error, warn};

pub type SharedFetch<T> = Shared<BoxFuture<'static, FetchResult<Vec<T>>>>;

/// Runs one logical fetch: the first attempt plus any retries the policy allows.
pub async fn fetch_with_retry<T>(
    fetcher: &Fetcher<T>,
    key: &FetchKey,
    policy: &RetryPolicy,
) -> FetchResult<Vec<T>> {
    let mut retries = 0;

    loop {
        let outcome = fetcher.fetch(key).await;

        let kind = match outcome.error() {
            None => return outcome,
            Some(kind) => kind,
        };

        if !policy.should_retry(kind, retries) {
            if kind.is_terminal() || retries > 0 {
                error!(source = fetcher.source_name(), %key, %kind, retries, "giving up on fetch");
            }
            return outcome;
        }

        retries += 1;
        let delay = policy.backoff(retries);
        warn!(
            source = fetcher.source_name(),
            %key,
            %kind,
            "retrying in {:?} ({}/{})",
            delay,
            retries,
            policy.max_retries
        );
        tokio::time::sleep(delay).await;
    }
}

/// At most one fetch per key is in flight. Later callers join the running one.
pub struct InFlight<T> {
    running: Mutex<HashMap<FetchKey, SharedFetch<T>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        InFlight {
            running: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> InFlight<T> {
    /// Returns the running fetch for `key`, or starts the one built by `start`.
    ///
    /// A started fetch is spawned onto the runtime, so it completes even when every caller
    /// stops waiting for it.
    pub fn join_or_start<F>(&self, key: &FetchKey, start: F) -> SharedFetch<T>
    where
        F: FnOnce() -> BoxFuture<'static, FetchResult<Vec<T>>>,
    {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(fetch) = running.get(key) {
            return fetch.clone();
        }

        let fetch = start().shared();
        running.insert(key.clone(), fetch.clone());
        tokio::spawn(fetch.clone());
        fetch
    }

    /// Called by the fetch itself once its result has been applied.
    pub fn finish(&self, key: &FetchKey) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn is_running(&self, key: &FetchKey) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}
