use crate::hydration::Trigger;
use crate::key::FetchKey;
use crate::managed_cache::ManagedCache;
use crate::record::NormalizedRecord;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Owns the periodic refresh task for one subscription. Dropping the handle stops the timer; a
/// fetch already started by it still runs to completion.
pub struct PollingHandle {
    task: JoinHandle<()>,
    period: Duration,
}

impl PollingHandle {
    /// Must be called from within a tokio runtime. The first tick fires one `period` from now;
    /// the initial fetch belongs to the mount or key-change trigger.
    pub fn start<T: NormalizedRecord>(
        cache: ManagedCache<T>,
        key: FetchKey,
        period: Duration,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!(%key, "interval refresh");
                cache.refresh_with(&key, Trigger::Interval).await;
            }
        });

        PollingHandle { task, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
