//! Freshness, retry and fallback resolution for dashboard feeds backed by unreliable
//! third-party APIs.
//!
//! A [`ManagedCache`] wraps one [`SourceOfRecord`]. Consumers attach to keys through a
//! [`Subscription`] and render the [`ResolvedView`] it reports: live data while fetches succeed,
//! the last good data when refreshes fail, and a bundled [`FallbackSet`] when nothing fetched is
//! usable.

pub mod config;
pub mod error;
pub mod fallback;
pub mod hydration;
pub mod key;
pub mod logging;
pub mod managed_cache;
pub mod record;
pub mod resolver;
pub mod source_of_record;
pub mod store;
pub mod subscription;

pub use config::{CacheConfig, FeedsConfig};
pub use error::{Error, ErrorKind, Result};
pub use fallback::FallbackSet;
pub use hydration::Trigger;
pub use key::{FetchKey, PostQuery};
pub use managed_cache::ManagedCache;
pub use record::NormalizedRecord;
pub use resolver::{MergePolicy, ResolvedView, Status};
pub use source_of_record::{FetchResult, SourceOfRecord};
pub use subscription::Subscription;
