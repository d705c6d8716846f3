//! Turns fetch outcomes, cached state and static fallback data into what a consumer renders.

use crate::error::ErrorKind;
use crate::fallback::FallbackSet;
use crate::key::FetchKey;
use crate::record::{validate_records, NormalizedRecord, RecordPredicate};
use crate::source_of_record::FetchResult;
use crate::store::CacheEntry;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing has completed for the key yet.
    Loading,
    /// Data from the most recent successful fetch, or an explicit empty result.
    Live,
    /// Previously fetched data served because the latest refresh failed or is overdue.
    Stale,
    /// Bundled static data, used when neither live nor cached data is usable.
    Fallback,
    Error,
}

/// How a successful fetch combines with records already cached for the same key.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum MergePolicy {
    /// Point-in-time snapshot: the new records replace the cached ones wholesale.
    Replace,
    /// Growing feed: new records are appended, de-duplicated by id. A newer copy of a known id
    /// replaces the older one in place.
    Append,
}

/// Derived on every read; never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedView<T> {
    pub data: Vec<T>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T> ResolvedView<T> {
    pub fn loading() -> Self {
        ResolvedView {
            data: Vec::new(),
            status: Status::Loading,
            error: None,
            message: None,
        }
    }

    fn with(status: Status, data: Vec<T>) -> Self {
        ResolvedView {
            data,
            status,
            error: None,
            message: None,
        }
    }

    fn failed(kind: ErrorKind) -> Self {
        ResolvedView {
            data: Vec::new(),
            status: Status::Error,
            error: Some(kind),
            message: Some(kind.user_message()),
        }
    }

    /// Single-record sources (one webcam, one forecast) expose their record here.
    pub fn first(&self) -> Option<&T> {
        self.data.first()
    }

    /// Whether the consumer has something to render.
    pub fn is_renderable(&self) -> bool {
        !matches!(self.status, Status::Loading | Status::Error)
    }
}

/// Settings the resolver needs when folding a completed fetch into the cache.
pub struct Resolution<'a, T> {
    pub stale_time: Duration,
    pub merge: MergePolicy,
    pub validate: Option<&'a RecordPredicate<T>>,
}

/// Folds a completed fetch into the entry for its key.
///
/// Successful results are validated record by record; the accepted set is replaced or merged
/// per policy and its freshness window restarts. Failures only record the outcome, so the
/// previously accepted records stay available for serve-stale.
pub fn apply<T: NormalizedRecord>(
    prior: Option<CacheEntry<T>>,
    key: &FetchKey,
    outcome: FetchResult<Vec<T>>,
    resolution: &Resolution<'_, T>,
) -> CacheEntry<T> {
    let mut entry = prior.unwrap_or_else(|| CacheEntry::pending(key.clone()));

    match outcome {
        FetchResult::Pending => {}
        FetchResult::Success { value, fetched_at } => {
            let received = value.len();
            let valid = validate_records(value, resolution.validate);
            debug!(%key, received, accepted = valid.len(), "validated fetch result");

            let accepted = match resolution.merge {
                MergePolicy::Replace => valid.clone(),
                MergePolicy::Append if !entry.is_expired(fetched_at) => {
                    append(std::mem::take(&mut entry.accepted), valid.clone())
                }
                MergePolicy::Append => valid.clone(),
            };

            entry.accepted = accepted;
            entry.expires_at = Some(fetched_at + resolution.stale_time);
            entry.result = FetchResult::Success {
                value: valid,
                fetched_at,
            };
        }
        failure @ FetchResult::Failure { .. } => {
            entry.result = failure;
        }
    }

    entry
}

fn append<T: NormalizedRecord>(mut existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let mut positions: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(index, record)| (record.id().to_string(), index))
        .collect();

    for record in incoming {
        match positions.get(record.id()) {
            Some(&index) => existing[index] = record,
            None => {
                positions.insert(record.id().to_string(), existing.len());
                existing.push(record);
            }
        }
    }

    existing
}

/// Computes the view for one key at `now`.
///
/// Precedence when several conditions hold: an authorization failure without fallback data is
/// an error, then fallback, then stale, then live, then loading.
pub fn resolve<T: NormalizedRecord>(
    entry: Option<&CacheEntry<T>>,
    fallback: Option<&FallbackSet<T>>,
    now: Instant,
) -> ResolvedView<T> {
    let fallback = fallback.filter(|set| !set.is_empty());
    let substitute = || fallback.map(|set| ResolvedView::with(Status::Fallback, set.to_vec()));

    let Some(entry) = entry else {
        return ResolvedView::loading();
    };

    match &entry.result {
        FetchResult::Pending if entry.accepted.is_empty() => ResolvedView::loading(),
        FetchResult::Pending | FetchResult::Success { .. } => {
            if entry.accepted.is_empty() {
                substitute().unwrap_or_else(|| ResolvedView::with(Status::Live, Vec::new()))
            } else if entry.is_expired(now) {
                ResolvedView::with(Status::Stale, entry.accepted.clone())
            } else {
                ResolvedView::with(Status::Live, entry.accepted.clone())
            }
        }
        FetchResult::Failure { kind, .. } => {
            if *kind == ErrorKind::Unauthorized {
                return substitute().unwrap_or_else(|| ResolvedView::failed(*kind));
            }
            if entry.has_usable_data(now) {
                return ResolvedView::with(Status::Stale, entry.accepted.clone());
            }
            substitute().unwrap_or_else(|| ResolvedView::failed(*kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::Item;
    use std::sync::Arc;

    const STALE: Duration = Duration::from_secs(8 * 60);

    fn key() -> FetchKey {
        FetchKey::Webcam("123".into())
    }

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter()
            .map(|id| Item::linked(id, &format!("cam {}", id), &format!("https://x.test/{}", id)))
            .collect()
    }

    fn fallback() -> FallbackSet<Item> {
        FallbackSet::new("test-1", items(&["f1", "f2", "f3", "f4", "f5"]))
    }

    fn resolution(merge: MergePolicy) -> Resolution<'static, Item> {
        Resolution {
            stale_time: STALE,
            merge,
            validate: None,
        }
    }

    fn success(records: Vec<Item>, at: Instant) -> FetchResult<Vec<Item>> {
        FetchResult::Success {
            value: records,
            fetched_at: at,
        }
    }

    fn failure(kind: ErrorKind, at: Instant) -> FetchResult<Vec<Item>> {
        FetchResult::Failure { kind, fetched_at: at }
    }

    #[test]
    fn nothing_fetched_is_loading() {
        let view = resolve::<Item>(None, Some(&fallback()), Instant::now());
        assert_eq!(view.status, Status::Loading);
        assert!(view.data.is_empty());

        let pending = CacheEntry::<Item>::pending(key());
        assert_eq!(resolve(Some(&pending), None, Instant::now()).status, Status::Loading);
    }

    #[test]
    fn malformed_records_are_dropped_from_live_data() {
        let now = Instant::now();
        let mut records = items(&["1", "2", "3"]);
        records.push(Item::linked("4", "", "https://x.test/4"));

        let entry = apply(None, &key(), success(records, now), &resolution(MergePolicy::Replace));
        let view = resolve(Some(&entry), Some(&fallback()), now);

        assert_eq!(view.status, Status::Live);
        assert_eq!(view.data.len(), 3);
    }

    #[test]
    fn zero_valid_records_fall_back_or_resolve_empty() {
        let now = Instant::now();
        let entry = apply(
            None,
            &key(),
            success(vec![Item::linked("1", "cam", "#")], now),
            &resolution(MergePolicy::Replace),
        );

        assert_eq!(resolve(Some(&entry), Some(&fallback()), now).status, Status::Fallback);

        let view = resolve(Some(&entry), None, now);
        assert_eq!(view.status, Status::Live);
        assert!(view.data.is_empty());
        assert_eq!(view.error, None);
    }

    #[test]
    fn failure_within_freshness_serves_prior_data() {
        let t0 = Instant::now();
        let entry = apply(None, &key(), success(items(&["1", "2"]), t0), &resolution(MergePolicy::Replace));
        let t1 = t0 + Duration::from_secs(120);
        let entry = apply(Some(entry), &key(), failure(ErrorKind::Timeout, t1), &resolution(MergePolicy::Replace));

        let view = resolve(Some(&entry), Some(&fallback()), t1);
        assert_eq!(view.status, Status::Stale);
        assert_eq!(view.data, items(&["1", "2"]));
    }

    #[test]
    fn failure_after_expiry_uses_fallback_then_error() {
        let t0 = Instant::now();
        let entry = apply(None, &key(), success(items(&["1"]), t0), &resolution(MergePolicy::Replace));
        let t1 = t0 + STALE + Duration::from_secs(1);
        let entry = apply(Some(entry), &key(), failure(ErrorKind::NetworkError, t1), &resolution(MergePolicy::Replace));

        let view = resolve(Some(&entry), Some(&fallback()), t1);
        assert_eq!(view.status, Status::Fallback);
        assert!(view.data.iter().all(|record| fallback().contains(record)));

        let view = resolve(Some(&entry), None, t1);
        assert_eq!(view.status, Status::Error);
        assert_eq!(view.error, Some(ErrorKind::NetworkError));
    }

    #[test]
    fn unauthorized_beats_stale_without_fallback() {
        let t0 = Instant::now();
        let entry = apply(None, &key(), success(items(&["1"]), t0), &resolution(MergePolicy::Replace));
        let entry = apply(Some(entry), &key(), failure(ErrorKind::Unauthorized, t0), &resolution(MergePolicy::Replace));

        let view = resolve(Some(&entry), None, t0);
        assert_eq!(view.status, Status::Error);
        assert_eq!(view.error, Some(ErrorKind::Unauthorized));
        assert!(view.message.unwrap().contains("check API key"));

        let view = resolve(Some(&entry), Some(&fallback()), t0);
        assert_eq!(view.status, Status::Fallback);
        assert_eq!(view.data.len(), 5);
    }

    #[test]
    fn overdue_success_is_reported_stale() {
        let t0 = Instant::now();
        let entry = apply(None, &key(), success(items(&["1"]), t0), &resolution(MergePolicy::Replace));

        let view = resolve(Some(&entry), None, t0 + STALE + Duration::from_secs(1));
        assert_eq!(view.status, Status::Stale);
        assert_eq!(view.data.len(), 1);
    }

    #[test]
    fn empty_fallback_set_counts_as_absent() {
        let now = Instant::now();
        let entry = apply(None, &key(), failure(ErrorKind::NotFound, now), &resolution(MergePolicy::Replace));
        let empty = FallbackSet::<Item>::new("empty", Vec::new());

        let view = resolve(Some(&entry), Some(&empty), now);
        assert_eq!(view.status, Status::Error);
        assert_eq!(view.error, Some(ErrorKind::NotFound));
    }

    #[test]
    fn replace_policy_drops_previous_records() {
        let t0 = Instant::now();
        let entry = apply(None, &key(), success(items(&["1", "2"]), t0), &resolution(MergePolicy::Replace));
        let entry = apply(Some(entry), &key(), success(items(&["3"]), t0), &resolution(MergePolicy::Replace));

        assert_eq!(entry.accepted, items(&["3"]));
    }

    #[test]
    fn append_policy_accumulates_and_dedupes() {
        let t0 = Instant::now();
        let entry = apply(None, &key(), success(items(&["1", "2"]), t0), &resolution(MergePolicy::Append));

        let mut update = items(&["2", "3"]);
        update[0].title = "cam 2 (edited)".into();
        let entry = apply(Some(entry), &key(), success(update, t0), &resolution(MergePolicy::Append));

        let ids: Vec<&str> = entry.accepted.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(entry.accepted[1].title, "cam 2 (edited)");
    }

    #[test]
    fn append_policy_restarts_after_expiry() {
        let t0 = Instant::now();
        let entry = apply(None, &key(), success(items(&["1"]), t0), &resolution(MergePolicy::Append));
        let later = t0 + STALE + Duration::from_secs(1);
        let entry = apply(Some(entry), &key(), success(items(&["2"]), later), &resolution(MergePolicy::Append));

        assert_eq!(entry.accepted, items(&["2"]));
    }

    #[test]
    fn predicate_applies_before_acceptance() {
        let now = Instant::now();
        let predicate: RecordPredicate<Item> = Arc::new(|item: &Item| item.id != "2");
        let resolution = Resolution {
            stale_time: STALE,
            merge: MergePolicy::Replace,
            validate: Some(&predicate),
        };

        let entry = apply(None, &key(), success(items(&["1", "2"]), now), &resolution);
        assert_eq!(entry.accepted, items(&["1"]));
    }
}
