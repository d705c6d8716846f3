mod common;

use common::{cam, Scripted};
use intel_feeds::record::validate_records;
use intel_feeds::source_of_record::windy::{self, Webcam};
use intel_feeds::{CacheConfig, ErrorKind, FallbackSet, FetchKey, ManagedCache, Status};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn no_retries() -> CacheConfig<Webcam> {
    CacheConfig {
        max_retries: 0,
        ..CacheConfig::<Webcam>::webcams()
    }
}

fn fallback() -> FallbackSet<Webcam> {
    FallbackSet::new(
        "test",
        vec![cam("f1", "Fallback 1"), cam("f2", "Fallback 2"), cam("f3", "Fallback 3")],
    )
}

fn cache(
    source: Arc<Scripted<Webcam>>,
    config: CacheConfig<Webcam>,
    fallback: Option<FallbackSet<Webcam>>,
) -> ManagedCache<Webcam> {
    let builder = ManagedCache::<Webcam>::builder(source).config(config);
    match fallback {
        Some(set) => builder.fallback(set).build(),
        None => builder.build(),
    }
}

#[test]
fn validating_twice_accepts_the_same_records() {
    let mut untitled = cam("4", "");
    untitled.title.clear();
    let mut unlinked = cam("5", "No link");
    unlinked.url = "#".to_string();
    let raw = vec![cam("1", "One"), cam("2", "Two"), untitled, unlinked, cam("3", "Three")];

    let once = validate_records(raw, None);
    let twice = validate_records(once.clone(), None);
    assert_eq!(once.len(), 3);
    assert_eq!(once, twice);
}

#[tokio::test(start_paused = true)]
async fn fallback_views_only_contain_fallback_records() {
    let outcomes = [
        Ok(Vec::new()),
        Err(ErrorKind::Unauthorized),
        Err(ErrorKind::NetworkError),
        Ok(vec![cam("", "No id")]),
    ];

    for outcome in outcomes {
        let key = FetchKey::Webcam("1".into());
        let source = Arc::new(Scripted::new().then(&key, Duration::ZERO, outcome));
        let cache = cache(source, no_retries(), Some(fallback()));
        cache.retain(&key);
        cache.refresh(&key).await;

        let view = cache.view(&key);
        assert_eq!(view.status, Status::Fallback);
        let set = fallback();
        assert!(view.data.iter().all(|record| set.contains(record)));
        assert_eq!(view.data.len(), set.len());
    }
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_serves_the_prior_records() {
    let key = FetchKey::Webcam("1".into());
    let records = vec![cam("1", "Bridge Cam")];
    let source = Arc::new(
        Scripted::new()
            .then(&key, Duration::ZERO, Ok(records.clone()))
            .then(&key, Duration::ZERO, Err(ErrorKind::NetworkError)),
    );
    let cache = cache(source, no_retries(), Some(fallback()));
    cache.retain(&key);

    cache.refresh(&key).await;
    assert_eq!(cache.view(&key).status, Status::Live);

    tokio::time::advance(Duration::from_secs(60)).await;
    cache.refresh(&key).await;
    let view = cache.view(&key);
    assert_eq!(view.status, Status::Stale);
    assert_eq!(view.data, records);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_beats_cached_data() {
    let key = FetchKey::Webcam("1".into());
    let script = || {
        Arc::new(
            Scripted::new()
                .then(&key, Duration::ZERO, Ok(vec![cam("1", "Bridge Cam")]))
                .then(&key, Duration::ZERO, Err(ErrorKind::Unauthorized)),
        )
    };

    let without_fallback = cache(script(), no_retries(), None);
    without_fallback.retain(&key);
    without_fallback.refresh(&key).await;
    without_fallback.refresh(&key).await;
    let view = without_fallback.view(&key);
    assert_eq!(view.status, Status::Error);
    assert_eq!(view.error, Some(ErrorKind::Unauthorized));
    assert!(view.data.is_empty());
    assert!(view.message.unwrap().contains("API key"));

    let with_fallback = cache(script(), no_retries(), Some(fallback()));
    with_fallback.retain(&key);
    with_fallback.refresh(&key).await;
    with_fallback.refresh(&key).await;
    assert_eq!(with_fallback.view(&key).status, Status::Fallback);
}

#[tokio::test(start_paused = true)]
async fn empty_webcam_list_falls_back() {
    let key = FetchKey::Webcam("123".into());
    let empty = windy::normalize(&json!({ "webcams": [] }));
    let source = Arc::new(Scripted::new().then(&key, Duration::ZERO, Ok(empty)));
    let cache = cache(source, no_retries(), Some(fallback()));
    cache.retain(&key);

    cache.refresh(&key).await;
    let view = cache.view(&key);
    assert_eq!(view.status, Status::Fallback);
    assert_eq!(view.data.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn malformed_records_are_dropped_from_live_data() {
    let key = FetchKey::webcams(["1", "2", "3", "4"]);
    let raw = windy::normalize(&json!({
        "webcams": [
            { "id": "1", "title": "One", "url": "https://x.test/1" },
            { "id": "2", "title": "Two", "url": "https://x.test/2" },
            { "id": "3", "url": "https://x.test/3" },
            { "id": "4", "title": "Four", "url": "https://x.test/4" }
        ]
    }));
    let source = Arc::new(Scripted::new().then(&key, Duration::ZERO, Ok(raw)));
    let cache = cache(source, no_retries(), Some(fallback()));
    cache.retain(&key);

    cache.refresh(&key).await;
    let view = cache.view(&key);
    assert_eq!(view.status, Status::Live);
    let ids: Vec<&str> = view.data.iter().map(|cam| cam.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "4"]);
}

#[tokio::test(start_paused = true)]
async fn timeout_serves_recent_cache_as_stale() {
    let key = FetchKey::Webcam("123".into());
    let records = vec![cam("123", "Bridge Cam")];
    let source = Arc::new(
        Scripted::new()
            .then(&key, Duration::ZERO, Ok(records.clone()))
            .then(&key, Duration::from_secs(30), Ok(vec![cam("123", "Too late")])),
    );
    let cache = cache(source.clone(), CacheConfig::<Webcam>::webcams(), Some(fallback()));
    cache.retain(&key);

    cache.refresh(&key).await;
    tokio::time::advance(Duration::from_secs(2 * 60)).await;

    let outcome = cache.refresh(&key).await;
    assert_eq!(outcome.error(), Some(ErrorKind::Timeout));
    assert_eq!(source.calls(), 1 + 1 + CacheConfig::<Webcam>::webcams().max_retries as usize);

    let view = cache.view(&key);
    assert_eq!(view.status, Status::Stale);
    assert_eq!(view.data, records);
}

#[tokio::test(start_paused = true)]
async fn stale_data_expires_into_fallback() {
    let key = FetchKey::Webcam("1".into());
    let source = Arc::new(
        Scripted::new()
            .then(&key, Duration::ZERO, Ok(vec![cam("1", "Bridge Cam")]))
            .then(&key, Duration::ZERO, Err(ErrorKind::NetworkError)),
    );
    let cache = cache(source, no_retries(), Some(fallback()));
    cache.retain(&key);
    cache.refresh(&key).await;

    tokio::time::advance(Duration::from_secs(9 * 60)).await;
    assert_eq!(cache.view(&key).status, Status::Stale);

    cache.refresh(&key).await;
    assert_eq!(cache.view(&key).status, Status::Fallback);
}
