use anyhow::Context;
use intel_feeds::config::{CacheConfig, FeedsConfig};
use intel_feeds::source_of_record::clock::{BulletinClock, ClockReading};
use intel_feeds::source_of_record::forecast::{Forecast, PointForecast};
use intel_feeds::source_of_record::news::{Article, NewsSource, Provider};
use intel_feeds::source_of_record::posts::{Post, PostBoard};
use intel_feeds::source_of_record::windy::{Webcam, WindyWebcams};
use intel_feeds::{fallback, logging, FetchKey, ManagedCache, NormalizedRecord, PostQuery};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "feeds.toml";

fn load_config() -> anyhow::Result<FeedsConfig> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    if !Path::new(&path).exists() {
        return Ok(FeedsConfig::default());
    }

    FeedsConfig::from_file(&path).with_context(|| format!("failed to load config from {}", path))
}

fn api_key(var: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| {
        warn!("{} is not set, the feed will fall back to bundled data", var);
        String::new()
    })
}

/// Attaches to `key` and logs every view change until the task is aborted.
fn watch_feed<T: NormalizedRecord>(
    label: &'static str,
    cache: ManagedCache<T>,
    key: FetchKey,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = cache.subscribe(key);
        let mut changes = subscription.changes();
        subscription.start();

        while changes.changed().await.is_ok() {
            let view = subscription.view();
            info!(
                feed = label,
                key = %subscription.key(),
                status = ?view.status,
                records = view.data.len(),
                message = view.message.unwrap_or(""),
                "view updated"
            );
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    logging::init(&config.log_level);

    let webcam_fallback = fallback::webcams()?;
    let webcam_ids: Vec<String> = if config.webcams.ids.is_empty() {
        webcam_fallback.records().iter().map(|cam| cam.id.clone()).collect()
    } else {
        config.webcams.ids.clone()
    };
    let webcam_config = config.webcams.timing.apply(CacheConfig::<Webcam>::webcams());
    webcam_config.validate()?;
    let webcam_source = WindyWebcams::new(api_key(&config.webcams.api_key_env))?;
    let webcams = ManagedCache::<Webcam>::builder(Arc::new(webcam_source))
        .config(webcam_config)
        .fallback(webcam_fallback)
        .build();

    let news_config = config.news.timing.apply(CacheConfig::<Article>::news());
    news_config.validate()?;
    let news_source = NewsSource::new()?
        .with_provider(Provider::NewsApi, api_key(&config.news.newsapi_key_env))
        .with_provider(Provider::GNews, api_key(&config.news.gnews_key_env));
    let news = ManagedCache::<Article>::builder(Arc::new(news_source))
        .config(news_config)
        .fallback(fallback::news()?)
        .build();

    let forecast_config = config.forecast.timing.apply(CacheConfig::<Forecast>::forecast());
    forecast_config.validate()?;
    let forecast_source = PointForecast::new(api_key(&config.forecast.api_key_env))?
        .with_model(config.forecast.model.clone());
    let forecast = ManagedCache::<Forecast>::new(Arc::new(forecast_source), forecast_config);

    let clock_config = config.clock.timing.apply(CacheConfig::<ClockReading>::clock());
    clock_config.validate()?;
    let clock_source = BulletinClock::with_feed_url(config.clock.feed_url.clone())?;
    let clock = ManagedCache::<ClockReading>::builder(Arc::new(clock_source))
        .config(clock_config)
        .fallback(fallback::clock()?)
        .build();

    let posts_fallback = fallback::posts()?;
    let board = PostBoard::with_posts(posts_fallback.to_vec());
    let posts = ManagedCache::<Post>::builder(Arc::new(board))
        .config(CacheConfig::<Post>::social_feed())
        .fallback(posts_fallback)
        .build();

    let feeds = vec![
        watch_feed("webcams", webcams, FetchKey::webcams(webcam_ids)),
        watch_feed("news", news, FetchKey::Category(config.news.category.clone())),
        watch_feed(
            "forecast",
            forecast,
            FetchKey::Coordinates {
                lat: config.forecast.lat,
                lon: config.forecast.lon,
            },
        ),
        watch_feed("clock", clock, FetchKey::all()),
        watch_feed("posts", posts.clone(), FetchKey::all()),
        watch_feed(
            "featured posts",
            posts,
            FetchKey::Posts(PostQuery::featured()),
        ),
    ];

    info!("watching {} feeds, press ctrl-c to exit", feeds.len());
    tokio::signal::ctrl_c().await?;

    for feed in feeds {
        feed.abort();
    }
    info!("shutting down");

    Ok(())
}
