use crate::error::{Error, Result};
use crate::hydration::RetryPolicy;
use crate::record::RecordPredicate;
use crate::resolver::MergePolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-subscription freshness, refresh and acceptance settings.
pub struct CacheConfig<T> {
    /// How long a successful fetch is served as fresh, and how long it may still back a failed
    /// refresh as stale data.
    pub stale_time: Duration,
    /// Proactive refresh period while a subscription is attached. `None` disables polling.
    pub refresh_interval: Option<Duration>,
    /// Lifetime of upstream credentials embedded in the data, when the source has one.
    pub token_lifetime: Option<Duration>,
    /// Additional attempts after a retryable failure.
    pub max_retries: u32,
    /// Base delay between attempts; the n-th retry waits n times this.
    pub retry_delay: Duration,
    /// How long an entry nobody subscribes to is kept before eviction.
    pub cache_time: Duration,
    pub merge: MergePolicy,
    pub validate: Option<RecordPredicate<T>>,
}

impl<T> Clone for CacheConfig<T> {
    fn clone(&self) -> Self {
        CacheConfig {
            stale_time: self.stale_time,
            refresh_interval: self.refresh_interval,
            token_lifetime: self.token_lifetime,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            cache_time: self.cache_time,
            merge: self.merge,
            validate: self.validate.clone(),
        }
    }
}

impl<T> Default for CacheConfig<T> {
    fn default() -> Self {
        CacheConfig {
            stale_time: Duration::from_secs(5 * 60),
            refresh_interval: None,
            token_lifetime: None,
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            cache_time: Duration::from_secs(10 * 60),
            merge: MergePolicy::Replace,
            validate: None,
        }
    }
}

impl<T> CacheConfig<T> {
    /// Refreshes at 80% of the credential lifetime so consumers never hold an expired token.
    pub fn for_token_lifetime(lifetime: Duration) -> Self {
        let refresh = lifetime.mul_f64(0.8);
        CacheConfig {
            stale_time: refresh,
            refresh_interval: Some(refresh),
            token_lifetime: Some(lifetime),
            ..CacheConfig::default()
        }
    }

    pub fn with_predicate(mut self, predicate: RecordPredicate<T>) -> Self {
        self.validate = Some(predicate);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: self.retry_delay,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stale_time.is_zero() {
            return Err(Error::Config("stale_time must be positive".into()));
        }
        if self.refresh_interval.map_or(false, |interval| interval.is_zero()) {
            return Err(Error::Config("refresh_interval must be positive".into()));
        }
        if let Some(lifetime) = self.token_lifetime {
            match self.refresh_interval {
                Some(interval) if interval < lifetime => {}
                Some(interval) => {
                    return Err(Error::Config(format!(
                        "refresh_interval {:?} does not outrun token lifetime {:?}",
                        interval, lifetime
                    )))
                }
                None => {
                    return Err(Error::Config(
                        "sources with expiring tokens need a refresh_interval".into(),
                    ))
                }
            }
        }

        Ok(())
    }
}

/// Optional overrides for a source's timing preset, all in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timing {
    pub stale_time_secs: Option<u64>,
    pub refresh_interval_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub cache_time_secs: Option<u64>,
}

impl Timing {
    pub fn apply<T>(&self, mut config: CacheConfig<T>) -> CacheConfig<T> {
        if let Some(secs) = self.stale_time_secs {
            config.stale_time = Duration::from_secs(secs);
        }
        if let Some(secs) = self.refresh_interval_secs {
            config.refresh_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(secs) = self.cache_time_secs {
            config.cache_time = Duration::from_secs(secs);
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebcamsSection {
    #[serde(default)]
    pub ids: Vec<String>,

    #[serde(default = "default_windy_key_env")]
    pub api_key_env: String,

    #[serde(flatten)]
    pub timing: Timing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSection {
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default = "default_newsapi_key_env")]
    pub newsapi_key_env: String,

    #[serde(default = "default_gnews_key_env")]
    pub gnews_key_env: String,

    #[serde(flatten)]
    pub timing: Timing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSection {
    #[serde(default = "default_lat")]
    pub lat: f64,

    #[serde(default = "default_lon")]
    pub lon: f64,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_windy_key_env")]
    pub api_key_env: String,

    #[serde(flatten)]
    pub timing: Timing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSection {
    #[serde(default = "default_clock_feed_url")]
    pub feed_url: String,

    #[serde(flatten)]
    pub timing: Timing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub webcams: WebcamsSection,

    #[serde(default)]
    pub news: NewsSection,

    #[serde(default)]
    pub forecast: ForecastSection,

    #[serde(default)]
    pub clock: ClockSection,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_windy_key_env() -> String {
    "WINDY_API_KEY".to_string()
}

fn default_newsapi_key_env() -> String {
    "NEWS_API_KEY".to_string()
}

fn default_gnews_key_env() -> String {
    "GNEWS_API_KEY".to_string()
}

fn default_clock_feed_url() -> String {
    crate::source_of_record::clock::BULLETIN_FEED_URL.to_string()
}

fn default_lat() -> f64 {
    crate::source_of_record::forecast::DEFAULT_COORDINATES.0
}

fn default_lon() -> f64 {
    crate::source_of_record::forecast::DEFAULT_COORDINATES.1
}

fn default_model() -> String {
    "gfs".to_string()
}

impl Default for WebcamsSection {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            api_key_env: default_windy_key_env(),
            timing: Timing::default(),
        }
    }
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            category: None,
            newsapi_key_env: default_newsapi_key_env(),
            gnews_key_env: default_gnews_key_env(),
            timing: Timing::default(),
        }
    }
}

impl Default for ForecastSection {
    fn default() -> Self {
        Self {
            lat: default_lat(),
            lon: default_lon(),
            model: default_model(),
            api_key_env: default_windy_key_env(),
            timing: Timing::default(),
        }
    }
}

impl Default for ClockSection {
    fn default() -> Self {
        Self {
            feed_url: default_clock_feed_url(),
            timing: Timing::default(),
        }
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            webcams: WebcamsSection::default(),
            news: NewsSection::default(),
            forecast: ForecastSection::default(),
            clock: ClockSection::default(),
        }
    }
}

impl FeedsConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
