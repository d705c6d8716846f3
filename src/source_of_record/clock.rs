//! The Doomsday Clock setting, read from the Bulletin of the Atomic Scientists RSS feed.

use crate::config::CacheConfig;
use crate::error::{ErrorKind, Result};
use crate::key::FetchKey;
use crate::record::NormalizedRecord;
use crate::resolver::MergePolicy;
use crate::source_of_record::{send_text, SourceOfRecord};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const BULLETIN_FEED_URL: &str = "https://thebulletin.org/feed/";
pub const CLOCK_PAGE_URL: &str = "https://thebulletin.org/doomsday-clock/";
pub const CLOCK_ID: &str = "doomsday-clock";
pub const BULLETIN: &str = "Bulletin of the Atomic Scientists";

const FEED_TIMEOUT: Duration = Duration::from_secs(5);

/// Announced settings, newest first: (year, seconds to midnight, announcement date).
const SETTINGS: [(i32, u32, &str); 8] = [
    (2024, 90, "2024-01-24"),
    (2023, 90, "2023-01-24"),
    (2022, 100, "2022-01-20"),
    (2021, 100, "2021-01-27"),
    (2020, 100, "2020-01-23"),
    (2019, 120, "2019-01-24"),
    (2018, 120, "2018-01-25"),
    (2017, 150, "2017-01-26"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockChange {
    pub year: i32,
    pub seconds_to_midnight: u32,
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockReading {
    pub id: String,
    pub seconds_to_midnight: u32,
    pub last_updated: DateTime<Utc>,
    pub statement: String,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub history: Vec<ClockChange>,
}

impl NormalizedRecord for ClockReading {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.statement
    }

    fn link(&self) -> Option<&str> {
        Some(&self.url)
    }
}

impl CacheConfig<ClockReading> {
    /// The clock moves at most once a year.
    pub fn clock() -> Self {
        CacheConfig {
            stale_time: Duration::from_secs(60 * 60),
            refresh_interval: None,
            cache_time: Duration::from_secs(24 * 60 * 60),
            max_retries: 2,
            merge: MergePolicy::Replace,
            ..CacheConfig::default()
        }
    }
}

/// Scans the feed for the latest clock announcement. A feed without one yields no records, so
/// the bundled reading is shown instead.
pub struct BulletinClock {
    client: reqwest::Client,
    feed_url: String,
}

impl BulletinClock {
    pub fn new() -> Result<Self> {
        Self::with_feed_url(BULLETIN_FEED_URL)
    }

    pub fn with_feed_url(feed_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(FEED_TIMEOUT).build()?;

        Ok(BulletinClock {
            client,
            feed_url: feed_url.into(),
        })
    }
}

#[async_trait]
impl SourceOfRecord<ClockReading> for BulletinClock {
    fn name(&self) -> &str {
        "bulletin-clock"
    }

    fn timeout(&self, _key: &FetchKey) -> Duration {
        FEED_TIMEOUT
    }

    async fn retrieve(&self, key: &FetchKey) -> std::result::Result<Vec<ClockReading>, ErrorKind> {
        if *key != FetchKey::all() {
            return Err(ErrorKind::NotFound);
        }

        let feed = send_text(self.client.get(&self.feed_url)).await?;
        match parse_feed(&feed, Utc::now()) {
            Some(reading) => {
                debug!(seconds = reading.seconds_to_midnight, "found clock announcement");
                Ok(vec![reading])
            }
            None => {
                warn!("no clock announcement in feed");
                Ok(Vec::new())
            }
        }
    }
}

/// Reads the first feed item that announces a clock setting. Minutes are converted to seconds.
pub fn parse_feed(feed: &str, now: DateTime<Utc>) -> Option<ClockReading> {
    let items = Regex::new(r"(?s)<item>(.*?)</item>").ok()?;
    let setting =
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s+(seconds|minutes)\s+to\s+midnight").ok()?;

    let reading = items.captures_iter(feed).find_map(|item| {
        let item = item.get(1)?.as_str();
        let text = format!(
            "{} {}",
            tag_text(item, "title").unwrap_or_default(),
            tag_text(item, "description").unwrap_or_default()
        );
        if !text.to_lowercase().contains("doomsday clock") {
            return None;
        }

        let found = setting.captures(&text)?;
        let amount: f64 = found.get(1)?.as_str().parse().ok()?;
        let seconds = if found.get(2)?.as_str().eq_ignore_ascii_case("minutes") {
            amount * 60.0
        } else {
            amount
        };
        if seconds < 1.0 {
            return None;
        }
        let seconds = seconds.round() as u32;

        let last_updated = tag_text(item, "pubDate")
            .and_then(|stamp| DateTime::parse_from_rfc2822(&stamp).ok())
            .map_or(now, |stamp| stamp.with_timezone(&Utc));
        let url = tag_text(item, "link")
            .filter(|link| link.starts_with("http"))
            .unwrap_or_else(|| CLOCK_PAGE_URL.to_string());

        Some(ClockReading {
            id: CLOCK_ID.to_string(),
            seconds_to_midnight: seconds,
            statement: format!(
                "The Doomsday Clock stands at {} to midnight.",
                describe(seconds)
            ),
            source: BULLETIN.to_string(),
            url,
            history: history_with(last_updated, seconds),
            last_updated,
        })
    });
    reading
}

fn tag_text(item: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?s)<{tag}>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</{tag}>")).ok()?;
    let text = re.captures(item)?.get(1)?.as_str().trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn describe(seconds: u32) -> String {
    if seconds >= 120 && seconds % 60 == 0 {
        format!("{} minutes", seconds / 60)
    } else {
        format!("{} seconds", seconds)
    }
}

/// Known settings, with `seconds` prepended when it was announced after the newest one.
pub fn history_with(announced: DateTime<Utc>, seconds: u32) -> Vec<ClockChange> {
    let mut history: Vec<ClockChange> = SETTINGS
        .iter()
        .map(|(year, seconds, date)| ClockChange {
            year: *year,
            seconds_to_midnight: *seconds,
            date: date.to_string(),
        })
        .collect();

    if history.first().map_or(true, |latest| announced.year() > latest.year) {
        history.insert(
            0,
            ClockChange {
                year: announced.year(),
                seconds_to_midnight: seconds,
                date: announced.format("%Y-%m-%d").to_string(),
            },
        );
    }
    history
}
