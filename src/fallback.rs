//! Static "known-good" records bundled with the application.

use crate::error::Result;
use crate::source_of_record::clock::ClockReading;
use crate::source_of_record::news::Article;
use crate::source_of_record::posts::Post;
use crate::source_of_record::windy::Webcam;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

const NEWS_JSON: &str = include_str!("../data/fallback_news.json");
const WEBCAMS_JSON: &str = include_str!("../data/fallback_webcams.json");
const POSTS_JSON: &str = include_str!("../data/fallback_posts.json");
const CLOCK_JSON: &str = include_str!("../data/fallback_clock.json");

/// An ordered, immutable list of records. Cloning shares the underlying storage.
#[derive(Debug)]
pub struct FallbackSet<T> {
    version: String,
    records: Arc<[T]>,
}

impl<T> Clone for FallbackSet<T> {
    fn clone(&self) -> Self {
        FallbackSet {
            version: self.version.clone(),
            records: Arc::clone(&self.records),
        }
    }
}

#[derive(Deserialize)]
struct Bundle<T> {
    version: String,
    records: Vec<T>,
}

impl<T> FallbackSet<T> {
    pub fn new(version: impl Into<String>, records: Vec<T>) -> Self {
        FallbackSet {
            version: version.into(),
            records: records.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<T: Clone> FallbackSet<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.records.to_vec()
    }
}

impl<T: PartialEq> FallbackSet<T> {
    pub fn contains(&self, record: &T) -> bool {
        self.records.contains(record)
    }
}

impl<T: DeserializeOwned> FallbackSet<T> {
    /// Parses a `{ "version": ..., "records": [...] }` bundle.
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: Bundle<T> = serde_json::from_str(json)?;
        Ok(FallbackSet::new(bundle.version, bundle.records))
    }
}

/// Curated articles shown when no news provider delivers.
pub fn news() -> Result<FallbackSet<Article>> {
    FallbackSet::from_json(NEWS_JSON)
}

/// The high-alert webcam list.
pub fn webcams() -> Result<FallbackSet<Webcam>> {
    FallbackSet::from_json(WEBCAMS_JSON)
}

pub fn posts() -> Result<FallbackSet<Post>> {
    FallbackSet::from_json(POSTS_JSON)
}

/// The last announced clock setting.
pub fn clock() -> Result<FallbackSet<ClockReading>> {
    FallbackSet::from_json(CLOCK_JSON)
}
