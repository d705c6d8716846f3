//! News articles from NewsAPI with GNews as the backup provider.

use crate::config::CacheConfig;
use crate::error::{ErrorKind, Result};
use crate::key::FetchKey;
use crate::record::{validate_records, NormalizedRecord, RecordPredicate};
use crate::resolver::MergePolicy;
use crate::source_of_record::{send_json, str_at, SourceOfRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";
pub const GNEWS_URL: &str = "https://gnews.io/api/v4/search";

// GNews rejects long queries, so it only receives the leading keywords.
const GNEWS_KEYWORD_LIMIT: usize = 5;
const BREAKING_WINDOW_HOURS: i64 = 2;

pub const SEARCH_KEYWORDS: &[&str] = &[
    "nuclear weapon", "atomic", "doomsday", "nuclear threat", "nuclear missile", "nuclear test",
    "nuclear arsenal", "atomic scientists", "nuclear war", "nuclear attack", "fallout",
    "radiation", "uranium", "plutonium", "nuclear proliferation", "nuclear deterrence",
    "treaty", "climate catastrophe", "climate emergency", "extinction", "global catastrophe",
    "existential risk", "apocalypse", "nuclear treaty", "arms control", "doomsday clock",
    "radiation leak", "nuclear power", "nuclear accident", "nuclear disaster", "ICBM",
    "ballistic missile", "hydrogen bomb", "nuclear winter", "mutually assured destruction",
    "nuclear command", "strategic forces", "nuclear policy", "nuclear posture", "first strike",
    "second strike", "nuclear silo", "missile defense", "nuclear submarine", "radiation fallout",
    "uranium enrichment", "centrifuge", "plutonium production", "nuclear facility",
    "strategic bomber", "tactical nuclear", "kiloton", "megaton", "warhead",
    "nuclear stockpile", "disarmament", "bulletin atomic", "rocket", "explosion", "nuclear alert",
];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    Nuclear,
    Military,
    Climate,
    Diplomacy,
    Technology,
    General,
}

impl NewsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::Nuclear => "nuclear",
            NewsCategory::Military => "military",
            NewsCategory::Climate => "climate",
            NewsCategory::Diplomacy => "diplomacy",
            NewsCategory::Technology => "technology",
            NewsCategory::General => "general",
        }
    }

    /// First matching rule wins, in the order below.
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        let has_word = |word: &str| {
            text.split(|c: char| !c.is_alphanumeric())
                .any(|token| token == word)
        };

        if text.contains("nuclear") || text.contains("atomic") {
            NewsCategory::Nuclear
        } else if text.contains("missile") || text.contains("icbm") || text.contains("rocket") {
            NewsCategory::Military
        } else if text.contains("climate") || text.contains("warming") {
            NewsCategory::Climate
        } else if text.contains("diplomacy") || text.contains("treaty") || text.contains("agreement") {
            NewsCategory::Diplomacy
        } else if has_word("ai") || text.contains("intelligence") || text.contains("cyber") {
            NewsCategory::Technology
        } else {
            NewsCategory::General
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_breaking: bool,
    pub category: NewsCategory,
}

impl NormalizedRecord for Article {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn link(&self) -> Option<&str> {
        Some(&self.url)
    }
}

impl CacheConfig<Article> {
    /// Point-in-time snapshot per category; articles without a named outlet are dropped.
    pub fn news() -> Self {
        CacheConfig {
            stale_time: Duration::from_secs(5 * 60),
            refresh_interval: Some(Duration::from_secs(5 * 60)),
            cache_time: Duration::from_secs(10 * 60),
            max_retries: 1,
            merge: MergePolicy::Replace,
            validate: Some(outlet_predicate()),
            ..CacheConfig::default()
        }
    }
}

fn outlet_predicate() -> RecordPredicate<Article> {
    Arc::new(|article: &Article| !article.source.trim().is_empty())
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Provider {
    NewsApi,
    GNews,
}

impl Provider {
    fn name(&self) -> &'static str {
        match self {
            Provider::NewsApi => "newsapi",
            Provider::GNews => "gnews",
        }
    }
}

#[derive(Debug, Clone)]
struct ProviderEndpoint {
    provider: Provider,
    url: String,
    api_key: String,
}

/// Tries each configured provider in order. A later provider is only asked when every earlier
/// one failed or returned no article that passes validation.
pub struct NewsSource {
    client: reqwest::Client,
    providers: Vec<ProviderEndpoint>,
}

impl NewsSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(crate::source_of_record::DEFAULT_TIMEOUT)
            .build()?;

        Ok(NewsSource {
            client,
            providers: Vec::new(),
        })
    }

    pub fn with_provider(self, provider: Provider, api_key: impl Into<String>) -> Self {
        let url = match provider {
            Provider::NewsApi => NEWSAPI_URL,
            Provider::GNews => GNEWS_URL,
        };
        self.with_endpoint(provider, url, api_key)
    }

    pub fn with_endpoint(
        mut self,
        provider: Provider,
        url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            debug!(provider = provider.name(), "skipping news provider without API key");
            return self;
        }

        self.providers.push(ProviderEndpoint {
            provider,
            url: url.into(),
            api_key,
        });
        self
    }

    async fn query(&self, endpoint: &ProviderEndpoint) -> std::result::Result<Value, ErrorKind> {
        let request = match endpoint.provider {
            Provider::NewsApi => self.client.get(&endpoint.url).query(&[
                ("q", SEARCH_KEYWORDS.join(" OR ").as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", "25"),
                ("apiKey", endpoint.api_key.as_str()),
            ]),
            Provider::GNews => self.client.get(&endpoint.url).query(&[
                ("q", SEARCH_KEYWORDS[..GNEWS_KEYWORD_LIMIT].join(" OR ").as_str()),
                ("lang", "en"),
                ("max", "10"),
                ("apikey", endpoint.api_key.as_str()),
            ]),
        };

        send_json(request).await
    }
}

#[async_trait]
impl SourceOfRecord<Article> for NewsSource {
    fn name(&self) -> &str {
        "news"
    }

    async fn retrieve(&self, key: &FetchKey) -> std::result::Result<Vec<Article>, ErrorKind> {
        let category = match key {
            FetchKey::Category(category) => category.as_deref().map(str::to_lowercase),
            _ => return Err(ErrorKind::NotFound),
        };

        let mut last_error = ErrorKind::Unauthorized;
        let mut answered = false;

        for endpoint in &self.providers {
            match self.query(endpoint).await {
                Ok(raw) => {
                    answered = true;
                    let articles =
                        validate_records(normalize(&raw, Utc::now()), Some(&outlet_predicate()));
                    if articles.is_empty() {
                        warn!(provider = endpoint.provider.name(), "no usable articles in response");
                        continue;
                    }

                    debug!(provider = endpoint.provider.name(), count = articles.len(), "fetched articles");
                    return Ok(filter_category(articles, category.as_deref()));
                }
                Err(kind) => {
                    warn!(provider = endpoint.provider.name(), %kind, "news provider failed");
                    last_error = kind;
                }
            }
        }

        if answered {
            Ok(Vec::new())
        } else {
            Err(last_error)
        }
    }
}

pub fn filter_category(articles: Vec<Article>, category: Option<&str>) -> Vec<Article> {
    match category {
        None => articles,
        Some(category) => articles
            .into_iter()
            .filter(|article| article.category.as_str() == category)
            .collect(),
    }
}

/// Normalizes both NewsAPI (`publishedAt`, `urlToImage`) and GNews (`publishDate`, `image`)
/// article shapes.
pub fn normalize(raw: &Value, now: DateTime<Utc>) -> Vec<Article> {
    let Some(items) = raw.get("articles").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| {
            let title = str_at(item, "/title").unwrap_or_default().trim().to_string();
            let description = str_at(item, "/description").map(str::to_string);
            let url = str_at(item, "/url").unwrap_or_default().trim().to_string();
            let published_at = str_at(item, "/publishedAt")
                .or_else(|| str_at(item, "/publishDate"))
                .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
                .map(|stamp| stamp.with_timezone(&Utc));

            let is_breaking = title.to_lowercase().contains("breaking")
                || published_at.map_or(false, |published| {
                    published > now - ChronoDuration::hours(BREAKING_WINDOW_HOURS)
                });
            let category = NewsCategory::classify(&format!(
                "{} {}",
                title,
                description.as_deref().unwrap_or_default()
            ));

            Article {
                id: url.clone(),
                title,
                description,
                source: str_at(item, "/source/name").unwrap_or_default().to_string(),
                url,
                published_at,
                image_url: str_at(item, "/urlToImage")
                    .or_else(|| str_at(item, "/image"))
                    .map(str::to_string),
                is_breaking,
                category,
            }
        })
        .collect()
}
