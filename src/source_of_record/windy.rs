//! Windy webcams (API v3).

use crate::config::CacheConfig;
use crate::error::{ErrorKind, Result};
use crate::key::FetchKey;
use crate::record::NormalizedRecord;
use crate::resolver::MergePolicy;
use crate::source_of_record::{id_field, send_json, str_at, SourceOfRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const WEBCAMS_URL: &str = "https://webcams.windy.com/webcams/api/v3/webcams";
const API_KEY_HEADER: &str = "x-windy-api-key";
const SINGLE_TIMEOUT: Duration = Duration::from_secs(10);
const MULTI_TIMEOUT: Duration = Duration::from_secs(15);

/// Windy player tokens expire ten minutes after they are issued.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webcam {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub location: Option<WebcamLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebcamLocation {
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NormalizedRecord for Webcam {
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

impl CacheConfig<Webcam> {
    /// Refreshes at 80% of the player token lifetime and replaces the list wholesale.
    pub fn webcams() -> Self {
        CacheConfig {
            max_retries: 3,
            cache_time: Duration::from_secs(30 * 60),
            merge: MergePolicy::Replace,
            ..CacheConfig::for_token_lifetime(TOKEN_LIFETIME)
        }
    }
}

pub struct WindyWebcams {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl WindyWebcams {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(WEBCAMS_URL, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(MULTI_TIMEOUT).build()?;

        Ok(WindyWebcams {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SourceOfRecord<Webcam> for WindyWebcams {
    fn name(&self) -> &str {
        "windy-webcams"
    }

    fn timeout(&self, key: &FetchKey) -> Duration {
        match key {
            FetchKey::Webcams(_) => MULTI_TIMEOUT,
            _ => SINGLE_TIMEOUT,
        }
    }

    async fn retrieve(&self, key: &FetchKey) -> std::result::Result<Vec<Webcam>, ErrorKind> {
        let ids = match key {
            FetchKey::Webcam(_) | FetchKey::Webcams(_) => key.webcam_ids(),
            _ => return Err(ErrorKind::NotFound),
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if self.api_key.trim().is_empty() {
            return Err(ErrorKind::Unauthorized);
        }

        let request = self
            .client
            .get(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("webcamIds", ids.join(",").as_str()),
                ("include", "images,player,location"),
            ]);

        let raw = send_json(request).await?;
        Ok(normalize(&raw))
    }
}

/// Accepts the v3 `result.webcams` envelope, a bare `webcams` array, or a flat array.
pub fn normalize(raw: &Value) -> Vec<Webcam> {
    let items = raw
        .pointer("/result/webcams")
        .or_else(|| raw.get("webcams"))
        .unwrap_or(raw)
        .as_array();

    items
        .map(|items| items.iter().map(normalize_one).collect())
        .unwrap_or_default()
}

fn normalize_one(item: &Value) -> Webcam {
    let player = player_link(item);
    let url = str_at(item, "/url")
        .or_else(|| str_at(item, "/urls/detail"))
        .map(str::to_string)
        .or_else(|| player.clone())
        .unwrap_or_default();

    let location = item.get("location").map(|location| WebcamLocation {
        city: str_at(location, "/city").map(str::to_string),
        country: str_at(location, "/country").map(str::to_string),
        latitude: location.get("latitude").and_then(Value::as_f64),
        longitude: location.get("longitude").and_then(Value::as_f64),
    });

    Webcam {
        id: id_field(item, &["webcamId", "id"]),
        title: str_at(item, "/title").unwrap_or_default().trim().to_string(),
        url,
        status: str_at(item, "/status").map(str::to_string),
        player,
        thumbnail: str_at(item, "/images/current/preview").map(str::to_string),
        location,
    }
}

// Older responses nest the embed URL one level deeper.
fn player_link(item: &Value) -> Option<String> {
    ["/player/day", "/player/live", "/player/day/embed", "/player/live/embed"]
        .iter()
        .find_map(|pointer| str_at(item, pointer))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_webcams_array_is_normalized() {
        let raw = json!({
            "webcams": [{ "id": "123", "title": "Bridge Cam", "url": "https://x.test/123" }]
        });

        let webcams = normalize(&raw);
        assert_eq!(webcams.len(), 1);
        assert_eq!(webcams[0].id, "123");
        assert_eq!(webcams[0].title, "Bridge Cam");
        assert_eq!(webcams[0].url, "https://x.test/123");
    }

    #[test]
    fn v3_envelope_with_numeric_ids() {
        let raw = json!({
            "result": {
                "webcams": [{
                    "webcamId": 1693844957u64,
                    "title": "Khamovniki District",
                    "status": "active",
                    "urls": { "detail": "https://www.windy.com/webcams/1693844957" },
                    "player": { "day": "https://webcams.windy.com/webcams/public/embed/player/1693844957/day" },
                    "images": { "current": { "preview": "https://images.windy.test/1693844957.jpg" } },
                    "location": { "city": "Moscow", "country": "Russia", "latitude": 55.73, "longitude": 37.58 }
                }]
            }
        });

        let webcam = &normalize(&raw)[0];
        assert_eq!(webcam.id, "1693844957");
        assert_eq!(webcam.url, "https://www.windy.com/webcams/1693844957");
        assert!(webcam.player.as_deref().unwrap().ends_with("/day"));
        assert_eq!(webcam.location.as_ref().unwrap().city.as_deref(), Some("Moscow"));
    }

    #[test]
    fn flat_array_falls_back_to_player_link() {
        let raw = json!([{ "id": 7, "title": "Harbour", "player": { "live": { "embed": "https://p.test/7" } } }]);

        let webcam = &normalize(&raw)[0];
        assert_eq!(webcam.id, "7");
        assert_eq!(webcam.url, "https://p.test/7");
    }

    #[test]
    fn missing_fields_survive_normalization_for_the_validator() {
        let raw = json!({ "webcams": [{ "id": "9" }] });

        let webcam = &normalize(&raw)[0];
        assert_eq!(webcam.title, "");
        assert_eq!(webcam.link(), Some(""));
    }

    #[test]
    fn unexpected_shape_yields_no_records() {
        assert!(normalize(&json!({ "status": "ok" })).is_empty());
    }

    #[test]
    fn webcam_preset_refreshes_before_tokens_expire() {
        let config = CacheConfig::<Webcam>::webcams();
        assert_eq!(config.refresh_interval, Some(Duration::from_secs(8 * 60)));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn missing_key_is_reported_as_unauthorized() {
        let source = WindyWebcams::new("").unwrap();
        let outcome = source.retrieve(&FetchKey::Webcam("1".into())).await;
        assert_eq!(outcome, Err(ErrorKind::Unauthorized));
    }
}
