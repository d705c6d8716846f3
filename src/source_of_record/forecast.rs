//! Windy point forecast (v2) for a coordinate pair.

use crate::config::CacheConfig;
use crate::error::{ErrorKind, Result};
use crate::key::FetchKey;
use crate::record::NormalizedRecord;
use crate::resolver::MergePolicy;
use crate::source_of_record::{send_json, SourceOfRecord};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const POINT_FORECAST_URL: &str = "https://api.windy.com/api/point-forecast/v2";

/// Washington DC, used when no coordinates are configured.
pub const DEFAULT_COORDINATES: (f64, f64) = (38.9072, -77.0369);

const CARDINALS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub temperature: Option<Temperature>,
    pub wind: Option<Wind>,
    pub pressure: Option<Pressure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub celsius: f64,
    pub fahrenheit: f64,
    pub kelvin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub meters_per_second: f64,
    pub kilometers_per_hour: f64,
    pub miles_per_hour: f64,
    pub degrees: u16,
    pub cardinal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    pub hpa: f64,
    pub inhg: f64,
}

impl NormalizedRecord for Forecast {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl CacheConfig<Forecast> {
    pub fn forecast() -> Self {
        CacheConfig {
            stale_time: Duration::from_secs(60 * 60),
            refresh_interval: None,
            cache_time: Duration::from_secs(60 * 60),
            max_retries: 2,
            merge: MergePolicy::Replace,
            ..CacheConfig::default()
        }
    }
}

pub struct PointForecast {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl PointForecast {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(POINT_FORECAST_URL, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(crate::source_of_record::DEFAULT_TIMEOUT)
            .build()?;

        Ok(PointForecast {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "gfs".to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl SourceOfRecord<Forecast> for PointForecast {
    fn name(&self) -> &str {
        "windy-point-forecast"
    }

    async fn retrieve(&self, key: &FetchKey) -> std::result::Result<Vec<Forecast>, ErrorKind> {
        let FetchKey::Coordinates { lat, lon } = *key else {
            return Err(ErrorKind::NotFound);
        };
        if self.api_key.trim().is_empty() {
            return Err(ErrorKind::Unauthorized);
        }

        let body = json!({
            "lat": lat,
            "lon": lon,
            "model": self.model,
            "parameters": ["temp", "wind", "pressure"],
            "levels": ["surface"],
            "key": self.api_key,
        });

        let raw = send_json(self.client.post(&self.endpoint).json(&body)).await?;
        Ok(normalize(&raw, lat, lon).into_iter().collect())
    }
}

/// Reads the first time step. Accepts both `temp.surface` and `temp-surface` series layouts.
pub fn normalize(raw: &Value, lat: f64, lon: f64) -> Option<Forecast> {
    let stamp = raw.pointer("/ts/0").and_then(Value::as_i64)?;
    // The documented unit is milliseconds; second-resolution stamps are also seen in the wild.
    let timestamp = if stamp > 100_000_000_000 {
        Utc.timestamp_millis_opt(stamp).single()?
    } else {
        Utc.timestamp_opt(stamp, 0).single()?
    };

    let temperature = first_step(raw, "temp").map(|kelvin| {
        let celsius = kelvin - 273.15;
        Temperature {
            celsius: round_to(celsius, 1),
            fahrenheit: round_to(celsius * 9.0 / 5.0 + 32.0, 1),
            kelvin,
        }
    });

    let wind = first_step(raw, "wind_u")
        .zip(first_step(raw, "wind_v"))
        .map(|(u, v)| {
            let speed = (u * u + v * v).sqrt();
            let mut degrees = u.atan2(v).to_degrees();
            if degrees < 0.0 {
                degrees += 360.0;
            }
            Wind {
                meters_per_second: round_to(speed, 1),
                kilometers_per_hour: round_to(speed * 3.6, 1),
                miles_per_hour: round_to(speed * 2.237, 1),
                degrees: degrees.round() as u16 % 360,
                cardinal: cardinal(degrees).to_string(),
            }
        });

    let pressure = first_step(raw, "pressure").map(|pascals| Pressure {
        hpa: (pascals / 100.0).round(),
        inhg: round_to(pascals / 3386.39, 2),
    });

    Some(Forecast {
        id: FetchKey::Coordinates { lat, lon }.canonical(),
        title: format!("Forecast for {:.4}, {:.4}", lat, lon),
        timestamp,
        lat,
        lon,
        temperature,
        wind,
        pressure,
    })
}

fn first_step(raw: &Value, parameter: &str) -> Option<f64> {
    raw.pointer(&format!("/{}/surface/0", parameter))
        .or_else(|| raw.pointer(&format!("/{}-surface/0", parameter)))
        .and_then(Value::as_f64)
}

pub fn cardinal(degrees: f64) -> &'static str {
    let index = (degrees / 22.5).round() as usize % CARDINALS.len();
    CARDINALS[index]
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_time_step_is_converted() {
        let raw = json!({
            "ts": [1706108400000i64, 1706119200000i64],
            "temp-surface": [273.15, 280.0],
            "wind_u-surface": [3.0, 1.0],
            "wind_v-surface": [4.0, 1.0],
            "pressure-surface": [101325.0, 101000.0]
        });

        let forecast = normalize(&raw, 38.9072, -77.0369).unwrap();
        assert_eq!(forecast.id, "coords:38.9072,-77.0369");
        assert_eq!(forecast.timestamp.timestamp(), 1706108400);

        let temperature = forecast.temperature.unwrap();
        assert_eq!(temperature.celsius, 0.0);
        assert_eq!(temperature.fahrenheit, 32.0);

        let wind = forecast.wind.unwrap();
        assert_eq!(wind.meters_per_second, 5.0);
        assert_eq!(wind.kilometers_per_hour, 18.0);
        assert_eq!(wind.degrees, 37);
        assert_eq!(wind.cardinal, "NE");

        let pressure = forecast.pressure.unwrap();
        assert_eq!(pressure.hpa, 1013.0);
        assert_eq!(pressure.inhg, 29.92);
    }

    #[test]
    fn nested_series_and_second_stamps_are_accepted() {
        let raw = json!({ "ts": [1706108400], "temp": { "surface": [300.0] } });

        let forecast = normalize(&raw, 0.0, 0.0).unwrap();
        assert_eq!(forecast.timestamp.timestamp(), 1706108400);
        assert_eq!(forecast.temperature.unwrap().celsius, 26.9);
        assert!(forecast.wind.is_none());
    }

    #[test]
    fn empty_series_yields_no_forecast() {
        assert!(normalize(&json!({ "ts": [] }), 0.0, 0.0).is_none());
    }

    #[test]
    fn cardinal_points_wrap_around() {
        assert_eq!(cardinal(0.0), "N");
        assert_eq!(cardinal(90.0), "E");
        assert_eq!(cardinal(350.0), "N");
        assert_eq!(cardinal(202.5), "SSW");
    }
}
