pub mod clock;
pub mod forecast;
pub mod news;
pub mod posts;
pub mod windy;

use crate::error::ErrorKind;
use crate::key::FetchKey;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one logical fetch for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
    /// No attempt has completed yet.
    Pending,
    Success { value: T, fetched_at: Instant },
    Failure { kind: ErrorKind, fetched_at: Instant },
}

impl<T> FetchResult<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, FetchResult::Pending)
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            FetchResult::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        match self {
            FetchResult::Pending => None,
            FetchResult::Success { fetched_at, .. } | FetchResult::Failure { fetched_at, .. } => {
                Some(*fetched_at)
            }
        }
    }
}

/// A remote data source, already normalized into records of one shape.
///
/// Implementations perform exactly one outbound request per call and never retry; retries are
/// decided by the hydration layer from the returned [`ErrorKind`].
#[async_trait]
pub trait SourceOfRecord<T>: Send + Sync {
    fn name(&self) -> &str;

    /// Upper bound on one call to [`SourceOfRecord::retrieve`] for this key.
    fn timeout(&self, _key: &FetchKey) -> Duration {
        DEFAULT_TIMEOUT
    }

    async fn retrieve(&self, key: &FetchKey) -> Result<Vec<T>, ErrorKind>;
}

/// Issues one bounded request against a source and turns the outcome into a [`FetchResult`].
pub struct Fetcher<T> {
    source: Arc<dyn SourceOfRecord<T>>,
}

impl<T> Clone for Fetcher<T> {
    fn clone(&self) -> Self {
        Fetcher {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> Fetcher<T> {
    pub fn new(source: Arc<dyn SourceOfRecord<T>>) -> Self {
        Fetcher { source }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub async fn fetch(&self, key: &FetchKey) -> FetchResult<Vec<T>> {
        let deadline = self.source.timeout(key);
        let outcome = tokio::time::timeout(deadline, self.source.retrieve(key)).await;
        let fetched_at = Instant::now();

        match outcome {
            Ok(Ok(value)) => {
                debug!(source = self.source.name(), %key, records = value.len(), "fetch succeeded");
                FetchResult::Success { value, fetched_at }
            }
            Ok(Err(kind)) => {
                debug!(source = self.source.name(), %key, %kind, "fetch failed");
                FetchResult::Failure { kind, fetched_at }
            }
            Err(_) => {
                debug!(source = self.source.name(), %key, ?deadline, "fetch timed out");
                FetchResult::Failure {
                    kind: ErrorKind::Timeout,
                    fetched_at,
                }
            }
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ErrorKind> {
    let response = request.send().await.map_err(ErrorKind::from)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ErrorKind::from_status(status.as_u16()));
    }
    Ok(response)
}

fn body_error(error: reqwest::Error) -> ErrorKind {
    if error.is_timeout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::Unknown
    }
}

/// Sends a prepared request and decodes a JSON body, classifying every failure.
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, ErrorKind> {
    send(request).await?.json::<Value>().await.map_err(body_error)
}

/// Like [`send_json`] for feeds that answer with XML or HTML.
pub(crate) async fn send_text(request: reqwest::RequestBuilder) -> Result<String, ErrorKind> {
    send(request).await?.text().await.map_err(body_error)
}

/// Reads an identifier that upstreams send either as a string or as a number.
pub(crate) fn id_field(item: &Value, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| item.get(*name))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

pub(crate) fn str_at<'a>(item: &'a Value, pointer: &str) -> Option<&'a str> {
    item.pointer(pointer).and_then(Value::as_str)
}
