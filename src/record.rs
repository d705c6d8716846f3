use reqwest::Url;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// A record after per-source normalization. The resolver only ever sees these.
pub trait NormalizedRecord: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn title(&self) -> &str;

    /// Link-bearing record types return `Some`, even when the upstream left the link out (as an
    /// empty string). Records without a link concept keep the default.
    fn link(&self) -> Option<&str> {
        None
    }
}

/// Extra acceptance check supplied per subscription, applied after the built-in rules.
pub type RecordPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum Rejection {
    #[error("missing identifier")]
    MissingId,

    #[error("missing title")]
    MissingTitle,

    #[error("link {0:?} is not an absolute http(s) URL")]
    BadLink(String),

    #[error("rejected by subscription predicate")]
    Predicate,
}

pub fn is_absolute_http_url(link: &str) -> bool {
    match Url::parse(link.trim()) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().map_or(false, |host| !host.is_empty())
        }
        Err(_) => false,
    }
}

pub fn check<T: NormalizedRecord>(record: &T) -> Result<(), Rejection> {
    if record.id().trim().is_empty() {
        return Err(Rejection::MissingId);
    }
    if record.title().trim().is_empty() {
        return Err(Rejection::MissingTitle);
    }
    if let Some(link) = record.link() {
        if !is_absolute_http_url(link) {
            return Err(Rejection::BadLink(link.to_string()));
        }
    }

    Ok(())
}

/// Keeps the records that pass validation, in their original order. Dropped records are logged,
/// never reported as an error.
pub fn validate_records<T: NormalizedRecord>(
    records: Vec<T>,
    predicate: Option<&RecordPredicate<T>>,
) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| {
            let verdict = check(record).and_then(|_| match predicate {
                Some(predicate) if !predicate(record) => Err(Rejection::Predicate),
                _ => Ok(()),
            });

            match verdict {
                Ok(()) => true,
                Err(reason) => {
                    warn!(id = record.id(), %reason, "dropping invalid record");
                    false
                }
            }
        })
        .collect()
}
