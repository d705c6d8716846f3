use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies one subscribable unit of remote data.
///
/// Equality and hashing go through [`FetchKey::canonical`], so two keys that render to the same
/// canonical string are the same key regardless of how they were built. Webcam id sets are
/// order-insensitive and de-duplicated, coordinates are rounded to four decimal places (about
/// eleven metres), categories and queries are compared case-insensitively.
#[derive(Debug, Clone)]
pub enum FetchKey {
    Coordinates { lat: f64, lon: f64 },
    Webcam(String),
    Webcams(Vec<String>),
    /// `None` means every category.
    Category(Option<String>),
    Query(String),
    Posts(PostQuery),
}

pub const DEFAULT_HASHTAG_LIMIT: usize = 20;
pub const DEFAULT_FEATURED_LIMIT: usize = 5;
pub const DEFAULT_FEATURED_FOLLOWERS: u64 = 50_000;
pub const DEFAULT_SOURCE_LIMIT: usize = 10;

/// A filtered view over the social feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQuery {
    /// Posts carrying `tag`, newest first.
    Hashtag {
        tag: String,
        only_verified: bool,
        limit: usize,
    },
    /// Tagged posts from accounts with at least `min_followers`, most followed first.
    Featured { min_followers: u64, limit: usize },
    /// Every post by one user, newest first.
    User(String),
    /// Posts published by a named account feed, newest first.
    Source { name: String, limit: usize },
}

impl PostQuery {
    pub fn hashtag(tag: impl Into<String>) -> Self {
        PostQuery::Hashtag {
            tag: tag.into(),
            only_verified: false,
            limit: DEFAULT_HASHTAG_LIMIT,
        }
    }

    pub fn featured() -> Self {
        PostQuery::Featured {
            min_followers: DEFAULT_FEATURED_FOLLOWERS,
            limit: DEFAULT_FEATURED_LIMIT,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        PostQuery::User(user_id.into())
    }

    pub fn source(name: impl Into<String>) -> Self {
        PostQuery::Source {
            name: name.into(),
            limit: DEFAULT_SOURCE_LIMIT,
        }
    }

    /// Only meaningful for hashtag queries.
    pub fn verified_only(mut self) -> Self {
        if let PostQuery::Hashtag { only_verified, .. } = &mut self {
            *only_verified = true;
        }
        self
    }

    pub fn with_limit(mut self, count: usize) -> Self {
        match &mut self {
            PostQuery::Hashtag { limit, .. }
            | PostQuery::Featured { limit, .. }
            | PostQuery::Source { limit, .. } => *limit = count,
            PostQuery::User(_) => {}
        }
        self
    }

    /// `None` for queries that return every match.
    pub fn limit(&self) -> Option<usize> {
        match self {
            PostQuery::Hashtag { limit, .. }
            | PostQuery::Featured { limit, .. }
            | PostQuery::Source { limit, .. } => Some(*limit),
            PostQuery::User(_) => None,
        }
    }

    fn canonical(&self) -> String {
        match self {
            PostQuery::Hashtag {
                tag,
                only_verified,
                limit,
            } => format!(
                "hashtag:{}:{}:{}",
                tag.trim().trim_start_matches('#').to_lowercase(),
                if *only_verified { "verified" } else { "all" },
                limit
            ),
            PostQuery::Featured {
                min_followers,
                limit,
            } => format!("featured:{}:{}", min_followers, limit),
            PostQuery::User(user_id) => format!("user:{}", user_id.trim()),
            PostQuery::Source { name, limit } => {
                format!("source:{}:{}", name.trim().to_lowercase(), limit)
            }
        }
    }
}

impl FetchKey {
    pub fn webcams<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FetchKey::Webcams(ids.into_iter().map(Into::into).collect())
    }

    pub fn category(category: impl Into<String>) -> Self {
        FetchKey::Category(Some(category.into()))
    }

    pub fn all() -> Self {
        FetchKey::Category(None)
    }

    pub fn canonical(&self) -> String {
        match self {
            FetchKey::Coordinates { lat, lon } => {
                format!("coords:{:.4},{:.4}", round_coordinate(*lat), round_coordinate(*lon))
            }
            FetchKey::Webcam(id) => format!("webcam:{}", id.trim()),
            FetchKey::Webcams(ids) => {
                let mut ids: Vec<&str> = ids.iter().map(|id| id.trim()).collect();
                ids.sort_unstable();
                ids.dedup();
                format!("webcams:{}", ids.join(","))
            }
            FetchKey::Category(None) => "category:*".to_string(),
            FetchKey::Category(Some(category)) => {
                format!("category:{}", category.trim().to_lowercase())
            }
            FetchKey::Query(query) => format!("query:{}", query.trim().to_lowercase()),
            FetchKey::Posts(query) => format!("posts:{}", query.canonical()),
        }
    }

    /// Webcam ids named by this key, in canonical order.
    pub fn webcam_ids(&self) -> Vec<String> {
        match self {
            FetchKey::Webcam(id) => vec![id.trim().to_string()],
            FetchKey::Webcams(ids) => {
                let mut ids: Vec<String> = ids.iter().map(|id| id.trim().to_string()).collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            }
            _ => Vec::new(),
        }
    }
}

/// Rounds to four decimals. Adding zero folds `-0.0` into `0.0`.
fn round_coordinate(value: f64) -> f64 {
    (value * 1e4).round() / 1e4 + 0.0
}

impl PartialEq for FetchKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for FetchKey {}

impl Hash for FetchKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state)
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn webcam_sets_ignore_order_and_duplicates() {
        let a = FetchKey::webcams(["2", "1", "2"]);
        let b = FetchKey::webcams(["1", "2"]);
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "webcams:1,2");
    }

    #[test]
    fn categories_compare_case_insensitively() {
        assert_eq!(FetchKey::category("Nuclear"), FetchKey::category("nuclear"));
        assert_ne!(FetchKey::category("nuclear"), FetchKey::all());
    }

    #[test]
    fn nearby_coordinates_collapse_to_one_key() {
        let a = FetchKey::Coordinates { lat: 38.90720001, lon: -77.0369 };
        let b = FetchKey::Coordinates { lat: 38.9072, lon: -77.03690004 };
        let c = FetchKey::Coordinates { lat: 38.91, lon: -77.0369 };

        let keys: HashSet<FetchKey> = [a, b, c].into_iter().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn coordinates_rounding_to_zero_share_a_key() {
        let south = FetchKey::Coordinates { lat: -0.00001, lon: -0.00004 };
        let origin = FetchKey::Coordinates { lat: 0.0, lon: 0.0 };
        assert_eq!(south.canonical(), "coords:0.0000,0.0000");
        assert_eq!(south, origin);
    }

    #[test]
    fn post_queries_carry_their_filters_in_the_key() {
        let tagged = FetchKey::Posts(PostQuery::hashtag("#NukeIntel"));
        assert_eq!(tagged.canonical(), "posts:hashtag:nukeintel:all:20");
        assert_eq!(tagged, FetchKey::Posts(PostQuery::hashtag("nukeintel")));
        assert_ne!(
            tagged,
            FetchKey::Posts(PostQuery::hashtag("nukeintel").verified_only())
        );
        assert_ne!(
            FetchKey::Posts(PostQuery::featured()),
            FetchKey::Posts(PostQuery::featured().with_limit(3))
        );
        assert_eq!(PostQuery::user("u-1").with_limit(3).limit(), None);
    }

    #[test]
    fn single_webcam_differs_from_set_of_one() {
        assert_ne!(FetchKey::Webcam("1".into()), FetchKey::webcams(["1"]));
        assert_eq!(
            FetchKey::Webcam(" 1 ".into()).webcam_ids(),
            FetchKey::webcams(["1"]).webcam_ids()
        );
    }
}
