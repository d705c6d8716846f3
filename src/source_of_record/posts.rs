//! Social posts: the in-process post board that user submissions are written to, and that the
//! social feed reads from.

use crate::config::CacheConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::key::{FetchKey, PostQuery};
use crate::record::{check, NormalizedRecord};
use crate::resolver::MergePolicy;
use crate::source_of_record::SourceOfRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub const FEED_HASHTAG: &str = "NukeIntel";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub handle: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// The account feed that published the post, when it came from one.
    #[serde(default)]
    pub source: Option<String>,
}

impl Post {
    pub fn has_hashtag(&self, tag: &str) -> bool {
        let tag = tag.trim().trim_start_matches('#');
        self.hashtags.iter().any(|own| own.eq_ignore_ascii_case(tag))
    }
}

impl NormalizedRecord for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.content
    }
}

/// A post as submitted by a user, before the board assigns id and timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub author: String,
    pub handle: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl CacheConfig<Post> {
    /// The social feed keeps growing: new posts are appended and de-duplicated by id.
    pub fn social_feed() -> Self {
        CacheConfig {
            stale_time: Duration::from_secs(2 * 60),
            refresh_interval: Some(Duration::from_secs(60)),
            cache_time: Duration::from_secs(10 * 60),
            max_retries: 2,
            merge: MergePolicy::Append,
            ..CacheConfig::default()
        }
    }
}

#[derive(Default)]
pub struct PostBoard {
    posts: Mutex<Vec<Post>>,
}

impl PostBoard {
    pub fn new() -> Self {
        PostBoard::default()
    }

    pub fn with_posts(posts: impl IntoIterator<Item = Post>) -> Self {
        PostBoard {
            posts: Mutex::new(posts.into_iter().collect()),
        }
    }

    /// Validates and stores a post, newest first. The feed hashtag is always attached.
    pub fn submit(&self, post: NewPost) -> Result<Post> {
        let mut hashtags: Vec<String> = post
            .hashtags
            .into_iter()
            .map(|tag| tag.trim().trim_start_matches('#').to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        if !hashtags.iter().any(|tag| tag.eq_ignore_ascii_case(FEED_HASHTAG)) {
            hashtags.push(FEED_HASHTAG.to_string());
        }

        let post = Post {
            id: Uuid::new_v4().hyphenated().to_string(),
            author: post.author,
            handle: post.handle,
            content: post.content.trim().to_string(),
            timestamp: Utc::now(),
            verified: false,
            followers: 0,
            hashtags,
            user_id: post.user_id,
            source: None,
        };

        check(&post).map_err(|reason| Error::Validation(reason.to_string()))?;

        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, post.clone());
        info!(id = %post.id, handle = %post.handle, "post submitted");

        Ok(post)
    }

    pub fn len(&self) -> usize {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SourceOfRecord<Post> for PostBoard {
    fn name(&self) -> &str {
        "post-board"
    }

    /// `Category(None)` lists every post; `Query(tag)` lists posts carrying that hashtag;
    /// `Posts(query)` applies the query's filter, order and limit.
    async fn retrieve(&self, key: &FetchKey) -> std::result::Result<Vec<Post>, ErrorKind> {
        let posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);

        match key {
            FetchKey::Category(None) => Ok(posts.clone()),
            FetchKey::Query(tag) => Ok(posts
                .iter()
                .filter(|post| post.has_hashtag(tag))
                .cloned()
                .collect()),
            FetchKey::Posts(query) => Ok(select(&posts, query)),
            _ => Err(ErrorKind::NotFound),
        }
    }
}

pub fn select(posts: &[Post], query: &PostQuery) -> Vec<Post> {
    let mut selected: Vec<Post> = posts
        .iter()
        .filter(|post| match query {
            PostQuery::Hashtag {
                tag, only_verified, ..
            } => post.has_hashtag(tag) && (!only_verified || post.verified),
            PostQuery::Featured { min_followers, .. } => {
                post.followers >= *min_followers && post.has_hashtag(FEED_HASHTAG)
            }
            PostQuery::User(user_id) => post.user_id.as_deref() == Some(user_id.trim()),
            PostQuery::Source { name, .. } => post
                .source
                .as_deref()
                .map_or(false, |source| source.eq_ignore_ascii_case(name.trim())),
        })
        .cloned()
        .collect();

    match query {
        PostQuery::Featured { .. } => selected.sort_by(|a, b| {
            b.followers
                .cmp(&a.followers)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        }),
        _ => selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
    }

    if let Some(limit) = query.limit() {
        selected.truncate(limit);
    }
    selected
}
