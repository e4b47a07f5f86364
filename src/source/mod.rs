//! Remote post source: the forum and feed endpoints of the API.

mod http;

pub use http::HttpSource;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::cache::IdRange;
use crate::models::{lenient_i64, lenient_posts, Post};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Direction of a forum scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Newest posts, no bound.
    New,
    /// Posts above the cached high-water mark.
    Ascending,
    /// Posts below the cached low-water mark.
    Descending,
}

impl ScanMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// A forum request: scan direction plus the watermarks bounding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForumQuery {
    pub mode: ScanMode,
    pub range: IdRange,
}

impl ForumQuery {
    #[must_use]
    pub fn new(mode: ScanMode, range: IdRange) -> Self {
        Self { mode, range }
    }

    /// Query string parameters, e.g. `s=asc&h=40`.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self.mode {
            ScanMode::New => Vec::new(),
            ScanMode::Ascending => {
                let mut pairs = vec![("s", "asc".to_string())];
                if !self.range.is_empty() {
                    pairs.push(("h", self.range.high.to_string()));
                }
                pairs
            }
            ScanMode::Descending => {
                let mut pairs = vec![("s", "desc".to_string())];
                if !self.range.is_empty() {
                    pairs.push(("l", self.range.low.to_string()));
                }
                pairs
            }
        }
    }
}

/// A feed request for the page after `position` within `tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// Empty before the first page has been seen.
    pub tag: String,
    pub position: i64,
}

impl FeedQuery {
    /// Query string parameters; a fresh feed is requested without any.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        if self.tag.is_empty() {
            Vec::new()
        } else {
            vec![("tag", self.tag.clone()), ("p", self.position.to_string())]
        }
    }
}

/// One page of an aggregate feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedPage {
    /// Generation the page belongs to.
    #[serde(default)]
    pub tag: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub start: Option<i64>,
    /// Last position covered by this page.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub end: Option<i64>,
    /// Posts of the page; malformed entries are dropped individually.
    #[serde(default, alias = "post", deserialize_with = "lenient_posts")]
    pub posts: Vec<Post>,
}

/// The remote API as seen by the scheduler.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch posts of a single forum.
    async fn fetch_forum(&self, forum: &str, query: &ForumQuery) -> Result<Vec<Post>, FetchError>;

    /// Fetch one page of an aggregate feed.
    async fn fetch_feed(&self, feed: &str, query: &FeedQuery) -> Result<FeedPage, FetchError>;
}


#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Source replaying queued responses and recording every request.
    #[derive(Default)]
    pub struct ScriptedSource {
        forum_responses: Mutex<VecDeque<Result<Vec<Post>, FetchError>>>,
        feed_responses: Mutex<VecDeque<Result<FeedPage, FetchError>>>,
        forum_queries: Mutex<Vec<(String, ForumQuery)>>,
        feed_queries: Mutex<Vec<(String, FeedQuery)>>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_forum(&self, response: Result<Vec<Post>, FetchError>) {
            self.forum_responses.lock().unwrap().push_back(response);
        }

        pub fn push_feed(&self, response: Result<FeedPage, FetchError>) {
            self.feed_responses.lock().unwrap().push_back(response);
        }

        pub fn forum_queries(&self) -> Vec<(String, ForumQuery)> {
            self.forum_queries.lock().unwrap().clone()
        }

        pub fn feed_queries(&self) -> Vec<(String, FeedQuery)> {
            self.feed_queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteSource for ScriptedSource {
        async fn fetch_forum(
            &self,
            forum: &str,
            query: &ForumQuery,
        ) -> Result<Vec<Post>, FetchError> {
            self.forum_queries
                .lock()
                .unwrap()
                .push((forum.to_string(), *query));
            self.forum_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Status(404)))
        }

        async fn fetch_feed(&self, feed: &str, query: &FeedQuery) -> Result<FeedPage, FetchError> {
            self.feed_queries
                .lock()
                .unwrap()
                .push((feed.to_string(), query.clone()));
            self.feed_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Status(404)))
        }
    }
}
