//! Persisted pagination progress for each channel.
//!
//! Forums keep only the time of their last pull; their identity watermarks
//! are derived from the cache itself. Feeds keep the server's generation tag
//! and the last position consumed, stored as `"{tag}:{position}"`.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::constants::END_OF_FEED;
use crate::store::KeyValueStore;

/// Store key holding the last pull time of a forum.
#[must_use]
pub fn last_pull_key(channel: &str) -> String {
    format!("lastPull:{channel}")
}

/// Store key holding the tag and position of a feed.
#[must_use]
pub fn feed_meta_key(channel: &str) -> String {
    format!("feedMeta:{channel}")
}

/// Position within a tagged generation of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedCursor {
    /// Server-assigned generation marker; empty before the first fetch.
    pub tag: String,
    /// Last position consumed, or `-1` once the feed is exhausted.
    pub position: i64,
}

impl FeedCursor {
    #[must_use]
    pub fn new(tag: impl Into<String>, position: i64) -> Self {
        Self {
            tag: tag.into(),
            position,
        }
    }

    /// Parse the persisted `tag:position` form.
    ///
    /// Missing parts read as an empty tag and position 0.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (tag, position) = raw.rsplit_once(':').unwrap_or((raw, ""));
        Self {
            tag: tag.to_string(),
            position: position.trim().parse().unwrap_or(0),
        }
    }

    /// Whether the end of this tag's data has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.tag.is_empty() && self.position == END_OF_FEED
    }

    /// Position to request next.
    #[must_use]
    pub fn next_position(&self) -> i64 {
        self.position + 1
    }
}

impl fmt::Display for FeedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.position)
    }
}

/// Reads and writes cursors through the shared store.
#[derive(Clone)]
pub struct CursorStore {
    store: Arc<dyn KeyValueStore>,
}

impl CursorStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// When `channel` was last pulled, if ever.
    ///
    /// An unparseable timestamp reads as never.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn last_pull(&self, channel: &str) -> Result<Option<DateTime<Utc>>> {
        let raw = self.store.get(&last_pull_key(channel)).await?;
        Ok(raw
            .and_then(|s| s.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0)))
    }

    /// Record a pull of `channel` at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn record_pull(&self, channel: &str, at: DateTime<Utc>) -> Result<()> {
        debug!(channel = %channel, at = %at, "Recording pull time");
        self.store
            .set(&last_pull_key(channel), &at.timestamp().to_string())
            .await
    }

    /// Load the feed cursor of `channel`, or the initial cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn feed_cursor(&self, channel: &str) -> Result<FeedCursor> {
        Ok(self
            .store
            .get(&feed_meta_key(channel))
            .await?
            .map(|raw| FeedCursor::parse(&raw))
            .unwrap_or_default())
    }

    /// Persist the feed cursor of `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn save_feed_cursor(&self, channel: &str, cursor: &FeedCursor) -> Result<()> {
        debug!(channel = %channel, tag = %cursor.tag, position = cursor.position, "Saving feed cursor");
        self.store
            .set(&feed_meta_key(channel), &cursor.to_string())
            .await
    }
}
