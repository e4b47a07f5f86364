//! Per-channel post cache persisted as a single JSON blob.
//!
//! The blob maps the decimal identity of each post to its record. Merging is
//! append-only and first-write-wins; entries only disappear through
//! [`PostCache::clear`].

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::constants::EMPTY_HIGH;
use crate::models::Post;
use crate::store::KeyValueStore;

/// Cached posts of one channel, ordered by ascending identity.
pub type PostMap = BTreeMap<i64, Post>;

/// Store key holding the post blob of `channel`.
#[must_use]
pub fn posts_key(channel: &str) -> String {
    format!("posts:{channel}")
}

/// Highest and lowest cached identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    /// `-1` when nothing is cached.
    pub high: i64,
    /// `i64::MAX` when nothing is cached.
    pub low: i64,
}

impl IdRange {
    pub const EMPTY: Self = Self {
        high: EMPTY_HIGH,
        low: i64::MAX,
    };

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.high == EMPTY_HIGH
    }
}

/// Scan a mapping for its identity watermarks.
#[must_use]
pub fn id_range(posts: &PostMap) -> IdRange {
    posts.keys().fold(IdRange::EMPTY, |range, &id| IdRange {
        high: range.high.max(id),
        low: range.low.min(id),
    })
}

/// Result of merging a batch into the cache.
#[derive(Debug, Clone, Default)]
pub struct Merged {
    /// Full cache contents after the merge.
    pub posts: PostMap,
    /// Posts from the batch that were not cached before, in batch order.
    pub admitted: Vec<Post>,
}

/// Post cache for all channels sharing one store.
#[derive(Clone)]
pub struct PostCache {
    store: Arc<dyn KeyValueStore>,
}

impl PostCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the cached posts of `channel`.
    ///
    /// A missing or unreadable blob yields an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub async fn load(&self, channel: &str) -> Result<PostMap> {
        let Some(raw) = self.store.get(&posts_key(channel)).await? else {
            return Ok(PostMap::new());
        };

        match serde_json::from_str::<PostMap>(&raw) {
            Ok(mut posts) => {
                posts.retain(|id, _| *id > 0);
                Ok(posts)
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "Discarding malformed post cache");
                Ok(PostMap::new())
            }
        }
    }

    /// Merge `incoming` into the cache of `channel`.
    ///
    /// Posts without a positive identity are skipped, as are identities that
    /// are already cached. The blob is written back after every admitted
    /// post so an interruption loses at most the post in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to read or write.
    pub async fn merge(&self, channel: &str, incoming: &[Post]) -> Result<Merged> {
        let key = posts_key(channel);
        let mut posts = self.load(channel).await?;
        let mut admitted = Vec::new();

        for post in incoming {
            let Some(id) = post.identity() else {
                continue;
            };
            if posts.contains_key(&id) {
                continue;
            }

            posts.insert(id, post.clone());
            let blob = serde_json::to_string(&posts).context("Failed to serialize post cache")?;
            self.store.set(&key, &blob).await?;
            admitted.push(post.clone());
        }

        debug!(
            channel = %channel,
            incoming = incoming.len(),
            admitted = admitted.len(),
            cached = posts.len(),
            "Merged posts into cache"
        );

        Ok(Merged { posts, admitted })
    }

    /// Drop every cached post of `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn clear(&self, channel: &str) -> Result<()> {
        debug!(channel = %channel, "Clearing post cache");
        self.store.remove(&posts_key(channel)).await
    }
}
