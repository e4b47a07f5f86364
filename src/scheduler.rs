//! Fetch scheduling for forum and feed channels.
//!
//! Forums (range-scan) decide per activation between serving the cache, an
//! ascending top-up above the high-water mark, or a full reset from the
//! newest posts, based on the time since the last pull. Autoload extends a
//! forum downward below the low-water mark.
//!
//! Feeds (token-scan) advance one page per step through a server-tagged
//! generation. A new tag means the generation rotated and the cache is
//! rebuilt; position `-1` marks the end of the current generation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::{id_range, IdRange, Merged, PostCache, PostMap};
use crate::channel::{Channel, ChannelKind};
use crate::clock::Clock;
use crate::config::StalenessPolicy;
use crate::constants::END_OF_FEED;
use crate::cursor::{CursorStore, FeedCursor};
use crate::models::Post;
use crate::source::{FeedQuery, ForumQuery, RemoteSource};
use crate::store::KeyValueStore;

pub use crate::source::ScanMode;

/// Lowest identity a forum can hold; a descending scan stops here.
const FORUM_FLOOR: i64 = 1;

/// What happened to the remote source during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No request was issued.
    Skipped,
    /// A request succeeded and its posts were merged.
    Fetched,
    /// A request was issued and failed; the cache was left as it was.
    Failed,
}

/// Result of one scheduler step on a channel.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub kind: ChannelKind,
    /// Scan mode used for a forum request, if one was issued.
    pub mode: Option<ScanMode>,
    pub outcome: FetchOutcome,
    /// The cache was emptied before merging, so earlier output is obsolete.
    pub reset: bool,
    /// Posts newly added to the cache by this step.
    pub admitted: Vec<Post>,
    /// Full cache contents after the step.
    pub posts: PostMap,
}

impl StepReport {
    fn served(kind: ChannelKind, posts: PostMap) -> Self {
        Self {
            kind,
            mode: None,
            outcome: FetchOutcome::Skipped,
            reset: false,
            admitted: Vec::new(),
            posts,
        }
    }

    /// Every cached post in the channel's display order.
    #[must_use]
    pub fn ordered(&self) -> Vec<Post> {
        display_order(self.kind, self.posts.values().cloned())
    }

    /// Newly admitted posts in the channel's display order.
    #[must_use]
    pub fn ordered_admitted(&self) -> Vec<Post> {
        display_order(self.kind, self.admitted.iter().cloned())
    }
}

/// Order posts for display: forums newest first, feeds in cache order
/// (ascending identity).
#[must_use]
pub fn display_order(kind: ChannelKind, posts: impl IntoIterator<Item = Post>) -> Vec<Post> {
    let mut posts: Vec<Post> = posts.into_iter().collect();
    posts.sort_by_key(|p| p.identity().unwrap_or_default());
    if kind == ChannelKind::RangeScan {
        posts.reverse();
    }
    posts
}

/// Decide how to refresh a forum on activation.
///
/// Returns `None` when the cache is fresh enough to serve as-is. A missing
/// last pull counts as infinitely old.
#[must_use]
pub fn plan_forum_refresh(
    range: IdRange,
    last_pull: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &StalenessPolicy,
) -> Option<ScanMode> {
    if range.is_empty() {
        return Some(ScanMode::New);
    }

    let age = last_pull.map_or(Duration::MAX, |at| {
        (now - at).to_std().unwrap_or(Duration::ZERO)
    });

    if age <= policy.soft {
        None
    } else if age > policy.hard {
        Some(ScanMode::New)
    } else {
        Some(ScanMode::Ascending)
    }
}

/// Decides when to call the remote source and folds the results into the
/// cache and cursors.
#[derive(Clone)]
pub struct Scheduler {
    cache: PostCache,
    cursors: CursorStore,
    source: Arc<dyn RemoteSource>,
    clock: Arc<dyn Clock>,
    staleness: StalenessPolicy,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn RemoteSource>,
        clock: Arc<dyn Clock>,
        staleness: StalenessPolicy,
    ) -> Self {
        Self {
            cache: PostCache::new(store.clone()),
            cursors: CursorStore::new(store),
            source,
            clock,
            staleness,
        }
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[must_use]
    pub fn cache(&self) -> &PostCache {
        &self.cache
    }

    #[must_use]
    pub fn cursors(&self) -> &CursorStore {
        &self.cursors
    }

    /// Bring a channel up to date when it becomes active.
    ///
    /// Fetch failures are logged and leave the cache untouched; only store
    /// failures are returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn activate(&self, channel: &Channel) -> Result<StepReport> {
        match channel.kind() {
            ChannelKind::RangeScan => self.refresh_forum(channel.name()).await,
            ChannelKind::TokenScan => self.step_feed(channel.name()).await,
        }
    }

    /// Fetch one more increment: older posts for a forum, the next page for
    /// a feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn increment(&self, channel: &Channel) -> Result<StepReport> {
        match channel.kind() {
            ChannelKind::RangeScan => self.extend_forum(channel.name()).await,
            ChannelKind::TokenScan => self.step_feed(channel.name()).await,
        }
    }

    async fn refresh_forum(&self, forum: &str) -> Result<StepReport> {
        let now = self.clock.now();
        let posts = self.cache.load(forum).await?;
        let range = id_range(&posts);
        let last_pull = self.cursors.last_pull(forum).await?;

        let Some(mode) = plan_forum_refresh(range, last_pull, now, &self.staleness) else {
            debug!(forum = %forum, cached = posts.len(), "Forum cache is fresh, serving as-is");
            return Ok(StepReport::served(ChannelKind::RangeScan, posts));
        };

        let reset = mode == ScanMode::New && !range.is_empty();
        if reset {
            info!(forum = %forum, last_pull = ?last_pull, "Forum cache is stale, clearing");
            self.cache.clear(forum).await?;
        }

        info!(forum = %forum, mode = mode.as_str(), high = range.high, "Refreshing forum");
        let mut report = self
            .pull_forum(forum, ForumQuery::new(mode, range), now)
            .await?;
        report.reset = reset;
        Ok(report)
    }

    async fn extend_forum(&self, forum: &str) -> Result<StepReport> {
        let posts = self.cache.load(forum).await?;
        let range = id_range(&posts);

        if range.is_empty() {
            debug!(forum = %forum, "Nothing cached to extend");
            return Ok(StepReport::served(ChannelKind::RangeScan, posts));
        }
        if range.low <= FORUM_FLOOR {
            debug!(forum = %forum, low = range.low, "Reached the oldest post");
            return Ok(StepReport::served(ChannelKind::RangeScan, posts));
        }

        info!(forum = %forum, low = range.low, "Loading older forum posts");
        let now = self.clock.now();
        self.pull_forum(forum, ForumQuery::new(ScanMode::Descending, range), now)
            .await
    }

    async fn pull_forum(
        &self,
        forum: &str,
        query: ForumQuery,
        now: DateTime<Utc>,
    ) -> Result<StepReport> {
        let fetched = self.source.fetch_forum(forum, &query).await;

        let (outcome, merged) = match fetched {
            Ok(incoming) => (
                FetchOutcome::Fetched,
                self.cache.merge(forum, &incoming).await?,
            ),
            Err(e) => {
                warn!(forum = %forum, mode = query.mode.as_str(), error = %e, "Forum fetch failed");
                let posts = self.cache.load(forum).await?;
                (
                    FetchOutcome::Failed,
                    Merged {
                        posts,
                        admitted: Vec::new(),
                    },
                )
            }
        };

        // Advanced even on failure so a broken endpoint is not retried on
        // every activation.
        self.cursors.record_pull(forum, now).await?;

        Ok(StepReport {
            kind: ChannelKind::RangeScan,
            mode: Some(query.mode),
            outcome,
            reset: false,
            admitted: merged.admitted,
            posts: merged.posts,
        })
    }

    async fn step_feed(&self, feed: &str) -> Result<StepReport> {
        let cursor = self.cursors.feed_cursor(feed).await?;

        if cursor.is_exhausted() {
            debug!(feed = %feed, tag = %cursor.tag, "Feed exhausted for this tag");
            let posts = self.cache.load(feed).await?;
            return Ok(StepReport::served(ChannelKind::TokenScan, posts));
        }

        let query = FeedQuery {
            tag: cursor.tag.clone(),
            position: cursor.next_position(),
        };
        info!(feed = %feed, tag = %query.tag, position = query.position, "Fetching feed page");

        let page = match self.source.fetch_feed(feed, &query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(feed = %feed, error = %e, "Feed fetch failed");
                let posts = self.cache.load(feed).await?;
                let mut report = StepReport::served(ChannelKind::TokenScan, posts);
                report.outcome = FetchOutcome::Failed;
                return Ok(report);
            }
        };

        let reset = page.tag != cursor.tag;
        if reset {
            info!(feed = %feed, old_tag = %cursor.tag, new_tag = %page.tag, "Feed generation rotated, clearing");
            self.cache.clear(feed).await?;
        }

        let merged = self.cache.merge(feed, &page.posts).await?;

        let position = match page.end {
            Some(end) if end > query.position => end,
            _ => END_OF_FEED,
        };
        if position == END_OF_FEED {
            debug!(feed = %feed, tag = %page.tag, start = ?page.start, end = ?page.end, "Feed made no forward progress, marking end");
        } else {
            debug!(feed = %feed, tag = %page.tag, start = ?page.start, end = position, admitted = merged.admitted.len(), "Feed page merged");
        }
        self.cursors
            .save_feed_cursor(feed, &FeedCursor::new(page.tag, position))
            .await?;

        Ok(StepReport {
            kind: ChannelKind::TokenScan,
            mode: None,
            outcome: FetchOutcome::Fetched,
            reset,
            admitted: merged.admitted,
            posts: merged.posts,
        })
    }
}
