//! Active-channel state tying the scheduler, autoload gate and display
//! together.

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::autoload::{AutoloadGate, ScrollMetrics};
use crate::channel::{Channel, ChannelKind};
use crate::config::Config;
use crate::display::DisplayAdapter;
use crate::scheduler::{Scheduler, StepReport};

/// Drives one view: activation of a channel and scroll-triggered loading.
///
/// A fetch started for a channel always completes and is merged, but its
/// output is only rendered if that channel is still the active one.
pub struct FeedEngine {
    scheduler: Scheduler,
    display: Arc<dyn DisplayAdapter>,
    autoload: AutoloadGate,
    active: RwLock<Option<Channel>>,
}

impl FeedEngine {
    #[must_use]
    pub fn new(scheduler: Scheduler, display: Arc<dyn DisplayAdapter>, config: &Config) -> Self {
        Self {
            scheduler,
            display,
            autoload: AutoloadGate::new(config.autoload),
            active: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The channel currently shown, if any.
    #[must_use]
    pub fn active_channel(&self) -> Option<Channel> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_active(&self, channel: &Channel) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            == Some(channel)
    }

    fn set_active(&self, channel: Option<Channel>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = channel;
    }

    /// Make `name` the active channel, refresh it and render its cache.
    ///
    /// Returns `None` without fetching or rendering if the name is not in
    /// the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn activate(&self, kind: ChannelKind, name: &str) -> Result<Option<StepReport>> {
        let channel = match Channel::resolve(kind, name) {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, "Ignoring activation of unknown channel");
                self.set_active(None);
                return Ok(None);
            }
        };

        info!(channel = %channel, "Activating channel");
        self.set_active(Some(channel.clone()));
        self.autoload.reset();
        self.display.clear(&channel);

        let report = self.scheduler.activate(&channel).await?;

        if self.is_active(&channel) {
            self.display.render(&channel, &report.ordered());
        } else {
            debug!(channel = %channel, "Channel no longer active, skipping render");
        }

        Ok(Some(report))
    }

    /// Handle a scroll event on the active channel.
    ///
    /// Returns `None` if no channel is active or the autoload gate is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> Result<Option<StepReport>> {
        let Some(channel) = self.active_channel() else {
            return Ok(None);
        };
        if !self.autoload.try_fire(metrics, self.scheduler.clock().now()) {
            return Ok(None);
        }

        debug!(channel = %channel, "Autoload fired");
        let report = self.scheduler.increment(&channel).await?;

        if !self.is_active(&channel) {
            debug!(channel = %channel, "Channel no longer active, skipping render");
        } else if report.reset {
            self.display.clear(&channel);
            self.display.render(&channel, &report.ordered());
        } else if !report.admitted.is_empty() {
            self.display.render(&channel, &report.ordered_admitted());
        }

        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, Duration};

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Post;
    use crate::source::testing::ScriptedSource;
    use crate::source::FeedPage;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct RecordingDisplay {
        events: Mutex<Vec<String>>,
    }

    impl RecordingDisplay {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DisplayAdapter for RecordingDisplay {
        fn render(&self, channel: &Channel, posts: &[Post]) {
            let ids: Vec<String> = posts
                .iter()
                .filter_map(Post::identity)
                .map(|id| id.to_string())
                .collect();
            self.events
                .lock()
                .unwrap()
                .push(format!("render {} [{}]", channel.name(), ids.join(",")));
        }

        fn clear(&self, channel: &Channel) {
            self.events
                .lock()
                .unwrap()
                .push(format!("clear {}", channel.name()));
        }
    }

    fn post(id: i64) -> Post {
        Post {
            id: Some(id),
            ..Post::default()
        }
    }

    fn near_bottom() -> ScrollMetrics {
        ScrollMetrics {
            content_height: 5000,
            distance_to_bottom: 100,
        }
    }

    struct Harness {
        engine: FeedEngine,
        source: Arc<ScriptedSource>,
        display: Arc<RecordingDisplay>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(ScriptedSource::new());
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let display = Arc::new(RecordingDisplay::default());
        let config = Config::for_testing();
        let scheduler = Scheduler::new(store, source.clone(), clock.clone(), config.staleness);
        let engine = FeedEngine::new(scheduler, display.clone(), &config);
        Harness {
            engine,
            source,
            display,
            clock,
        }
    }

    #[tokio::test]
    async fn test_unknown_channel_short_circuits() {
        let h = harness();
        let report = h
            .engine
            .activate(ChannelKind::RangeScan, "Not A Forum")
            .await
            .unwrap();

        assert!(report.is_none());
        assert!(h.engine.active_channel().is_none());
        assert!(h.display.events().is_empty());
        assert!(h.source.forum_queries().is_empty());
    }

    #[tokio::test]
    async fn test_activate_forum_renders_newest_first() {
        let h = harness();
        h.source.push_forum(Ok(vec![post(3), post(1), post(2)]));

        h.engine
            .activate(ChannelKind::RangeScan, "Gaming")
            .await
            .unwrap();

        assert_eq!(
            h.display.events(),
            vec!["clear Gaming".to_string(), "render Gaming [3,2,1]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_activate_feed_renders_cache_order() {
        let h = harness();
        h.source.push_feed(Ok(FeedPage {
            tag: "g1".to_string(),
            start: Some(1),
            end: Some(20),
            posts: vec![post(3), post(1), post(2)],
        }));

        h.engine.activate(ChannelKind::TokenScan, "Home").await.unwrap();

        assert_eq!(
            h.display.events(),
            vec!["clear Home".to_string(), "render Home [1,2,3]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_scroll_appends_older_forum_posts() {
        let h = harness();
        h.source.push_forum(Ok(vec![post(10), post(9)]));
        h.engine
            .activate(ChannelKind::RangeScan, "Gaming")
            .await
            .unwrap();

        h.source.push_forum(Ok(vec![post(8), post(7), post(9)]));
        let report = h.engine.on_scroll(near_bottom()).await.unwrap().unwrap();
        assert_eq!(report.admitted.len(), 2);

        // Within the cooldown nothing more is requested.
        assert!(h.engine.on_scroll(near_bottom()).await.unwrap().is_none());
        assert_eq!(h.source.forum_queries().len(), 2);

        assert_eq!(
            h.display.events().last().map(String::as_str),
            Some("render Gaming [8,7]")
        );
    }

    #[tokio::test]
    async fn test_scroll_after_tag_rotation_redraws() {
        let h = harness();
        h.source.push_feed(Ok(FeedPage {
            tag: "A".to_string(),
            start: Some(1),
            end: Some(20),
            posts: vec![post(1), post(2)],
        }));
        h.engine.activate(ChannelKind::TokenScan, "News").await.unwrap();

        h.clock.advance(Duration::seconds(5));
        h.source.push_feed(Ok(FeedPage {
            tag: "B".to_string(),
            start: Some(1),
            end: Some(20),
            posts: vec![post(30)],
        }));
        let report = h.engine.on_scroll(near_bottom()).await.unwrap().unwrap();

        assert!(report.reset);
        let events = h.display.events();
        assert_eq!(
            &events[events.len() - 2..],
            &["clear News".to_string(), "render News [30]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_scroll_without_active_channel() {
        let h = harness();
        assert!(h.engine.on_scroll(near_bottom()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_content_does_not_autoload() {
        let h = harness();
        h.source.push_forum(Ok(vec![post(5)]));
        h.engine
            .activate(ChannelKind::RangeScan, "Gaming")
            .await
            .unwrap();

        let short = ScrollMetrics {
            content_height: 800,
            distance_to_bottom: 0,
        };
        assert!(h.engine.on_scroll(short).await.unwrap().is_none());
        assert_eq!(h.source.forum_queries().len(), 1);
    }
}
