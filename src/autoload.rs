//! Scroll-driven gate for loading one more increment of a channel.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::config::AutoloadPolicy;

/// Scroll state reported by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollMetrics {
    /// Total height of the scrollable content.
    pub content_height: u32,
    /// Distance left between the viewport bottom and the content bottom.
    pub distance_to_bottom: u32,
}

/// Whether an autoload may fire given the last firing time.
#[must_use]
pub fn allows(
    policy: &AutoloadPolicy,
    metrics: ScrollMetrics,
    last_fired: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if metrics.content_height < policy.min_content_height {
        return false;
    }
    if metrics.distance_to_bottom > policy.scroll_threshold {
        return false;
    }
    last_fired.map_or(true, |at| {
        (now - at)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= policy.cooldown)
    })
}

/// Rate-limited autoload trigger.
///
/// Only the cooldown keeps firings apart; an autoload can still overlap with
/// a channel activation.
#[derive(Debug)]
pub struct AutoloadGate {
    policy: AutoloadPolicy,
    last_fired: Mutex<Option<DateTime<Utc>>>,
}

impl AutoloadGate {
    #[must_use]
    pub fn new(policy: AutoloadPolicy) -> Self {
        Self {
            policy,
            last_fired: Mutex::new(None),
        }
    }

    /// Check the gate and, if open, record `now` as the firing time.
    pub fn try_fire(&self, metrics: ScrollMetrics, now: DateTime<Utc>) -> bool {
        let mut last_fired = self
            .last_fired
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !allows(&self.policy, metrics, *last_fired, now) {
            trace!(?metrics, "Autoload gate closed");
            return false;
        }

        *last_fired = Some(now);
        true
    }

    /// Forget the last firing, e.g. after switching channels.
    pub fn reset(&self) {
        *self
            .last_fired
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn near_bottom() -> ScrollMetrics {
        ScrollMetrics {
            content_height: 4000,
            distance_to_bottom: 200,
        }
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_short_content_never_fires() {
        let metrics = ScrollMetrics {
            content_height: 1499,
            distance_to_bottom: 0,
        };
        assert!(!allows(&AutoloadPolicy::default(), metrics, None, at_ms(0)));
    }

    #[test]
    fn test_far_from_bottom_never_fires() {
        let metrics = ScrollMetrics {
            content_height: 4000,
            distance_to_bottom: 501,
        };
        assert!(!allows(&AutoloadPolicy::default(), metrics, None, at_ms(0)));
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let metrics = ScrollMetrics {
            content_height: 1500,
            distance_to_bottom: 500,
        };
        assert!(allows(&AutoloadPolicy::default(), metrics, None, at_ms(0)));
        assert!(allows(
            &AutoloadPolicy::default(),
            metrics,
            Some(at_ms(0)),
            at_ms(2500)
        ));
    }

    #[test]
    fn test_fires_once_per_cooldown() {
        let gate = AutoloadGate::new(AutoloadPolicy::default());
        let start = at_ms(1_700_000_000_000);

        let fired = (0..100_i64)
            .filter(|i| gate.try_fire(near_bottom(), start + Duration::milliseconds(i * 20)))
            .count();
        assert_eq!(fired, 1);

        assert!(gate.try_fire(near_bottom(), start + Duration::milliseconds(2500)));
        assert!(!gate.try_fire(near_bottom(), start + Duration::milliseconds(4999)));
    }

    #[test]
    fn test_closed_gate_does_not_consume_cooldown() {
        let gate = AutoloadGate::new(AutoloadPolicy::default());
        let far = ScrollMetrics {
            content_height: 4000,
            distance_to_bottom: 3000,
        };
        assert!(!gate.try_fire(far, at_ms(0)));
        assert!(gate.try_fire(near_bottom(), at_ms(10)));
    }

    #[test]
    fn test_reset() {
        let gate = AutoloadGate::new(AutoloadPolicy::default());
        assert!(gate.try_fire(near_bottom(), at_ms(0)));
        assert!(!gate.try_fire(near_bottom(), at_ms(10)));
        gate.reset();
        assert!(gate.try_fire(near_bottom(), at_ms(20)));
    }
}
