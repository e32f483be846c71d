//! Classifying scroll samples into user intent.

use web_time::{Duration, Instant};

use tailview_core::ScrollMetrics;

/// The two behavioral states of the viewport during streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollIntent {
    /// The viewport tracks new content; auto-scroll is permitted.
    #[default]
    Following,
    /// The user deliberately moved away from the bottom; auto-scroll is
    /// suppressed until they return.
    Reading,
}

/// Observes raw scroll samples and maintains the current [`ScrollIntent`].
///
/// Intent is purely positional: a sample further than `threshold` pixels
/// above the bottom means the user is reading, a sample within it means
/// they are following. The recorded scroll timestamp is bookkeeping for
/// debug overlays; clearing it after the debounce window never changes
/// state.
#[derive(Debug, Clone)]
pub struct IntentTracker {
    threshold: f64,
    debounce: Duration,
    intent: ScrollIntent,
    last_user_scroll: Option<Instant>,
}

impl IntentTracker {
    /// Create a tracker with the given bottom-distance threshold and
    /// scroll-timestamp debounce window.
    #[must_use]
    pub fn new(threshold: f64, debounce: Duration) -> Self {
        Self {
            threshold: threshold.max(0.0),
            debounce,
            intent: ScrollIntent::Following,
            last_user_scroll: None,
        }
    }

    /// Current intent.
    #[must_use]
    pub fn intent(&self) -> ScrollIntent {
        self.intent
    }

    /// Whether auto-scroll is currently suppressed.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.intent == ScrollIntent::Reading
    }

    /// Distance threshold in use.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Timestamp of the most recent away-from-bottom scroll, if still
    /// within the debounce window.
    #[must_use]
    pub fn last_user_scroll(&self) -> Option<Instant> {
        self.last_user_scroll
    }

    /// Classify one scroll sample and return the resulting intent.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) -> ScrollIntent {
        if metrics.distance_from_bottom() > self.threshold {
            if self.intent != ScrollIntent::Reading {
                tracing::debug!(
                    distance = metrics.distance_from_bottom(),
                    "user scrolled away, suppressing auto-follow"
                );
            }
            self.intent = ScrollIntent::Reading;
            self.last_user_scroll = Some(now);
        } else {
            if self.intent != ScrollIntent::Following {
                tracing::debug!("user returned to bottom, resuming auto-follow");
            }
            self.intent = ScrollIntent::Following;
        }
        self.intent
    }

    /// Clear the recorded scroll timestamp once the viewport has stayed
    /// within threshold for the debounce window. Bookkeeping only; the
    /// intent never changes here.
    pub fn poll_debounce(&mut self, now: Instant) {
        if self.intent == ScrollIntent::Following
            && let Some(at) = self.last_user_scroll
            && now.duration_since(at) >= self.debounce
        {
            self.last_user_scroll = None;
        }
    }

    /// Unconditionally reset to [`ScrollIntent::Following`], e.g. when the
    /// user sends a new message. New user-authored content always wins over
    /// reading intent.
    pub fn force_following(&mut self) {
        self.intent = ScrollIntent::Following;
        self.last_user_scroll = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_top: f64) -> ScrollMetrics {
        // viewport 500, total 2000: max_scroll_top = 1500.
        ScrollMetrics::new(scroll_top, 500.0, 2000.0)
    }

    fn tracker() -> IntentTracker {
        IntentTracker::new(100.0, Duration::from_secs(2))
    }

    #[test]
    fn starts_following() {
        let t = tracker();
        assert_eq!(t.intent(), ScrollIntent::Following);
        assert!(t.last_user_scroll().is_none());
    }

    #[test]
    fn far_sample_switches_to_reading() {
        let mut t = tracker();
        let now = Instant::now();
        assert_eq!(t.on_scroll(metrics(1000.0), now), ScrollIntent::Reading);
        assert!(t.is_reading());
        assert_eq!(t.last_user_scroll(), Some(now));
    }

    #[test]
    fn near_sample_switches_back_to_following() {
        let mut t = tracker();
        let now = Instant::now();
        t.on_scroll(metrics(1000.0), now);
        assert_eq!(
            t.on_scroll(metrics(1450.0), now + Duration::from_millis(100)),
            ScrollIntent::Following
        );
    }

    #[test]
    fn exact_threshold_counts_as_following() {
        let mut t = tracker();
        // distance = 1500 - 1400 = 100 = threshold: within.
        assert_eq!(
            t.on_scroll(metrics(1400.0), Instant::now()),
            ScrollIntent::Following
        );
    }

    #[test]
    fn debounce_clears_timestamp_without_changing_state() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.on_scroll(metrics(1000.0), t0);
        t.on_scroll(metrics(1500.0), t0 + Duration::from_millis(10));
        assert!(t.last_user_scroll().is_some());

        // Not elapsed yet.
        t.poll_debounce(t0 + Duration::from_secs(1));
        assert!(t.last_user_scroll().is_some());

        t.poll_debounce(t0 + Duration::from_secs(3));
        assert!(t.last_user_scroll().is_none());
        assert_eq!(t.intent(), ScrollIntent::Following);
    }

    #[test]
    fn debounce_does_not_clear_while_reading() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.on_scroll(metrics(1000.0), t0);
        t.poll_debounce(t0 + Duration::from_secs(10));
        assert!(t.last_user_scroll().is_some());
        assert!(t.is_reading());
    }

    #[test]
    fn force_following_overrides_reading() {
        let mut t = tracker();
        t.on_scroll(metrics(0.0), Instant::now());
        assert!(t.is_reading());
        t.force_following();
        assert_eq!(t.intent(), ScrollIntent::Following);
        assert!(t.last_user_scroll().is_none());
    }

    #[test]
    fn short_content_is_always_following() {
        let mut t = tracker();
        // Content fits the viewport: distance from bottom is zero.
        let m = ScrollMetrics::new(0.0, 500.0, 200.0);
        assert_eq!(t.on_scroll(m, Instant::now()), ScrollIntent::Following);
    }

    #[test]
    fn negative_threshold_sanitized() {
        let t = IntentTracker::new(-5.0, Duration::from_secs(2));
        assert_eq!(t.threshold(), 0.0);
    }
}
