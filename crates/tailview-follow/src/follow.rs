//! Eased auto-scroll toward the newest content.

use web_time::{Duration, Instant};

use tailview_core::ScrollMetrics;

use crate::intent::{IntentTracker, ScrollIntent};

/// Default distance-from-bottom threshold, in pixels.
pub const DEFAULT_FOLLOW_THRESHOLD_PX: f64 = 100.0;

/// Minimum allowed threshold override.
pub const MIN_FOLLOW_THRESHOLD_PX: f64 = 16.0;

/// Maximum allowed threshold override.
pub const MAX_FOLLOW_THRESHOLD_PX: f64 = 400.0;

/// Default per-frame easing factor: each nudge covers this fraction of the
/// remaining distance.
pub const DEFAULT_EASING: f64 = 0.25;

/// Default debounce for the intent tracker's scroll-timestamp bookkeeping.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Minimum spacing between nudges. The eye cannot track scroll motion much
/// above 20 fps, so per-frame work on a 120 Hz display is wasted.
pub const DEFAULT_MIN_FRAME_SPACING_MS: u64 = 50;

/// Tuning knobs for the follow controller.
///
/// The easing factor is an empirically tuned constant, carried as
/// configuration rather than an invariant.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `TAILVIEW_FOLLOW_THRESHOLD_PX` | f64 | 100 | Bottom distance treated as "following" (clamped 16–400) |
/// | `TAILVIEW_REDUCED_MOTION` | bool | false | Set to `1`/`true` to jump instead of easing |
#[derive(Debug, Clone)]
pub struct FollowConfig {
    /// Distance from the bottom within which the user counts as following.
    pub threshold: f64,

    /// Fraction of the remaining distance covered per nudge (0, 1].
    pub easing: f64,

    /// Replace eased motion with instant jumps (accessibility setting).
    pub reduced_motion: bool,

    /// Remaining distance below which the viewport snaps and stops.
    pub snap_epsilon: f64,

    /// Debounce window for intent bookkeeping.
    pub debounce: Duration,

    /// Minimum spacing between two nudges.
    pub min_frame_spacing: Duration,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FOLLOW_THRESHOLD_PX,
            easing: DEFAULT_EASING,
            reduced_motion: false,
            snap_epsilon: 0.5,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            min_frame_spacing: Duration::from_millis(DEFAULT_MIN_FRAME_SPACING_MS),
        }
    }
}

impl FollowConfig {
    /// Override the follow threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Override the easing factor. Values outside (0, 1] are clamped.
    #[must_use]
    pub fn with_easing(mut self, easing: f64) -> Self {
        self.easing = easing.clamp(0.01, 1.0);
        self
    }

    /// Enable or disable reduced-motion jumps.
    #[must_use]
    pub fn with_reduced_motion(mut self, reduced_motion: bool) -> Self {
        self.reduced_motion = reduced_motion;
        self
    }

    /// Load defaults, then apply environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("TAILVIEW_FOLLOW_THRESHOLD_PX") {
            match raw.trim().parse::<f64>() {
                Ok(px) if px.is_finite() => {
                    config.threshold = px.clamp(MIN_FOLLOW_THRESHOLD_PX, MAX_FOLLOW_THRESHOLD_PX);
                }
                _ => {
                    tracing::warn!(value = %raw, "ignoring unparseable TAILVIEW_FOLLOW_THRESHOLD_PX");
                }
            }
        }
        if let Ok(raw) = std::env::var("TAILVIEW_REDUCED_MOTION") {
            let raw = raw.trim();
            config.reduced_motion = raw == "1" || raw.eq_ignore_ascii_case("true");
        }

        config
    }
}

/// Drives the viewport toward the bottom while a response streams in,
/// honoring the user's scroll intent.
///
/// The host calls [`FollowController::on_frame`] once per paint while
/// streaming is active; the controller throttles itself to
/// [`FollowConfig::min_frame_spacing`] internally, so calling it at 120 Hz
/// costs nothing.
#[derive(Debug, Clone)]
pub struct FollowController {
    config: FollowConfig,
    tracker: IntentTracker,
    streaming: bool,
    last_nudge: Option<Instant>,
    /// Content extent bookkeeping, updated every frame even while reading.
    last_total_height: f64,
}

impl FollowController {
    /// Create a controller from a follow configuration.
    #[must_use]
    pub fn new(config: FollowConfig) -> Self {
        let tracker = IntentTracker::new(config.threshold, config.debounce);
        Self {
            config,
            tracker,
            streaming: false,
            last_nudge: None,
            last_total_height: 0.0,
        }
    }

    /// Create a controller with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FollowConfig::default())
    }

    /// Current intent.
    #[must_use]
    pub fn intent(&self) -> ScrollIntent {
        self.tracker.intent()
    }

    /// Shared access to the intent tracker.
    #[must_use]
    pub fn tracker(&self) -> &IntentTracker {
        &self.tracker
    }

    /// Whether the follow loop is active.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Total content height observed on the most recent frame.
    #[must_use]
    pub fn last_total_height(&self) -> f64 {
        self.last_total_height
    }

    /// Start or stop the follow loop. Stopping drops the pending nudge
    /// throttle state, so a later stream starts fresh.
    pub fn set_streaming(&mut self, streaming: bool) {
        if self.streaming != streaming {
            tracing::debug!(streaming, "follow loop toggled");
        }
        self.streaming = streaming;
        if !streaming {
            self.last_nudge = None;
        }
    }

    /// Feed one raw scroll sample from the host viewport.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) -> ScrollIntent {
        self.tracker.on_scroll(metrics, now)
    }

    /// Whether the host should show a "jump to latest" affordance.
    #[must_use]
    pub fn show_jump_affordance(&self) -> bool {
        self.tracker.is_reading()
    }

    /// Unconditionally clear reading intent and jump to the bottom.
    /// Returns the `scroll_top` to apply.
    ///
    /// Invoked on session switch, stream start, or a new outgoing message:
    /// the deliberate exception where new user-authored content overrides
    /// reading intent.
    pub fn force_scroll_to_bottom(&mut self, metrics: ScrollMetrics) -> f64 {
        self.tracker.force_following();
        self.last_total_height = metrics.total_height;
        self.last_nudge = None;
        metrics.max_scroll_top()
    }

    /// One follow tick. Returns the eased `scroll_top` the host should
    /// apply, or `None` when nothing should move this frame.
    ///
    /// While [`ScrollIntent::Reading`], the tick still updates its content
    /// bookkeeping but never mutates scroll.
    pub fn on_frame(&mut self, metrics: ScrollMetrics, now: Instant) -> Option<f64> {
        self.last_total_height = metrics.total_height;
        self.tracker.poll_debounce(now);

        if !self.streaming || self.tracker.is_reading() {
            return None;
        }
        if !metrics.is_near_bottom(self.config.threshold) {
            return None;
        }
        if let Some(at) = self.last_nudge
            && now.duration_since(at) < self.config.min_frame_spacing
        {
            return None;
        }

        let diff = metrics.max_scroll_top() - metrics.scroll_top;
        if diff <= self.config.snap_epsilon {
            return None;
        }

        let target = if self.config.reduced_motion {
            metrics.max_scroll_top()
        } else {
            metrics.scroll_top + diff * self.config.easing
        };

        self.last_nudge = Some(now);
        tracing::trace!(from = metrics.scroll_top, to = target, "follow nudge");
        Some(target.min(metrics.max_scroll_top()))
    }
}
