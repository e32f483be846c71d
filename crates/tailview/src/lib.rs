#![forbid(unsafe_code)]

//! tailview public facade: a composed controller for one transcript view.
//!
//! The workspace crates each own one concern: `tailview-core` computes which
//! items intersect the viewport, `tailview-stream` coalesces streamed text
//! fragments into bounded flushes, and `tailview-follow` decides whether the
//! viewport may chase new content. [`TranscriptView`] wires them together
//! into the control flow a chat host actually wants:
//!
//! - item count and measured heights flow into the windowing engine, which
//!   answers [`TranscriptView::window`] queries each frame;
//! - streamed fragments flow into the delta buffer; its flush events carry
//!   coalesced text back to the host, whose content updates invalidate
//!   heights via [`TranscriptView::measure`];
//! - scroll samples feed the intent tracker, and
//!   [`TranscriptView::follow_frame`] nudges the viewport toward the bottom
//!   while streaming, unless the user is reading history.
//!
//! One `TranscriptView` per visible transcript; construct it with an
//! explicit [`TranscriptConfig`] and drop it on teardown. Nothing here is
//! global and no callbacks are retained, so disposal cannot leave a
//! dangling scheduled invocation.

use web_time::Instant;

pub use tailview_core::{
    HeightTable, ItemKey, MessageId, OffsetTable, ScrollMetrics, SessionId, StreamKey,
    TranscriptItem, VirtualItem, Virtualizer, VisibleWindow, WindowConfig,
};
pub use tailview_follow::{FollowConfig, FollowController, IntentTracker, ScrollIntent};
pub use tailview_stream::{
    BufferStats, FlushEvent, FlushMode, FlushReason, StreamBuffer, StreamConfig,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Aggregated configuration for one transcript view.
#[derive(Debug, Clone, Default)]
pub struct TranscriptConfig {
    /// Windowing engine settings (overscan, estimated height).
    pub window: WindowConfig,
    /// Delta buffer settings (flush mode, buffer bounds, widening).
    pub stream: StreamConfig,
    /// Follow controller settings (threshold, easing, reduced motion).
    pub follow: FollowConfig,
}

impl TranscriptConfig {
    /// Load defaults, then apply environment overrides from every
    /// sub-config.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            window: WindowConfig::default(),
            stream: StreamConfig::from_env(),
            follow: FollowConfig::from_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Composed incremental-rendering controller for a live transcript.
#[derive(Debug, Clone)]
pub struct TranscriptView {
    virtualizer: Virtualizer,
    buffer: StreamBuffer,
    follow: FollowController,
    item_count: usize,
}

impl TranscriptView {
    /// Create a view controller from an aggregate configuration.
    #[must_use]
    pub fn new(config: TranscriptConfig) -> Self {
        Self {
            virtualizer: Virtualizer::new(config.window),
            buffer: StreamBuffer::new(config.stream),
            follow: FollowController::new(config.follow),
            item_count: 0,
        }
    }

    /// Create a view controller with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(TranscriptConfig::default())
    }

    // --- Items & geometry --------------------------------------------------

    /// Current item count.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Inform the controller that items were appended or truncated without
    /// the identity of existing items changing.
    pub fn set_item_count(&mut self, item_count: usize) {
        self.item_count = item_count;
    }

    /// Replace the whole item sequence, e.g. on a session switch. Drops
    /// every recorded measurement.
    pub fn replace_items(&mut self, item_count: usize) {
        self.virtualizer.table_mut().clear();
        self.item_count = item_count;
        tracing::debug!(item_count, "item sequence replaced");
    }

    /// Record a measured item height (e.g. from a layout observer).
    /// Returns `true` if the value changed.
    pub fn measure(&mut self, index: usize, height: f64) -> bool {
        self.virtualizer.measure(index, height)
    }

    /// Total content extent for the current item count.
    pub fn total_height(&mut self) -> f64 {
        self.virtualizer.total_height(self.item_count)
    }

    /// Compute the window of items to render for the current scroll
    /// position. Also adopts `items.len()` as the current item count.
    pub fn window<I: TranscriptItem>(
        &mut self,
        items: &[I],
        scroll_top: f64,
        viewport_height: f64,
    ) -> VisibleWindow {
        self.item_count = items.len();
        self.virtualizer.window(items, scroll_top, viewport_height)
    }

    /// Shared access to the windowing engine.
    #[must_use]
    pub fn virtualizer(&self) -> &Virtualizer {
        &self.virtualizer
    }

    // --- Streaming ---------------------------------------------------------

    /// Feed one streamed fragment. Marks streaming active so follow frames
    /// start running. May return an immediate overflow flush.
    pub fn append_delta(
        &mut self,
        key: &StreamKey,
        delta: &str,
        now: Instant,
    ) -> Option<FlushEvent> {
        if !self.follow.is_streaming() {
            self.follow.set_streaming(true);
        }
        self.buffer.append(key, delta, now)
    }

    /// One flush-scheduler tick: drain every eligible entry, in insertion
    /// order. The host merges each event's text into the keyed item and
    /// re-measures it, which feeds back into the height table.
    pub fn flush_tick(&mut self, now: Instant) -> Vec<FlushEvent> {
        self.buffer.tick(now)
    }

    /// When the host's flush timer should next fire; `None` while idle.
    /// The next [`TranscriptView::append_delta`] re-arms an idle loop.
    #[must_use]
    pub fn next_flush_deadline(&self) -> Option<Instant> {
        self.buffer.next_deadline()
    }

    /// End the streaming phase: force-flush everything still buffered and
    /// stop the follow loop.
    pub fn end_stream(&mut self, now: Instant) -> Vec<FlushEvent> {
        self.follow.set_streaming(false);
        self.buffer.flush_all(true, now)
    }

    /// Force-flush and drop all buffered text for one session.
    pub fn clear_stream(&mut self, session: &SessionId, now: Instant) -> Vec<FlushEvent> {
        self.buffer.clear_session(session, now)
    }

    /// Whether `session` is currently rate-limited to the widened flush
    /// interval.
    #[must_use]
    pub fn is_high_throughput(&self, session: &SessionId) -> bool {
        self.buffer.is_high_throughput(session)
    }

    /// Delta-buffer counters, for debug overlays.
    #[must_use]
    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    // --- Scroll & follow ---------------------------------------------------

    /// Feed one raw scroll sample from the viewport.
    pub fn on_scroll(
        &mut self,
        scroll_top: f64,
        viewport_height: f64,
        now: Instant,
    ) -> ScrollIntent {
        let metrics = self.metrics(scroll_top, viewport_height);
        self.follow.on_scroll(metrics, now)
    }

    /// One follow tick, called once per host paint while streaming.
    /// Returns the `scroll_top` to apply, or `None` when the viewport
    /// should hold still.
    pub fn follow_frame(
        &mut self,
        scroll_top: f64,
        viewport_height: f64,
        now: Instant,
    ) -> Option<f64> {
        let metrics = self.metrics(scroll_top, viewport_height);
        self.follow.on_frame(metrics, now)
    }

    /// Jump to the bottom and clear reading intent. Returns the
    /// `scroll_top` to apply.
    pub fn scroll_to_bottom(&mut self, scroll_top: f64, viewport_height: f64) -> f64 {
        let metrics = self.metrics(scroll_top, viewport_height);
        self.follow.force_scroll_to_bottom(metrics)
    }

    /// Scroll offset that puts `index` at the top of the viewport, or
    /// `None` for an out-of-range index.
    pub fn scroll_to_index(&mut self, index: usize) -> Option<f64> {
        self.virtualizer.scroll_to_index(index, self.item_count)
    }

    /// Whether the host should show a "jump to latest" affordance.
    #[must_use]
    pub fn show_jump_affordance(&self) -> bool {
        self.follow.show_jump_affordance()
    }

    /// Current scroll intent.
    #[must_use]
    pub fn intent(&self) -> ScrollIntent {
        self.follow.intent()
    }

    fn metrics(&mut self, scroll_top: f64, viewport_height: f64) -> ScrollMetrics {
        let total_height = self.virtualizer.total_height(self.item_count);
        ScrollMetrics::new(scroll_top, viewport_height, total_height)
    }
}

impl Default for TranscriptView {
    fn default() -> Self {
        Self::with_defaults()
    }
}
