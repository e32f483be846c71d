//! Viewport windowing over a variable-height transcript.
//!
//! Given a scroll offset and viewport height, [`Virtualizer`] computes the
//! minimal contiguous index range that intersects the viewport, padded by a
//! configurable overscan, so the host renders a handful of items instead of
//! the whole transcript.
//!
//! # Design
//!
//! - [`WindowConfig`] holds tuning parameters (overscan, default estimate).
//! - [`Virtualizer`] owns the [`HeightTable`] and answers windowing queries.
//! - [`VisibleWindow`] is the per-frame result: the index range plus one
//!   [`VirtualItem`] per rendered index.
//!
//! A query is a pure function over `(items, scroll_top, viewport_height)`
//! and the current height table; it never fails and has no side effects
//! beyond the lazy offset-cache rebuild.

use crate::height::HeightTable;
use crate::types::{ItemKey, TranscriptItem};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the windowing engine.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Extra items rendered above and below the visible range to avoid
    /// blank flashes during fast scrolling.
    pub overscan: usize,

    /// Default height assumed for items that have not been measured yet.
    pub estimated_height: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            overscan: 3,
            estimated_height: 64.0,
        }
    }
}

impl WindowConfig {
    /// Override the overscan count.
    #[must_use]
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    /// Override the default estimated item height.
    #[must_use]
    pub fn with_estimated_height(mut self, estimated_height: f64) -> Self {
        self.estimated_height = estimated_height;
        self
    }
}

// ---------------------------------------------------------------------------
// Window snapshot
// ---------------------------------------------------------------------------

/// One item in the rendered window, with absolute positioning geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualItem {
    /// Position in the caller's ordered sequence.
    pub index: usize,
    /// Stable render identity (caller key, or index fallback).
    pub key: ItemKey,
    /// Top edge, in content coordinates.
    pub offset_top: f64,
    /// Measured height if known, otherwise the estimate.
    pub height: f64,
}

/// Ephemeral result of a windowing query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisibleWindow {
    /// First rendered index (inclusive), overscan included.
    pub start_index: usize,
    /// Last rendered index (inclusive), overscan included.
    pub end_index: usize,
    /// Total content extent at query time.
    pub total_height: f64,
    /// One entry per index in `start_index..=end_index`.
    pub items: Vec<VirtualItem>,
}

impl VisibleWindow {
    /// Whether the window renders nothing (empty list or zero viewport).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of rendered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

// ---------------------------------------------------------------------------
// Virtualizer
// ---------------------------------------------------------------------------

/// Windowing engine for a single transcript view.
///
/// Owns the height table; the host feeds measurements in as items are laid
/// out and queries a [`VisibleWindow`] each frame.
#[derive(Debug, Clone)]
pub struct Virtualizer {
    table: HeightTable,
    overscan: usize,
}

impl Virtualizer {
    /// Create a virtualizer from a window configuration.
    #[must_use]
    pub fn new(config: WindowConfig) -> Self {
        Self {
            table: HeightTable::new(config.estimated_height),
            overscan: config.overscan,
        }
    }

    /// Create a virtualizer with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(WindowConfig::default())
    }

    /// Shared access to the height table.
    #[must_use]
    pub fn table(&self) -> &HeightTable {
        &self.table
    }

    /// Mutable access to the height table.
    pub fn table_mut(&mut self) -> &mut HeightTable {
        &mut self.table
    }

    /// Record a measured item height. Returns `true` if the value changed.
    pub fn measure(&mut self, index: usize, height: f64) -> bool {
        self.table.measure(index, height)
    }

    /// Total content extent for `item_count` items.
    pub fn total_height(&mut self, item_count: usize) -> f64 {
        self.table.total_height(item_count)
    }

    /// Scroll offset that puts `index` at the top of the viewport, or
    /// `None` when `index` is out of range for `item_count` items.
    pub fn scroll_to_index(&mut self, index: usize, item_count: usize) -> Option<f64> {
        if index >= item_count {
            return None;
        }
        self.table.offsets(item_count).offset_of(index)
    }

    /// Compute the window of items intersecting
    /// `[scroll_top, scroll_top + viewport_height]`, padded by overscan.
    ///
    /// An empty sequence or a non-positive viewport height yields an empty
    /// window, not an error.
    pub fn window<I: TranscriptItem>(
        &mut self,
        items: &[I],
        scroll_top: f64,
        viewport_height: f64,
    ) -> VisibleWindow {
        let count = items.len();
        if count == 0 || viewport_height <= 0.0 {
            return VisibleWindow::default();
        }

        // Clone ends the table borrow; the emit loop reads heights below.
        let offsets = self.table.offsets(count).clone();
        let total_height = offsets.total_height();

        // Greatest offset <= scroll_top, then pad upward.
        let first_visible = offsets.find_start_index(scroll_top);
        let start_index = first_visible.saturating_sub(self.overscan);

        // Scan forward until an item starts at or past the bottom edge,
        // then pad downward.
        let bottom = scroll_top + viewport_height;
        let mut raw_end = first_visible;
        while raw_end + 1 < count {
            match offsets.offset_of(raw_end) {
                Some(off) if off >= bottom => break,
                _ => raw_end += 1,
            }
        }
        let end_index = raw_end.saturating_add(self.overscan).min(count - 1);

        let mut rendered = Vec::with_capacity(end_index - start_index + 1);
        for index in start_index..=end_index {
            rendered.push(VirtualItem {
                index,
                key: ItemKey::resolve(items[index].key(), index),
                offset_top: offsets.offset_of(index).unwrap_or(0.0),
                height: self.table.height(index),
            });
        }

        VisibleWindow {
            start_index,
            end_index,
            total_height,
            items: rendered,
        }
    }
}
