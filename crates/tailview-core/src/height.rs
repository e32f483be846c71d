//! Per-item height bookkeeping and the derived offset table.
//!
//! Items start with an estimated height and are upgraded to a measured
//! height once the host has laid them out. Measurements take permanent
//! precedence over estimates. The offset table is a cached prefix sum over
//! `measured.unwrap_or(estimate)`; it is rebuilt lazily, and only when a
//! mutation actually changed a stored value.
//!
//! The unchanged-measurement no-op is a hard contract, not an optimization:
//! hosts report sizes from layout observers that re-fire on every paint, and
//! a recompute on an unchanged value would re-trigger the very render that
//! produced the observation.

/// Fallback when the caller supplies a degenerate estimate (zero, negative,
/// NaN). Keeps the offset table strictly monotone for non-empty lists.
const MIN_HEIGHT: f64 = 1.0;

/// Derived prefix-sum table: `offsets[i]` is the top edge of item `i`.
///
/// Invariant: `offsets` is monotonically non-decreasing and
/// `total_height == offsets.last() + height(last)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetTable {
    offsets: Vec<f64>,
    total_height: f64,
}

impl OffsetTable {
    /// Top offsets per item index.
    #[must_use]
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Total content extent.
    #[must_use]
    pub fn total_height(&self) -> f64 {
        self.total_height
    }

    /// Number of items covered by the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the table covers no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Top offset of `index`, or `None` when out of range.
    #[must_use]
    pub fn offset_of(&self, index: usize) -> Option<f64> {
        self.offsets.get(index).copied()
    }

    /// Greatest index whose offset is `<= scroll_top`: the first item that
    /// can be partially visible at that scroll position. O(log n).
    ///
    /// Returns 0 for an empty table or a negative `scroll_top`.
    #[must_use]
    pub fn find_start_index(&self, scroll_top: f64) -> usize {
        self.offsets
            .partition_point(|&off| off <= scroll_top)
            .saturating_sub(1)
    }
}

/// Tracks estimated and measured heights per item index.
///
/// Owned by exactly one controller; all mutation is idempotent-safe against
/// redundant calls so correctness never depends on external locking.
#[derive(Debug, Clone)]
pub struct HeightTable {
    /// Default height for items that have never been measured.
    estimate: f64,
    /// Measured heights, indexed by item position. `None` = estimate only.
    measured: Vec<Option<f64>>,
    /// Cached offsets for `cached_count` items.
    cache: OffsetTable,
    cached_count: usize,
    dirty: bool,
    /// How many times the offset table has been recomputed.
    rebuilds: u64,
}

impl HeightTable {
    /// Create a table with the given default estimate per item.
    #[must_use]
    pub fn new(estimate: f64) -> Self {
        Self {
            estimate: sanitize(estimate),
            measured: Vec::new(),
            cache: OffsetTable::default(),
            cached_count: 0,
            dirty: true,
            rebuilds: 0,
        }
    }

    /// Current default estimate.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Replace the default estimate for unmeasured items.
    pub fn set_estimate(&mut self, estimate: f64) {
        let estimate = sanitize(estimate);
        if (estimate - self.estimate).abs() > f64::EPSILON {
            self.estimate = estimate;
            self.dirty = true;
        }
    }

    /// Record a measured height for `index`, replacing the estimate
    /// permanently. Returns `true` if the stored value changed.
    ///
    /// An unchanged value is a no-op and does not dirty the offset cache.
    /// Degenerate heights (NaN, infinite, negative) are ignored.
    pub fn measure(&mut self, index: usize, height: f64) -> bool {
        if !height.is_finite() || height < 0.0 {
            #[cfg(feature = "tracing")]
            tracing::debug!(index, height, "ignoring degenerate measurement");
            return false;
        }

        if self.measured.len() <= index {
            self.measured.resize(index + 1, None);
        }

        if self.measured[index] == Some(height) {
            return false;
        }

        self.measured[index] = Some(height);
        self.dirty = true;
        true
    }

    /// Height used for `index`: the measurement if one exists, otherwise
    /// the default estimate.
    #[must_use]
    pub fn height(&self, index: usize) -> f64 {
        self.measured
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(self.estimate)
    }

    /// Whether `index` has a recorded measurement.
    #[must_use]
    pub fn is_measured(&self, index: usize) -> bool {
        matches!(self.measured.get(index), Some(Some(_)))
    }

    /// Offsets and total extent for the first `item_count` items.
    ///
    /// Recomputes with a left-to-right scan only when a height changed or
    /// the item count differs from the cached run. O(n) per rebuild, O(1)
    /// when clean.
    pub fn offsets(&mut self, item_count: usize) -> &OffsetTable {
        if self.dirty || self.cached_count != item_count {
            self.rebuild(item_count);
        }
        &self.cache
    }

    /// Total extent for the first `item_count` items.
    pub fn total_height(&mut self, item_count: usize) -> f64 {
        self.offsets(item_count).total_height()
    }

    /// Number of offset-table recomputations so far.
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Drop all measurements, e.g. when the caller replaces the whole item
    /// sequence on a session switch. The estimate is kept.
    pub fn clear(&mut self) {
        self.measured.clear();
        self.dirty = true;
    }

    fn rebuild(&mut self, item_count: usize) {
        let mut offsets = Vec::with_capacity(item_count);
        let mut running = 0.0_f64;
        for index in 0..item_count {
            offsets.push(running);
            running += self.height(index);
        }
        self.cache = OffsetTable {
            offsets,
            total_height: running,
        };
        self.cached_count = item_count;
        self.dirty = false;
        self.rebuilds += 1;
    }
}

fn sanitize(height: f64) -> f64 {
    if height.is_finite() && height >= MIN_HEIGHT {
        height
    } else {
        MIN_HEIGHT
    }
}
