//! Flush scheduling configuration.

use web_time::Duration;

/// Default high-throughput threshold, in chars per rolling second.
pub const DEFAULT_HIGH_THROUGHPUT_CHARS_PER_SEC: usize = 500;

/// Default buffer length that makes an entry flush-eligible regardless of
/// elapsed time.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 512;

/// Default cap on the widened interval, in milliseconds.
pub const DEFAULT_WIDENED_CAP_MS: u64 = 64;

/// Minimum allowed base interval override, in milliseconds.
pub const MIN_BASE_INTERVAL_MS: u64 = 4;

/// Maximum allowed base interval override, in milliseconds.
pub const MAX_BASE_INTERVAL_MS: u64 = 250;

/// Base flush cadence presets.
///
/// The preset picks the target latency between coalesced flushes for a key
/// under normal traffic; the adaptive widening in
/// [`StreamConfig::widened_interval`] stretches it during bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// 16 ms, every frame on a 60 Hz display. For short interactive
    /// responses where latency matters most.
    Realtime,
    /// 24 ms.
    Fast,
    /// 32 ms, the default trade-off between latency and render churn.
    Balanced,
    /// 80 ms, for long background generations.
    Relaxed,
    /// Explicit base interval.
    Custom(Duration),
}

impl FlushMode {
    /// Base flush interval for this mode.
    #[must_use]
    pub fn base_interval(self) -> Duration {
        match self {
            Self::Realtime => Duration::from_millis(16),
            Self::Fast => Duration::from_millis(24),
            Self::Balanced => Duration::from_millis(32),
            Self::Relaxed => Duration::from_millis(80),
            Self::Custom(interval) => interval,
        }
    }
}

impl Default for FlushMode {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Tuning knobs for the delta buffer.
///
/// The widening multiplier and cap are empirically tuned values carried as
/// configuration, not invariants; retune them if the host's frame budget
/// differs.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `TAILVIEW_FLUSH_BASE_MS` | u64 | 32 | Base flush interval (clamped 4–250) |
/// | `TAILVIEW_MAX_BUFFER_LEN` | usize | 512 | Length-triggered flush threshold |
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Base cadence preset.
    pub mode: FlushMode,

    /// Buffered length at which an entry flushes regardless of elapsed
    /// time. Twice this length forces a synchronous flush inside `append`
    /// to bound memory.
    pub max_buffer_len: usize,

    /// Rolling-rate threshold above which a session is marked
    /// high-throughput and its flush interval widened.
    pub high_throughput_chars_per_sec: usize,

    /// Interval multiplier applied to high-throughput sessions.
    pub widen_factor: f64,

    /// Upper bound on the widened interval.
    pub widened_cap: Duration,

    /// Width of the rolling character-rate window.
    pub rate_window: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            mode: FlushMode::default(),
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            high_throughput_chars_per_sec: DEFAULT_HIGH_THROUGHPUT_CHARS_PER_SEC,
            widen_factor: 1.5,
            widened_cap: Duration::from_millis(DEFAULT_WIDENED_CAP_MS),
            rate_window: Duration::from_secs(1),
        }
    }
}

impl StreamConfig {
    /// Override the cadence preset.
    #[must_use]
    pub fn with_mode(mut self, mode: FlushMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the length-triggered flush threshold.
    #[must_use]
    pub fn with_max_buffer_len(mut self, max_buffer_len: usize) -> Self {
        self.max_buffer_len = max_buffer_len.max(1);
        self
    }

    /// Base interval for the configured mode.
    #[must_use]
    pub fn base_interval(&self) -> Duration {
        self.mode.base_interval()
    }

    /// Interval applied to high-throughput sessions:
    /// `min(base * widen_factor, widened_cap)`, never below base.
    #[must_use]
    pub fn widened_interval(&self) -> Duration {
        let base = self.base_interval();
        base.mul_f64(self.widen_factor.max(1.0)).min(self.widened_cap).max(base)
    }

    /// Load defaults, then apply environment overrides.
    ///
    /// Reads `TAILVIEW_FLUSH_BASE_MS` (clamped to 4–250 ms) and
    /// `TAILVIEW_MAX_BUFFER_LEN`. Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_env_u64("TAILVIEW_FLUSH_BASE_MS") {
            let ms = ms.clamp(MIN_BASE_INTERVAL_MS, MAX_BASE_INTERVAL_MS);
            config.mode = FlushMode::Custom(Duration::from_millis(ms));
        }
        if let Some(len) = read_env_u64("TAILVIEW_MAX_BUFFER_LEN") {
            config.max_buffer_len = (len as usize).max(1);
        }

        config
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "ignoring unparseable env override");
                None
            }
        },
        Err(_) => None,
    }
}
