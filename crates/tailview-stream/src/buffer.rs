//! Per-key delta accumulation and coalesced flushing.

use ahash::{AHashMap, AHashSet};
use web_time::{Duration, Instant};

use tailview_core::{SessionId, StreamKey};

use crate::config::StreamConfig;

// ---------------------------------------------------------------------------
// Flush events
// ---------------------------------------------------------------------------

/// Why an entry was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// The entry's effective interval elapsed.
    Interval,
    /// Buffered length crossed the configured threshold.
    Overflow,
    /// Explicit force (teardown, session clear, stream end).
    Forced,
}

/// One coalesced flush: everything appended to `key` since the last flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushEvent {
    /// The `(session, message)` key the text belongs to.
    pub key: StreamKey,
    /// Drained text, in exact append order.
    pub text: String,
    /// What triggered the drain.
    pub reason: FlushReason,
}

/// Aggregate buffer counters, for debug overlays and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    /// Live entries (drained entries included; they persist until cleared).
    pub entries: usize,
    /// Bytes currently buffered across all entries.
    pub pending_bytes: usize,
    /// Total flush events emitted.
    pub flushes: u64,
    /// Total bytes ever appended.
    pub appended_bytes: u64,
    /// Sessions currently marked high-throughput.
    pub high_throughput_sessions: usize,
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// Accumulation state for one `(session, message)` key.
///
/// `content` is append-only between flushes; a flush drains it but never
/// removes the entry. Entries disappear only through an explicit clear.
#[derive(Debug, Clone)]
struct Entry {
    content: String,
    last_flush: Instant,
    /// Chars appended inside the current rolling window.
    recent_chars: usize,
    rate_window_start: Instant,
}

impl Entry {
    fn new(now: Instant) -> Self {
        Self {
            content: String::new(),
            last_flush: now,
            recent_chars: 0,
            rate_window_start: now,
        }
    }
}

/// Delta buffer for all streams feeding one transcript view.
///
/// Single-owner, no interior locking: all methods are plain `&mut self`
/// calls on the host's event loop, and per-key flushes are strictly
/// sequential by construction. Within one [`tick`](Self::tick), keys are
/// visited in insertion order.
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    config: StreamConfig,
    entries: AHashMap<StreamKey, Entry>,
    /// Keys in first-append order; pruned only by the clear operations.
    order: Vec<StreamKey>,
    high_throughput: AHashSet<SessionId>,
    flushes: u64,
    appended_bytes: u64,
}

impl StreamBuffer {
    /// Create a buffer with the given configuration.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            entries: AHashMap::new(),
            order: Vec::new(),
            high_throughput: AHashSet::new(),
            flushes: 0,
            appended_bytes: 0,
        }
    }

    /// Create a buffer with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(StreamConfig::default())
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Append a fragment to `key`, creating the entry on first contact.
    ///
    /// Updates the rolling character-rate window and the session's
    /// high-throughput mark. If the buffered length crosses twice the
    /// configured threshold the entry is flushed synchronously and the
    /// event returned; that is the memory bound during pathological bursts.
    ///
    /// An empty fragment is a defensive no-op.
    pub fn append(&mut self, key: &StreamKey, delta: &str, now: Instant) -> Option<FlushEvent> {
        if delta.is_empty() {
            tracing::trace!(key = %key, "ignoring empty delta");
            return None;
        }

        self.appended_bytes += delta.len() as u64;
        if !self.entries.contains_key(key) {
            self.entries.insert(key.clone(), Entry::new(now));
            self.order.push(key.clone());
            tracing::debug!(key = %key, "new stream entry");
        }

        let rate_window = self.config.rate_window;
        let threshold = self.config.high_throughput_chars_per_sec;
        let overflow_limit = 2 * self.config.max_buffer_len;

        let Some(entry) = self.entries.get_mut(key) else {
            return None;
        };

        // Rate accounting is in characters; the overflow bound below stays
        // in bytes because it guards memory, not render churn.
        let delta_chars = delta.chars().count();
        if now.duration_since(entry.rate_window_start) > rate_window {
            entry.recent_chars = delta_chars;
            entry.rate_window_start = now;
        } else {
            entry.recent_chars += delta_chars;
        }
        let high = entry.recent_chars > threshold;

        entry.content.push_str(delta);
        let overflowed = entry.content.len() > overflow_limit;

        if high {
            if self.high_throughput.insert(key.session.clone()) {
                tracing::debug!(session = %key.session, "session marked high-throughput");
            }
        } else if self.high_throughput.remove(&key.session) {
            tracing::debug!(session = %key.session, "session throughput back to normal");
        }

        if overflowed {
            // Length gate in `flush` fires regardless of elapsed time.
            return self.flush(key, false, now);
        }
        None
    }

    /// Drain `key` if it has content and is eligible: forced, interval
    /// elapsed, or buffered length over the threshold. Unknown keys and
    /// empty entries are no-ops.
    pub fn flush(&mut self, key: &StreamKey, force: bool, now: Instant) -> Option<FlushEvent> {
        let interval = self.effective_interval(&key.session);
        let max_len = self.config.max_buffer_len;

        let entry = self.entries.get_mut(key)?;
        if entry.content.is_empty() {
            return None;
        }

        let reason = if force {
            FlushReason::Forced
        } else if entry.content.len() > max_len {
            FlushReason::Overflow
        } else if now.duration_since(entry.last_flush) >= interval {
            FlushReason::Interval
        } else {
            return None;
        };

        let text = std::mem::take(&mut entry.content);
        entry.last_flush = now;
        self.flushes += 1;
        tracing::trace!(key = %key, len = text.len(), reason = ?reason, "flush");

        Some(FlushEvent {
            key: key.clone(),
            text,
            reason,
        })
    }

    /// One scheduler tick: visit every entry in insertion order and flush
    /// those whose gate passes.
    pub fn tick(&mut self, now: Instant) -> Vec<FlushEvent> {
        let keys = self.order.clone();
        let mut events = Vec::new();
        for key in &keys {
            if let Some(event) = self.flush(key, false, now) {
                events.push(event);
            }
        }
        events
    }

    /// Earliest instant at which some entry becomes flush-eligible, or
    /// `None` when every entry is drained (the loop goes idle).
    ///
    /// The returned instant may already be in the past, in which case the
    /// host should tick immediately.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut earliest: Option<Instant> = None;
        for key in &self.order {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            if entry.content.is_empty() {
                continue;
            }
            // Over the length gate: eligible on the very next tick, no
            // matter how recently it flushed.
            let due = if entry.content.len() > self.config.max_buffer_len {
                entry.last_flush
            } else {
                entry.last_flush + self.effective_interval(&key.session)
            };
            earliest = Some(match earliest {
                Some(current) => current.min(due),
                None => due,
            });
        }
        earliest
    }

    /// Whether any entry holds unflushed content.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.entries.values().any(|e| !e.content.is_empty())
    }

    /// Flush every entry belonging to `session`, in insertion order.
    pub fn flush_session(
        &mut self,
        session: &SessionId,
        force: bool,
        now: Instant,
    ) -> Vec<FlushEvent> {
        let keys: Vec<StreamKey> = self
            .order
            .iter()
            .filter(|k| &k.session == session)
            .cloned()
            .collect();
        let mut events = Vec::new();
        for key in &keys {
            if let Some(event) = self.flush(key, force, now) {
                events.push(event);
            }
        }
        events
    }

    /// Flush every entry, in insertion order.
    pub fn flush_all(&mut self, force: bool, now: Instant) -> Vec<FlushEvent> {
        let keys = self.order.clone();
        let mut events = Vec::new();
        for key in &keys {
            if let Some(event) = self.flush(key, force, now) {
                events.push(event);
            }
        }
        events
    }

    /// Force-flush and delete every entry for `session`. The teardown
    /// flush means pending text is delivered, never dropped.
    pub fn clear_session(&mut self, session: &SessionId, now: Instant) -> Vec<FlushEvent> {
        let events = self.flush_session(session, true, now);
        self.entries.retain(|key, _| &key.session != session);
        self.order.retain(|key| &key.session != session);
        self.high_throughput.remove(session);
        tracing::debug!(session = %session, "stream buffers cleared");
        events
    }

    /// Force-flush and delete every entry.
    pub fn clear_all(&mut self, now: Instant) -> Vec<FlushEvent> {
        let events = self.flush_all(true, now);
        self.entries.clear();
        self.order.clear();
        self.high_throughput.clear();
        events
    }

    /// Whether `session` is currently marked high-throughput.
    #[must_use]
    pub fn is_high_throughput(&self, session: &SessionId) -> bool {
        self.high_throughput.contains(session)
    }

    /// Flush interval currently applied to `session`: the base interval,
    /// widened while the session is high-throughput.
    #[must_use]
    pub fn effective_interval(&self, session: &SessionId) -> Duration {
        if self.high_throughput.contains(session) {
            self.config.widened_interval()
        } else {
            self.config.base_interval()
        }
    }

    /// Aggregate counters.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            entries: self.entries.len(),
            pending_bytes: self.entries.values().map(|e| e.content.len()).sum(),
            flushes: self.flushes,
            appended_bytes: self.appended_bytes,
            high_throughput_sessions: self.high_throughput.len(),
        }
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlushMode;
    use proptest::prelude::*;

    fn key(session: &str, message: &str) -> StreamKey {
        StreamKey::new(session, message)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fragments_coalesce_into_single_flush() {
        // Three fragments, forced flush yields one payload; nothing flushes
        // before the force because the base interval has not elapsed.
        let config = StreamConfig::default().with_max_buffer_len(100);
        let mut buffer = StreamBuffer::new(config);
        let k = key("s1", "m1");
        let t0 = Instant::now();

        assert!(buffer.append(&k, "Hel", t0).is_none());
        assert!(buffer.append(&k, "lo ", t0 + ms(1)).is_none());
        assert!(buffer.append(&k, "world", t0 + ms(2)).is_none());

        assert!(buffer.tick(t0 + ms(5)).is_empty());

        let event = buffer.flush(&k, true, t0 + ms(6));
        let event = event.unwrap();
        assert_eq!(event.text, "Hello world");
        assert_eq!(event.reason, FlushReason::Forced);

        // Drained, not removed.
        assert_eq!(buffer.stats().entries, 1);
        assert!(!buffer.has_pending());
    }

    #[test]
    fn interval_gate_opens_after_base_interval() {
        let mut buffer = StreamBuffer::with_defaults();
        let k = key("s1", "m1");
        let t0 = Instant::now();

        buffer.append(&k, "abc", t0);
        assert!(buffer.tick(t0 + ms(31)).is_empty());

        let events = buffer.tick(t0 + ms(32));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "abc");
        assert_eq!(events[0].reason, FlushReason::Interval);
    }

    #[test]
    fn empty_delta_is_ignored() {
        let mut buffer = StreamBuffer::with_defaults();
        let k = key("s1", "m1");
        assert!(buffer.append(&k, "", Instant::now()).is_none());
        assert_eq!(buffer.stats().entries, 0);
        assert!(buffer.next_deadline().is_none());
    }

    #[test]
    fn flush_unknown_key_is_noop() {
        let mut buffer = StreamBuffer::with_defaults();
        assert!(buffer.flush(&key("s1", "nope"), true, Instant::now()).is_none());
    }

    #[test]
    fn overflow_forces_synchronous_flush() {
        let config = StreamConfig::default().with_max_buffer_len(8);
        let mut buffer = StreamBuffer::new(config);
        let k = key("s1", "m1");
        let t0 = Instant::now();

        // 17 bytes > 2 * 8: append itself returns the flush.
        let event = buffer.append(&k, "01234567890123456", t0);
        let event = event.unwrap();
        assert_eq!(event.text, "01234567890123456");
        assert_eq!(event.reason, FlushReason::Overflow);
        assert!(!buffer.has_pending());
    }

    #[test]
    fn length_gate_beats_interval_on_tick() {
        let config = StreamConfig::default().with_max_buffer_len(4);
        let mut buffer = StreamBuffer::new(config);
        let k = key("s1", "m1");
        let t0 = Instant::now();

        // 6 bytes: over max (4) but under the 2x overflow bound (8).
        buffer.append(&k, "abcdef", t0);
        assert!(buffer.has_pending());

        // Tick immediately: interval has not elapsed, length gate fires.
        let events = buffer.tick(t0 + ms(1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, FlushReason::Overflow);
    }

    #[test]
    fn tick_visits_keys_in_insertion_order() {
        let mut buffer = StreamBuffer::with_defaults();
        let t0 = Instant::now();
        let keys = [key("s1", "m2"), key("s1", "m1"), key("s2", "m1")];
        for k in &keys {
            buffer.append(k, "x", t0);
        }

        let events = buffer.tick(t0 + ms(100));
        let flushed: Vec<&StreamKey> = events.iter().map(|e| &e.key).collect();
        assert_eq!(flushed, keys.iter().collect::<Vec<_>>());
    }

    #[test]
    fn next_deadline_tracks_earliest_pending_entry() {
        let mut buffer = StreamBuffer::with_defaults();
        let t0 = Instant::now();
        assert!(buffer.next_deadline().is_none());

        buffer.append(&key("s1", "m1"), "a", t0);
        let base = buffer.config().base_interval();
        assert_eq!(buffer.next_deadline(), Some(t0 + base));

        // A later entry does not move the earliest deadline.
        buffer.append(&key("s1", "m2"), "b", t0 + ms(10));
        assert_eq!(buffer.next_deadline(), Some(t0 + base));
    }

    #[test]
    fn loop_goes_idle_and_restarts_on_append() {
        let mut buffer = StreamBuffer::with_defaults();
        let k = key("s1", "m1");
        let t0 = Instant::now();

        buffer.append(&k, "hello", t0);
        assert!(buffer.next_deadline().is_some());

        let _ = buffer.tick(t0 + ms(40));
        // Drained: the loop stops.
        assert!(buffer.next_deadline().is_none());

        // Next append restarts it.
        buffer.append(&k, "again", t0 + ms(50));
        assert!(buffer.next_deadline().is_some());
    }

    #[test]
    fn high_throughput_widens_interval_and_reverts() {
        let mut buffer = StreamBuffer::with_defaults();
        let k = key("s1", "m1");
        let session = k.session.clone();
        let t0 = Instant::now();
        let base = buffer.config().base_interval();
        let widened = buffer.config().widened_interval();
        assert!(widened > base);

        // 600 chars inside one rolling second.
        for i in 0..60 {
            buffer.append(&k, "0123456789", t0 + ms(i * 10));
        }
        assert!(buffer.is_high_throughput(&session));
        assert_eq!(buffer.effective_interval(&session), widened);

        // Quiet period: window resets, small delta drops the rate.
        buffer.append(&k, "x", t0 + ms(2000));
        assert!(!buffer.is_high_throughput(&session));
        assert_eq!(buffer.effective_interval(&session), base);
    }

    #[test]
    fn rate_counter_counts_chars_not_bytes() {
        let mut buffer = StreamBuffer::with_defaults();
        let k = key("s1", "m1");
        let t0 = Instant::now();

        // 100 two-byte chars per append: after three appends the window
        // holds 600 bytes but only 300 chars, under the 500 chars/sec
        // threshold.
        let delta = "é".repeat(100);
        for i in 0..3 {
            buffer.append(&k, &delta, t0 + ms(i * 10));
        }
        assert!(!buffer.is_high_throughput(&k.session));

        // 300 more chars in the same window crosses the threshold for real.
        for i in 3..6 {
            buffer.append(&k, &delta, t0 + ms(i * 10));
        }
        assert!(buffer.is_high_throughput(&k.session));
    }

    #[test]
    fn next_deadline_is_immediate_over_length_gate() {
        let config = StreamConfig::default().with_max_buffer_len(4);
        let mut buffer = StreamBuffer::new(config);
        let k = key("s1", "m1");
        let t0 = Instant::now();

        // 6 bytes: over max (4) but under the 2x synchronous bound (8).
        // Eligible now, so the host must not be told to wait an interval.
        buffer.append(&k, "abcdef", t0);
        assert_eq!(buffer.next_deadline(), Some(t0));

        let events = buffer.tick(t0 + ms(1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, FlushReason::Overflow);

        // Drained and refilled below max: back to interval scheduling.
        buffer.append(&k, "xy", t0 + ms(2));
        let base = buffer.config().base_interval();
        assert_eq!(buffer.next_deadline(), Some(t0 + ms(1) + base));
    }

    #[test]
    fn high_throughput_mark_is_per_session() {
        let mut buffer = StreamBuffer::with_defaults();
        let t0 = Instant::now();
        let busy = key("busy", "m1");
        let calm = key("calm", "m1");

        for i in 0..60 {
            buffer.append(&busy, "0123456789", t0 + ms(i));
        }
        buffer.append(&calm, "hi", t0);

        assert!(buffer.is_high_throughput(&busy.session));
        assert!(!buffer.is_high_throughput(&calm.session));
    }

    #[test]
    fn flush_session_only_touches_that_session() {
        let mut buffer = StreamBuffer::with_defaults();
        let t0 = Instant::now();
        buffer.append(&key("s1", "m1"), "one", t0);
        buffer.append(&key("s2", "m1"), "two", t0);

        let events = buffer.flush_session(&SessionId::from("s1"), true, t0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "one");
        assert!(buffer.has_pending()); // s2 still buffered
    }

    #[test]
    fn clear_session_flushes_then_removes() {
        let mut buffer = StreamBuffer::with_defaults();
        let t0 = Instant::now();
        buffer.append(&key("s1", "m1"), "one", t0);
        buffer.append(&key("s1", "m2"), "two", t0);
        buffer.append(&key("s2", "m1"), "keep", t0);

        let events = buffer.clear_session(&SessionId::from("s1"), t0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, "one");
        assert_eq!(events[1].text, "two");
        assert_eq!(buffer.stats().entries, 1);

        // Re-appending after clear starts a fresh entry.
        buffer.append(&key("s1", "m1"), "new", t0 + ms(1));
        assert_eq!(buffer.stats().entries, 2);
    }

    #[test]
    fn clear_all_drains_everything() {
        let mut buffer = StreamBuffer::with_defaults();
        let t0 = Instant::now();
        buffer.append(&key("s1", "m1"), "a", t0);
        buffer.append(&key("s2", "m1"), "b", t0);

        let events = buffer.clear_all(t0);
        assert_eq!(events.len(), 2);
        assert_eq!(buffer.stats().entries, 0);
        assert!(buffer.next_deadline().is_none());
    }

    #[test]
    fn per_key_order_preserved_across_multiple_flushes() {
        let mut buffer = StreamBuffer::with_defaults();
        let k = key("s1", "m1");
        let t0 = Instant::now();
        let mut collected = String::new();

        buffer.append(&k, "aa", t0);
        for event in buffer.tick(t0 + ms(40)) {
            collected.push_str(&event.text);
        }
        buffer.append(&k, "bb", t0 + ms(41));
        buffer.append(&k, "cc", t0 + ms(42));
        for event in buffer.tick(t0 + ms(80)) {
            collected.push_str(&event.text);
        }
        buffer.append(&k, "dd", t0 + ms(81));
        if let Some(event) = buffer.flush(&k, true, t0 + ms(82)) {
            collected.push_str(&event.text);
        }

        assert_eq!(collected, "aabbccdd");
    }

    #[test]
    fn stats_track_counters() {
        let mut buffer = StreamBuffer::with_defaults();
        let t0 = Instant::now();
        buffer.append(&key("s1", "m1"), "hello", t0);

        let stats = buffer.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.pending_bytes, 5);
        assert_eq!(stats.appended_bytes, 5);
        assert_eq!(stats.flushes, 0);

        let _ = buffer.flush_all(true, t0);
        let stats = buffer.stats();
        assert_eq!(stats.pending_bytes, 0);
        assert_eq!(stats.flushes, 1);
    }

    #[test]
    fn realtime_mode_flushes_faster() {
        let config = StreamConfig::default().with_mode(FlushMode::Realtime);
        let mut buffer = StreamBuffer::new(config);
        let k = key("s1", "m1");
        let t0 = Instant::now();

        buffer.append(&k, "x", t0);
        assert_eq!(buffer.tick(t0 + ms(16)).len(), 1);
    }

    proptest! {
        /// No-loss: for any fragment sequence and any interleaving of ticks,
        /// the concatenation of all flush payloads equals the concatenation
        /// of all appended deltas.
        #[test]
        fn streaming_is_lossless(
            fragments in proptest::collection::vec("[a-z0-9 ]{0,12}", 0..64),
            tick_every in 1_usize..8,
            step_ms in 0_u64..50,
        ) {
            let config = StreamConfig::default().with_max_buffer_len(32);
            let mut buffer = StreamBuffer::new(config);
            let k = key("s1", "m1");
            let t0 = Instant::now();

            let mut expected = String::new();
            let mut emitted = String::new();
            let mut now = t0;

            for (i, fragment) in fragments.iter().enumerate() {
                now += ms(step_ms);
                expected.push_str(fragment);
                if let Some(event) = buffer.append(&k, fragment, now) {
                    emitted.push_str(&event.text);
                }
                if i % tick_every == 0 {
                    for event in buffer.tick(now) {
                        emitted.push_str(&event.text);
                    }
                }
            }

            for event in buffer.flush_all(true, now) {
                emitted.push_str(&event.text);
            }

            prop_assert_eq!(emitted, expected);
            prop_assert!(!buffer.has_pending());
        }

        /// Multi-key interleaving never mixes bytes across keys.
        #[test]
        fn keys_never_cross_contaminate(
            parts in proptest::collection::vec((0_u8..3, "[a-z]{1,6}"), 0..48),
        ) {
            let mut buffer = StreamBuffer::with_defaults();
            let keys = [key("s1", "m1"), key("s1", "m2"), key("s2", "m1")];
            let t0 = Instant::now();
            let mut expected = vec![String::new(), String::new(), String::new()];
            let mut emitted = vec![String::new(), String::new(), String::new()];

            for (i, (which, fragment)) in parts.iter().enumerate() {
                let slot = *which as usize;
                expected[slot].push_str(fragment);
                let now = t0 + ms(i as u64 * 7);
                if let Some(event) = buffer.append(&keys[slot], fragment, now) {
                    let idx = keys.iter().position(|k| *k == event.key).unwrap();
                    emitted[idx].push_str(&event.text);
                }
                for event in buffer.tick(now) {
                    let idx = keys.iter().position(|k| *k == event.key).unwrap();
                    emitted[idx].push_str(&event.text);
                }
            }
            for event in buffer.flush_all(true, t0 + ms(10_000)) {
                let idx = keys.iter().position(|k| *k == event.key).unwrap();
                emitted[idx].push_str(&event.text);
            }

            prop_assert_eq!(emitted, expected);
        }
    }
}
