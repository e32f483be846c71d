#![forbid(unsafe_code)]

//! Delta buffering and coalesced flushing for streamed model responses.
//!
//! During a model response the transport delivers a firehose of small text
//! fragments. Rendering each fragment individually would mean hundreds of
//! layout passes per second; buffering them behind a fixed timer would add
//! visible latency when traffic is light. [`StreamBuffer`] sits between the
//! two: fragments accumulate per `(session, message)` key and are drained as
//! coalesced [`FlushEvent`]s on an adaptive interval, with hard guarantees
//! that no byte is ever lost, duplicated, or reordered.
//!
//! # Scheduling
//!
//! The buffer does not own a timer. The host drives it:
//!
//! 1. feed fragments with [`StreamBuffer::append`],
//! 2. arm a timer for [`StreamBuffer::next_deadline`],
//! 3. when it fires, call [`StreamBuffer::tick`] and apply the events,
//! 4. re-arm from `next_deadline` again.
//!
//! `next_deadline` returns `None` once every entry is drained, which stops
//! the loop; the next `append` makes it `Some` again. That on-demand restart
//! is what keeps the timer silent while nothing is streaming. Flush batching
//! is deliberately governed by a latency target in milliseconds rather than
//! the display's refresh cycle, so behavior is identical on 60 Hz and 144 Hz
//! hosts.

mod buffer;
mod config;

pub use buffer::{BufferStats, FlushEvent, FlushReason, StreamBuffer};
pub use config::{FlushMode, StreamConfig};
