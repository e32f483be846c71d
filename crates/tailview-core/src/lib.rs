#![forbid(unsafe_code)]

//! Core building blocks for the tailview transcript engine.
//!
//! This crate is the leaf of the workspace: identity types shared by every
//! other crate, the variable-height [`HeightTable`] with its derived offset
//! table, and the [`Virtualizer`] that computes which slice of a transcript
//! intersects the viewport.
//!
//! Everything here is a pure function over explicit state. There are no
//! timers, no callbacks, and no failure modes: out-of-range or degenerate
//! inputs produce empty results, never errors.

pub mod height;
pub mod types;
pub mod window;

pub use height::{HeightTable, OffsetTable};
pub use types::{ItemKey, MessageId, ScrollMetrics, SessionId, StreamKey, TranscriptItem};
pub use window::{Virtualizer, VirtualItem, VisibleWindow, WindowConfig};
