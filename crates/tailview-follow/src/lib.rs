#![forbid(unsafe_code)]

//! Scroll-intent classification and auto-follow for a streaming transcript.
//!
//! While a response streams in, the viewport should track the newest
//! content, unless the user has scrolled up to read history, in which case
//! moving the viewport out from under them is the worst thing a chat UI can
//! do.
//!
//! [`IntentTracker`] classifies each scroll sample into
//! [`ScrollIntent::Following`] or [`ScrollIntent::Reading`] by distance from
//! the bottom edge. [`FollowController`] consumes that intent once per host
//! frame and, when following, eases the viewport toward the bottom instead
//! of snapping, so rapid flushes read as smooth motion.
//!
//! The controller performs no scrolling itself: [`FollowController::on_frame`]
//! returns the `scroll_top` the host should apply, or `None` when nothing
//! should move. Because no callback is ever retained, tearing the loop down
//! is just ceasing to call `on_frame`; there is no pending invocation to
//! cancel against disposed state.

mod follow;
mod intent;

pub use follow::{FollowConfig, FollowController};
pub use intent::{IntentTracker, ScrollIntent};
