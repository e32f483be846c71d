//! Identity types and viewport geometry shared across the workspace.

use std::fmt;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier for a single message within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    /// Create a message id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite key for one streamed message: `(session, message)`.
///
/// This is the unit of accumulation in the delta buffer; two sessions never
/// share a key even if their message ids collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    /// Owning session.
    pub session: SessionId,
    /// Message within the session.
    pub message: MessageId,
}

impl StreamKey {
    /// Build a key from session and message parts.
    pub fn new(session: impl Into<SessionId>, message: impl Into<MessageId>) -> Self {
        Self {
            session: session.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session, self.message)
    }
}

// ---------------------------------------------------------------------------
// Item identity
// ---------------------------------------------------------------------------

/// Render identity of a transcript item.
///
/// Caller-supplied stable keys survive reordering and re-renders; items
/// without a key fall back to their positional index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// Caller-supplied stable identity.
    Keyed(String),
    /// Positional fallback for items without an explicit key.
    Index(usize),
}

impl ItemKey {
    /// Resolve a key from an optional caller key and the item's index.
    #[must_use]
    pub fn resolve(key: Option<&str>, index: usize) -> Self {
        match key {
            Some(k) => Self::Keyed(k.to_owned()),
            None => Self::Index(index),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyed(k) => f.write_str(k),
            Self::Index(i) => write!(f, "#{i}"),
        }
    }
}

/// Implemented by caller item types so the windowing engine can carry a
/// stable identity through to the render layer.
///
/// The engine never inspects item content; geometry comes exclusively from
/// the [`HeightTable`](crate::HeightTable).
pub trait TranscriptItem {
    /// Stable identity key, if the caller has one. Defaults to `None`,
    /// which makes the item fall back to its index.
    fn key(&self) -> Option<&str> {
        None
    }
}

/// Blanket impl so plain string slices can serve as keyed items in tests
/// and simple callers.
impl TranscriptItem for &str {
    fn key(&self) -> Option<&str> {
        Some(self)
    }
}

impl TranscriptItem for String {
    fn key(&self) -> Option<&str> {
        Some(self)
    }
}

/// Marker item with no identity; always falls back to the index key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnonymousItem;

impl TranscriptItem for AnonymousItem {}

// ---------------------------------------------------------------------------
// Viewport geometry
// ---------------------------------------------------------------------------

/// One sample of viewport scroll geometry, in pixels.
///
/// This is the immutable-per-tick snapshot both scheduling loops read;
/// neither loop ever mutates shared state through it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Current scroll position (distance from content top).
    pub scroll_top: f64,
    /// Visible viewport height.
    pub viewport_height: f64,
    /// Total content extent, from the offset table.
    pub total_height: f64,
}

impl ScrollMetrics {
    /// Build a sample from raw measurements.
    #[must_use]
    pub fn new(scroll_top: f64, viewport_height: f64, total_height: f64) -> Self {
        Self {
            scroll_top,
            viewport_height,
            total_height,
        }
    }

    /// Largest legal `scroll_top`. Zero when content fits the viewport.
    #[must_use]
    pub fn max_scroll_top(&self) -> f64 {
        (self.total_height - self.viewport_height).max(0.0)
    }

    /// Distance between the viewport's bottom edge and the content bottom.
    #[must_use]
    pub fn distance_from_bottom(&self) -> f64 {
        (self.max_scroll_top() - self.scroll_top).max(0.0)
    }

    /// Whether the viewport sits within `threshold` pixels of the bottom.
    #[must_use]
    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.distance_from_bottom() <= threshold
    }
}
