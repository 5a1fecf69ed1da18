//! Change notifications emitted by a [`TextBuffer`](crate::TextBuffer).
//!
//! Observers are registered with [`TextBuffer::subscribe`](crate::TextBuffer::subscribe) and
//! live as long as the buffer. Events are emitted after the change has been applied.

use crate::tags::TagId;

/// A change in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    /// Text (or an object) was inserted at `start`.
    TextInserted {
        /// Offset of the first inserted character.
        start: usize,
        /// Inserted text; objects show as U+FFFC.
        text: String,
    },
    /// The range `[start, end)` was deleted.
    TextDeleted {
        /// Start offset of the deleted range.
        start: usize,
        /// End offset of the deleted range, before deletion.
        end: usize,
    },
    /// A formatting tag was applied.
    TagApplied {
        /// Start offset.
        start: usize,
        /// End offset.
        end: usize,
        /// The tag.
        tag: TagId,
    },
    /// A formatting tag was removed.
    TagRemoved {
        /// Start offset.
        start: usize,
        /// End offset.
        end: usize,
        /// The tag.
        tag: TagId,
    },
    /// The cursor or selection bound was placed explicitly.
    CursorMoved {
        /// New cursor offset.
        offset: usize,
    },
    /// All content was removed as part of a load.
    Cleared,
    /// A structural tree was loaded.
    Loaded,
    /// An undo step was applied.
    UndoApplied,
    /// A redo step was applied.
    RedoApplied,
}

impl BufferEvent {
    /// Whether this event changes the text.
    pub fn is_text_change(&self) -> bool {
        matches!(
            self,
            BufferEvent::TextInserted { .. } | BufferEvent::TextDeleted { .. }
        )
    }
}

/// Callback invoked for every [`BufferEvent`].
pub type BufferObserver = Box<dyn FnMut(&BufferEvent) + Send>;
