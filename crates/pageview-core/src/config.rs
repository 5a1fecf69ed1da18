//! Buffer configuration.

/// Settings for a [`TextBuffer`](crate::TextBuffer).
///
/// ```rust
/// use pageview_core::BufferConfig;
///
/// let config = BufferConfig::default().with_max_undo(50).with_editable(false);
/// assert_eq!(config.max_undo, 50);
/// assert!(!config.editable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Maximum number of undo groups; the oldest groups are dropped beyond it.
    pub max_undo: usize,
    /// Whether interactive edits are allowed.
    pub editable: bool,
    /// Renumber numbered lists after indent, unindent and bullet changes.
    pub auto_renumber: bool,
    /// Propagate checkbox state to child and parent items.
    pub bullet_checkbox_propagation: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_undo: 1000,
            editable: true,
            auto_renumber: true,
            bullet_checkbox_propagation: true,
        }
    }
}

impl BufferConfig {
    /// Set the maximum number of undo groups.
    pub fn with_max_undo(mut self, max_undo: usize) -> Self {
        self.max_undo = max_undo;
        self
    }

    /// Set whether interactive edits are allowed.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Set whether lists are renumbered automatically.
    pub fn with_auto_renumber(mut self, auto_renumber: bool) -> Self {
        self.auto_renumber = auto_renumber;
        self
    }

    /// Set whether checkbox state propagates through nested lists.
    pub fn with_bullet_checkbox_propagation(mut self, enabled: bool) -> Self {
        self.bullet_checkbox_propagation = enabled;
        self
    }
}
