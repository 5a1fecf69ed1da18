//! Undo/redo stack of the page buffer.
//!
//! Every primitive change of the buffer (insert, delete, apply tag, remove tag) is recorded as
//! an [`UndoAction`]. Actions recorded inside one user action form a group; outside a user
//! action each primitive is its own group. Typing is merged: a single character insert joins
//! the previous group when that group was typed as well and continues where it ended.
//!
//! New actions recorded while there are redo steps pending do not drop the redo history.
//! Instead the undone groups are folded back onto the stack as one inverted group, so every
//! state the buffer ever had stays reachable with undo.

use crate::buffer::Cell;
use crate::tags::TagId;

/// Raw content removed from or inserted into the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Fragment {
    pub(crate) text: String,
    pub(crate) cells: Vec<Cell>,
}

impl Fragment {
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }
}

/// Reversible primitive change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UndoAction {
    Insert { start: usize, fragment: Fragment },
    Delete { start: usize, fragment: Fragment },
    ApplyTag { start: usize, end: usize, tag: TagId },
    RemoveTag { start: usize, end: usize, tag: TagId },
}

impl UndoAction {
    pub(crate) fn inverse(&self) -> UndoAction {
        match self.clone() {
            UndoAction::Insert { start, fragment } => UndoAction::Delete { start, fragment },
            UndoAction::Delete { start, fragment } => UndoAction::Insert { start, fragment },
            UndoAction::ApplyTag { start, end, tag } => UndoAction::RemoveTag { start, end, tag },
            UndoAction::RemoveTag { start, end, tag } => UndoAction::ApplyTag { start, end, tag },
        }
    }

    /// Single character insert of a non-whitespace character.
    fn is_typed_char(&self) -> bool {
        match self {
            UndoAction::Insert { fragment, .. } => {
                fragment.len() == 1 && fragment.text.chars().all(|c| !c.is_whitespace())
            }
            _ => false,
        }
    }

    fn is_single_char_insert(&self) -> bool {
        matches!(self, UndoAction::Insert { fragment, .. } if fragment.len() == 1)
    }
}

#[derive(Debug, Clone)]
struct UndoGroup {
    actions: Vec<UndoAction>,
    /// Group started as a typed character, later typed characters may join it.
    mergeable: bool,
}

impl UndoGroup {
    /// Whether a typed character inserted at `start` continues this group.
    fn continues_at(&self, start: usize) -> bool {
        match self.actions.last() {
            Some(UndoAction::Insert { start: s, fragment }) => {
                s + fragment.len() == start
                    && fragment.text.chars().last().is_some_and(|c| !c.is_whitespace())
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct UndoStack {
    undo_stack: Vec<UndoGroup>,
    /// Number of groups that are applied; groups beyond it can be redone.
    index: usize,
    pending: Vec<UndoAction>,
    max_undo: usize,
    replaying: bool,
    /// Set by cursor moves and undo/redo, prevents merging with the previous group.
    barrier: bool,
}

impl UndoStack {
    pub(crate) fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            index: 0,
            pending: Vec::new(),
            max_undo,
            replaying: false,
            barrier: false,
        }
    }

    pub(crate) fn record(&mut self, action: UndoAction) {
        if !self.replaying {
            self.pending.push(action);
        }
    }

    pub(crate) fn set_barrier(&mut self) {
        self.barrier = true;
    }

    pub(crate) fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    pub(crate) fn clear(&mut self) {
        self.undo_stack.clear();
        self.pending.clear();
        self.index = 0;
        self.barrier = false;
    }

    pub(crate) fn can_undo(&self) -> bool {
        self.index > 0 || !self.pending.is_empty()
    }

    pub(crate) fn can_redo(&self) -> bool {
        self.index < self.undo_stack.len() && self.pending.is_empty()
    }

    /// Number of groups on the stack.
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Close the pending group and push it on the stack.
    pub(crate) fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let actions = std::mem::take(&mut self.pending);
        let typed_at = match actions.as_slice() {
            [action @ UndoAction::Insert { start, .. }] if action.is_typed_char() => Some(*start),
            _ => None,
        };

        if self.index < self.undo_stack.len() {
            self.fold_redo();
        } else if let Some(start) = typed_at
            && !self.barrier
            && let Some(top) = self.undo_stack.last_mut()
            && top.mergeable
            && top.continues_at(start)
        {
            top.actions.extend(actions);
            return;
        }

        let mergeable = actions.len() == 1 && actions[0].is_single_char_insert();
        self.push_group(UndoGroup { actions, mergeable });
        self.barrier = false;
    }

    /// Put the inverse of all undone groups back on the stack as one group.
    fn fold_redo(&mut self) {
        let folded: Vec<UndoAction> = self.undo_stack[self.index..]
            .iter()
            .rev()
            .flat_map(|group| group.actions.iter().rev().map(UndoAction::inverse))
            .collect();
        log::debug!("folding {} undone actions", folded.len());
        self.index = self.undo_stack.len();
        self.push_group(UndoGroup {
            actions: folded,
            mergeable: false,
        });
    }

    fn push_group(&mut self, group: UndoGroup) {
        self.undo_stack.push(group);
        self.index = self.undo_stack.len();
        while self.undo_stack.len() > self.max_undo.max(1) {
            self.undo_stack.remove(0);
            self.index -= 1;
        }
    }

    /// Actions that revert the last applied group, in the order they should be applied.
    pub(crate) fn take_undo(&mut self) -> Option<Vec<UndoAction>> {
        self.flush();
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.barrier = true;
        let group = &self.undo_stack[self.index];
        Some(group.actions.iter().rev().map(UndoAction::inverse).collect())
    }

    /// Actions that re-apply the next undone group.
    pub(crate) fn take_redo(&mut self) -> Option<Vec<UndoAction>> {
        self.flush();
        if self.index >= self.undo_stack.len() {
            return None;
        }
        let group = &self.undo_stack[self.index];
        self.index += 1;
        self.barrier = true;
        Some(group.actions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(start: usize, text: &str) -> UndoAction {
        UndoAction::Insert {
            start,
            fragment: Fragment {
                text: text.to_string(),
                cells: text.chars().map(|_| Cell::default()).collect(),
            },
        }
    }

    fn type_text(stack: &mut UndoStack, text: &str) {
        for (i, c) in text.chars().enumerate() {
            stack.record(insert(i, &c.to_string()));
            stack.flush();
        }
    }

    #[test]
    fn test_typing_merges_words() {
        let mut stack = UndoStack::new(100);
        type_text(&mut stack, "fooo barr baz");
        assert_eq!(stack.depth(), 5);
    }

    #[test]
    fn test_barrier_breaks_merge() {
        let mut stack = UndoStack::new(100);
        stack.record(insert(0, "a"));
        stack.flush();
        stack.set_barrier();
        stack.record(insert(1, "b"));
        stack.flush();
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_undo_redo_exhaustion() {
        let mut stack = UndoStack::new(100);
        assert!(stack.take_undo().is_none());
        stack.record(insert(0, "abc"));
        let undo = stack.take_undo().unwrap();
        assert_eq!(undo, vec![UndoAction::Delete {
            start: 0,
            fragment: Fragment {
                text: "abc".to_string(),
                cells: vec![Cell::default(); 3],
            },
        }]);
        assert!(stack.take_undo().is_none());
        assert_eq!(stack.take_redo().unwrap().len(), 1);
        assert!(stack.take_redo().is_none());
    }

    #[test]
    fn test_new_action_folds_redo() {
        let mut stack = UndoStack::new(100);
        stack.record(insert(0, "abc"));
        stack.flush();
        stack.take_undo().unwrap();
        stack.record(insert(0, "x"));
        stack.flush();
        // insert "abc", folded delete "abc", insert "x"
        assert_eq!(stack.depth(), 3);
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_max_undo_drops_oldest() {
        let mut stack = UndoStack::new(2);
        for i in 0..4 {
            stack.record(insert(i, " "));
            stack.flush();
        }
        assert_eq!(stack.depth(), 2);
        assert!(stack.take_undo().is_some());
        assert!(stack.take_undo().is_some());
        assert!(stack.take_undo().is_none());
    }
}
