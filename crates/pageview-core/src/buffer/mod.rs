//! The page buffer.
//!
//! A [`TextBuffer`] holds the text of a page together with the formatting tags of every
//! character, embedded objects, the cursor and selection, the undo stack and find state.
//!
//! All offsets are character offsets. Lines are separated by `\n`; an object takes one
//! character ([`OBJECT_CHAR`]).
//!
//! The methods in this module are the primitives every edit goes through. They keep the
//! per-character tag sets consistent with the text, record undo actions and notify observers.
//! Higher level editing lives in the submodules:
//!
//! - `edit`: insert and delete with edit-mode and list/heading rules
//! - `load` / `dump`: conversion from and to the structural tree
//! - `format`: format toggles, bullets and indenting
//! - `links`, `anchors`, `selection`: introspection helpers

mod anchors;
mod dump;
mod edit;
mod format;
mod links;
mod load;
mod selection;

use std::collections::HashMap;
use std::fmt;

use pageview_core_parse::Attrib;

use crate::bullets::{BULLET_CHAR, Bullet, CheckState, parse_numbered_prefix};
use crate::config::BufferConfig;
use crate::error::{BufferError, BufferResult};
use crate::events::{BufferEvent, BufferObserver};
use crate::find::FindQuery;
use crate::line_index::{LineIndex, Position};
use crate::objects::{InsertedObject, OBJECT_CHAR, ObjectArena, ObjectId, ObjectKind, ObjectModel};
use crate::tags::{TagClass, TagId, TagKind, TagTable};
use crate::undo::{Fragment, UndoAction, UndoStack};

pub use anchors::heading_to_anchor;
pub use links::LinkData;

/// Creates the model of a plugin object from its attributes and data.
pub type ObjectFactory = Box<dyn Fn(&Attrib, Option<&str>) -> ObjectModel + Send>;

/// Formatting and object of one character.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Cell {
    /// Sorted by id.
    pub(crate) tags: Vec<TagId>,
    pub(crate) object: Option<ObjectId>,
}

impl Cell {
    fn with_tags(tags: &[TagId]) -> Self {
        let mut tags = tags.to_vec();
        tags.sort();
        tags.dedup();
        Self { tags, object: None }
    }

    pub(crate) fn has(&self, tag: TagId) -> bool {
        self.tags.binary_search(&tag).is_ok()
    }

    fn add(&mut self, tag: TagId) -> bool {
        match self.tags.binary_search(&tag) {
            Ok(_) => false,
            Err(i) => {
                self.tags.insert(i, tag);
                true
            }
        }
    }

    fn remove(&mut self, tag: TagId) -> bool {
        match self.tags.binary_search(&tag) {
            Ok(i) => {
                self.tags.remove(i);
                true
            }
            Err(_) => false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FindData {
    pub(crate) match_tag: TagId,
    pub(crate) highlight_tag: TagId,
    /// Query of the last `find_highlight_all`.
    pub(crate) highlight_query: Option<FindQuery>,
    /// The match tag is set and is cleared by the next change or cursor move.
    pub(crate) match_live: bool,
}

/// Rich-text page buffer.
///
/// ```rust
/// use pageview_core::{Element, TextBuffer};
///
/// let tree = Element::from_xml("<zim-tree><p>Hello <strong>world</strong>\n</p></zim-tree>").unwrap();
/// let mut buffer = TextBuffer::from_tree(&tree).unwrap();
/// assert_eq!(buffer.get_text(), "Hello world\n");
///
/// buffer.insert_text(5, ",", false).unwrap();
/// assert_eq!(buffer.get_text(), "Hello, world\n");
/// assert!(buffer.undo());
/// assert_eq!(buffer.dump(None).unwrap(), tree);
/// ```
pub struct TextBuffer {
    text: LineIndex,
    cells: Vec<Cell>,
    tags: TagTable,
    objects: ObjectArena,
    cursor: usize,
    bound: usize,
    /// Explicit tags for the next insert at the cursor; `None` derives them from the text.
    editmode: Option<Vec<TagId>>,
    undo: UndoStack,
    action_depth: usize,
    pub(crate) find: FindData,
    observers: Vec<BufferObserver>,
    config: BufferConfig,
    modified: bool,
    object_types: HashMap<String, ObjectFactory>,
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("text", &self.text.text())
            .field("cursor", &self.cursor)
            .field("bound", &self.bound)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for a user action; see [`TextBuffer::user_action`].
///
/// Dereferences to the buffer. All changes made through the guard form one undo step,
/// which is closed when the guard is dropped.
pub struct UserAction<'a> {
    buffer: &'a mut TextBuffer,
}

impl std::ops::Deref for UserAction<'_> {
    type Target = TextBuffer;

    fn deref(&self) -> &TextBuffer {
        self.buffer
    }
}

impl std::ops::DerefMut for UserAction<'_> {
    fn deref_mut(&mut self) -> &mut TextBuffer {
        self.buffer
    }
}

impl Drop for UserAction<'_> {
    fn drop(&mut self) {
        self.buffer.end_user_action();
    }
}

impl TextBuffer {
    /// Create an empty buffer with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Create an empty buffer.
    pub fn with_config(config: BufferConfig) -> Self {
        let mut tags = TagTable::new();
        let match_tag = tags.lookup(TagKind::FindMatch);
        let highlight_tag = tags.lookup(TagKind::FindHighlight);
        Self {
            text: LineIndex::new(),
            cells: Vec::new(),
            tags,
            objects: ObjectArena::new(),
            cursor: 0,
            bound: 0,
            editmode: None,
            undo: UndoStack::new(config.max_undo),
            action_depth: 0,
            find: FindData {
                match_tag,
                highlight_tag,
                highlight_query: None,
                match_live: false,
            },
            observers: Vec::new(),
            config,
            modified: false,
            object_types: HashMap::new(),
        }
    }

    /// Configuration of this buffer.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Register an observer that is called for every [`BufferEvent`].
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&BufferEvent) + Send + 'static,
    {
        self.observers.push(Box::new(callback));
    }

    /// Register a factory for plugin objects of type `name`.
    ///
    /// Objects of types without a factory are kept as opaque [`ObjectModel::Simple`] objects.
    pub fn register_object_type<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Attrib, Option<&str>) -> ObjectModel + Send + 'static,
    {
        self.object_types.insert(name.into(), Box::new(factory));
    }

    pub(crate) fn create_object_model(&self, attrib: &Attrib, data: Option<&str>) -> ObjectModel {
        let kind = attrib.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match self.object_types.get(kind) {
            Some(factory) => factory(attrib, data),
            None => {
                log::warn!("no handler for object type {:?}, keeping it as opaque object", kind);
                ObjectModel::Simple {
                    data: data.map(str::to_string),
                }
            }
        }
    }

    // ----- text queries -----

    /// Number of characters.
    pub fn char_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of lines; a buffer ending with a newline has an empty last line.
    pub fn line_count(&self) -> usize {
        self.text.line_count()
    }

    /// Whole text; objects show as U+FFFC.
    pub fn get_text(&self) -> String {
        self.text.text()
    }

    /// Text of `[start, end)`.
    pub fn get_slice(&self, start: usize, end: usize) -> String {
        self.text.slice(start, end)
    }

    /// Text of a line without its newline.
    pub fn get_line_text(&self, line: usize) -> String {
        self.text.line_text(line)
    }

    /// Offset of the first character of a line.
    pub fn line_start(&self, line: usize) -> usize {
        self.text.line_start(line)
    }

    /// Offset of the end of a line, before its newline.
    pub fn line_end(&self, line: usize) -> usize {
        self.text.line_end(line)
    }

    /// Line containing an offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.text.line_of(offset)
    }

    /// Convert an offset to line and column.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        self.text.offset_to_position(offset)
    }

    /// Convert line and column to an offset.
    pub fn position_to_offset(&self, position: Position) -> usize {
        self.text.position_to_offset(position)
    }

    pub(crate) fn char_at(&self, offset: usize) -> Option<char> {
        self.text.char_at(offset)
    }

    pub(crate) fn line_end_with_newline(&self, line: usize) -> usize {
        self.text.line_end_with_newline(line)
    }

    pub(crate) fn is_line_start(&self, offset: usize) -> bool {
        self.text.is_line_start(offset)
    }

    pub(crate) fn is_line_end(&self, offset: usize) -> bool {
        self.text.is_line_end(offset)
    }

    pub(crate) fn check_position(&self, offset: usize) -> BufferResult<()> {
        if offset > self.char_count() {
            return Err(BufferError::InvalidPosition(offset));
        }
        Ok(())
    }

    pub(crate) fn check_range(&self, start: usize, end: usize) -> BufferResult<()> {
        if start > end || end > self.char_count() {
            return Err(BufferError::InvalidRange { start, end });
        }
        Ok(())
    }

    /// Whether the buffer changed since the last [`set_modified(false)`](Self::set_modified).
    pub fn get_modified(&self) -> bool {
        self.modified
    }

    /// Set or reset the modified flag.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    // ----- tags -----

    /// The tag table.
    pub fn tag_table(&self) -> &TagTable {
        &self.tags
    }

    /// Tag for `kind`; see [`TagTable::lookup`].
    pub fn lookup_tag(&mut self, kind: TagKind) -> TagId {
        self.tags.lookup(kind)
    }

    pub(crate) fn kind(&self, tag: TagId) -> &TagKind {
        self.tags.kind(tag)
    }

    /// Document tags of the character at `offset`, outer first.
    pub fn get_tags_at(&self, offset: usize) -> Vec<&TagKind> {
        let mut tags = self.document_tags(offset);
        self.tags.sort_by_priority(&mut tags);
        tags.into_iter().map(|t| self.tags.kind(t)).collect()
    }

    pub(crate) fn cell_tags(&self, offset: usize) -> &[TagId] {
        self.cells.get(offset).map_or(&[], |c| c.tags.as_slice())
    }

    pub(crate) fn has_tag(&self, offset: usize, tag: TagId) -> bool {
        self.cells.get(offset).is_some_and(|c| c.has(tag))
    }

    /// Tags of the character at `offset` without find highlighting.
    pub(crate) fn document_tags(&self, offset: usize) -> Vec<TagId> {
        self.cell_tags(offset)
            .iter()
            .copied()
            .filter(|t| self.tags.kind(*t).is_document_tag())
            .collect()
    }

    /// Line formatting tags at `offset`.
    pub(crate) fn line_based_tags(&self, offset: usize) -> Vec<TagId> {
        self.cell_tags(offset)
            .iter()
            .copied()
            .filter(|t| self.tags.kind(*t).is_line_based())
            .collect()
    }

    /// First tag at `offset` whose kind matches.
    pub(crate) fn find_tag_at(&self, offset: usize, pred: impl Fn(&TagKind) -> bool) -> Option<TagId> {
        self.cell_tags(offset)
            .iter()
            .copied()
            .find(|t| pred(self.tags.kind(*t)))
    }

    /// Outermost tag at `offset` whose kind matches.
    pub(crate) fn outer_tag_at(&self, offset: usize, pred: impl Fn(&TagKind) -> bool) -> Option<TagId> {
        self.cell_tags(offset)
            .iter()
            .copied()
            .filter(|t| pred(self.tags.kind(*t)))
            .min_by_key(|t| self.tags.sort_key(*t))
    }

    /// Range of the run of `tag` containing `offset`.
    pub(crate) fn tag_extent(&self, offset: usize, tag: TagId) -> (usize, usize) {
        let mut start = offset;
        while start > 0 && self.has_tag(start - 1, tag) {
            start -= 1;
        }
        let mut end = offset;
        while self.has_tag(end, tag) {
            end += 1;
        }
        (start, end)
    }

    /// Whether every character of `[start, end)` carries `tag`.
    pub(crate) fn range_has_tag(&self, start: usize, end: usize, tag: TagId) -> bool {
        start < end && (start..end).all(|i| self.has_tag(i, tag))
    }

    // ----- lines -----

    pub(crate) fn list_item_tag(&self, line: usize) -> Option<TagId> {
        let start = self.line_start(line);
        self.find_tag_at(start, |k| matches!(k, TagKind::ListItem { .. }))
    }

    /// Indent level of a line, from its indent or list item tag.
    pub fn get_indent_at_line(&self, line: usize) -> u32 {
        let start = self.line_start(line);
        self.cell_tags(start)
            .iter()
            .find_map(|t| match self.tags.kind(*t) {
                TagKind::Indent(level) => Some(*level),
                TagKind::ListItem { indent, .. } => Some(*indent),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Heading level of a line.
    pub fn get_heading_level_at_line(&self, line: usize) -> Option<u8> {
        let start = self.line_start(line);
        self.cell_tags(start).iter().find_map(|t| match self.tags.kind(*t) {
            TagKind::Heading(level) => Some(*level),
            _ => None,
        })
    }

    /// Bullet of a list item line.
    ///
    /// A line only counts as list item when it carries a list item tag and starts with a
    /// recognized bullet: `•`, a numbered label or a checkbox icon.
    pub fn get_bullet_at_line(&self, line: usize) -> Option<Bullet> {
        self.list_item_tag(line)?;
        self.bullet_at(self.line_start(line)).map(|(bullet, _)| bullet)
    }

    /// Bullet text at `offset` and the number of characters it takes, including one
    /// following space.
    pub(crate) fn bullet_at(&self, offset: usize) -> Option<(Bullet, usize)> {
        let space_after = |i: usize| usize::from(self.char_at(i) == Some(' '));
        match self.char_at(offset)? {
            OBJECT_CHAR => match &self.object_at(offset)?.kind {
                ObjectKind::Icon(state) => {
                    Some((Bullet::Checkbox(*state), 1 + space_after(offset + 1)))
                }
                _ => None,
            },
            BULLET_CHAR => Some((Bullet::Bullet, 1 + space_after(offset + 1))),
            _ => {
                let end = self.line_end(self.line_of(offset)).min(offset + 12);
                let prefix = self.get_slice(offset, end);
                parse_numbered_prefix(&prefix).map(|(n, len)| (Bullet::Numbered(n), len))
            }
        }
    }

    /// Offset of the first character after the bullet of a list item line, or the line start.
    pub(crate) fn line_content_start(&self, line: usize) -> usize {
        let start = self.line_start(line);
        if self.list_item_tag(line).is_some()
            && let Some((_, len)) = self.bullet_at(start)
        {
            return start + len;
        }
        start
    }

    // ----- objects -----

    /// Object at `offset`.
    pub fn object_at(&self, offset: usize) -> Option<&InsertedObject> {
        self.object_id_at(offset).map(|id| self.objects.get(id))
    }

    /// Handle of the object at `offset`.
    pub fn object_id_at(&self, offset: usize) -> Option<ObjectId> {
        self.cells.get(offset).and_then(|c| c.object)
    }

    /// Object for a handle.
    pub fn object(&self, id: ObjectId) -> &InsertedObject {
        self.objects.get(id)
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> &mut InsertedObject {
        self.objects.get_mut(id)
    }

    /// All objects with their offsets, in document order.
    pub fn list_objects(&self) -> Vec<(usize, ObjectId)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.object.map(|id| (i, id)))
            .collect()
    }

    pub(crate) fn store_object(&mut self, kind: ObjectKind) -> ObjectId {
        self.objects.insert(InsertedObject::new(kind))
    }

    // ----- cursor and selection -----

    /// Cursor offset.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Offset of the other end of the selection; equals the cursor without selection.
    pub fn selection_bound(&self) -> usize {
        self.bound
    }

    /// Selected range, ordered, or `None` when nothing is selected.
    pub fn get_selection(&self) -> Option<(usize, usize)> {
        (self.cursor != self.bound)
            .then(|| (self.cursor.min(self.bound), self.cursor.max(self.bound)))
    }

    /// Whether text is selected.
    pub fn has_selection(&self) -> bool {
        self.cursor != self.bound
    }

    /// Move the cursor and drop the selection.
    ///
    /// Resets the edit mode and starts a new undo step for typing.
    pub fn place_cursor(&mut self, offset: usize) {
        let offset = offset.min(self.char_count());
        self.cursor = offset;
        self.bound = offset;
        self.editmode = None;
        self.undo.set_barrier();
        self.emit(BufferEvent::CursorMoved { offset });
    }

    /// Select a range; the cursor goes to `cursor` and the bound to `bound`.
    ///
    /// The edit mode becomes the formatting common to the whole selection, so text typed
    /// over the selection keeps it.
    pub fn select_range(&mut self, cursor: usize, bound: usize) {
        let cursor = cursor.min(self.char_count());
        let bound = bound.min(self.char_count());
        self.cursor = cursor;
        self.bound = bound;
        let (start, end) = (cursor.min(bound), cursor.max(bound));
        self.editmode = (start < end).then(|| self.common_tags(start, end));
        self.undo.set_barrier();
        self.emit(BufferEvent::CursorMoved { offset: cursor });
    }

    /// Document tags present on every character of `[start, end)`.
    pub(crate) fn common_tags(&self, start: usize, end: usize) -> Vec<TagId> {
        let mut tags = self.document_tags(start);
        for i in start + 1..end {
            tags.retain(|t| self.has_tag(i, *t));
        }
        tags
    }

    pub(crate) fn editmode_override(&self) -> Option<&[TagId]> {
        self.editmode.as_deref()
    }

    pub(crate) fn set_editmode_override(&mut self, tags: Option<Vec<TagId>>) {
        self.editmode = tags;
    }

    // ----- user actions and undo -----

    /// Start a user action; see [`user_action`](Self::user_action).
    pub fn begin_user_action(&mut self) {
        self.action_depth += 1;
    }

    /// End a user action; the outermost end closes the undo step.
    pub fn end_user_action(&mut self) {
        self.action_depth = self.action_depth.saturating_sub(1);
        if self.action_depth == 0 {
            self.undo.flush();
        }
    }

    /// Group all changes made through the returned guard into one undo step.
    ///
    /// Nested user actions collapse into the outermost one.
    ///
    /// ```rust
    /// use pageview_core::TextBuffer;
    ///
    /// let mut buffer = TextBuffer::new();
    /// {
    ///     let mut action = buffer.user_action();
    ///     action.insert_text(0, "foo", false).unwrap();
    ///     action.insert_text(3, " bar", false).unwrap();
    /// }
    /// assert!(buffer.undo());
    /// assert_eq!(buffer.get_text(), "");
    /// ```
    pub fn user_action(&mut self) -> UserAction<'_> {
        self.begin_user_action();
        UserAction { buffer: self }
    }

    pub(crate) fn with_user_action<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let mut action = self.user_action();
        f(&mut *action)
    }

    /// Whether [`undo`](Self::undo) would do something.
    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Whether [`redo`](Self::redo) would do something.
    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Undo the last step; returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(actions) = self.undo.take_undo() else {
            return false;
        };
        log::debug!("undo: {} actions", actions.len());
        self.replay(actions);
        self.emit(BufferEvent::UndoApplied);
        true
    }

    /// Redo the last undone step; returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(actions) = self.undo.take_redo() else {
            return false;
        };
        log::debug!("redo: {} actions", actions.len());
        self.replay(actions);
        self.emit(BufferEvent::RedoApplied);
        true
    }

    /// Drop all undo history.
    pub fn clear_undo_stack(&mut self) {
        self.undo.clear();
    }

    fn replay(&mut self, actions: Vec<UndoAction>) {
        self.undo.set_replaying(true);
        let mut cursor = self.cursor;
        for action in actions {
            match action {
                UndoAction::Insert { start, fragment } => {
                    cursor = start + fragment.len();
                    self.insert_fragment(start, fragment);
                }
                UndoAction::Delete { start, fragment } => {
                    self.delete_raw(start, start + fragment.len());
                    cursor = start;
                }
                UndoAction::ApplyTag { start, end, tag } => {
                    self.apply_tag_raw(tag, start, end);
                    cursor = end;
                }
                UndoAction::RemoveTag { start, end, tag } => {
                    self.remove_tag_raw(tag, start, end);
                    cursor = end;
                }
            }
        }
        self.undo.set_replaying(false);
        self.place_cursor(cursor);
    }

    fn record(&mut self, action: UndoAction) {
        self.undo.record(action);
        if self.action_depth == 0 {
            self.undo.flush();
        }
    }

    pub(crate) fn emit(&mut self, event: BufferEvent) {
        if self.find.match_live
            && (event.is_text_change() || matches!(event, BufferEvent::CursorMoved { .. }))
        {
            self.find.match_live = false;
            let tag = self.find.match_tag;
            self.remove_tag_raw(tag, 0, self.char_count());
        }
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    // ----- primitives -----

    /// Raw content of `[start, end)` without find highlighting.
    pub(crate) fn fragment(&self, start: usize, end: usize) -> Fragment {
        let cells = self.cells[start..end]
            .iter()
            .map(|cell| Cell {
                tags: cell
                    .tags
                    .iter()
                    .copied()
                    .filter(|t| self.tags.kind(*t).is_document_tag())
                    .collect(),
                object: cell.object,
            })
            .collect();
        Fragment {
            text: self.get_slice(start, end),
            cells,
        }
    }

    pub(crate) fn insert_fragment(&mut self, start: usize, fragment: Fragment) {
        if fragment.cells.is_empty() {
            return;
        }
        let len = fragment.len();
        let text = fragment.text.clone();
        self.text.insert(start, &fragment.text);
        self.cells.splice(start..start, fragment.cells.iter().cloned());
        if self.cursor >= start {
            self.cursor += len;
        }
        if self.bound >= start {
            self.bound += len;
        }
        self.modified = true;
        self.record(UndoAction::Insert { start, fragment });
        self.emit(BufferEvent::TextInserted { start, text });
    }

    /// Insert plain text where every character gets `tags`.
    pub(crate) fn insert_with_tags(&mut self, start: usize, text: &str, tags: &[TagId]) -> usize {
        let cell = Cell::with_tags(tags);
        let cells: Vec<Cell> = text.chars().map(|_| cell.clone()).collect();
        let len = cells.len();
        self.insert_fragment(
            start,
            Fragment {
                text: text.to_string(),
                cells,
            },
        );
        start + len
    }

    /// Insert an object character referring to `id`.
    pub(crate) fn insert_object_with_tags(&mut self, start: usize, id: ObjectId, tags: &[TagId]) {
        let mut cell = Cell::with_tags(tags);
        cell.object = Some(id);
        self.insert_fragment(
            start,
            Fragment {
                text: OBJECT_CHAR.to_string(),
                cells: vec![cell],
            },
        );
    }

    pub(crate) fn delete_raw(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let fragment = self.fragment(start, end);
        self.text.remove(start, end);
        self.cells.drain(start..end);
        let len = end - start;
        let shift = |pos: usize| {
            if pos >= end {
                pos - len
            } else if pos > start {
                start
            } else {
                pos
            }
        };
        self.cursor = shift(self.cursor);
        self.bound = shift(self.bound);
        self.modified = true;
        self.record(UndoAction::Delete { start, fragment });
        self.emit(BufferEvent::TextDeleted { start, end });
    }

    /// Runs of `[start, end)` where `has_tag` differs from `present`.
    fn tag_runs(&self, tag: TagId, start: usize, end: usize, present: bool) -> Vec<(usize, usize)> {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        for i in start..end.min(self.char_count()) {
            if self.has_tag(i, tag) == present {
                continue;
            }
            match runs.last_mut() {
                Some(run) if run.1 == i => run.1 = i + 1,
                _ => runs.push((i, i + 1)),
            }
        }
        runs
    }

    pub(crate) fn apply_tag_raw(&mut self, tag: TagId, start: usize, end: usize) {
        let runs = self.tag_runs(tag, start, end, true);
        if runs.is_empty() {
            return;
        }
        for &(s, e) in &runs {
            for cell in &mut self.cells[s..e] {
                cell.add(tag);
            }
        }
        if self.tags.kind(tag).class() == TagClass::Find {
            return;
        }
        self.modified = true;
        self.with_user_action(|buffer| {
            for (s, e) in runs {
                buffer.record(UndoAction::ApplyTag { start: s, end: e, tag });
                buffer.emit(BufferEvent::TagApplied { start: s, end: e, tag });
            }
        });
    }

    pub(crate) fn remove_tag_raw(&mut self, tag: TagId, start: usize, end: usize) {
        let runs = self.tag_runs(tag, start, end, false);
        if runs.is_empty() {
            return;
        }
        for &(s, e) in &runs {
            for cell in &mut self.cells[s..e] {
                cell.remove(tag);
            }
        }
        if self.tags.kind(tag).class() == TagClass::Find {
            return;
        }
        self.modified = true;
        self.with_user_action(|buffer| {
            for (s, e) in runs {
                buffer.record(UndoAction::RemoveTag { start: s, end: e, tag });
                buffer.emit(BufferEvent::TagRemoved { start: s, end: e, tag });
            }
        });
    }

    /// Remove every tag matching `pred` from `[start, end)`.
    pub(crate) fn remove_tags_where(&mut self, start: usize, end: usize, pred: impl Fn(&TagKind) -> bool) {
        let mut found: Vec<TagId> = Vec::new();
        for i in start..end.min(self.char_count()) {
            for tag in self.cell_tags(i) {
                if pred(self.tags.kind(*tag)) && !found.contains(tag) {
                    found.push(*tag);
                }
            }
        }
        for tag in found {
            self.remove_tag_raw(tag, start, end);
        }
    }

    /// Apply a tag of the given kind to `[start, end)`.
    pub fn apply_tag(&mut self, kind: TagKind, start: usize, end: usize) -> BufferResult<TagId> {
        self.check_range(start, end)?;
        let tag = self.tags.lookup(kind);
        self.apply_tag_raw(tag, start, end);
        Ok(tag)
    }

    /// Remove a tag from `[start, end)`.
    pub fn remove_tag(&mut self, tag: TagId, start: usize, end: usize) -> BufferResult<()> {
        self.check_range(start, end)?;
        self.remove_tag_raw(tag, start, end);
        Ok(())
    }

    /// Checkbox state of a checkbox line.
    pub fn get_checkbox_at_line(&self, line: usize) -> Option<CheckState> {
        match self.get_bullet_at_line(line)? {
            Bullet::Checkbox(state) => Some(state),
            _ => None,
        }
    }
}
