//! Inserting and deleting text.
//!
//! Inserted text takes its formatting from the "edit mode": the tags of the character left of
//! the insert position, or an explicit override set by format toggles, selections and deletes.
//! Line formatting (headings, indenting, list items and pre) is kept consistent per line.

use pageview_core_parse::Attrib;

use super::TextBuffer;
use crate::error::{BufferError, BufferResult};
use crate::objects::{ObjectId, ObjectKind, ObjectModel};
use crate::tags::{TagId, TagKind};

impl TextBuffer {
    /// Tags for text inserted at `offset`, ignoring any override.
    ///
    /// Inside a line the tags of the previous character are used. Links and tag references
    /// that end at `offset` only continue when they are dynamic (their target follows the
    /// text) and the inserted text does not start with whitespace. At the start of a line only
    /// the line formatting of the line is used.
    pub(crate) fn tags_left_of(&self, offset: usize, text: &str) -> Vec<TagId> {
        if self.is_line_start(offset) {
            return self.line_based_tags(offset);
        }
        let starts_with_space = text.chars().next().is_some_and(char::is_whitespace);
        let mut tags = self.document_tags(offset - 1);
        tags.retain(|tag| {
            let kind = self.kind(*tag);
            if kind.is_link_like() && !self.has_tag(offset, *tag) {
                let dynamic = matches!(kind, TagKind::Link { href: None } | TagKind::TagRef);
                dynamic && !starts_with_space
            } else {
                true
            }
        });
        tags
    }

    /// Tags for text inserted at `offset`, honouring the edit mode override at the cursor.
    pub(crate) fn tags_for_insert_at(&self, offset: usize, text: &str) -> Vec<TagId> {
        if offset == self.cursor()
            && let Some(tags) = self.editmode_override()
        {
            return tags.to_vec();
        }
        self.tags_left_of(offset, text)
    }

    /// Formatting that text typed at the cursor gets, outer first.
    pub fn get_editmode(&self) -> Vec<&TagKind> {
        let mut tags = self.tags_for_insert_at(self.cursor(), "");
        self.tag_table().sort_by_priority(&mut tags);
        tags.into_iter().map(|t| self.kind(t)).collect()
    }

    /// Insert text.
    ///
    /// Interactive inserts fail on a read-only buffer. Text inserted at the start of a list
    /// item goes after the bullet. A newline at the start of a formatted line moves the line
    /// down instead of splitting its formatting, and a newline never continues a heading on
    /// the next line.
    pub fn insert_text(&mut self, offset: usize, text: &str, interactive: bool) -> BufferResult<()> {
        self.check_position(offset)?;
        if interactive && !self.config().editable {
            return Err(BufferError::ReadOnly);
        }
        if text.is_empty() {
            return Ok(());
        }
        self.with_user_action(|buffer| buffer.insert_text_inner(offset, text));
        Ok(())
    }

    fn insert_text_inner(&mut self, mut offset: usize, text: &str) {
        let at_cursor = offset == self.cursor();
        let editmode = at_cursor.then(|| self.editmode_override().map(<[TagId]>::to_vec)).flatten();

        if text != "\n" && self.is_line_start(offset) {
            let content = self.line_content_start(self.line_of(offset));
            if content > offset {
                offset = content;
            }
        }

        if text == "\n" && self.is_line_start(offset) {
            let line_tags = self.line_based_tags(offset);
            if !line_tags.is_empty() {
                // Move the formatted line down
                self.insert_with_tags(offset, "\n", &[]);
                if at_cursor {
                    self.set_editmode_override(Some(line_tags));
                }
                return;
            }
        }

        let tags = match editmode {
            Some(tags) => tags,
            None => self.tags_left_of(offset, text),
        };
        let end = self.insert_with_tags(offset, text, &tags);
        if at_cursor && self.cursor() != end {
            self.set_cursor_keep_editmode(end);
        }

        if text == "\n" {
            let next_line = self.line_of(end);
            let next_end = self.line_end_with_newline(next_line);
            self.remove_tags_where(end, next_end, |k| matches!(k, TagKind::Heading(_)));
            if let Some(tags) = self.editmode_override() {
                let tags: Vec<TagId> = tags
                    .iter()
                    .copied()
                    .filter(|t| !matches!(self.kind(*t), TagKind::Heading(_)))
                    .collect();
                self.set_editmode_override(Some(tags));
            }
        }

        self.normalize_links(offset, end);
    }

    /// Insert text at the cursor.
    pub fn insert_at_cursor(&mut self, text: &str) -> BufferResult<()> {
        self.insert_text(self.cursor(), text, false)
    }

    /// Delete `[start, end)`.
    ///
    /// Deleting the newline at the end of a line merges the next line into it: the merged
    /// text takes the line formatting of the first line, and the bullet of the next line is
    /// removed when it is a list item. Deleting the bullet of a list item turns the line into
    /// a plain (indented) paragraph.
    pub fn delete_range(&mut self, start: usize, end: usize) -> BufferResult<()> {
        self.check_range(start, end)?;
        if start == end {
            return Ok(());
        }
        self.with_user_action(|buffer| buffer.delete_range_inner(start, end));
        Ok(())
    }

    fn delete_range_inner(&mut self, start: usize, mut end: usize) {
        if self.is_line_end(start) && !self.is_line_start(start) && end < self.char_count() {
            let next_line = self.line_of(end);
            if self.line_start(next_line) == end
                && self.list_item_tag(next_line).is_some()
                && let Some((_, len)) = self.bullet_at(end)
            {
                end += len;
            }
        }

        let deleted = self.get_slice(start, end);
        let removes_bullet = !deleted.contains('\n')
            && self.is_line_start(start)
            && self.list_item_tag(self.line_of(start)).is_some()
            && self.bullet_at(start).is_some();
        let line = self.line_of(start);
        let indent = self.get_indent_at_line(line);

        self.delete_raw(start, end);

        if deleted.contains('\n') && !self.is_line_start(start) {
            let line_tags = self.line_based_tags(start - 1);
            let line_end = self.line_end_with_newline(self.line_of(start));
            self.remove_tags_where(start, line_end, |k| k.is_line_based());
            for tag in line_tags {
                self.apply_tag_raw(tag, start, line_end);
            }
        }

        if removes_bullet {
            let line_start = self.line_start(line);
            let line_end = self.line_end_with_newline(line);
            self.remove_tags_where(line_start, line_end, |k| matches!(k, TagKind::ListItem { .. }));
            if indent > 0 {
                let tag = self.lookup_tag(TagKind::Indent(indent));
                self.apply_tag_raw(tag, line_start, line_end);
            }
        }

        self.normalize_links(start, start);
    }

    /// Delete the selection; returns `false` when nothing was selected.
    ///
    /// For interactive deletes text typed next keeps the formatting of the deleted text.
    pub fn delete_selection(&mut self, interactive: bool) -> BufferResult<bool> {
        let Some((start, end)) = self.get_selection() else {
            return Ok(false);
        };
        if interactive && !self.config().editable {
            return Err(BufferError::ReadOnly);
        }
        let tags = self.document_tags(start);
        self.delete_range(start, end)?;
        if interactive {
            self.set_editmode_override(Some(tags));
        }
        Ok(true)
    }

    /// Replace the selection (or insert at the cursor) with text that keeps the formatting
    /// of the replaced text.
    pub fn replace_selection(&mut self, text: &str) -> BufferResult<()> {
        self.begin_user_action();
        let result = self
            .delete_selection(true)
            .and_then(|_| self.insert_text(self.cursor(), text, true));
        self.end_user_action();
        result
    }

    /// Insert an object built from `kind` with the formatting of the insert position.
    pub(crate) fn insert_object_kind(&mut self, offset: usize, kind: ObjectKind) -> BufferResult<ObjectId> {
        self.check_position(offset)?;
        let tags: Vec<TagId> = self
            .tags_for_insert_at(offset, "")
            .into_iter()
            .filter(|t| !self.kind(*t).is_link_like())
            .collect();
        let id = self.store_object(kind);
        self.insert_object_with_tags(offset, id, &tags);
        Ok(id)
    }

    /// Insert a plugin object with attributes (including `type`) and a model.
    pub fn insert_object(&mut self, offset: usize, attrib: Attrib, model: ObjectModel) -> BufferResult<ObjectId> {
        self.insert_object_kind(offset, ObjectKind::Object { attrib, model })
    }

    /// Insert a plugin object whose model is created by the factory registered for its type.
    pub fn insert_object_from_data(
        &mut self,
        offset: usize,
        attrib: Attrib,
        data: Option<&str>,
    ) -> BufferResult<ObjectId> {
        let model = self.create_object_model(&attrib, data);
        self.insert_object(offset, attrib, model)
    }

    /// Insert a named anchor.
    pub fn insert_anchor(&mut self, offset: usize, name: &str) -> BufferResult<ObjectId> {
        self.insert_object_kind(offset, ObjectKind::Anchor(name.to_string()))
    }

    /// Insert an image; `attrib` holds `src` and optional `width`, `height`, `id`, ...
    pub fn insert_image(&mut self, offset: usize, attrib: Attrib) -> BufferResult<ObjectId> {
        self.insert_object_kind(offset, ObjectKind::Image(attrib))
    }

    /// Insert a horizontal line on a line of its own.
    pub fn insert_line_separator(&mut self, offset: usize) -> BufferResult<ObjectId> {
        self.check_position(offset)?;
        self.begin_user_action();
        let mut offset = offset;
        if !self.is_line_start(offset) {
            self.insert_with_tags(offset, "\n", &[]);
            offset += 1;
        }
        let id = self.store_object(ObjectKind::Line);
        self.insert_object_with_tags(offset, id, &[]);
        if self.char_at(offset + 1) != Some('\n') {
            self.insert_with_tags(offset + 1, "\n", &[]);
        }
        self.end_user_action();
        Ok(id)
    }

    fn set_cursor_keep_editmode(&mut self, offset: usize) {
        let editmode = self.editmode_override().map(<[TagId]>::to_vec);
        self.place_cursor(offset);
        self.set_editmode_override(editmode);
    }

    /// Make links around `[start, end]` dynamic when their text equals their target.
    pub(crate) fn normalize_links(&mut self, start: usize, end: usize) {
        let mut links: Vec<TagId> = Vec::new();
        for i in start.saturating_sub(1)..(end + 1).min(self.char_count()) {
            for tag in self.cell_tags(i) {
                if matches!(self.kind(*tag), TagKind::Link { href: Some(_) }) && !links.contains(tag) {
                    links.push(*tag);
                }
            }
        }
        for tag in links {
            let first = (start.saturating_sub(1)..=end).find(|i| self.has_tag(*i, tag));
            let Some(first) = first else { continue };
            let (s, e) = self.tag_extent(first, tag);
            let text = self.get_slice(s, e);
            if matches!(self.kind(tag), TagKind::Link { href: Some(href) } if *href == text) {
                let dynamic = self.lookup_tag(TagKind::Link { href: None });
                self.remove_tag_raw(tag, s, e);
                self.apply_tag_raw(dynamic, s, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::TextBuffer;
    use crate::tags::{InlineStyle, TagKind};

    fn buffer_with(text: &str) -> TextBuffer {
        let mut buffer = TextBuffer::new();
        buffer.insert_text(0, text, false).unwrap();
        buffer.clear_undo_stack();
        buffer
    }

    #[test]
    fn test_insert_continues_style() {
        let mut buffer = buffer_with("foo bar");
        buffer
            .apply_tag(TagKind::Style(InlineStyle::Strong), 0, 3)
            .unwrap();
        buffer.insert_text(3, "d", false).unwrap();
        assert_eq!(buffer.get_tags_at(3), vec![&TagKind::Style(InlineStyle::Strong)]);
        buffer.insert_text(0, "x", false).unwrap();
        assert!(buffer.get_tags_at(0).is_empty());
    }

    #[test]
    fn test_fixed_link_does_not_grow() {
        let mut buffer = buffer_with("link");
        buffer
            .apply_tag(TagKind::Link { href: Some("target".into()) }, 0, 4)
            .unwrap();
        buffer.insert_text(4, "s", false).unwrap();
        assert!(buffer.get_tags_at(4).is_empty());
    }

    #[test]
    fn test_dynamic_link_grows_on_typing() {
        let mut buffer = buffer_with("link");
        buffer.apply_tag(TagKind::Link { href: None }, 0, 4).unwrap();
        buffer.insert_text(4, "s", false).unwrap();
        assert_eq!(buffer.get_tags_at(4), vec![&TagKind::Link { href: None }]);
        buffer.insert_text(5, " ", false).unwrap();
        assert!(buffer.get_tags_at(5).is_empty());
    }

    #[test]
    fn test_link_becomes_dynamic_when_text_matches() {
        let mut buffer = buffer_with("tar-get");
        buffer
            .apply_tag(TagKind::Link { href: Some("target".into()) }, 0, 7)
            .unwrap();
        buffer.delete_range(3, 4).unwrap();
        assert_eq!(buffer.get_text(), "target");
        assert_eq!(buffer.get_tags_at(0), vec![&TagKind::Link { href: None }]);
    }

    #[test]
    fn test_read_only() {
        let mut buffer = TextBuffer::with_config(crate::BufferConfig::default().with_editable(false));
        assert!(buffer.insert_text(0, "foo", true).is_err());
        assert!(buffer.insert_text(0, "foo", false).is_ok());
    }
}
