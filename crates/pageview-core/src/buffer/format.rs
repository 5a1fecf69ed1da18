//! Format toggles, bullets and indenting.
//!
//! Line formatting is exclusive per line: a heading replaces any list item or indent of the
//! line, and a list item carries its own indent level. Inline formats (styles and code) apply to
//! the text after the bullet only.

use super::TextBuffer;
use crate::bullets::{Bullet, CheckState};
use crate::error::{BufferError, BufferResult};
use crate::lists::TextBufferList;
use crate::objects::ObjectKind;
use crate::tags::{TagId, TagKind};

impl TextBuffer {
    pub(crate) fn check_editable(&self) -> BufferResult<()> {
        if !self.config().editable {
            return Err(BufferError::ReadOnly);
        }
        Ok(())
    }

    /// The range to format: an explicit range, else the selection.
    fn format_range(&self, range: Option<(usize, usize)>) -> BufferResult<Option<(usize, usize)>> {
        match range {
            Some((start, end)) => {
                self.check_range(start, end)?;
                Ok(Some((start, end)))
            }
            None => Ok(self.get_selection()),
        }
    }

    /// First and last line touched by `range`, the selection or the cursor.
    ///
    /// A range ending at the start of a line does not include that line.
    pub(crate) fn lines_for_range(&self, range: Option<(usize, usize)>) -> (usize, usize) {
        let (start, end) = range
            .or_else(|| self.get_selection())
            .unwrap_or((self.cursor(), self.cursor()));
        let first = self.line_of(start);
        let mut last = self.line_of(end);
        if end > start && last > first && self.is_line_start(end) {
            last -= 1;
        }
        (first, last)
    }

    fn refresh_editmode(&mut self) {
        if let Some((start, end)) = self.get_selection() {
            let tags = self.common_tags(start, end);
            self.set_editmode_override(Some(tags));
        }
    }

    /// Toggle a format over `range`, the selection, or the word at the cursor.
    ///
    /// `name` is an inline style (`strong`, `emphasis`, `mark`, `strike`, `sub`, `sup`),
    /// `code`, `pre` or a heading `h1` .. `h6`. Inline formats are removed when the whole
    /// range already has them and applied otherwise. Without a selection an inline format is
    /// applied to the word under the cursor, or else toggled in the edit mode so that it
    /// applies to the text typed next. Headings and `pre` work on whole lines; `code` over
    /// whole lines becomes `pre`.
    pub fn toggle_format(&mut self, name: &str, range: Option<(usize, usize)>) -> BufferResult<()> {
        let kind = TagKind::from_format_name(name)
            .ok_or_else(|| BufferError::InvalidTagName(name.to_string()))?;
        self.check_editable()?;
        let range = self.format_range(range)?;
        match kind {
            TagKind::Heading(level) => self.toggle_heading(level, range),
            TagKind::Pre => self.toggle_pre(range),
            TagKind::Code if range.is_some_and(|(s, e)| self.spans_lines(s, e)) => self.toggle_pre(range),
            kind => {
                let tag = self.lookup_tag(kind);
                match range {
                    Some((start, end)) if start < end => self.toggle_inline_range(tag, start, end),
                    _ => self.toggle_inline_at_cursor(tag),
                }
            }
        }
        self.refresh_editmode();
        Ok(())
    }

    /// Whether `[start, end)` covers whole lines or crosses a line break.
    fn spans_lines(&self, start: usize, end: usize) -> bool {
        if start >= end {
            return false;
        }
        let text = self.get_slice(start, end);
        let inner = text.strip_suffix('\n').unwrap_or(&text);
        inner.contains('\n') || (self.is_line_start(start) && text.ends_with('\n'))
    }

    /// Parts of `[start, end)` per line, skipping bullets.
    fn inline_segments(&self, start: usize, end: usize) -> Vec<(usize, usize)> {
        (self.line_of(start)..=self.line_of(end))
            .filter_map(|line| {
                let s = start.max(self.line_content_start(line));
                let e = end.min(self.line_end_with_newline(line));
                (s < e).then_some((s, e))
            })
            .collect()
    }

    fn toggle_inline_range(&mut self, tag: TagId, start: usize, end: usize) {
        let pre = self.lookup_tag(TagKind::Pre);
        let segments = self.inline_segments(start, end);
        let formattable: Vec<usize> = segments
            .iter()
            .flat_map(|&(s, e)| s..e)
            .filter(|&i| self.char_at(i) != Some('\n') && !self.has_tag(i, pre))
            .collect();
        let remove = !formattable.is_empty() && formattable.iter().all(|&i| self.has_tag(i, tag));
        let is_code = matches!(self.kind(tag), TagKind::Code);

        self.with_user_action(|buffer| {
            if remove {
                for &(s, e) in &segments {
                    buffer.remove_tag_raw(tag, s, e);
                }
                return;
            }
            // Apply per run of formattable characters
            let mut runs: Vec<(usize, usize)> = Vec::new();
            for i in formattable {
                match runs.last_mut() {
                    Some(run) if run.1 == i => run.1 = i + 1,
                    _ => runs.push((i, i + 1)),
                }
            }
            for (s, e) in runs {
                if is_code {
                    buffer.remove_tags_where(s, e, |k| matches!(k, TagKind::TagRef));
                }
                buffer.apply_tag_raw(tag, s, e);
            }
        });
    }

    fn toggle_inline_at_cursor(&mut self, tag: TagId) {
        let cursor = self.cursor();
        if let Some((start, end)) = self.word_range_at(cursor) {
            let left = !self.is_line_start(cursor) && self.has_tag(cursor - 1, tag);
            let right = self.has_tag(cursor, tag);
            if left == right {
                self.toggle_inline_range(tag, start, end);
                self.place_cursor(cursor);
                return;
            }
        }

        let mut tags = self.tags_for_insert_at(cursor, "");
        if let Some(i) = tags.iter().position(|t| *t == tag) {
            tags.remove(i);
        } else {
            if matches!(self.kind(tag), TagKind::Code) {
                tags.retain(|t| !matches!(self.kind(*t), TagKind::TagRef));
            }
            tags.push(tag);
        }
        self.set_editmode_override(Some(tags));
    }

    fn toggle_heading(&mut self, level: u8, range: Option<(usize, usize)>) {
        let (first, last) = self.lines_for_range(range);
        let tag = self.lookup_tag(TagKind::Heading(level));
        let lines: Vec<usize> = (first..=last)
            .filter(|&line| self.line_start(line) < self.line_end_with_newline(line))
            .collect();
        if lines.is_empty() {
            return;
        }
        let remove = lines.iter().all(|&line| self.has_tag(self.line_start(line), tag));

        self.with_user_action(|buffer| {
            for line in lines {
                let start = buffer.line_start(line);
                let end = buffer.line_end_with_newline(line);
                if remove {
                    buffer.remove_tag_raw(tag, start, end);
                } else {
                    buffer.remove_tags_where(start, end, TagKind::is_line_based);
                    buffer.apply_tag_raw(tag, start, end);
                }
            }
        });
    }

    /// Toggle `pre` over whole lines. Indenting becomes leading tabs and inline formatting
    /// is dropped.
    fn toggle_pre(&mut self, range: Option<(usize, usize)>) {
        let (first, last) = self.lines_for_range(range);
        let start = self.line_start(first);
        let end = self.line_end_with_newline(last);
        if start >= end {
            return;
        }
        let pre = self.lookup_tag(TagKind::Pre);
        if self.range_has_tag(start, end, pre) {
            self.with_user_action(|buffer| buffer.remove_tag_raw(pre, start, end));
            return;
        }

        self.with_user_action(|buffer| {
            let mut end = end;
            for line in (first..=last).rev() {
                let level = buffer.get_indent_at_line(line) as usize;
                let line_start = buffer.line_start(line);
                let line_end = buffer.line_end_with_newline(line);
                buffer.remove_tags_where(line_start, line_end, TagKind::is_line_based);
                if level > 0 {
                    buffer.insert_with_tags(line_start, &"\t".repeat(level), &[]);
                    end += level;
                }
            }
            buffer.remove_tags_where(start, end, |k| k.is_document_tag() && !k.is_line_based());
            buffer.apply_tag_raw(pre, start, end);
        });
    }

    /// Remove inline styles and code from `range` or the selection; without a selection they
    /// are removed from the edit mode instead.
    pub fn clear_formatting(&mut self, range: Option<(usize, usize)>) -> BufferResult<()> {
        self.check_editable()?;
        let is_inline_format = |k: &TagKind| matches!(k, TagKind::Style(_) | TagKind::Code);
        match self.format_range(range)? {
            Some((start, end)) if start < end => {
                self.with_user_action(|buffer| buffer.remove_tags_where(start, end, is_inline_format));
                self.refresh_editmode();
            }
            _ => {
                let mut tags = self.tags_for_insert_at(self.cursor(), "");
                tags.retain(|t| !is_inline_format(self.kind(*t)));
                self.set_editmode_override(Some(tags));
            }
        }
        Ok(())
    }

    // ----- bullets -----

    /// Insert bullet text or a checkbox icon at `offset` with only the list item tag.
    fn insert_bullet_raw(&mut self, offset: usize, bullet: Bullet, li: TagId) -> usize {
        match bullet {
            Bullet::Checkbox(state) => {
                let id = self.store_object(ObjectKind::Icon(state));
                self.insert_object_with_tags(offset, id, &[li]);
                self.insert_with_tags(offset + 1, " ", &[li])
            }
            bullet => {
                let text = bullet.text().unwrap_or_default();
                self.insert_with_tags(offset, &text, &[li])
            }
        }
    }

    /// Replace the bullet of a list item, keeping its indent level.
    pub(crate) fn replace_bullet(&mut self, line: usize, bullet: Bullet) {
        let start = self.line_start(line);
        let Some(li) = self.list_item_tag(line) else {
            return;
        };
        let Some((_, len)) = self.bullet_at(start) else {
            return;
        };
        let TagKind::ListItem { indent, .. } = *self.kind(li) else {
            return;
        };
        let new_li = self.lookup_tag(TagKind::ListItem {
            indent,
            style: bullet.list_style(),
        });
        self.with_user_action(|buffer| {
            buffer.delete_raw(start, start + len);
            buffer.insert_bullet_raw(start, bullet, new_li);
            if new_li != li {
                let end = buffer.line_end_with_newline(line);
                buffer.remove_tag_raw(li, start, end);
                buffer.apply_tag_raw(new_li, start, end);
            }
        });
    }

    /// Set the indent level of a line, for both list items and indented paragraphs.
    pub(crate) fn set_line_indent(&mut self, line: usize, level: u32) {
        let start = self.line_start(line);
        let end = self.line_end_with_newline(line);
        if start >= end {
            return;
        }
        let list_item = self.list_item_tag(line);
        self.with_user_action(|buffer| match list_item.map(|t| buffer.kind(t).clone()) {
            Some(TagKind::ListItem { style, .. }) => {
                buffer.remove_tags_where(start, end, TagKind::is_indent);
                let tag = buffer.lookup_tag(TagKind::ListItem { indent: level, style });
                buffer.apply_tag_raw(tag, start, end);
            }
            _ => {
                buffer.remove_tags_where(start, end, |k| matches!(k, TagKind::Indent(_)));
                if level > 0 {
                    let tag = buffer.lookup_tag(TagKind::Indent(level));
                    buffer.apply_tag_raw(tag, start, end);
                }
            }
        });
    }

    /// Set or remove the bullet of a line.
    ///
    /// The line keeps its indent level; a heading on the line is removed. Removing the bullet
    /// of an indented item leaves an indented paragraph.
    pub fn set_bullet(&mut self, line: usize, bullet: Option<Bullet>) -> BufferResult<()> {
        if line >= self.line_count() {
            return Err(BufferError::InvalidPosition(line));
        }
        self.check_editable()?;
        self.with_user_action(|buffer| {
            buffer.set_bullet_inner(line, bullet);
            if buffer.config().auto_renumber && bullet.is_some_and(Bullet::is_numbered) {
                buffer.renumber_list(line);
            }
        });
        Ok(())
    }

    fn set_bullet_inner(&mut self, line: usize, bullet: Option<Bullet>) {
        let level = self.get_indent_at_line(line);
        let start = self.line_start(line);
        if self.list_item_tag(line).is_some()
            && let Some((_, len)) = self.bullet_at(start)
        {
            self.delete_raw(start, start + len);
        }
        let end = self.line_end_with_newline(line);
        self.remove_tags_where(start, end, |k| k.is_indent() || matches!(k, TagKind::Heading(_)));

        match bullet {
            Some(bullet) => {
                let li = self.lookup_tag(TagKind::ListItem {
                    indent: level,
                    style: bullet.list_style(),
                });
                self.insert_bullet_raw(start, bullet, li);
                let end = self.line_end_with_newline(line);
                self.apply_tag_raw(li, start, end);
            }
            None if level > 0 => {
                let tag = self.lookup_tag(TagKind::Indent(level));
                self.apply_tag_raw(tag, start, end);
            }
            None => {}
        }
    }

    /// Toggle a bullet on the lines of `range`, the selection or the cursor line.
    ///
    /// When every non-empty line already has a bullet of the same kind the bullets are
    /// removed, otherwise all lines get `bullet`. Heading lines are skipped.
    pub fn toggle_bullet(&mut self, bullet: Bullet, range: Option<(usize, usize)>) -> BufferResult<()> {
        self.check_editable()?;
        let range = self.format_range(range)?;
        let (first, last) = self.lines_for_range(range);
        let lines: Vec<usize> = (first..=last)
            .filter(|&line| {
                !self.get_line_text(line).trim().is_empty()
                    && self.get_heading_level_at_line(line).is_none()
            })
            .collect();
        if lines.is_empty() {
            return Ok(());
        }
        let remove = lines.iter().all(|&line| {
            self.get_bullet_at_line(line)
                .is_some_and(|b| b.class() == bullet.class())
        });

        self.with_user_action(|buffer| {
            for &line in &lines {
                buffer.set_bullet_inner(line, (!remove).then_some(bullet));
            }
            if !remove && bullet.is_numbered() && buffer.config().auto_renumber {
                buffer.renumber_list(lines[0]);
            }
        });
        Ok(())
    }

    /// Toggle the checkbox of a checkbox line between `state` and unchecked.
    ///
    /// Checking or unchecking propagates to child and parent items when
    /// [`bullet_checkbox_propagation`](crate::BufferConfig::bullet_checkbox_propagation) is set.
    /// Returns `false` when the line is not a checkbox item.
    pub fn toggle_checkbox(&mut self, line: usize, state: CheckState) -> BufferResult<bool> {
        self.check_editable()?;
        let Some(current) = self.get_checkbox_at_line(line) else {
            return Ok(false);
        };
        let new_state = if current == state {
            CheckState::Unchecked
        } else {
            state
        };
        let Some((row, mut list)) = TextBufferList::new_from_line(self, line) else {
            return Ok(false);
        };
        list.set_bullet(self, row, Bullet::Checkbox(new_state));
        Ok(true)
    }

    // ----- indenting -----

    /// Indent a line one level; list items move together with their children.
    ///
    /// Returns `false` when the line can not be indented: headings, and list items that would
    /// end up more than one level deeper than the item above.
    pub fn indent(&mut self, line: usize) -> BufferResult<bool> {
        self.check_editable()?;
        Ok(self.shift_line(line, true).is_some())
    }

    /// Unindent a line one level; returns `false` for lines that are not indented.
    pub fn unindent(&mut self, line: usize) -> BufferResult<bool> {
        self.check_editable()?;
        Ok(self.shift_line(line, false).is_some())
    }

    /// Indent every line of `range`, the selection or the cursor line.
    pub fn indent_selection(&mut self, range: Option<(usize, usize)>) -> BufferResult<bool> {
        self.check_editable()?;
        let range = self.format_range(range)?;
        Ok(self.shift_lines(range, true))
    }

    /// Unindent every line of `range`, the selection or the cursor line.
    pub fn unindent_selection(&mut self, range: Option<(usize, usize)>) -> BufferResult<bool> {
        self.check_editable()?;
        let range = self.format_range(range)?;
        Ok(self.shift_lines(range, false))
    }

    fn shift_lines(&mut self, range: Option<(usize, usize)>, deeper: bool) -> bool {
        let (first, last) = self.lines_for_range(range);
        self.with_user_action(|buffer| {
            let mut moved: Vec<usize> = Vec::new();
            let mut changed = false;
            for line in first..=last {
                if moved.contains(&line) || buffer.get_line_text(line).is_empty() {
                    continue;
                }
                if let Some(lines) = buffer.shift_line(line, deeper) {
                    moved.extend(lines);
                    changed = true;
                }
            }
            changed
        })
    }

    /// Indent or unindent one line; returns the lines that moved.
    fn shift_line(&mut self, line: usize, deeper: bool) -> Option<Vec<usize>> {
        if self.get_heading_level_at_line(line).is_some() {
            return None;
        }
        if self.get_bullet_at_line(line).is_some() {
            let (row, mut list) = TextBufferList::new_from_line(self, line)?;
            return if deeper {
                list.indent(self, row)
            } else {
                list.unindent(self, row)
            };
        }
        let level = self.get_indent_at_line(line);
        let new_level = if deeper {
            level + 1
        } else if level > 0 {
            level - 1
        } else {
            return None;
        };
        self.set_line_indent(line, new_level);
        Some(vec![line])
    }
}
