//! List structure and renumbering.
//!
//! A list is the maximal run of consecutive list item lines. [`TextBufferList`] is a snapshot of
//! such a run used to indent items together with their children and to propagate checkbox
//! state. Renumbering works directly on the buffer: numbered items at the same level form a run
//! that is numbered from the value of its first item; deeper items are skipped and anything
//! else (a shallower item, another bullet kind or a line that is not a list item) ends the run.

use std::ops::Range;

use crate::buffer::TextBuffer;
use crate::bullets::{Bullet, CheckState, Numeral};

/// One list item line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRow {
    /// Line number in the buffer.
    pub line: usize,
    /// Indent level.
    pub indent: u32,
    /// Bullet of the item.
    pub bullet: Bullet,
}

/// Snapshot of a contiguous list in a buffer.
///
/// Operations update the buffer and the snapshot together, so a list can be used for several
/// operations in a row as long as the buffer is not changed otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBufferList {
    /// First line of the list.
    pub firstline: usize,
    /// Last line of the list.
    pub lastline: usize,
    rows: Vec<ListRow>,
}

impl TextBufferList {
    /// The list containing `line`, and the row of `line` in it.
    ///
    /// Returns `None` when `line` is not a list item.
    pub fn new_from_line(buffer: &TextBuffer, line: usize) -> Option<(usize, Self)> {
        buffer.get_bullet_at_line(line)?;
        let mut firstline = line;
        while firstline > 0 && buffer.get_bullet_at_line(firstline - 1).is_some() {
            firstline -= 1;
        }
        let mut lastline = line;
        while lastline + 1 < buffer.line_count() && buffer.get_bullet_at_line(lastline + 1).is_some() {
            lastline += 1;
        }
        let rows = (firstline..=lastline)
            .filter_map(|line| {
                Some(ListRow {
                    line,
                    indent: buffer.get_indent_at_line(line),
                    bullet: buffer.get_bullet_at_line(line)?,
                })
            })
            .collect();
        Some((
            line - firstline,
            Self {
                firstline,
                lastline,
                rows,
            },
        ))
    }

    /// All rows, in line order.
    pub fn rows(&self) -> &[ListRow] {
        &self.rows
    }

    /// Row of a buffer line.
    pub fn get_row_at_line(&self, line: usize) -> Option<usize> {
        self.rows.iter().position(|r| r.line == line)
    }

    /// Nearest row above `row` with a smaller indent.
    pub fn parent(&self, row: usize) -> Option<usize> {
        let indent = self.rows.get(row)?.indent;
        (0..row).rev().find(|&i| self.rows[i].indent < indent)
    }

    /// Rows below `row` that are indented deeper, up to the next sibling.
    pub fn descendants(&self, row: usize) -> Range<usize> {
        let Some(indent) = self.rows.get(row).map(|r| r.indent) else {
            return row..row;
        };
        let end = (row + 1..self.rows.len())
            .find(|&i| self.rows[i].indent <= indent)
            .unwrap_or(self.rows.len());
        row + 1..end
    }

    /// Direct children of `row`.
    pub fn children(&self, row: usize) -> Vec<usize> {
        self.descendants(row)
            .filter(|&i| self.parent(i) == Some(row))
            .collect()
    }

    /// Whether `row` can be indented: an item can be at most one level deeper than the item
    /// above it. The first row indents the whole list.
    pub fn can_indent(&self, row: usize) -> bool {
        match row {
            0 => !self.rows.is_empty(),
            _ => self
                .rows
                .get(row)
                .is_some_and(|r| self.rows[row - 1].indent >= r.indent),
        }
    }

    /// Whether `row` can be unindented.
    pub fn can_unindent(&self, row: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.indent > 0)
    }

    fn moved_rows(&self, row: usize) -> Vec<usize> {
        if row == 0 {
            (0..self.rows.len()).collect()
        } else {
            std::iter::once(row).chain(self.descendants(row)).collect()
        }
    }

    /// Indent `row` and its children; returns the lines that moved, or `None` when the row
    /// can not be indented.
    pub fn indent(&mut self, buffer: &mut TextBuffer, row: usize) -> Option<Vec<usize>> {
        if !self.can_indent(row) {
            return None;
        }
        Some(self.shift(buffer, row, true))
    }

    /// Unindent `row` and its children; returns the lines that moved, or `None` when the row
    /// is not indented.
    pub fn unindent(&mut self, buffer: &mut TextBuffer, row: usize) -> Option<Vec<usize>> {
        if !self.can_unindent(row) {
            return None;
        }
        Some(self.shift(buffer, row, false))
    }

    fn shift(&mut self, buffer: &mut TextBuffer, row: usize, deeper: bool) -> Vec<usize> {
        let moved = self.moved_rows(row);
        let old_indent = self.rows[row].indent;
        buffer.with_user_action(|buffer| {
            for &i in &moved {
                let r = &mut self.rows[i];
                r.indent = if deeper { r.indent + 1 } else { r.indent.saturating_sub(1) };
                buffer.set_line_indent(r.line, r.indent);
            }
            if buffer.config().auto_renumber {
                buffer.renumber_list_after_indent(self.rows[row].line, old_indent);
                self.refresh_bullets(buffer);
            }
        });
        moved.into_iter().map(|i| self.rows[i].line).collect()
    }

    fn refresh_bullets(&mut self, buffer: &TextBuffer) {
        for r in &mut self.rows {
            if let Some(bullet) = buffer.get_bullet_at_line(r.line) {
                r.bullet = bullet;
            }
        }
    }

    fn set_row_bullet(&mut self, buffer: &mut TextBuffer, row: usize, bullet: Bullet) {
        let r = &mut self.rows[row];
        if r.bullet != bullet {
            buffer.replace_bullet(r.line, bullet);
            r.bullet = bullet;
        }
    }

    /// Set the bullet of `row`.
    ///
    /// With checkbox propagation enabled, checking a box also checks its unchecked children,
    /// and the parent follows: unchecking a child unchecks the parent, and the parent gets
    /// checked once all its children are checked.
    pub fn set_bullet(&mut self, buffer: &mut TextBuffer, row: usize, bullet: Bullet) {
        if row >= self.rows.len() {
            return;
        }
        buffer.with_user_action(|buffer| {
            self.set_row_bullet(buffer, row, bullet);
            if let Bullet::Checkbox(state) = bullet
                && buffer.config().bullet_checkbox_propagation
            {
                self.checkbox_changed_down(buffer, row, state);
                self.checkbox_changed_up(buffer, row, state);
            }
        });
    }

    fn checkbox_changed_down(&mut self, buffer: &mut TextBuffer, row: usize, state: CheckState) {
        if !matches!(state, CheckState::Checked | CheckState::XChecked) {
            return;
        }
        for i in self.descendants(row) {
            if self.rows[i].bullet == Bullet::Checkbox(CheckState::Unchecked) {
                self.set_row_bullet(buffer, i, Bullet::Checkbox(state));
            }
        }
    }

    fn checkbox_changed_up(&mut self, buffer: &mut TextBuffer, row: usize, state: CheckState) {
        let Some(parent) = self.parent(row) else {
            return;
        };
        if !self.rows[parent].bullet.is_checkbox() {
            return;
        }
        match state {
            CheckState::Unchecked => {
                self.set_row_bullet(buffer, parent, Bullet::Checkbox(CheckState::Unchecked));
                self.checkbox_changed_up(buffer, parent, state);
            }
            CheckState::Checked => {
                let done = self
                    .children(parent)
                    .into_iter()
                    .all(|i| self.rows[i].bullet == Bullet::Checkbox(CheckState::Checked));
                if done {
                    self.set_row_bullet(buffer, parent, Bullet::Checkbox(CheckState::Checked));
                    self.checkbox_changed_up(buffer, parent, state);
                }
            }
            _ => {}
        }
    }
}

impl TextBuffer {
    /// Next list item at `level` before or after `line`, skipping deeper items.
    fn list_sibling(&self, line: usize, level: u32, backward: bool) -> Option<(usize, Bullet)> {
        let lines: Box<dyn Iterator<Item = usize>> = if backward {
            Box::new((0..line).rev())
        } else {
            Box::new(line + 1..self.line_count())
        };
        for l in lines {
            let bullet = self.get_bullet_at_line(l)?;
            let indent = self.get_indent_at_line(l);
            if indent > level {
                continue;
            }
            return (indent == level).then_some((l, bullet));
        }
        None
    }

    /// Nearest list item above `line` with an indent below `level`.
    fn list_parent(&self, line: usize, level: u32) -> Option<Bullet> {
        for l in (0..line).rev() {
            let bullet = self.get_bullet_at_line(l)?;
            if self.get_indent_at_line(l) < level {
                return Some(bullet);
            }
        }
        None
    }

    /// Renumber the run of numbered items at the level of `line`.
    ///
    /// The run keeps the value and style (numeric or alphabetic) of its first item.
    pub fn renumber_list(&mut self, line: usize) {
        let Some(Bullet::Numbered(_)) = self.get_bullet_at_line(line) else {
            return;
        };
        let level = self.get_indent_at_line(line);

        let mut first = line;
        while let Some((l, bullet)) = self.list_sibling(first, level, true) {
            if !bullet.is_numbered() {
                break;
            }
            first = l;
        }
        let Some(Bullet::Numbered(mut prev)) = self.get_bullet_at_line(first) else {
            return;
        };
        log::debug!("renumbering list from line {} at level {}", first, level);

        self.with_user_action(|buffer| {
            let mut current = first;
            while let Some((l, bullet)) = buffer.list_sibling(current, level, false) {
                let Bullet::Numbered(numeral) = bullet else {
                    break;
                };
                let Some(next) = prev.next() else {
                    break;
                };
                if numeral != next {
                    buffer.replace_bullet(l, Bullet::Numbered(next));
                }
                prev = next;
                current = l;
            }
        });
    }

    /// Fix numbering after the indent of `line` changed from `old_indent`.
    ///
    /// The line adopts the bullet style of its new siblings; a numbered item that starts a new
    /// sublist under a numbered parent switches between numbers and letters. Both the run the
    /// line left and the run it joined are renumbered. Checkbox items are never changed.
    pub fn renumber_list_after_indent(&mut self, line: usize, old_indent: u32) {
        let Some(bullet) = self.get_bullet_at_line(line) else {
            return;
        };
        if bullet.is_checkbox() {
            return;
        }
        let level = self.get_indent_at_line(line);

        let adopt = |b: Bullet, restart: bool| match b {
            Bullet::Numbered(n) if restart => Bullet::Numbered(n.first()),
            Bullet::Checkbox(_) => Bullet::Checkbox(CheckState::Unchecked),
            b => b,
        };
        let new_bullet = if let Some((_, prev)) = self.list_sibling(line, level, true) {
            adopt(prev, false)
        } else if let Some((_, next)) = self.list_sibling(line, level, false) {
            adopt(next, true)
        } else {
            match (bullet, self.list_parent(line, level)) {
                (Bullet::Numbered(_), Some(Bullet::Numbered(parent))) => {
                    if parent.is_numeric() {
                        Bullet::Numbered(Numeral::Lower('a'))
                    } else {
                        Bullet::Numbered(Numeral::Number(1))
                    }
                }
                _ => bullet,
            }
        };
        log::debug!(
            "renumber after indent: line {} from level {} to {}, bullet {} -> {}",
            line,
            old_indent,
            level,
            bullet,
            new_bullet
        );

        self.with_user_action(|buffer| {
            if new_bullet != bullet {
                buffer.replace_bullet(line, new_bullet);
            }
            buffer.renumber_list(line);

            if level > old_indent {
                // Close the gap in the run the line left
                let old_run = buffer
                    .list_sibling(line, old_indent, true)
                    .or_else(|| buffer.list_sibling(line, old_indent, false));
                if let Some((l, _)) = old_run {
                    buffer.renumber_list(l);
                }
            } else if level < old_indent {
                // Former siblings became children and start a new sublist
                let child = ((line + 1)..buffer.line_count())
                    .map_while(|l| {
                        buffer.get_bullet_at_line(l)?;
                        let indent = buffer.get_indent_at_line(l);
                        (indent > level).then_some((l, indent))
                    })
                    .find(|&(_, indent)| indent == old_indent);
                if let Some((l, _)) = child
                    && let Some(Bullet::Numbered(n)) = buffer.get_bullet_at_line(l)
                {
                    if n != n.first() {
                        buffer.replace_bullet(l, Bullet::Numbered(n.first()));
                    }
                    buffer.renumber_list(l);
                }
            }
        });
    }
}
