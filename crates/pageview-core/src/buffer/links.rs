//! Link introspection.

use super::TextBuffer;
use crate::error::BufferResult;
use crate::tags::TagKind;

/// A link in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkData {
    /// Target; for dynamic links this is the link text.
    pub href: String,
    /// Link text.
    pub text: String,
    /// Start offset.
    pub start: usize,
    /// End offset.
    pub end: usize,
}

impl TextBuffer {
    /// The link at `offset`.
    ///
    /// When links overlap the outermost one is returned, which is also the one a dump keeps.
    pub fn get_link_data(&self, offset: usize) -> Option<LinkData> {
        let tag = self.outer_tag_at(offset, |k| matches!(k, TagKind::Link { .. }))?;
        let (start, end) = self.tag_extent(offset, tag);
        let text = self.get_slice(start, end);
        let href = match self.kind(tag) {
            TagKind::Link { href: Some(href) } => href.clone(),
            _ => text.clone(),
        };
        Some(LinkData {
            href,
            text,
            start,
            end,
        })
    }

    /// Select the link at the cursor and return it.
    pub fn select_link(&mut self) -> Option<LinkData> {
        let link = self.get_link_data(self.cursor())?;
        self.select_range(link.start, link.end);
        Some(link)
    }

    /// The link when the selection covers exactly one link.
    pub fn get_has_link_selection(&self) -> Option<LinkData> {
        let (start, end) = self.get_selection()?;
        self.get_link_data(start)
            .filter(|link| link.start == start && link.end == end)
    }

    /// Remove links from `range`, the selection or the link at the cursor.
    ///
    /// The text stays. Returns `false` when there was no link to remove.
    pub fn remove_link(&mut self, range: Option<(usize, usize)>) -> BufferResult<bool> {
        self.check_editable()?;
        let range = match range {
            Some((start, end)) => {
                self.check_range(start, end)?;
                Some((start, end))
            }
            None => self
                .get_selection()
                .or_else(|| self.get_link_data(self.cursor()).map(|l| (l.start, l.end))),
        };
        let Some((start, end)) = range else {
            return Ok(false);
        };
        let found = (start..end)
            .any(|i| self.find_tag_at(i, |k| matches!(k, TagKind::Link { .. })).is_some());
        if found {
            self.with_user_action(|buffer| {
                buffer.remove_tags_where(start, end, |k| matches!(k, TagKind::Link { .. }));
            });
        }
        Ok(found)
    }
}
