//! Find and replace.
//!
//! "Find" is a direct match of text in a buffer, as opposed to a search over many pages.
//! Every query compiles to a regular expression. The buffer keeps find state: the current
//! match is tagged and selected, and [`FindInterface::find_highlight_all`] tags every match
//! and remembers its query. The match tag disappears with the next edit or cursor move;
//! highlighting stays until cleared or until a call with a different query.
//!
//! Embedded objects take part through the same [`FindInterface`]: objects that wrap their own
//! searchable content get the calls passed through, other plugin objects match as a whole on
//! their data.
//!
//! All offsets are character offsets.

use std::fmt;

use regex::{Captures, Regex, RegexBuilder};

use crate::buffer::TextBuffer;
use crate::error::FindError;
use crate::objects::{OBJECT_CHAR, ObjectId};

/// Match case.
pub const FIND_CASE_SENSITIVE: u32 = 1;
/// Match whole words only.
pub const FIND_WHOLE_WORD: u32 = 2;
/// The query is a regular expression.
pub const FIND_REGEX: u32 = 4;

/// A find query: a string with `FIND_*` flags.
///
/// Queries compare equal when string and flags are equal.
#[derive(Clone)]
pub struct FindQuery {
    string: String,
    flags: u32,
    regex: Regex,
}

impl FindQuery {
    /// Compile a query.
    ///
    /// Without [`FIND_REGEX`] the string is matched literally. Matching ignores case unless
    /// [`FIND_CASE_SENSITIVE`] is set.
    pub fn new(string: &str, flags: u32) -> Result<Self, FindError> {
        let mut pattern = if flags & FIND_REGEX != 0 {
            string.to_string()
        } else {
            regex::escape(string)
        };
        if flags & FIND_WHOLE_WORD != 0 {
            pattern = format!(r"\b{}\b", pattern);
        }
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(flags & FIND_CASE_SENSITIVE == 0)
            .build()?;
        Ok(Self {
            string: string.to_string(),
            flags,
            regex,
        })
    }

    /// The query string.
    pub fn string(&self) -> &str {
        &self.string
    }

    /// The `FIND_*` flags.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Compiled pattern.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Whether the query string is empty.
    pub fn is_empty(&self) -> bool {
        self.string.is_empty()
    }

    /// Replacement text for a match.
    ///
    /// For regex queries group references in `replacement` are expanded: `\1`, `\g<1>` and
    /// `\g<name>`. An invalid template is logged and used literally.
    pub fn expand(&self, caps: &Captures<'_>, replacement: &str) -> String {
        if self.flags & FIND_REGEX == 0 {
            return replacement.to_string();
        }
        match convert_template(replacement, &self.regex) {
            Ok(template) => {
                let mut out = String::new();
                caps.expand(&template, &mut out);
                out
            }
            Err(err) => {
                log::warn!("error in regex expansion of {:?}: {}", replacement, err);
                replacement.to_string()
            }
        }
    }
}

impl PartialEq for FindQuery {
    fn eq(&self, other: &Self) -> bool {
        (&self.string, self.flags) == (&other.string, other.flags)
    }
}

impl Eq for FindQuery {}

impl fmt::Debug for FindQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindQuery")
            .field("string", &self.string)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Convert a backslash style replacement template to the `$` syntax of the regex crate.
fn convert_template(template: &str, regex: &Regex) -> Result<String, String> {
    let check_group = |name: &str| -> Result<String, String> {
        let known = match name.parse::<usize>() {
            Ok(n) => n < regex.captures_len(),
            Err(_) => regex.capture_names().flatten().any(|n| n == name),
        };
        if known {
            Ok(format!("${{{}}}", name))
        } else {
            Err(format!("invalid group reference {}", name))
        }
    };

    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.next() {
                Some(d) if d.is_ascii_digit() => {
                    let mut name = d.to_string();
                    if let Some(e) = chars.peek().copied().filter(char::is_ascii_digit) {
                        name.push(e);
                        chars.next();
                    }
                    out.push_str(&check_group(&name)?);
                }
                Some('g') => {
                    if chars.next() != Some('<') {
                        return Err("missing < after \\g".to_string());
                    }
                    let name: String = chars.by_ref().take_while(|c| *c != '>').collect();
                    if name.is_empty() {
                        return Err("missing group name".to_string());
                    }
                    out.push_str(&check_group(&name)?);
                }
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => return Err(format!("bad escape \\{}", other)),
                None => return Err("trailing backslash".to_string()),
            },
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Highlight state of a plugin object without searchable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FindState(u8);

impl FindState {
    /// The object is the current match.
    pub const HAS_MATCH: FindState = FindState(1);
    /// The object is highlighted as one of all matches.
    pub const HAS_HIGHLIGHT: FindState = FindState(2);

    /// No state.
    pub const fn empty() -> Self {
        FindState(0)
    }

    /// Whether all bits of `other` are set.
    pub const fn contains(self, other: FindState) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub const fn with(self, other: FindState) -> Self {
        FindState(self.0 | other.0)
    }

    /// Clear the bits of `other`.
    pub const fn without(self, other: FindState) -> Self {
        FindState(self.0 & !other.0)
    }

    /// Whether no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A match in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMatch {
    /// Text match, `[start, end)`.
    Text {
        /// Start offset.
        start: usize,
        /// End offset.
        end: usize,
    },
    /// Match inside or on an embedded object.
    Object(ObjectId),
}

/// Find operations implemented by buffers and embedded objects.
///
/// Implementations keep state between calls: the current match and the query of the last
/// [`find_highlight_all`](Self::find_highlight_all). Calls with another query than the
/// highlighted one clear the highlighting.
pub trait FindInterface {
    /// Go to the next match and mark it.
    ///
    /// A match at the cursor is only taken when it is not already the current match. With
    /// `wrap` the search continues from the start.
    fn find_next(&mut self, query: &FindQuery, wrap: bool) -> bool;

    /// Go to the previous match and mark it.
    fn find_previous(&mut self, query: &FindQuery, wrap: bool) -> bool;

    /// Highlight all matches and remember the query.
    fn find_highlight_all(&mut self, query: &FindQuery);

    /// Clear the current match and all highlighting.
    fn find_clear(&mut self);

    /// Replace the match starting at the cursor; fails when there is none.
    fn find_replace_at_cursor(&mut self, query: &FindQuery, replacement: &str) -> bool;

    /// Replace all matches; returns whether anything was replaced.
    fn find_replace_all(&mut self, query: &FindQuery, replacement: &str) -> bool;
}

/// Text match or object found in a range.
#[derive(Debug)]
enum Hit {
    Text {
        start: usize,
        end: usize,
        replacement: Option<String>,
    },
    Object {
        offset: usize,
        id: ObjectId,
    },
}

impl Hit {
    fn start(&self) -> usize {
        match self {
            Hit::Text { start, .. } => *start,
            Hit::Object { offset, .. } => *offset,
        }
    }
}

#[derive(Debug)]
struct CharIndex {
    char_to_byte: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self { char_to_byte }
    }

    fn char_to_byte(&self, offset: usize) -> usize {
        let last = self.char_to_byte.len() - 1;
        self.char_to_byte[offset.min(last)]
    }

    fn byte_to_char(&self, byte: usize) -> usize {
        match self.char_to_byte.binary_search(&byte) {
            Ok(idx) | Err(idx) => idx,
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

impl TextBuffer {
    fn is_word_at(&self, offset: usize) -> bool {
        self.char_at(offset).is_some_and(is_word_char)
    }

    fn inside_word(&self, offset: usize) -> bool {
        offset > 0 && self.is_word_at(offset - 1) && self.is_word_at(offset)
    }

    /// All text matches and embedded objects in `[start, end)`, in order.
    ///
    /// Objects are reported without checking whether they match. Text matches never span an
    /// object. When `replacement` is given text hits carry the expanded replacement.
    fn find_all_in_range(
        &self,
        query: &FindQuery,
        mut start: usize,
        mut end: usize,
        replacement: Option<&str>,
    ) -> Vec<Hit> {
        if query.flags() & FIND_WHOLE_WORD != 0 {
            if self.inside_word(start) {
                while self.is_word_at(start) {
                    start += 1;
                }
            }
            if self.inside_word(end) {
                while end > start && self.is_word_at(end - 1) {
                    end -= 1;
                }
            }
        }
        let mut hits = Vec::new();
        if start >= end {
            return hits;
        }

        let text = self.get_slice(start, end);
        let index = CharIndex::new(&text);
        let mut segments: Vec<(usize, Option<(usize, ObjectId)>)> = text
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == OBJECT_CHAR)
            .filter_map(|(i, _)| self.object_id_at(start + i).map(|id| (i, Some((start + i, id)))))
            .collect();
        segments.push((index.char_to_byte.len() - 1, None));

        let mut pos = 0;
        for (endpos, object) in segments {
            let haystack = &text[..index.char_to_byte(endpos)];
            let mut at = index.char_to_byte(pos);
            while at <= haystack.len() {
                let Some(caps) = query.regex().captures_at(haystack, at) else {
                    break;
                };
                let Some(m) = caps.get(0) else {
                    break;
                };
                if m.is_empty() {
                    // Skip empty matches, step one character
                    at = haystack[m.end()..]
                        .chars()
                        .next()
                        .map_or(haystack.len() + 1, |c| m.end() + c.len_utf8());
                    continue;
                }
                hits.push(Hit::Text {
                    start: start + index.byte_to_char(m.start()),
                    end: start + index.byte_to_char(m.end()),
                    replacement: replacement.map(|r| query.expand(&caps, r)),
                });
                at = m.end();
            }
            if let Some((offset, id)) = object
                && self.object(id).is_searchable()
            {
                hits.push(Hit::Object { offset, id });
            }
            pos = endpos + 1;
        }
        hits
    }

    fn match_at_cursor(&self) -> bool {
        let cursor = self.cursor();
        let tag = self.find.match_tag;
        self.has_tag(cursor, tag) && (cursor == 0 || !self.has_tag(cursor - 1, tag))
    }

    fn clear_match(&mut self) {
        self.find.match_live = false;
        let tag = self.find.match_tag;
        self.remove_tag_raw(tag, 0, self.char_count());
    }

    fn clear_on_new_query(&mut self, query: &FindQuery) {
        if self
            .find
            .highlight_query
            .as_ref()
            .is_some_and(|q| q != query)
        {
            self.find_clear();
        } else {
            self.clear_match();
        }
    }

    fn set_match(&mut self, start: usize, end: usize) {
        self.select_range(start, end);
        let tag = self.find.match_tag;
        self.apply_tag_raw(tag, start, end);
        self.find.match_live = true;
        log::debug!("find match at {}..{}", start, end);
    }

    fn take_hit(&mut self, hits: Vec<Hit>, query: &FindQuery, forward: bool) -> bool {
        for hit in hits {
            match hit {
                Hit::Text { start, end, .. } => {
                    self.set_match(start, end);
                    return true;
                }
                Hit::Object { offset, id } => {
                    // Nested content does not wrap, so the search can move past the object
                    let object = self.object_mut(id);
                    let found = if forward {
                        object.find_next(query, false)
                    } else {
                        object.find_previous(query, false)
                    };
                    if found {
                        self.place_cursor(offset);
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Take the last hit in `[lower, upper)`.
    ///
    /// Searches windows of whole lines ending at `upper`, doubling the number of lines each
    /// round, and only tries hits that start before the previous window. A match spanning
    /// lines is found once a window contains all of it.
    fn find_backward(&mut self, query: &FindQuery, lower: usize, upper: usize) -> bool {
        let mut boundary = upper;
        let mut lines = 1;
        while boundary > lower {
            let last_line = self.line_of(boundary - 1);
            let first_line = last_line.saturating_sub(lines - 1);
            let window_start = self.line_start(first_line).max(lower);
            let mut hits = self.find_all_in_range(query, window_start, upper, None);
            hits.retain(|hit| hit.start() < boundary);
            hits.reverse();
            if self.take_hit(hits, query, false) {
                return true;
            }
            boundary = window_start;
            lines *= 2;
        }
        false
    }

    /// Replace `[start, end)` keeping the formatting of the replaced text.
    fn replace_range(&mut self, start: usize, end: usize, text: &str) {
        let tags = self.common_tags(start, end);
        self.delete_raw(start, end);
        self.insert_with_tags(start, text, &tags);
    }

    /// The current match.
    pub fn find_match(&self) -> Option<FindMatch> {
        let tag = self.find.match_tag;
        if let Some(start) = (0..self.char_count()).find(|i| self.has_tag(*i, tag)) {
            let (start, end) = self.tag_extent(start, tag);
            return Some(FindMatch::Text { start, end });
        }
        self.list_objects()
            .into_iter()
            .find(|(_, id)| self.object(*id).find_state().contains(FindState::HAS_MATCH))
            .map(|(_, id)| FindMatch::Object(id))
    }

    /// All highlighted matches, in order.
    pub fn find_highlights(&self) -> Vec<FindMatch> {
        let tag = self.find.highlight_tag;
        let objects = self.list_objects();
        let mut matches = Vec::new();
        let mut offset = 0;
        while offset < self.char_count() {
            if self.has_tag(offset, tag) {
                let (start, end) = self.tag_extent(offset, tag);
                matches.push(FindMatch::Text { start, end });
                offset = end;
                continue;
            }
            if let Some((_, id)) = objects.iter().find(|(o, _)| *o == offset)
                && self.object(*id).find_state().contains(FindState::HAS_HIGHLIGHT)
            {
                matches.push(FindMatch::Object(*id));
            }
            offset += 1;
        }
        matches
    }
}

impl FindInterface for TextBuffer {
    fn find_next(&mut self, query: &FindQuery, wrap: bool) -> bool {
        let count = self.char_count();
        let mut from = self.cursor();
        if self.match_at_cursor() {
            from = (from + 1).min(count);
        }
        self.clear_on_new_query(query);
        if query.is_empty() {
            return false;
        }

        let mut hits = self.find_all_in_range(query, from, count, None);
        if wrap {
            hits.extend(self.find_all_in_range(query, 0, from, None));
        }
        self.take_hit(hits, query, true)
    }

    fn find_previous(&mut self, query: &FindQuery, wrap: bool) -> bool {
        self.clear_on_new_query(query);
        if query.is_empty() {
            return false;
        }

        let cursor = self.cursor();
        self.find_backward(query, 0, cursor)
            || (wrap && self.find_backward(query, cursor, self.char_count()))
    }

    fn find_highlight_all(&mut self, query: &FindQuery) {
        self.find_clear();
        if query.is_empty() {
            return;
        }
        self.find.highlight_query = Some(query.clone());
        let tag = self.find.highlight_tag;
        for hit in self.find_all_in_range(query, 0, self.char_count(), None) {
            match hit {
                Hit::Text { start, end, .. } => self.apply_tag_raw(tag, start, end),
                Hit::Object { id, .. } => self.object_mut(id).find_highlight_all(query),
            }
        }
    }

    fn find_clear(&mut self) {
        self.clear_match();
        let tag = self.find.highlight_tag;
        self.remove_tag_raw(tag, 0, self.char_count());
        self.find.highlight_query = None;
        for (_, id) in self.list_objects() {
            self.object_mut(id).find_clear();
        }
    }

    fn find_replace_at_cursor(&mut self, query: &FindQuery, replacement: &str) -> bool {
        self.clear_on_new_query(query);
        if query.is_empty() || !self.config().editable {
            return false;
        }
        let cursor = self.cursor();
        let line_end = self.line_end(self.line_of(cursor));
        let hit = self
            .find_all_in_range(query, cursor, line_end, Some(replacement))
            .into_iter()
            .next();
        match hit {
            Some(Hit::Object { offset, id }) if offset == cursor => {
                self.object_mut(id).find_replace_at_cursor(query, replacement)
            }
            Some(Hit::Text {
                start,
                end,
                replacement: Some(text),
            }) if start == cursor => {
                self.with_user_action(|buffer| buffer.replace_range(start, end, &text));
                self.select_range(start, start + text.chars().count());
                true
            }
            _ => false,
        }
    }

    fn find_replace_all(&mut self, query: &FindQuery, replacement: &str) -> bool {
        self.clear_on_new_query(query);
        if query.is_empty() || !self.config().editable {
            return false;
        }
        let mut replaced = false;
        let mut texts = Vec::new();
        for hit in self.find_all_in_range(query, 0, self.char_count(), Some(replacement)) {
            match hit {
                Hit::Object { id, .. } => {
                    replaced |= self.object_mut(id).find_replace_all(query, replacement);
                }
                Hit::Text {
                    start,
                    end,
                    replacement,
                } => texts.push((start, end, replacement.unwrap_or_default())),
            }
        }
        if !texts.is_empty() {
            log::debug!("replacing {} matches of {:?}", texts.len(), query.string());
            self.with_user_action(|buffer| {
                for (start, end, text) in texts.into_iter().rev() {
                    buffer.replace_range(start, end, &text);
                }
            });
            replaced = true;
        }
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectModel;
    use pageview_core_parse::attrib;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const TEXT: &str = "Some text here\nWord words words\n\nSome more text in this textbuffer\n\nTEXT test text\n";

    fn buffer_with(text: &str) -> TextBuffer {
        let mut buffer = TextBuffer::new();
        buffer.insert_text(0, text, false).unwrap();
        buffer.clear_undo_stack();
        buffer.place_cursor(0);
        buffer
    }

    fn query(string: &str, flags: u32) -> FindQuery {
        FindQuery::new(string, flags).unwrap()
    }

    /// Line, column and text of the selection, checking that it is the find match.
    fn match_position(buffer: &TextBuffer) -> (usize, usize, String) {
        let (start, end) = buffer.get_selection().unwrap();
        assert_eq!(buffer.cursor(), start);
        assert_eq!(buffer.find_match(), Some(FindMatch::Text { start, end }));
        let pos = buffer.offset_to_position(start);
        (pos.line, pos.column, buffer.get_slice(start, end))
    }

    fn highlight_positions(buffer: &TextBuffer) -> Vec<(usize, usize)> {
        buffer
            .find_highlights()
            .into_iter()
            .filter_map(|m| match m {
                FindMatch::Text { start, .. } => {
                    let pos = buffer.offset_to_position(start);
                    Some((pos.line, pos.column))
                }
                FindMatch::Object(_) => None,
            })
            .collect()
    }

    fn owned(wanted: &[(usize, usize, &str)]) -> Vec<(usize, usize, String)> {
        wanted.iter().map(|(l, c, t)| (*l, *c, t.to_string())).collect()
    }

    #[rstest]
    #[case(0, r"test\*", "TEST*", "test")]
    #[case(FIND_CASE_SENSITIVE, r"test\*", "test*", "Test*")]
    #[case(FIND_CASE_SENSITIVE | FIND_REGEX, "test*", "testtt", "Test")]
    #[case(FIND_CASE_SENSITIVE | FIND_REGEX | FIND_WHOLE_WORD, r"\btest*\b", "a test b", "a testing b")]
    #[case(FIND_REGEX, "test*", "TESTT", "tst")]
    #[case(FIND_REGEX | FIND_WHOLE_WORD, r"\btest*\b", "A TEST", "TESTING")]
    #[case(FIND_WHOLE_WORD, r"\btest\*\b", "the test*x", "test*")]
    #[case(FIND_WHOLE_WORD | FIND_CASE_SENSITIVE, r"\btest\*\b", "test*x", "Test*x")]
    fn test_find_query(#[case] flags: u32, #[case] pattern: &str, #[case] matching: &str, #[case] other: &str) {
        let q = query("test*", flags);
        assert_eq!(q.string(), "test*");
        assert_eq!(q.flags(), flags);
        assert_eq!(q.regex().as_str(), pattern);
        assert!(q.regex().is_match(matching));
        assert!(!q.regex().is_match(other));
        assert_eq!(query("test*", flags), q);
    }

    #[test]
    fn test_query_equality_and_errors() {
        assert_ne!(query("foo", 0), query("foo", FIND_CASE_SENSITIVE));
        assert!(query("", 0).is_empty());
        assert!(FindQuery::new("(foo", FIND_REGEX).is_err());
        assert!(FindQuery::new("(foo", 0).is_ok());
    }

    #[rstest]
    #[case("my\\1", "my${1}")]
    #[case("\\g<1>-\\g<word>", "${1}-${word}")]
    #[case("cost $5", "cost $$5")]
    #[case("a\\\\b\\n", "a\\b\n")]
    fn test_convert_template(#[case] template: &str, #[case] wanted: &str) {
        let regex = Regex::new(r"(?P<word>\w+)").unwrap();
        assert_eq!(convert_template(template, &regex).unwrap(), wanted);
    }

    #[test]
    fn test_invalid_template_is_literal() {
        let regex = Regex::new(r"(\w+)").unwrap();
        assert!(convert_template("\\2", &regex).is_err());
        assert!(convert_template("\\g<name>", &regex).is_err());
        assert!(convert_template("\\q", &regex).is_err());

        let mut buffer = buffer_with("foo bar\n");
        assert!(buffer.find_replace_all(&query(r"(\w+)", FIND_REGEX), "<\\2>"));
        assert_eq!(buffer.get_text(), "<\\2> <\\2>\n");
    }

    #[test]
    fn test_find_next_cycle() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        buffer.place_cursor(buffer.line_start(2));
        let mut found = Vec::new();
        for _ in 0..5 {
            assert!(buffer.find_next(&q, true));
            found.push(match_position(&buffer));
        }
        assert_eq!(
            found,
            owned(&[(3, 10, "text"), (5, 0, "TEXT"), (5, 10, "text"), (0, 5, "text"), (3, 10, "text")])
        );
    }

    #[test]
    fn test_find_next_match_at_cursor() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        buffer.place_cursor(buffer.line_start(2));

        assert!(buffer.find_next(&q, true));
        assert_eq!(match_position(&buffer), (3, 10, "text".to_string()));
        buffer.find_clear();
        assert!(buffer.find_next(&q, true));
        assert_eq!(match_position(&buffer), (3, 10, "text".to_string()));
        assert!(buffer.find_next(&q, true));
        assert_eq!(match_position(&buffer), (5, 0, "TEXT".to_string()));
    }

    #[test]
    fn test_find_previous_cycle() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        buffer.place_cursor(buffer.line_start(2));
        let mut found = Vec::new();
        for _ in 0..5 {
            assert!(buffer.find_previous(&q, true));
            found.push(match_position(&buffer));
        }
        assert_eq!(
            found,
            owned(&[(0, 5, "text"), (5, 10, "text"), (5, 0, "TEXT"), (3, 10, "text"), (0, 5, "text")])
        );
    }

    #[test]
    fn test_find_without_wrap() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        buffer.place_cursor(buffer.line_start(5) + 5);
        assert!(buffer.find_next(&q, false));
        assert_eq!(match_position(&buffer), (5, 10, "text".to_string()));
        assert!(!buffer.find_next(&q, false));
        assert_eq!(buffer.find_match(), None);
    }

    #[test]
    fn test_highlight_all() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        let all = vec![(0, 5), (3, 10), (5, 0), (5, 10)];
        assert_eq!(highlight_positions(&buffer), vec![]);
        buffer.find_highlight_all(&q);
        assert_eq!(highlight_positions(&buffer), all);

        buffer.place_cursor(40);
        buffer.find_highlight_all(&q);
        assert_eq!(highlight_positions(&buffer), all);

        buffer.find_clear();
        assert_eq!(highlight_positions(&buffer), vec![]);
        buffer.find_clear();
        assert_eq!(highlight_positions(&buffer), vec![]);
        assert_eq!(buffer.find_match(), None);
    }

    #[test]
    fn test_new_query_clears_highlight() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        let all = vec![(0, 5), (3, 10), (5, 0), (5, 10)];

        buffer.find_highlight_all(&q);
        buffer.find_next(&q, true);
        assert_eq!(highlight_positions(&buffer), all);
        buffer.find_previous(&q, true);
        assert_eq!(highlight_positions(&buffer), all);

        let other = query("word", 0);
        assert!(buffer.find_next(&other, true));
        assert_eq!(highlight_positions(&buffer), vec![]);

        buffer.find_highlight_all(&q);
        assert_eq!(highlight_positions(&buffer), all);
        buffer.find_previous(&other, true);
        assert_eq!(highlight_positions(&buffer), vec![]);
    }

    #[test]
    fn test_match_cleared_by_edit_and_cursor_move() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        assert!(buffer.find_next(&q, true));
        assert!(buffer.find_match().is_some());
        buffer.place_cursor(0);
        assert_eq!(buffer.find_match(), None);

        assert!(buffer.find_next(&q, true));
        buffer.insert_text(0, "x", false).unwrap();
        assert_eq!(buffer.find_match(), None);
        // Find tags are not part of the undo history
        assert!(buffer.undo());
        assert_eq!(buffer.get_text(), TEXT);
        assert!(!buffer.can_undo());
    }

    #[test]
    fn test_replace_at_cursor() {
        let mut buffer = buffer_with(TEXT);
        let q = query("text", FIND_WHOLE_WORD);
        buffer.place_cursor(buffer.line_start(2));
        assert!(!buffer.find_replace_at_cursor(&q, "mytext"));
        assert_eq!(buffer.get_text(), TEXT);

        assert!(buffer.find_next(&q, true));
        assert!(buffer.find_replace_at_cursor(&q, "mytext"));
        assert_eq!(
            buffer.get_text(),
            "Some text here\nWord words words\n\nSome more mytext in this textbuffer\n\nTEXT test text\n"
        );
        let (start, end) = buffer.get_selection().unwrap();
        assert_eq!(buffer.get_slice(start, end), "mytext");

        assert!(buffer.undo());
        assert_eq!(buffer.get_text(), TEXT);
    }

    #[test]
    fn test_replace_all_with_groups() {
        let mut buffer = buffer_with(TEXT);
        let q = query("(text)", FIND_WHOLE_WORD | FIND_REGEX);
        assert!(buffer.find_replace_all(&q, "my\\1"));
        assert_eq!(
            buffer.get_text(),
            "Some mytext here\nWord words words\n\nSome more mytext in this textbuffer\n\nmyTEXT test mytext\n"
        );
        assert!(buffer.undo());
        assert_eq!(buffer.get_text(), TEXT);

        assert!(!buffer.find_replace_all(&query("nothing", 0), "x"));
    }

    #[test]
    fn test_replace_keeps_formatting() {
        let mut buffer = buffer_with("foo bar\n");
        buffer
            .apply_tag(crate::tags::TagKind::Style(crate::tags::InlineStyle::Strong), 4, 7)
            .unwrap();
        assert!(buffer.find_replace_all(&query("bar", 0), "baz"));
        assert_eq!(buffer.get_text(), "foo baz\n");
        assert!(buffer.get_tags_at(5).iter().any(|k| k.element().0 == "strong"));
    }

    #[test]
    fn test_find_options() {
        let mut buffer = buffer_with("FOO FooBar FOOBAR\nFooBaz Foo Bar\nfoo Bar Baz Foo\n");
        let selected = |buffer: &TextBuffer| {
            let (start, end) = buffer.get_selection().unwrap();
            let pos = buffer.offset_to_position(start);
            (pos.line, pos.column, buffer.get_slice(start, end))
        };

        for text in ["f", "fo", "foo", "fo", "f", "F", "Fo", "Foo"] {
            assert!(buffer.find_next(&query(text, 0), true));
            assert_eq!(selected(&buffer), (0, 0, text.to_uppercase()));
            buffer.find_clear();
        }

        assert!(!buffer.find_next(&query("Grr", 0), true));
        assert_eq!(buffer.cursor(), 0);

        let foob = query("Foob", 0);
        assert!(buffer.find_next(&foob, true));
        assert_eq!(selected(&buffer), (0, 4, "FooB".to_string()));
        for wanted in [(0, 11, "FOOB"), (1, 0, "FooB"), (0, 4, "FooB")] {
            assert!(buffer.find_next(&foob, true));
            assert_eq!(selected(&buffer), (wanted.0, wanted.1, wanted.2.to_string()));
        }
        for wanted in [(1, 0, "FooB"), (0, 11, "FOOB"), (0, 4, "FooB")] {
            assert!(buffer.find_previous(&foob, true));
            assert_eq!(selected(&buffer), (wanted.0, wanted.1, wanted.2.to_string()));
        }

        buffer.find_clear();
        let case = query("Foo", FIND_CASE_SENSITIVE);
        assert!(buffer.find_next(&case, true));
        assert_eq!(selected(&buffer), (0, 4, "Foo".to_string()));
        for wanted in [(1, 0), (1, 7), (2, 12), (0, 4)] {
            assert!(buffer.find_next(&case, true));
            assert_eq!(selected(&buffer), (wanted.0, wanted.1, "Foo".to_string()));
        }

        buffer.find_clear();
        let word = query("Foo", FIND_WHOLE_WORD);
        assert!(buffer.find_next(&word, true));
        assert_eq!(selected(&buffer), (1, 7, "Foo".to_string()));
        for wanted in [(2, 0, "foo"), (2, 12, "Foo"), (0, 0, "FOO"), (1, 7, "Foo")] {
            assert!(buffer.find_next(&word, true));
            assert_eq!(selected(&buffer), (wanted.0, wanted.1, wanted.2.to_string()));
        }

        buffer.find_clear();
        let regex = query(r"Foo\s*Bar", FIND_REGEX | FIND_CASE_SENSITIVE);
        assert!(buffer.find_next(&regex, true));
        assert_eq!(selected(&buffer), (1, 7, "Foo Bar".to_string()));
        assert!(buffer.find_next(&regex, true));
        assert_eq!(selected(&buffer), (0, 4, "FooBar".to_string()));
    }

    fn buffer_with_object(data: &str) -> (TextBuffer, ObjectId) {
        let mut buffer = buffer_with("Some text\n\nmore text\n");
        let id = buffer
            .insert_object(
                10,
                attrib([("type", "code")]),
                ObjectModel::Simple {
                    data: Some(data.to_string()),
                },
            )
            .unwrap();
        buffer.place_cursor(0);
        (buffer, id)
    }

    #[test]
    fn test_find_simple_object() {
        let (mut buffer, id) = buffer_with_object("print('text')\n");
        let q = query("text", FIND_WHOLE_WORD);

        assert!(buffer.find_next(&q, true));
        assert_eq!(match_position(&buffer), (0, 5, "text".to_string()));
        assert!(buffer.find_next(&q, true));
        assert_eq!(buffer.cursor(), 10);
        assert!(!buffer.has_selection());
        assert_eq!(buffer.find_match(), Some(FindMatch::Object(id)));
        assert!(buffer.find_next(&q, true));
        assert_eq!(match_position(&buffer), (2, 5, "text".to_string()));
        assert_eq!(buffer.object(id).find_state(), FindState::empty());

        buffer.find_highlight_all(&q);
        assert_eq!(buffer.find_highlights().len(), 3);
        assert_eq!(buffer.find_highlights()[1], FindMatch::Object(id));
        buffer.find_clear();
        assert_eq!(buffer.find_highlights(), vec![]);
        assert_eq!(buffer.object(id).find_state(), FindState::empty());
    }

    #[test]
    fn test_replace_skips_simple_object() {
        let (mut buffer, id) = buffer_with_object("text");
        assert!(buffer.find_replace_all(&query("text", 0), "word"));
        assert_eq!(buffer.get_text(), "Some word\n\u{FFFC}\nmore word\n");
        assert_eq!(buffer.object_id_at(10), Some(id));
    }

    #[test]
    fn test_find_nested_buffer() {
        let inner = buffer_with("nested text\n");
        let mut buffer = buffer_with("Some text\n\nmore text\n");
        let id = buffer
            .insert_object(10, attrib([("type", "nested")]), ObjectModel::Searchable(Box::new(inner)))
            .unwrap();
        buffer.place_cursor(0);
        let q = query("text", 0);

        assert!(buffer.find_next(&q, true));
        assert_eq!(match_position(&buffer), (0, 5, "text".to_string()));
        assert!(buffer.find_next(&q, true));
        assert_eq!(buffer.cursor(), 10);
        assert!(buffer.find_next(&q, true));
        assert_eq!(match_position(&buffer), (2, 5, "text".to_string()));

        assert!(buffer.find_replace_all(&q, "word"));
        assert_eq!(buffer.get_text(), "Some word\n\u{FFFC}\nmore word\n");
        assert_eq!(buffer.object_id_at(10), Some(id));
    }

    #[test]
    fn test_find_previous_across_nested_buffer() {
        let mut inner = buffer_with("nested text\n");
        inner.place_cursor(inner.char_count());
        let mut buffer = buffer_with("Some text\n\nmore text\n");
        buffer
            .insert_object(10, attrib([("type", "nested")]), ObjectModel::Searchable(Box::new(inner)))
            .unwrap();
        buffer.place_cursor(buffer.char_count());
        let q = query("text", 0);

        assert!(buffer.find_previous(&q, true));
        assert_eq!(match_position(&buffer), (2, 5, "text".to_string()));
        assert!(buffer.find_previous(&q, true));
        assert_eq!(buffer.cursor(), 10);
        assert!(!buffer.has_selection());
        assert!(buffer.find_previous(&q, true));
        assert_eq!(match_position(&buffer), (0, 5, "text".to_string()));
        assert!(!buffer.find_previous(&q, false));
        assert!(buffer.find_previous(&q, true));
        assert_eq!(match_position(&buffer), (2, 5, "text".to_string()));
    }

    #[test]
    fn test_find_previous_far_back_and_across_lines() {
        let mut text = String::from("foo\nbar\n");
        for _ in 0..40 {
            text.push_str("filler line\n");
        }
        let mut buffer = buffer_with(&text);
        buffer.place_cursor(buffer.char_count());

        let q = query("foo\nbar", FIND_REGEX);
        assert!(buffer.find_previous(&q, false));
        assert_eq!(match_position(&buffer), (0, 0, "foo\nbar".to_string()));

        let q = query("filler", 0);
        buffer.place_cursor(buffer.line_start(3) + 2);
        assert!(buffer.find_previous(&q, false));
        assert_eq!(match_position(&buffer).0, 2);
        assert!(!buffer.find_previous(&q, false));
    }
}
