//! Line index of the buffer text.
//!
//! Wraps a [`Rope`] so that line lookups and edits stay `O(log N)`. All offsets are character
//! offsets; only `\n` counts as a line break.

use ropey::Rope;

/// Line and column of a character offset, both zero based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// Line number.
    pub line: usize,
    /// Character column within the line.
    pub column: usize,
}

impl Position {
    /// Create a position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Logical line index - implemented using Rope data structure
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    rope: Rope,
}

impl LineIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Build the index from text.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Number of characters.
    pub fn char_count(&self) -> usize {
        self.rope.len_chars()
    }

    /// Number of lines; text ending in a newline has an empty last line.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Offset of the first character of `line`, clamped to the end of the text.
    pub fn line_start(&self, line: usize) -> usize {
        if line >= self.line_count() {
            return self.char_count();
        }
        self.rope.line_to_char(line)
    }

    /// Offset of the end of `line`, before its newline.
    pub fn line_end(&self, line: usize) -> usize {
        if line + 1 >= self.line_count() {
            return self.char_count();
        }
        self.rope.line_to_char(line + 1) - 1
    }

    /// Offset of the start of the next line, or the end of the text for the last line.
    pub fn line_end_with_newline(&self, line: usize) -> usize {
        if line + 1 >= self.line_count() {
            return self.char_count();
        }
        self.rope.line_to_char(line + 1)
    }

    /// Line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.rope.char_to_line(offset.min(self.char_count()))
    }

    /// Character at `offset`.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        (offset < self.char_count()).then(|| self.rope.char(offset))
    }

    /// Text of `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.char_count());
        let start = start.min(end);
        self.rope.slice(start..end).to_string()
    }

    /// Text of `line` without its newline.
    pub fn line_text(&self, line: usize) -> String {
        self.slice(self.line_start(line), self.line_end(line))
    }

    /// Whole text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Insert `text` at `offset`.
    pub fn insert(&mut self, offset: usize, text: &str) {
        self.rope.insert(offset, text);
    }

    /// Remove `[start, end)`.
    pub fn remove(&mut self, start: usize, end: usize) {
        if start < end {
            self.rope.remove(start..end);
        }
    }

    /// Whether `offset` is the first character of a line.
    pub fn is_line_start(&self, offset: usize) -> bool {
        offset == 0 || self.char_at(offset - 1) == Some('\n')
    }

    /// Whether `offset` is at the end of a line (on its newline or at the end of the text).
    pub fn is_line_end(&self, offset: usize) -> bool {
        offset >= self.char_count() || self.char_at(offset) == Some('\n')
    }

    /// Convert an offset to a line and column.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.char_count());
        let line = self.rope.char_to_line(offset);
        Position::new(line, offset - self.rope.line_to_char(line))
    }

    /// Convert a line and column to an offset; the column is clamped to the line.
    pub fn position_to_offset(&self, position: Position) -> usize {
        if position.line >= self.line_count() {
            return self.char_count();
        }
        let start = self.line_start(position.line);
        (start + position.column).min(self.line_end(position.line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines() {
        let index = LineIndex::from_text("foo\nbar\n");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_start(1), 4);
        assert_eq!(index.line_end(1), 7);
        assert_eq!(index.line_end_with_newline(1), 8);
        assert_eq!(index.line_start(2), 8);
        assert_eq!(index.line_end(2), 8);
        assert_eq!(index.line_text(1), "bar");
        assert!(index.is_line_start(4));
        assert!(index.is_line_end(3));
        assert!(!index.is_line_end(2));
    }

    #[test]
    fn test_only_newline_breaks_lines() {
        let index = LineIndex::from_text("foo\rbar\u{2028}baz");
        assert_eq!(index.line_count(), 1);
    }

    #[test]
    fn test_positions() {
        let index = LineIndex::from_text("a\u{2022} b\ncd");
        assert_eq!(index.offset_to_position(5), Position::new(1, 0));
        assert_eq!(index.position_to_offset(Position::new(0, 10)), 4);
        assert_eq!(index.position_to_offset(Position::new(1, 1)), 6);
    }

    #[test]
    fn test_edit() {
        let mut index = LineIndex::new();
        index.insert(0, "hello\nworld");
        index.remove(2, 8);
        assert_eq!(index.text(), "herld");
        assert_eq!(index.char_at(1), Some('e'));
        assert_eq!(index.char_at(5), None);
    }
}
