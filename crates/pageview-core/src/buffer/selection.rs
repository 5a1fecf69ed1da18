//! Word and line selection helpers.

use unicode_segmentation::UnicodeSegmentation;

use super::TextBuffer;

impl TextBuffer {
    /// Range of the word containing `offset`.
    ///
    /// Words follow Unicode word boundaries; whitespace and punctuation are not words.
    pub(crate) fn word_range_at(&self, offset: usize) -> Option<(usize, usize)> {
        if offset >= self.char_count() {
            return None;
        }
        let line = self.line_of(offset);
        let line_start = self.line_start(line);
        let col = offset - line_start;
        let text = self.get_line_text(line);

        let mut pos = 0;
        for segment in text.split_word_bounds() {
            let len = segment.chars().count();
            if col < pos + len {
                return segment
                    .chars()
                    .any(char::is_alphanumeric)
                    .then_some((line_start + pos, line_start + pos + len));
            }
            pos += len;
        }
        None
    }

    /// Select the word at the cursor; returns `false` when the cursor is not in a word.
    pub fn select_word(&mut self) -> bool {
        match self.word_range_at(self.cursor()) {
            Some((start, end)) => {
                self.select_range(start, end);
                true
            }
            None => false,
        }
    }

    /// Select a line including its newline; returns `false` for an empty last line.
    pub fn select_line(&mut self, line: usize) -> bool {
        if line >= self.line_count() {
            return false;
        }
        let start = self.line_start(line);
        let end = self.line_end_with_newline(line);
        if start == end {
            return false;
        }
        self.select_range(start, end);
        true
    }

    /// Extend the selection, or the cursor position, to whole lines.
    ///
    /// A selection ending at the start of a line does not take in that line. Returns `false`
    /// when the result is empty.
    pub fn select_lines_for_selection(&mut self) -> bool {
        let (start, end) = self
            .get_selection()
            .unwrap_or((self.cursor(), self.cursor()));
        let first = self.line_start(self.line_of(start));
        let last = if end > start && self.is_line_start(end) {
            end
        } else {
            self.line_end_with_newline(self.line_of(end))
        };
        if first == last {
            return false;
        }
        self.select_range(first, last);
        true
    }

    /// Shrink the selection to exclude whitespace at both ends.
    ///
    /// Returns `false` when nothing is selected. A selection of only whitespace collapses to
    /// its start.
    pub fn strip_selection(&mut self) -> bool {
        let Some((start, end)) = self.get_selection() else {
            return false;
        };
        let text: Vec<char> = self.get_slice(start, end).chars().collect();
        let lead = text.iter().take_while(|c| c.is_whitespace()).count();
        if lead == text.len() {
            self.place_cursor(start);
            return true;
        }
        let trail = text.iter().rev().take_while(|c| c.is_whitespace()).count();
        self.select_range(start + lead, end - trail);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn buffer_with(text: &str) -> TextBuffer {
        let mut buffer = TextBuffer::new();
        buffer.insert_text(0, text, false).unwrap();
        buffer.place_cursor(0);
        buffer
    }

    fn selected(buffer: &TextBuffer) -> Option<String> {
        buffer.get_selection().map(|(s, e)| buffer.get_slice(s, e))
    }

    #[rstest]
    #[case(6, Some((5, 8)))]
    #[case(0, Some((0, 4)))]
    #[case(4, None)]
    #[case(8, None)]
    #[case(10, Some((10, 13)))]
    #[case(14, None)]
    fn test_word_range_at(#[case] offset: usize, #[case] wanted: Option<(usize, usize)>) {
        let buffer = buffer_with("Test 123. foo\n");
        assert_eq!(buffer.word_range_at(offset), wanted);
    }

    #[test]
    fn test_select_word() {
        let mut buffer = buffer_with("Test 123. foo\n");
        buffer.place_cursor(6);
        assert!(buffer.select_word());
        assert_eq!(selected(&buffer).as_deref(), Some("123"));
        assert_eq!(buffer.cursor(), 5);

        assert!(buffer.select_word());
        assert_eq!(selected(&buffer).as_deref(), Some("123"));

        buffer.place_cursor(4);
        assert!(!buffer.select_word());
        assert!(!buffer.has_selection());
    }

    #[test]
    fn test_strip_selection() {
        let mut buffer = buffer_with("Test 123. foo\n");
        buffer.select_range(4, 10);
        assert_eq!(selected(&buffer).as_deref(), Some(" 123. "));
        assert!(buffer.strip_selection());
        assert_eq!(selected(&buffer).as_deref(), Some("123."));

        buffer.select_range(4, 5);
        assert!(buffer.strip_selection());
        assert!(!buffer.has_selection());
        assert_eq!(buffer.cursor(), 4);
    }

    #[test]
    fn test_select_lines() {
        let mut buffer = buffer_with("Test 123. foo\nline with spaces    \n\n");
        let line0 = Some("Test 123. foo\n");

        buffer.place_cursor(6);
        assert!(buffer.select_word());
        assert!(buffer.select_lines_for_selection());
        assert_eq!(selected(&buffer).as_deref(), line0);
        assert_eq!(buffer.cursor(), 0);

        assert!(buffer.select_lines_for_selection());
        assert_eq!(selected(&buffer).as_deref(), line0);

        buffer.place_cursor(6);
        assert!(buffer.select_lines_for_selection());
        assert_eq!(selected(&buffer).as_deref(), line0);

        buffer.place_cursor(buffer.line_start(3));
        assert!(!buffer.select_lines_for_selection());
        assert!(!buffer.has_selection());
    }

    #[test]
    fn test_select_line() {
        let mut buffer = buffer_with("foo\nbar");
        assert!(buffer.select_line(0));
        assert_eq!(selected(&buffer).as_deref(), Some("foo\n"));
        assert!(buffer.select_line(1));
        assert_eq!(selected(&buffer).as_deref(), Some("bar"));
        assert!(!buffer.select_line(2));
    }
}
