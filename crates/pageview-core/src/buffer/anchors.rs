//! Anchors: named positions that links can point to.
//!
//! Explicit anchors are anchor objects and images or plugin objects with an `id`. Every
//! heading is also an implicit anchor named after its text.

use super::TextBuffer;
use crate::objects::{OBJECT_CHAR, ObjectKind};

/// Implicit anchor name of a heading: lower case, blanks become `-`, and only word
/// characters, `-` and `_` are kept.
pub fn heading_to_anchor(text: &str) -> String {
    text.replace(OBJECT_CHAR, "")
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

impl TextBuffer {
    /// Name of the explicit anchor at `offset`.
    fn anchor_name_at(&self, offset: usize) -> Option<String> {
        match &self.object_at(offset)?.kind {
            ObjectKind::Anchor(name) => Some(name.clone()),
            ObjectKind::Image(attrib) | ObjectKind::Object { attrib, .. } => {
                attrib.get("id").and_then(|v| v.as_str()).map(str::to_string)
            }
            _ => None,
        }
        .filter(|name| !name.is_empty())
    }

    /// Offset of the anchor called `name`.
    ///
    /// Explicit anchors are found first, then headings whose implicit anchor matches.
    pub fn find_anchor(&self, name: &str) -> Option<usize> {
        let explicit = self
            .list_objects()
            .into_iter()
            .map(|(offset, _)| offset)
            .find(|&offset| self.anchor_name_at(offset).as_deref() == Some(name));
        explicit.or_else(|| {
            (0..self.line_count())
                .filter(|&line| self.get_heading_level_at_line(line).is_some())
                .find(|&line| heading_to_anchor(&self.get_line_text(line)) == name)
                .map(|line| self.line_start(line))
        })
    }

    /// Anchor name to link to `offset`.
    ///
    /// Picks the explicit anchor on the line of `offset` closest to it. On a heading line
    /// without explicit anchors the implicit heading anchor is used.
    pub fn get_anchor_for_location(&self, offset: usize) -> Option<String> {
        let line = self.line_of(offset.min(self.char_count()));
        let (start, end) = (self.line_start(line), self.line_end(line));
        let nearest = (start..end)
            .filter_map(|i| self.anchor_name_at(i).map(|name| (i.abs_diff(offset), name)))
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, name)| name);
        nearest.or_else(|| {
            self.get_heading_level_at_line(line)?;
            let anchor = heading_to_anchor(&self.get_line_text(line));
            (!anchor.is_empty()).then_some(anchor)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageview_core_parse::{Element, attrib};
    use rstest::rstest;

    fn buffer_from(body: &str) -> TextBuffer {
        let tree = Element::from_xml(&format!("<zim-tree>{}</zim-tree>", body)).unwrap();
        TextBuffer::from_tree(&tree).unwrap()
    }

    #[rstest]
    #[case("Title", "title")]
    #[case("  foo bar ", "foo-bar")]
    #[case("Über (draft) v2", "über-draft-v2")]
    #[case("snake_case-name", "snake_case-name")]
    fn test_heading_to_anchor(#[case] text: &str, #[case] wanted: &str) {
        assert_eq!(heading_to_anchor(text), wanted);
    }

    #[test]
    fn test_find_explicit_anchor() {
        assert_eq!(TextBuffer::new().find_anchor("test"), None);
        let buffer = buffer_from("Some text <anchor name=\"test\" />\n");
        assert_eq!(buffer.find_anchor("test"), Some(10));
        assert_eq!(buffer.find_anchor("other"), None);
    }

    #[test]
    fn test_find_image_and_object_anchor() {
        let mut buffer = TextBuffer::new();
        buffer
            .insert_image(0, attrib([("src", "./globe.png"), ("id", "image:globe")]))
            .unwrap();
        assert_eq!(buffer.find_anchor("image:globe"), Some(0));

        let buffer =
            buffer_from("<object id=\"code:1\" lang=\"python3\" type=\"code\">import unittest\n</object>\n");
        assert_eq!(buffer.find_anchor("code:1"), Some(0));
    }

    #[test]
    fn test_find_implicit_anchor() {
        let buffer = buffer_from("<h level=\"1\">Title\n</h>");
        assert_eq!(buffer.find_anchor("title"), Some(0));
        let buffer = buffer_from("intro\n<h level=\"2\">foo bar\n</h>");
        assert_eq!(buffer.find_anchor("foo-bar"), Some(6));
        let buffer = buffer_from("<h level=\"2\"><code>foo</code> bar\n</h>");
        assert_eq!(buffer.find_anchor("foo-bar"), Some(0));
        let buffer = buffer_from("foo bar\n");
        assert_eq!(buffer.find_anchor("foo-bar"), None);
    }

    #[rstest]
    #[case::at_offset("Some text <anchor name=\"test\" />\n", 10, Some("test"))]
    #[case::nearby("Some <anchor name=\"anchor1\" /> text <anchor name=\"test\" />\n", 8, Some("anchor1"))]
    #[case::image_at_offset("Some text <img id=\"anchor1\" src=\"./foo.png\" />\n", 10, Some("anchor1"))]
    #[case::image_nearby(
        "Some <img id=\"anchor1\" src=\"./foo.png\" /> text <anchor name=\"test\" />\n",
        8,
        Some("anchor1")
    )]
    #[case::heading_explicit("<h level=\"2\">Some heading <anchor name=\"test\" />\n</h>", 2, Some("test"))]
    #[case::heading_implicit("<h level=\"2\">Some heading\n</h>", 2, Some("some-heading"))]
    #[case::none("Some text\n", 2, None)]
    fn test_get_anchor_for_location(#[case] body: &str, #[case] offset: usize, #[case] wanted: Option<&str>) {
        let buffer = buffer_from(body);
        assert_eq!(buffer.get_anchor_for_location(offset).as_deref(), wanted);
    }
}
