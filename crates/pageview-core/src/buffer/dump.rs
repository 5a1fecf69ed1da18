//! Dumping buffer content as a structural tree.
//!
//! The raw tag state of the buffer may contain combinations that have no meaning in the tree
//! (two headings on one line, code over a tag reference, a link inside a link). Dumping resolves
//! those the way the text is shown: for line formatting the innermost tag of a kind wins and
//! `pre > heading > list item > indent`; for links and tag references the outermost tag wins.

use std::cmp::Reverse;

use pageview_core_parse::{AttrValue, Element, Node, tokens_to_tree};

use super::TextBuffer;
use crate::bullets::{Bullet, Numeral};
use crate::error::BufferResult;
use crate::objects::{InsertedObject, OBJECT_CHAR};
use crate::tags::{TagClass, TagId, TagKind};

/// Block formatting of a line after resolving overlapping tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineBlock {
    Plain,
    Indent(u32),
    Item { indent: u32, bullet: Bullet, bullet_len: usize },
    Heading(u8),
    Pre,
}

/// Append text, merging with a preceding text node.
fn push_text(children: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    match children.last_mut() {
        Some(Node::Text(last)) => last.push_str(text),
        _ => children.push(Node::Text(text.to_string())),
    }
}

fn extend_nodes(children: &mut Vec<Node>, nodes: Vec<Node>) {
    for node in nodes {
        match node {
            Node::Text(text) => push_text(children, &text),
            element => children.push(element),
        }
    }
}

/// Split leading and trailing whitespace off the text at the edges of `element`.
fn strip_whitespace(element: &mut Element) -> (String, String) {
    let mut lead = String::new();
    if let Some(Node::Text(first)) = element.children.first_mut() {
        let trimmed = first.trim_start().len();
        lead = first[..first.len() - trimmed].to_string();
        first.replace_range(..first.len() - trimmed, "");
        if first.is_empty() {
            element.children.remove(0);
        }
    }
    let mut trail = String::new();
    if let Some(Node::Text(last)) = element.children.last_mut() {
        let trimmed = last.trim_end().len();
        trail = last[trimmed..].to_string();
        last.truncate(trimmed);
        if last.is_empty() {
            element.children.pop();
        }
    }
    (lead, trail)
}

fn object_element(object: &InsertedObject) -> BufferResult<Element> {
    Ok(tokens_to_tree(&object.to_tokens())?)
}

/// Builds the inline content of one line.
struct InlineWriter<'a> {
    buffer: &'a TextBuffer,
    root: Vec<Node>,
    stack: Vec<(TagId, Element)>,
}

impl<'a> InlineWriter<'a> {
    fn new(buffer: &'a TextBuffer) -> Self {
        Self {
            buffer,
            root: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn children(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some((_, element)) => &mut element.children,
            None => &mut self.root,
        }
    }

    fn write(&mut self, start: usize, end: usize) -> BufferResult<()> {
        let buffer = self.buffer;
        let mut i = start;
        while i < end {
            let tags = buffer.inline_tags(i);
            self.update(&tags, i, end);
            if let Some(object) = buffer.object_at(i) {
                let element = object_element(object)?;
                self.children().push(Node::Element(element));
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < end && buffer.object_id_at(j).is_none() && buffer.inline_tags(j) == tags {
                j += 1;
            }
            // A placeholder without object is not content
            let text: String = buffer
                .get_slice(i, j)
                .chars()
                .filter(|c| *c != OBJECT_CHAR)
                .collect();
            push_text(self.children(), &text);
            i = j;
        }
        Ok(())
    }

    /// Close and open elements so the stack matches `tags`.
    fn update(&mut self, tags: &[TagId], offset: usize, limit: usize) {
        let buffer = self.buffer;
        let opening = tags
            .iter()
            .any(|t| !self.stack.iter().any(|(open, _)| open == t));
        let mut keep = 0;
        for (tag, _) in &self.stack {
            if !tags.contains(tag) {
                break;
            }
            // Code and tag references only contain text
            if opening && matches!(buffer.kind(*tag), TagKind::Code | TagKind::TagRef) {
                break;
            }
            keep += 1;
        }
        while self.stack.len() > keep {
            self.close();
        }

        let mut new: Vec<TagId> = tags
            .iter()
            .copied()
            .filter(|t| !self.stack.iter().any(|(open, _)| open == t))
            .collect();
        new.sort_by_key(|t| {
            let kind = buffer.kind(*t);
            let run_end = match kind.class() {
                TagClass::Nesting => buffer.inline_run_end(*t, offset, limit),
                _ => 0,
            };
            (kind.class(), Reverse(run_end), buffer.tag_table().sort_key(*t))
        });
        for tag in new {
            let element = buffer.open_element(tag);
            self.stack.push((tag, element));
        }
    }

    fn close(&mut self) {
        let Some((tag, mut element)) = self.stack.pop() else {
            return;
        };
        let buffer = self.buffer;
        let kind = buffer.kind(tag);
        match kind {
            TagKind::Link { href: None } => {
                let text = element.get_text();
                element.set("href", text);
            }
            TagKind::TagRef => {
                let text = element.get_text();
                element.set("name", text.trim_start_matches('@').to_string());
            }
            _ => {}
        }

        let strip = matches!(kind, TagKind::Style(_) | TagKind::Code);
        let parent = self.children();
        if strip {
            let (lead, trail) = strip_whitespace(&mut element);
            push_text(parent, &lead);
            if !element.is_empty() {
                parent.push(Node::Element(element));
            }
            push_text(parent, &trail);
        } else if !element.is_empty() {
            parent.push(Node::Element(element));
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while !self.stack.is_empty() {
            self.close();
        }
        self.root
    }
}

#[derive(Debug)]
struct OpenList {
    element: Element,
    level: u32,
    numbered: bool,
}

/// Paragraph being built: plain lines, indented blocks and lists.
#[derive(Debug)]
struct Paragraph {
    element: Element,
    lists: Vec<OpenList>,
    div: Option<(u32, Element)>,
}

impl Paragraph {
    fn new() -> Self {
        Self {
            element: Element::new("p"),
            lists: Vec::new(),
            div: None,
        }
    }

    fn pop_list(&mut self) {
        let Some(list) = self.lists.pop() else {
            return;
        };
        match self.lists.last_mut() {
            Some(parent) => parent.element.push(list.element),
            None => self.element.push(list.element),
        }
    }

    fn close_lists(&mut self) {
        while !self.lists.is_empty() {
            self.pop_list();
        }
    }

    fn close_div(&mut self) {
        if let Some((_, div)) = self.div.take() {
            self.element.push(div);
        }
    }

    fn add_plain(&mut self, nodes: Vec<Node>) {
        self.close_lists();
        self.close_div();
        extend_nodes(&mut self.element.children, nodes);
    }

    fn add_indented(&mut self, level: u32, nodes: Vec<Node>) {
        self.close_lists();
        if self.div.as_ref().is_some_and(|(l, _)| *l != level) {
            self.close_div();
        }
        let (_, div) = self.div.get_or_insert_with(|| {
            let mut div = Element::new("div");
            div.set("indent", AttrValue::Int(level as i64));
            (level, div)
        });
        extend_nodes(&mut div.children, nodes);
    }

    fn open_list(&mut self, level: u32, bullet: Bullet) {
        let mut element = Element::new(if bullet.is_numbered() { "ol" } else { "ul" });
        if self.lists.is_empty() && level > 0 {
            element.set("indent", AttrValue::Int(level as i64));
        }
        if let Bullet::Numbered(numeral) = bullet
            && numeral != Numeral::Number(1)
        {
            element.set("start", numeral.label());
        }
        self.lists.push(OpenList {
            element,
            level,
            numbered: bullet.is_numbered(),
        });
    }

    fn add_item(&mut self, level: u32, bullet: Bullet, nodes: Vec<Node>) {
        self.close_div();
        while self.lists.last().is_some_and(|l| l.level > level) {
            self.pop_list();
        }
        match self.lists.last() {
            Some(list) if list.level == level && list.numbered == bullet.is_numbered() => {}
            Some(list) if list.level == level => {
                self.pop_list();
                self.open_list(level, bullet);
            }
            _ => self.open_list(level, bullet),
        }

        let mut item = Element::new("li");
        if !bullet.is_numbered() {
            item.set("bullet", bullet.attrib_value());
        }
        extend_nodes(&mut item.children, nodes);
        if let Some(list) = self.lists.last_mut() {
            list.element.push(item);
        }
    }

    fn finish(mut self) -> Option<Element> {
        self.close_lists();
        self.close_div();
        (!self.element.is_empty()).then_some(self.element)
    }
}

/// Top level blocks being collected.
struct TreeWriter {
    root: Element,
    paragraph: Option<Paragraph>,
    pre: Option<String>,
}

impl TreeWriter {
    fn flush_paragraph(&mut self) {
        if let Some(element) = self.paragraph.take().and_then(Paragraph::finish) {
            self.root.push(element);
        }
    }

    fn flush_pre(&mut self) {
        if let Some(text) = self.pre.take()
            && !text.is_empty()
        {
            self.root.push(Element::new("pre").with_children([text.as_str()]));
        }
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.flush_pre();
    }

    fn paragraph(&mut self) -> &mut Paragraph {
        self.flush_pre();
        self.paragraph.get_or_insert_with(Paragraph::new)
    }
}

impl TextBuffer {
    /// Formatting tags that become inline elements for the character at `offset`.
    fn inline_tags(&self, offset: usize) -> Vec<TagId> {
        if self.char_at(offset) == Some('\n') {
            return Vec::new();
        }
        let mut tags: Vec<TagId> = self
            .cell_tags(offset)
            .iter()
            .copied()
            .filter(|t| matches!(self.kind(*t), TagKind::Style(_) | TagKind::Code | TagKind::Link { .. } | TagKind::TagRef))
            .collect();

        let outer_link = self.outer_tag_at(offset, |k| matches!(k, TagKind::Link { .. }));
        let outer_tag = self.outer_tag_at(offset, |k| matches!(k, TagKind::TagRef));
        tags.retain(|t| match self.kind(*t) {
            TagKind::Link { .. } => Some(*t) == outer_link,
            TagKind::TagRef => Some(*t) == outer_tag,
            TagKind::Code => outer_tag.is_none(),
            _ => true,
        });
        tags
    }

    /// End of the run of `tag` starting at `offset` within the line.
    fn inline_run_end(&self, tag: TagId, offset: usize, limit: usize) -> usize {
        let mut end = offset;
        while end < limit && self.has_tag(end, tag) && self.char_at(end) != Some('\n') {
            end += 1;
        }
        end
    }

    fn open_element(&self, tag: TagId) -> Element {
        let kind = self.kind(tag);
        let (name, attrib) = kind.element();
        match kind {
            TagKind::Link { .. } => Element::with_attrib(name, attrib),
            _ => Element::new(name),
        }
    }

    fn line_block(&self, line: usize) -> LineBlock {
        let start = self.line_start(line);
        let mut tags = self.line_based_tags(start);
        self.tag_table().sort_by_priority(&mut tags);

        let (mut pre, mut heading, mut item, mut indent) = (false, None, None, None);
        for tag in tags {
            match self.kind(tag) {
                TagKind::Pre => pre = true,
                TagKind::Heading(level) => heading = Some(*level),
                TagKind::ListItem { indent: level, .. } => item = Some(*level),
                TagKind::Indent(level) => indent = Some(*level),
                _ => {}
            }
        }

        if pre {
            return LineBlock::Pre;
        }
        if let Some(level) = heading {
            return LineBlock::Heading(level);
        }
        if let Some(level) = item {
            if let Some((bullet, bullet_len)) = self.bullet_at(start) {
                return LineBlock::Item {
                    indent: level,
                    bullet,
                    bullet_len,
                };
            }
            indent = Some(level);
        }
        match indent {
            Some(level) if level > 0 => LineBlock::Indent(level),
            _ => LineBlock::Plain,
        }
    }

    fn inline_nodes(&self, start: usize, end: usize) -> BufferResult<Vec<Node>> {
        let mut writer = InlineWriter::new(self);
        writer.write(start, end)?;
        Ok(writer.finish())
    }

    /// Dump the content as a structural tree, optionally limited to `[start, end)`.
    ///
    /// A range ending at the end of a line does not include the newline, so the last list
    /// item of such a range ends without it.
    pub fn dump(&self, bounds: Option<(usize, usize)>) -> BufferResult<Element> {
        let (start, end) = bounds.unwrap_or((0, self.char_count()));
        self.check_range(start, end)?;

        let mut writer = TreeWriter {
            root: Element::new("zim-tree"),
            paragraph: None,
            pre: None,
        };

        let mut line = self.line_of(start);
        while line < self.line_count() && self.line_start(line) < end {
            let line_start = self.line_start(line);
            let seg_start = line_start.max(start);
            let seg_end = self.line_end_with_newline(line).min(end);
            let block = self.line_block(line);
            line += 1;
            if seg_start >= seg_end {
                continue;
            }

            match block {
                LineBlock::Pre => {
                    writer.flush_paragraph();
                    let text: String = self
                        .get_slice(seg_start, seg_end)
                        .chars()
                        .filter(|c| *c != OBJECT_CHAR)
                        .collect();
                    writer.pre.get_or_insert_with(String::new).push_str(&text);
                }
                LineBlock::Heading(level) => {
                    writer.flush();
                    let mut heading = Element::new("h");
                    heading.set("level", AttrValue::Int(level as i64));
                    extend_nodes(&mut heading.children, self.inline_nodes(seg_start, seg_end)?);
                    writer.root.push(heading);
                }
                LineBlock::Plain if self.get_slice(seg_start, seg_end) == "\n" => {
                    writer.flush();
                    push_text(&mut writer.root.children, "\n");
                }
                LineBlock::Plain => {
                    let nodes = self.inline_nodes(seg_start, seg_end)?;
                    writer.paragraph().add_plain(nodes);
                }
                LineBlock::Indent(level) => {
                    let nodes = self.inline_nodes(seg_start, seg_end)?;
                    writer.paragraph().add_indented(level, nodes);
                }
                LineBlock::Item {
                    indent,
                    bullet,
                    bullet_len,
                } => {
                    let content_start = (line_start + bullet_len).max(seg_start);
                    let nodes = if content_start < seg_end {
                        self.inline_nodes(content_start, seg_end)?
                    } else {
                        Vec::new()
                    };
                    writer.paragraph().add_item(indent, bullet, nodes);
                }
            }
        }
        writer.flush();

        log::debug!("dumped {}..{} into {} top level nodes", start, end, writer.root.children.len());
        Ok(writer.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::InlineStyle;
    use pretty_assertions::assert_eq;

    fn tree(xml: &str) -> Element {
        Element::from_xml(xml).unwrap()
    }

    fn assert_round_trip(xml: &str) {
        let input = tree(xml);
        let buffer = TextBuffer::from_tree(&input).unwrap();
        assert_eq!(buffer.dump(None).unwrap().to_xml(), input.to_xml());
    }

    fn buffer_with(text: &str) -> TextBuffer {
        let mut buffer = TextBuffer::new();
        buffer.insert_text(0, text, false).unwrap();
        buffer
    }

    fn dump_xml(buffer: &TextBuffer) -> String {
        buffer.dump(None).unwrap().to_xml()
    }

    fn wrap(body: &str) -> String {
        format!("<?xml version='1.0' encoding='utf-8'?>\n<zim-tree>{}</zim-tree>", body)
    }

    #[test]
    fn test_round_trip_paragraphs_and_headings() {
        assert_round_trip(
            "<zim-tree><h level=\"2\">foo\n</h><p>bar\n</p>\n<p>normal <strong>bold</strong> normal2\n\
             normal <strike>strike  <strong>nested bold</strong> strike2</strike> normal2\n</p></zim-tree>",
        );
    }

    #[test]
    fn test_round_trip_lists() {
        assert_round_trip(
            "<zim-tree><p><ul><li bullet=\"*\">Foo\n</li><li bullet=\"*\">Bar\n</li>\
             <ul><li bullet=\"checked-box\">Sub\n</li></ul></ul>\
             <ol start=\"3\"><li>Three\n</li><li>Four\n</li></ol></p></zim-tree>",
        );
        assert_round_trip(
            "<zim-tree><p><ul indent=\"1\"><li bullet=\"*\">Indented list\n</li></ul></p></zim-tree>",
        );
        assert_round_trip(
            "<zim-tree><p><ol start=\"a\"><li>Letter\n</li></ol></p></zim-tree>",
        );
    }

    #[test]
    fn test_round_trip_links_and_objects() {
        assert_round_trip(
            "<zim-tree><p><link href=\"http://example.com\"> <emphasis>Example</emphasis> </link>\n\
             <link href=\"Test\">Test</link> <tag name=\"foo\">@foo</tag> <anchor name=\"bar\" />\n\
             <img src=\"./foo.png\" />\n</p><pre>verbatim\n  text\n</pre></zim-tree>",
        );
    }

    #[test]
    fn test_partial_dump_at_line_end() {
        let buffer = TextBuffer::from_tree(&tree(
            "<zim-tree><p><ul><li bullet=\"*\">Item 1\n</li><li bullet=\"*\">Item 2\n</li></ul></p></zim-tree>",
        ))
        .unwrap();

        let with_newline = buffer.dump(Some((0, buffer.line_start(2)))).unwrap();
        assert_eq!(
            with_newline.to_xml(),
            wrap("<p><ul><li bullet=\"*\">Item 1\n</li><li bullet=\"*\">Item 2\n</li></ul></p>")
        );
        let without_newline = buffer.dump(Some((0, buffer.line_end(1)))).unwrap();
        assert_eq!(
            without_newline.to_xml(),
            wrap("<p><ul><li bullet=\"*\">Item 1\n</li><li bullet=\"*\">Item 2</li></ul></p>")
        );
    }

    #[test]
    fn test_list_breaks_between_numbered_and_unnumbered() {
        let buffer = TextBuffer::from_tree(&tree(
            "<zim-tree><p><ol start=\"2\"><li>foo\n</li></ol><ul><li bullet=\"unchecked-box\">bar\n</li></ul>\
             <ol start=\"7\"><li>baz\n</li></ol></p></zim-tree>",
        ))
        .unwrap();
        assert_eq!(
            dump_xml(&buffer),
            wrap(
                "<p><ol start=\"2\"><li>foo\n</li></ol><ul><li bullet=\"unchecked-box\">bar\n</li></ul>\
                 <ol start=\"7\"><li>baz\n</li></ol></p>"
            )
        );
    }

    #[test]
    fn test_bullets_and_checkboxes_share_a_list() {
        assert_round_trip(
            "<zim-tree><p><ul><li bullet=\"*\">a\n</li><ul><li bullet=\"*\">b\n</li></ul>\
             <li bullet=\"checked-box\">c\n</li><li bullet=\"unchecked-box\">d\n</li></ul></p></zim-tree>",
        );
    }

    #[test]
    fn test_blank_line_splits_paragraph() {
        let buffer = TextBuffer::from_tree(&tree(
            "<zim-tree><p><ul><li bullet=\"*\">foo\n</li></ul>\nbar\n</p></zim-tree>",
        ))
        .unwrap();
        assert_eq!(buffer.get_text(), "\u{2022} foo\n\nbar\n");
        let split = "<p><ul><li bullet=\"*\">foo\n</li></ul></p>\n<p>bar\n</p>";
        assert_eq!(dump_xml(&buffer), wrap(split));
        assert_round_trip(&format!("<zim-tree>{}</zim-tree>", split));
    }

    #[test]
    fn test_inline_tags_break_at_newline() {
        let mut buffer = buffer_with("line1 foo\nline2");
        buffer.apply_tag(TagKind::Style(InlineStyle::Emphasis), 0, 15).unwrap();
        buffer.apply_tag(TagKind::Style(InlineStyle::Strong), 6, 15).unwrap();
        assert_eq!(
            dump_xml(&buffer),
            wrap(
                "<p><emphasis>line1 <strong>foo</strong></emphasis>\n\
                 <emphasis><strong>line2</strong></emphasis></p>"
            )
        );
    }

    #[test]
    fn test_no_empty_elements_around_newline() {
        let mut buffer = buffer_with("line1\nline2");
        buffer.apply_tag(TagKind::Style(InlineStyle::Emphasis), 0, 11).unwrap();
        buffer.apply_tag(TagKind::Style(InlineStyle::Strong), 5, 11).unwrap();
        assert_eq!(
            dump_xml(&buffer),
            wrap("<p><emphasis>line1</emphasis>\n<emphasis><strong>line2</strong></emphasis></p>")
        );
    }

    #[test]
    fn test_code_over_tag_drops_code() {
        let mut buffer = buffer_with("test @tag test");
        buffer.apply_tag(TagKind::TagRef, 5, 9).unwrap();
        buffer.apply_tag(TagKind::Code, 0, 14).unwrap();
        assert_eq!(
            dump_xml(&buffer),
            wrap("<p><code>test</code> <tag name=\"tag\">@tag</tag> <code>test</code></p>")
        );
    }

    #[test]
    fn test_styles_do_not_nest_in_code() {
        let mut buffer = buffer_with("test strong test");
        buffer.apply_tag(TagKind::Style(InlineStyle::Strong), 5, 11).unwrap();
        buffer.apply_tag(TagKind::Code, 0, 16).unwrap();
        assert_eq!(
            dump_xml(&buffer),
            wrap("<p><code>test</code> <strong><code>strong</code></strong> <code>test</code></p>")
        );
    }

    #[test]
    fn test_illegal_line_formatting() {
        let mut buffer = buffer_with("test 123\n");
        buffer.apply_tag(TagKind::Heading(1), 0, 9).unwrap();
        buffer.apply_tag(TagKind::Heading(2), 0, 9).unwrap();
        assert_eq!(dump_xml(&buffer), wrap("<h level=\"2\">test 123\n</h>"));

        let mut buffer = buffer_with("test 123\n");
        buffer.apply_tag(TagKind::Indent(1), 0, 9).unwrap();
        buffer.apply_tag(TagKind::Indent(2), 0, 9).unwrap();
        assert_eq!(
            dump_xml(&buffer),
            wrap("<p><div indent=\"1\">test 123\n</div></p>")
        );

        let mut buffer = TextBuffer::from_tree(&tree(
            "<zim-tree><p><ul><li bullet=\"*\">test 123\n</li></ul></p></zim-tree>",
        ))
        .unwrap();
        buffer.apply_tag(TagKind::Heading(1), 0, 11).unwrap();
        assert_eq!(dump_xml(&buffer), wrap("<h level=\"1\">\u{2022} test 123\n</h>"));
    }

    #[test]
    fn test_outer_link_wins() {
        let mut buffer = TextBuffer::from_tree(&tree(
            "<zim-tree><p><link href=\"None\">Test 123</link></p></zim-tree>",
        ))
        .unwrap();
        buffer
            .apply_tag(TagKind::Link { href: Some("target".into()) }, 0, 8)
            .unwrap();
        assert_eq!(
            dump_xml(&buffer),
            wrap("<p><link href=\"target\">Test 123</link></p>")
        );
    }

    #[test]
    fn test_placeholder_without_object_is_dropped() {
        let buffer = buffer_with("foo \u{FFFC} bar");
        assert_eq!(dump_xml(&buffer), wrap("<p>foo  bar</p>"));
    }

    #[test]
    fn test_styles_are_dropped_in_pre() {
        let mut buffer = buffer_with("test\nstrong\ntest\n");
        buffer.apply_tag(TagKind::Style(InlineStyle::Strong), 5, 11).unwrap();
        buffer.apply_tag(TagKind::Pre, 0, 17).unwrap();
        assert_eq!(dump_xml(&buffer), wrap("<pre>test\nstrong\ntest\n</pre>"));
    }

    #[test]
    fn test_invalid_bounds() {
        let buffer = buffer_with("foo");
        assert!(buffer.dump(Some((2, 1))).is_err());
        assert!(buffer.dump(Some((0, 10))).is_err());
    }
}
