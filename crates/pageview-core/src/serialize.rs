//! Internal serialization of buffer contents.
//!
//! [`InternalContents`] mirrors the raw state of a buffer range as a flat token list: every
//! tag run, object and piece of text, including combinations the structural tree would clean
//! up. Inserting the contents again reproduces the same tags and objects, which makes it the
//! format for clipboard copies within a buffer and for test fixtures.
//!
//! Tags open in a fixed order so the output is stable: block tags first, then nesting styles
//! (the ones that stay open longest go outside), then leaf tags. Tags always close in reverse
//! order of opening.

use pageview_core_parse::{AttrValue, Attrib, Token, collect_until_end, tokens_to_xml, xml_to_tokens};

use crate::buffer::TextBuffer;
use crate::bullets::{CheckState, ListStyle};
use crate::error::{BufferError, BufferResult};
use crate::objects::ObjectKind;
use crate::tags::{InlineStyle, TagClass, TagId, TagKind};

/// Root element of the xml form.
pub const INTERNAL_ROOT: &str = "zim-textbuffer";

/// Raw serialized buffer contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternalContents {
    tokens: Vec<Token>,
}

impl InternalContents {
    /// Wrap a token list.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// The tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Xml form wrapped in `<zim-textbuffer>`; objects are written as self-closing elements.
    pub fn to_xml(&self) -> BufferResult<String> {
        Ok(format!(
            "<{}>{}</{}>",
            INTERNAL_ROOT,
            tokens_to_xml(&self.tokens)?,
            INTERNAL_ROOT
        ))
    }

    /// Parse the xml form; the `<zim-textbuffer>` wrapper is optional.
    pub fn from_xml(xml: &str) -> BufferResult<Self> {
        let mut tokens = xml_to_tokens(xml)?;
        if matches!(tokens.first(), Some(Token::Start(tag, _)) if tag == INTERNAL_ROOT)
            && matches!(tokens.last(), Some(Token::End(tag)) if tag == INTERNAL_ROOT)
        {
            tokens.pop();
            tokens.remove(0);
        }
        Ok(Self { tokens })
    }

    /// Serialize `[start, end)` of a buffer.
    pub fn serialize_range(buffer: &TextBuffer, start: usize, end: usize) -> BufferResult<Self> {
        if start > end || end > buffer.char_count() {
            return Err(BufferError::InvalidRange { start, end });
        }
        let mut serializer = Serializer {
            buffer,
            tokens: Vec::new(),
            stack: Vec::new(),
        };
        let mut offset = start;
        while offset < end {
            serializer.update_stack(offset, offset == start);
            offset = serializer.content(offset, end);
        }
        serializer.close_to(0);
        Ok(Self {
            tokens: serializer.tokens,
        })
    }

    /// Insert the contents at `offset` as one user action; returns the end of the inserted
    /// content.
    ///
    /// The contents are inserted as they are: no edit mode, list or link rules apply except
    /// that a link whose target equals its text becomes a dynamic link.
    pub fn insert_at(&self, buffer: &mut TextBuffer, offset: usize) -> BufferResult<usize> {
        if offset > buffer.char_count() {
            return Err(BufferError::InvalidPosition(offset));
        }
        buffer.with_user_action(|buffer| {
            let mut inserter = Inserter {
                offset,
                stack: Vec::new(),
            };
            inserter.insert(buffer, &self.tokens)?;
            if !inserter.stack.is_empty() {
                let open: Vec<&str> = inserter.stack.iter().map(|(name, _)| name.as_str()).collect();
                log::warn!("tags not closed on insert: {:?}", open);
            }
            Ok(inserter.offset)
        })
    }
}

struct Serializer<'a> {
    buffer: &'a TextBuffer,
    tokens: Vec<Token>,
    stack: Vec<TagId>,
}

impl Serializer<'_> {
    fn split(&self, tags: &[TagId]) -> (Vec<TagId>, Vec<TagId>, Vec<TagId>) {
        let class = |t: &TagId| self.buffer.tag_table().kind(*t).class();
        let block = tags.iter().copied().filter(|t| class(t) == TagClass::Block).collect();
        let nesting = tags.iter().copied().filter(|t| class(t) == TagClass::Nesting).collect();
        let leaf = tags.iter().copied().filter(|t| class(t) == TagClass::Leaf).collect();
        (block, nesting, leaf)
    }

    /// Sort the tags at `offset` into opening order.
    fn sorted_tags(&self, offset: usize, init: bool) -> Vec<TagId> {
        let mut tags = self.buffer.document_tags(offset);
        self.buffer.tag_table().sort_by_priority(&mut tags);
        let (mut block, mut nesting, leaf) = self.split(&tags);

        if init {
            nesting.sort_by_key(|t| {
                let (s, e) = self.buffer.tag_extent(offset, *t);
                (s, std::cmp::Reverse(e))
            });
        } else {
            let (open_block, open_nesting, _) = self.split(&self.stack);
            let mut sorted = Vec::new();
            if open_block == block {
                for tag in open_nesting {
                    match nesting.iter().position(|t| *t == tag) {
                        Some(i) => sorted.push(nesting.remove(i)),
                        None => break,
                    }
                }
            }
            nesting.sort_by_key(|t| std::cmp::Reverse(self.buffer.tag_extent(offset, *t).1));
            sorted.append(&mut nesting);
            nesting = sorted;
        }

        block.append(&mut nesting);
        block.extend(leaf);
        block
    }

    fn update_stack(&mut self, offset: usize, init: bool) {
        let tags = self.sorted_tags(offset, init);
        let common = tags
            .iter()
            .zip(&self.stack)
            .take_while(|(a, b)| a == b)
            .count();
        self.close_to(common);
        for tag in &tags[common..] {
            let (name, attrib) = self.buffer.tag_table().kind(*tag).element();
            log::trace!("open <{}> at {}", name, offset);
            self.tokens.push(Token::start(name, attrib));
            self.stack.push(*tag);
        }
    }

    fn close_to(&mut self, depth: usize) {
        while self.stack.len() > depth {
            if let Some(tag) = self.stack.pop() {
                let (name, _) = self.buffer.tag_table().kind(tag).element();
                self.tokens.push(Token::end(name));
            }
        }
    }

    /// Serialize the object or text run at `offset`; returns the offset after it.
    fn content(&mut self, offset: usize, end: usize) -> usize {
        if let Some(object) = self.buffer.object_at(offset) {
            log::trace!("object <{}> at {}", object.element_name(), offset);
            self.tokens.extend(object.to_tokens());
            return offset + 1;
        }
        let tags = self.buffer.cell_tags(offset);
        let mut stop = offset + 1;
        while stop < end
            && self.buffer.object_at(stop).is_none()
            && same_document_tags(self.buffer, tags, self.buffer.cell_tags(stop))
        {
            stop += 1;
        }
        self.tokens.push(Token::text(self.buffer.get_slice(offset, stop)));
        stop
    }
}

fn same_document_tags(buffer: &TextBuffer, a: &[TagId], b: &[TagId]) -> bool {
    let doc = |t: &&TagId| buffer.tag_table().kind(**t).is_document_tag();
    a.iter().filter(doc).eq(b.iter().filter(doc))
}

struct Inserter {
    offset: usize,
    stack: Vec<(String, TagId)>,
}

impl Inserter {
    fn tags(&self) -> Vec<TagId> {
        self.stack.iter().map(|(_, tag)| *tag).collect()
    }

    fn insert_object(&mut self, buffer: &mut TextBuffer, kind: ObjectKind) {
        let id = buffer.store_object(kind);
        let tags: Vec<TagId> = self
            .tags()
            .into_iter()
            .filter(|t| !buffer.tag_table().kind(*t).is_link_like())
            .collect();
        buffer.insert_object_with_tags(self.offset, id, &tags);
        self.offset += 1;
    }

    fn insert(&mut self, buffer: &mut TextBuffer, tokens: &[Token]) -> BufferResult<()> {
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Text(text) => {
                    let tags = self.tags();
                    self.offset = buffer.insert_with_tags(self.offset, text, &tags);
                }
                Token::End(name) => {
                    let (open, tag) = self
                        .stack
                        .pop()
                        .ok_or_else(|| BufferError::structural(format!("unexpected end tag: {}", name)))?;
                    if open != *name {
                        return Err(BufferError::structural(format!(
                            "inconsistent closing tag: {} expected {}",
                            name, open
                        )));
                    }
                    if name == "link" {
                        self.finish_link(buffer, tag);
                    }
                }
                Token::Start(name, attrib) => {
                    let object = match name.as_str() {
                        "img" => Some(ObjectKind::Image(attrib.clone())),
                        "anchor" => Some(ObjectKind::Anchor(
                            attrib.get("name").and_then(AttrValue::as_str).unwrap_or_default().to_string(),
                        )),
                        "icon" => {
                            let state = attrib
                                .get("stock")
                                .and_then(AttrValue::as_str)
                                .and_then(CheckState::from_stock)
                                .ok_or_else(|| BufferError::structural("icon without known stock"))?;
                            Some(ObjectKind::Icon(state))
                        }
                        "line" => Some(ObjectKind::Line),
                        _ => None,
                    };
                    if let Some(kind) = object {
                        self.insert_object(buffer, kind);
                        if matches!(tokens.get(i + 1), Some(Token::End(end)) if end == name) {
                            i += 1;
                        }
                    } else if name == "object" {
                        let content = collect_until_end(&tokens[i + 1..])?;
                        let mut data = String::new();
                        for token in &content[..content.len() - 1] {
                            match token {
                                Token::Text(text) => data.push_str(text),
                                other => {
                                    return Err(BufferError::structural(format!(
                                        "unexpected token in object: {:?}",
                                        other
                                    )));
                                }
                            }
                        }
                        let data = (!data.is_empty()).then_some(data.as_str());
                        let model = buffer.create_object_model(attrib, data);
                        self.insert_object(
                            buffer,
                            ObjectKind::Object {
                                attrib: attrib.clone(),
                                model,
                            },
                        );
                        i += content.len();
                    } else if name == "table" {
                        let content = collect_until_end(&tokens[i + 1..])?;
                        let mut table = vec![tokens[i].clone()];
                        table.extend_from_slice(content);
                        self.insert_object(buffer, ObjectKind::Table(table));
                        i += content.len();
                    } else {
                        let tag = self.open_tag(buffer, name, attrib)?;
                        self.stack.push((name.clone(), tag));
                    }
                }
            }
            i += 1;
        }
        Ok(())
    }

    fn open_tag(
        &self,
        buffer: &mut TextBuffer,
        name: &str,
        attrib: &Attrib,
    ) -> BufferResult<TagId> {
        let int = |key: &str| attrib.get(key).and_then(AttrValue::as_int).unwrap_or(0).max(0);
        let kind = match name {
            "link" => {
                let href = attrib
                    .get("href")
                    .and_then(AttrValue::as_str)
                    .map(str::to_string);
                // Continue a link that ends right before the insert position
                if let Some(tag) = self.offset.checked_sub(1).and_then(|prev| {
                    buffer.find_tag_at(prev, |k| matches!(k, TagKind::Link { href: h } if *h == href))
                }) {
                    return Ok(tag);
                }
                TagKind::Link { href }
            }
            "tag" => TagKind::TagRef,
            "h" => TagKind::Heading(int("level").clamp(1, 6) as u8),
            "div" => TagKind::Indent(int("indent") as u32),
            "li" => {
                let style = attrib
                    .get("style")
                    .and_then(AttrValue::as_str)
                    .and_then(ListStyle::from_name)
                    .ok_or_else(|| BufferError::structural("list item without known style"))?;
                TagKind::ListItem {
                    indent: int("indent") as u32,
                    style,
                }
            }
            "pre" => TagKind::Pre,
            "code" => TagKind::Code,
            other => match InlineStyle::from_name(other) {
                Some(style) => TagKind::Style(style),
                None => {
                    return Err(BufferError::structural(format!(
                        "unknown internal data element: {}",
                        other
                    )));
                }
            },
        };
        Ok(buffer.lookup_tag(kind))
    }

    /// A link with a blank target, or a target equal to its text, is dynamic.
    fn finish_link(&self, buffer: &mut TextBuffer, tag: TagId) {
        let TagKind::Link { href: Some(href) } = buffer.tag_table().kind(tag).clone() else {
            return;
        };
        if self.offset == 0 || !buffer.has_tag(self.offset - 1, tag) {
            return;
        }
        let (start, end) = buffer.tag_extent(self.offset - 1, tag);
        if href.trim().is_empty() || buffer.get_slice(start, end) == href {
            let dynamic = buffer.lookup_tag(TagKind::Link { href: None });
            buffer.remove_tag_raw(tag, start, end);
            buffer.apply_tag_raw(dynamic, start, end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn roundtrip(xml: &str) -> String {
        let contents = InternalContents::from_xml(xml).unwrap();
        let mut buffer = TextBuffer::new();
        contents.insert_at(&mut buffer, 0).unwrap();
        InternalContents::serialize_range(&buffer, 0, buffer.char_count())
            .unwrap()
            .to_xml()
            .unwrap()
    }

    #[rstest]
    #[case::plain("<zim-textbuffer>Foo\nbar\n</zim-textbuffer>")]
    #[case::nested_styles(
        "<zim-textbuffer><strong>foo <emphasis>bar</emphasis></strong><emphasis> baz</emphasis>\n</zim-textbuffer>"
    )]
    #[case::heading("<zim-textbuffer><h level=\"2\">Head\n</h>text\n</zim-textbuffer>")]
    #[case::list(
        "<zim-textbuffer><li indent=\"0\" style=\"bullet-list\">\u{2022} foo\n</li><li indent=\"1\" style=\"bullet-list\">\u{2022} bar\n</li></zim-textbuffer>"
    )]
    #[case::objects(
        "<zim-textbuffer>A <anchor name=\"here\" />B <img src=\"./foo.png\" /><line />\n</zim-textbuffer>"
    )]
    #[case::object_data(
        "<zim-textbuffer><object type=\"code\">print(1)\n</object>\n</zim-textbuffer>"
    )]
    #[case::links(
        "<zim-textbuffer><link href=\"None\">Foo</link> <link href=\"http://example.org\">bar</link> <tag name=\"None\">@baz</tag>\n</zim-textbuffer>"
    )]
    fn test_roundtrip(#[case] xml: &str) {
        assert_eq!(roundtrip(xml), xml);
    }

    #[test]
    fn test_illegal_combinations_are_kept() {
        // Code and tag over the same text would be cleaned up by a dump
        let xml = "<zim-textbuffer><code><tag name=\"None\">@foo</tag></code>\n</zim-textbuffer>";
        assert_eq!(
            roundtrip(xml),
            "<zim-textbuffer><tag name=\"None\"><code>@foo</code></tag>\n</zim-textbuffer>"
        );
    }

    #[test]
    fn test_longest_tag_opens_first() {
        let mut buffer = TextBuffer::new();
        buffer.insert_text(0, "foo bar baz\n", false).unwrap();
        buffer
            .apply_tag(TagKind::Style(InlineStyle::Strong), 0, 3)
            .unwrap();
        buffer
            .apply_tag(TagKind::Style(InlineStyle::Emphasis), 0, 7)
            .unwrap();
        let xml = InternalContents::serialize_range(&buffer, 0, buffer.char_count())
            .unwrap()
            .to_xml()
            .unwrap();
        assert_eq!(
            xml,
            "<zim-textbuffer><emphasis><strong>foo</strong> bar</emphasis> baz\n</zim-textbuffer>"
        );
    }

    #[test]
    fn test_partial_range_closes_tags() {
        let contents = InternalContents::from_xml(
            "<zim-textbuffer><strong>foo bar</strong> baz\n</zim-textbuffer>",
        )
        .unwrap();
        let mut buffer = TextBuffer::new();
        contents.insert_at(&mut buffer, 0).unwrap();
        let part = InternalContents::serialize_range(&buffer, 4, 9).unwrap();
        assert_eq!(
            part.to_xml().unwrap(),
            "<zim-textbuffer><strong>bar</strong> b</zim-textbuffer>"
        );
        assert!(InternalContents::serialize_range(&buffer, 4, 100).is_err());
    }

    #[test]
    fn test_fixed_link_with_matching_text_becomes_dynamic() {
        let out = roundtrip("<zim-textbuffer><link href=\"Foo\">Foo</link>\n</zim-textbuffer>");
        assert_eq!(out, "<zim-textbuffer><link href=\"None\">Foo</link>\n</zim-textbuffer>");
    }

    #[test]
    fn test_insert_is_one_undo_step() {
        let contents =
            InternalContents::from_xml("<zim-textbuffer><strong>foo</strong> bar\n</zim-textbuffer>")
                .unwrap();
        let mut buffer = TextBuffer::new();
        assert_eq!(contents.insert_at(&mut buffer, 0).unwrap(), 8);
        assert_eq!(buffer.get_text(), "foo bar\n");
        assert!(buffer.undo());
        assert_eq!(buffer.get_text(), "");
        assert!(!buffer.can_undo());
    }

    #[test]
    fn test_insert_errors() {
        let mut buffer = TextBuffer::new();
        let unknown = InternalContents::new(vec![
            Token::start("blink", Default::default()),
            Token::text("foo"),
            Token::end("blink"),
        ]);
        assert!(matches!(
            unknown.insert_at(&mut buffer, 0),
            Err(BufferError::Structural(_))
        ));

        let mismatched = InternalContents::new(vec![
            Token::start("strong", Default::default()),
            Token::text("foo"),
            Token::end("emphasis"),
        ]);
        assert!(mismatched.insert_at(&mut buffer, 0).is_err());

        let unclosed = InternalContents::new(vec![
            Token::start("strong", Default::default()),
            Token::text("foo"),
        ]);
        let mut buffer = TextBuffer::new();
        assert_eq!(unclosed.insert_at(&mut buffer, 0).unwrap(), 3);
        assert_eq!(buffer.get_text(), "foo");
    }

    #[test]
    fn test_empty_contents() {
        let buffer = TextBuffer::new();
        let contents = InternalContents::serialize_range(&buffer, 0, 0).unwrap();
        assert_eq!(contents.to_xml().unwrap(), "<zim-textbuffer></zim-textbuffer>");
    }
}
