//! Loading structural trees into the buffer.

use pageview_core_parse::{AttrValue, Element, Node, tree_to_tokens};

use super::TextBuffer;
use crate::bullets::{Bullet, CheckState, Numeral};
use crate::error::{BufferError, BufferResult};
use crate::events::BufferEvent;
use crate::objects::ObjectKind;
use crate::tags::{InlineStyle, TagId, TagKind};

/// Elements that start a new line when inserted.
const BLOCK_ELEMENTS: &[&str] = &["h", "pre", "ul", "ol", "li", "div", "table", "line"];

/// List currently being inserted.
#[derive(Debug, Clone, Copy)]
struct ListContext {
    level: u32,
    /// Next label of a numbered list.
    numeral: Option<Numeral>,
}

/// State while walking a tree.
struct TreeInserter {
    offset: usize,
    /// Line formatting of the insert position, used until the first newline.
    base: Vec<TagId>,
    /// Tags of the open elements.
    stack: Vec<TagId>,
    lists: Vec<ListContext>,
}

impl TreeInserter {
    fn tags(&self) -> Vec<TagId> {
        let mut tags = self.base.clone();
        tags.extend(self.stack.iter().copied());
        tags
    }

    fn insert_text(&mut self, buffer: &mut TextBuffer, text: &str) {
        if text.is_empty() {
            return;
        }
        match text.find('\n') {
            Some(i) if !self.base.is_empty() => {
                let (first, rest) = text.split_at(i + 1);
                self.offset = buffer.insert_with_tags(self.offset, first, &self.tags());
                self.base.clear();
                self.insert_text(buffer, rest);
            }
            _ => {
                self.offset = buffer.insert_with_tags(self.offset, text, &self.tags());
            }
        }
    }

    fn insert_object(&mut self, buffer: &mut TextBuffer, kind: ObjectKind) {
        let id = buffer.store_object(kind);
        let tags: Vec<TagId> = self
            .tags()
            .into_iter()
            .filter(|t| !buffer.kind(*t).is_link_like())
            .collect();
        buffer.insert_object_with_tags(self.offset, id, &tags);
        self.offset += 1;
    }

    fn insert_children(&mut self, buffer: &mut TextBuffer, element: &Element) -> BufferResult<()> {
        for child in &element.children {
            match child {
                Node::Text(text) => self.insert_text(buffer, text),
                Node::Element(child) => self.insert_element(buffer, child)?,
            }
        }
        Ok(())
    }

    fn with_tag(&mut self, buffer: &mut TextBuffer, tag: TagId, element: &Element) -> BufferResult<()> {
        self.stack.push(tag);
        let result = self.insert_children(buffer, element);
        self.stack.pop();
        result
    }

    fn insert_element(&mut self, buffer: &mut TextBuffer, element: &Element) -> BufferResult<()> {
        match element.tag.as_str() {
            "zim-tree" | "p" => self.insert_children(buffer, element),
            "h" => {
                let level = element.get_int("level").unwrap_or(1).clamp(1, 6) as u8;
                let tag = buffer.lookup_tag(TagKind::Heading(level));
                self.with_tag(buffer, tag, element)
            }
            "div" => {
                let indent = element.get_int("indent").unwrap_or(0).max(0) as u32;
                if indent == 0 {
                    return self.insert_children(buffer, element);
                }
                let tag = buffer.lookup_tag(TagKind::Indent(indent));
                self.with_tag(buffer, tag, element)
            }
            "pre" | "code" => {
                let kind = if element.tag == "pre" { TagKind::Pre } else { TagKind::Code };
                let tag = buffer.lookup_tag(kind);
                self.stack.push(tag);
                // No formatting inside verbatim
                self.insert_text(buffer, &element.get_text());
                self.stack.pop();
                Ok(())
            }
            "link" => {
                let text = element.get_text();
                let href = match element.get("href") {
                    Some(AttrValue::None) | None => None,
                    Some(value) => {
                        let href = value.to_string();
                        (!href.trim().is_empty() && href != text).then_some(href)
                    }
                };
                let tag = buffer.lookup_tag(TagKind::Link { href });
                self.with_tag(buffer, tag, element)
            }
            "tag" => {
                let tag = buffer.lookup_tag(TagKind::TagRef);
                self.with_tag(buffer, tag, element)
            }
            "ul" | "ol" => self.insert_list(buffer, element),
            "li" => self.insert_list_item(buffer, element),
            "anchor" => {
                let name = element.get_str("name").unwrap_or_default().to_string();
                self.insert_object(buffer, ObjectKind::Anchor(name));
                Ok(())
            }
            "img" => {
                self.insert_object(buffer, ObjectKind::Image(element.attrib.clone()));
                Ok(())
            }
            "icon" => {
                let state = element
                    .get_str("stock")
                    .and_then(CheckState::from_stock)
                    .ok_or_else(|| BufferError::structural("icon without known stock"))?;
                self.insert_object(buffer, ObjectKind::Icon(state));
                Ok(())
            }
            "line" => {
                self.insert_object(buffer, ObjectKind::Line);
                Ok(())
            }
            "object" => {
                let text = element.get_text();
                let data = (!text.is_empty()).then_some(text.as_str());
                let model = buffer.create_object_model(&element.attrib, data);
                self.insert_object(
                    buffer,
                    ObjectKind::Object {
                        attrib: element.attrib.clone(),
                        model,
                    },
                );
                Ok(())
            }
            "table" => {
                self.insert_object(buffer, ObjectKind::Table(tree_to_tokens(element)));
                Ok(())
            }
            name => match InlineStyle::from_name(name) {
                Some(style) => {
                    let tag = buffer.lookup_tag(TagKind::Style(style));
                    self.with_tag(buffer, tag, element)
                }
                None => Err(BufferError::structural(format!("unknown element: {}", name))),
            },
        }
    }

    fn insert_list(&mut self, buffer: &mut TextBuffer, element: &Element) -> BufferResult<()> {
        let level = match self.lists.last() {
            Some(parent) => parent.level + 1,
            None => element.get_int("indent").unwrap_or(0).max(0) as u32,
        };
        let numeral = (element.tag == "ol").then(|| {
            element
                .get("start")
                .map(|v| v.to_string())
                .and_then(|s| Numeral::parse(&s))
                .unwrap_or(Numeral::Number(1))
        });
        self.lists.push(ListContext { level, numeral });
        let result = self.insert_children(buffer, element);
        self.lists.pop();
        result
    }

    fn insert_list_item(&mut self, buffer: &mut TextBuffer, element: &Element) -> BufferResult<()> {
        let context = self.lists.last().copied().unwrap_or(ListContext {
            level: 0,
            numeral: None,
        });
        let bullet = match context.numeral {
            Some(numeral) => {
                if let Some(list) = self.lists.last_mut() {
                    list.numeral = numeral.next().or(Some(numeral));
                }
                Bullet::Numbered(numeral)
            }
            None => element
                .get_str("bullet")
                .and_then(Bullet::from_attrib_value)
                .unwrap_or(Bullet::Bullet),
        };

        let tag = buffer.lookup_tag(TagKind::ListItem {
            indent: context.level,
            style: bullet.list_style(),
        });
        // Inline formatting does not apply to the bullet
        let saved_stack = std::mem::take(&mut self.stack);
        self.stack.push(tag);
        match bullet {
            Bullet::Checkbox(state) => {
                self.insert_object(buffer, ObjectKind::Icon(state));
                self.insert_text(buffer, " ");
            }
            _ => {
                let text = bullet.text().unwrap_or_default();
                self.insert_text(buffer, &text);
            }
        }
        let result = self.insert_children(buffer, element);
        self.stack = saved_stack;
        result
    }
}

/// Whether the first content of a tree is a block element.
fn starts_with_block(element: &Element) -> bool {
    if BLOCK_ELEMENTS.contains(&element.tag.as_str()) {
        return true;
    }
    if element.tag != "zim-tree" && element.tag != "p" {
        return false;
    }
    match element.children.first() {
        Some(Node::Element(child)) => starts_with_block(child),
        _ => false,
    }
}

impl TextBuffer {
    /// Create a buffer holding a structural tree, without undo history.
    pub fn from_tree(tree: &Element) -> BufferResult<Self> {
        let mut buffer = Self::new();
        buffer.load(tree)?;
        buffer.clear_undo_stack();
        Ok(buffer)
    }

    /// Replace the content with a structural tree.
    ///
    /// The replacement is a single undo step, so undo brings back the previous content.
    pub fn load(&mut self, tree: &Element) -> BufferResult<()> {
        log::debug!("loading tree with {} top level nodes", tree.children.len());
        self.begin_user_action();
        self.delete_raw(0, self.char_count());
        self.emit(BufferEvent::Cleared);
        let result = self.insert_tree_inner(0, tree);
        self.end_user_action();
        result?;
        self.place_cursor(0);
        self.set_modified(false);
        self.emit(BufferEvent::Loaded);
        Ok(())
    }

    /// Insert a structural tree at `offset`.
    ///
    /// A fragment that starts with a block element inserted halfway a line starts on a new
    /// line; inline content inserted at the start of a list item goes after the bullet.
    pub fn insert_tree(&mut self, offset: usize, tree: &Element, interactive: bool) -> BufferResult<()> {
        self.check_position(offset)?;
        if interactive && !self.config().editable {
            return Err(BufferError::ReadOnly);
        }
        self.begin_user_action();
        let result = self.insert_tree_inner(offset, tree);
        self.end_user_action();
        result
    }

    /// Insert a structural tree at the cursor.
    pub fn insert_tree_at_cursor(&mut self, tree: &Element, interactive: bool) -> BufferResult<()> {
        self.insert_tree(self.cursor(), tree, interactive)
    }

    /// Append a structural tree at the end of the buffer, on a new line.
    pub fn append_tree(&mut self, tree: &Element) -> BufferResult<()> {
        let end = self.char_count();
        self.begin_user_action();
        let mut offset = end;
        if !self.is_line_start(end) {
            self.insert_with_tags(end, "\n", &[]);
            offset += 1;
        }
        let result = self.insert_tree_inner(offset, tree);
        self.end_user_action();
        result
    }

    fn insert_tree_inner(&mut self, mut offset: usize, tree: &Element) -> BufferResult<()> {
        let block = starts_with_block(tree);
        let mut base = Vec::new();
        if block {
            if !self.is_line_start(offset) {
                let tags = self.tags_left_of(offset, "\n");
                self.insert_with_tags(offset, "\n", &tags);
                offset += 1;
            }
        } else {
            if self.is_line_start(offset) {
                offset = offset.max(self.line_content_start(self.line_of(offset)));
            }
            base = if self.is_line_start(offset) {
                self.line_based_tags(offset)
            } else {
                self.line_based_tags(offset - 1)
            };
        }

        let mut inserter = TreeInserter {
            offset,
            base,
            stack: Vec::new(),
            lists: Vec::new(),
        };
        inserter.insert_element(self, tree)?;
        log::debug!("inserted tree at {}..{}", offset, inserter.offset);
        Ok(())
    }
}
