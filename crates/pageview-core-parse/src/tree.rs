//! Nested element trees and the streaming [`Builder`] interface.
//!
//! An [`Element`] has a tag, an attribute map and an ordered list of children,
//! each child being either a text run or a nested element. Parsers emit content
//! through the [`Builder`] trait so they stay agnostic of the resulting
//! representation; [`SimpleTreeBuilder`] turns those calls into an element tree.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ParseError;

/// Attribute value of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrValue {
    /// Explicit null, e.g. a link whose href follows its text.
    None,
    /// String value.
    Str(String),
    /// Integer value (`indent`, `level`, ...).
    Int(i64),
    /// Boolean value.
    Bool(bool),
}

impl AttrValue {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as integer; numeric strings are accepted as well.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns `true` for [`AttrValue::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Option<String>> for AttrValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => Self::Str(s),
            None => Self::None,
        }
    }
}

/// Attribute map; keys are kept sorted so serialization is deterministic.
pub type Attrib = BTreeMap<String, AttrValue>;

/// Build an [`Attrib`] map from key/value pairs.
pub fn attrib<K, V, I>(pairs: I) -> Attrib
where
    K: Into<String>,
    V: Into<AttrValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Plain text run.
    Text(String),
    /// Nested element.
    Element(Element),
}

impl Node {
    /// Returns the text if this node is a text run.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    /// Returns the element if this node is an element.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Node::Element(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

/// Element of a formatted text tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Element name.
    pub tag: String,
    /// Element properties.
    pub attrib: Attrib,
    /// Ordered children.
    pub children: Vec<Node>,
}

impl Element {
    /// Create an element without attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrib: Attrib::new(),
            children: Vec::new(),
        }
    }

    /// Create an element with attributes.
    pub fn with_attrib(tag: impl Into<String>, attrib: Attrib) -> Self {
        Self {
            tag: tag.into(),
            attrib,
            children: Vec::new(),
        }
    }

    /// Builder style helper to add children.
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Get an attribute.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrib.get(key)
    }

    /// Get a string attribute.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attrib.get(key).and_then(AttrValue::as_str)
    }

    /// Get an integer attribute (numeric strings are accepted).
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.attrib.get(key).and_then(AttrValue::as_int)
    }

    /// Set an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrib.insert(key.into(), value.into());
    }

    /// Append a text run.
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Append a nested element.
    pub fn push(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    /// Returns `true` if the element has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Iterate over the direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text content of this element and all descendants.
    pub fn get_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Pretty printed representation, one node per line.
    pub fn pprint(&self) -> String {
        let mut out = String::new();
        self.pprint_into(&mut out, 0);
        out
    }

    fn pprint_into(&self, out: &mut String, level: usize) {
        let prefix = "  ".repeat(level);
        if self.children.is_empty() {
            out.push_str(&format!("{}{} {:?} []\n", prefix, self.tag, self.attrib));
            return;
        }
        out.push_str(&format!("{}{} {:?} [\n", prefix, self.tag, self.attrib));
        for child in &self.children {
            match child {
                Node::Element(e) => e.pprint_into(out, level + 1),
                Node::Text(t) => {
                    for line in t.split_inclusive('\n') {
                        out.push_str(&format!("{}  {:?}\n", prefix, line));
                    }
                }
            }
        }
        out.push_str(&format!("{}]\n", prefix));
    }
}

/// Streaming interface used by parsers to construct formatted content.
pub trait Builder {
    /// Start a formatted region.
    fn start(&mut self, tag: &str, attrib: Attrib);

    /// Append text.
    fn text(&mut self, text: &str);

    /// End a formatted region; fails when `tag` does not match the open region.
    fn end(&mut self, tag: &str) -> Result<(), ParseError>;

    /// Open a tag, append text and close it again.
    fn append(&mut self, tag: &str, attrib: Attrib, text: Option<&str>) -> Result<(), ParseError> {
        self.start(tag, attrib);
        if let Some(text) = text {
            self.text(text);
        }
        self.end(tag)
    }
}

impl<B: Builder + ?Sized> Builder for &mut B {
    fn start(&mut self, tag: &str, attrib: Attrib) {
        (**self).start(tag, attrib)
    }

    fn text(&mut self, text: &str) {
        (**self).text(text)
    }

    fn end(&mut self, tag: &str) -> Result<(), ParseError> {
        (**self).end(tag)
    }

    fn append(&mut self, tag: &str, attrib: Attrib, text: Option<&str>) -> Result<(), ParseError> {
        (**self).append(tag, attrib, text)
    }
}

/// [`Builder`] that constructs a tree of [`Element`]s.
#[derive(Debug, Default)]
pub struct SimpleTreeBuilder {
    toplevel: Vec<Node>,
    stack: Vec<Element>,
}

impl SimpleTreeBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.toplevel.push(node),
        }
    }

    /// Return the top level element.
    ///
    /// Fails if content is not complete (unclosed tags) or if there is not
    /// exactly one top level element.
    pub fn get_root(self) -> Result<Element, ParseError> {
        if !self.stack.is_empty() {
            let open: Vec<&str> = self.stack.iter().map(|e| e.tag.as_str()).collect();
            return Err(ParseError::structural(format!(
                "did not finish processing: {:?}",
                open
            )));
        }
        let mut toplevel = self.toplevel;
        if toplevel.len() != 1 {
            return Err(ParseError::structural(format!(
                "not a single toplevel element: {} nodes",
                toplevel.len()
            )));
        }
        match toplevel.pop() {
            Some(Node::Element(root)) => Ok(root),
            _ => Err(ParseError::structural("toplevel node is text")),
        }
    }
}

impl Builder for SimpleTreeBuilder {
    fn start(&mut self, tag: &str, attrib: Attrib) {
        self.stack.push(Element::with_attrib(tag, attrib));
    }

    fn text(&mut self, text: &str) {
        self.push_node(Node::Text(text.to_string()));
    }

    fn end(&mut self, tag: &str) -> Result<(), ParseError> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| ParseError::structural(format!("unmatched end tag: {}", tag)))?;
        if element.tag != tag {
            return Err(ParseError::structural(format!(
                "unmatched {} at end of {}",
                element.tag, tag
            )));
        }
        self.push_node(Node::Element(element));
        Ok(())
    }

    fn append(&mut self, tag: &str, attrib: Attrib, text: Option<&str>) -> Result<(), ParseError> {
        let mut element = Element::with_attrib(tag, attrib);
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            element.push_text(text);
        }
        self.push_node(Node::Element(element));
        Ok(())
    }
}

/// Wrapper that buffers text going to a [`Builder`] so the last piece of text
/// remains accessible for inspection and can be modified.
#[derive(Debug)]
pub struct BuilderTextBuffer<B: Builder> {
    builder: B,
    buffer: Vec<String>,
}

impl<B: Builder> BuilderTextBuffer<B> {
    /// Wrap `builder`.
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            buffer: Vec::new(),
        }
    }

    /// Text buffered since the last flush.
    pub fn get_text(&self) -> String {
        self.buffer.concat()
    }

    /// Replace the buffered text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = vec![text.into()];
    }

    /// Drop the buffered text.
    pub fn clear_text(&mut self) {
        self.buffer.clear();
    }

    /// Forward buffered text to the wrapped builder as a single run.
    pub fn flush(&mut self) {
        let text = self.buffer.concat();
        if !text.is_empty() {
            self.builder.text(&text);
        }
        self.buffer.clear();
    }

    /// Access the wrapped builder.
    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.builder
    }

    /// Flush and return the wrapped builder.
    pub fn into_inner(mut self) -> B {
        self.flush();
        self.builder
    }
}

impl<B: Builder> Builder for BuilderTextBuffer<B> {
    fn start(&mut self, tag: &str, attrib: Attrib) {
        self.flush();
        self.builder.start(tag, attrib);
    }

    fn text(&mut self, text: &str) {
        self.buffer.push(text.to_string());
    }

    fn end(&mut self, tag: &str) -> Result<(), ParseError> {
        self.flush();
        self.builder.end(tag)
    }

    fn append(&mut self, tag: &str, attrib: Attrib, text: Option<&str>) -> Result<(), ParseError> {
        self.flush();
        self.builder.append(tag, attrib, text)
    }
}

/// Replay an element tree into a [`Builder`].
pub fn replay_tree(builder: &mut dyn Builder, element: &Element) -> Result<(), ParseError> {
    builder.start(&element.tag, element.attrib.clone());
    for child in &element.children {
        match child {
            Node::Text(t) => builder.text(t),
            Node::Element(e) => replay_tree(builder, e)?,
        }
    }
    builder.end(&element.tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(builder: &mut dyn Builder) {
        builder.start("root", Attrib::new());
        builder.text("foo");
        builder.text("bar");
        builder.append("dus", Attrib::new(), Some("ja")).unwrap();
        builder.text("foo");
        builder.text("bar");
        builder.append("br", Attrib::new(), None).unwrap();
        builder.text("foo");
        builder.text("bar");
        builder.end("root").unwrap();
    }

    #[test]
    fn test_simple_tree_builder() {
        let mut builder = SimpleTreeBuilder::new();
        feed(&mut builder);
        let root = builder.get_root().unwrap();
        let expected = Element::new("root").with_children([
            Node::from("foo"),
            Node::from("bar"),
            Element::new("dus").with_children(["ja"]).into(),
            Node::from("foo"),
            Node::from("bar"),
            Element::new("br").into(),
            Node::from("foo"),
            Node::from("bar"),
        ]);
        assert_eq!(root, expected);
    }

    #[test]
    fn test_text_buffer_merges_text() {
        let mut builder = BuilderTextBuffer::new(SimpleTreeBuilder::new());
        feed(&mut builder);
        let root = builder.into_inner().get_root().unwrap();
        let expected = Element::new("root").with_children([
            Node::from("foobar"),
            Element::new("dus").with_children(["ja"]).into(),
            Node::from("foobar"),
            Element::new("br").into(),
            Node::from("foobar"),
        ]);
        assert_eq!(root, expected);
    }

    #[test]
    fn test_text_buffer_inspection() {
        let mut buffer = BuilderTextBuffer::new(SimpleTreeBuilder::new());
        buffer.start("FOO", Attrib::new());
        buffer.text("aaa\n");
        buffer.text("bbb\n");
        buffer.text("ccc\n");
        assert_eq!(buffer.get_text(), "aaa\nbbb\nccc\n");

        buffer.append("BAR", Attrib::new(), None).unwrap();
        assert_eq!(buffer.get_text(), "");

        buffer.text("qqq\n");
        assert_eq!(buffer.get_text(), "qqq\n");
        buffer.clear_text();

        buffer.text("qqq\n");
        buffer.set_text("ddd\n");
        assert_eq!(buffer.get_text(), "ddd\n");

        buffer.text("");
        buffer.text("eee");
        buffer.end("FOO").unwrap();

        let root = buffer.into_inner().get_root().unwrap();
        let expected = Element::new("FOO").with_children([
            Node::from("aaa\nbbb\nccc\n"),
            Element::new("BAR").into(),
            Node::from("ddd\neee"),
        ]);
        assert_eq!(root, expected);
    }

    #[test]
    fn test_get_root_errors() {
        let mut builder = SimpleTreeBuilder::new();
        builder.start("a", Attrib::new());
        assert!(builder.get_root().is_err());

        let mut builder = SimpleTreeBuilder::new();
        builder.append("a", Attrib::new(), None).unwrap();
        builder.append("b", Attrib::new(), None).unwrap();
        assert!(builder.get_root().is_err());

        let mut builder = SimpleTreeBuilder::new();
        builder.start("a", Attrib::new());
        assert!(builder.end("b").is_err());
    }

    #[test]
    fn test_attr_value_display() {
        assert_eq!(AttrValue::None.to_string(), "None");
        assert_eq!(AttrValue::from(3i64).to_string(), "3");
        assert_eq!(AttrValue::from(true).to_string(), "True");
        assert_eq!(AttrValue::from("2").as_int(), Some(2));
    }
}
