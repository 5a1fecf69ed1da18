//! Tag table: the formatting tags that can be applied to buffer text.
//!
//! Every character carries a set of [`TagId`]s. A [`TagKind`] describes what a
//! tag means; most kinds are interned so that the same format always maps to
//! the same id, links and tag references get a fresh id for every span.
//!
//! Tags are ordered by their [`TagClass`] when nested:
//!
//! ```text
//! Block (indent, list item, heading) < Nesting (emphasis .. sup) < Leaf (tag, link, code, pre)
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;

use pageview_core_parse::{AttrValue, Attrib, attrib};

use crate::bullets::ListStyle;

/// Handle of a tag in a [`TagTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub(crate) u32);

impl TagId {
    /// Numeric value, increasing with creation order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Inline styles that may nest inside each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InlineStyle {
    /// `emphasis` (italic)
    Emphasis,
    /// `strong` (bold)
    Strong,
    /// `mark` (highlight)
    Mark,
    /// `strike`
    Strike,
    /// `sub`
    Sub,
    /// `sup`
    Sup,
}

impl InlineStyle {
    /// All inline styles in nesting order.
    pub const ALL: [InlineStyle; 6] = [
        InlineStyle::Emphasis,
        InlineStyle::Strong,
        InlineStyle::Mark,
        InlineStyle::Strike,
        InlineStyle::Sub,
        InlineStyle::Sup,
    ];

    /// Element name.
    pub fn name(self) -> &'static str {
        match self {
            InlineStyle::Emphasis => "emphasis",
            InlineStyle::Strong => "strong",
            InlineStyle::Mark => "mark",
            InlineStyle::Strike => "strike",
            InlineStyle::Sub => "sub",
            InlineStyle::Sup => "sup",
        }
    }

    /// Parse an element name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

/// Priority class of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagClass {
    /// Line level formatting: indent, list item and heading.
    Block,
    /// Inline styles that nest.
    Nesting,
    /// Inline annotations that do not nest: tag references, links, code and pre.
    Leaf,
    /// Find highlighting; never serialized.
    Find,
}

/// Meaning of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Indented paragraph.
    Indent(u32),
    /// List item at an indent level with a list style.
    ListItem {
        /// Indent level.
        indent: u32,
        /// Style of the bullet.
        style: ListStyle,
    },
    /// Heading, level 1 to 6.
    Heading(u8),
    /// Inline style.
    Style(InlineStyle),
    /// Tag reference (`@tag`); the name is the text of the span.
    TagRef,
    /// Link; `href` is `None` when the target follows the link text.
    Link {
        /// Fixed target, or `None` for a dynamic link.
        href: Option<String>,
    },
    /// Inline verbatim.
    Code,
    /// Verbatim block.
    Pre,
    /// The current find match.
    FindMatch,
    /// Find highlighting of all matches.
    FindHighlight,
}

impl TagKind {
    /// Priority class.
    pub fn class(&self) -> TagClass {
        match self {
            TagKind::Indent(_) | TagKind::ListItem { .. } | TagKind::Heading(_) => TagClass::Block,
            TagKind::Style(_) => TagClass::Nesting,
            TagKind::TagRef | TagKind::Link { .. } | TagKind::Code | TagKind::Pre => TagClass::Leaf,
            TagKind::FindMatch | TagKind::FindHighlight => TagClass::Find,
        }
    }

    /// Rank within the class; lower ranks are opened first.
    fn rank(&self) -> u8 {
        match self {
            TagKind::Indent(_) | TagKind::ListItem { .. } => 0,
            TagKind::Heading(level) => *level,
            TagKind::Style(style) => *style as u8,
            TagKind::TagRef => 0,
            TagKind::Link { .. } => 1,
            TagKind::Code => 2,
            TagKind::Pre => 3,
            TagKind::FindMatch => 0,
            TagKind::FindHighlight => 1,
        }
    }

    /// Whether this is a line formatting tag that is kept consistent over a
    /// whole line: indent, list item, heading and pre.
    pub fn is_line_based(&self) -> bool {
        matches!(
            self,
            TagKind::Indent(_) | TagKind::ListItem { .. } | TagKind::Heading(_) | TagKind::Pre
        )
    }

    /// Whether this is an indent or list item tag.
    pub fn is_indent(&self) -> bool {
        matches!(self, TagKind::Indent(_) | TagKind::ListItem { .. })
    }

    /// Whether this tag is a link or tag reference.
    pub fn is_link_like(&self) -> bool {
        matches!(self, TagKind::Link { .. } | TagKind::TagRef)
    }

    /// Whether this tag is part of the document (not find highlighting).
    pub fn is_document_tag(&self) -> bool {
        self.class() != TagClass::Find
    }

    fn is_interned(&self) -> bool {
        !self.is_link_like()
    }

    /// Element name and attributes used for the internal serialization.
    pub fn element(&self) -> (&'static str, Attrib) {
        match self {
            TagKind::Indent(level) => ("div", attrib([("indent", AttrValue::Int(*level as i64))])),
            TagKind::ListItem { indent, style } => (
                "li",
                attrib([
                    ("indent", AttrValue::Int(*indent as i64)),
                    ("style", AttrValue::from(style.name())),
                ]),
            ),
            TagKind::Heading(level) => ("h", attrib([("level", AttrValue::Int(*level as i64))])),
            TagKind::Style(style) => (style.name(), Attrib::new()),
            TagKind::TagRef => ("tag", attrib([("name", AttrValue::None)])),
            TagKind::Link { href } => ("link", attrib([("href", AttrValue::from(href.clone()))])),
            TagKind::Code => ("code", Attrib::new()),
            TagKind::Pre => ("pre", Attrib::new()),
            TagKind::FindMatch => ("find-match", Attrib::new()),
            TagKind::FindHighlight => ("find-highlight", Attrib::new()),
        }
    }

    /// Kind for a format name as used by format toggles: an inline style
    /// name, `code`, `pre` or `h1` .. `h6`.
    pub fn from_format_name(name: &str) -> Option<Self> {
        if let Some(style) = InlineStyle::from_name(name) {
            return Some(TagKind::Style(style));
        }
        match name {
            "code" => Some(TagKind::Code),
            "pre" => Some(TagKind::Pre),
            _ => {
                let level: u8 = name.strip_prefix('h')?.parse().ok()?;
                (1..=6).contains(&level).then_some(TagKind::Heading(level))
            }
        }
    }
}

/// Table of all tags used in a buffer.
#[derive(Debug, Default, Clone)]
pub struct TagTable {
    tags: Vec<TagKind>,
    interned: HashMap<TagKind, TagId>,
}

impl TagTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the tag for `kind`, creating it when needed.
    ///
    /// Links and tag references are never shared: every call creates a new tag.
    pub fn lookup(&mut self, kind: TagKind) -> TagId {
        if kind.is_interned() {
            if let Some(id) = self.interned.get(&kind) {
                return *id;
            }
        }
        let id = TagId(self.tags.len() as u32);
        if kind.is_interned() {
            self.interned.insert(kind.clone(), id);
        }
        self.tags.push(kind);
        id
    }

    /// Meaning of a tag.
    pub fn kind(&self, id: TagId) -> &TagKind {
        &self.tags[id.index()]
    }

    /// Number of tags created so far.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether no tag was created yet.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Sort key for nesting: ascending keys are opened first (outer).
    ///
    /// Within the same rank newer tags are outer, so a link applied on top
    /// of another link wins.
    pub fn sort_key(&self, id: TagId) -> (TagClass, u8, Reverse<TagId>) {
        let kind = self.kind(id);
        (kind.class(), kind.rank(), Reverse(id))
    }

    /// Sort tags by priority, outer first.
    pub fn sort_by_priority(&self, tags: &mut [TagId]) {
        tags.sort_by_key(|id| self.sort_key(*id));
    }
}
