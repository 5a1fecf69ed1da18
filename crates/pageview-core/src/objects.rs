//! Embedded objects.
//!
//! Images, anchors, checkbox icons, separator lines and plugin objects take a
//! single position in the buffer text, holding [`OBJECT_CHAR`]. The object
//! itself lives in an [`ObjectArena`] owned by the buffer and the position
//! refers to it by [`ObjectId`]. Objects are never freed while the buffer
//! lives, so undo records can keep referring to them.

use std::fmt;

use pageview_core_parse::{Attrib, Token, attrib};

use crate::bullets::CheckState;
use crate::find::{FindInterface, FindQuery, FindState};

/// Object replacement character that holds the place of an object in the text.
pub const OBJECT_CHAR: char = '\u{FFFC}';

/// Handle of an object in an [`ObjectArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub(crate) u32);

/// Model of a plugin object.
pub enum ObjectModel {
    /// Object with plain data; matched as a whole by find.
    Simple {
        /// Object data, e.g. the source of an equation.
        data: Option<String>,
    },
    /// Object with its own searchable content (e.g. a nested text buffer);
    /// find calls are passed through.
    Searchable(Box<dyn FindInterface + Send>),
}

impl fmt::Debug for ObjectModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectModel::Simple { data } => f.debug_struct("Simple").field("data", data).finish(),
            ObjectModel::Searchable(_) => f.write_str("Searchable(..)"),
        }
    }
}

/// What an object is.
#[derive(Debug)]
pub enum ObjectKind {
    /// Image with its attributes (`src`, `width`, ...).
    Image(Attrib),
    /// Named anchor.
    Anchor(String),
    /// Checkbox icon of a list item.
    Icon(CheckState),
    /// Horizontal separator line.
    Line,
    /// Plugin object with `type` and other attributes.
    Object {
        /// Attributes, including `type`.
        attrib: Attrib,
        /// Content of the object.
        model: ObjectModel,
    },
    /// Table, kept as its token stream.
    Table(Vec<Token>),
}

/// Object held by a buffer.
#[derive(Debug)]
pub struct InsertedObject {
    /// What the object is.
    pub kind: ObjectKind,
    find_state: FindState,
    find_query: Option<FindQuery>,
}

impl InsertedObject {
    /// Wrap an object kind.
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            find_state: FindState::empty(),
            find_query: None,
        }
    }

    /// Element name used when serializing this object.
    pub fn element_name(&self) -> &'static str {
        match &self.kind {
            ObjectKind::Image(_) => "img",
            ObjectKind::Anchor(_) => "anchor",
            ObjectKind::Icon(_) => "icon",
            ObjectKind::Line => "line",
            ObjectKind::Object { .. } => "object",
            ObjectKind::Table(_) => "table",
        }
    }

    /// Tokens describing the object.
    pub fn to_tokens(&self) -> Vec<Token> {
        match &self.kind {
            ObjectKind::Image(a) => vec![Token::start("img", a.clone()), Token::end("img")],
            ObjectKind::Anchor(name) => vec![
                Token::start("anchor", attrib([("name", name.as_str())])),
                Token::end("anchor"),
            ],
            ObjectKind::Icon(state) => vec![
                Token::start("icon", attrib([("stock", state.stock())])),
                Token::end("icon"),
            ],
            ObjectKind::Line => vec![Token::start("line", Attrib::new()), Token::end("line")],
            ObjectKind::Object { attrib, model } => {
                let mut tokens = vec![Token::start("object", attrib.clone())];
                if let ObjectModel::Simple { data: Some(data) } = model {
                    if !data.is_empty() {
                        tokens.push(Token::text(data.clone()));
                    }
                }
                tokens.push(Token::end("object"));
                tokens
            }
            ObjectKind::Table(tokens) => tokens.clone(),
        }
    }

    /// Whether find looks into this object.
    pub fn is_searchable(&self) -> bool {
        matches!(self.kind, ObjectKind::Object { .. })
    }

    /// Highlight state for simple objects.
    pub fn find_state(&self) -> FindState {
        self.find_state
    }

    fn set_find_state(&mut self, state: FindState, query: Option<&FindQuery>) {
        self.find_state = state;
        self.find_query = query.cloned();
    }

    fn simple_match(&self, query: &FindQuery) -> bool {
        match &self.kind {
            ObjectKind::Object {
                model: ObjectModel::Simple { data: Some(data) },
                ..
            } => !data.is_empty() && query.regex().is_match(data),
            _ => false,
        }
    }

    fn delegate(&mut self) -> Option<&mut (dyn FindInterface + Send)> {
        match &mut self.kind {
            ObjectKind::Object {
                model: ObjectModel::Searchable(delegate),
                ..
            } => Some(delegate.as_mut()),
            _ => None,
        }
    }

    fn find_next_previous(&mut self, query: &FindQuery, wrap: bool, forward: bool) -> bool {
        if let Some(delegate) = self.delegate() {
            return if forward {
                delegate.find_next(query, wrap)
            } else {
                delegate.find_previous(query, wrap)
            };
        }

        let same_query = self.find_query.as_ref() == Some(query);
        if self.find_state.contains(FindState::HAS_MATCH) && same_query {
            // Second call for the same query passes through the object
            let state = self.find_state.without(FindState::HAS_MATCH);
            self.set_find_state(state, Some(query));
            false
        } else if self.simple_match(query) {
            let state = if self.find_state.contains(FindState::HAS_HIGHLIGHT) && same_query {
                FindState::HAS_MATCH.with(FindState::HAS_HIGHLIGHT)
            } else {
                FindState::HAS_MATCH
            };
            self.set_find_state(state, Some(query));
            true
        } else {
            self.set_find_state(FindState::empty(), None);
            false
        }
    }
}

impl FindInterface for InsertedObject {
    fn find_next(&mut self, query: &FindQuery, wrap: bool) -> bool {
        self.find_next_previous(query, wrap, true)
    }

    fn find_previous(&mut self, query: &FindQuery, wrap: bool) -> bool {
        self.find_next_previous(query, wrap, false)
    }

    fn find_highlight_all(&mut self, query: &FindQuery) {
        if let Some(delegate) = self.delegate() {
            delegate.find_highlight_all(query);
        } else if self.simple_match(query) {
            self.set_find_state(FindState::HAS_HIGHLIGHT, Some(query));
        } else {
            self.set_find_state(FindState::empty(), None);
        }
    }

    fn find_clear(&mut self) {
        if let Some(delegate) = self.delegate() {
            delegate.find_clear();
        } else {
            self.set_find_state(FindState::empty(), None);
        }
    }

    fn find_replace_at_cursor(&mut self, query: &FindQuery, replacement: &str) -> bool {
        match self.delegate() {
            Some(delegate) => delegate.find_replace_at_cursor(query, replacement),
            None => false,
        }
    }

    fn find_replace_all(&mut self, query: &FindQuery, replacement: &str) -> bool {
        match self.delegate() {
            Some(delegate) => delegate.find_replace_all(query, replacement),
            None => false,
        }
    }
}

/// Storage for the objects of one buffer.
#[derive(Debug, Default)]
pub struct ObjectArena {
    objects: Vec<InsertedObject>,
}

impl ObjectArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object and return its handle.
    pub fn insert(&mut self, object: InsertedObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// Object for a handle.
    pub fn get(&self, id: ObjectId) -> &InsertedObject {
        &self.objects[id.0 as usize]
    }

    /// Mutable object for a handle.
    pub fn get_mut(&mut self, id: ObjectId) -> &mut InsertedObject {
        &mut self.objects[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find::FIND_CASE_SENSITIVE;
    use pageview_core_parse::attrib;

    fn simple(data: &str) -> InsertedObject {
        InsertedObject::new(ObjectKind::Object {
            attrib: attrib([("type", "code")]),
            model: ObjectModel::Simple {
                data: Some(data.to_string()),
            },
        })
    }

    #[test]
    fn test_simple_object_find_states() {
        let query = FindQuery::new("foo", 0).unwrap();
        let other = FindQuery::new("foo", FIND_CASE_SENSITIVE).unwrap();
        let mut object = simple("Some foo data");

        assert!(object.find_next(&query, true));
        assert_eq!(object.find_state(), FindState::HAS_MATCH);
        assert!(!object.find_next(&query, true));
        assert_eq!(object.find_state(), FindState::empty());
        assert!(object.find_previous(&query, true));
        assert_eq!(object.find_state(), FindState::HAS_MATCH);

        object.find_highlight_all(&query);
        assert_eq!(object.find_state(), FindState::HAS_HIGHLIGHT);
        assert!(object.find_next(&query, true));
        assert_eq!(
            object.find_state(),
            FindState::HAS_MATCH.with(FindState::HAS_HIGHLIGHT)
        );
        assert!(object.find_next(&other, true));
        assert_eq!(object.find_state(), FindState::HAS_MATCH);

        object.find_clear();
        assert_eq!(object.find_state(), FindState::empty());
        assert!(!object.find_replace_at_cursor(&query, "bar"));
        assert!(!object.find_replace_all(&query, "bar"));

        let nomatch = FindQuery::new("dus", 0).unwrap();
        assert!(!object.find_next(&nomatch, true));
        object.find_highlight_all(&nomatch);
        assert_eq!(object.find_state(), FindState::empty());
    }

    #[test]
    fn test_object_tokens() {
        let object = simple("data");
        let tokens = object.to_tokens();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], Token::text("data"));

        let icon = InsertedObject::new(ObjectKind::Icon(CheckState::Checked));
        assert_eq!(
            icon.to_tokens()[0],
            Token::start("icon", attrib([("stock", "zim-checked-box")]))
        );
    }
}
