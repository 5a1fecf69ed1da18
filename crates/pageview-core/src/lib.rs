#![warn(missing_docs)]
//! Pageview Core - headless rich-text page buffer
//!
//! # Overview
//!
//! `pageview-core` holds the editing model of a wiki page: text with formatting, embedded
//! objects, list items with bullets and checkboxes, and headings. It does no rendering; a view
//! layer listens to [`BufferEvent`]s and draws what the buffer holds.
//!
//! # Core Features
//!
//! - **Structural tree in and out**: load and dump the page tree (`zim-tree`, `p`, `h`, `ul`,
//!   `li`, ...) without loss, including partial dumps of a range
//! - **Formatting tags**: inline styles, links, tag references, verbatim, headings, indents
//!   and list items, with a priority order that fixes how they nest when serialized
//! - **Undo/redo**: changes are grouped into user actions, typing is merged per word
//! - **Lists**: bullets, numbered and lettered items, checkboxes with state propagation and
//!   automatic renumbering on indent
//! - **Find/replace**: literal, case, whole word and regex queries, highlighting of all matches
//!   and search into embedded objects
//! - **Internal serialization**: a flat token format for copy/paste within the application
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Find / Lists / Anchors / Links              │  ← Operations on top of the buffer
//! ├─────────────────────────────────────────────┤
//! │  Load / Dump / Internal serialization        │  ← Structural tree and tokens
//! ├─────────────────────────────────────────────┤
//! │  TextBuffer (cells, tags, objects, undo)     │  ← Editing model
//! ├─────────────────────────────────────────────┤
//! │  Line Index (Rope-based)                     │  ← Line access
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use pageview_core::{Element, FIND_WHOLE_WORD, FindInterface, FindQuery, TextBuffer};
//!
//! let tree = Element::from_xml(
//!     "<zim-tree><h level=\"1\">Title\n</h><p>Some <strong>text</strong> here\n</p></zim-tree>",
//! )
//! .unwrap();
//! let mut buffer = TextBuffer::from_tree(&tree).unwrap();
//!
//! let query = FindQuery::new("text", FIND_WHOLE_WORD).unwrap();
//! assert!(buffer.find_next(&query, true));
//! assert!(buffer.find_replace_at_cursor(&query, "words"));
//! assert_eq!(buffer.get_text(), "Title\nSome words here\n");
//!
//! assert!(buffer.undo());
//! assert_eq!(buffer.dump(None).unwrap(), tree);
//! ```
//!
//! # Module Description
//!
//! - [`buffer`] - the page buffer: edits, formatting, load and dump
//! - [`tags`] - formatting tags and their priorities
//! - [`bullets`] - bullets, numerals and checkbox states
//! - [`lists`] - list view of consecutive list items
//! - [`find`] - find and replace
//! - [`serialize`] - internal serialization for copy/paste
//! - [`objects`] - embedded objects
//! - [`line_index`] - Rope based line index

pub mod buffer;
pub mod bullets;
pub mod config;
pub mod error;
pub mod events;
pub mod find;
pub mod line_index;
pub mod lists;
pub mod objects;
pub mod serialize;
pub mod tags;
mod undo;

pub use buffer::{LinkData, ObjectFactory, TextBuffer, UserAction, heading_to_anchor};
pub use bullets::{BULLET_CHAR, Bullet, BulletClass, CheckState, ListStyle, Numeral};
pub use config::BufferConfig;
pub use error::{BufferError, BufferResult, FindError};
pub use events::{BufferEvent, BufferObserver};
pub use find::{
    FIND_CASE_SENSITIVE, FIND_REGEX, FIND_WHOLE_WORD, FindInterface, FindMatch, FindQuery,
    FindState,
};
pub use line_index::{LineIndex, Position};
pub use lists::{ListRow, TextBufferList};
pub use objects::{InsertedObject, OBJECT_CHAR, ObjectId, ObjectKind, ObjectModel};
pub use serialize::{INTERNAL_ROOT, InternalContents};
pub use tags::{InlineStyle, TagClass, TagId, TagKind, TagTable};

pub use pageview_core_parse::{AttrValue, Attrib, Element, Token, attrib};
