#![warn(missing_docs)]
//! `pageview-core-parse` - formatted-text plumbing for `pageview-core`.
//!
//! This crate holds everything that is about the *shape* of formatted text rather than about
//! editing it: the element tree and token representations, builders that produce them, a
//! small xml reader/writer, a regex based rule parser, and helpers to recognize links, dates
//! and encoded strings.
//!
//! # Representations
//!
//! ```text
//!   xml string  <──>  Vec<Token>  <──>  Element tree
//!                        ▲
//!                        │ Builder (start / text / end)
//!                 RegexParser, page buffer dump
//! ```
//!
//! Anything that emits formatted content does so through the [`Builder`] trait, so the same
//! producer can build a tree ([`SimpleTreeBuilder`]) or a flat token list ([`TokenBuilder`]).
//!
//! # Example
//!
//! ```rust
//! use pageview_core_parse::{Element, tokens_to_tree, xml_to_tokens};
//!
//! let tokens = xml_to_tokens("<p>Hello <strong>world</strong></p>").unwrap();
//! let tree = tokens_to_tree(&tokens).unwrap();
//! assert_eq!(tree.tag, "p");
//! assert_eq!(tree.get_text(), "Hello world");
//! ```

pub mod dates;
pub mod encode;
pub mod error;
pub mod links;
pub mod regexparser;
pub mod tokens;
pub mod tree;
pub mod xml;

pub use dates::{DateRange, Day, match_date, old_parse_date, parse_date};
pub use encode::{
    UrlEncodeMode, escape_string, split_escaped_string, unescape_string, url_decode, url_encode,
};
pub use error::ParseError;
pub use links::{is_url_link, link_type, match_url_link, normalize_win32_share, uri_scheme};
pub use regexparser::{RegexParser, Rule};
pub use tokens::{
    Token, TokenBuilder, collect_until_end, replay_tokens, tokens_to_tree, tree_to_tokens,
};
pub use tree::{
    AttrValue, Attrib, Builder, BuilderTextBuffer, Element, Node, SimpleTreeBuilder, attrib,
    replay_tree,
};
pub use xml::{XML_HEADER, decode_xml, encode_xml, tokens_to_xml, xml_to_tokens};
