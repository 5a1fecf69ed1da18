//! Flat token streams.
//!
//! A token list is the flat equivalent of an [`Element`] tree: start tokens
//! carry the tag and attributes, text tokens carry text and end tokens close
//! the most recently opened tag.

use crate::error::ParseError;
use crate::tree::{Attrib, Builder, Element, Node};

/// Single token of a flat formatted-text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Opens `tag` with attributes.
    Start(String, Attrib),
    /// Text run.
    Text(String),
    /// Closes `tag`.
    End(String),
}

impl Token {
    /// Convenience constructor for a start token.
    pub fn start(tag: impl Into<String>, attrib: Attrib) -> Self {
        Token::Start(tag.into(), attrib)
    }

    /// Convenience constructor for a text token.
    pub fn text(text: impl Into<String>) -> Self {
        Token::Text(text.into())
    }

    /// Convenience constructor for an end token.
    pub fn end(tag: impl Into<String>) -> Self {
        Token::End(tag.into())
    }
}

/// Convert a token list into a tree; the list must describe exactly one element.
pub fn tokens_to_tree(tokens: &[Token]) -> Result<Element, ParseError> {
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    for token in tokens {
        if root.is_some() {
            return Err(ParseError::structural("tokens after root element"));
        }
        match token {
            Token::Start(tag, attrib) => {
                stack.push(Element::with_attrib(tag.clone(), attrib.clone()));
            }
            Token::Text(text) => match stack.last_mut() {
                Some(parent) => parent.push_text(text.clone()),
                None => return Err(ParseError::structural("text outside root element")),
            },
            Token::End(tag) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::structural(format!("unexpected end tag: {}", tag)))?;
                if &element.tag != tag {
                    return Err(ParseError::structural(format!(
                        "unexpected end tag: {} expected {}",
                        tag, element.tag
                    )));
                }
                match stack.last_mut() {
                    Some(parent) => parent.push(element),
                    None => root = Some(element),
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::structural(format!(
            "missing end tags for: {:?}",
            stack.iter().map(|e| e.tag.as_str()).collect::<Vec<_>>()
        )));
    }
    root.ok_or_else(|| ParseError::structural("empty token list"))
}

/// Convert a tree into a token list.
pub fn tree_to_tokens(element: &Element) -> Vec<Token> {
    let mut tokens = Vec::new();
    push_element_tokens(element, &mut tokens);
    tokens
}

fn push_element_tokens(element: &Element, tokens: &mut Vec<Token>) {
    tokens.push(Token::Start(element.tag.clone(), element.attrib.clone()));
    for child in &element.children {
        match child {
            Node::Text(t) => tokens.push(Token::Text(t.clone())),
            Node::Element(e) => push_element_tokens(e, tokens),
        }
    }
    tokens.push(Token::End(element.tag.clone()));
}

/// Feed a token list into a [`Builder`].
pub fn replay_tokens(builder: &mut dyn Builder, tokens: &[Token]) -> Result<(), ParseError> {
    for token in tokens {
        match token {
            Token::Start(tag, attrib) => builder.start(tag, attrib.clone()),
            Token::Text(text) => builder.text(text),
            Token::End(tag) => builder.end(tag)?,
        }
    }
    Ok(())
}

/// Return the tokens up to and including the end token that closes the
/// element opened just before `tokens` starts.
///
/// `tokens` is the remainder of a stream directly after a start token; the
/// returned slice contains the element content plus its end token.
pub fn collect_until_end(tokens: &[Token]) -> Result<&[Token], ParseError> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Start(..) => depth += 1,
            Token::End(_) if depth == 0 => return Ok(&tokens[..=i]),
            Token::End(_) => depth -= 1,
            Token::Text(_) => {}
        }
    }
    Err(ParseError::structural("no matching end token"))
}

/// [`Builder`] that records a flat token list.
#[derive(Debug, Default)]
pub struct TokenBuilder {
    tokens: Vec<Token>,
    stack: Vec<String>,
}

impl TokenBuilder {
    /// Create an empty token builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens recorded so far.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Return the recorded tokens; fails when tags are still open.
    pub fn into_tokens(self) -> Result<Vec<Token>, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::structural(format!(
                "unclosed tags: {:?}",
                self.stack
            )));
        }
        Ok(self.tokens)
    }
}

impl Builder for TokenBuilder {
    fn start(&mut self, tag: &str, attrib: Attrib) {
        self.stack.push(tag.to_string());
        self.tokens.push(Token::start(tag, attrib));
    }

    fn text(&mut self, text: &str) {
        if let Some(Token::Text(prev)) = self.tokens.last_mut() {
            prev.push_str(text);
        } else {
            self.tokens.push(Token::text(text));
        }
    }

    fn end(&mut self, tag: &str) -> Result<(), ParseError> {
        match self.stack.pop() {
            Some(open) if open == tag => {
                self.tokens.push(Token::end(tag));
                Ok(())
            }
            Some(open) => Err(ParseError::structural(format!(
                "unmatched {} at end of {}",
                open, tag
            ))),
            None => Err(ParseError::structural(format!("unmatched end tag: {}", tag))),
        }
    }
}
