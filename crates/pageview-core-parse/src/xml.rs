//! Minimal XML reading and writing for token streams.
//!
//! Only what is needed to exchange formatted text is supported: elements,
//! double quoted attributes and the five predefined entities. The only
//! validation done is the check that tags are properly nested.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseError;
use crate::tokens::{Token, tokens_to_tree, tree_to_tokens};
use crate::tree::{AttrValue, Attrib, Element};

/// XML declaration written in front of a serialized tree.
pub const XML_HEADER: &str = "<?xml version='1.0' encoding='utf-8'?>\n";

fn tag_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<.*?>").expect("valid tag regex"))
}

fn tag_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w-]+").expect("valid tag name regex"))
}

fn attrib_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)="(.*?)""#).expect("valid attribute regex"))
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(\w+);").expect("valid entity regex"))
}

/// Escape text content.
pub fn encode_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('>', "&gt;")
        .replace('<', "&lt;")
}

/// Escape an attribute value.
pub fn encode_xml_attrib(text: &str) -> String {
    encode_xml(text)
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Resolve the predefined entities; unknown entities are kept as is.
pub fn decode_xml(text: &str) -> String {
    entity_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match &caps[1] {
                "amp" => "&".to_string(),
                "gt" => ">".to_string(),
                "lt" => "<".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn attrib_to_xml(attrib: &Attrib) -> String {
    let mut out = String::new();
    for (key, value) in attrib {
        let value = match value {
            AttrValue::Str(s) => encode_xml_attrib(s),
            other => other.to_string(),
        };
        out.push_str(&format!(" {}=\"{}\"", key, value));
    }
    out
}

fn xml_to_tag_and_attrib(inner: &str) -> Result<(String, Attrib), ParseError> {
    let tag = tag_name_re()
        .find(inner)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::structural(format!("invalid tag: <{}>", inner)))?;

    let mut attrib = Attrib::new();
    for caps in attrib_re().captures_iter(inner) {
        let key = caps[1].to_string();
        let raw = &caps[2];
        let value = match key.as_str() {
            "href" | "name" if raw == "None" => AttrValue::None,
            "indent" | "level" => match raw.parse::<i64>() {
                Ok(i) => AttrValue::Int(i),
                Err(_) => AttrValue::Str(decode_xml(raw)),
            },
            _ => AttrValue::Str(decode_xml(raw)),
        };
        attrib.insert(key, value);
    }
    Ok((tag, attrib))
}

fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if !text.is_empty() {
        tokens.push(Token::Text(decode_xml(text)));
    }
}

/// Parse xml into a token list.
pub fn xml_to_tokens(xml: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut last = 0;

    for m in tag_split_re().find_iter(xml) {
        push_text(&mut tokens, &xml[last..m.start()]);
        last = m.end();

        let part = m.as_str();
        if let Some(rest) = part.strip_prefix("</") {
            let tag = rest.trim_end_matches('>').trim();
            match stack.pop() {
                Some(open) if open == tag => tokens.push(Token::End(open)),
                Some(open) => {
                    return Err(ParseError::structural(format!(
                        "unexpected end tag: {} expected {}",
                        tag, open
                    )));
                }
                None => {
                    return Err(ParseError::structural(format!("unexpected end tag: {}", tag)));
                }
            }
        } else if part.starts_with("<?") {
            continue;
        } else {
            let inner = &part[1..part.len() - 1];
            let (tag, attrib) = xml_to_tag_and_attrib(inner)?;
            if part.ends_with("/>") {
                tokens.push(Token::Start(tag.clone(), attrib));
                tokens.push(Token::End(tag));
            } else {
                stack.push(tag.clone());
                tokens.push(Token::Start(tag, attrib));
            }
        }
    }
    push_text(&mut tokens, &xml[last..]);

    if !stack.is_empty() {
        return Err(ParseError::structural(format!(
            "missing end tags for: {:?}",
            stack
        )));
    }
    Ok(tokens)
}

/// Serialize a token list to xml.
///
/// Elements without content are written as self-closing tags.
pub fn tokens_to_xml(tokens: &[Token]) -> Result<String, ParseError> {
    let mut xml = String::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        match token {
            Token::Text(text) => xml.push_str(&encode_xml(text)),
            Token::End(tag) => {
                if stack.last() != Some(&tag.as_str()) {
                    return Err(ParseError::structural(format!("unexpected end tag: {}", tag)));
                }
                stack.pop();
                xml.push_str(&format!("</{}>", tag));
            }
            Token::Start(tag, attrib) => {
                if matches!(iter.peek(), Some(Token::End(end)) if end == tag) {
                    iter.next();
                    xml.push_str(&format!("<{}{} />", tag, attrib_to_xml(attrib)));
                } else {
                    stack.push(tag);
                    xml.push_str(&format!("<{}{}>", tag, attrib_to_xml(attrib)));
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::structural(format!(
            "missing end tags for: {:?}",
            stack
        )));
    }
    Ok(xml)
}

impl Element {
    /// Serialize to xml, including the xml declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(XML_HEADER);
        // A tree is always well nested, so serialization cannot fail.
        if let Ok(body) = tokens_to_xml(&tree_to_tokens(self)) {
            out.push_str(&body);
        }
        out
    }

    /// Parse an element from xml; an xml declaration and whitespace around
    /// the root element are ignored.
    pub fn from_xml(xml: &str) -> Result<Self, ParseError> {
        let mut tokens = xml_to_tokens(xml)?;
        strip_outer_whitespace(&mut tokens);
        tokens_to_tree(&tokens)
    }
}

fn strip_outer_whitespace(tokens: &mut Vec<Token>) {
    while matches!(tokens.first(), Some(Token::Text(t)) if t.trim().is_empty()) {
        tokens.remove(0);
    }
    while matches!(tokens.last(), Some(Token::Text(t)) if t.trim().is_empty()) {
        tokens.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::attrib;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_xml_to_tokens() {
        let tokens =
            xml_to_tokens(r#"<li indent="1" style="bullet-list">a &amp; b<anchor name="None" /></li>"#)
                .unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::start(
                    "li",
                    attrib([
                        ("indent", AttrValue::Int(1)),
                        ("style", AttrValue::from("bullet-list"))
                    ])
                ),
                Token::text("a & b"),
                Token::start("anchor", attrib([("name", AttrValue::None)])),
                Token::end("anchor"),
                Token::end("li"),
            ]
        );
    }

    #[test]
    fn test_xml_nesting_errors() {
        assert!(xml_to_tokens("<a><b></a></b>").is_err());
        assert!(xml_to_tokens("<a>").is_err());
        assert!(tokens_to_xml(&[Token::end("a")]).is_err());
    }

    #[test]
    fn test_tokens_to_xml_escapes() {
        let tokens = vec![
            Token::start("link", attrib([("href", "a\"b'<c>&")])),
            Token::text("x < y & z"),
            Token::end("link"),
        ];
        assert_eq!(
            tokens_to_xml(&tokens).unwrap(),
            r#"<link href="a&quot;b&apos;&lt;c&gt;&amp;">x &lt; y &amp; z</link>"#
        );
    }

    #[test]
    fn test_tree_xml_round_trip() {
        let xml = "<?xml version='1.0' encoding='utf-8'?>\n<zim-tree>\n<p>this is not a newline: \\name\n<img src=\"./foo.png\" /></p></zim-tree>";
        let tree = Element::from_xml(xml).unwrap();
        assert_eq!(tree.to_xml(), xml);
    }
}
