//! Generic rule based parser for wiki-like text formats.
//!
//! A [`RegexParser`] combines a number of [`Rule`]s into a single regular
//! expression and scans the input once. Each match is handed to the rule that
//! produced it; text between matches goes to the "unmatched" handler. Rules
//! can recurse by using another parser as their descent function.
//!
//! The parser has no backtracking: once a rule matches it must produce
//! output. Patterns are compiled with the multi-line and verbose flags, so
//! whitespace in a pattern is ignored and a literal space is written as `\ `.

use std::ops::BitOr;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::ParseError;
use crate::tree::{Attrib, Builder};

/// Handler for a rule match; receives the non-empty capture groups.
pub type ProcessFn = Arc<dyn Fn(&mut dyn Builder, &[&str]) -> Result<(), ParseError> + Send + Sync>;

/// Handler that parses a piece of text, used for descent and unmatched text.
pub type DescentFn = Arc<dyn Fn(&mut dyn Builder, &str) -> Result<(), ParseError> + Send + Sync>;

/// Line and column for a character offset, lines counting from 1 and columns from 0.
pub fn get_line_count(text: &str, offset: usize) -> (usize, usize) {
    if offset == 0 {
        return (1, 0);
    }
    let slice: String = text.chars().take(offset).collect();
    let lines: Vec<&str> = slice.split_inclusive('\n').collect();
    match lines.last() {
        Some(last) if last.ends_with('\n') => (lines.len() + 1, 0),
        Some(last) => (lines.len(), last.chars().count()),
        None => (1, 0),
    }
}

/// Replace unicode line and paragraph separators, which are not seen as line
/// ends by the `^`/`$` anchors.
pub fn fix_unicode_chars(text: &str) -> String {
    text.replace('\u{2028}', "\n").replace('\u{2029}', " ")
}

/// Convert leading runs of `tabstop` spaces into tabs.
pub fn convert_space_to_tab(text: &str, tabstop: usize) -> String {
    let tabstop = tabstop.max(1);
    let pattern = format!(r"(?m)^(\t*)((?: {{{}}})+)", tabstop);
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(text, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], "\t".repeat(caps[2].len() / tabstop))
            })
            .into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Single parser rule: a pattern and what to do with its matches.
#[derive(Clone)]
pub struct Rule {
    tag: Option<String>,
    pattern: String,
    process: Option<ProcessFn>,
    descent: Option<DescentFn>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Rule: {:?}: {}>", self.tag, self.pattern)
    }
}

impl Rule {
    /// Rule that wraps its match in `tag`.
    pub fn new(tag: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            pattern: pattern.into(),
            process: None,
            descent: None,
        }
    }

    /// Rule with a custom handler and no tag.
    pub fn with_handler<F>(pattern: impl Into<String>, process: F) -> Self
    where
        F: Fn(&mut dyn Builder, &[&str]) -> Result<(), ParseError> + Send + Sync + 'static,
    {
        Self {
            tag: None,
            pattern: pattern.into(),
            process: Some(Arc::new(process)),
            descent: None,
        }
    }

    /// Replace the match handler.
    pub fn process<F>(mut self, process: F) -> Self
    where
        F: Fn(&mut dyn Builder, &[&str]) -> Result<(), ParseError> + Send + Sync + 'static,
    {
        self.process = Some(Arc::new(process));
        self
    }

    /// Parse the matched text recursively inside `tag`.
    pub fn descent<F>(mut self, descent: F) -> Self
    where
        F: Fn(&mut dyn Builder, &str) -> Result<(), ParseError> + Send + Sync + 'static,
    {
        self.descent = Some(Arc::new(descent));
        self
    }

    /// Use another parser for the matched text.
    pub fn descent_parser(mut self, parser: RegexParser) -> Self {
        self.descent = Some(parser.into_descent());
        self
    }

    /// The regex pattern of this rule.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn run(&self, builder: &mut dyn Builder, groups: &[&str]) -> Result<(), ParseError> {
        if let Some(process) = &self.process {
            return process(builder, groups);
        }

        let text = groups.first().copied().unwrap_or("");
        let tag = self
            .tag
            .as_deref()
            .ok_or_else(|| ParseError::structural("rule without tag or handler"))?;
        match &self.descent {
            Some(descent) => {
                builder.start(tag, Attrib::new());
                descent(builder, text)?;
                builder.end(tag)
            }
            None => builder.append(tag, Attrib::new(), Some(text)),
        }
    }
}

/// Parser matching multiple rules at once.
#[derive(Clone)]
pub struct RegexParser {
    rules: Vec<Rule>,
    unmatched: Option<DescentFn>,
    compiled: OnceLock<(Regex, Vec<String>)>,
}

impl std::fmt::Debug for RegexParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexParser")
            .field("rules", &self.rules)
            .finish()
    }
}

impl RegexParser {
    /// Create a parser from a list of rules, tried in declaration order.
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
            unmatched: None,
            compiled: OnceLock::new(),
        }
    }

    /// Set a custom handler for text between matches.
    pub fn with_unmatched<F>(mut self, unmatched: F) -> Self
    where
        F: Fn(&mut dyn Builder, &str) -> Result<(), ParseError> + Send + Sync + 'static,
    {
        self.unmatched = Some(Arc::new(unmatched));
        self
    }

    /// Rules of this parser.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Wrap this parser as a descent function for other rules.
    pub fn into_descent(self) -> DescentFn {
        let parser = Arc::new(self);
        Arc::new(move |builder: &mut dyn Builder, text: &str| parser.parse(builder, text))
    }

    fn compiled(&self) -> Result<&(Regex, Vec<String>), ParseError> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }
        if self.rules.is_empty() {
            return Err(ParseError::structural("no rules defined for this parser"));
        }
        let names: Vec<String> = (0..self.rules.len()).map(|i| format!("rule{}", i)).collect();
        let pattern = self
            .rules
            .iter()
            .zip(&names)
            .map(|(rule, name)| format!("(?P<{}>{})", name, rule.pattern))
            .collect::<Vec<_>>()
            .join("|");
        let re = Regex::new(&format!("(?mx){}", pattern))?;
        Ok(self.compiled.get_or_init(|| (re, names)))
    }

    fn process_unmatched(&self, builder: &mut dyn Builder, text: &str) -> Result<(), ParseError> {
        match &self.unmatched {
            Some(handler) => handler(builder, text),
            None => {
                builder.text(text);
                Ok(())
            }
        }
    }

    /// Parse `text` and emit the result into `builder`.
    pub fn parse(&self, builder: &mut dyn Builder, text: &str) -> Result<(), ParseError> {
        if text.is_empty() {
            log::warn!("Parser got empty string");
            return Ok(());
        }

        let (re, names) = self.compiled()?;
        let mut pos = 0;

        while pos <= text.len() {
            let Some(caps) = re.captures_at(text, pos) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let (mstart, mend) = (whole.start(), whole.end());

            if mstart > pos {
                self.process_unmatched(builder, &text[pos..mstart])
                    .map_err(|e| locate_error(e, text, pos, mstart))?;
            }

            let index = names
                .iter()
                .position(|name| caps.name(name).is_some())
                .unwrap_or(0);
            let mut groups: Vec<&str> = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .collect();
            if groups.len() > 1 {
                groups.remove(0);
            }

            self.rules[index]
                .run(builder, &groups)
                .map_err(|e| locate_error(e, text, mstart, mend))?;

            pos = if mend > mstart {
                mend
            } else {
                // Empty match; step over one char so the scan makes progress.
                match text[mend..].chars().next() {
                    Some(c) => {
                        builder.text(&c.to_string());
                        mend + c.len_utf8()
                    }
                    None => return Ok(()),
                }
            };
        }

        if pos < text.len() {
            self.process_unmatched(builder, &text[pos..])
                .map_err(|e| locate_error(e, text, pos, text.len()))?;
        }
        Ok(())
    }
}

// Attach position info to parser errors; other errors are passed through unchanged.
fn locate_error(error: ParseError, text: &str, start: usize, end: usize) -> ParseError {
    let char_start = text[..start].chars().count();
    match error {
        ParseError::Structural(message) => {
            let (line, column) = get_line_count(text, char_start);
            ParseError::Rule {
                message,
                offset: char_start,
                line,
                column,
                snippet: text[start..end].to_string(),
            }
        }
        ParseError::Rule {
            message,
            offset,
            snippet,
            ..
        } => {
            let offset = char_start + offset;
            let (line, column) = get_line_count(text, offset);
            ParseError::Rule {
                message,
                offset,
                line,
                column,
                snippet,
            }
        }
        other => other,
    }
}

impl BitOr for Rule {
    type Output = RegexParser;

    fn bitor(self, rhs: Rule) -> RegexParser {
        RegexParser::new([self, rhs])
    }
}

impl BitOr<Rule> for RegexParser {
    type Output = RegexParser;

    fn bitor(self, rhs: Rule) -> RegexParser {
        let mut rules = self.rules;
        rules.push(rhs);
        RegexParser {
            rules,
            unmatched: self.unmatched,
            compiled: OnceLock::new(),
        }
    }
}

impl BitOr for RegexParser {
    type Output = RegexParser;

    fn bitor(self, rhs: RegexParser) -> RegexParser {
        let mut rules = self.rules;
        rules.extend(rhs.rules);
        RegexParser {
            rules,
            unmatched: self.unmatched,
            compiled: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Element, Node, SimpleTreeBuilder};

    fn parse_to_tree(parser: &RegexParser, text: &str) -> Result<Element, ParseError> {
        let mut builder = SimpleTreeBuilder::new();
        builder.start("root", Attrib::new());
        parser.parse(&mut builder, text)?;
        builder.end("root")?;
        builder.get_root()
    }

    #[test]
    fn test_fix_unicode() {
        assert_eq!(
            fix_unicode_chars("foo\u{2028}bar\u{2029}check\n"),
            "foo\nbar check\n"
        );
    }

    #[test]
    fn test_convert_space_to_tab() {
        assert_eq!(
            convert_space_to_tab("    foo\n\t     bar\n", 4),
            "\tfoo\n\t\t bar\n"
        );
    }

    #[test]
    fn test_get_line_count() {
        let text = "foo\nbar\nbaz\n";
        for (offset, wanted) in [(0, (1, 0)), (3, (1, 3)), (4, (2, 0)), (8, (3, 0)), (9, (3, 1))] {
            assert_eq!(get_line_count(text, offset), wanted);
        }
    }

    #[test]
    fn test_rules_and_unmatched_text() {
        let parser = Rule::new("strong", r"\*\*(.+?)\*\*") | Rule::new("emphasis", r"//(.+?)//");
        let tree = parse_to_tree(&parser, "a **b** c //d//").unwrap();
        let expected = Element::new("root").with_children([
            Node::from("a "),
            Element::new("strong").with_children(["b"]).into(),
            Node::from(" c "),
            Element::new("emphasis").with_children(["d"]).into(),
        ]);
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_descent_and_composition() {
        let inline = RegexParser::new([Rule::new("code", r"''(.+?)''")]);
        let parser = RegexParser::new([Rule::new("h", r"^==\ (.+)$").descent_parser(inline.clone())])
            | inline;
        let tree = parse_to_tree(&parser, "== a ''b''\n''c''").unwrap();
        let expected = Element::new("root").with_children([
            Element::new("h")
                .with_children([
                    Node::from("a "),
                    Element::new("code").with_children(["b"]).into(),
                ])
                .into(),
            Node::from("\n"),
            Element::new("code").with_children(["c"]).into(),
        ]);
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_earlier_rule_wins() {
        let parser = Rule::new("first", r"(ab)") | Rule::new("second", r"(abc)");
        let tree = parse_to_tree(&parser, "abc").unwrap();
        assert_eq!(tree.elements().next().map(|e| e.tag.as_str()), Some("first"));
    }

    #[test]
    fn test_error_is_located() {
        let parser = RegexParser::new([Rule::with_handler(r"(!!)", |_, _| {
            Err(ParseError::structural("bang"))
        })]);
        let err = parse_to_tree(&parser, "foo\nbar !! baz").unwrap_err();
        match err {
            ParseError::Rule {
                line,
                column,
                snippet,
                ..
            } => {
                assert_eq!((line, column), (2, 4));
                assert_eq!(snippet, "!!");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_errors_pass_through() {
        let parser = RegexParser::new([Rule::with_handler(r"(x)", |_, _| {
            Err(ParseError::InvalidDate("x".to_string()))
        })]);
        let err = parse_to_tree(&parser, "x").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate(_)));
    }
}
