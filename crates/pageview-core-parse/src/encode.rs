//! Encoding and decoding of strings and URLs.
//!
//! URL encoding comes in three flavours, see [`UrlEncodeMode`]. The
//! "readable" mode only touches spaces and non-ASCII characters, so it can be
//! applied to URLs that are already encoded.

use std::sync::OnceLock;

use regex::Regex;

/// Which characters are (de)coded by [`url_encode`] and [`url_decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlEncodeMode {
    /// Encode all unsafe characters.
    Data,
    /// Encode all unsafe characters except `/`.
    #[default]
    Path,
    /// Encode only spaces and non-ASCII characters.
    Readable,
}

fn ascii_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // All ASCII codes <= 127 start with %0 .. %7
    RE.get_or_init(|| Regex::new(r"(?:%[0-7][a-fA-F0-9])+").expect("valid url regex"))
}

fn utf8_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:%[a-fA-F89][a-fA-F0-9])+").expect("valid url regex"))
}

fn escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\(.)").expect("valid escape regex"))
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

fn push_percent_encoded(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{:02X}", byte));
    }
}

/// Replace non-standard characters in `url` with hex codes.
///
/// [`UrlEncodeMode::Data`] and [`UrlEncodeMode::Path`] must only be used on
/// strings known not to be encoded yet.
pub fn url_encode(url: &str, mode: UrlEncodeMode) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        let keep = match mode {
            UrlEncodeMode::Data => is_unreserved(c),
            UrlEncodeMode::Path => is_unreserved(c) || c == '/',
            UrlEncodeMode::Readable => is_unreserved(c) || (c != ' ' && c.is_ascii()),
        };
        if keep {
            out.push(c);
        } else {
            push_percent_encoded(&mut out, c);
        }
    }
    out
}

fn hex_pairs(run: &str) -> impl Iterator<Item = u8> + '_ {
    run.as_bytes()
        .chunks(3)
        .filter_map(|chunk| std::str::from_utf8(&chunk[1..]).ok())
        .filter_map(|hex| u8::from_str_radix(hex, 16).ok())
}

/// Replace hex sequences in `url` by the characters they encode.
///
/// Non-ASCII byte sequences are only decoded when the whole result is valid
/// UTF-8; otherwise they are left untouched.
pub fn url_decode(url: &str, mode: UrlEncodeMode) -> String {
    let url = match mode {
        UrlEncodeMode::Readable => url.replace("%20", " "),
        UrlEncodeMode::Data | UrlEncodeMode::Path => ascii_run_re()
            .replace_all(url, |caps: &regex::Captures<'_>| {
                hex_pairs(&caps[0]).map(char::from).collect::<String>()
            })
            .into_owned(),
    };

    let mut bytes = Vec::with_capacity(url.len());
    let mut last = 0;
    for m in utf8_run_re().find_iter(&url) {
        bytes.extend_from_slice(url[last..m.start()].as_bytes());
        bytes.extend(hex_pairs(m.as_str()));
        last = m.end();
    }
    bytes.extend_from_slice(url[last..].as_bytes());

    String::from_utf8(bytes).unwrap_or(url)
}

/// Escape newline, tab, carriage return, backslash and any of `chars` with a backslash.
pub fn escape_string(string: &str, chars: &str) -> String {
    let mut out = String::with_capacity(string.len());
    for c in string.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            c if chars.contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Resolve backslash escapes; `\n`, `\r` and `\t` map to control characters,
/// any other escaped character is kept literally.
pub fn unescape_string(string: &str) -> String {
    escape_re()
        .replace_all(string, |caps: &regex::Captures<'_>| match &caps[1] {
            "n" => "\n".to_string(),
            "r" => "\r".to_string(),
            "t" => "\t".to_string(),
            other => other.to_string(),
        })
        .into_owned()
}

/// Split `string` on `delim` while respecting backslash escapes.
///
/// A delimiter preceded by an uneven number of backslashes is escaped and does
/// not split. Escapes are kept in the resulting parts.
pub fn split_escaped_string(string: &str, delim: char) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut escaped = false;
    for piece in string.split(delim) {
        match parts.last_mut() {
            Some(last) if escaped => {
                last.push(delim);
                last.push_str(piece);
            }
            _ => parts.push(piece.to_string()),
        }
        let backslashes = piece.chars().rev().take_while(|&c| c == '\\').count();
        escaped = backslashes % 2 == 1;
    }
    parts
}
