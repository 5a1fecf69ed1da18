//! Classification of link targets and URL autolink detection.

use std::sync::OnceLock;

use regex::Regex;

use crate::encode::{UrlEncodeMode, url_decode, url_encode};

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid link regex"))
        }
    };
}

// "scheme:"
static_regex!(is_uri_re, r"^(\w[\w+\-.]*):");
// "scheme://"
static_regex!(is_url_re, r"^(\w[\w+\-.]*)://");
// "www." followed by 2 or more domain sections
static_regex!(is_www_link_re, r"^www\.([\w\-]+\.)+[\w\-]+");
// "mailto:" address or name "@" host, but not other uris like mid: and cid:
static_regex!(is_email_re, r"^(mailto:\S+|[^\s:]+)@\S+\.\w+(\?.+)?$");
// / ~/ ./ ../ ~user/ .\ ..\ ~\ ~user\ X:\
static_regex!(is_path_re, r"^(/|\.\.?[/\\]|~.*[/\\]|[A-Za-z]:\\)");
// \\host\share or smb://host/share
static_regex!(is_win32_share_re, r"^(\\\\[^\\]+\\.+|smb://)");
// identifier "?" path
static_regex!(is_interwiki_re, r"^(\w[\w+\-.]*)\?(.*)");

// Autolink prefixes following the GFM extension plus any "scheme://" and "file:/"
static_regex!(url_start_re, r"^(?:www\.|\w[\w+\-.]*://|file:/)");
static_regex!(url_email_re, r"^(?:mailto:)?[\w.+\-]+@[\w\-]+(?:\.[\w\-]+)+");
static_regex!(entity_tail_re, r"&\w+;$");

/// Scheme for URIs, URLs and email addresses, if any.
pub fn uri_scheme(link: &str) -> Option<String> {
    if is_email_re().is_match(link) {
        return Some("mailto".to_string());
    }
    is_uri_re()
        .captures(link)
        .map(|caps| caps[1].to_string())
}

/// Link category of `link`.
///
/// Categories are `notebook`, `file`, `mailto`, `http`, `mid`, `cid`, `smb`,
/// `interwiki`, `page` or the URL scheme itself (e.g. `https`, `file+ssh`).
pub fn link_type(link: &str) -> String {
    if let Some(caps) = is_url_re().captures(link) {
        if link.starts_with("zim+") {
            "notebook".to_string()
        } else {
            caps[1].to_string()
        }
    } else if link.starts_with("file:/") {
        "file".to_string()
    } else if is_email_re().is_match(link) {
        "mailto".to_string()
    } else if is_www_link_re().is_match(link) {
        "http".to_string()
    } else if link.contains('@') && (link.starts_with("mid:") || link.starts_with("cid:")) {
        link[..3].to_string()
    } else if is_win32_share_re().is_match(link) {
        "smb".to_string()
    } else if is_path_re().is_match(link) {
        "file".to_string()
    } else if is_interwiki_re().is_match(link) {
        "interwiki".to_string()
    } else {
        "page".to_string()
    }
}

/// Translate a windows share path to the platform specific form.
///
/// On windows `smb://host/share` becomes `\\host\share`, elsewhere the reverse
/// translation is done. Other paths are returned unchanged.
pub fn normalize_win32_share(path: &str) -> String {
    if cfg!(windows) {
        if let Some(rest) = path.strip_prefix("smb:") {
            return url_decode(&rest.replace('/', "\\"), UrlEncodeMode::Path);
        }
    } else if path.starts_with("\\\\") {
        return format!("smb:{}", url_encode(&path.replace('\\', "/"), UrlEncodeMode::Path));
    }
    path.to_string()
}

fn domain_is_valid(domain: &str) -> bool {
    // No "_" in the last two domain labels
    domain
        .rsplit('.')
        .take(2)
        .all(|label| !label.contains('_'))
}

fn strip_trailing(mut url: &str) -> &str {
    loop {
        let Some(last) = url.chars().last() else {
            return url;
        };
        if "?!.,:*_~'\"".contains(last) {
            url = &url[..url.len() - 1];
        } else if last == ')' && url.matches(')').count() > url.matches('(').count() {
            url = &url[..url.len() - 1];
        } else if last == ';' {
            match entity_tail_re().find(url) {
                Some(m) => url = &url[..m.start()],
                None => url = &url[..url.len() - 1],
            }
        } else {
            return url;
        }
    }
}

/// Match an URL at the start of `text` following the GFM autolink rules.
///
/// Returns the matched URL with trailing punctuation stripped, or `None`.
pub fn match_url_link(text: &str) -> Option<&str> {
    if let Some(m) = url_start_re().find(text) {
        let end = text
            .find(|c: char| c.is_whitespace() || c == '<')
            .unwrap_or(text.len());
        let url = strip_trailing(&text[..end]);
        if url.len() <= m.end() {
            return None;
        }

        let rest = &url[m.end()..];
        if m.as_str() == "www." {
            let domain = rest.split(['/', '?', '#']).next().unwrap_or("");
            let full = format!("www.{}", domain);
            if !is_www_link_re().is_match(&full) || !domain_is_valid(&full) {
                return None;
            }
        } else if m.as_str().ends_with("://") {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            if !domain_is_valid(host) {
                return None;
            }
        }
        return Some(url);
    }

    let m = url_email_re().find(text)?;
    let email = m.as_str();
    if email.ends_with(['-', '_']) {
        return None;
    }
    Some(email)
}

/// Returns `true` if the whole of `text` is an URL.
pub fn is_url_link(text: &str) -> bool {
    match_url_link(text) == Some(text)
}
