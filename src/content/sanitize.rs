//! Allow-list sanitizer for rich-text fragments
//!
//! Body fragments come from the content service as markup. Before they are
//! inserted into a page, every tag is checked against an allow-list: known
//! formatting tags survive with a reduced attribute set, unknown tags are
//! dropped (their text is kept), and executable elements are removed along
//! with everything inside them.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref BLOCKED_RE: Regex =
        Regex::new(r"(?is)<(script|style|iframe|object|embed|noscript|template)\b[^>]*>.*?</\s*(script|style|iframe|object|embed|noscript|template)\s*>")
            .unwrap();
    static ref BLOCKED_OPEN_RE: Regex =
        Regex::new(r"(?i)<\s*/?\s*(script|style|iframe|object|embed|noscript|template)\b[^>]*>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^<>]*)>").unwrap();
    static ref ATTR_RE: Regex =
        Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .unwrap();
}

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "del", "em", "h1", "h2", "h3", "h4", "h5", "h6",
    "hr", "i", "img", "li", "ol", "p", "pre", "s", "span", "strong", "sub", "sup", "u", "ul",
];

const VOID_TAGS: &[&str] = &["br", "hr", "img"];

fn allowed_attributes(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "title", "target", "rel"],
        "img" => &["src", "alt", "title", "width", "height"],
        "abbr" => &["title"],
        _ => &[],
    }
}

/// Sanitize a markup fragment
pub fn sanitize_html(input: &str) -> String {
    let without_comments = COMMENT_RE.replace_all(input, "");
    let without_blocked = BLOCKED_RE.replace_all(&without_comments, "");
    let without_stray = BLOCKED_OPEN_RE.replace_all(&without_blocked, "");

    let mut out = String::with_capacity(without_stray.len());
    let mut last = 0;
    for caps in TAG_RE.captures_iter(&without_stray) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_text(&without_stray[last..whole.start()]));
        out.push_str(&rewrite_tag(&caps));
        last = whole.end();
    }
    out.push_str(&escape_text(&without_stray[last..]));
    out
}

fn rewrite_tag(caps: &Captures) -> String {
    let closing = !caps[1].is_empty();
    let tag = caps[2].to_ascii_lowercase();

    if !ALLOWED_TAGS.contains(&tag.as_str()) {
        return String::new();
    }

    if closing {
        if VOID_TAGS.contains(&tag.as_str()) {
            return String::new();
        }
        return format!("</{}>", tag);
    }

    let allowed = allowed_attributes(&tag);
    let mut out = format!("<{}", tag);
    let mut has_target = false;
    let mut has_rel = false;
    for attr in ATTR_RE.captures_iter(&caps[3]) {
        let name = attr[1].to_ascii_lowercase();
        if !allowed.contains(&name.as_str()) {
            continue;
        }
        let value = attr
            .get(2)
            .or_else(|| attr.get(3))
            .or_else(|| attr.get(4))
            .map(|m| m.as_str())
            .unwrap_or("");
        if (name == "href" || name == "src") && !is_safe_url(value) {
            continue;
        }
        has_target |= name == "target";
        has_rel |= name == "rel";
        out.push_str(&format!(r#" {}="{}""#, name, escape_attribute(value)));
    }
    if has_target && !has_rel {
        out.push_str(r#" rel="noopener""#);
    }
    out.push('>');
    out
}

/// Only web, mail and relative URLs may appear in links and images
fn is_safe_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    match compact.find(':') {
        None => true,
        Some(colon) => {
            // A colon after a path or query separator is not a scheme
            if compact[..colon].contains(['/', '?', '#']) {
                return true;
            }
            matches!(&compact[..colon], "http" | "https" | "mailto")
        }
    }
}

/// Angle brackets outside of recognised tags are text, never markup
fn escape_text(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
