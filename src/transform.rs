//! Markup clean-up for downloaded book pages
//!
//! Pages come back referencing the remote file-serving API and carrying markup
//! that EPUB readers reject. [`clean_markup`] is a pure rewrite that strips
//! `<script>` and `<link>` elements, removes the API file-serving prefix for
//! the book, self-closes unterminated void elements, and re-roots relative
//! image references against the page's depth in the book tree.
//!
//! Only applied to `application/xhtml+xml` and `text/html` resources with
//! textual content.

use crate::types::BookId;
use regex::Regex;
use std::sync::OnceLock;

/// Void elements that must be self-closed in XHTML
const VOID_TAGS: [&str; 6] = ["img", "br", "hr", "col", "input", "meta"];

/// True when a media type denotes markup that should be cleaned
pub fn is_transformable(media_type: &str) -> bool {
    media_type == "application/xhtml+xml" || media_type == "text/html"
}

/// Relative prefix that re-roots a reference from `path`'s directory depth
///
/// A resource at `text/part2/ch05.html` (depth 2) gets `"../../"`.
pub fn relative_prefix(path: &str) -> String {
    "../".repeat(path.matches('/').count())
}

/// Clean one markup resource
///
/// `book_id` is the id the file-serving API uses for this book; `path` is the
/// resource's manifest path, which determines the relative prefix for image
/// references.
pub fn clean_markup(content: &str, book_id: &BookId, path: &str) -> String {
    let mut content = script_re()
        .replace_all(content, "")
        .into_owned();
    content = link_re().replace_all(&content, "").into_owned();

    let api_prefix = format!("/api/v2/epubs/{book_id}/files/");
    content = content.replace(&api_prefix, "");

    for (tag, re) in VOID_TAGS.iter().zip(void_res()) {
        content = re
            .replace_all(&content, |caps: &regex::Captures<'_>| {
                format!("<{tag}{}/>", &caps[1])
            })
            .into_owned();
    }

    let prefix = relative_prefix(path);
    if !prefix.is_empty() {
        content = img_src_re()
            .replace_all(&content, |caps: &regex::Captures<'_>| {
                rewrite_reference(&caps[1], &caps[2], &prefix)
            })
            .into_owned();
        content = image_href_re()
            .replace_all(&content, |caps: &regex::Captures<'_>| {
                rewrite_reference(&caps[1], &caps[2], &prefix)
            })
            .into_owned();
    }

    content
}

/// Prefix a reference unless it is absolute, a data URI, or http(s)
fn rewrite_reference(head: &str, value: &str, prefix: &str) -> String {
    if value.starts_with("http") || value.starts_with("data:") || value.starts_with('/') {
        format!("{head}{value}")
    } else {
        format!("{head}{prefix}{value}")
    }
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap())
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<link[^>]*>").unwrap())
}

/// One unterminated-tag regex per void element, same order as [`VOID_TAGS`]
fn void_res() -> &'static [Regex; 6] {
    static RES: OnceLock<[Regex; 6]> = OnceLock::new();
    RES.get_or_init(|| {
        VOID_TAGS.map(|tag| {
            // Requires at least one attribute character; a bare `<br>` stays
            // as-is, matching the established rewrite contract
            Regex::new(&format!(r"(?i)<{tag}([^>]*[^/])>")).unwrap()
        })
    })
}

fn img_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(<img\b[^>]*?src=")([^"]*)"#).unwrap())
}

fn image_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(<image\b[^>]*?href=")([^"]*)"#).unwrap())
}
