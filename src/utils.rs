//! Utility functions for text cleanup, truncation and file system checks.
//!
//! - Markup stripping for feed summaries and titles, whitespace cleanup for plain text
//! - Character-based truncation (never splits a UTF-8 sequence)
//! - Host extraction used as a fallback source title
//! - Output directory validation

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][A-Za-z0-9:-]*(\s[^<>]*)?/?>").unwrap());

/// Elements whose boundaries separate words.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section",
    "table", "td", "th", "tr", "ul",
];

/// Collapse runs of whitespace and trim. For text that is already plain.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Escape every `<` that does not open a well-formed tag or comment, so the
/// HTML parser keeps it as text (`n<k` in a maths title).
fn escape_stray_angles(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for tag in TAG.find_iter(html) {
        out.push_str(&html[last..tag.start()].replace('<', "&lt;"));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&html[last..].replace('<', "&lt;"));
    out
}

/// Strip HTML tags, decode entities and collapse whitespace.
///
/// Inline elements join their neighbours without a gap (`Multi<i>core</i>`
/// reads `Multicore`); block elements and line breaks separate words. Script
/// and style contents are dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(strip_markup("<p>Chip &amp; wafer</p>"), "Chip & wafer");
/// ```
pub fn strip_markup(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return clean_text(html);
    }
    let fragment = Html::parse_fragment(&escape_stray_angles(html));
    let mut text = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => text.push(' '),
            Node::Text(chunk) => {
                let hidden = node
                    .parent()
                    .and_then(|parent| parent.value().as_element())
                    .is_some_and(|parent| matches!(parent.name(), "script" | "style"));
                if !hidden {
                    text.push_str(chunk);
                }
            }
            _ => {}
        }
    }
    clean_text(&text)
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` characters with an ellipsis and the number of
/// dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        kept
    } else {
        let dropped = s.len() - kept.len();
        format!("{kept}…(+{dropped} bytes)")
    }
}

/// Host part of a URL, without a leading `www.`.
///
/// Used as the source title when a feed does not declare one.
pub fn host_of(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

/// Convert a title to a URL-friendly slug.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify_title("Hello World"), "hello-world");
/// assert_eq!(slugify_title("Test-Article!"), "test-article");
/// ```
pub fn slugify_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .replace(' ', "-")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then writes and removes a probe
/// file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
