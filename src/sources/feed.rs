//! RSS 2.0, RSS 1.0 (RDF), Atom and JSON Feed parsing.
//!
//! Documents are parsed with `feed-rs`; this module only maps its model onto
//! the harvester's [`FeedEntry`] and cleans text fields.
//!
//! # Field mapping
//!
//! | Field | Taken from |
//! |-------|------------|
//! | title | entry title |
//! | link | `rel="alternate"` (or rel-less) link, else the first link |
//! | summary | summary, else content body |
//! | published | published, else updated |
//!
//! Text declared as `text/plain` is only whitespace-normalized; anything else
//! goes through the HTML stripper.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use feed_rs::model::{Entry, Link, Text};
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::{FeedEntry, ParsedFeed};
use crate::utils::{clean_text, strip_markup};

static WEEKDAY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+,?\s+").unwrap());
static ZONE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\b(UTC|UT|GMT|Z)$").unwrap());
static COLON_OFFSET: Lazy<Regex> = Lazy::new(|| Regex::new(r"([+-]\d{2}):(\d{2})$").unwrap());

const ZONED_FORMATS: &[&str] = &[
    "%d %B %Y %H:%M:%S %z",
    "%d %B %Y %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

fn is_plain(content_type: &str) -> bool {
    content_type == "text/plain"
}

fn text_of(text: &Text) -> String {
    if is_plain(&text.content_type.essence().to_string()) {
        clean_text(&text.content)
    } else {
        strip_markup(&text.content)
    }
}

fn pick_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
}

fn map_entry(entry: Entry) -> FeedEntry {
    let summary = match (&entry.summary, &entry.content) {
        (Some(summary), _) if !summary.content.trim().is_empty() => text_of(summary),
        (_, Some(content)) => match content.body.as_deref() {
            Some(body) if is_plain(&content.content_type.essence().to_string()) => clean_text(body),
            Some(body) => strip_markup(body),
            None => String::new(),
        },
        _ => String::new(),
    };
    FeedEntry {
        title: entry.title.as_ref().map(text_of).unwrap_or_default(),
        link: pick_link(&entry.links)
            .map(|l| l.href.clone())
            .unwrap_or_default(),
        summary,
        published_at: entry.published.or(entry.updated),
    }
}

/// Parse a feed document into its title and entries.
///
/// # Errors
///
/// A message describing why the document is not a feed (HTML pages, empty
/// bodies and malformed XML all end up here).
pub fn parse_feed(body: &str) -> Result<ParsedFeed, String> {
    let feed = parser::Builder::new()
        .timestamp_parser(parse_timestamp)
        .build()
        .parse(body.as_bytes())
        .map_err(|e| e.to_string())?;

    let title = feed
        .title
        .as_ref()
        .map(text_of)
        .filter(|t| !t.is_empty());
    let entries: Vec<FeedEntry> = feed.entries.into_iter().map(map_entry).collect();
    debug!(entries = entries.len(), ?title, "Parsed feed");
    Ok(ParsedFeed { title, entries })
}

/// Lenient timestamp parsing for feed and search dates.
///
/// Accepts RFC 3339 and RFC 2822 plus the variants real feeds publish:
/// named zones (`UTC`, `GMT`), offsets with a colon, long or wrong weekday
/// names, ISO dates with `+0000`, naive ISO layouts (taken as UTC) and bare
/// dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = WEEKDAY_PREFIX.replace(raw, "");
    let normalized = ZONE_NAME.replace(&normalized, " +0000");
    let normalized = COLON_OFFSET.replace(&normalized, "$1$2");
    for format in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    debug!(raw, "Unrecognised timestamp format");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Semiconductor Digest</title>
    <link>https://example.com</link>
    <item>
      <title>TSMC &amp; the 2nm ramp</title>
      <link>https://example.com/a?x=1&amp;y=2</link>
      <description><![CDATA[<p>Yields are <b>up</b>. Multi<i>core</i> chips</p>]]></description>
      <pubDate>Tue, 06 May 2025 14:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Undated item</title>
      <link>https://example.com/b</link>
      <content:encoded>&lt;p&gt;Only full content&lt;/p&gt;</content:encoded>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="text">arXiv physics</title>
  <id>urn:example:arxiv</id>
  <updated>2025-05-06T11:00:00Z</updated>
  <entry>
    <id>urn:example:1</id>
    <title type="text">Bound holds for n&lt;k</title>
    <link rel="related" href="https://example.org/related"/>
    <link rel="alternate" href="https://example.org/abs/1"/>
    <summary type="html">A &lt;i&gt;lattice&lt;/i&gt; result</summary>
    <updated>2025-05-06T10:00:00Z</updated>
    <published>2025-05-05T08:00:00+02:00</published>
  </entry>
  <entry>
    <id>urn:example:2</id>
    <title>Only updated</title>
    <link href="https://example.org/abs/2"/>
    <updated>2025-05-06T11:00:00Z</updated>
  </entry>
</feed>"#;

    const RDF: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://example.net">
    <title>Macro Notes</title>
    <link>https://example.net</link>
    <description>Notes</description>
  </channel>
  <item rdf:about="https://example.net/1">
    <title>CBDC pilot</title>
    <link>https://example.net/1</link>
    <description>Pilot expands</description>
  </item>
</rdf:RDF>"#;

    fn rss_with_date(date: &str) -> String {
        format!(
            r#"<rss version="2.0"><channel><title>Dates</title><item><title>Old</title><link>https://example.com/old</link><pubDate>{date}</pubDate></item></channel></rss>"#
        )
    }

    #[test]
    fn test_parse_rss() {
        let feed = parse_feed(RSS).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Semiconductor Digest"));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.title, "TSMC & the 2nm ramp");
        assert_eq!(first.link, "https://example.com/a?x=1&y=2");
        assert_eq!(first.summary, "Yields are up. Multicore chips");
        assert_eq!(
            first.published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap())
        );

        let second = &feed.entries[1];
        assert_eq!(second.summary, "Only full content");
        assert_eq!(second.published_at, None);
    }

    #[test]
    fn test_parse_atom_prefers_alternate_link_and_published() {
        let feed = parse_feed(ATOM).unwrap();
        assert_eq!(feed.title.as_deref(), Some("arXiv physics"));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.title, "Bound holds for n<k");
        assert_eq!(first.link, "https://example.org/abs/1");
        assert_eq!(first.summary, "A lattice result");
        assert_eq!(
            first.published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 5, 6, 0, 0).unwrap())
        );

        let second = &feed.entries[1];
        assert_eq!(second.link, "https://example.org/abs/2");
        assert_eq!(
            second.published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 11, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_rdf() {
        let feed = parse_feed(RDF).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Macro Notes"));
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].title, "CBDC pilot");
        assert_eq!(feed.entries[0].link, "https://example.net/1");
        assert_eq!(feed.entries[0].summary, "Pilot expands");
    }

    #[test]
    fn test_parse_rejects_html_page() {
        assert!(parse_feed("<html><body>Service unavailable</body></html>").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_document() {
        assert!(parse_feed("").is_err());
    }

    #[test]
    fn test_named_zone_pub_date_is_parsed() {
        let feed = parse_feed(&rss_with_date("Mon, 01 Jan 2024 00:00:00 UTC")).unwrap();
        assert_eq!(
            feed.entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("Tue, 06 May 2025 14:30:00 +0000"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06T16:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06 14:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-05-06"),
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("  "), None);
    }

    #[test]
    fn test_parse_timestamp_real_feed_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("Tue, 06 May 2025 14:30:00 UTC"), Some(expected));
        assert_eq!(parse_timestamp("Tue, 06 May 2025 14:30:00 +00:00"), Some(expected));
        assert_eq!(parse_timestamp("Tuesday, 06 May 2025 14:30:00 GMT"), Some(expected));
        assert_eq!(parse_timestamp("Mon, 06 May 2025 16:30:00 +0200"), Some(expected));
        assert_eq!(parse_timestamp("6 May 2025 14:30 GMT"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06T14:30:00+0000"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06T14:30:00.250+0000").map(|d| d.timestamp()), Some(expected.timestamp()));
        assert_eq!(parse_timestamp("2025-05-06 14:30:00 UTC"), Some(expected));
    }
}
