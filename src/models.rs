//! Data models shared by the harvester, the digest generator and the outputs.
//!
//! - [`Source`]: one unit of harvesting work (a feed URL or a search query)
//! - [`FeedEntry`] / [`ParsedFeed`]: what a source yields before filtering
//! - [`RawItem`]: a cleaned, bounded entry that passed the lookback filter
//! - [`GeneratedSection`] / [`Digest`]: the generated output of one run

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Something the harvester can fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// An RSS, RDF or Atom feed URL.
    Feed(String),
    /// A web-search query.
    Search(String),
}

impl Source {
    /// The URL or query, for logging.
    pub fn label(&self) -> &str {
        match self {
            Source::Feed(url) => url,
            Source::Search(query) => query,
        }
    }
}

/// A single entry of a feed or search result list, as parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Summary or content as plain text.
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A parsed feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// A harvested item, ready to be serialized into a group's text blob.
///
/// `text` has already been stripped of markup and capped at the configured
/// character ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub source_title: String,
    pub link: String,
    pub title: String,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// One group's harvested items. Order follows fetch completion.
pub type HarvestResult = Vec<RawItem>;

/// The generated body for one source group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSection {
    pub section_title: String,
    pub body: String,
}

/// Everything produced by a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub issue_date: NaiveDate,
    pub sections: Vec<GeneratedSection>,
}
