//! Bounded-concurrency harvesting and recency filtering.
//!
//! A [`Harvester`] is built once per run and reused for every source group.
//! For each group it fetches all sources concurrently (never more than the
//! configured limit at a time), drops entries older than the lookback window
//! and normalizes the survivors into [`RawItem`]s.
//!
//! # Failure isolation
//!
//! Each source produces a `Result<Vec<RawItem>, FetchError>`. Errors are
//! logged and collapsed to an empty list right here, so a dead feed is
//! indistinguishable from a feed that was never configured.
//!
//! # Missing dates
//!
//! Entries without a usable timestamp are kept. This favours low-frequency
//! sources that never date their entries, at the cost of possibly admitting
//! stale content from them on every run.

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::errors::{ConfigError, FetchError};
use crate::models::{FeedEntry, HarvestResult, ParsedFeed, RawItem, Source};
use crate::sources::SourceFetcher;
use crate::utils::{clean_text, host_of, truncate_chars};

/// Whether an entry published at `published_at` is inside the window ending at `now`.
///
/// The boundary is inclusive and an absent timestamp always qualifies.
pub fn is_within_window(
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback: Duration,
) -> bool {
    match published_at {
        None => true,
        Some(published) => now - published <= lookback,
    }
}

/// Reusable worker pool that fetches, filters and normalizes sources.
#[derive(Debug)]
pub struct Harvester<F> {
    fetcher: F,
    permits: Arc<Semaphore>,
    concurrency_limit: usize,
    max_item_chars: usize,
}

impl<F> Harvester<F>
where
    F: SourceFetcher,
{
    /// Create a harvester allowing at most `concurrency_limit` fetches in flight.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidConcurrency`] when the limit is zero.
    pub fn new(
        fetcher: F,
        concurrency_limit: usize,
        max_item_chars: usize,
    ) -> Result<Self, ConfigError> {
        if concurrency_limit == 0 {
            return Err(ConfigError::InvalidConcurrency(concurrency_limit));
        }
        Ok(Self {
            fetcher,
            permits: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
            max_item_chars,
        })
    }

    #[cfg(test)]
    pub(crate) fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Harvest `sources` against the current time.
    ///
    /// The assembler calls [`Harvester::harvest_at`] instead so a whole run
    /// shares one reference instant.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn harvest(&self, sources: &[Source], lookback: Duration) -> HarvestResult {
        self.harvest_at(sources, lookback, Utc::now()).await
    }

    /// Harvest `sources`, judging every entry against `now`.
    ///
    /// Never fails: sources that cannot be fetched or parsed contribute zero
    /// items. The order of the returned items follows fetch completion.
    #[instrument(level = "info", skip_all, fields(sources = sources.len(), lookback_h = lookback.num_hours()))]
    pub async fn harvest_at(
        &self,
        sources: &[Source],
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> HarvestResult {
        let t0 = Instant::now();

        let per_source: Vec<Vec<RawItem>> = stream::iter(sources)
            .map(|source| async move {
                match self.harvest_source(source, lookback, now).await {
                    Ok(items) => {
                        debug!(source = %source.label(), count = items.len(), "Harvested source");
                        items
                    }
                    Err(e) => {
                        warn!(source = %source.label(), error = %e, "Source failed; contributing no items");
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(self.concurrency_limit)
            .collect()
            .await;

        let items: HarvestResult = per_source.into_iter().flatten().collect();
        info!(
            count = items.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Harvest complete"
        );
        items
    }

    async fn harvest_source(
        &self,
        source: &Source,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<RawItem>, FetchError> {
        let feed = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| FetchError::PoolClosed)?;
            self.fetcher.fetch(source, lookback).await?
        };
        Ok(self.filter_entries(source, feed, lookback, now))
    }

    fn filter_entries(
        &self,
        source: &Source,
        feed: ParsedFeed,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Vec<RawItem> {
        let total = feed.entries.len();
        let feed_title = feed.title;
        let items: Vec<RawItem> = feed
            .entries
            .into_iter()
            .filter(|entry| {
                if entry.published_at.is_none() {
                    debug!(source = %source.label(), title = %entry.title, "Entry has no date; keeping it");
                }
                is_within_window(entry.published_at, now, lookback)
            })
            .map(|entry| self.normalize(source, feed_title.as_deref(), entry))
            .collect();
        debug!(source = %source.label(), total, kept = items.len(), "Filtered entries");
        items
    }

    fn normalize(&self, source: &Source, feed_title: Option<&str>, entry: FeedEntry) -> RawItem {
        let source_title = match source {
            Source::Feed(url) => feed_title
                .map(str::to_string)
                .or_else(|| host_of(url))
                .unwrap_or_else(|| url.clone()),
            Source::Search(query) => host_of(&entry.link)
                .or_else(|| feed_title.map(str::to_string))
                .unwrap_or_else(|| query.clone()),
        };
        RawItem {
            source_title,
            title: clean_text(&entry.title),
            text: truncate_chars(&clean_text(&entry.summary), self.max_item_chars),
            link: entry.link,
            published_at: entry.published_at,
        }
    }
}
