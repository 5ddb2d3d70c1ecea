//! Sequential driver: harvest then generate, one group at a time.
//!
//! Groups are processed in configuration order and each generation call is
//! awaited before the next group starts, so at most one call to the
//! generation service is ever in flight. Spacing between calls is the job of
//! the rate limiter wrapped around the client, not of this loop.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, info_span, Instrument};

use crate::api::AskAsync;
use crate::config::{DigestConfig, render_prompt};
use crate::digest::DigestGenerator;
use crate::harvest::Harvester;
use crate::models::{Digest, GeneratedSection};
use crate::sources::SourceFetcher;

pub struct Assembler<'a, F, A> {
    config: &'a DigestConfig,
    harvester: &'a Harvester<F>,
    generator: &'a DigestGenerator<A>,
}

impl<'a, F, A> Assembler<'a, F, A>
where
    F: SourceFetcher,
    A: AskAsync,
{
    pub fn new(
        config: &'a DigestConfig,
        harvester: &'a Harvester<F>,
        generator: &'a DigestGenerator<A>,
    ) -> Self {
        Self {
            config,
            harvester,
            generator,
        }
    }

    /// Build the digest for `issue_date`, filtering items against `now`.
    pub async fn run(&self, now: DateTime<Utc>, issue_date: NaiveDate) -> Digest {
        let mut sections = Vec::with_capacity(self.config.groups.len());

        for (index, group) in self.config.groups.iter().enumerate() {
            let span = info_span!("group", index, name = %group.name);
            let section = async {
                let items = self
                    .harvester
                    .harvest_at(&group.sources(), self.config.lookback, now)
                    .await;
                let prompt = render_prompt(
                    self.config.prompt_for(group),
                    &group.section_title,
                    issue_date,
                    self.config.lookback,
                );
                let body = self
                    .generator
                    .generate(&group.section_title, &items, &prompt)
                    .await;
                info!(items = items.len(), body_chars = body.chars().count(), "Section ready");
                GeneratedSection {
                    section_title: group.section_title.clone(),
                    body,
                }
            }
            .instrument(span)
            .await;
            sections.push(section);
        }

        Digest {
            issue_date,
            sections,
        }
    }
}
