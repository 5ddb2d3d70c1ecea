//! Turning one group's harvested items into a generated section body.
//!
//! The generator never fails: an empty item list short-circuits to
//! [`NO_SIGNAL_SENTINEL`] without calling the service, and a failed call
//! (after whatever retries the client performs) becomes
//! [`GENERATION_ERROR_PLACEHOLDER`].

use chrono::Duration;
use itertools::Itertools;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::api::{AskAsync, Prompt};
use crate::models::RawItem;
use crate::utils::truncate_chars;

/// Section body used when a group harvested nothing in the default 24 hour window.
pub const NO_SIGNAL_SENTINEL: &str = "NESSUN SEGNALE RILEVATO NELLE ULTIME 24H";

/// The no-signal sentinel naming a lookback of `hours`.
pub fn no_signal_sentinel(hours: i64) -> String {
    format!("NESSUN SEGNALE RILEVATO NELLE ULTIME {hours}H")
}

/// Section body used when generation failed irrecoverably.
pub const GENERATION_ERROR_PLACEHOLDER: &str =
    "> **[ERRORE DI GENERAZIONE]** Sezione non disponibile in questa edizione.";

/// Separator line between items in the text blob.
pub const ITEM_SEPARATOR: &str = "\n---\n";

const USER_PREFIX: &str = "Ecco le notizie grezze raccolte:\n";

/// Render a single item the way the model sees it.
fn render_item(item: &RawItem) -> String {
    format!(
        "SOURCE: {} - {}\n{}\nURL: {}",
        item.source_title, item.title, item.text, item.link
    )
}

/// Join items into one blob and cap it at `budget` characters.
pub fn build_blob(items: &[RawItem], budget: usize) -> String {
    let blob = items.iter().map(render_item).join(ITEM_SEPARATOR);
    truncate_chars(&blob, budget)
}

/// Generates section bodies through an [`AskAsync`] client.
#[derive(Debug)]
pub struct DigestGenerator<A> {
    client: A,
    context_budget: usize,
    sentinel: String,
}

impl<A> DigestGenerator<A>
where
    A: AskAsync,
{
    pub fn new(client: A, context_budget: usize) -> Self {
        Self {
            client,
            context_budget,
            sentinel: NO_SIGNAL_SENTINEL.to_string(),
        }
    }

    /// Name `lookback` in the no-signal sentinel instead of the default 24 hours.
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.sentinel = no_signal_sentinel(lookback.num_hours());
        self
    }

    /// Generate the body of one section from its items and rendered prompt.
    #[instrument(level = "info", skip(self, items, prompt), fields(item_count = items.len()))]
    pub async fn generate(&self, section_title: &str, items: &[RawItem], prompt: &str) -> String {
        if items.is_empty() {
            info!("No items harvested; using sentinel without calling the model");
            return self.sentinel.clone();
        }

        let blob = build_blob(items, self.context_budget);
        let user = format!("{USER_PREFIX}{blob}");
        let t0 = Instant::now();

        match self
            .client
            .ask(Prompt {
                system: prompt,
                user: &user,
            })
            .await
        {
            Ok(body) => {
                info!(
                    blob_chars = blob.chars().count(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Section generated"
                );
                body.trim().to_string()
            }
            Err(e) => {
                error!(
                    error = %e,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Generation failed; using placeholder"
                );
                GENERATION_ERROR_PLACEHOLDER.to_string()
            }
        }
    }
}
