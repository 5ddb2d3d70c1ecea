//! # Polymath Brief
//!
//! Harvests recent items from RSS/Atom feeds and web-search queries, asks an
//! OpenAI-compatible model to turn each thematic group into a section of a
//! daily brief, and writes the result as a dated Markdown post with front
//! matter for a static site generator.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=sk-... polymath_brief -p ./_posts
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture, one group at a time:
//! 1. **Harvesting**: Fetch every feed and query of the group concurrently (bounded pool)
//! 2. **Filtering**: Drop entries older than the lookback window, clean and cap their text
//! 3. **Generation**: Send the group's items to the model once (retried, rate limited)
//! 4. **Output**: Write the Markdown post (and optionally a JSON copy)

use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod assembler;
mod cli;
mod config;
mod digest;
mod errors;
mod harvest;
mod models;
mod outputs;
mod ratelimit;
mod sources;
mod utils;

use api::{OpenAiChat, RetryAsk, Throttled};
use assembler::Assembler;
use cli::Cli;
use config::DigestConfig;
use digest::DigestGenerator;
use harvest::Harvester;
use outputs::{json, markdown};
use ratelimit::RateLimiter;
use sources::HttpFetcher;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("polymath_brief starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.posts_dir, ?args.json_output_dir, ?args.config, "Parsed CLI arguments");

    // Secrets and group table are checked before any network activity
    let config = match DigestConfig::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration; aborting");
            return Err(e.into());
        }
    };

    // ---- Build the pipeline once; reused for every group ----
    let fetcher = HttpFetcher::new(config.fetch_timeout, config.search_api_key.clone())?;
    let harvester = Harvester::new(fetcher, config.concurrency, config.max_item_chars)?;

    let gen_settings = &config.generation;
    let chat = OpenAiChat::new(
        &gen_settings.api_base,
        gen_settings.api_key.clone(),
        gen_settings.model.clone(),
        gen_settings.temperature,
        gen_settings.timeout,
    )?;
    let limiter = Arc::new(RateLimiter::new(gen_settings.rate_burst, gen_settings.rate_interval));
    let client = RetryAsk::new(
        Throttled::new(chat, limiter),
        gen_settings.retry_attempts,
        gen_settings.retry_delay,
    );
    let generator = DigestGenerator::new(client, config.context_budget).with_lookback(config.lookback);
    info!(
        model = %gen_settings.model,
        retry_attempts = gen_settings.retry_attempts,
        retry_delay = ?gen_settings.retry_delay,
        rate_interval = ?gen_settings.rate_interval,
        "Generation client ready"
    );

    // ---- Harvest and generate, group by group ----
    let issue_date = Local::now().date_naive();
    let digest = Assembler::new(&config, &harvester, &generator)
        .run(Utc::now(), issue_date)
        .await;

    // ---- Outputs ----
    if let Some(json_dir) = config.post.json_output_dir.as_deref() {
        if let Err(e) = json::write_digest(&digest, json_dir).await {
            error!(error = %e, "Failed to write JSON digest");
        }
    }

    let path = match markdown::write_post(&digest, &config.post).await {
        Ok(path) => path,
        Err(e) => {
            error!(posts_dir = %config.post.posts_dir, error = %e, "Failed writing Markdown post");
            return Err(e);
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        path = %path,
        sections = digest.sections.len(),
        "Execution complete"
    );

    Ok(())
}
