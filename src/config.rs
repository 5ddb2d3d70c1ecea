//! Run configuration: source groups, prompts and tuning parameters.
//!
//! A [`DigestConfig`] is built once in `main` from the parsed [`Cli`] and an
//! optional YAML group file, validated, and then only ever borrowed. When no
//! group file is given the groups in `config/groups.yaml` (compiled in) are
//! used.

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{info, instrument};

use crate::cli::Cli;
use crate::errors::ConfigError;
use crate::models::Source;

const BUILTIN_GROUPS: &str = include_str!("../config/groups.yaml");

/// Default per-section prompt. `{section}`, `{date}` and `{hours}` are substituted.
pub const DEFAULT_PROMPT: &str = r#"SEI: "The Polymath", un analista di intelligence strategica.
IL TUO COMPITO: Scrivere la sezione "{section}" della rassegna quotidiana "THE POLYMATH BRIEF".
DATA DI OGGI: {date}

INPUT:
Riceverai una lista di notizie grezze ("raw_context").

REGOLE ASSOLUTE:
1. SELEZIONE RIGIDA: Ignora gossip, politica partitica, sport. Cerca SOLO: Segnali Deboli, Hard Tech, Geopolitica Infrastrutturale.
2. STILE: Asettico, denso, italiano professionale. Niente frasi come "Incredibile scoperta!". Solo fatti e meccanismi.
3. FORMATO: Markdown rigoroso. Non ripetere il titolo della sezione.
4. STRUTTURA PER OGNI NOTIZIA:
   - **Il Segnale:** [Titolo]
   - **I Fatti:** [Cosa è successo]
   - **Il Meccanismo:** [Spiegazione tecnica/fisica/economica del PERCHÉ è rilevante]
   - **Fonti:** [Link]

IMPORTANTE: Se nel contesto fornito non ci sono notizie rilevanti per questa sezione, scrivi: "NESSUN SEGNALE RILEVATO NELLE ULTIME {hours}H". Non inventare."#;

/// A named thematic bucket of sources sharing one generated section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceGroup {
    pub name: String,
    pub section_title: String,
    /// Feed URLs (RSS, RDF or Atom).
    #[serde(default)]
    pub urls: Vec<String>,
    /// Web-search queries.
    #[serde(default)]
    pub queries: Vec<String>,
    /// Prompt template overriding the default for this group.
    #[serde(default)]
    pub prompt: Option<String>,
}

impl SourceGroup {
    /// Feeds first, then queries, in configuration order.
    pub fn sources(&self) -> Vec<Source> {
        self.urls
            .iter()
            .cloned()
            .map(Source::Feed)
            .chain(self.queries.iter().cloned().map(Source::Search))
            .collect()
    }
}

/// Shape of the YAML group file.
#[derive(Debug, Deserialize)]
struct GroupFile {
    #[serde(default)]
    prompt: Option<String>,
    groups: Vec<SourceGroup>,
}

/// Everything needed to talk to the generation service.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: StdDuration,
    pub retry_attempts: usize,
    pub retry_delay: StdDuration,
    pub rate_interval: StdDuration,
    pub rate_burst: u32,
}

/// Front-matter fields and file naming for the output post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSettings {
    pub posts_dir: String,
    pub json_output_dir: Option<String>,
    pub title: String,
    pub layout: String,
    pub slug: String,
    pub excerpt: Option<String>,
}

/// Immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub groups: Vec<SourceGroup>,
    pub default_prompt: String,
    pub lookback: Duration,
    pub concurrency: usize,
    pub max_item_chars: usize,
    pub context_budget: usize,
    pub fetch_timeout: StdDuration,
    pub search_api_key: Option<String>,
    pub generation: GenerationSettings,
    pub post: PostSettings,
}

fn parse_groups(yaml: &str, path: &str) -> Result<GroupFile, ConfigError> {
    serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl DigestConfig {
    /// Build and validate the run configuration.
    ///
    /// The generation key is checked first, so a missing secret aborts the
    /// run before any file or network access.
    #[instrument(level = "info", skip_all)]
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let api_key = non_empty(cli.openai_api_key.as_deref())
            .ok_or(ConfigError::MissingSecret("OPENAI_API_KEY"))?;
        if cli.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(cli.concurrency));
        }

        let file = match cli.config.as_deref() {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_string(),
                    source,
                })?;
                parse_groups(&yaml, path)?
            }
            None => parse_groups(BUILTIN_GROUPS, "<built-in>")?,
        };

        let config = Self {
            groups: file.groups,
            default_prompt: file.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            lookback: Duration::hours(i64::from(cli.lookback_hours)),
            concurrency: cli.concurrency,
            max_item_chars: cli.max_item_chars,
            context_budget: cli.context_budget,
            fetch_timeout: StdDuration::from_secs(cli.fetch_timeout_secs),
            search_api_key: non_empty(cli.tavily_api_key.as_deref()),
            generation: GenerationSettings {
                api_base: cli.api_base.clone(),
                api_key,
                model: cli.model.clone(),
                temperature: cli.temperature,
                timeout: StdDuration::from_secs(cli.generation_timeout_secs),
                retry_attempts: cli.retry_attempts,
                retry_delay: StdDuration::from_secs(cli.retry_delay_secs),
                rate_interval: StdDuration::from_secs(cli.rate_interval_secs),
                rate_burst: cli.rate_burst,
            },
            post: PostSettings {
                posts_dir: cli.posts_dir.clone(),
                json_output_dir: cli.json_output_dir.clone(),
                title: cli.title.clone(),
                layout: cli.layout.clone(),
                slug: cli.slug.clone(),
                excerpt: non_empty(cli.excerpt.as_deref()),
            },
        };
        config.validate()?;

        info!(
            groups = config.groups.len(),
            lookback_h = cli.lookback_hours,
            concurrency = config.concurrency,
            search = config.search_api_key.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Check the group table: at least one group, each with a source, every feed URL absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::NoGroups);
        }
        for group in &self.groups {
            if group.urls.is_empty() && group.queries.is_empty() {
                return Err(ConfigError::EmptyGroup(group.name.clone()));
            }
            for url in &group.urls {
                if let Err(e) = url::Url::parse(url) {
                    return Err(ConfigError::InvalidUrl {
                        group: group.name.clone(),
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The prompt template for `group`, before placeholder substitution.
    pub fn prompt_for<'a>(&'a self, group: &'a SourceGroup) -> &'a str {
        group.prompt.as_deref().unwrap_or(&self.default_prompt)
    }
}

/// Substitute `{section}`, `{date}` and `{hours}` (the lookback) in a prompt template.
pub fn render_prompt(
    template: &str,
    section_title: &str,
    date: NaiveDate,
    lookback: Duration,
) -> String {
    template
        .replace("{section}", section_title)
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
        .replace("{hours}", &lookback.num_hours().to_string())
}
