//! Command-line interface definitions.
//!
//! All arguments can be provided via command-line flags; secrets and the most
//! commonly tuned values also fall back to environment variables.

use clap::Parser;

/// Command-line arguments for the brief generator.
///
/// # Examples
///
/// ```sh
/// # Built-in groups, post written to ./_posts
/// OPENAI_API_KEY=sk-... polymath_brief
///
/// # Custom groups, a week of lookback, JSON dump alongside the post
/// polymath_brief -c groups.yaml --lookback-hours 168 -j ./api
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the dated Markdown post
    #[arg(short, long, default_value = "_posts")]
    pub posts_dir: String,

    /// Optional output directory for a JSON copy of the digest
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Optional path to a YAML file with source groups (built-in groups otherwise)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Key for the text-generation service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Tavily search key; without it search queries use Google News RSS
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    pub tavily_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    /// Chat model name
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    pub model: String,

    /// Sampling temperature (low values keep the model close to the sources)
    #[arg(long, default_value_t = 0.3)]
    pub temperature: f32,

    /// Maximum age of an item, in hours
    #[arg(long, env = "LOOKBACK_HOURS", default_value_t = 24)]
    pub lookback_hours: u32,

    /// Maximum number of concurrent feed fetches
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Character ceiling for each item's text
    #[arg(long, default_value_t = 1500)]
    pub max_item_chars: usize,

    /// Character budget of raw text sent per section
    #[arg(long, default_value_t = 30_000)]
    pub context_budget: usize,

    /// Seconds between generation calls (token refill interval; 0 disables throttling)
    #[arg(long, default_value_t = 10)]
    pub rate_interval_secs: u64,

    /// Generation calls allowed back to back before throttling kicks in
    #[arg(long, default_value_t = 1)]
    pub rate_burst: u32,

    /// Attempts per section for transient generation failures
    #[arg(long, default_value_t = 3)]
    pub retry_attempts: usize,

    /// Seconds to wait between generation attempts
    #[arg(long, default_value_t = 20)]
    pub retry_delay_secs: u64,

    /// Timeout for each feed or search request, in seconds
    #[arg(long, default_value_t = 20)]
    pub fetch_timeout_secs: u64,

    /// Timeout for each generation call, in seconds
    #[arg(long, default_value_t = 120)]
    pub generation_timeout_secs: u64,

    /// Post title; the issue date is appended
    #[arg(long, default_value = "Polymath Brief")]
    pub title: String,

    /// Front-matter layout
    #[arg(long, default_value = "post")]
    pub layout: String,

    /// File name suffix after the date
    #[arg(long, default_value = "brief")]
    pub slug: String,

    /// Optional front-matter excerpt
    #[arg(long)]
    pub excerpt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["polymath_brief", "--openai-api-key", "sk-test"]);

        assert_eq!(cli.posts_dir, "_posts");
        assert_eq!(cli.concurrency, 8);
        assert_eq!(cli.max_item_chars, 1500);
        assert_eq!(cli.retry_attempts, 3);
        assert_eq!(cli.slug, "brief");
        assert!(cli.json_output_dir.is_none());
        assert!(cli.excerpt.is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "polymath_brief",
            "-p",
            "/tmp/posts",
            "-j",
            "/tmp/json",
            "-c",
            "groups.yaml",
        ]);

        assert_eq!(cli.posts_dir, "/tmp/posts");
        assert_eq!(cli.json_output_dir.as_deref(), Some("/tmp/json"));
        assert_eq!(cli.config.as_deref(), Some("groups.yaml"));
    }

    #[test]
    fn test_cli_tuning_flags() {
        let cli = Cli::parse_from([
            "polymath_brief",
            "--lookback-hours",
            "48",
            "--concurrency",
            "2",
            "--context-budget",
            "1000",
            "--rate-interval-secs",
            "0",
            "--excerpt",
            "Segnali deboli",
        ]);

        assert_eq!(cli.lookback_hours, 48);
        assert_eq!(cli.concurrency, 2);
        assert_eq!(cli.context_budget, 1000);
        assert_eq!(cli.rate_interval_secs, 0);
        assert_eq!(cli.excerpt.as_deref(), Some("Segnali deboli"));
    }
}
