//! Error types for configuration, source fetching and text generation.
//!
//! Only [`ConfigError`] ever reaches `main`. [`FetchError`] is collapsed to an
//! empty item list at the harvest boundary and [`GenerationError`] to a
//! placeholder section body at the group boundary, after being logged.

use std::time::Duration;

use thiserror::Error;

/// Fatal problems detected before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secret {0} (set it in the environment)")]
    MissingSecret(&'static str),
    #[error("concurrency limit must be at least 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("group '{group}' has an invalid feed url '{url}': {reason}")]
    InvalidUrl {
        group: String,
        url: String,
        reason: String,
    },
    #[error("group '{0}' has no feeds and no queries")]
    EmptyGroup(String),
    #[error("no source groups configured")]
    NoGroups,
    #[error("failed to read group file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse group file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A single source that could not be turned into entries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not parse feed at {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("search for '{query}' failed: {reason}")]
    Search { query: String, reason: String },
    #[error("worker pool closed")]
    PoolClosed,
}

/// Failure of one call to the text-generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rate limited by the generation service")]
    RateLimited { retry_after: Option<Duration> },
    #[error("generation request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("generation service rejected the credentials (HTTP {0})")]
    Auth(u16),
    #[error("generation service error (HTTP {status}): {body}")]
    Server { status: u16, body: String },
    #[error("generation request rejected (HTTP {status}): {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response contained no text")]
    Empty,
}

impl GenerationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. }
                | GenerationError::Timeout
                | GenerationError::Server { .. }
        )
    }

    /// Server-provided wait hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenerationError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::RateLimited { retry_after: None }.is_transient());
        assert!(GenerationError::Timeout.is_transient());
        assert!(
            GenerationError::Server {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!GenerationError::Auth(401).is_transient());
        assert!(
            !GenerationError::Status {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!GenerationError::Malformed("x".into()).is_transient());
    }

    #[test]
    fn test_retry_after_hint() {
        let e = GenerationError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(e.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(GenerationError::Timeout.retry_after(), None);
    }

    #[test]
    fn test_config_error_message_names_secret() {
        let e = ConfigError::MissingSecret("OPENAI_API_KEY");
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }
}
