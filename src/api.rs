//! Text-generation service client with retry and throttling decorators.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`AskAsync`]: Core trait, one system/user prompt pair in, generated text out
//! - [`OpenAiChat`]: OpenAI-compatible `/chat/completions` client
//! - [`Throttled`]: Decorator that takes a token from a shared [`RateLimiter`] before each call
//! - [`RetryAsk`]: Decorator that retries transient failures with a fixed delay
//!
//! Production stacks them as `RetryAsk<Throttled<OpenAiChat>>`, so every
//! attempt, retries included, is rate limited.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::errors::GenerationError;
use crate::ratelimit::RateLimiter;
use crate::utils::truncate_for_log;

/// A system/user message pair sent to the generation service.
#[derive(Debug, Clone, Copy)]
pub struct Prompt<'a> {
    pub system: &'a str,
    pub user: &'a str,
}

/// Trait for async text generation.
///
/// Implementors send a [`Prompt`] to a model and return its text. The
/// abstraction lets decorators (retry, throttling) and test stubs stand in
/// for the real service.
pub trait AskAsync {
    async fn ask(&self, prompt: Prompt<'_>) -> Result<String, GenerationError>;
}

impl<T: AskAsync> AskAsync for &T {
    async fn ask(&self, prompt: Prompt<'_>) -> Result<String, GenerationError> {
        (**self).ask(prompt).await
    }
}

/// Wrapper that retries transient failures of any [`AskAsync`] implementation.
///
/// Only errors for which [`GenerationError::is_transient`] holds are retried
/// (rate limits, timeouts, 5xx). The wait between attempts is the fixed
/// `delay`, or the server's `Retry-After` hint when that is longer.
pub struct RetryAsk<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Total number of attempts, the first one included.
    max_attempts: usize,
    /// Wait between attempts.
    delay: Duration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner`, making at most `max_attempts` calls (at least one).
    pub fn new(inner: T, max_attempts: usize, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: Prompt<'_>) -> Result<String, GenerationError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.inner.ask(prompt).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        error!(
                            attempt,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() failed permanently; not retrying"
                        );
                        return Err(e);
                    }
                    if attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = e.retry_after().map_or(self.delay, |hint| hint.max(self.delay));
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Decorator that takes a token from a shared [`RateLimiter`] before each call.
pub struct Throttled<T> {
    inner: T,
    limiter: Arc<RateLimiter>,
}

impl<T> Throttled<T> {
    pub fn new(inner: T, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

impl<T: AskAsync> AskAsync for Throttled<T> {
    async fn ask(&self, prompt: Prompt<'_>) -> Result<String, GenerationError> {
        self.limiter.acquire().await;
        self.inner.ask(prompt).await
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completion endpoint.
pub struct OpenAiChat {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiChat {
    /// Build a client for `{api_base}/chat/completions` whose calls time out after `timeout`.
    pub fn new(
        api_base: &str,
        api_key: String,
        model: String,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            model,
            temperature,
        })
    }
}

/// Map a non-success HTTP status to a classified error.
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> GenerationError {
    let body = truncate_for_log(body, 300);
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(status.as_u16()),
        s if s.is_server_error() => GenerationError::Server {
            status: s.as_u16(),
            body,
        },
        s => GenerationError::Status {
            status: s.as_u16(),
            body,
        },
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(e.to_string())
    }
}

fn extract_content(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(GenerationError::Empty)
}

impl AskAsync for OpenAiChat {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: Prompt<'_>) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt.user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            let e = classify_status(status, retry_after, &body);
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "API call failed");
            return Err(e);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let content = extract_content(body)?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = content.chars().count(),
            "API call succeeded"
        );
        Ok(content)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted outcomes; repeats `fallback` once the script runs out.
    pub(crate) struct ScriptedAsk {
        script: Mutex<VecDeque<Result<String, GenerationError>>>,
        fallback: fn(&Prompt<'_>) -> Result<String, GenerationError>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedAsk {
        pub(crate) fn new(
            script: Vec<Result<String, GenerationError>>,
            fallback: fn(&Prompt<'_>) -> Result<String, GenerationError>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AskAsync for ScriptedAsk {
        async fn ask(&self, prompt: Prompt<'_>) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.system.to_string(), prompt.user.to_string()));
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| (self.fallback)(&prompt))
        }
    }

    fn rate_limited() -> Result<String, GenerationError> {
        Err(GenerationError::RateLimited { retry_after: None })
    }

    fn prompt() -> Prompt<'static> {
        Prompt {
            system: "system",
            user: "user",
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_two_rate_limits() {
        let stub = ScriptedAsk::new(vec![rate_limited(), rate_limited()], |_| {
            Ok("third time lucky".to_string())
        });
        let api = RetryAsk::new(&stub, 3, Duration::from_secs(20));
        let t0 = tokio::time::Instant::now();

        let out = api.ask(prompt()).await.unwrap();

        assert_eq!(out, "third time lucky");
        assert_eq!(stub.calls(), 3);
        assert!(t0.elapsed() >= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let stub = ScriptedAsk::new(vec![], |_| rate_limited());
        let api = RetryAsk::new(&stub, 3, Duration::from_secs(1));

        let err = api.ask(prompt()).await.unwrap_err();

        assert!(matches!(err, GenerationError::RateLimited { .. }));
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let stub = ScriptedAsk::new(vec![], |_| Err(GenerationError::Auth(401)));
        let api = RetryAsk::new(&stub, 5, Duration::from_secs(1));

        let err = api.ask(prompt()).await.unwrap_err();

        assert!(matches!(err, GenerationError::Auth(401)));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_extends_delay() {
        let stub = ScriptedAsk::new(
            vec![Err(GenerationError::RateLimited {
                retry_after: Some(Duration::from_secs(45)),
            })],
            |_| Ok("ok".to_string()),
        );
        let api = RetryAsk::new(&stub, 2, Duration::from_secs(5));
        let t0 = tokio::time::Instant::now();

        api.ask(prompt()).await.unwrap();

        assert!(t0.elapsed() >= Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_spaces_calls() {
        let stub = ScriptedAsk::new(vec![], |_| Ok("ok".to_string()));
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(10)));
        let api = Throttled::new(&stub, limiter);
        let t0 = tokio::time::Instant::now();

        api.ask(prompt()).await.unwrap();
        api.ask(prompt()).await.unwrap();

        assert_eq!(stub.calls(), 2);
        assert!(t0.elapsed() >= Duration::from_secs(10));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(3)), ""),
            GenerationError::RateLimited {
                retry_after: Some(_)
            }
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, ""),
            GenerationError::Auth(401)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, "upstream"),
            GenerationError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, "bad"),
            GenerationError::Status { status: 400, .. }
        ));
    }

    #[test]
    fn test_extract_content() {
        let ok: ChatResponse =
            serde_json::from_str(r###"{"choices":[{"message":{"role":"assistant","content":"## Body"}}]}"###)
                .unwrap();
        assert_eq!(extract_content(ok).unwrap(), "## Body");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_content(empty), Err(GenerationError::Empty)));

        let null: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(extract_content(null), Err(GenerationError::Empty)));
    }

    #[test]
    fn test_endpoint_joins_base() {
        let client = OpenAiChat::new(
            "https://api.openai.com/v1/",
            "sk-test".to_string(),
            "gpt-4o".to_string(),
            0.3,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.endpoint, "https://api.openai.com/v1/chat/completions");
        assert!(!format!("{client:?}").contains("sk-test"));
    }
}
