//! Shared HTTP infrastructure for network adapters.
//!
//! `FetchClient` owns retry, backoff, and error classification. Adapters own
//! their URL, headers, and query parameters; they pass a request-building
//! closure to [`FetchClient::get_with_retry`], which runs it once per attempt.
//!
//! Every attempt runs under the caller's [`RunBudget`]: the per-request
//! timeout is `min(request_timeout, remaining)`, a backoff sleep never
//! outlasts the remaining budget, and exhaustion is `IngestError::Timeout`.

use std::thread;
use std::time::Duration;

use trustgrid_config::FetchConfig;
use trustgrid_core::{IngestError, RunBudget};

/// Longest error-body excerpt carried into an error message.
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self {
            request_timeout: cfg.request_timeout(),
            max_retries: cfg.max_retries,
            backoff: cfg.backoff(),
        }
    }
}

/// A successful response, fully read.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects.
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

pub struct FetchClient {
    http: reqwest::blocking::Client,
    source_name: &'static str,
    policy: RetryPolicy,
}

impl FetchClient {
    pub fn new(source_name: &'static str, cfg: &FetchConfig) -> Result<Self, IngestError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| {
                IngestError::SourceUnreachable(format!("cannot build HTTP client: {}", e))
            })?;
        Ok(Self {
            http,
            source_name,
            policy: RetryPolicy::from_config(cfg),
        })
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET with retry and exponential backoff.
    ///
    /// 429 and 5xx responses and transport errors are retried up to
    /// `max_retries` times. Any other non-success status fails at once.
    pub fn get_with_retry(
        &self,
        budget: &RunBudget,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<Fetched, IngestError> {
        let max_retries = self.policy.max_retries;
        let mut backoff = self.policy.backoff;
        let mut attempt = 0u32;

        loop {
            let remaining = budget.check(self.source_name)?;
            let timeout = self.policy.request_timeout.min(remaining);

            let (reason, wait) = match build_request(&self.http).timeout(timeout).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return self.read_body(resp, budget);
                    }

                    let code = status.as_u16();
                    if code != 429 && !status.is_server_error() {
                        let body = resp.text().unwrap_or_default();
                        let excerpt: String = body.trim().chars().take(BODY_EXCERPT_CHARS).collect();
                        let what = if code == 401 || code == 403 {
                            "auth failed"
                        } else {
                            "request rejected"
                        };
                        return Err(IngestError::SourceUnreachable(format!(
                            "{} {} (HTTP {}): {}",
                            self.source_name, what, code, excerpt
                        )));
                    }

                    // Respect Retry-After for 429
                    let wait = if code == 429 {
                        resp.headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.trim().parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .unwrap_or(backoff)
                    } else {
                        backoff
                    };
                    (format!("HTTP {}", code), wait)
                }
                Err(e) => {
                    if e.is_timeout() && budget.expired() {
                        return Err(self.budget_exhausted(budget));
                    }
                    (e.to_string(), backoff)
                }
            };

            if attempt >= max_retries {
                if budget.expired() {
                    return Err(self.budget_exhausted(budget));
                }
                return Err(IngestError::SourceUnreachable(format!(
                    "{} unreachable after {} attempts: {}",
                    self.source_name,
                    attempt + 1,
                    reason
                )));
            }

            if wait >= budget.remaining() {
                return Err(IngestError::Timeout(format!(
                    "{}: retry backoff of {}s exceeds remaining run budget",
                    self.source_name,
                    wait.as_secs_f64()
                )));
            }

            attempt += 1;
            tracing::warn!(
                source = self.source_name,
                attempt,
                max_retries,
                wait_secs = wait.as_secs_f64(),
                %reason,
                "retrying request"
            );
            thread::sleep(wait);
            backoff = backoff.saturating_mul(2);
        }
    }

    fn read_body(
        &self,
        resp: reqwest::blocking::Response,
        budget: &RunBudget,
    ) -> Result<Fetched, IngestError> {
        let url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.bytes().map_err(|e| {
            if e.is_timeout() && budget.expired() {
                self.budget_exhausted(budget)
            } else {
                IngestError::SourceUnreachable(format!(
                    "failed to read {} response body: {}",
                    self.source_name, e
                ))
            }
        })?;
        tracing::debug!(source = self.source_name, %url, bytes = body.len(), "response received");
        Ok(Fetched {
            url,
            content_type,
            body: body.to_vec(),
        })
    }

    fn budget_exhausted(&self, budget: &RunBudget) -> IngestError {
        IngestError::Timeout(format!(
            "{}: run budget of {}s exhausted",
            self.source_name,
            budget.budget().as_secs_f64()
        ))
    }
}

/// Parse and check an adapter URL. Only http(s) is accepted.
pub fn parse_source_url(raw: Option<&str>, source_name: &str) -> Result<url::Url, IngestError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        IngestError::InvalidRequest(format!("{} requires source_url", source_name))
    })?;
    let parsed = url::Url::parse(raw)
        .map_err(|e| IngestError::InvalidRequest(format!("invalid source_url {:?}: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(IngestError::InvalidRequest(format!(
            "unsupported URL scheme '{}' (expected http or https)",
            other
        ))),
    }
}
