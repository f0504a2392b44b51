/// Remote Judge Client - hosted Judge0 backend
///
/// **Protocol:**
/// 1. Resolve the language (unsupported ⇒ `Err` before any network call)
/// 2. Degrade TypeScript to JavaScript when needed
/// 3. `POST /submissions?wait=false` returns a token immediately
/// 4. `GET /submissions/{token}` until the status id leaves the in-progress
///    range, sleeping `poll_interval` between attempts, at most
///    `max_poll_attempts` times
/// 5. Map the Judge0 status onto `ExecutionStatus`
///
/// Transport failures, malformed responses and poll exhaustion all come
/// back as `internal_error` results.
use crate::executor::CodeExecutor;
use crate::typescript::handle_typescript_execution;
use anyhow::{Context, Result};
use async_trait::async_trait;
use codelab_common::config::Judge0Config;
use codelab_common::types::{ExecutionRequest, ExecutionResult, ExecutionStatus};
use codelab_common::{LanguageRegistry, SandboxError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Status ids at or below this are still queued/processing
pub const IN_PROGRESS_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRequest {
    pub source_code: String,
    pub language_id: u32,
    /// Always sent; empty when the caller gave no input
    pub stdin: String,
    /// Seconds
    pub cpu_time_limit: f64,
    /// Kilobytes
    pub memory_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionToken {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmissionStatus {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

/// Judge0 reports `time` as a decimal string; some deployments send a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JudgeTime {
    Seconds(f64),
    Text(String),
}

impl JudgeTime {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            JudgeTime::Seconds(s) => Some(*s),
            JudgeTime::Text(t) => t.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmissionResponse {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
    #[serde(default)]
    pub time: Option<JudgeTime>,
    /// Kilobytes
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl SubmissionResponse {
    /// Missing status is treated as still in queue.
    pub fn status_id(&self) -> u32 {
        self.status.as_ref().map(|s| s.id).unwrap_or(1)
    }
}

/// Map a Judge0 status id onto the closed status set.
pub fn map_status(id: u32) -> ExecutionStatus {
    match id {
        1 | 2 => ExecutionStatus::Pending,
        3 => ExecutionStatus::Success,
        // wrong answer only appears when expected_output is sent, which we never do
        4 => ExecutionStatus::RuntimeError,
        5 => ExecutionStatus::TimeLimitExceeded,
        6 => ExecutionStatus::CompilationError,
        7..=12 => ExecutionStatus::RuntimeError,
        _ => ExecutionStatus::InternalError,
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Convert a terminal submission into an `ExecutionResult`.
pub fn into_result(response: SubmissionResponse) -> ExecutionResult {
    let status = map_status(response.status_id());
    let execution_time_ms = response
        .time
        .as_ref()
        .and_then(JudgeTime::seconds)
        .map(|s| (s * 1000.0).round().max(0.0) as u64)
        .unwrap_or(0);

    let description = response
        .status
        .as_ref()
        .map(|s| s.description.clone());
    let error = if status == ExecutionStatus::Success {
        None
    } else {
        non_empty(response.message.clone())
            .or_else(|| non_empty(description))
            .or_else(|| Some(status.description().to_string()))
    };

    ExecutionResult {
        stdout: response.stdout.unwrap_or_default(),
        stderr: non_empty(response.stderr)
            .or_else(|| non_empty(response.compile_output))
            .unwrap_or_default(),
        exit_code: response.exit_code,
        execution_time_ms,
        memory_kb: response.memory.unwrap_or(0),
        status,
        error,
    }
}

/// The two calls the client makes against the judge.
#[async_trait]
pub trait JudgeTransport: Send + Sync {
    async fn submit(&self, submission: &SubmissionRequest) -> Result<String>;
    async fn fetch(&self, token: &str) -> Result<SubmissionResponse>;
}

/// reqwest-backed transport with optional RapidAPI headers.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_host: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &Judge0Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_host: config.effective_api_host(),
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(key) = &self.api_key {
            builder = builder.header("X-RapidAPI-Key", key);
        }
        if let Some(host) = &self.api_host {
            builder = builder.header("X-RapidAPI-Host", host);
        }
        builder
    }
}

#[async_trait]
impl JudgeTransport for HttpTransport {
    async fn submit(&self, submission: &SubmissionRequest) -> Result<String> {
        let url = format!("{}/submissions", self.base_url);
        let request = self
            .client
            .post(&url)
            .query(&[("base64_encoded", "false"), ("wait", "false")])
            .json(submission);

        let token: SubmissionToken = self
            .authorize(request)
            .send()
            .await
            .context("Failed to reach judge")?
            .error_for_status()
            .context("Judge rejected submission")?
            .json()
            .await
            .context("Malformed submission response")?;

        Ok(token.token)
    }

    async fn fetch(&self, token: &str) -> Result<SubmissionResponse> {
        let url = format!("{}/submissions/{}", self.base_url, token);
        let request = self
            .client
            .get(&url)
            .query(&[("base64_encoded", "false"), ("fields", "*")]);

        let response = self
            .authorize(request)
            .send()
            .await
            .context("Failed to reach judge")?
            .error_for_status()
            .context("Judge returned an error status")?
            .json()
            .await
            .context("Malformed submission status")?;

        Ok(response)
    }
}

pub struct Judge0Executor<T = HttpTransport> {
    transport: T,
    registry: Arc<LanguageRegistry>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl Judge0Executor<HttpTransport> {
    pub fn from_config(config: &Judge0Config, registry: Arc<LanguageRegistry>) -> Result<Self, SandboxError> {
        let transport = HttpTransport::new(config).map_err(|e| SandboxError::Backend(format!("{:#}", e)))?;
        info!(base_url = %config.base_url, "Judge0 executor ready");
        Ok(Self::new(
            transport,
            registry,
            config.poll_interval,
            config.max_poll_attempts,
        ))
    }
}

impl<T: JudgeTransport> Judge0Executor<T> {
    pub fn new(
        transport: T,
        registry: Arc<LanguageRegistry>,
        poll_interval: Duration,
        max_poll_attempts: u32,
    ) -> Self {
        Self {
            transport,
            registry,
            poll_interval,
            max_poll_attempts,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn submit_and_poll(&self, submission: &SubmissionRequest) -> ExecutionResult {
        let token = match self.transport.submit(submission).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Submission failed");
                return ExecutionResult::internal_error(format!("Failed to submit code: {:#}", e));
            }
        };
        debug!(token = %token, "Submitted");

        for attempt in 1..=self.max_poll_attempts {
            let response = match self.transport.fetch(&token).await {
                Ok(response) => response,
                Err(e) => {
                    error!(token = %token, attempt, error = %format!("{:#}", e), "Polling failed");
                    return ExecutionResult::internal_error(format!(
                        "Failed to fetch submission {}: {:#}",
                        token, e
                    ));
                }
            };

            let status_id = response.status_id();
            if status_id > IN_PROGRESS_THRESHOLD {
                let result = into_result(response);
                debug!(token = %token, attempt, status = ?result.status, "Submission finished");
                return result;
            }

            debug!(token = %token, attempt, status_id, "Submission still running");
            if attempt < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        warn!(token = %token, attempts = self.max_poll_attempts, "Gave up waiting for judge");
        ExecutionResult::internal_error(format!(
            "Execution timed out: no result after {} polling attempts",
            self.max_poll_attempts
        ))
    }
}

#[async_trait]
impl<T: JudgeTransport> CodeExecutor for Judge0Executor<T> {
    fn name(&self) -> &'static str {
        "judge0"
    }

    fn registry(&self) -> Arc<LanguageRegistry> {
        Arc::clone(&self.registry)
    }

    #[tracing::instrument(skip(self, request), fields(language = %request.language, code_bytes = request.code.len()))]
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
        request.check_limits()?;
        let requested = self.registry.resolve(&request.language)?;
        let degraded = handle_typescript_execution(&request.code, requested.name);
        let effective = if degraded.language == requested.name {
            requested
        } else {
            self.registry.resolve(degraded.language.as_str())?
        };

        let time_limit = request.time_limit.unwrap_or(requested.default_time_limit);
        let memory_limit_mb = request.memory_limit.unwrap_or(requested.default_memory_limit);

        let submission = SubmissionRequest {
            source_code: degraded.code,
            language_id: effective.judge_id,
            stdin: request.stdin.clone().unwrap_or_default(),
            cpu_time_limit: time_limit,
            memory_limit: u64::from(memory_limit_mb) * 1024,
        };

        Ok(self.submit_and_poll(&submission).await)
    }
}
