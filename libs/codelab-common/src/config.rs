// Sandbox configuration
// Everything can be overridden through environment variables

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_JUDGE0_URL: &str = "https://judge0-ce.p.rapidapi.com";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which executor implementation backs the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorBackend {
    #[default]
    Judge0,
    Docker,
}

impl fmt::Display for ExecutorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorBackend::Judge0 => f.write_str("judge0"),
            ExecutorBackend::Docker => f.write_str("docker"),
        }
    }
}

impl FromStr for ExecutorBackend {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "judge0" => Ok(ExecutorBackend::Judge0),
            "docker" => Ok(ExecutorBackend::Docker),
            other => Err(SandboxError::Config(format!(
                "Unknown executor backend '{}' (expected judge0 or docker)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Judge0Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub request_timeout: Duration,
}

impl Default for Judge0Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_JUDGE0_URL.to_string(),
            api_key: None,
            api_host: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Judge0Config {
    /// Host header value for RapidAPI-style gateways.
    /// Falls back to the host part of `base_url`.
    pub fn effective_api_host(&self) -> Option<String> {
        if let Some(host) = &self.api_host {
            return Some(host.clone());
        }
        self.api_key.as_ref()?;
        let without_scheme = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        without_scheme
            .split('/')
            .next()
            .filter(|h| !h.is_empty())
            .map(|h| h.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DockerConfig {
    pub image_prefix: String,
    pub max_source_bytes: usize,
    pub max_input_bytes: usize,
    /// Fraction of a CPU
    pub cpu_limit: f64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            image_prefix: "codelab".to_string(),
            max_source_bytes: 1024 * 1024,
            max_input_bytes: 10 * 1024 * 1024,
            cpu_limit: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SandboxConfig {
    pub backend: ExecutorBackend,
    pub judge0: Judge0Config,
    pub docker: DockerConfig,
}

impl SandboxConfig {
    pub fn from_env() -> Result<Self, SandboxError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SandboxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SandboxConfig::default();

        if let Some(backend) = lookup("SANDBOX_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(url) = lookup("JUDGE0_API_URL") {
            config.judge0.base_url = url.trim_end_matches('/').to_string();
        }
        config.judge0.api_key = lookup("JUDGE0_API_KEY").filter(|k| !k.is_empty());
        config.judge0.api_host = lookup("JUDGE0_API_HOST").filter(|h| !h.is_empty());
        if let Some(ms) = lookup("JUDGE0_POLL_INTERVAL_MS") {
            config.judge0.poll_interval = Duration::from_millis(parse_number(&ms, "JUDGE0_POLL_INTERVAL_MS")?);
        }
        if let Some(attempts) = lookup("JUDGE0_MAX_POLL_ATTEMPTS") {
            config.judge0.max_poll_attempts = parse_number(&attempts, "JUDGE0_MAX_POLL_ATTEMPTS")?;
        }
        if let Some(prefix) = lookup("SANDBOX_IMAGE_PREFIX") {
            config.docker.image_prefix = prefix;
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(value: &str, key: &str) -> Result<T, SandboxError> {
    value
        .trim()
        .parse()
        .map_err(|_| SandboxError::Config(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.backend, ExecutorBackend::Judge0);
        assert_eq!(config.judge0.poll_interval, Duration::from_secs(1));
        assert_eq!(config.judge0.max_poll_attempts, 10);
        assert_eq!(config.judge0.base_url, DEFAULT_JUDGE0_URL);
    }

    #[test]
    fn test_env_overrides() {
        let config = SandboxConfig::from_lookup(lookup_from(&[
            ("SANDBOX_BACKEND", "Docker"),
            ("JUDGE0_API_URL", "http://localhost:2358/"),
            ("JUDGE0_POLL_INTERVAL_MS", "250"),
            ("JUDGE0_MAX_POLL_ATTEMPTS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.backend, ExecutorBackend::Docker);
        assert_eq!(config.judge0.base_url, "http://localhost:2358");
        assert_eq!(config.judge0.poll_interval, Duration::from_millis(250));
        assert_eq!(config.judge0.max_poll_attempts, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SandboxConfig::from_lookup(lookup_from(&[("SANDBOX_BACKEND", "lambda")])).is_err());
        assert!(SandboxConfig::from_lookup(lookup_from(&[("JUDGE0_MAX_POLL_ATTEMPTS", "ten")])).is_err());
    }

    #[test]
    fn test_api_host_derived_from_url_when_key_set() {
        let mut judge0 = Judge0Config::default();
        assert_eq!(judge0.effective_api_host(), None);

        judge0.api_key = Some("secret".to_string());
        assert_eq!(
            judge0.effective_api_host().as_deref(),
            Some("judge0-ce.p.rapidapi.com")
        );

        judge0.api_host = Some("custom.host".to_string());
        assert_eq!(judge0.effective_api_host().as_deref(), Some("custom.host"));
    }
}
