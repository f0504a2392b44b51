use crate::error::SandboxError;
use crate::languages::Language;
use serde::{Deserialize, Serialize};

/// One execution attempt: source, language and optional limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    /// Canonical name or alias, normalized by the executor
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    /// Seconds; overrides the language default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    /// Megabytes; overrides the language default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u32>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            stdin: None,
            time_limit: None,
            memory_limit: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_limits(mut self, time_limit: Option<f64>, memory_limit: Option<u32>) -> Self {
        self.time_limit = time_limit;
        self.memory_limit = memory_limit;
        self
    }

    /// Reject limits no backend can honour: a time limit must be a finite
    /// number of seconds above zero, a memory limit above zero.
    pub fn check_limits(&self) -> Result<(), SandboxError> {
        if let Some(secs) = self.time_limit {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(SandboxError::InvalidLimit(format!(
                    "time limit must be a positive number of seconds, got {}",
                    secs
                )));
            }
        }
        if self.memory_limit == Some(0) {
            return Err(SandboxError::InvalidLimit("memory limit must be above 0 MB".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    CompilationError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    InternalError,
    /// Only seen while polling; never handed to callers
    Pending,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Pending)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "Success",
            ExecutionStatus::CompilationError => "Compilation Error",
            ExecutionStatus::RuntimeError => "Runtime Error",
            ExecutionStatus::TimeLimitExceeded => "Time Limit Exceeded",
            ExecutionStatus::MemoryLimitExceeded => "Memory Limit Exceeded",
            ExecutionStatus::InternalError => "Internal Error",
            ExecutionStatus::Pending => "Pending",
        }
    }
}

/// Outcome of one execution. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
    pub memory_kb: u64,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Result used for every failure that is not a program outcome
    /// (transport errors, malformed provider responses, poll exhaustion).
    pub fn internal_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stdout: String::new(),
            stderr: message.clone(),
            exit_code: None,
            execution_time_ms: 0,
            memory_kb: 0,
            status: ExecutionStatus::InternalError,
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageScore {
    pub language: Language,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub language: Language,
    /// Always within [0, 1]
    pub confidence: f64,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<LanguageScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub input: Option<String>,
    pub expected_output: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExercise {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub language: String,
    #[serde(default)]
    pub starter_code: Option<String>,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub time_limit: Option<f64>,
    #[serde(default)]
    pub memory_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub test_case: TestCase,
    pub passed: bool,
    pub actual_output: String,
    pub execution_time_ms: u64,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_correct: bool,
    pub score: u64,
    pub total_points: u64,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub test_results: Vec<TestCaseResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
    pub feedback: String,
}

/// Caller-facing execution request; the language may be omitted and detected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub time_limit: Option<f64>,
    #[serde(default)]
    pub memory_limit: Option<u32>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_limits() {
        let request = ExecutionRequest::new("print(1)", "python");
        assert!(request.check_limits().is_ok());
        assert!(request.clone().with_limits(Some(0.5), Some(64)).check_limits().is_ok());

        for secs in [f64::INFINITY, f64::NAN, 0.0, -1.0] {
            let err = request.clone().with_limits(Some(secs), None).check_limits().unwrap_err();
            assert!(matches!(err, SandboxError::InvalidLimit(_)), "{}", secs);
        }
        assert!(request.with_limits(None, Some(0)).check_limits().is_err());
    }

    #[test]
    fn test_internal_error_result() {
        let result = ExecutionResult::internal_error("connection refused");
        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert!(result.stdout.is_empty());
        assert_eq!(result.error.as_deref(), Some("connection refused"));
        assert!(!result.is_success());
    }

    #[test]
    fn test_pending_is_not_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(ExecutionStatus::RuntimeError.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ExecutionStatus::TimeLimitExceeded).unwrap();
        assert_eq!(json, "\"time_limit_exceeded\"");
    }

    #[test]
    fn test_exercise_from_json_defaults() {
        let exercise: CodeExercise = serde_json::from_str(
            r#"{
                "id": "sum",
                "title": "Sum two numbers",
                "language": "py",
                "testCases": [
                    {"id": "t1", "input": "1 2", "expectedOutput": "3", "points": 5},
                    {"id": "t2", "expectedOutput": "0"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(exercise.test_cases.len(), 2);
        assert_eq!(exercise.test_cases[0].points, 5);
        assert_eq!(exercise.test_cases[1].points, 10);
        assert_eq!(exercise.test_cases[1].input, None);
        assert_eq!(exercise.time_limit, None);
    }

    #[test]
    fn test_request_builder() {
        let request = ExecutionRequest::new("print(1)", "python")
            .with_stdin("5")
            .with_limits(Some(2.0), None);
        assert_eq!(request.stdin.as_deref(), Some("5"));
        assert_eq!(request.time_limit, Some(2.0));
        assert_eq!(request.memory_limit, None);
    }
}
