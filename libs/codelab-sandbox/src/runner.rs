// Execution entrypoint: run a snippet, detecting its language when the
// caller did not name one.

use crate::detector::LanguageDetector;
use crate::executor::ExecutorFactory;
use codelab_common::types::{DetectionResult, ExecutionRequest, ExecutionResult, RunRequest};
use codelab_common::SandboxError;
use std::sync::Arc;
use tracing::info;

pub struct CodeRunner {
    factory: Arc<ExecutorFactory>,
    detector: LanguageDetector,
}

impl CodeRunner {
    pub fn new(factory: Arc<ExecutorFactory>) -> Self {
        Self {
            factory,
            detector: LanguageDetector::new(),
        }
    }

    pub fn detect(&self, code: &str) -> DetectionResult {
        self.detector.detect(code)
    }

    /// Execute `request`. Only an unsupported language is an `Err`;
    /// every other failure is an `internal_error` result.
    #[tracing::instrument(skip(self, request), fields(user = request.user_id.as_deref().unwrap_or("anonymous")))]
    pub async fn run(&self, request: RunRequest) -> Result<ExecutionResult, SandboxError> {
        let language = match request.language.filter(|l| !l.trim().is_empty()) {
            Some(language) => language,
            None => {
                let detection = self.detect(&request.code);
                info!(
                    language = %detection.language,
                    confidence = detection.confidence,
                    "Language not given, using detected language"
                );
                detection.language.to_string()
            }
        };

        let execution = ExecutionRequest {
            code: request.code,
            language,
            stdin: request.input,
            time_limit: request.time_limit,
            memory_limit: request.memory_limit,
        };

        self.factory.current().execute(&execution).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{Scripted, ScriptedExecutor};

    fn runner(executor: ScriptedExecutor) -> (CodeRunner, Arc<ScriptedExecutor>) {
        let executor = Arc::new(executor);
        let factory = Arc::new(ExecutorFactory::new(executor.clone()));
        (CodeRunner::new(factory), executor)
    }

    #[tokio::test]
    async fn test_language_detected_when_missing() {
        let (runner, executor) = runner(ScriptedExecutor::new("scripted"));

        runner
            .run(RunRequest {
                code: "def greet():\n    print('hi')\n\ngreet()\n".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let requests = executor.requests.lock().unwrap();
        assert_eq!(requests[0].language, "python");
    }

    #[tokio::test]
    async fn test_explicit_language_and_limits_forwarded() {
        let (runner, executor) = runner(ScriptedExecutor::new("scripted").on("5", Scripted::Output("25")));

        let result = runner
            .run(RunRequest {
                code: "n = int(input())\nprint(n * n)".to_string(),
                language: Some("py".to_string()),
                input: Some("5".to_string()),
                time_limit: Some(1.5),
                memory_limit: Some(64),
                user_id: Some("student-7".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(result.stdout, "25");
        let requests = executor.requests.lock().unwrap();
        assert_eq!(requests[0].language, "py");
        assert_eq!(requests[0].time_limit, Some(1.5));
        assert_eq!(requests[0].memory_limit, Some(64));
    }

    #[tokio::test]
    async fn test_unsupported_language_is_an_error() {
        let (runner, _) = runner(ScriptedExecutor::new("scripted"));

        let err = runner
            .run(RunRequest {
                code: "IDENTIFICATION DIVISION.".to_string(),
                language: Some("cobol".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::UnsupportedLanguage { .. }));
    }
}
