use thiserror::Error;

/// Configuration-level failures.
///
/// These are the only conditions the sandbox raises instead of folding into an
/// `ExecutionResult`: they mean the caller asked for something no executor can
/// run, so there is no program outcome to report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SandboxError {
    #[error("Unsupported language '{language}'. Supported languages: {}", supported.join(", "))]
    UnsupportedLanguage {
        language: String,
        supported: Vec<String>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Language registry error: {0}")]
    Registry(String),

    #[error("Executor backend unavailable: {0}")]
    Backend(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}

impl SandboxError {
    pub fn unsupported(language: impl Into<String>, supported: Vec<String>) -> Self {
        SandboxError::UnsupportedLanguage {
            language: language.into(),
            supported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_language_message_lists_supported() {
        let err = SandboxError::unsupported("cobol", vec!["python".into(), "java".into()]);
        let msg = err.to_string();
        assert!(msg.contains("cobol"));
        assert!(msg.contains("python, java"));
    }
}
