pub mod detector;
pub mod docker;
pub mod executor;
pub mod judge0;
pub mod runner;
pub mod typescript;
pub mod validator;

pub use detector::{detect_language, LanguageDetector};
pub use docker::DockerExecutor;
pub use executor::{build_executor, CodeExecutor, ExecutorFactory};
pub use judge0::{HttpTransport, Judge0Executor, JudgeTransport};
pub use runner::CodeRunner;
pub use typescript::{handle_typescript_execution, is_typescript_code, transpile_typescript};
pub use validator::{CodeValidator, ValidatorOptions};
