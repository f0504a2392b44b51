pub mod config;
pub mod error;
pub mod languages;
pub mod types;

pub use error::SandboxError;
pub use languages::{normalize_language, Language, LanguageConfig, LanguageRegistry};
