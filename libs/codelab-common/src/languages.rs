// Language registry and alias resolution
// The built-in table is authoritative unless a languages.json is loaded explicitly

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Canonical languages the sandbox knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    Cpp,
    C,
}

/// Fixed alias table. Every lookup goes through here first.
const ALIASES: &[(&str, Language)] = &[
    ("javascript", Language::JavaScript),
    ("js", Language::JavaScript),
    ("node", Language::JavaScript),
    ("nodejs", Language::JavaScript),
    ("typescript", Language::TypeScript),
    ("ts", Language::TypeScript),
    ("python", Language::Python),
    ("python3", Language::Python),
    ("py", Language::Python),
    ("py3", Language::Python),
    ("java", Language::Java),
    ("cpp", Language::Cpp),
    ("c++", Language::Cpp),
    ("cxx", Language::Cpp),
    ("cc", Language::Cpp),
    ("c", Language::C),
];

impl Language {
    pub const ALL: [Language; 6] = [
        Language::JavaScript,
        Language::TypeScript,
        Language::Python,
        Language::Java,
        Language::Cpp,
        Language::C,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
        }
    }

    /// Resolve a user-supplied name or alias (case-insensitive).
    pub fn from_alias(name: &str) -> Option<Self> {
        let key = name.trim().to_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, lang)| *lang)
    }

    /// All aliases that resolve to this language, canonical name included.
    pub fn aliases(&self) -> Vec<&'static str> {
        ALIASES
            .iter()
            .filter(|(_, lang)| lang == self)
            .map(|(alias, _)| *alias)
            .collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_language(s)
    }
}

/// Normalize a language name through the alias table.
///
/// Unknown names fail; nothing silently defaults here.
pub fn normalize_language(name: &str) -> Result<Language, SandboxError> {
    Language::from_alias(name).ok_or_else(|| {
        SandboxError::unsupported(
            name.trim(),
            Language::ALL.iter().map(|l| l.to_string()).collect(),
        )
    })
}

/// Static per-language execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: Language,
    /// Language id on the remote judge
    pub judge_id: u32,
    pub display_name: String,
    pub file_extension: String,
    /// Seconds
    pub default_time_limit: f64,
    /// Megabytes
    pub default_memory_limit: u32,
    /// Editor syntax mode
    pub editor_language: String,
    /// Container image for the self-hosted runner
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LanguagesFile {
    languages: Vec<LanguageConfig>,
}

/// Registry of configured languages, read-only after construction.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    configs: BTreeMap<Language, LanguageConfig>,
}

fn entry(
    name: Language,
    judge_id: u32,
    display_name: &str,
    file_extension: &str,
    default_time_limit: f64,
    default_memory_limit: u32,
    editor_language: &str,
) -> LanguageConfig {
    LanguageConfig {
        name,
        judge_id,
        display_name: display_name.to_string(),
        file_extension: file_extension.to_string(),
        default_time_limit,
        default_memory_limit,
        editor_language: editor_language.to_string(),
        image: format!("codelab-{}:latest", name),
    }
}

impl LanguageRegistry {
    /// The hand-authored table (Judge0 CE language ids).
    pub fn builtin() -> Self {
        let table = vec![
            entry(Language::JavaScript, 63, "JavaScript (Node.js 12.14.0)", ".js", 5.0, 128, "javascript"),
            entry(Language::TypeScript, 74, "TypeScript (3.7.4)", ".ts", 5.0, 128, "typescript"),
            entry(Language::Python, 71, "Python (3.8.1)", ".py", 5.0, 128, "python"),
            entry(Language::Java, 62, "Java (OpenJDK 13.0.1)", ".java", 10.0, 256, "java"),
            entry(Language::Cpp, 54, "C++ (GCC 9.2.0)", ".cpp", 5.0, 128, "cpp"),
            entry(Language::C, 50, "C (GCC 9.2.0)", ".c", 5.0, 128, "c"),
        ];
        Self::from_configs(table)
    }

    pub fn from_configs(configs: Vec<LanguageConfig>) -> Self {
        Self {
            configs: configs.into_iter().map(|c| (c.name, c)).collect(),
        }
    }

    /// Load language configuration from a languages.json file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SandboxError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SandboxError::Registry(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SandboxError> {
        let file: LanguagesFile = serde_json::from_str(content)
            .map_err(|e| SandboxError::Registry(format!("Failed to parse languages file: {}", e)))?;

        if file.languages.is_empty() {
            return Err(SandboxError::Registry(
                "No languages configured in languages file".to_string(),
            ));
        }

        let registry = Self::from_configs(file.languages);
        tracing::debug!(languages = ?registry.names(), "Loaded language registry");
        Ok(registry)
    }

    pub fn get(&self, language: Language) -> Option<&LanguageConfig> {
        self.configs.get(&language)
    }

    /// Normalize `name` and return its configuration.
    pub fn resolve(&self, name: &str) -> Result<&LanguageConfig, SandboxError> {
        Language::from_alias(name)
            .and_then(|lang| self.get(lang))
            .ok_or_else(|| SandboxError::unsupported(name.trim(), self.names()))
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    pub fn configs(&self) -> Vec<LanguageConfig> {
        self.configs.values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.configs.keys().map(|l| l.to_string()).collect()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_language("py").unwrap(), Language::Python);
        assert_eq!(normalize_language("PY").unwrap(), Language::Python);
        assert_eq!(normalize_language("python3").unwrap(), Language::Python);
        assert_eq!(normalize_language("js").unwrap(), Language::JavaScript);
        assert_eq!(normalize_language("c++").unwrap(), Language::Cpp);
        assert_eq!(normalize_language("  TS ").unwrap(), Language::TypeScript);
    }

    #[test]
    fn test_normalize_unknown_fails() {
        let err = normalize_language("cobol").unwrap_err();
        assert!(matches!(err, SandboxError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn test_builtin_registry_covers_all_languages() {
        let registry = LanguageRegistry::builtin();
        for lang in Language::ALL {
            assert!(registry.get(lang).is_some(), "missing {}", lang);
        }
        assert_eq!(registry.get(Language::Python).unwrap().judge_id, 71);
        assert_eq!(registry.get(Language::Java).unwrap().default_memory_limit, 256);
    }

    #[test]
    fn test_resolve_and_support() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.resolve("node").unwrap().name, Language::JavaScript);
        assert!(registry.is_supported("cxx"));
        assert!(!registry.is_supported("cobol"));
    }

    #[test]
    fn test_resolve_missing_config_lists_supported() {
        let registry = LanguageRegistry::from_configs(vec![entry(
            Language::Python, 71, "Python", ".py", 5.0, 128, "python",
        )]);

        match registry.resolve("java") {
            Err(SandboxError::UnsupportedLanguage { language, supported }) => {
                assert_eq!(language, "java");
                assert_eq!(supported, vec!["python".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_aliases_for_language() {
        let aliases = Language::Cpp.aliases();
        assert!(aliases.contains(&"cpp"));
        assert!(aliases.contains(&"c++"));
        assert!(!aliases.contains(&"c"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::json!({
            "languages": [LanguageRegistry::builtin().get(Language::C).unwrap()]
        });
        write!(file, "{}", json).unwrap();

        let registry = LanguageRegistry::load(file.path()).unwrap();
        assert_eq!(registry.names(), vec!["c".to_string()]);
    }

    #[test]
    fn test_load_rejects_empty_and_unknown() {
        assert!(LanguageRegistry::from_json(r#"{"languages": []}"#).is_err());
        let unknown = r#"{"languages": [{"name": "cobol", "judge_id": 1, "display_name": "COBOL",
            "file_extension": ".cob", "default_time_limit": 5.0, "default_memory_limit": 128,
            "editor_language": "cobol", "image": "x"}]}"#;
        assert!(LanguageRegistry::from_json(unknown).is_err());
    }
}
