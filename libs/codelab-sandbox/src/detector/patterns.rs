/// Per-language pattern sets for weighted scoring.
///
/// Each language owns an independent `PatternSet` built by its own function,
/// so weights and penalties for one language can be tuned without touching
/// the others. Scoring sums four capped signal classes, each match weighted
/// by the set's `Weights`, and then applies the language's negative
/// adjustments.
use codelab_common::Language;
use lazy_static::lazy_static;
use regex::Regex;

pub const KEYWORD_WEIGHT: f64 = 0.05;
pub const KEYWORD_CAP: f64 = 0.3;
pub const SYNTAX_WEIGHT: f64 = 0.1;
pub const SYNTAX_CAP: f64 = 0.4;
pub const IMPORT_WEIGHT: f64 = 0.15;
pub const IMPORT_CAP: f64 = 0.3;
pub const FUNCTION_WEIGHT: f64 = 0.1;
pub const FUNCTION_CAP: f64 = 0.2;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("detector pattern must compile")
}

fn words(keywords: &[&str]) -> Vec<Regex> {
    keywords
        .iter()
        .map(|k| re(&format!(r"\b{}\b", regex::escape(k))))
        .collect()
}

lazy_static! {
    static ref TYPE_ANNOTATION: Regex =
        re(r"[\w$)\]?]\s*:\s*(?:number|string|boolean|any|void|unknown|never|object)(?:\[\])?\b");
    static ref SIGNATURE_TYPES: Regex = re(concat!(
        r"\bfunction\s*[A-Za-z_$]?[\w$]*\s*<[A-Za-z_$][^>]*>\s*\(",
        r"|\bfunction\b[^(\n]*\((?:[^)]*,)?\s*[A-Za-z_$][\w$]*\??\s*:\s*[A-Za-z_$]",
        r"|\)[ \t]*:[ \t]*[A-Za-z_$][\w$]*(?:<[^>]*>)?(?:\[\])?[ \t]*(?:\{|=>)",
        r"|\b(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*:\s*[A-Za-z_$]",
    ));
    static ref INTERFACE_DECL: Regex = re(r"\binterface\s+[A-Za-z_$][\w$]*\s*(?:<[^>]*>)?\s*(?:extends\s+[^{]+)?\{");
    static ref TYPE_ALIAS: Regex = re(r"(?m)^\s*(?:export\s+)?type\s+[A-Za-z_$][\w$]*\s*(?:<[^>]*>)?\s*=");
    static ref PYTHON_DEF_CALL: Regex = re(r"(?m)^\s*def\s+\w+\s*\(|(?:^|[^.\w])print\s*\(");

    pub static ref PATTERN_SETS: Vec<PatternSet> = vec![
        javascript(),
        typescript(),
        python(),
        java(),
        cpp(),
        c(),
    ];
}

/// True when the code carries TypeScript-only type syntax: primitive
/// annotations, annotated or generic function signatures, return types,
/// interfaces or type aliases.
pub fn has_type_annotations(code: &str) -> bool {
    TYPE_ANNOTATION.is_match(code)
        || SIGNATURE_TYPES.is_match(code)
        || INTERFACE_DECL.is_match(code)
        || TYPE_ALIAS.is_match(code)
}

/// `def name(` or a bare `print(` call.
pub fn has_python_def_or_print(code: &str) -> bool {
    PYTHON_DEF_CALL.is_match(code)
}

pub enum Penalty {
    /// Subtract `weight` when `pattern` matches.
    WhenPresent {
        pattern: Regex,
        weight: f64,
        reason: &'static str,
    },
    /// Subtract `weight` when none of `patterns` match.
    WhenAbsent {
        patterns: Vec<Regex>,
        weight: f64,
        reason: &'static str,
    },
}

impl Penalty {
    fn present(pattern: &str, weight: f64, reason: &'static str) -> Self {
        Penalty::WhenPresent {
            pattern: re(pattern),
            weight,
            reason,
        }
    }

    fn applies(&self, code: &str) -> Option<(f64, &'static str)> {
        match self {
            Penalty::WhenPresent { pattern, weight, reason } => {
                pattern.is_match(code).then_some((*weight, *reason))
            }
            Penalty::WhenAbsent { patterns, weight, reason } => {
                (!patterns.iter().any(|p| p.is_match(code))).then_some((*weight, *reason))
            }
        }
    }
}

/// Confidence added per match in each signal class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub keyword: f64,
    pub syntax: f64,
    pub import: f64,
    pub function: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            keyword: KEYWORD_WEIGHT,
            syntax: SYNTAX_WEIGHT,
            import: IMPORT_WEIGHT,
            function: FUNCTION_WEIGHT,
        }
    }
}

pub struct PatternSet {
    pub language: Language,
    pub weights: Weights,
    pub keywords: Vec<Regex>,
    pub syntax: Vec<Regex>,
    pub imports: Vec<Regex>,
    pub functions: Vec<Regex>,
    /// High-precision tells, used by the quick path for confidence
    pub strong: Vec<Regex>,
    pub penalties: Vec<Penalty>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub language: Language,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

fn count_matches(patterns: &[Regex], code: &str) -> usize {
    patterns.iter().map(|p| p.find_iter(code).count()).sum()
}

impl PatternSet {
    pub fn has_strong_indicator(&self, code: &str) -> bool {
        self.strong.iter().any(|p| p.is_match(code))
    }

    pub fn score(&self, code: &str) -> Score {
        let mut reasons = Vec::new();
        let mut confidence = 0.0;

        let keywords = self.keywords.iter().filter(|k| k.is_match(code)).count();
        if keywords > 0 {
            confidence += (keywords as f64 * self.weights.keyword).min(KEYWORD_CAP);
            reasons.push(format!("{} keyword(s)", keywords));
        }

        let syntax = count_matches(&self.syntax, code);
        if syntax > 0 {
            confidence += (syntax as f64 * self.weights.syntax).min(SYNTAX_CAP);
            reasons.push(format!("{} syntax pattern match(es)", syntax));
        }

        let imports = count_matches(&self.imports, code);
        if imports > 0 {
            confidence += (imports as f64 * self.weights.import).min(IMPORT_CAP);
            reasons.push(format!("{} import statement(s)", imports));
        }

        let functions = count_matches(&self.functions, code);
        if functions > 0 {
            confidence += (functions as f64 * self.weights.function).min(FUNCTION_CAP);
            reasons.push(format!("{} function definition(s)", functions));
        }

        for penalty in &self.penalties {
            if let Some((weight, reason)) = penalty.applies(code) {
                confidence -= weight;
                reasons.push(format!("penalty: {}", reason));
            }
        }

        Score {
            language: self.language,
            confidence: confidence.clamp(0.0, 1.0),
            reasons,
        }
    }
}

pub fn pattern_set(language: Language) -> Option<&'static PatternSet> {
    PATTERN_SETS.iter().find(|set| set.language == language)
}

/// Score every language, highest confidence first.
pub fn rank(code: &str) -> Vec<Score> {
    let mut scores: Vec<Score> = PATTERN_SETS.iter().map(|set| set.score(code)).collect();
    // stable sort keeps registry order on ties
    scores.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    scores
}

pub fn javascript() -> PatternSet {
    PatternSet {
        language: Language::JavaScript,
        weights: Weights::default(),
        keywords: words(&["function", "const", "let", "var", "return", "async", "await", "undefined", "null", "this"]),
        syntax: vec![
            re(r"console\.(?:log|error|warn|info)\s*\("),
            re(r"=>"),
            re(r"===|!=="),
            re(r"\$\{"),
            re(r"\b(?:document|window)\."),
        ],
        imports: vec![
            re(r#"\brequire\s*\(\s*['"]"#),
            re(r#"(?m)^\s*import\s+.+\s+from\s+['"]"#),
            re(r"\bmodule\.exports\b"),
        ],
        functions: vec![
            re(r"\bfunction\s*\*?\s*[A-Za-z_$][\w$]*\s*\("),
            re(r"\b(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*=\s*(?:async\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>"),
            re(r"\b(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*=\s*function\b"),
        ],
        strong: vec![
            re(r"console\.log\s*\("),
            re(r#"\brequire\s*\(\s*['"]"#),
            re(r"\bmodule\.exports\b"),
        ],
        penalties: vec![
            Penalty::present(r"(?m)^\s*def\s+\w+\s*\(", 0.3, "python def"),
            Penalty::present(r"(?m)^\s*import\s+\w+\s*$", 0.2, "bare python import"),
            Penalty::present(r"System\.out\.print", 0.4, "java System.out"),
            Penalty::present(r"\bpublic\s+class\b", 0.3, "java class declaration"),
            Penalty::present(r"#include", 0.4, "preprocessor include"),
            Penalty::present(r"\binterface\s+[A-Za-z_$][\w$]*\s*\{", 0.2, "interface declaration"),
            Penalty::present(
                r"[(,]\s*[A-Za-z_$][\w$]*\s*\??:\s*(?:number|string|boolean|any|void)\b",
                0.2,
                "parameter type annotation",
            ),
        ],
    }
}

pub fn typescript() -> PatternSet {
    PatternSet {
        language: Language::TypeScript,
        // type syntax is rare outside typescript, so each hit counts double
        weights: Weights {
            syntax: 0.2,
            ..Weights::default()
        },
        keywords: words(&["interface", "type", "enum", "implements", "readonly", "private", "public", "namespace", "declare", "keyof"]),
        syntax: vec![
            re(r"[\w)]\s*\??:\s*(?:number|string|boolean|any|void|unknown|never)\b"),
            re(r"\b(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*:\s*[A-Za-z_$]"),
            re(r"\)\s*:\s*[A-Za-z_$][\w$]*(?:<[^>]*>)?(?:\[\])?\s*(?:\{|=>)"),
            re(r"\bas\s+(?:const|string|number|any|unknown)\b"),
            re(r"<[A-Z]\w*(?:\s*,\s*[A-Z]\w*)*>\s*\("),
            re(r"console\.(?:log|error|warn)\s*\("),
        ],
        imports: vec![
            re(r"(?m)^\s*import\s+type\b"),
            re(r#"(?m)^\s*import\s+.+\s+from\s+['"]"#),
            re(r"(?m)^\s*export\s+(?:interface|type|enum)\b"),
        ],
        functions: vec![
            re(r"\bfunction\s+[A-Za-z_$][\w$]*\s*(?:<[^>]*>)?\s*\([^)]*:\s*[A-Za-z_$]"),
            re(r"\([^()]*:\s*[A-Za-z_$][\w$]*[^()]*\)\s*(?::\s*[\w<>\[\]]+\s*)?=>"),
        ],
        strong: vec![
            re(r"\binterface\s+[A-Za-z_$][\w$]*\s*\{"),
            re(r"(?m)^\s*(?:export\s+)?type\s+[A-Za-z_$][\w$]*\s*="),
            re(r"[\w)]\s*\??:\s*(?:number|string|boolean)\b"),
            re(r"\bfunction\s+[A-Za-z_$][\w$]*\s*<[A-Za-z_$]"),
        ],
        penalties: vec![
            Penalty::WhenAbsent {
                patterns: vec![
                    re(r"[\w)]\s*\??:\s*[A-Za-z_$][\w$]*(?:<[^>]*>)?(?:\[\])?\s*[,)=;{]"),
                    re(r"\binterface\s+[A-Za-z_$]"),
                    re(r"(?m)^\s*(?:export\s+)?type\s+[A-Za-z_$][\w$]*\s*="),
                ],
                weight: 0.5,
                reason: "no type syntax",
            },
            Penalty::present(r"(?m)^\s*def\s+\w+\s*\(", 0.3, "python def"),
            Penalty::present(r"#include", 0.4, "preprocessor include"),
            Penalty::present(r"System\.out\.print", 0.4, "java System.out"),
        ],
    }
}

pub fn python() -> PatternSet {
    PatternSet {
        language: Language::Python,
        weights: Weights::default(),
        keywords: words(&["def", "elif", "None", "True", "False", "self", "lambda", "pass", "import", "from", "not", "and", "or", "in"]),
        syntax: vec![
            re(r"(?m)^\s*(?:if|elif|else|for|while|def|class|try|except|finally|with)\b[^\n{;]*:\s*$"),
            re(r"(?:^|[^.\w])print\s*\("),
            re(r"\bself\."),
            re(r"(?m)^\s*#[^i]"),
            re(r"\b(?:range|len|input)\s*\("),
        ],
        imports: vec![
            re(r"(?m)^\s*import\s+[\w.]+(?:\s+as\s+\w+)?\s*$"),
            re(r"(?m)^\s*from\s+[\w.]+\s+import\s+"),
        ],
        functions: vec![
            re(r"(?m)^\s*def\s+\w+\s*\("),
            re(r"\blambda\s+[\w, ]*:"),
        ],
        strong: vec![
            re(r"(?m)^\s*def\s+\w+\s*\([^)]*\)\s*(?:->\s*[^:]+)?:\s*$"),
            re(r"(?m)^\s*from\s+[\w.]+\s+import\s+"),
            re(r#"\bif\s+__name__\s*==\s*['"]__main__['"]"#),
            re(r"(?m)^\s*elif\b"),
        ],
        penalties: vec![
            Penalty::present(r"[{}]", 0.2, "curly braces"),
            Penalty::present(r"\bfunction\b", 0.3, "function keyword"),
            Penalty::present(
                r"[\w)]\s*:\s*(?:number|string|boolean|any|void)\b",
                0.2,
                "typescript type annotation",
            ),
            Penalty::present(r"(?m);\s*$", 0.1, "trailing semicolon"),
        ],
    }
}

pub fn java() -> PatternSet {
    PatternSet {
        language: Language::Java,
        weights: Weights::default(),
        keywords: words(&["public", "private", "protected", "class", "static", "void", "new", "extends", "implements", "final", "String", "throws"]),
        syntax: vec![
            re(r"System\.out\.print(?:ln|f)?\s*\("),
            re(r"\b(?:public|private|protected)\s+(?:static\s+)?(?:final\s+)?[\w<>\[\]]+\s+\w+\s*\("),
            re(r"\bString\[\]"),
            re(r"\bnew\s+[A-Z]\w*\s*(?:<[^>]*>)?\s*\("),
            re(r"@Override\b"),
        ],
        imports: vec![
            re(r"(?m)^\s*import\s+(?:static\s+)?[\w.]+(?:\.\*)?\s*;"),
            re(r"(?m)^\s*package\s+[\w.]+\s*;"),
        ],
        functions: vec![
            re(r"\b(?:public|private|protected)\s+(?:static\s+)?[\w<>\[\]]+\s+\w+\s*\([^)]*\)\s*(?:throws\s+[\w, ]+)?\{"),
        ],
        strong: vec![
            re(r"\bpublic\s+static\s+void\s+main\b"),
            re(r"System\.out\.print"),
            re(r"(?m)^\s*import\s+java\."),
        ],
        penalties: vec![
            Penalty::present(r"#include", 0.4, "preprocessor include"),
            Penalty::present(r"console\.", 0.3, "console object"),
            Penalty::present(r"(?m)^\s*def\s+\w+\s*\(", 0.3, "python def"),
        ],
    }
}

pub fn cpp() -> PatternSet {
    PatternSet {
        language: Language::Cpp,
        weights: Weights::default(),
        keywords: words(&["namespace", "std", "cout", "cin", "endl", "template", "vector", "auto", "class", "nullptr", "public", "int", "return"]),
        syntax: vec![
            re(r"\bstd::"),
            re(r"\bcout\s*<<"),
            re(r"\bcin\s*>>"),
            re(r"\busing\s+namespace\s+std\b"),
            re(r"#include\s*<[a-z_]+>"),
        ],
        imports: vec![re(r"(?m)^\s*#include\s*[<\x22][\w/.]+[>\x22]")],
        functions: vec![
            re(r"(?m)^\s*(?:int|void|auto|bool|double|float|long|char|string|std::\w+(?:<[^>]*>)?)\s+\w+\s*\([^)]*\)\s*(?:const\s*)?\{"),
            re(r"\btemplate\s*<"),
        ],
        strong: vec![
            re(r"\bstd::"),
            re(r"\bcout\s*<<"),
            re(r"\busing\s+namespace\s+std\b"),
            re(r"#include\s*<(?:iostream|vector|string|algorithm|map|set|unordered_map)>"),
        ],
        penalties: vec![
            Penalty::present(r"\bpublic\s+class\b", 0.3, "java class declaration"),
            Penalty::present(r"console\.", 0.3, "console object"),
            Penalty::present(r"(?m)^\s*def\s+\w+\s*\(", 0.3, "python def"),
            Penalty::present(r"#include\s*<(?:stdio|stdlib|string)\.h>", 0.1, "C standard header"),
        ],
    }
}

pub fn c() -> PatternSet {
    PatternSet {
        language: Language::C,
        weights: Weights::default(),
        keywords: words(&["int", "char", "void", "return", "struct", "sizeof", "malloc", "free", "printf", "scanf", "typedef", "unsigned"]),
        syntax: vec![
            re(r"\bprintf\s*\("),
            re(r"\bscanf\s*\("),
            re(r"#include\s*<\w+\.h>"),
            re(r"\bchar\s*\*"),
            re(r"\b(?:malloc|calloc|free)\s*\("),
        ],
        imports: vec![re(r"(?m)^\s*#include\s*<[\w/]+\.h>")],
        functions: vec![re(
            r"(?m)^\s*(?:static\s+)?(?:int|void|char|float|double|long|unsigned|struct\s+\w+)\s+\*?\w+\s*\([^)]*\)\s*\{",
        )],
        strong: vec![
            re(r"#include\s*<stdio\.h>"),
            re(r"\bprintf\s*\("),
            re(r"\bscanf\s*\("),
        ],
        penalties: vec![
            Penalty::present(r"\bstd::", 0.5, "C++ std namespace"),
            Penalty::present(r"\b(?:cout|cin)\b", 0.4, "C++ streams"),
            Penalty::present(r"\bclass\s+\w+", 0.3, "class declaration"),
            Penalty::present(r"console\.", 0.3, "console object"),
        ],
    }
}
