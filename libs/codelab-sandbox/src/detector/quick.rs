// Quick detection: an ordered cascade of high-precision signatures.
// First match wins; the full scorer only runs when nothing here is trusted.

use super::patterns::{has_python_def_or_print, has_type_annotations};
use codelab_common::Language;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref JAVA_MAIN: Regex = Regex::new(r"\bpublic\s+static\s+void\s+main\b").expect("valid regex");
    static ref INCLUDE: Regex = Regex::new(r"#include\b").expect("valid regex");
    static ref CPP_IO: Regex = Regex::new(r"\bstd::|\bcout\b|\bcin\b").expect("valid regex");
    static ref C_IO: Regex = Regex::new(r"\b(?:printf|scanf)\s*\(").expect("valid regex");
    static ref STD_NAMESPACE: Regex = Regex::new(r"\bstd::").expect("valid regex");
    static ref JS_SHAPES: Regex = Regex::new(r"\bfunction\b|=>|console\.").expect("valid regex");
    static ref JAVA_PRINT: Regex = Regex::new(r"System\.out\.print").expect("valid regex");
    static ref JAVA_IMPORT: Regex = Regex::new(r"(?m)^\s*import\s+[\w.]+(?:\.\*)?\s*;").expect("valid regex");
    static ref JS_ONLY: Regex = Regex::new(r"console\.|\bfunction\b").expect("valid regex");
    static ref JS_SIGNS: Regex =
        Regex::new(r"(?m)console\.log|\bfunction\b|=>|^\s*(?:const|let)\s").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickMatch {
    pub language: Language,
    pub signature: &'static str,
}

/// Run the cascade top to bottom.
pub fn quick_detect(code: &str) -> Option<QuickMatch> {
    let hit = |language, signature| Some(QuickMatch { language, signature });

    if JAVA_MAIN.is_match(code) {
        return hit(Language::Java, "public static void main");
    }

    if INCLUDE.is_match(code) {
        if CPP_IO.is_match(code) {
            return hit(Language::Cpp, "#include with std::/cout/cin");
        }
        if C_IO.is_match(code) && !STD_NAMESPACE.is_match(code) {
            return hit(Language::C, "#include with printf/scanf");
        }
    }

    if has_type_annotations(code) && JS_SHAPES.is_match(code) {
        return hit(Language::TypeScript, "type annotations with function/arrow/console");
    }

    if has_python_def_or_print(code)
        && !JAVA_PRINT.is_match(code)
        && !JAVA_IMPORT.is_match(code)
        && !JS_ONLY.is_match(code)
    {
        return hit(Language::Python, "def/print without Java or JavaScript markers");
    }

    if JS_SIGNS.is_match(code) {
        return hit(Language::JavaScript, "console.log/function/arrow/const/let");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(code: &str) -> Option<Language> {
        quick_detect(code).map(|m| m.language)
    }

    #[test]
    fn test_cascade_order() {
        assert_eq!(lang("public static void main(String[] a) {}"), Some(Language::Java));
        assert_eq!(lang("#include <iostream>\nint main(){ std::cout << 1; }"), Some(Language::Cpp));
        assert_eq!(lang("#include <stdio.h>\nint main(){ printf(\"1\"); }"), Some(Language::C));
        assert_eq!(lang("const f = (x: number) => x;"), Some(Language::TypeScript));
        assert_eq!(lang("def f():\n    return 1\n"), Some(Language::Python));
        assert_eq!(lang("let x = 1;"), Some(Language::JavaScript));
    }

    #[test]
    fn test_java_print_is_not_python() {
        assert_ne!(lang("System.out.print(1);"), Some(Language::Python));
    }

    #[test]
    fn test_no_signature() {
        assert_eq!(lang("x = 1"), None);
        assert_eq!(lang(""), None);
    }
}
