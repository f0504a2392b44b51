/// TypeScript Degrader - lexical type stripping
///
/// Turns TypeScript-looking source into plain JavaScript for runtimes that
/// only accept JavaScript. This is regex and bracket-counting substitution,
/// not a compiler.
///
/// **Handled:**
/// - `import type` / `export type {` rewritten to plain import/export
/// - interface and type alias declarations removed
/// - parameter, return, variable and class field annotations removed
/// - generic parameter lists on calls, functions, arrows and classes removed
/// - `as` assertions, non-null `!` assertions, access modifiers, `implements`
///
/// **Known limitations (left as-is):**
/// - generics nested more than one level, or generics next to comparison
///   operators (`a < b, c > (d)`) can be mis-stripped
/// - parameter lists containing nested parentheses (function-typed params,
///   call expressions in defaults) keep their annotations
/// - type predicates (`x is T`), `enum`, `namespace`, decorators and
///   destructured bindings with annotations are not rewritten
/// - parameter properties (`constructor(private x: number)`) lose their
///   implicit field assignment
/// - annotations inside string literals may be touched, except for the
///   `as` and `!` rewrites which skip string literals
use crate::detector::patterns::has_type_annotations;
use codelab_common::Language;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

const TYPE_ATOM: &str = r#"(?:[A-Za-z_$][\w$.]*(?:<[^<>]*(?:<[^<>]*>[^<>]*)*>)?|\{[^{}]*\}|\[[^\[\]]*\]|'[^']*'|"[^"]*"|\d+)(?:\[\])*"#;

fn type_expr() -> String {
    format!(r"{atom}(?:\s*[|&]\s*{atom})*", atom = TYPE_ATOM)
}

lazy_static! {
    static ref IMPORT_TYPE: Regex = Regex::new(r"(?m)^([ \t]*)import\s+type\s+").expect("valid regex");
    static ref EXPORT_TYPE: Regex = Regex::new(r"(?m)^([ \t]*)export\s+type\s+\{").expect("valid regex");
    static ref INTERFACE_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?interface\s+[A-Za-z_$][\w$]*[^{]*\{"
    ).expect("valid regex");
    static ref TYPE_ALIAS_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?type\s+[A-Za-z_$][\w$]*\s*(?:<[^>]*>)?\s*="
    ).expect("valid regex");
    static ref DECLARE_LINE: Regex = Regex::new(r"(?m)^[ \t]*declare\s+[^\n]*\n?").expect("valid regex");
    static ref CLASS_GENERICS: Regex =
        Regex::new(r"(\bclass\s+[A-Za-z_$][\w$]*)\s*<[^>{]*>").expect("valid regex");
    static ref EXTENDS_GENERICS: Regex =
        Regex::new(r"(\bextends\s+[A-Za-z_$][\w$.]*)\s*<[^>{]*>").expect("valid regex");
    static ref IMPLEMENTS: Regex =
        Regex::new(r"\s+implements\s+[\w$.,\s<>]+?\s*\{").expect("valid regex");
    static ref GENERIC_CALL: Regex = Regex::new(
        r#"([A-Za-z_$][\w$]*)\s*<(?:[\w$\s,.\[\]|'"]|<[\w$\s,.\[\]|'"]*>)*>\s*\("#
    ).expect("valid regex");
    static ref GENERIC_ARROW: Regex = Regex::new(r"=\s*<[\w$\s,]+>\s*\(").expect("valid regex");
    static ref RETURN_TYPE: Regex = Regex::new(&format!(
        r"\)\s*:\s*(?:{})\s*(?P<end>\{{|=>)",
        type_expr()
    )).expect("valid regex");
    static ref PARAM_LIST: Regex =
        Regex::new(r"\((?P<params>[^()]*)\)(?P<end>\s*(?:\{|=>))").expect("valid regex");
    static ref PARAM_MODIFIERS: Regex =
        Regex::new(r"^(\s*)(?:(?:public|private|protected|readonly|override)\s+)+").expect("valid regex");
    static ref VARIABLE_ANNOTATION: Regex =
        Regex::new(r"\b(?:const|let|var)\s+[A-Za-z_$][\w$]*(?P<tail>!?\s*:)").expect("valid regex");
    static ref CLASS_OPEN: Regex =
        Regex::new(r"\bclass\s+[A-Za-z_$][\w$]*[^{;]*\{").expect("valid regex");
    static ref MEMBER_MODIFIERS: Regex = Regex::new(
        r"^(\s*)(?:(?:public|private|protected|readonly|abstract|declare|override)\s+)+"
    ).expect("valid regex");
    static ref STATIC_READONLY: Regex = Regex::new(r"^(\s*static\s+)readonly\s+").expect("valid regex");
    static ref FIELD_ANNOTATION: Regex =
        Regex::new(r"^(?P<head>\s*(?:static\s+)?[A-Za-z_$#][\w$]*)[?!]?\s*:").expect("valid regex");
    static ref AS_ASSERTION: Regex =
        Regex::new(&format!(r"\s+as\s+(?:const\b|{})", type_expr())).expect("valid regex");
    static ref NON_NULL: Regex = Regex::new(r"([\w$)\]])!([.\[)\],;])").expect("valid regex");
    static ref ENUM_DECL: Regex = Regex::new(r"\benum\s+[A-Za-z_$][\w$]*\s*\{").expect("valid regex");
    static ref TS_ONLY_SYNTAX: Regex = Regex::new(concat!(
        r"(?m)\bimport\s+type\b|\bexport\s+type\b",
        r"|\bas\s+(?:const|string|number|boolean|any|unknown)\b",
        r"|\)\s*:\s*[A-Za-z_$][\w$<>\[\]]*\s*(?:\{|=>)",
        r"|^\s*(?:public|private|protected|readonly)\s+[A-Za-z_$][\w$]*\s*[:(=;]",
        r"|<[A-Z]\w*>\s*\("
    )).expect("valid regex");
}

/// Source ready for submission, with the language it should run as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedSource {
    pub code: String,
    pub language: Language,
}

/// True when the code uses syntax plain JavaScript would reject.
pub fn is_typescript_code(code: &str) -> bool {
    has_type_annotations(code) || ENUM_DECL.is_match(code) || TS_ONLY_SYNTAX.is_match(code)
}

/// Degrade TypeScript (declared, or detected inside JavaScript) to JavaScript.
/// Any other language passes through untouched.
pub fn handle_typescript_execution(code: &str, language: Language) -> DegradedSource {
    let needs_degrade = language == Language::TypeScript
        || (language == Language::JavaScript && is_typescript_code(code));

    if needs_degrade {
        tracing::debug!(from = %language, "Degrading TypeScript source to JavaScript");
        DegradedSource {
            code: transpile_typescript(code),
            language: Language::JavaScript,
        }
    } else {
        DegradedSource {
            code: code.to_string(),
            language,
        }
    }
}

pub fn transpile_typescript(code: &str) -> String {
    let mut out = IMPORT_TYPE.replace_all(code, "${1}import ").into_owned();
    out = EXPORT_TYPE.replace_all(&out, "${1}export {").into_owned();

    out = remove_blocks(&out, &INTERFACE_DECL);
    out = remove_type_aliases(&out);
    out = DECLARE_LINE.replace_all(&out, "").into_owned();

    out = CLASS_GENERICS.replace_all(&out, "$1").into_owned();
    out = EXTENDS_GENERICS.replace_all(&out, "$1").into_owned();
    out = IMPLEMENTS.replace_all(&out, " {").into_owned();
    out = GENERIC_CALL.replace_all(&out, "${1}(").into_owned();
    out = GENERIC_ARROW.replace_all(&out, "= (").into_owned();

    out = RETURN_TYPE.replace_all(&out, ") ${end}").into_owned();
    out = PARAM_LIST
        .replace_all(&out, |caps: &Captures| {
            format!("({}){}", strip_params(&caps["params"]), &caps["end"])
        })
        .into_owned();
    out = strip_variable_annotations(&out);
    out = strip_class_members(&out);

    let mut degraded = out
        .lines()
        .map(strip_line_assertions)
        .collect::<Vec<_>>()
        .join("\n");
    if out.ends_with('\n') {
        degraded.push('\n');
    }
    degraded
}

/// Walk a type expression from `start` and return the index of the first
/// top-level character in `stops` (or the end of input).
fn skip_type(s: &str, start: usize, stops: &[char]) -> usize {
    let bytes: Vec<(usize, char)> = s[start..].char_indices().collect();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < bytes.len() {
        let (offset, c) = bytes[i];
        let next = bytes.get(i + 1).map(|(_, n)| *n);

        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '=' if next == Some('>') => {
                i += 2;
                continue;
            }
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' => {
                if depth == 0 {
                    return start + offset;
                }
                depth -= 1;
            }
            _ if depth == 0 && stops.contains(&c) => return start + offset,
            _ => {}
        }
        i += 1;
    }

    s.len()
}

/// Index of the `}` matching the `{` at `open`, or `s.len()` when the
/// block is never closed.
fn matching_brace(s: &str, open: usize) -> usize {
    let mut depth = 0;
    for (offset, c) in s[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return open + offset;
                }
            }
            _ => {}
        }
    }
    s.len()
}

fn remove_blocks(code: &str, opener: &Regex) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for m in opener.find_iter(code) {
        if m.start() < last {
            continue;
        }
        let close = matching_brace(code, m.end() - 1);
        out.push_str(&code[last..m.start()]);
        last = (close + 1).min(code.len());
        if code[last..].starts_with('\n') {
            last += 1;
        }
    }

    out.push_str(&code[last..]);
    out
}

fn remove_type_aliases(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for m in TYPE_ALIAS_DECL.find_iter(code) {
        if m.start() < last {
            continue;
        }
        let mut pos = m.end();
        let end = loop {
            let stop = skip_type(code, pos, &[';', '\n']);
            if stop < code.len() && code[stop..].starts_with('\n') {
                let rest = code[stop + 1..].trim_start();
                let body_so_far = code[m.end()..stop].trim();
                // union members continued on the next line
                if body_so_far.is_empty() || rest.starts_with('|') || rest.starts_with('&') {
                    pos = stop + 1;
                    continue;
                }
            }
            break stop;
        };

        out.push_str(&code[last..m.start()]);
        last = (end + 1).min(code.len());
        if code[end..].starts_with(';') && code[last..].starts_with('\n') {
            last += 1;
        }
    }

    out.push_str(&code[last..]);
    out
}

/// Split on commas that are not nested inside brackets or generics.
fn split_top_level(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = '\0';

    for (i, c) in params.char_indices() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' if prev != '=' => depth -= 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        prev = c;
    }
    parts.push(&params[start..]);
    parts
}

/// Length of the binding at the start of a parameter: an identifier
/// (optionally spread) or a balanced destructuring pattern.
fn binding_len(segment: &str) -> usize {
    let trimmed = segment.trim_start();
    let lead = segment.len() - trimmed.len();
    let body = trimmed.strip_prefix("...").unwrap_or(trimmed);
    let spread = trimmed.len() - body.len();

    let len = match body.chars().next() {
        Some('{') | Some('[') => {
            let mut depth = 0;
            let mut end = 0;
            for (i, c) in body.char_indices() {
                match c {
                    '{' | '[' => depth += 1,
                    '}' | ']' => {
                        depth -= 1;
                        if depth == 0 {
                            end = i + 1;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            end
        }
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => body
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
            .map(|(i, _)| i)
            .unwrap_or(body.len()),
        _ => 0,
    };

    if len == 0 {
        0
    } else {
        lead + spread + len
    }
}

fn strip_param(segment: &str) -> String {
    let segment = PARAM_MODIFIERS.replace(segment, "$1");
    let binding = binding_len(&segment);
    if binding == 0 {
        return segment.into_owned();
    }

    let (name, rest) = segment.split_at(binding);
    let rest = rest.strip_prefix('?').unwrap_or(rest);
    let after_ws = rest.trim_start();

    let Some(type_part) = after_ws.strip_prefix(':') else {
        // optional marker without a type
        return if rest.len() != segment.len() - binding {
            format!("{}{}", name, rest)
        } else {
            segment.into_owned()
        };
    };

    let stop = skip_type(type_part, 0, &['=']);
    if stop < type_part.len() {
        format!("{} = {}", name, type_part[stop + 1..].trim())
    } else {
        name.to_string()
    }
}

fn strip_params(params: &str) -> String {
    if params.trim().is_empty() {
        return params.to_string();
    }
    split_top_level(params)
        .into_iter()
        .map(strip_param)
        .collect::<Vec<_>>()
        .join(",")
}

fn strip_variable_annotations(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for caps in VARIABLE_ANNOTATION.captures_iter(code) {
        let Some(tail) = caps.name("tail") else { continue };
        if tail.start() < last {
            continue;
        }
        let stop = skip_type(code, tail.end(), &['=', ';', ',', '\n']);
        out.push_str(&code[last..tail.start()]);
        if code[stop..].starts_with('=') {
            out.push(' ');
        }
        last = stop;
    }

    out.push_str(&code[last..]);
    out
}

fn strip_class_members(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for m in CLASS_OPEN.find_iter(code) {
        if m.start() < last {
            continue;
        }
        let body_start = m.end();
        let body_end = matching_brace(code, m.end() - 1).clamp(body_start, code.len());
        out.push_str(&code[last..body_start]);
        out.push_str(&strip_fields(&code[body_start..body_end]));
        last = body_end;
    }

    out.push_str(&code[last..]);
    out
}

/// Rewrite member declarations that sit directly in a class body.
fn strip_fields(body: &str) -> String {
    let mut depth = 0i32;
    let mut lines = Vec::new();

    for line in body.split('\n') {
        let rewritten = if depth == 0 {
            let line = MEMBER_MODIFIERS.replace(line, "$1");
            let line = STATIC_READONLY.replace(&line, "${1}").into_owned();
            let field = FIELD_ANNOTATION.captures(&line).map(|caps| {
                let head = caps.name("head").map(|h| h.as_str()).unwrap_or_default();
                let colon = caps.get(0).map(|m| m.end()).unwrap_or(line.len());
                let stop = skip_type(&line, colon, &['=', ';']);
                let tail = &line[stop..];
                if tail.starts_with('=') {
                    format!("{} {}", head, tail)
                } else {
                    format!("{}{}", head, tail)
                }
            });
            field.unwrap_or(line)
        } else {
            line.to_string()
        };

        depth += line.matches('{').count() as i32 - line.matches('}').count() as i32;
        lines.push(rewritten);
    }

    lines.join("\n")
}

/// Apply `f` to the parts of `line` outside string literals.
fn map_code_segments(line: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(line.len());
    let mut segment_start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    out.push_str(&line[segment_start..=i]);
                    segment_start = i + 1;
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' || c == '`' => {
                out.push_str(&f(&line[segment_start..i]));
                segment_start = i;
                quote = Some(c);
            }
            None => {}
        }
    }

    if quote.is_some() {
        out.push_str(&line[segment_start..]);
    } else {
        out.push_str(&f(&line[segment_start..]));
    }
    out
}

fn strip_line_assertions(line: &str) -> String {
    let trimmed = line.trim_start();
    // `import { a as b }` and `export * as ns` are renames, not assertions
    let is_module_clause = trimmed.starts_with("import ") || trimmed.starts_with("export {") || trimmed.starts_with("export *");

    map_code_segments(line, |code| {
        let code = if is_module_clause {
            code.to_string()
        } else {
            AS_ASSERTION.replace_all(code, "").into_owned()
        };
        NON_NULL.replace_all(&code, "$1$2").into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_annotations_removed() {
        let js = transpile_typescript("function f(x: number): string { return String(x); }");
        assert_eq!(js, "function f(x) { return String(x); }");
        assert!(!js.contains(':'));
    }

    #[test]
    fn test_arrow_and_default_params() {
        let js = transpile_typescript("const add = (a: number, b: number = 2): number => a + b;");
        assert_eq!(js, "const add = (a, b = 2) => a + b;");
    }

    #[test]
    fn test_optional_and_rest_params() {
        let js = transpile_typescript("function log(msg?: string, ...rest: any[]) { console.log(msg, rest); }");
        assert_eq!(js, "function log(msg, ...rest) { console.log(msg, rest); }");
    }

    #[test]
    fn test_interface_and_type_alias_removed() {
        let ts = "interface User {\n  id: number;\n  tags: { name: string }[];\n}\ntype Id = string | number;\nconst u = { id: 1 };\n";
        let js = transpile_typescript(ts);
        assert_eq!(js, "const u = { id: 1 };\n");
    }

    #[test]
    fn test_multiline_union_alias_removed() {
        let ts = "type Shape =\n  | { kind: 'circle' }\n  | { kind: 'square' };\nconsole.log(1);";
        assert_eq!(transpile_typescript(ts), "console.log(1);");
    }

    #[test]
    fn test_variable_annotations() {
        let js = transpile_typescript("let count: number = 0;\nconst names: string[] = [];\nlet later: Map<string, number>;");
        assert_eq!(js, "let count = 0;\nconst names = [];\nlet later;");
    }

    #[test]
    fn test_generics_removed() {
        let js = transpile_typescript("function first<T>(items: T[]): T { return items[0]; }\nconst m = new Map<string, number>();");
        assert_eq!(js, "function first(items) { return items[0]; }\nconst m = new Map();");
    }

    #[test]
    fn test_class_members() {
        let ts = r#"class Counter<T> implements Countable {
    private count: number = 0;
    readonly name: string;

    constructor(name: string) {
        this.name = name;
    }

    increment(step: number = 1): number {
        this.count += step;
        return this.count;
    }
}"#;
        let expected = r#"class Counter {
    count = 0;
    name;

    constructor(name) {
        this.name = name;
    }

    increment(step = 1) {
        this.count += step;
        return this.count;
    }
}"#;
        assert_eq!(transpile_typescript(ts), expected);
    }

    #[test]
    fn test_object_literals_untouched() {
        let js = "const o = { a: 1, b: 'x' };\nconst p = {\n  c: true,\n};";
        assert_eq!(transpile_typescript(js), js);
    }

    #[test]
    fn test_assertions_removed_outside_strings() {
        let ts = "const el = document.getElementById('app')!;\nconst n = (value as unknown as number) + 1;\nconst s = \"fast as light\";";
        let js = transpile_typescript(ts);
        assert_eq!(
            js,
            "const el = document.getElementById('app');\nconst n = (value) + 1;\nconst s = \"fast as light\";"
        );
    }

    #[test]
    fn test_import_rewrites_keep_renames() {
        let ts = "import type { User } from './user';\nimport { a as b } from './x';\nexport type { User };";
        let js = transpile_typescript(ts);
        assert_eq!(js, "import { User } from './user';\nimport { a as b } from './x';\nexport { User };");
    }

    #[test]
    fn test_plain_javascript_is_not_typescript() {
        assert!(!is_typescript_code("function add(a, b) { return a + b; }\nconsole.log(add(1, 2));"));
        assert!(is_typescript_code("function add(a: number, b: number) { return a + b; }"));
        assert!(is_typescript_code("const x = [1, 2] as const;"));
        assert!(is_typescript_code("enum Color { Red, Green }"));
    }

    #[test]
    fn test_handle_typescript_execution() {
        let degraded = handle_typescript_execution("let x: number = 1;", Language::TypeScript);
        assert_eq!(degraded.language, Language::JavaScript);
        assert_eq!(degraded.code, "let x = 1;");

        let sniffed = handle_typescript_execution("let x: number = 1;", Language::JavaScript);
        assert_eq!(sniffed.language, Language::JavaScript);
        assert_eq!(sniffed.code, "let x = 1;");

        let python = handle_typescript_execution("x: int = 1", Language::Python);
        assert_eq!(python.language, Language::Python);
        assert_eq!(python.code, "x: int = 1");
    }

    #[test]
    fn test_unclosed_blocks_ending_in_multibyte_text() {
        let js = transpile_typescript("class A {\n  x: number;\n  // 🎉");
        assert!(!js.contains("number"));
        assert!(js.ends_with("// 🎉"));

        let degraded = handle_typescript_execution("class A {\n  private x: number;\n  // é", Language::JavaScript);
        assert_eq!(degraded.language, Language::JavaScript);
        assert!(!degraded.code.contains("private"));
        assert!(degraded.code.ends_with("// é"));

        let interface = transpile_typescript("interface Point {\n  x: number;\n  // ü");
        assert!(!interface.contains("interface"));
    }
}
