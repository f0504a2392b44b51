/// Language Detector - heuristic source classification
///
/// **Two tiers:**
/// 1. Quick detection (`quick.rs`): ordered high-precision signatures, first hit wins
/// 2. Full scoring (`patterns.rs`): weighted keyword/syntax/import/function
///    evidence per language, minus language-specific penalties
///
/// A quick javascript hit is only trusted when javascript's own strong
/// indicator fires and no other language's does. Javascript-looking code
/// carrying another language's tell (a TypeScript annotation, a Python
/// `def`) is rescored instead of being returned at quick-path confidence.
///
/// The detector never fails. Empty input, or input nothing recognises,
/// falls back to javascript.
pub mod patterns;
pub mod quick;

use codelab_common::types::{DetectionResult, LanguageScore};
use codelab_common::Language;
use patterns::{has_python_def_or_print, has_type_annotations, pattern_set, rank, Score, PATTERN_SETS};
use quick::quick_detect;

pub const STRONG_QUICK_CONFIDENCE: f64 = 0.9;
pub const QUICK_CONFIDENCE: f64 = 0.7;
pub const TRUST_THRESHOLD: f64 = 0.6;
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;
pub const LOW_CONFIDENCE_DEFAULT: f64 = 0.2;
const CLOSE_SCORE_MARGIN: f64 = 0.2;

#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, code: &str) -> DetectionResult {
        detect_language(code)
    }
}

/// Classify `code`. Stateless; recomputed on every call.
pub fn detect_language(code: &str) -> DetectionResult {
    if code.trim().is_empty() {
        return DetectionResult {
            language: Language::JavaScript,
            confidence: 0.0,
            reasons: vec!["empty".to_string()],
            alternatives: Vec::new(),
        };
    }

    if let Some(result) = detect_quick(code) {
        tracing::debug!(language = %result.language, confidence = result.confidence, "Quick detection");
        return result;
    }

    let result = detect_scored(code);
    tracing::debug!(language = %result.language, confidence = result.confidence, "Scored detection");
    result
}

fn detect_quick(code: &str) -> Option<DetectionResult> {
    let hit = quick_detect(code)?;
    let own_strong = pattern_set(hit.language).is_some_and(|set| set.has_strong_indicator(code));

    // `const`/`let`/arrows are too common to trust on their own; a bare
    // javascript hit only stands when javascript itself shows a strong tell
    if hit.language == Language::JavaScript {
        let other_strong = PATTERN_SETS
            .iter()
            .filter(|set| set.language != Language::JavaScript)
            .any(|set| set.has_strong_indicator(code));
        if !own_strong || other_strong {
            return None;
        }
    }

    let mut reasons = vec![format!("quick match: {}", hit.signature)];
    let confidence = if own_strong {
        reasons.push("strong indicator".to_string());
        STRONG_QUICK_CONFIDENCE
    } else {
        QUICK_CONFIDENCE
    };

    Some(DetectionResult {
        language: hit.language,
        confidence,
        reasons,
        alternatives: Vec::new(),
    })
}

fn confidence_of(ranked: &[Score], language: Language) -> f64 {
    ranked
        .iter()
        .find(|s| s.language == language)
        .map(|s| s.confidence)
        .unwrap_or(0.0)
}

fn alternatives(ranked: &[Score], chosen: Language) -> Vec<LanguageScore> {
    ranked
        .iter()
        .filter(|s| s.language != chosen)
        .take(2)
        .map(|s| LanguageScore {
            language: s.language,
            confidence: s.confidence,
        })
        .collect()
}

fn result_for(ranked: &[Score], language: Language, extra: Option<&str>) -> DetectionResult {
    let score = ranked.iter().find(|s| s.language == language);
    let mut reasons = score.map(|s| s.reasons.clone()).unwrap_or_default();
    if let Some(extra) = extra {
        reasons.push(extra.to_string());
    }
    DetectionResult {
        language,
        confidence: score.map(|s| s.confidence).unwrap_or(0.0),
        reasons,
        alternatives: alternatives(ranked, language),
    }
}

fn detect_scored(code: &str) -> DetectionResult {
    let ranked = rank(code);
    let top = &ranked[0];

    let ts = confidence_of(&ranked, Language::TypeScript);
    let js = confidence_of(&ranked, Language::JavaScript);
    let py = confidence_of(&ranked, Language::Python);

    // (a) explicit type syntax tips a close JS/TS call to TypeScript
    let js_or_ts_on_top = matches!(top.language, Language::JavaScript | Language::TypeScript);
    if js_or_ts_on_top && ts > 0.3 && ts >= js - CLOSE_SCORE_MARGIN && has_type_annotations(code) {
        return result_for(&ranked, Language::TypeScript, Some("type annotations present"));
    }

    // (b) def/print tips a close Python/JS call to Python
    let py_or_js_on_top = matches!(top.language, Language::Python | Language::JavaScript);
    if py_or_js_on_top && (py - js).abs() <= CLOSE_SCORE_MARGIN && has_python_def_or_print(code) {
        return result_for(&ranked, Language::Python, Some("def/print present"));
    }

    // (c) trusted winner
    if top.confidence > TRUST_THRESHOLD {
        return result_for(&ranked, top.language, None);
    }

    // (d) nothing convincing
    if top.confidence < LOW_CONFIDENCE_THRESHOLD {
        return DetectionResult {
            language: Language::JavaScript,
            confidence: LOW_CONFIDENCE_DEFAULT,
            reasons: vec!["low confidence default".to_string()],
            alternatives: alternatives(&ranked, Language::JavaScript),
        };
    }

    // (e)
    result_for(&ranked, top.language, None)
}
