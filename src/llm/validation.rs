use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum length of a cleaned reply relative to the original, in characters
pub const MIN_LENGTH_RATIO: f64 = 0.3;

/// Labels and annotations the model sometimes wraps around its answer
static ANNOTATIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\*\*[^*]+\*\*",
        r"置信度[:：]\s*[\d.]+",
        r"(?i)confidence:\s*[\d.]+",
        r"修正后?[:：]",
        r"原文[:：]",
        r"错误详情[:：]",
        r"(?i)(corrected|original):",
        r"^\d+\.\s*",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid annotation pattern"))
    .collect()
});

/// Clean a candidate correction and decide whether it is usable.
///
/// Returns `None` when nothing is left after stripping annotations, or when
/// the remainder is shorter than 30% of the original.
pub fn sanitize_correction(candidate: &str, original: &str) -> Option<String> {
    let mut cleaned = candidate.trim().to_string();
    for pattern in ANNOTATIONS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return None;
    }

    let min_chars = original.chars().count() as f64 * MIN_LENGTH_RATIO;
    if (cleaned.chars().count() as f64) < min_chars {
        return None;
    }

    Some(cleaned.to_string())
}
