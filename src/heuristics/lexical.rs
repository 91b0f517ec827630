use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CorrectionError, QUICK_FIX_ERROR};

/// Confidence attached to every dictionary substitution
pub const QUICK_FIX_CONFIDENCE: f64 = 0.95;

/// Known wrong → right substitutions, applied in this order
pub const QUICK_FIXES: &[(&str, &str)] = &[
    ("我觉的", "我觉得"),
    ("你觉的", "你觉得"),
    ("他觉的", "他觉得"),
    ("她觉的", "她觉得"),
    ("说的好", "说得好"),
    ("做的不错", "做得不错"),
    ("想的周到", "想得周到"),
    ("听的清楚", "听得清楚"),
    ("跑的快", "跑得快"),
    ("写的好", "写得好"),
    ("学的认真", "学得认真"),
    ("睡的香", "睡得香"),
    ("工作的努力", "工作得努力"),
    ("来的及", "来得及"),
    ("记的", "记得"),
    ("舍的", "舍得"),
    ("值的", "值得"),
    ("在提醒", "再提醒"),
    ("在看看", "再看看"),
    ("在试试", "再试试"),
    ("在想想", "再想想"),
    ("在说说", "再说说"),
    ("在考虑", "再考虑"),
    ("在确认", "再确认"),
    ("在检查", "再检查"),
    ("在来", "再来"),
    ("因该", "应该"),
    ("发声", "发生"),
    ("做实", "做事"),
    ("那里", "哪里"),
    ("再那", "在那"),
    ("现再", "现在"),
    ("拔打", "拨打"),
    ("账本", "帐本"),
    ("申玉飞", "沈玉飞"),
    ("孙玉飞", "沈玉飞"),
    ("申一飞", "沈玉飞"),
];

/// A character repeated this many times or more collapses to one
const REPEAT_COLLAPSE_MIN: usize = 4;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static PUNCT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!{2,}|！{2,}|\?{2,}|？{2,}").expect("valid regex"));

/// A single dictionary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickFix {
    pub wrong: String,
    pub right: String,
}

/// Deterministic substring substitution plus text normalization
#[derive(Debug, Clone)]
pub struct LexicalFixer {
    fixes: Vec<QuickFix>,
}

impl Default for LexicalFixer {
    fn default() -> Self {
        Self::new(QUICK_FIXES.iter().map(|(wrong, right)| QuickFix {
            wrong: wrong.to_string(),
            right: right.to_string(),
        }))
    }
}

impl LexicalFixer {
    pub fn new(fixes: impl IntoIterator<Item = QuickFix>) -> Self {
        Self {
            fixes: fixes.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Apply every matching dictionary entry, then normalize.
    ///
    /// Only dictionary hits are reported; normalization alone leaves the
    /// error list empty.
    pub fn fix(&self, text: &str) -> (String, Vec<CorrectionError>) {
        let mut corrected = text.to_string();
        let mut errors = Vec::new();

        for fix in &self.fixes {
            if corrected.contains(&fix.wrong) {
                corrected = corrected.replace(&fix.wrong, &fix.right);
                errors.push(
                    CorrectionError::new(QUICK_FIX_ERROR, &fix.wrong, &fix.right)
                        .with_confidence(QUICK_FIX_CONFIDENCE),
                );
            }
        }

        (normalize(&corrected), errors)
    }
}

/// Collapse whitespace, long character repeats and repeated `!`/`?`
pub fn normalize(text: &str) -> String {
    let spaced = WHITESPACE_RUN.replace_all(text, " ");
    let collapsed = collapse_repeats(spaced.trim(), REPEAT_COLLAPSE_MIN);
    PUNCT_RUN
        .replace_all(&collapsed, |caps: &regex::Captures| {
            caps[0].chars().next().map(String::from).unwrap_or_default()
        })
        .into_owned()
}

fn collapse_repeats(text: &str, min_run: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        let keep = if run >= min_run { 1 } else { run };
        out.extend(std::iter::repeat_n(c, keep));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_hit() {
        let fixer = LexicalFixer::default();
        let (text, errors) = fixer.fix("这是测试内容，我觉的应该没有错误。");

        assert_eq!(text, "这是测试内容，我觉得应该没有错误。");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].original, "我觉的");
        assert_eq!(errors[0].corrected, "我觉得");
        assert_eq!(errors[0].error_type, QUICK_FIX_ERROR);
        assert_eq!(errors[0].confidence, Some(QUICK_FIX_CONFIDENCE));
    }

    #[test]
    fn test_replaces_all_occurrences_once_per_key() {
        let fixer = LexicalFixer::default();
        let (text, errors) = fixer.fix("因该这样，因该那样");
        assert_eq!(text, "应该这样，应该那样");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_insertion_order_is_deterministic() {
        // entries fire in dictionary order
        let fixer = LexicalFixer::default();
        let (text, errors) = fixer.fix("你在来那里");
        assert_eq!(text, "你再来哪里");
        let keys: Vec<&str> = errors.iter().map(|e| e.original.as_str()).collect();
        assert_eq!(keys, vec!["在来", "那里"]);
    }

    #[test]
    fn test_normalization_alone_is_not_an_error() {
        let fixer = LexicalFixer::default();
        let (text, errors) = fixer.fix("好好好好好   真的吗？？？");
        assert_eq!(text, "好 真的吗？");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_idempotent_on_clean_text() {
        let fixer = LexicalFixer::default();
        let clean = "我觉得今天的会议很顺利。";
        let (once, errors) = fixer.fix(clean);
        assert_eq!(once, clean);
        assert!(errors.is_empty());

        let (twice, errors) = fixer.fix(&once);
        assert_eq!(twice, once);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_collapse_repeats_threshold() {
        assert_eq!(collapse_repeats("啊啊啊", 4), "啊啊啊");
        assert_eq!(collapse_repeats("啊啊啊啊", 4), "啊");
        assert_eq!(collapse_repeats("aabbbbbc", 4), "aabc");
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize("what?? no!!"), "what? no!");
        assert_eq!(normalize("好！！"), "好！");
        assert_eq!(normalize("  a\n\tb  "), "a b");
    }

    #[test]
    fn test_custom_dictionary() {
        let fixer = LexicalFixer::new(vec![QuickFix {
            wrong: "庞加来".to_string(),
            right: "庞加莱".to_string(),
        }]);
        assert_eq!(fixer.len(), 1);
        let (text, errors) = fixer.fix("庞加来猜想");
        assert_eq!(text, "庞加莱猜想");
        assert_eq!(errors.len(), 1);
    }
}
