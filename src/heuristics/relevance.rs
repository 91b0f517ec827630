use once_cell::sync::Lazy;
use regex::RegexSet;

/// Speaker headers, separators, bare timestamps and document headers
static STRUCTURAL_LINES: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^(发言人\d+|=+|-+|\d{2}:\d{2})",
        r"^chat-\d+",
        r"^\d{4}年",
        r"^(文件|转录|记录)",
    ])
    .expect("valid structural patterns")
});

/// Shapes of the error classes worth a remote call
static SUSPICIOUS_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // 的/得/地
        r"[\x{4e00}-\x{9fa5}]+的[\x{4e00}-\x{9fa5}]+",
        // 在/再
        r"在[\x{4e00}-\x{9fa5}]{1,4}",
        r"因[该当]",
        r"[那哪]里",
        // name variants
        r"[申孙][玉一][飞斐]",
        r"庞加[莱来]",
    ])
    .expect("valid suspicious patterns")
});

/// Thresholds for the relevance filter
#[derive(Debug, Clone)]
pub struct RelevanceConfig {
    /// Texts shorter than this (in characters) are never sent
    pub min_chars: usize,
    /// Texts longer than this are sent when they contain a common word
    pub common_word_min_chars: usize,
    /// Words that often sit next to a confusable character
    pub common_words: Vec<String>,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            min_chars: 8,
            common_word_min_chars: 15,
            common_words: ["我觉", "应该", "可以", "因为", "所以", "然后", "但是"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Cheap gate deciding whether a segment is worth a remote call.
///
/// False negatives leave text uncorrected; false positives cost one call.
#[derive(Debug, Clone, Default)]
pub struct RelevanceFilter {
    config: RelevanceConfig,
}

impl RelevanceFilter {
    pub fn new(config: RelevanceConfig) -> Self {
        Self { config }
    }

    pub fn needs_remote_correction(&self, text: &str) -> bool {
        let text = text.trim();
        let chars = text.chars().count();

        if chars < self.config.min_chars {
            return false;
        }

        if STRUCTURAL_LINES.is_match(text) {
            return false;
        }

        if SUSPICIOUS_PATTERNS.is_match(text) {
            return true;
        }

        chars > self.config.common_word_min_chars
            && self
                .config
                .common_words
                .iter()
                .any(|w| text.contains(w.as_str()))
    }
}
