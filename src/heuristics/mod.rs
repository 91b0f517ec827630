pub mod lexical;
pub mod relevance;

pub use lexical::*;
pub use relevance::*;

use crate::models::{CorrectionMethod, CorrectionResult};

/// The cheap, local tiers of the pipeline
#[derive(Debug, Clone, Default)]
pub struct Heuristics {
    pub fixer: LexicalFixer,
    pub filter: RelevanceFilter,
}

/// Outcome of running the local tiers on one text
#[derive(Debug, Clone, PartialEq)]
pub enum HeuristicsOutcome {
    /// Resolved locally (empty, quick fix or pre-filter skip)
    Resolved(CorrectionResult),
    /// Needs the remote service
    NeedsRemote,
}

impl Heuristics {
    pub fn new(fixer: LexicalFixer, filter: RelevanceFilter) -> Self {
        Self { fixer, filter }
    }

    /// Apply the deterministic tiers before any remote call:
    /// 1. Empty text resolves as `empty`
    /// 2. A dictionary hit short-circuits as `quick_fix`
    /// 3. Text the relevance filter rejects resolves as `pre_filter`
    pub fn apply(&self, text: &str) -> HeuristicsOutcome {
        let text = text.trim();

        if text.is_empty() {
            return HeuristicsOutcome::Resolved(CorrectionResult::unchanged(
                text,
                CorrectionMethod::Empty,
            ));
        }

        let (fixed, errors) = self.fixer.fix(text);
        if !errors.is_empty() {
            return HeuristicsOutcome::Resolved(CorrectionResult::corrected(
                text,
                fixed,
                errors,
                CorrectionMethod::QuickFix,
            ));
        }

        if !self.filter.needs_remote_correction(text) {
            return HeuristicsOutcome::Resolved(CorrectionResult::unchanged(
                text,
                CorrectionMethod::PreFilter,
            ));
        }

        HeuristicsOutcome::NeedsRemote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(outcome: HeuristicsOutcome) -> CorrectionResult {
        match outcome {
            HeuristicsOutcome::Resolved(result) => result,
            HeuristicsOutcome::NeedsRemote => panic!("expected a local resolution"),
        }
    }

    #[test]
    fn test_empty_text() {
        let result = resolved(Heuristics::default().apply("   "));
        assert_eq!(result.method, CorrectionMethod::Empty);
        assert!(!result.has_errors);
    }

    #[test]
    fn test_quick_fix_short_circuits() {
        let result = resolved(Heuristics::default().apply("这是测试内容，我觉的应该没有错误。"));
        assert_eq!(result.method, CorrectionMethod::QuickFix);
        assert!(result.has_errors);
        assert!(result.corrected_text.contains("我觉得"));
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_pre_filter_round_trip() {
        let text = "今天天气很好，大家心情愉快";
        let result = resolved(Heuristics::default().apply(text));
        assert_eq!(result.method, CorrectionMethod::PreFilter);
        assert_eq!(result.corrected_text, text);
        assert!(!result.has_errors);
    }

    #[test]
    fn test_normalization_only_goes_to_pre_filter() {
        // whitespace would change under normalization, but that is not an error
        let text = "今天  天气很好，大家心情愉快";
        let result = resolved(Heuristics::default().apply(text));
        assert_eq!(result.method, CorrectionMethod::PreFilter);
        assert_eq!(result.corrected_text, text);
    }

    #[test]
    fn test_needs_remote() {
        let outcome = Heuristics::default().apply("我们明天在讨论一下这个方案吧");
        assert_eq!(outcome, HeuristicsOutcome::NeedsRemote);
    }
}
