use tracing::info;

use crate::heuristics::{Heuristics, HeuristicsOutcome};
use crate::models::{CorrectionMethod, CorrectionResult, Segment};

/// Result of Stage 0 triage
#[derive(Debug, Default)]
pub struct Stage0Result {
    /// One slot per segment; `None` where the segment is queued for the remote tier
    pub resolved: Vec<Option<CorrectionResult>>,
    /// `(original_index, trimmed text)` awaiting the remote tier, in source order
    pub queued: Vec<(usize, String)>,
    pub quick_fixed: usize,
    pub pre_filtered: usize,
    pub empty: usize,
}

/// Execute Stage 0: run the local tiers over every segment.
///
/// Segments resolved locally get their final result here; the rest are
/// queued with their index so results can be written back in order.
pub fn execute_stage0(segments: &[Segment], heuristics: &Heuristics) -> Stage0Result {
    let mut result = Stage0Result {
        resolved: Vec::with_capacity(segments.len()),
        ..Default::default()
    };

    for (index, segment) in segments.iter().enumerate() {
        match heuristics.apply(&segment.text) {
            HeuristicsOutcome::Resolved(correction) => {
                match correction.method {
                    CorrectionMethod::QuickFix => result.quick_fixed += 1,
                    CorrectionMethod::PreFilter => result.pre_filtered += 1,
                    CorrectionMethod::Empty => result.empty += 1,
                    _ => {}
                }
                result.resolved.push(Some(correction));
            }
            HeuristicsOutcome::NeedsRemote => {
                result.resolved.push(None);
                result
                    .queued
                    .push((index, segment.text.trim().to_string()));
            }
        }
    }

    info!(
        "Stage 0: {} segments, {} quick fixes, {} pre-filtered, {} empty, {} queued",
        segments.len(),
        result.quick_fixed,
        result.pre_filtered,
        result.empty,
        result.queued.len()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(n: usize, text: &str) -> Segment {
        Segment::new(n, "00:00", "张三", text, text)
    }

    #[test]
    fn test_triage_partitions_segments() {
        let segments = vec![
            segment(1, "我觉的这个方案可以"),
            segment(2, "好的"),
            segment(3, "   "),
            segment(4, "我们明天在讨论一下这个方案吧"),
        ];

        let result = execute_stage0(&segments, &Heuristics::default());

        assert_eq!(result.resolved.len(), 4);
        assert_eq!(result.quick_fixed, 1);
        assert_eq!(result.pre_filtered, 1);
        assert_eq!(result.empty, 1);
        assert_eq!(
            result.queued,
            vec![(3, "我们明天在讨论一下这个方案吧".to_string())]
        );
        assert!(result.resolved[3].is_none());
        assert_eq!(
            result.resolved[0].as_ref().map(|r| r.method),
            Some(CorrectionMethod::QuickFix)
        );
    }

    #[test]
    fn test_empty_input() {
        let result = execute_stage0(&[], &Heuristics::default());
        assert!(result.resolved.is_empty());
        assert!(result.queued.is_empty());
    }
}
