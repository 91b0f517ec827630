use serde::{Deserialize, Serialize};

use super::CorrectionResult;

/// Placeholder used when a transcript line carries no speaker or timestamp
pub const UNKNOWN: &str = "Unknown";

/// One speaker turn or recognized line extracted from a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based line number of the line that opened this segment
    pub line_number: usize,
    /// Timestamp as written in the source ("Unknown" if absent)
    pub timestamp: String,
    /// Speaker label as written in the source ("Unknown" if absent)
    pub speaker: String,
    /// Spoken text; multi-line turns keep their embedded newlines
    pub text: String,
    /// The raw line the segment was recognized from
    pub original_line: String,
}

impl Segment {
    pub fn new(
        line_number: usize,
        timestamp: impl Into<String>,
        speaker: impl Into<String>,
        text: impl Into<String>,
        original_line: impl Into<String>,
    ) -> Self {
        Self {
            line_number,
            timestamp: timestamp.into(),
            speaker: speaker.into(),
            text: text.into(),
            original_line: original_line.into(),
        }
    }

    /// A line that matched no known layout: the whole line is the text
    pub fn unattributed(line_number: usize, line: &str) -> Self {
        Self::new(line_number, UNKNOWN, UNKNOWN, line, line)
    }

    /// Whether the segment has any non-whitespace text
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A segment with its correction merged on, as consumed by the writers
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedSegment {
    #[serde(flatten)]
    pub segment: Segment,
    #[serde(flatten)]
    pub correction: CorrectionResult,
}

impl EnrichedSegment {
    pub fn new(segment: Segment, correction: CorrectionResult) -> Self {
        Self {
            segment,
            correction,
        }
    }

    /// Text to emit in the corrected transcript
    pub fn display_text(&self) -> &str {
        if self.correction.has_errors {
            &self.correction.corrected_text
        } else {
            &self.segment.text
        }
    }
}
