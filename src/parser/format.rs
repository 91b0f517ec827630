use std::fmt;

use super::patterns::{BRACKET_TIMESTAMP, SPEAKER_HEADER};

/// Number of non-empty lines sampled for layout detection
pub const DETECTION_SAMPLE_LINES: usize = 20;

/// Overall layout of a transcript file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    /// `发言人N hh:mm` header lines followed by content lines
    SpeakerTimestamp,
    /// One `[hh:mm:ss]`-prefixed utterance per line
    TimestampSpeaker,
    /// Anything else; parsed line by line
    Mixed,
}

impl fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TranscriptFormat::SpeakerTimestamp => "speaker_timestamp",
            TranscriptFormat::TimestampSpeaker => "timestamp_speaker",
            TranscriptFormat::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Signature match counts over the sampled lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatVotes {
    pub speaker_timestamp: usize,
    pub timestamp_speaker: usize,
}

impl FormatVotes {
    pub fn count(content: &str) -> Self {
        let mut votes = Self::default();

        for line in content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(DETECTION_SAMPLE_LINES)
        {
            if SPEAKER_HEADER.is_match(line) {
                votes.speaker_timestamp += 1;
            }
            if BRACKET_TIMESTAMP.is_match(line) {
                votes.timestamp_speaker += 1;
            }
        }

        votes
    }

    /// Higher count wins; ties (including 0/0) fall back to mixed
    pub fn winner(&self) -> TranscriptFormat {
        if self.speaker_timestamp > self.timestamp_speaker {
            TranscriptFormat::SpeakerTimestamp
        } else if self.timestamp_speaker > self.speaker_timestamp {
            TranscriptFormat::TimestampSpeaker
        } else {
            TranscriptFormat::Mixed
        }
    }
}

/// Detect the layout of a transcript
pub fn detect_format(content: &str) -> TranscriptFormat {
    FormatVotes::count(content).winner()
}
