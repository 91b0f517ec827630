use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use crate::models::{Segment, UNKNOWN};

/// Layout of a single self-contained transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLayout {
    /// `[00:00:01-00:00:05] speaker: text`
    RangedSpeaker,
    /// `[00:00:01] text`
    Timestamped,
    /// `speaker[00:00:01]: text`
    SpeakerTimestamped,
    /// `发言人1: text` or `张三：text`
    SpeakerColon,
}

/// A regex-backed matcher that turns one line into a segment
#[derive(Debug, Clone)]
pub struct LineMatcher {
    pub layout: LineLayout,
    regex: Regex,
    timestamp_group: Option<usize>,
    speaker_group: Option<usize>,
    text_group: usize,
}

impl LineMatcher {
    pub fn new(
        layout: LineLayout,
        pattern: &str,
        timestamp_group: Option<usize>,
        speaker_group: Option<usize>,
        text_group: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            layout,
            regex: Regex::new(pattern)?,
            timestamp_group,
            speaker_group,
            text_group,
        })
    }

    /// Try to recognize `line`; missing speaker/timestamp become "Unknown"
    pub fn match_line(&self, line: &str, line_number: usize) -> Option<Segment> {
        let caps = self.regex.captures(line)?;
        let text = caps.get(self.text_group)?.as_str().trim();

        let field = |group: Option<usize>| {
            group
                .and_then(|g| caps.get(g))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        Some(Segment::new(
            line_number,
            field(self.timestamp_group),
            field(self.speaker_group),
            text,
            line,
        ))
    }
}

/// Built-in line matchers in priority order
pub fn default_matchers() -> Vec<LineMatcher> {
    DEFAULT_MATCHERS.clone()
}

static DEFAULT_MATCHERS: Lazy<Vec<LineMatcher>> = Lazy::new(|| {
    vec![
        LineMatcher::new(
            LineLayout::RangedSpeaker,
            r"^\[(\d{2}:\d{2}:\d{2}-\d{2}:\d{2}:\d{2})\]\s*([^:]+):\s*(.+)",
            Some(1),
            Some(2),
            3,
        ),
        LineMatcher::new(
            LineLayout::Timestamped,
            r"^\[(\d{2}:\d{2}:\d{2})\]\s*(.+)",
            Some(1),
            None,
            2,
        ),
        LineMatcher::new(
            LineLayout::SpeakerTimestamped,
            r"^([^\[]+)\[(\d{2}:\d{2}:\d{2})\]:\s*(.+)",
            Some(2),
            Some(1),
            3,
        ),
        LineMatcher::new(
            LineLayout::SpeakerColon,
            r"^(发言人\d+|[\x{4e00}-\x{9fa5}]{2,8})[:：]\s*(.+)",
            None,
            Some(1),
            2,
        ),
    ]
    .into_iter()
    .map(|m| m.expect("built-in line pattern is valid"))
    .collect()
});

/// First matcher that recognizes the line wins
pub fn match_line(matchers: &[LineMatcher], line: &str, line_number: usize) -> Option<Segment> {
    matchers
        .iter()
        .find_map(|m| m.match_line(line, line_number))
}

/// `发言人N hh:mm` block header
pub static SPEAKER_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^发言人(\d+)\s+(\d{2}:\d{2})").expect("valid speaker header"));

/// `[hh:mm:ss` line prefix
pub static BRACKET_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\d{2}:\d{2}:\d{2}").expect("valid timestamp prefix"));

static HEADER_LINES: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^chat-\d+",
        r"^\d{4}年",
        r"^=+$",
        r"^-+$",
        r"^(文件|转录|记录)",
    ])
    .expect("valid header patterns")
});

/// Title banners, separators, date lines and document headers
pub fn is_header_line(line: &str) -> bool {
    line.is_empty() || HEADER_LINES.is_match(line)
}
