pub mod format;
pub mod patterns;

pub use format::*;
pub use patterns::*;

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::io::read_transcript;
use crate::models::Segment;

/// Splits raw transcript text into ordered segments
#[derive(Debug, Clone)]
pub struct TranscriptParser {
    matchers: Vec<LineMatcher>,
}

impl Default for TranscriptParser {
    fn default() -> Self {
        Self {
            matchers: default_matchers(),
        }
    }
}

impl TranscriptParser {
    /// Use a custom ordered matcher list for single-line layouts
    pub fn with_matchers(matchers: Vec<LineMatcher>) -> Self {
        Self { matchers }
    }

    /// Detect the layout and parse accordingly
    pub fn parse(&self, content: &str) -> Vec<Segment> {
        let format = detect_format(content);
        debug!("Detected transcript format: {}", format);
        self.parse_as(content, format)
    }

    /// Read a UTF-8 transcript from disk and parse it
    pub fn parse_file(&self, path: &Path) -> Result<Vec<Segment>> {
        let content = read_transcript(path)?;
        Ok(self.parse(&content))
    }

    /// Parse assuming a known layout
    pub fn parse_as(&self, content: &str, format: TranscriptFormat) -> Vec<Segment> {
        let lines: Vec<&str> = content.lines().collect();

        match format {
            TranscriptFormat::SpeakerTimestamp => parse_speaker_blocks(&lines),
            TranscriptFormat::TimestampSpeaker => self.parse_lines(&lines, false),
            TranscriptFormat::Mixed => self.parse_lines(&lines, true),
        }
    }

    /// One segment per recognized line. With `keep_unmatched`, lines no
    /// matcher recognizes become unattributed segments instead of being dropped.
    fn parse_lines(&self, lines: &[&str], keep_unmatched: bool) -> Vec<Segment> {
        let mut segments = Vec::new();

        for (index, raw) in lines.iter().enumerate() {
            let line = raw.trim();
            if is_header_line(line) {
                continue;
            }

            let line_number = index + 1;
            match match_line(&self.matchers, line, line_number) {
                Some(segment) => segments.push(segment),
                None if keep_unmatched => segments.push(Segment::unattributed(line_number, line)),
                None => debug!("Line {} matched no layout, dropped", line_number),
            }
        }

        segments
    }
}

/// Parse with the built-in matchers
pub fn parse(content: &str) -> Vec<Segment> {
    TranscriptParser::default().parse(content)
}

/// `发言人N hh:mm` headers, each followed by one or more content lines.
///
/// Content lines up to the next header are joined with `\n` into a single
/// segment; a header without content produces nothing.
fn parse_speaker_blocks(lines: &[&str]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if is_header_line(line) {
            i += 1;
            continue;
        }
        let Some(caps) = SPEAKER_HEADER.captures(line) else {
            i += 1;
            continue;
        };

        let speaker = format!("发言人{}", &caps[1]);
        let timestamp = caps[2].to_string();

        let mut content = Vec::new();
        let mut j = i + 1;
        while j < lines.len() {
            let next = lines[j].trim();
            if SPEAKER_HEADER.is_match(next) {
                break;
            }
            if !is_header_line(next) {
                content.push(next);
            }
            j += 1;
        }

        if content.is_empty() {
            debug!("Speaker header at line {} has no content, dropped", i + 1);
        } else {
            segments.push(Segment::new(i + 1, timestamp, speaker, content.join("\n"), line));
        }

        i = j;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN;

    #[test]
    fn test_speaker_block_scenario() {
        let content = "发言人1 00:01\n这是测试内容，我觉的应该没有错误。";
        let segments = parse(content);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker, "发言人1");
        assert_eq!(segments[0].timestamp, "00:01");
        assert_eq!(segments[0].text, "这是测试内容，我觉的应该没有错误。");
        assert_eq!(segments[0].line_number, 1);
        assert_eq!(segments[0].original_line, "发言人1 00:01");
    }

    #[test]
    fn test_speaker_blocks_multiline_and_headers() {
        let content = "\
chat-1533
2024年 03 月 01 日 10:00
发言人1 00:01
第一行内容

第二行内容
======
发言人2 00:15
发言人1 00:20
好的，我们再看看。
";
        let segments = parse(content);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "第一行内容\n第二行内容");
        assert_eq!(segments[0].line_number, 3);
        // 发言人2 has no content and is dropped
        assert_eq!(segments[1].speaker, "发言人1");
        assert_eq!(segments[1].timestamp, "00:20");
        assert_eq!(segments[1].text, "好的，我们再看看。");
        assert_eq!(segments[1].line_number, 9);
    }

    #[test]
    fn test_timestamp_lines_drop_unmatched() {
        let content = "[00:00:01] 你好\n无法识别的行\n[00:00:05-00:00:09] 张三: 开始吧\n";
        let segments = parse(content);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].timestamp, "00:00:01");
        assert_eq!(segments[0].line_number, 1);
        assert_eq!(segments[1].speaker, "张三");
        assert_eq!(segments[1].line_number, 3);
    }

    #[test]
    fn test_mixed_keeps_unmatched_lines() {
        let content = "记录开始\n张三：你好\n随便说说而已\n-----\n";
        let segments = parse(content);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speaker, "张三");
        assert_eq!(segments[1].speaker, UNKNOWN);
        assert_eq!(segments[1].timestamp, UNKNOWN);
        assert_eq!(segments[1].text, "随便说说而已");
        assert_eq!(segments[1].line_number, 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n   \n").is_empty());
    }

    #[test]
    fn test_order_matches_source() {
        let content = "张三：一\n李四：二\n王五：三\n";
        let parser = TranscriptParser::default();
        let segments = parser.parse_as(content, TranscriptFormat::Mixed);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["一", "二", "三"]);
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting.txt");
        std::fs::write(&path, "发言人1 00:01\n你好\n发言人2 00:03\n你好呀\n").unwrap();

        let segments = TranscriptParser::default().parse_file(&path).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].line_number, 3);

        assert!(TranscriptParser::default()
            .parse_file(&dir.path().join("missing.txt"))
            .is_err());
    }
}
