use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Numbered reply line shapes, tried in order
static NUMBERED_LINE: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"^(\d+)\|(.+)").expect("valid regex"),
        Regex::new(r"^(\d+)\.\s*(.+)").expect("valid regex"),
        Regex::new(r"^(\d+)[:：]\s*(.+)").expect("valid regex"),
    ]
});

/// Map a free-form batch reply back to 1-based positions.
///
/// Each trimmed line is tried as `N|text`, `N. text`, then `N: text`.
/// Numbers outside `1..=expected` and empty texts are ignored; a later line
/// overwrites an earlier one with the same number. When nothing parses and the
/// reply has exactly `expected` lines, lines are mapped positionally.
pub fn parse_numbered_reply(reply: &str, expected: usize) -> BTreeMap<usize, String> {
    let reply = reply.trim();
    let mut mapped = BTreeMap::new();

    for line in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((n, text)) = parse_line(line) {
            if (1..=expected).contains(&n) {
                mapped.insert(n, text);
            }
        }
    }

    if mapped.is_empty() && !reply.is_empty() {
        let lines: Vec<&str> = reply.lines().collect();
        if lines.len() == expected {
            for (i, line) in lines.into_iter().enumerate() {
                let line = line.trim();
                if !line.is_empty() {
                    mapped.insert(i + 1, line.to_string());
                }
            }
        }
    }

    mapped
}

fn parse_line(line: &str) -> Option<(usize, String)> {
    NUMBERED_LINE.iter().find_map(|pattern| {
        let caps = pattern.captures(line)?;
        let n = caps[1].parse::<usize>().ok()?;
        let text = caps[2].trim();
        (!text.is_empty()).then(|| (n, text.to_string()))
    })
}
