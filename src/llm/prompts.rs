/// Instruction header for a numbered batch
pub const BATCH_INSTRUCTIONS: &str = "请修正以下文本中的错误，严格按照格式返回。每行一个结果，格式为\"数字|修正后的文本\"。如果某行没有错误，请原样返回该行。";

/// Trailer asking for bare output lines
pub const BATCH_OUTPUT_HINT: &str = "输出（仅返回修正后的文本，不要添加任何解释、标签或说明）：";

/// Token budget for the single-text prompt
pub const SINGLE_MAX_TOKENS: u32 = 150;

/// Build the structured prompt for one group of texts.
///
/// Texts are numbered from 1 within the group, one `N|text` per line.
/// Embedded newlines are flattened to spaces so numbering stays one line per
/// text.
pub fn build_batch_prompt<S: AsRef<str>>(texts: &[S]) -> String {
    let numbered: Vec<String> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}|{}", i + 1, flatten_lines(text.as_ref())))
        .collect();

    format!(
        "{}\n\n输入：\n{}\n\n{}",
        BATCH_INSTRUCTIONS,
        numbered.join("\n"),
        BATCH_OUTPUT_HINT
    )
}

/// Build the prompt for correcting a single text
pub fn build_single_prompt(text: &str) -> String {
    format!(
        "请修正以下文本中的错误，直接返回修正后的完整文本。如果没有错误，请返回原文。\n\n原文：{}\n\n修正后：",
        text
    )
}

/// `base + per_text * n`, capped
pub fn batch_token_budget(texts: usize, base: u32, per_text: u32, cap: u32) -> u32 {
    let n = u32::try_from(texts).unwrap_or(u32::MAX);
    base.saturating_add(per_text.saturating_mul(n)).min(cap)
}

/// Join the non-empty lines of a text with single spaces, as sent in a batch
pub fn flatten_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_prompt_numbering() {
        let prompt = build_batch_prompt(&["我觉的好", "没问题"]);
        assert!(prompt.starts_with(BATCH_INSTRUCTIONS));
        assert!(prompt.contains("输入：\n1|我觉的好\n2|没问题\n"));
        assert!(prompt.ends_with(BATCH_OUTPUT_HINT));
    }

    #[test]
    fn test_batch_prompt_flattens_multiline_text() {
        let prompt = build_batch_prompt(&["第一行\n第二行".to_string()]);
        assert!(prompt.contains("1|第一行 第二行\n"));
    }

    #[test]
    fn test_single_prompt() {
        let prompt = build_single_prompt("在说一遍");
        assert!(prompt.contains("原文：在说一遍"));
        assert!(prompt.ends_with("修正后："));
    }

    #[test]
    fn test_token_budget_is_capped() {
        assert_eq!(batch_token_budget(1, 200, 40, 1200), 240);
        assert_eq!(batch_token_budget(10, 200, 40, 1200), 600);
        assert_eq!(batch_token_budget(25, 200, 40, 1200), 1200);
        assert_eq!(batch_token_budget(100, 200, 40, 1200), 1200);
    }
}
