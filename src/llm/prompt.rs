//! Prompt helpers shared by agents and memory.

/// Rough token estimate (about four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Cut `text` so its estimate fits in `max_tokens`, marking the cut.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let keep = max_tokens.saturating_mul(4);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// Keep the newest whole lines of `text` that fit in `max_tokens`. A leading
/// `...` line marks dropped lines.
pub fn keep_last_lines(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let budget = max_tokens.saturating_sub(estimate_tokens("...\n"));
    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0;
    for line in text.lines().rev() {
        let cost = estimate_tokens(line) + 1;
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(line);
    }
    kept.reverse();

    let mut out = String::from("...\n");
    for line in kept {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Context windows by model name fragment. The longest matching fragment wins.
const CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-3.5-turbo", 16_385),
    ("gpt-4", 8_192),
    ("gpt-4-turbo", 128_000),
    ("gpt-4o", 128_000),
    ("claude-3", 200_000),
    ("gemini-pro", 32_768),
    ("gemini-1.5", 1_000_000),
    ("llama3-8b-8192", 8_192),
    ("llama-3.1", 128_000),
    ("mistral", 32_000),
    ("qwen", 32_768),
];

const DEFAULT_CONTEXT_WINDOW: usize = 4_096;

/// Context window of `model` in tokens, 4096 for unknown models.
pub fn context_window(model: &str) -> usize {
    let model = model.to_lowercase();
    CONTEXT_WINDOWS
        .iter()
        .filter(|(fragment, _)| model.contains(fragment))
        .max_by_key(|(fragment, _)| fragment.len())
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// System prompt used when condensing memory.
pub fn summary_system_prompt() -> &'static str {
    "You condense the working memory of browser automation agents. \
Keep every filled value, clicked control, downloaded file and error. \
Answer with plain text only."
}

/// Ask for a condensed summary of older memory lines, folding in the
/// previous summary when there is one.
pub fn build_summary_prompt(previous: Option<&str>, lines: &[String]) -> String {
    let mut prompt = String::new();
    if let Some(previous) = previous {
        prompt.push_str("Previous summary:\n");
        prompt.push_str(previous);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Summarize the following interactions in a few sentences:\n");
    for line in lines {
        prompt.push_str("- ");
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("orçamento"), 3);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_to_tokens("short", 10), "short");
        let long = "x".repeat(100);
        let cut = truncate_to_tokens(&long, 5);
        assert_eq!(cut.len(), 23);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_keep_last_lines() {
        assert_eq!(keep_last_lines("a\nb\n", 10), "a\nb\n");

        let text = (0..20)
            .map(|i| format!("[filler] step {:02}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let cut = keep_last_lines(&text, 20);
        assert!(cut.starts_with("...\n"));
        assert!(cut.ends_with("[filler] step 19\n"));
        assert!(!cut.contains("step 00"));
        assert!(estimate_tokens(&cut) <= 20);
    }

    #[test]
    fn test_context_window_lookup() {
        assert_eq!(context_window("gpt-3.5-turbo"), 16_385);
        assert_eq!(context_window("gpt-4-turbo-preview"), 128_000);
        assert_eq!(context_window("gpt-4"), 8_192);
        assert_eq!(context_window("claude-3-haiku-20240307"), 200_000);
        assert_eq!(context_window("Gemini-1.5-Flash"), 1_000_000);
        assert_eq!(context_window("openrouter/auto"), 4_096);
    }

    #[test]
    fn test_summary_prompt_includes_previous() {
        let lines = vec!["[filler] filled #empresa".to_string()];
        let prompt = build_summary_prompt(Some("Opened the form."), &lines);
        assert!(prompt.starts_with("Previous summary:\nOpened the form."));
        assert!(prompt.contains("- [filler] filled #empresa"));

        let fresh = build_summary_prompt(None, &lines);
        assert!(!fresh.contains("Previous summary"));
    }
}
