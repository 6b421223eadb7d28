//! Helpers for turning a task description and generated text into a file.

use std::sync::LazyLock;

use regex::Regex;

/// Used when the task text names no file.
pub const DEFAULT_OUTPUT: &str = "generated.py";

static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9_\-./]+\.(?:py|rs|ts|js|go|sh|md))\b").expect("valid regex")
});

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)\s*```\z").expect("valid regex")
});

/// First source-file name mentioned in the task, or [`DEFAULT_OUTPUT`].
pub fn output_name(task: &str) -> String {
    FILE_NAME
        .captures(task)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_start_matches("./").to_string())
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string())
}

/// Remove one Markdown code fence wrapping the whole text.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match FENCED.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_file() {
        assert_eq!(
            output_name("Write ./tools/parse_json.py that reads names.json"),
            "tools/parse_json.py"
        );
        assert_eq!(output_name("Create main.rs please"), "main.rs");
    }

    #[test]
    fn defaults_when_no_file_named() {
        assert_eq!(output_name("compute the column mean"), DEFAULT_OUTPUT);
    }

    #[test]
    fn strips_fence_with_language() {
        let text = "```python\nprint('hi')\n```\n";
        assert_eq!(strip_code_fence(text), "print('hi')");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_fence("```\na = 1\nb = 2\n```"), "a = 1\nb = 2");
    }

    #[test]
    fn leaves_unfenced_text() {
        assert_eq!(strip_code_fence("  x = 1\n"), "x = 1");
        assert_eq!(strip_code_fence("see ```x``` inline"), "see ```x``` inline");
    }
}
