//! Control-token stripping for provider replies
//!
//! Some models prepend hidden reasoning blocks such as
//! `<|channel|>analysis<|message|>...<|end|>Final answer`. Only the text after
//! the last `<|end|>` is kept, then any remaining control tokens are removed.

use regex::Regex;
use std::sync::LazyLock;

const END_TOKEN: &str = "<|end|>";

static CHANNEL_WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|channel\|>[^<]*<\|message\|>").expect("valid channel wrapper regex")
});

static CONTROL_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|[^|]+?\|>").expect("valid control token regex"));

/// Strip provider control tokens
///
/// When nothing follows the last `<|end|>`, the text before it is used
/// instead. A reply made only of control tokens becomes empty.
pub fn sanitize_content(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let tail = match content.rfind(END_TOKEN) {
        Some(index) => &content[index + END_TOKEN.len()..],
        None => content,
    };

    let cleaned = strip_tokens(tail);
    if cleaned.is_empty() && tail.len() != content.len() {
        strip_tokens(content)
    } else {
        cleaned
    }
}

fn strip_tokens(text: &str) -> String {
    let without_wrappers = CHANNEL_WRAPPER_RE.replace_all(text, "");
    CONTROL_TOKEN_RE
        .replace_all(&without_wrappers, "")
        .trim()
        .to_string()
}

/// Replies that narrate their own reasoning instead of answering
pub fn looks_like_internal_reasoning(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    normalized.starts_with("we need to ")
        || normalized.starts_with("let's ")
        || normalized.starts_with("i need to ")
        || normalized.starts_with("the user ")
        || normalized.contains("chain-of-thought")
}

/// Replies too short or too generic to show a user
pub fn is_low_signal_output(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return true;
    }
    if matches!(normalized.as_str(), "assistant" | "final" | "assistantfinal") {
        return true;
    }
    normalized.chars().count() < 24
}
