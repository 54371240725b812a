//! GitHub naming helpers

/// Normalize a repository reference to `github.com/<owner>/<name>`
///
/// Accepts bare `owner/name`, `github.com/owner/name` and full https URLs.
pub fn normalize_repo_url(input: &str) -> String {
    let mut cleaned = input.trim();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest;
        }
    }
    if let Some(rest) = cleaned.strip_prefix("www.") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_prefix("github.com/") {
        cleaned = rest;
    }
    let cleaned = cleaned.trim_end_matches('/').trim();
    format!("github.com/{}", cleaned)
}

/// `owner/name` part of a repository reference
pub fn repo_path(input: &str) -> String {
    let normalized = normalize_repo_url(input);
    normalized
        .strip_prefix("github.com/")
        .unwrap_or(&normalized)
        .to_string()
}

/// Case-insensitive key used for per-repository memory and canary lists
pub fn repo_key(input: &str) -> String {
    repo_path(input).to_lowercase()
}

/// Bot and system accounts never receive payouts
pub fn is_system_contributor(username: &str) -> bool {
    let normalized = username.to_lowercase();
    normalized.contains("[bot]") || normalized.ends_with("-bot")
}

/// Whether free text names a repository rather than a user
pub fn looks_like_repo(input: &str) -> bool {
    input.contains('/') || input.contains("github.com")
}

/// NEAR account ids end in `.near` or `.testnet`
pub fn is_near_account(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.ends_with(".near") || lower.ends_with(".testnet")
}
