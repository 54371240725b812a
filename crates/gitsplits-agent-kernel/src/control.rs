//! Control commands recognized before intent resolution

use regex::Regex;
use std::sync::LazyLock;

use gitsplits_core::{ExecutionMode, ExperienceMode};

static MODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:set\s+mode|mode)\s+(advisor|draft|execute)$").expect("valid mode regex")
});

static EXPERIENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:set\s+experience|experience)\s+(guided|hands[_ -]?off)$")
        .expect("valid experience regex")
});

/// Any id is taken; a non-matching one is a plan mismatch
static APPROVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^approve\s+(\S+)").expect("valid approve regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    SetMode(ExecutionMode),
    SetExperience(ExperienceMode),
    Cancel,
    /// `replay` with no id carries an empty string
    Replay(String),
    /// Bare `approve` targets whatever plan is pending
    Approve(Option<String>),
}

impl ControlCommand {
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        if let Some(caps) = MODE_RE.captures(&lower) {
            return ExecutionMode::parse(&caps[1]).map(Self::SetMode);
        }
        if let Some(caps) = EXPERIENCE_RE.captures(&lower) {
            return ExperienceMode::parse(&caps[1]).map(Self::SetExperience);
        }
        if lower == "cancel" {
            return Some(Self::Cancel);
        }
        if lower == "replay" || lower.starts_with("replay ") {
            let id = trimmed.split_whitespace().nth(1).unwrap_or_default();
            return Some(Self::Replay(id.to_string()));
        }
        if let Some(caps) = APPROVE_RE.captures(&lower) {
            return Some(Self::Approve(Some(caps[1].to_string())));
        }
        if lower == "approve" {
            return Some(Self::Approve(None));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert_eq!(
            ControlCommand::parse("Set Mode Draft"),
            Some(ControlCommand::SetMode(ExecutionMode::Draft))
        );
        assert_eq!(
            ControlCommand::parse("experience hands-off"),
            Some(ControlCommand::SetExperience(ExperienceMode::HandsOff))
        );
        assert_eq!(ControlCommand::parse("mode turbo"), None);
    }

    #[test]
    fn test_replay_keeps_id_case() {
        assert_eq!(
            ControlCommand::parse("replay AbC123"),
            Some(ControlCommand::Replay("AbC123".to_string()))
        );
        assert_eq!(
            ControlCommand::parse("replay"),
            Some(ControlCommand::Replay(String::new()))
        );
    }

    #[test]
    fn test_approve_forms() {
        assert_eq!(
            ControlCommand::parse("approve plan-0a1b2c3d4e"),
            Some(ControlCommand::Approve(Some("plan-0a1b2c3d4e".to_string())))
        );
        assert_eq!(ControlCommand::parse(" approve "), Some(ControlCommand::Approve(None)));
        assert_eq!(
            ControlCommand::parse("approve 12345"),
            Some(ControlCommand::Approve(Some("12345".to_string())))
        );
        assert_eq!(ControlCommand::parse("analyze org/repo"), None);
    }
}
