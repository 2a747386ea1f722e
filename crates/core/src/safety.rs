//! Command safety deny-list.
//!
//! Before any command or script action touches a target, its executable
//! text is checked against a configurable set of regex patterns covering
//! destructive filesystem and service-disruption commands. A match fails
//! the action with `SafetyViolation` without ever opening a connection,
//! and is never retried.

use regex::{Regex, RegexBuilder};

use crate::error::CoreError;

/// Default deny-list patterns, matched case-insensitively.
///
/// These cover the classic destructive shapes; deployments extend or
/// replace them via configuration.
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[
    // Recursive deletion of root-ish paths.
    r"rm\s+(-[a-z]*\s+)*-?[a-z]*[rf][a-z]*\s+/(\s|$)",
    r"rm\s+-rf\s+/\S*",
    // Filesystem/device destruction.
    r"mkfs(\.\w+)?\s",
    r"dd\s+[^|;]*of=/dev/",
    r">\s*/dev/sd[a-z]",
    // Host-wide disruption.
    r"\b(shutdown|reboot|halt|poweroff)\b",
    r"init\s+0",
    // Fork bomb.
    r":\(\)\s*\{\s*:\|:&\s*\}\s*;",
    // Database wipes.
    r"(?i)drop\s+(database|table)\s",
    r"(?i)truncate\s+table\s",
];

/// Compiled safety rule set.
///
/// Shared read-only across all workers; compile once at startup.
#[derive(Debug, Clone)]
pub struct SafetyRules {
    patterns: Vec<Regex>,
}

impl SafetyRules {
    /// Compile a rule set from raw pattern strings.
    ///
    /// Fails fast on the first invalid pattern so a typo in configuration
    /// is caught at startup, not at dispatch time.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    CoreError::Validation(format!("Invalid safety pattern '{pattern}': {e}"))
                })?;
            compiled.push(regex);
        }
        Ok(Self { patterns: compiled })
    }

    /// The built-in rule set.
    pub fn default_rules() -> Self {
        // The defaults are compile-tested below; unwrap is safe here but
        // we still go through from_patterns to keep one code path.
        Self::from_patterns(DEFAULT_DENY_PATTERNS.iter().copied())
            .unwrap_or(Self { patterns: Vec::new() })
    }

    /// Check executable text against the deny-list.
    ///
    /// Returns the first matching pattern, or `None` when the text is
    /// allowed.
    pub fn is_dangerous(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.is_match(text))
            .map(|p| p.as_str())
    }

    /// Number of compiled patterns (for startup logging).
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the rule set is empty (every command allowed).
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_all_compile() {
        let rules = SafetyRules::from_patterns(DEFAULT_DENY_PATTERNS.iter().copied())
            .expect("default patterns must compile");
        assert_eq!(rules.len(), DEFAULT_DENY_PATTERNS.len());
    }

    #[test]
    fn destructive_commands_are_flagged() {
        let rules = SafetyRules::default_rules();
        assert!(rules.is_dangerous("rm -rf /").is_some());
        assert!(rules.is_dangerous("sudo rm -rf /var").is_some());
        assert!(rules.is_dangerous("mkfs.ext4 /dev/sda1").is_some());
        assert!(rules.is_dangerous("dd if=/dev/zero of=/dev/sda").is_some());
        assert!(rules.is_dangerous("shutdown -h now").is_some());
        assert!(rules.is_dangerous("DROP TABLE users;").is_some());
    }

    #[test]
    fn ordinary_commands_pass() {
        let rules = SafetyRules::default_rules();
        assert!(rules.is_dangerous("echo hi").is_none());
        assert!(rules.is_dangerous("uptime").is_none());
        assert!(rules.is_dangerous("systemctl status nginx").is_none());
        assert!(rules.is_dangerous("df -h").is_none());
        assert!(rules.is_dangerous("rm -f /tmp/app.pid").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rules = SafetyRules::default_rules();
        assert!(rules.is_dangerous("SHUTDOWN now").is_some());
    }

    #[test]
    fn invalid_pattern_is_rejected_at_compile() {
        let result = SafetyRules::from_patterns(["[unclosed"]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_rule_set_allows_everything() {
        let rules = SafetyRules::from_patterns(Vec::<&str>::new()).unwrap();
        assert!(rules.is_empty());
        assert!(rules.is_dangerous("rm -rf /").is_none());
    }
}
