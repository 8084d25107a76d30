// milhouse-exec/src/safety.rs
// ============================================================================
// Module: Command Safety Policy
// Description: Validates a shell command against the configured execution
//              allowlist and a fixed set of destructive-pattern heuristics.
// Purpose: Keep the DoD gate from running arbitrary shell commands an AI
//          engine proposed as a check.
// Dependencies: none (pure)
// ============================================================================

//! ## Overview
//! [`CommandSafetyPolicy::validate`] never executes anything; it only
//! classifies a command string. A command with at least one `issue` is
//! unsafe to run and the DoD gate skips it (unless the run was started with
//! the unsafe-DoD-checks override, which still runs the command but leaves
//! the policy's findings as a recorded warning rather than a hard stop).

// ============================================================================
// SECTION: Imports
// ============================================================================

// ============================================================================
// SECTION: Policy
// ============================================================================

/// A fixed set of substrings that mark a command as destructive regardless
/// of the configured allowlist.
const DENYLIST_PATTERNS: &[&str] =
    &["rm -rf", "rm -fr", ":(){ :|:& };:", "mkfs", "dd if=", "> /dev/sd", "chmod -R 777 /", "curl ", "wget ", "| sh", "| bash", "sudo ", "git push --force", "shutdown", "reboot"];

/// Validates check commands against the execution allowlist configured for
/// a run.
#[derive(Debug, Clone)]
pub struct CommandSafetyPolicy {
    /// Command prefixes (first whitespace-delimited token) permitted to run
    /// as a DoD check. Empty means every command is allowed through the
    /// allowlist stage (denylist heuristics still apply).
    allowed_prefixes: Vec<String>,
}

/// Outcome of validating one command string.
#[derive(Debug, Clone, Default)]
pub struct PolicyResult {
    /// Whether the command may run unmodified.
    pub valid: bool,
    /// Hard failures; a non-empty list means `valid` is `false`.
    pub issues: Vec<String>,
    /// Soft findings that do not block execution.
    pub warnings: Vec<String>,
}

impl CommandSafetyPolicy {
    /// Builds a policy from the run's configured execution allowlist.
    #[must_use]
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }

    /// Validates `command`, never executing it.
    #[must_use]
    pub fn validate(&self, command: &str) -> PolicyResult {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let trimmed = command.trim();

        if trimmed.is_empty() {
            issues.push("empty command".to_owned());
            return PolicyResult { valid: false, issues, warnings };
        }

        for pattern in DENYLIST_PATTERNS {
            if trimmed.contains(pattern) {
                issues.push(format!("matches denylisted pattern: {pattern}"));
            }
        }

        if trimmed.contains("&&") || trimmed.contains(';') || trimmed.contains('|') {
            warnings.push("command chains multiple shell stages".to_owned());
        }

        if !self.allowed_prefixes.is_empty() {
            let first_token = trimmed.split_whitespace().next().unwrap_or("");
            let allowed = self.allowed_prefixes.iter().any(|prefix| {
                let prefix_first = prefix.split_whitespace().next().unwrap_or(prefix.as_str());
                prefix_first == first_token
            });
            if !allowed {
                issues.push(format!("command `{first_token}` is not in the configured execution allowlist"));
            }
        }

        PolicyResult { valid: issues.is_empty(), issues, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::CommandSafetyPolicy;

    #[test]
    fn denylisted_pattern_is_rejected_even_when_allowlisted() {
        let policy = CommandSafetyPolicy::new(vec!["rm".to_owned()]);
        let result = policy.validate("rm -rf /");
        assert!(!result.valid);
    }

    #[test]
    fn allowlisted_prefix_passes() {
        let policy = CommandSafetyPolicy::new(vec!["cargo test".to_owned()]);
        let result = policy.validate("cargo test --all");
        assert!(result.valid);
    }

    #[test]
    fn command_outside_allowlist_is_rejected() {
        let policy = CommandSafetyPolicy::new(vec!["cargo test".to_owned()]);
        let result = policy.validate("npm test");
        assert!(!result.valid);
    }

    #[test]
    fn empty_allowlist_only_enforces_denylist() {
        let policy = CommandSafetyPolicy::new(Vec::new());
        let result = policy.validate("echo ok");
        assert!(result.valid);
    }
}
