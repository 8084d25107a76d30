// milhouse-engines/src/env.rs
// ============================================================================
// Module: Milhouse Engine Environment
// Description: Host API-key discovery, isolated from plugin env() logic.
// Purpose: Keep side-effecting environment reads behind one seam so plugin
//          `env()` implementations stay pure and testable.
// Dependencies: Standard library
// ============================================================================

//! ## Overview
//! Plugins never call `std::env::var` directly; they ask this module for the
//! one API-key variable they care about, which itself reads the real host
//! environment. Tests inject a fake environment by calling the `_from_map`
//! variant instead.

use std::collections::HashMap;

/// Vendor API-key environment variable names recognized for pass-through.
pub const KNOWN_API_KEY_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "FACTORY_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "CURSOR_API_KEY",
    "QWEN_API_KEY",
];

/// Returns `(name, value)` for `name` if it is both a known API-key variable
/// and set in the host environment.
#[must_use]
pub fn host_api_key_env(name: &str) -> Option<(String, String)> {
    if !KNOWN_API_KEY_VARS.contains(&name) {
        return None;
    }
    std::env::var(name).ok().map(|value| (name.to_owned(), value))
}

/// Same lookup as [`host_api_key_env`], but reading from an injected map
/// instead of the real process environment, for deterministic tests.
#[must_use]
pub fn host_api_key_env_from_map(name: &str, env: &HashMap<String, String>) -> Option<(String, String)> {
    if !KNOWN_API_KEY_VARS.contains(&name) {
        return None;
    }
    env.get(name).map(|value| (name.to_owned(), value.clone()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::host_api_key_env_from_map;

    #[test]
    fn unknown_variable_is_never_forwarded() {
        let mut env = HashMap::new();
        env.insert("SOME_RANDOM_SECRET".to_owned(), "leak".to_owned());
        assert!(host_api_key_env_from_map("SOME_RANDOM_SECRET", &env).is_none());
    }

    #[test]
    fn known_variable_forwards_when_present() {
        let mut env = HashMap::new();
        env.insert("ANTHROPIC_API_KEY".to_owned(), "sk-test".to_owned());
        assert_eq!(
            host_api_key_env_from_map("ANTHROPIC_API_KEY", &env),
            Some(("ANTHROPIC_API_KEY".to_owned(), "sk-test".to_owned()))
        );
    }
}
