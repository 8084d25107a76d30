// milhouse-config/src/load.rs
// ============================================================================
// Module: Configuration Loading
// Description: Reads, migrates, parses, and validates `config.yaml`.
// Purpose: The single entry point every other crate uses to obtain a
//          `MilhouseConfig`; never constructs one by hand from a raw path.
// Dependencies: serde_yaml, milhouse-core
// ============================================================================

//! ## Overview
//! Loading is fail-closed: a missing file, a file that fails to parse, an
//! unknown schema version, or a semantically invalid document all produce a
//! [`ConfigError`] rather than a partially-initialized config.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::migrate::migrate_to_current;
use crate::schema::MilhouseConfig;

/// Default filename looked up under the repo root when no explicit path is
/// given.
pub const DEFAULT_CONFIG_FILENAME: &str = "config.yaml";

// ============================================================================
// SECTION: Load
// ============================================================================

/// Loads and validates the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read,
/// [`ConfigError::Parse`] if it is not valid YAML,
/// [`ConfigError::UnknownVersion`] if its `version` key has no migration
/// path to the current schema, and [`ConfigError::Invalid`] if it fails
/// semantic validation.
pub fn load_config(path: &Path) -> Result<MilhouseConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io(source.to_string()))?;
    load_config_str(&raw)
}

/// Loads and validates a config document already read into memory. Exposed
/// separately from [`load_config`] so callers can test against fixture
/// strings without touching the filesystem.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_str(raw: &str) -> Result<MilhouseConfig, ConfigError> {
    let document: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse(source.to_string()))?;
    let current = migrate_to_current(document)?;
    let config: MilhouseConfig = serde_yaml::from_value(current).map_err(|source| ConfigError::Parse(source.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Resolves the default config path under `root`, which is `<root>/config.yaml`.
#[must_use]
pub fn default_config_path(root: &Path) -> std::path::PathBuf {
    root.join(DEFAULT_CONFIG_FILENAME)
}

// ============================================================================
// SECTION: Validate
// ============================================================================

/// Validates `config` for internal consistency beyond what serde's
/// `#[serde(default)]` fields already guarantee.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] on the first violation found.
fn validate(config: &MilhouseConfig) -> Result<(), ConfigError> {
    if config.execution.parallel == 0 {
        return Err(ConfigError::Invalid("execution.parallel must be at least 1".to_owned()));
    }
    let known_modes = ["autonomous", "supervised"];
    if !known_modes.contains(&config.execution.mode.as_str()) {
        return Err(ConfigError::Invalid(format!("execution.mode must be one of {known_modes:?}, got {:?}", config.execution.mode)));
    }
    if config.runs.max_runs_to_keep == 0 {
        return Err(ConfigError::Invalid("runs.maxRunsToKeep must be at least 1".to_owned()));
    }
    if let Some(active) = &config.probe_presets.active_preset {
        if !config.probe_presets.presets.contains_key(active) {
            return Err(ConfigError::Invalid(format!("probePresets.activePreset {active:?} has no matching entry in presets")));
        }
    }
    if let Some(active) = &config.gate_profiles.active_profile {
        if !config.gate_profiles.profiles.contains_key(active) {
            return Err(ConfigError::Invalid(format!("gateProfiles.activeProfile {active:?} has no matching entry in profiles")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]

    use super::load_config_str;
    use crate::error::ConfigError;

    #[test]
    fn missing_version_is_invalid() {
        let error = load_config_str("project:\n  name: demo\n").expect_err("version is required");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_parallel_is_rejected() {
        let error = load_config_str("version: \"1.0\"\nexecution:\n  parallel: 0\n").expect_err("parallel must be nonzero");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn dangling_active_preset_is_rejected() {
        let error = load_config_str("version: \"1.0\"\nprobePresets:\n  activePreset: ci\n").expect_err("ci preset is not defined");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn well_formed_document_loads() {
        let config = load_config_str("version: \"1.0\"\nproject:\n  name: demo\n").expect("valid document loads");
        assert_eq!(config.project.name.as_deref(), Some("demo"));
        assert_eq!(config.execution.parallel, 4);
    }
}
