// milhouse-config/src/error.rs
// ============================================================================
// Module: Configuration Errors
// Description: Failure modes for loading, parsing, and migrating config.yaml.
// Purpose: Give every caller a single error type instead of propagating
//          serde_yaml/io errors directly.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Failure modes for [`crate::load_config`] and the migration chain.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading or writing the config file.
    #[error("config io error: {0}")]
    Io(String),
    /// The file's contents were not valid YAML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The config's `version` key names a schema version with no migration
    /// path to [`crate::CURRENT_CONFIG_VERSION`](crate::schema::CURRENT_CONFIG_VERSION).
    #[error("unknown config version: {0}")]
    UnknownVersion(String),
    /// The config parsed and migrated cleanly but failed a semantic check.
    #[error("invalid config: {0}")]
    Invalid(String),
}
