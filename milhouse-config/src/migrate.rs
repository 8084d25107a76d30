// milhouse-config/src/migrate.rs
// ============================================================================
// Module: Configuration Migration Chain
// Description: Upgrades a parsed config document from an older schema
//              version to the version this crate reads natively.
// Purpose: Let `config.yaml` evolve across releases without breaking runs
//          whose config predates a schema change.
// Dependencies: serde_yaml
// ============================================================================

//! ## Overview
//! Migration operates on the untyped [`serde_yaml::Value`] tree rather than
//! the strongly-typed [`crate::MilhouseConfig`], since a migration step may
//! need to rename or restructure a key that the current struct no longer has
//! a field for. Each step bumps the document's `version` key; the chain
//! applies steps in sequence until the document reaches
//! [`crate::schema::CURRENT_CONFIG_VERSION`] or no step claims to start from
//! the document's current version, at which point loading fails with
//! [`ConfigError::UnknownVersion`].

use serde_yaml::Value;

use crate::error::ConfigError;
use crate::schema::CURRENT_CONFIG_VERSION;

/// One migration step: a source version, the version it produces, and the
/// transform itself.
struct MigrationStep {
    /// Schema version this step accepts as input.
    from: &'static str,
    /// Schema version this step's output is tagged with.
    to: &'static str,
    /// The transform, applied to the raw YAML document.
    apply: fn(Value) -> Value,
}

/// Registered migration steps, oldest first. Empty today because `"1.0"` is
/// the only schema version milhouse has ever shipped; a future schema change
/// adds a step here rather than breaking old `config.yaml` files.
const MIGRATIONS: &[MigrationStep] = &[];

/// Reads the document's `version` key, failing closed if it is missing or
/// not a string.
pub(crate) fn read_version(document: &Value) -> Result<String, ConfigError> {
    document
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ConfigError::Invalid("config.yaml is missing a 'version' key".to_owned()))
}

/// Applies migration steps until `document` is tagged with
/// [`CURRENT_CONFIG_VERSION`].
///
/// # Errors
///
/// Returns [`ConfigError::UnknownVersion`] if the document's version matches
/// no migration step and is not already current.
pub(crate) fn migrate_to_current(mut document: Value) -> Result<Value, ConfigError> {
    loop {
        let version = read_version(&document)?;
        if version == CURRENT_CONFIG_VERSION {
            return Ok(document);
        }

        let Some(step) = MIGRATIONS.iter().find(|step| step.from == version) else {
            return Err(ConfigError::UnknownVersion(version));
        };

        document = (step.apply)(document);
        if let Value::Mapping(mapping) = &mut document {
            mapping.insert(Value::String("version".to_owned()), Value::String(step.to.to_owned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_yaml::Value;

    use super::migrate_to_current;
    use crate::error::ConfigError;

    #[test]
    fn current_version_passes_through_unchanged() {
        let document: Value = serde_yaml::from_str("version: \"1.0\"\n").expect("parse fixture");
        let migrated = migrate_to_current(document).expect("current version migrates trivially");
        assert_eq!(migrated.get("version").and_then(Value::as_str), Some("1.0"));
    }

    #[test]
    fn unknown_version_is_a_distinguished_error() {
        let document: Value = serde_yaml::from_str("version: \"0.1\"\n").expect("parse fixture");
        let error = migrate_to_current(document).expect_err("0.1 has no migration path");
        assert!(matches!(error, ConfigError::UnknownVersion(version) if version == "0.1"));
    }
}
