// milhouse-config/src/lib.rs
// ============================================================================
// Module: Milhouse Configuration
// Description: Public API surface for loading, validating, and caching
//              `config.yaml`.
// Purpose: Give every other crate one typed, fail-closed config entry point.
// Dependencies: milhouse-core, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! `milhouse-config` owns the `config.yaml` schema ([`schema`]), the
//! version-migration chain ([`migrate`]), disk loading and semantic
//! validation ([`load`]), and a process-wide load cache ([`cache`]).

// ============================================================================
// SECTION: Modules
// ============================================================================

mod cache;
mod error;
mod load;
mod migrate;
mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::ConfigCache;
pub use error::ConfigError;
pub use load::default_config_path;
pub use load::load_config;
pub use load::load_config_str;
pub use load::DEFAULT_CONFIG_FILENAME;
pub use schema::AllowedCommandsConfig;
pub use schema::BoundariesConfig;
pub use schema::CommandsConfig;
pub use schema::ExecutionConfig;
pub use schema::GateProfilesConfig;
pub use schema::GatesConfig;
pub use schema::MilhouseConfig;
pub use schema::PipelineConfig;
pub use schema::ProbeConfig;
pub use schema::ProbePresetsConfig;
pub use schema::ProjectConfig;
pub use schema::RetryPolicyConfig;
pub use schema::RunsConfig;
pub use schema::CURRENT_CONFIG_VERSION;
