// milhouse-engines/src/config.rs
// ============================================================================
// Module: Milhouse Engine Config
// Description: Per-engine static configuration: binary, default argv,
//              timeout, concurrency, and rate-limit envelope.
// Purpose: Give every plugin a uniform configuration shape.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `EngineConfig` is the static (non-request-specific) configuration each
//! plugin carries: which binary to invoke, the default argv prefix, the
//! default timeout, a max-concurrency hint, and a rate-limit envelope. The
//! middleware stack in `milhouse-runtime` reads these as defaults that a
//! per-invocation request may override.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Rate Limit Envelope
// ============================================================================

/// Static rate-limit parameters advertised by a plugin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitEnvelope {
    /// Minimum spacing between successive invocations, in milliseconds.
    pub min_spacing_ms: u64,
    /// Bucket capacity (full refills per window).
    pub bucket_capacity: u32,
}

impl Default for RateLimitEnvelope {
    fn default() -> Self {
        Self {
            min_spacing_ms: 100,
            bucket_capacity: 1,
        }
    }
}

// ============================================================================
// SECTION: Engine Config
// ============================================================================

/// Static, per-engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name of the CLI binary to probe for and spawn.
    pub command: String,
    /// Default argv prefix applied before request-specific flags.
    pub default_args: Vec<String>,
    /// Default timeout for one invocation.
    pub default_timeout: Duration,
    /// Default maximum concurrent invocations of this engine.
    pub max_concurrency: usize,
    /// Rate-limit envelope advertised by this engine.
    pub rate_limit: RateLimitEnvelope,
}

impl EngineConfig {
    /// Creates a config with the per-engine default timeout of
    /// approximately 66 minutes, per the concurrency and resource model.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            default_args: Vec::new(),
            default_timeout: Duration::from_secs(66 * 60),
            max_concurrency: 2,
            rate_limit: RateLimitEnvelope::default(),
        }
    }

    /// Builder: sets the default argv prefix.
    #[must_use]
    pub fn with_default_args(mut self, args: Vec<String>) -> Self {
        self.default_args = args;
        self
    }
}
