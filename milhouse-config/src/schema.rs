// milhouse-config/src/schema.rs
// ============================================================================
// Module: Configuration Schema
// Description: Typed mapping of `config.yaml`'s top-level keys.
// Purpose: Give every pipeline component a single, fail-closed config shape
//          instead of ad hoc YAML lookups.
// Dependencies: milhouse-core, serde
// ============================================================================

//! ## Overview
//! Every field except `version` is optional at the top level and defaults to
//! the values documented here when absent. Per-entry maps (`probes`,
//! `probePresets.presets`, `gateProfiles.profiles`) use `BTreeMap` for
//! deterministic iteration order in logs and diffs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use milhouse_core::RunPhase;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Root
// ============================================================================

/// The full contents of `<root>/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilhouseConfig {
    /// Schema version, e.g. `"1.0"`. The only required key.
    pub version: String,
    /// Project identity.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Shell commands the pipeline invokes for its own gates.
    #[serde(default)]
    pub commands: CommandsConfig,
    /// Free-text rules surfaced to agent prompts.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Path globs agents must never modify.
    #[serde(default)]
    pub boundaries: BoundariesConfig,
    /// Command allowlists for probes and task execution.
    #[serde(default)]
    pub allowed_commands: AllowedCommandsConfig,
    /// Named probe definitions.
    #[serde(default)]
    pub probes: BTreeMap<String, ProbeConfig>,
    /// Execution-phase behavior.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Verification gate toggles.
    #[serde(default)]
    pub gates: GatesConfig,
    /// Pipeline-wide timing and retry policy.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Run storage and retention policy.
    #[serde(default)]
    pub runs: RunsConfig,
    /// Named probe bundles.
    #[serde(default)]
    pub probe_presets: ProbePresetsConfig,
    /// Named gate bundles.
    #[serde(default)]
    pub gate_profiles: GateProfilesConfig,
}

impl Default for MilhouseConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION.to_owned(),
            project: ProjectConfig::default(),
            commands: CommandsConfig::default(),
            rules: Vec::new(),
            boundaries: BoundariesConfig::default(),
            allowed_commands: AllowedCommandsConfig::default(),
            probes: BTreeMap::new(),
            execution: ExecutionConfig::default(),
            gates: GatesConfig::default(),
            pipeline: PipelineConfig::default(),
            runs: RunsConfig::default(),
            probe_presets: ProbePresetsConfig::default(),
            gate_profiles: GateProfilesConfig::default(),
        }
    }
}

/// Schema version this crate reads and writes natively.
pub const CURRENT_CONFIG_VERSION: &str = "1.0";

// ============================================================================
// SECTION: Project
// ============================================================================

/// Project identity surfaced to agent prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Human-readable project name.
    #[serde(default)]
    pub name: Option<String>,
    /// Primary implementation language.
    #[serde(default)]
    pub language: Option<String>,
    /// Primary framework, if any.
    #[serde(default)]
    pub framework: Option<String>,
    /// One-line project description.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Shell commands the gate engine invokes on the host project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Runs the project's test suite.
    #[serde(default)]
    pub test: Option<String>,
    /// Runs the project's linter.
    #[serde(default)]
    pub lint: Option<String>,
    /// Runs the project's build.
    #[serde(default)]
    pub build: Option<String>,
    /// Runs the project's compiler/typechecker only.
    #[serde(default)]
    pub compile: Option<String>,
}

// ============================================================================
// SECTION: Boundaries
// ============================================================================

/// Path boundaries that bound what agents may touch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundariesConfig {
    /// Glob patterns no task may modify, regardless of phase.
    #[serde(default)]
    pub never_touch: Vec<String>,
}

// ============================================================================
// SECTION: Allowed Commands
// ============================================================================

/// Command allowlists consulted by the safety policy and probe runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowedCommandsConfig {
    /// Commands probes may run.
    #[serde(default)]
    pub probes: Vec<String>,
    /// Commands task execution may run.
    #[serde(default)]
    pub execution: Vec<String>,
}

// ============================================================================
// SECTION: Probes
// ============================================================================

/// One named probe's behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Whether the probe runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the probe is restricted to read-only commands.
    #[serde(default = "default_true")]
    pub read_only: bool,
    /// Maximum time the probe may run before being killed.
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { enabled: true, read_only: true, timeout_ms: default_probe_timeout_ms() }
    }
}

const fn default_probe_timeout_ms() -> u64 {
    30_000
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Execution-phase mode and side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// `"autonomous"` or `"supervised"`.
    #[serde(default = "default_execution_mode")]
    pub mode: String,
    /// Maximum issues worked concurrently.
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    /// Whether per-task commits happen automatically.
    #[serde(default)]
    pub auto_commit: bool,
    /// Whether a pull request is opened once a run completes.
    #[serde(default)]
    pub create_pr: bool,
    /// Whether an opened pull request is marked draft.
    #[serde(default = "default_true")]
    pub draft_pr: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: default_execution_mode(),
            parallel: default_parallel(),
            auto_commit: false,
            create_pr: false,
            draft_pr: true,
        }
    }
}

fn default_execution_mode() -> String {
    "supervised".to_owned()
}

const fn default_parallel() -> usize {
    4
}

// ============================================================================
// SECTION: Gates
// ============================================================================

/// Toggles for the five verification gates, applied in the fixed order
/// placeholder, diff-hygiene, DoD, evidence, env-consistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesConfig {
    /// Requires evidence entries for every completed task.
    #[serde(default = "default_true")]
    pub evidence_required: bool,
    /// Flags suspiciously large deletions as a possible silent refactor.
    #[serde(default = "default_true")]
    pub diff_hygiene: bool,
    /// Scans the diff for placeholder/TODO markers left behind.
    #[serde(default = "default_true")]
    pub placeholder_check: bool,
    /// Checks the working tree's environment matches what the task declared.
    #[serde(default = "default_true")]
    pub env_consistency: bool,
    /// Runs the command-safety policy against the task's definition of done.
    #[serde(default = "default_true")]
    pub dod_verification: bool,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            evidence_required: true,
            diff_hygiene: true,
            placeholder_check: true,
            env_consistency: true,
            dod_verification: true,
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Pipeline-wide phase sequencing, timeouts, and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Phases run by a bare `--scan` invocation with no explicit flags.
    #[serde(default = "default_phases")]
    pub default_phases: Vec<RunPhase>,
    /// Per-phase timeout in milliseconds, keyed by phase name.
    #[serde(default)]
    pub phase_timeouts: BTreeMap<String, u64>,
    /// Default retry policy applied to engine invocations.
    #[serde(default)]
    pub retry_policy: RetryPolicyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { default_phases: default_phases(), phase_timeouts: BTreeMap::new(), retry_policy: RetryPolicyConfig::default() }
    }
}

fn default_phases() -> Vec<RunPhase> {
    vec![RunPhase::Scan, RunPhase::Validate, RunPhase::Plan, RunPhase::Consolidate, RunPhase::Exec, RunPhase::Verify]
}

/// Retry policy fields mirrored from [`milhouse_runtime`'s retry
/// middleware](../../milhouse-runtime/src/middlewares/retry.rs) so a run can
/// override them from config without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Maximum retry attempts per engine invocation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds before the first retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self { max_retries: default_max_retries(), base_delay_ms: default_base_delay_ms() }
    }
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

// ============================================================================
// SECTION: Runs
// ============================================================================

/// Run storage location and retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsConfig {
    /// Directory, relative to the repo root, holding `<run-id>/` subtrees.
    #[serde(default = "default_runs_dir")]
    pub runs_dir: String,
    /// Maximum number of completed runs kept before eviction.
    #[serde(default = "default_max_runs_to_keep")]
    pub max_runs_to_keep: u32,
    /// When eviction actually happens.
    #[serde(default = "default_cleanup_policy")]
    pub cleanup_policy: milhouse_core::CleanupPolicy,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            runs_dir: default_runs_dir(),
            max_runs_to_keep: default_max_runs_to_keep(),
            cleanup_policy: milhouse_core::CleanupPolicy::Manual,
        }
    }
}

fn default_runs_dir() -> String {
    "runs".to_owned()
}

const fn default_max_runs_to_keep() -> u32 {
    20
}

const fn default_cleanup_policy() -> milhouse_core::CleanupPolicy {
    milhouse_core::CleanupPolicy::Manual
}

// ============================================================================
// SECTION: Probe Presets
// ============================================================================

/// Named, swappable bundles of probe overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbePresetsConfig {
    /// Name of the preset currently in effect, if any.
    #[serde(default)]
    pub active_preset: Option<String>,
    /// Preset name to per-probe override map.
    #[serde(default)]
    pub presets: BTreeMap<String, BTreeMap<String, ProbeConfig>>,
}

// ============================================================================
// SECTION: Gate Profiles
// ============================================================================

/// Named, swappable bundles of gate toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateProfilesConfig {
    /// Name of the profile currently in effect, if any.
    #[serde(default)]
    pub active_profile: Option<String>,
    /// Profile name to gate-toggle override map.
    #[serde(default)]
    pub profiles: BTreeMap<String, GatesConfig>,
}

// ============================================================================
// SECTION: Shared Defaults
// ============================================================================

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::MilhouseConfig;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let config = MilhouseConfig::default();
        let yaml = serde_yaml::to_string(&config).expect("serialize default config");
        let parsed: MilhouseConfig = serde_yaml::from_str(&yaml).expect("parse serialized config");
        assert_eq!(parsed.version, config.version);
        assert_eq!(parsed.execution.parallel, config.execution.parallel);
    }

    #[test]
    fn minimal_config_fills_in_defaults() {
        let parsed: MilhouseConfig = serde_yaml::from_str("version: \"1.0\"\n").expect("parse minimal config");
        assert!(parsed.gates.evidence_required);
        assert_eq!(parsed.execution.parallel, 4);
        assert_eq!(parsed.runs.runs_dir, "runs");
    }
}
