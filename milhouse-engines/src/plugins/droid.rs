// milhouse-engines/src/plugins/droid.rs
// ============================================================================
// Module: Droid Engine Plugin
// Description: Adapter for the Factory Droid CLI.
// Purpose: Translate EngineRequest into the droid binary's argv/env, and
//          select the text output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `droid exec` emits line-oriented text with heading and bracket-marker
//! conventions; the prompt is delivered on stdin.

use milhouse_stream::StepParser;
use milhouse_stream::TextParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::ApprovalMode;
use crate::request::EngineRequest;

/// Adapter for the `droid` CLI.
pub struct DroidPlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl DroidPlugin {
    /// Creates a plugin with the default `droid` command and argv prefix.
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::new("droid").with_default_args(vec!["exec".to_owned()]);
        Self { config }
    }
}

impl Default for DroidPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for DroidPlugin {
    fn name(&self) -> &str {
        "droid"
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        which::which(&self.config.command).is_ok()
    }

    fn build_args(&self, request: &EngineRequest) -> Result<Vec<String>, EngineError> {
        let mut args = self.config.default_args.clone();

        if let Some(model) = &request.model_override {
            args.push("--model".to_owned());
            args.push(model.clone());
        }

        if request.approval_mode == ApprovalMode::Autonomous {
            args.push("--auto".to_owned());
            args.push("high".to_owned());
        }

        Ok(args)
    }

    fn parse_output(&self) -> Box<dyn StepParser> {
        Box::new(TextParser::new())
    }

    fn env(&self) -> Vec<(String, String)> {
        let mut env = base_env();
        if let Some(pair) = crate::env::host_api_key_env("FACTORY_API_KEY") {
            env.push(pair);
        }
        env
    }

    fn uses_stdin_for_prompt(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::DroidPlugin;
    use crate::EnginePlugin;

    #[test]
    fn name_is_droid() {
        assert_eq!(DroidPlugin::new().name(), "droid");
    }
}
