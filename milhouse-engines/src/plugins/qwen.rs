// milhouse-engines/src/plugins/qwen.rs
// ============================================================================
// Module: Qwen Engine Plugin
// Description: Adapter for the Qwen Code CLI.
// Purpose: Translate EngineRequest into the qwen binary's argv/env, and
//          select the text output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `qwen` (no subcommand) emits line-oriented text output; the prompt is
//! delivered on stdin.

use milhouse_stream::StepParser;
use milhouse_stream::TextParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::ApprovalMode;
use crate::request::EngineRequest;

/// Adapter for the `qwen` CLI.
pub struct QwenPlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl QwenPlugin {
    /// Creates a plugin with the default `qwen` command.
    #[must_use]
    pub fn new() -> Self {
        Self { config: EngineConfig::new("qwen") }
    }
}

impl Default for QwenPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for QwenPlugin {
    fn name(&self) -> &str {
        "qwen"
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
            args.push("--approval-mode".to_owned());
            args.push("yolo".to_owned());
        }

        Ok(args)
    }

    fn parse_output(&self) -> Box<dyn StepParser> {
        Box::new(TextParser::new())
    }

    fn env(&self) -> Vec<(String, String)> {
        let mut env = base_env();
        if let Some(pair) = crate::env::host_api_key_env("QWEN_API_KEY") {
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
    use super::QwenPlugin;
    use crate::EnginePlugin;

    #[test]
    fn name_is_qwen() {
        assert_eq!(QwenPlugin::new().name(), "qwen");
    }
}
