// milhouse-engines/src/plugins/aider.rs
// ============================================================================
// Module: Aider Engine Plugin
// Description: Adapter for the Aider CLI.
// Purpose: Translate EngineRequest into the aider binary's argv/env, and
//          select the text output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `aider --message <prompt> --yes-always` takes the prompt as a positional
//! argv entry rather than on stdin, and emits line-oriented text output.

use milhouse_stream::StepParser;
use milhouse_stream::TextParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::ApprovalMode;
use crate::request::EngineRequest;

/// Adapter for the `aider` CLI.
pub struct AiderPlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl AiderPlugin {
    /// Creates a plugin with the default `aider` command and argv prefix.
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::new("aider").with_default_args(vec!["--no-pretty".to_owned()]);
        Self { config }
    }
}

impl Default for AiderPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for AiderPlugin {
    fn name(&self) -> &str {
        "aider"
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
            args.push("--yes-always".to_owned());
        }

        for dir in &request.auxiliary_dirs {
            args.push(dir.display().to_string());
        }

        args.push("--message".to_owned());
        args.push(request.prompt.clone());

        Ok(args)
    }

    fn parse_output(&self) -> Box<dyn StepParser> {
        Box::new(TextParser::new())
    }

    fn env(&self) -> Vec<(String, String)> {
        let mut env = base_env();
        if let Some(pair) = crate::env::host_api_key_env("ANTHROPIC_API_KEY") {
            env.push(pair);
        } else if let Some(pair) = crate::env::host_api_key_env("OPENAI_API_KEY") {
            env.push(pair);
        }
        env
    }

    fn uses_stdin_for_prompt(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::AiderPlugin;
    use crate::EnginePlugin;
    use crate::request::PromptDelivery;

    #[test]
    fn prompt_delivery_is_argv() {
        assert_eq!(AiderPlugin::new().prompt_delivery(), PromptDelivery::Argv);
    }

    #[test]
    fn build_args_appends_message_flag() {
        let plugin = AiderPlugin::new();
        let request =
            crate::EngineRequest::new("do the thing", std::path::PathBuf::from("."), milhouse_core::AgentRole::Ex);
        let args = plugin.build_args(&request).expect("build_args must succeed");
        assert_eq!(args.last(), Some(&"do the thing".to_owned()));
    }
}
