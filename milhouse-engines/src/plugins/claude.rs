// milhouse-engines/src/plugins/claude.rs
// ============================================================================
// Module: Claude Engine Plugin
// Description: Adapter for the Claude Code CLI.
// Purpose: Translate EngineRequest into the claude binary's argv/env, and
//          select the stream-JSON output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `claude --print --output-format stream-json` emits one JSON object per
//! line; the prompt is delivered on stdin.

use milhouse_stream::StepParser;
use milhouse_stream::StreamJsonParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::ApprovalMode;
use crate::request::EngineRequest;

/// Adapter for the `claude` CLI.
pub struct ClaudePlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl ClaudePlugin {
    /// Creates a plugin with the default `claude` command and argv prefix.
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::new("claude")
            .with_default_args(vec!["--print".to_owned(), "--output-format".to_owned(), "stream-json".to_owned(), "--verbose".to_owned()]);
        Self { config }
    }
}

impl Default for ClaudePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for ClaudePlugin {
    fn name(&self) -> &str {
        "claude"
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

        if let Some(session_id) = &request.session_id {
            if request.continue_session {
                args.push("--resume".to_owned());
                args.push(session_id.clone());
            } else {
                args.push("--session-id".to_owned());
                args.push(session_id.clone());
            }
        }

        if request.approval_mode == ApprovalMode::Autonomous {
            args.push("--dangerously-skip-permissions".to_owned());
        }

        for dir in &request.auxiliary_dirs {
            args.push("--add-dir".to_owned());
            args.push(dir.display().to_string());
        }

        if let Some(schema) = &request.json_schema {
            args.push("--output-schema".to_owned());
            args.push(schema.clone());
        }

        Ok(args)
    }

    fn parse_output(&self) -> Box<dyn StepParser> {
        Box::new(StreamJsonParser::new())
    }

    fn env(&self) -> Vec<(String, String)> {
        let mut env = base_env();
        if let Some(pair) = crate::env::host_api_key_env("ANTHROPIC_API_KEY") {
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
    use super::ClaudePlugin;
    use crate::EnginePlugin;
    use crate::request::PromptDelivery;

    #[test]
    fn prompt_delivery_is_stdin() {
        let plugin = ClaudePlugin::new();
        assert_eq!(plugin.prompt_delivery(), PromptDelivery::Stdin);
    }

    #[test]
    fn default_args_request_stream_json() {
        let plugin = ClaudePlugin::new();
        assert!(plugin.config().default_args.contains(&"stream-json".to_owned()));
    }
}
