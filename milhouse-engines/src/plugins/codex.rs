// milhouse-engines/src/plugins/codex.rs
// ============================================================================
// Module: Codex Engine Plugin
// Description: Adapter for the OpenAI Codex CLI.
// Purpose: Translate EngineRequest into the codex binary's argv/env, and
//          select the stream-JSON output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `codex exec --json` streams one JSON object per line; the prompt is
//! delivered on stdin.

use milhouse_stream::StepParser;
use milhouse_stream::StreamJsonParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::ApprovalMode;
use crate::request::EngineRequest;

/// Adapter for the `codex` CLI.
pub struct CodexPlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl CodexPlugin {
    /// Creates a plugin with the default `codex` command and argv prefix.
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::new("codex").with_default_args(vec!["exec".to_owned(), "--json".to_owned()]);
        Self { config }
    }
}

impl Default for CodexPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for CodexPlugin {
    fn name(&self) -> &str {
        "codex"
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
                args.push("resume".to_owned());
                args.push(session_id.clone());
            }
        }

        match request.approval_mode {
            ApprovalMode::Autonomous => {
                args.push("--sandbox".to_owned());
                args.push("danger-full-access".to_owned());
                args.push("--ask-for-approval".to_owned());
                args.push("never".to_owned());
            }
            ApprovalMode::Supervised => {
                args.push("--ask-for-approval".to_owned());
                args.push("on-request".to_owned());
            }
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
        if let Some(pair) = crate::env::host_api_key_env("OPENAI_API_KEY") {
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
    use super::CodexPlugin;
    use crate::EnginePlugin;
    use crate::request::ApprovalMode;
    use crate::request::EngineRequest;
    use std::path::PathBuf;

    #[test]
    fn autonomous_mode_disables_approval_prompts() {
        let plugin = CodexPlugin::new();
        let mut request = EngineRequest::new("prompt", PathBuf::from("."), milhouse_core::AgentRole::Ex);
        request.approval_mode = ApprovalMode::Autonomous;
        let args = plugin.build_args(&request).expect("build_args must succeed");
        assert!(args.contains(&"never".to_owned()));
    }
}
