// milhouse-engines/src/plugins/opencode.rs
// ============================================================================
// Module: OpenCode Engine Plugin
// Description: Adapter for the OpenCode CLI.
// Purpose: Translate EngineRequest into the opencode binary's argv/env, and
//          select the text output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `opencode run` emits line-oriented text output; the prompt is delivered
//! on stdin.

use milhouse_stream::StepParser;
use milhouse_stream::TextParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::EngineRequest;

/// Adapter for the `opencode` CLI.
pub struct OpenCodePlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl OpenCodePlugin {
    /// Creates a plugin with the default `opencode` command and argv prefix.
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::new("opencode").with_default_args(vec!["run".to_owned()]);
        Self { config }
    }
}

impl Default for OpenCodePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for OpenCodePlugin {
    fn name(&self) -> &str {
        "opencode"
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
                args.push("--session".to_owned());
                args.push(session_id.clone());
                args.push("--continue".to_owned());
            }
        }

        Ok(args)
    }

    fn parse_output(&self) -> Box<dyn StepParser> {
        Box::new(TextParser::new())
    }

    fn env(&self) -> Vec<(String, String)> {
        base_env()
    }

    fn uses_stdin_for_prompt(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::OpenCodePlugin;
    use crate::EnginePlugin;

    #[test]
    fn name_is_opencode() {
        assert_eq!(OpenCodePlugin::new().name(), "opencode");
    }
}
