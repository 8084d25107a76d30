// milhouse-engines/src/plugins/gemini.rs
// ============================================================================
// Module: Gemini Engine Plugin
// Description: Adapter for the Gemini CLI.
// Purpose: Translate EngineRequest into the gemini binary's argv/env, and
//          select the stream-JSON output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `gemini --output-format json` emits newline-delimited JSON events; the
//! prompt is delivered on stdin.

use milhouse_stream::StepParser;
use milhouse_stream::StreamJsonParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::ApprovalMode;
use crate::request::EngineRequest;

/// Adapter for the `gemini` CLI.
pub struct GeminiPlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl GeminiPlugin {
    /// Creates a plugin with the default `gemini` command and argv prefix.
    #[must_use]
    pub fn new() -> Self {
        let config =
            EngineConfig::new("gemini").with_default_args(vec!["--output-format".to_owned(), "json".to_owned()]);
        Self { config }
    }
}

impl Default for GeminiPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for GeminiPlugin {
    fn name(&self) -> &str {
        "gemini"
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
            args.push("--yolo".to_owned());
        }

        for dir in &request.auxiliary_dirs {
            args.push("--include-directories".to_owned());
            args.push(dir.display().to_string());
        }

        Ok(args)
    }

    fn parse_output(&self) -> Box<dyn StepParser> {
        Box::new(StreamJsonParser::new())
    }

    fn env(&self) -> Vec<(String, String)> {
        let mut env = base_env();
        if let Some(pair) = crate::env::host_api_key_env("GEMINI_API_KEY") {
            env.push(pair);
        } else if let Some(pair) = crate::env::host_api_key_env("GOOGLE_API_KEY") {
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
    use super::GeminiPlugin;
    use crate::EnginePlugin;

    #[test]
    fn name_is_gemini() {
        assert_eq!(GeminiPlugin::new().name(), "gemini");
    }
}
