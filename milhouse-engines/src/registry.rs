// milhouse-engines/src/registry.rs
// ============================================================================
// Module: Engine Registry
// Description: Registry for built-in and externally registered engine
//              plugins.
// Purpose: Route a named engine to its plugin implementation.
// Dependencies: milhouse-core
// ============================================================================

//! ## Overview
//! The engine registry resolves a vendor name (`"claude"`, `"codex"`, ...) to
//! its [`crate::EnginePlugin`] implementation. Eight built-ins are registered
//! via [`EngineRegistry::register_builtin_engines`]; callers may register
//! additional plugins for local or experimental vendors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::EnginePlugin;
use crate::EngineError;
use crate::plugins::aider::AiderPlugin;
use crate::plugins::claude::ClaudePlugin;
use crate::plugins::codex::CodexPlugin;
use crate::plugins::cursor::CursorPlugin;
use crate::plugins::droid::DroidPlugin;
use crate::plugins::gemini::GeminiPlugin;
use crate::plugins::opencode::OpenCodePlugin;
use crate::plugins::qwen::QwenPlugin;

// ============================================================================
// SECTION: Engine Registry
// ============================================================================

/// Registry mapping engine names to their plugin implementations.
pub struct EngineRegistry {
    /// Plugin implementations keyed by engine name.
    plugins: BTreeMap<String, Box<dyn EnginePlugin>>,
}

impl EngineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { plugins: BTreeMap::new() }
    }

    /// Creates a registry with all eight built-in engine plugins registered.
    #[must_use]
    pub fn with_builtin_engines() -> Self {
        let mut registry = Self::new();
        registry.register_builtin_engines();
        registry
    }

    /// Registers `plugin` under its own [`EnginePlugin::name`].
    pub fn register(&mut self, plugin: impl EnginePlugin + 'static) {
        self.plugins.insert(plugin.name().to_owned(), Box::new(plugin));
    }

    /// Registers the eight built-in vendor plugins.
    pub fn register_builtin_engines(&mut self) {
        self.register(ClaudePlugin::new());
        self.register(CodexPlugin::new());
        self.register(CursorPlugin::new());
        self.register(DroidPlugin::new());
        self.register(GeminiPlugin::new());
        self.register(OpenCodePlugin::new());
        self.register(QwenPlugin::new());
        self.register(AiderPlugin::new());
    }

    /// Looks up a plugin by name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] when no plugin is registered
    /// under `name`.
    pub fn get(&self, name: &str) -> Result<&dyn EnginePlugin, EngineError> {
        self.plugins
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| EngineError::Unavailable(name.to_owned()))
    }

    /// Returns the names of every registered plugin, in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Returns the names of every registered plugin whose binary is present
    /// in `PATH`, in sorted order.
    #[must_use]
    pub fn available_names(&self) -> Vec<&str> {
        self.plugins
            .iter()
            .filter(|(_, plugin)| plugin.is_available())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::EngineRegistry;

    #[test]
    fn builtin_registry_has_eight_engines() {
        let registry = EngineRegistry::with_builtin_engines();
        assert_eq!(registry.names().len(), 8);
    }

    #[test]
    fn unknown_engine_is_unavailable() {
        let registry = EngineRegistry::with_builtin_engines();
        assert!(registry.get("not-a-real-engine").is_err());
    }
}
