// milhouse-engines/src/plugins/mod.rs
// ============================================================================
// Module: Built-In Engine Plugins
// Description: One submodule per supported AI CLI vendor.
// Purpose: Concrete EnginePlugin implementations registered by default.
// Dependencies: crate::{config, plugin, request, error}, milhouse-stream,
//               which
// ============================================================================

//! ## Overview
//! Each submodule wraps one vendor's AI CLI behind [`crate::EnginePlugin`].
//! The eight plugins split roughly evenly between stream-JSON output
//! (Claude, Codex, Cursor, Gemini) and line-oriented text output (Droid,
//! OpenCode, Qwen, Aider), and between stdin and argv prompt delivery.

pub mod aider;
pub mod claude;
pub mod codex;
pub mod cursor;
pub mod droid;
pub mod gemini;
pub mod opencode;
pub mod qwen;
