// milhouse-stream/src/lib.rs
// ============================================================================
// Module: Milhouse Stream Parsers
// Description: Convert vendor engine stdout byte chunks into a normalized,
//              typed step sequence.
// Purpose: Give every engine plugin a common output shape regardless of
//          vendor wire format.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Engine vendors emit either newline-delimited JSON objects (stream-JSON
//! mode) or ad-hoc text with heading/marker conventions (text mode). Both
//! modes are normalized here into an ordered sequence of [`Step`] values, so
//! the middleware executor in `milhouse-runtime` never has to know which
//! vendor produced a given byte stream.
//!
//! Malformed input is never fatal: a line that cannot be parsed becomes a
//! plain [`Step::Result`] with default metadata rather than an error, per the
//! stream parser's documented failure semantics.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod extract;
mod json_parser;
mod step;
mod text_parser;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use extract::extract_final_response;
pub use json_parser::StreamJsonParser;
pub use step::Step;
pub use step::StepMeta;
pub use step::TokenUsage;
pub use text_parser::TextParser;

// ============================================================================
// SECTION: Parser Trait
// ============================================================================

/// Incremental parser turning raw bytes into [`Step`] values.
///
/// Implementations buffer partial lines across calls to `feed` and must emit
/// any final, unterminated line from `flush`.
pub trait StepParser {
    /// Feeds a chunk of bytes, returning any complete steps it produced.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Step>;

    /// Flushes any buffered partial content at end-of-stream.
    fn flush(&mut self) -> Vec<Step>;

    /// Returns the token usage accumulated so far, if this parser's wire
    /// format carries one. Text-mode vendors have no usage field to parse,
    /// so the default is zero rather than a required override.
    fn usage(&self) -> TokenUsage {
        TokenUsage::default()
    }
}

/// Parses a complete byte buffer in one call, for engines that do not
/// stream (or whose output is already fully collected).
#[must_use]
pub fn parse_complete(parser: &mut dyn StepParser, bytes: &[u8]) -> Vec<Step> {
    let mut steps = parser.feed(bytes);
    steps.extend(parser.flush());
    steps
}
