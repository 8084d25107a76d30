// milhouse-stream/src/extract.rs
// ============================================================================
// Module: Milhouse Final Response Extraction
// Description: Locates the final visible response among a step sequence.
// Purpose: Implement the right-to-left result scan shared by every engine
//          plugin.
// Dependencies: crate::step
// ============================================================================

//! ## Overview
//! Vendors interleave internal bookkeeping (tool results, system echoes,
//! user-message echoes) with the actual response text. The final response is
//! the last non-empty `Result` step that is not flagged as one of those
//! internal kinds; a step explicitly flagged `is_final_response` is
//! preferred over any later delta-style concatenation artifact.

use crate::step::Step;

/// Scans `steps` right-to-left for the final visible response text.
///
/// Returns `None` when no result-bearing step has any non-empty, non-internal
/// text, in which case callers should treat the output as pure unstructured
/// text (see [`crate::parse_complete`] and the text-mode parser).
#[must_use]
pub fn extract_final_response(steps: &[Step]) -> Option<String> {
    let mut fallback: Option<String> = None;

    for step in steps.iter().rev() {
        let Step::Result { text, meta } = step else {
            continue;
        };
        if meta.is_skippable() {
            continue;
        }
        if text.trim().is_empty() {
            continue;
        }
        if meta.is_final_response {
            return Some(text.clone());
        }
        if fallback.is_none() {
            fallback = Some(text.clone());
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use super::extract_final_response;
    use crate::step::Step;
    use crate::step::StepMeta;

    #[test]
    fn skips_internal_records_and_returns_last_visible_text() {
        let steps = vec![
            Step::Result {
                text: "final answer".to_owned(),
                meta: StepMeta::default(),
            },
            Step::Result {
                text: "tool echo".to_owned(),
                meta: StepMeta {
                    is_tool_result: true,
                    ..StepMeta::default()
                },
            },
        ];
        assert_eq!(extract_final_response(&steps), Some("final answer".to_owned()));
    }

    #[test]
    fn prefers_explicit_final_response_flag_over_later_fallback() {
        let steps = vec![
            Step::Result {
                text: "whole message".to_owned(),
                meta: StepMeta {
                    is_final_response: true,
                    ..StepMeta::default()
                },
            },
            Step::Result {
                text: "delta concatenation artifact".to_owned(),
                meta: StepMeta::default(),
            },
        ];
        assert_eq!(extract_final_response(&steps), Some("whole message".to_owned()));
    }

    #[test]
    fn returns_none_when_nothing_visible() {
        let steps = vec![Step::Thinking("hmm".to_owned())];
        assert_eq!(extract_final_response(&steps), None);
    }
}
