//! Recovers the structured valuation from a raw model response.
//!
//! The model is asked to call `emitir_tasacion`, but providers do not
//! guarantee it: the payload may arrive as a tool call, inside a fenced
//! code block, with smart quotes, or not at all. Extraction is an ordered
//! chain of attempts where every failure falls through to the next step
//! and the final answer is `None`, never an error.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value;

use crate::openai::RawModelResponse;
use crate::tasacion::prompt::TOOL_NAME;

lazy_static! {
    // Opening fences with an optional language tag, and bare closing fences.
    static ref FENCE_RE: Regex = Regex::new(r"(?i)```[a-z]*").unwrap();
    static ref LINE_BREAK_RE: Regex = Regex::new(r"[\r\n]+").unwrap();
    static ref MULTI_WS_RE: Regex = Regex::new(r"\s{2,}").unwrap();
}

/// Extract a valuation from the response, or `None` when no parseable JSON
/// region exists. Tool-call arguments take strict precedence over free text.
pub fn extract(raw: &RawModelResponse) -> Option<Value> {
    if let Some(call) = &raw.tool_call {
        if call.name == TOOL_NAME {
            if let Ok(value) = serde_json::from_str(&call.arguments) {
                return Some(value);
            }
            debug!("tool call arguments are not strict JSON, trying recovery");
            if let Some(value) = recover_json(&call.arguments) {
                return Some(value);
            }
        } else {
            debug!("ignoring unexpected tool call {:?}", call.name);
        }
    }
    recover_json(&raw.content)
}

/// Shared text-recovery routine: strip code fences, take the region between
/// the last `{` and the last `}`, parse strictly, then retry once after a
/// lenient repair pass. Bounded on purpose: two parse attempts, no more.
fn recover_json(text: &str) -> Option<Value> {
    let cleaned = FENCE_RE.replace_all(text, "");
    let cleaned = cleaned.as_ref();

    // Scan from the end: the narrative comes before the JSON block, and may
    // itself contain stray braces. Only the final brace-delimited region
    // is considered.
    let open = cleaned.rfind('{')?;
    let close = cleaned.rfind('}')?;
    if close < open {
        return None;
    }

    let candidate = cleaned[open..=close].trim();
    if let Ok(value) = serde_json::from_str(candidate) {
        return Some(value);
    }

    serde_json::from_str(&repair(candidate)).ok()
}

fn repair(s: &str) -> String {
    let s = LINE_BREAK_RE.replace_all(s, " ");
    let s = MULTI_WS_RE.replace_all(&s, " ");
    s.replace('\u{201C}', "\"").replace('\u{201D}', "\"")
}
