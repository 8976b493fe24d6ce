//! Tree-of-Thoughts deliberate reasoning.
//!
//! Components, leaves first:
//! - [`SessionStore`]: per-session node arenas addressed by id
//! - [`ThoughtGenerator`]: proposes candidate child thoughts
//! - [`NodeEvaluator`]: scores a node into a value and flags
//! - [`TreeExplorer`]: the frontier-driven search loop
//! - [`select_best_path`]: greedy root-to-leaf walk
//! - [`synthesize`]: renders the chosen path into a response
//!
//! [`TreeOfThoughts`] wires them together behind one facade.

mod engine;
mod evaluator;
mod explorer;
mod generator;
mod selector;
mod store;
mod synthesizer;
mod types;


pub use engine::*;
pub use evaluator::*;
pub use explorer::*;
pub use generator::*;
pub use selector::*;
pub use store::*;
pub use synthesizer::*;
pub use types::*;

/// Lowercase alphanumeric words of `text`, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Shorten `s` to at most `max_chars` characters, marking the cut with "...".
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (object or array)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
pub(crate) fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}
