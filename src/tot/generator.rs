//! Thought generation.
//!
//! A [`ThoughtGenerator`] proposes candidate next thoughts for a node. The
//! explorer treats every generator as a request/response boundary: one call
//! per expansion, bounded by a timeout, with failures mapped to "no children".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{extract_json_from_completion, truncate};
use crate::error::GeneratorError;
use crate::langbase::{LangbaseClient, Message, PipeRequest};
use crate::prompts::THOUGHT_GENERATION_PROMPT;

/// Produces candidate child thoughts.
#[async_trait]
pub trait ThoughtGenerator: Send + Sync {
    /// Propose at most `max_thoughts` distinct next thoughts for a node at
    /// `depth` whose content is `parent_content`.
    async fn generate(
        &self,
        parent_content: &str,
        problem: &str,
        depth: usize,
        max_thoughts: usize,
    ) -> Result<Vec<String>, GeneratorError>;

    /// Short identifier reported in response metadata.
    fn name(&self) -> &str;
}

/// Which depth-0 framing a thought descends from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Analytical,
    Practical,
    Theoretical,
    Unknown,
}

impl Framing {
    /// Classify by the label before the first `:` so words in the embedded
    /// problem statement cannot steer the match.
    fn detect(content: &str) -> Self {
        let label = content.split(':').next().unwrap_or(content);
        let lower = label.to_lowercase();
        if lower.contains("analytical") || lower.contains("analysis") {
            Framing::Analytical
        } else if lower.contains("practical") || lower.contains("implementation") {
            Framing::Practical
        } else if lower.contains("theoretical") || lower.contains("foundation") {
            Framing::Theoretical
        } else {
            Framing::Unknown
        }
    }
}

/// Deterministic template generator.
///
/// Depth 0 decomposes the problem into three framings, depth 1 proposes
/// approaches suited to the parent's framing, deeper levels refine.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicThoughtGenerator;

impl HeuristicThoughtGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Full candidate list for a level, before the `max_thoughts` cut.
    pub fn candidates(&self, parent_content: &str, problem: &str, depth: usize) -> Vec<String> {
        match depth {
            0 => decomposition(problem),
            1 => approaches(Framing::detect(parent_content), problem),
            _ => refinements(parent_content),
        }
    }
}

fn decomposition(problem: &str) -> Vec<String> {
    vec![
        format!(
            "Analytical breakdown: decompose {} into its core components and examine each one specifically.",
            problem
        ),
        format!(
            "Practical implementation: identify the concrete steps needed to implement a working solution for {}.",
            problem
        ),
        format!(
            "Theoretical foundation: examine the underlying principles and first-principles reasoning behind {}.",
            problem
        ),
    ]
}

fn approaches(framing: Framing, problem: &str) -> Vec<String> {
    match framing {
        Framing::Analytical => vec![
            format!(
                "Step 1: list the key variables of {} and specifically rank them by impact.",
                problem
            ),
            format!(
                "Map the dependencies between the components of {} to find the critical path.",
                problem
            ),
            format!(
                "Define measurable success criteria for each component of {} and use them to prioritize work.",
                problem
            ),
        ],
        Framing::Practical => vec![
            format!(
                "Create a phased rollout plan for {} with clear owners and milestones.",
                problem
            ),
            format!(
                "Use existing tools and resources to build a minimal first version of {} quickly.",
                problem
            ),
            format!(
                "Apply lessons from similar past efforts to avoid common pitfalls in {}.",
                problem
            ),
        ],
        Framing::Theoretical => vec![
            format!(
                "Ground {} in an established framework and derive the approach from its principles.",
                problem
            ),
            format!(
                "Identify the assumptions behind {} and test which ones actually hold.",
                problem
            ),
            format!(
                "Explore an unconventional alternative model for {} that challenges the default framing.",
                problem
            ),
        ],
        Framing::Unknown => vec![
            format!(
                "Break {} into smaller sub-problems and solve each step in order.",
                problem
            ),
            format!(
                "Look for an alternative approach to {} that trades speed for robustness.",
                problem
            ),
            format!(
                "Evaluate which resources {} requires and apply them where they matter most.",
                problem
            ),
        ],
    }
}

fn refinements(parent_content: &str) -> Vec<String> {
    let focus = truncate(parent_content, 80);
    vec![
        format!(
            "Elaborate with a concrete example: show specifically how \"{}\" plays out in practice.",
            focus
        ),
        format!(
            "Analyze the risks and challenges of \"{}\" and how to mitigate each one.",
            focus
        ),
        format!(
            "Optimize \"{}\": remove redundant steps and apply the most effective approach.",
            focus
        ),
    ]
}

#[async_trait]
impl ThoughtGenerator for HeuristicThoughtGenerator {
    async fn generate(
        &self,
        parent_content: &str,
        problem: &str,
        depth: usize,
        max_thoughts: usize,
    ) -> Result<Vec<String>, GeneratorError> {
        let mut thoughts = self.candidates(parent_content, problem, depth);
        thoughts.truncate(max_thoughts);
        Ok(thoughts)
    }

    fn name(&self) -> &str {
        "heuristic-generator"
    }
}

/// JSON shape the thought pipe is asked to return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtsResponse {
    pub thoughts: Vec<String>,
}

impl ThoughtsResponse {
    /// Parse a completion, falling back to one thought per non-empty line.
    pub fn from_completion(completion: &str) -> Result<Self, GeneratorError> {
        if let Ok(json) = extract_json_from_completion(completion) {
            match serde_json::from_str::<ThoughtsResponse>(json) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    // Some models answer with a bare array.
                    if let Ok(thoughts) = serde_json::from_str::<Vec<String>>(json) {
                        return Ok(Self { thoughts });
                    }
                    warn!(
                        error = %e,
                        completion_preview = %completion.chars().take(200).collect::<String>(),
                        "Failed to parse thought response, using line fallback"
                    );
                }
            }
        }

        let thoughts: Vec<String> = completion
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*'))
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty() && !line.starts_with("```"))
            .collect();

        if thoughts.is_empty() {
            return Err(GeneratorError::InvalidResponse {
                message: "Completion contained no thoughts".to_string(),
            });
        }
        Ok(Self { thoughts })
    }
}

/// Generator backed by a Langbase pipe completion.
#[derive(Clone)]
pub struct LangbaseThoughtGenerator {
    langbase: LangbaseClient,
    pipe_name: String,
}

impl LangbaseThoughtGenerator {
    pub fn new(langbase: LangbaseClient, pipe_name: impl Into<String>) -> Self {
        Self {
            langbase,
            pipe_name: pipe_name.into(),
        }
    }

    fn build_messages(
        &self,
        parent_content: &str,
        problem: &str,
        depth: usize,
        max_thoughts: usize,
    ) -> Vec<Message> {
        let stage = match depth {
            0 => "Decompose the problem into distinct framings.",
            1 => "Propose distinct approaches that follow from the current thought.",
            _ => "Refine the current thought: elaborate, examine risks, or optimize.",
        };
        vec![
            Message::system(THOUGHT_GENERATION_PROMPT),
            Message::user(format!(
                "Problem: {}\nCurrent thought (depth {}): {}\n{}\nReturn at most {} thoughts.",
                problem, depth, parent_content, stage, max_thoughts
            )),
        ]
    }
}

#[async_trait]
impl ThoughtGenerator for LangbaseThoughtGenerator {
    async fn generate(
        &self,
        parent_content: &str,
        problem: &str,
        depth: usize,
        max_thoughts: usize,
    ) -> Result<Vec<String>, GeneratorError> {
        let messages = self.build_messages(parent_content, problem, depth, max_thoughts);
        let request = PipeRequest::new(&self.pipe_name, messages)
            .with_variable("depth", depth.to_string())
            .with_variable("max_thoughts", max_thoughts.to_string());

        let response = self.langbase.call_pipe(request).await?;
        let parsed = ThoughtsResponse::from_completion(&response.completion)?;

        debug!(
            pipe = %self.pipe_name,
            depth = depth,
            returned = parsed.thoughts.len(),
            "Thought pipe responded"
        );

        let mut thoughts = parsed.thoughts;
        thoughts.truncate(max_thoughts);
        Ok(thoughts)
    }

    fn name(&self) -> &str {
        "langbase-generator"
    }
}
