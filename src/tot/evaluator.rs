//! Node scoring.
//!
//! The default [`HeuristicEvaluator`] averages four independent sub-scores,
//! each in [0, 1]:
//!
//! - **relevance**: token overlap with the problem statement
//! - **clarity**: sentence length, structure markers, hedging
//! - **feasibility**: depth and concrete action language
//! - **creativity**: novelty against every other node in the session
//!
//! Scores are pure functions of the node and the session arena, so the same
//! tree always evaluates to the same values.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

use super::tokenize;
use super::types::{EvaluationMethod, Evaluation, Session, ThoughtNode};
use crate::error::EvaluatorError;

/// Nodes at or above this value may be expanded further.
pub const EXPAND_THRESHOLD: f64 = 0.6;

const RELEVANCE_FLOOR: f64 = 0.3;
const SIMILARITY_LIMIT: f64 = 0.7;

const STRUCTURE_MARKERS: &[&str] = &["specifically", "step", "approach"];
const HEDGES: &[&str] = &["maybe", "somehow"];
const ACTION_VERBS: &[&str] = &["implement", "use", "apply", "create"];
const DIFFICULTY_TERMS: &[&str] = &["impossible", "difficult", "cannot", "unrealistic"];
const CREATIVE_MARKERS: &[&str] = &["innovative", "alternative", "unconventional"];

/// Scores nodes.
#[async_trait]
pub trait NodeEvaluator: Send + Sync {
    /// Score `node` in the context of `session`. Must not mutate anything;
    /// the caller writes the result back into the arena.
    async fn evaluate(
        &self,
        node: &ThoughtNode,
        session: &Session,
    ) -> Result<Evaluation, EvaluatorError>;

    /// Short identifier reported in response metadata.
    fn name(&self) -> &str;
}

/// The four sub-scores behind one node value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub relevance: f64,
    pub clarity: f64,
    pub feasibility: f64,
    pub creativity: f64,
}

impl ScoreBreakdown {
    /// Unweighted mean of the sub-scores.
    pub fn value(&self) -> f64 {
        ((self.relevance + self.clarity + self.feasibility + self.creativity) / 4.0).clamp(0.0, 1.0)
    }
}

/// Deterministic four-factor evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Compute every sub-score for a node.
    pub fn breakdown(&self, node: &ThoughtNode, session: &Session) -> ScoreBreakdown {
        let others: Vec<&str> = session
            .nodes_in_order()
            .into_iter()
            .filter(|other| other.id != node.id)
            .map(|other| other.content.as_str())
            .collect();

        ScoreBreakdown {
            relevance: relevance(&node.content, &session.problem),
            clarity: clarity(&node.content),
            feasibility: feasibility(&node.content, node.depth),
            creativity: creativity(&node.content, &others),
        }
    }
}

#[async_trait]
impl NodeEvaluator for HeuristicEvaluator {
    async fn evaluate(
        &self,
        node: &ThoughtNode,
        session: &Session,
    ) -> Result<Evaluation, EvaluatorError> {
        if node.content.trim().is_empty() {
            return Err(EvaluatorError::Failed {
                node_id: node.id.clone(),
                message: "node has no content".to_string(),
            });
        }

        if session.config.evaluation_method != EvaluationMethod::Confidence {
            debug!(
                method = %session.config.evaluation_method,
                "Evaluation method has no dedicated scorer, using confidence"
            );
        }

        let scores = self.breakdown(node, session);
        let value = scores.value();
        let reasoning = format!(
            "relevance {:.2}, clarity {:.2}, feasibility {:.2}, creativity {:.2}",
            scores.relevance, scores.clarity, scores.feasibility, scores.creativity
        );

        Ok(Evaluation {
            node_id: node.id.clone(),
            value,
            reasoning,
            is_promising: value >= session.config.pruning_threshold,
            should_expand: value >= EXPAND_THRESHOLD && node.depth < session.config.max_depth,
        })
    }

    fn name(&self) -> &str {
        "heuristic-evaluator"
    }
}

/// Words longer than two characters, as a set.
fn meaningful_words(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().filter(|w| w.len() > 2).collect()
}

fn word_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

fn count_markers(words: &HashSet<String>, markers: &[&str]) -> usize {
    markers.iter().filter(|m| words.contains(**m)).count()
}

/// Overlap with the problem, normalized by the smaller word set, plus a floor.
pub fn relevance(content: &str, problem: &str) -> f64 {
    let content_words = meaningful_words(content);
    let problem_words = meaningful_words(problem);
    let smaller = content_words.len().min(problem_words.len());
    if smaller == 0 {
        return RELEVANCE_FLOOR;
    }
    let shared = content_words.intersection(&problem_words).count();
    (shared as f64 / smaller as f64 + RELEVANCE_FLOOR).min(1.0)
}

/// Rewards 5-20 words per sentence and structure markers, penalizes hedging.
pub fn clarity(content: &str) -> f64 {
    let mut score: f64 = 0.5;

    let sentences: Vec<&str> = content
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !sentences.is_empty() {
        let words: usize = sentences.iter().map(|s| tokenize(s).len()).sum();
        let average = words as f64 / sentences.len() as f64;
        if (5.0..=20.0).contains(&average) {
            score += 0.2;
        }
    }

    let words = word_set(content);
    score += 0.1 * count_markers(&words, STRUCTURE_MARKERS) as f64;
    score -= 0.15 * count_markers(&words, HEDGES) as f64;

    if content.trim().chars().count() < 10 {
        score -= 0.3;
    }

    score.clamp(0.1, 1.0)
}

/// Grows with depth (capped) and concrete verbs, shrinks with difficulty language.
pub fn feasibility(content: &str, depth: usize) -> f64 {
    let words = word_set(content);
    let depth_bonus = (0.1 * depth as f64).min(0.2);

    let score = 0.5 + depth_bonus + 0.05 * count_markers(&words, ACTION_VERBS) as f64
        - 0.15 * count_markers(&words, DIFFICULTY_TERMS) as f64;

    score.clamp(0.0, 1.0)
}

/// Share of unseen words, halved when near-duplicate of another node.
pub fn creativity(content: &str, others: &[&str]) -> f64 {
    let words = word_set(content);
    if words.is_empty() {
        return 0.0;
    }

    let other_sets: Vec<HashSet<String>> = others.iter().map(|o| word_set(o)).collect();
    let seen: HashSet<&String> = other_sets.iter().flatten().collect();
    let unseen = words.iter().filter(|w| !seen.contains(w)).count();
    let novelty = unseen as f64 / words.len() as f64;

    let mut score = 0.3 + 0.5 * novelty;
    if other_sets
        .iter()
        .any(|other| jaccard(&words, other) > SIMILARITY_LIMIT)
    {
        score *= 0.5;
    }
    score += 0.1 * count_markers(&words, CREATIVE_MARKERS) as f64;

    score.clamp(0.0, 1.0)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
