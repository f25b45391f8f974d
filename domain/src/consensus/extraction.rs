//! Representative-response extraction
//!
//! Given the candidate responses of a terminal round (or the latest content
//! per member when falling back), selects or merges the council's answer
//! according to the configured strategy. Deterministic: candidates are
//! ordered by centrality with member id as the tiebreak, so identical input
//! always yields identical output.

use crate::config::FallbackStrategy;

/// One response competing to represent the council
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCandidate {
    pub member_id: String,
    pub content: String,
    /// Mean pairwise similarity to the other candidates
    pub centrality: f64,
}

impl ResponseCandidate {
    pub fn new(member_id: impl Into<String>, content: impl Into<String>, centrality: f64) -> Self {
        Self {
            member_id: member_id.into(),
            content: content.into(),
            centrality,
        }
    }
}

/// Select or merge the representative response
///
/// Returns None only when `candidates` is empty.
pub fn extract_representative(
    candidates: &[ResponseCandidate],
    strategy: FallbackStrategy,
) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    let mut ranked: Vec<&ResponseCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        b.centrality
            .partial_cmp(&a.centrality)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });

    let lead = ranked[0];
    if ranked.len() == 1 {
        return Some(lead.content.clone());
    }

    let merged = match strategy {
        FallbackStrategy::ConsensusExtraction => lead.content.clone(),
        FallbackStrategy::MetaSynthesis => {
            let mut doc = lead.content.clone();
            doc.push_str("\n\n---\nAdditional perspectives:\n");
            for candidate in &ranked[1..] {
                doc.push_str(&format!(
                    "\n[{}]\n{}\n",
                    candidate.member_id, candidate.content
                ));
            }
            doc
        }
        FallbackStrategy::WeightedFusion => {
            let mut doc = lead.content.clone();
            doc.push_str("\n\nSupplementary points, weighted by agreement:\n");
            for candidate in &ranked[1..] {
                doc.push_str(&format!(
                    "- [{} {:.2}] {}\n",
                    candidate.member_id,
                    candidate.centrality,
                    summarize(&candidate.content)
                ));
            }
            doc
        }
    };
    Some(merged)
}

/// First line of a response, truncated at a character boundary
fn summarize(content: &str) -> &str {
    let first_line = content.lines().next().unwrap_or("");
    match first_line.char_indices().nth(200) {
        Some((idx, _)) => &first_line[..idx],
        None => first_line,
    }
}
