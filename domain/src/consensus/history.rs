//! Similarity history - per-round agreement record
//!
//! One scalar per completed round: the mean pairwise similarity of the active
//! members' latest answers. Index equals round number; entries are never
//! rewritten.

use serde::{Deserialize, Serialize};

/// Append-only sequence of per-round mean pairwise similarity values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHistory {
    values: Vec<f64>,
}

impl SimilarityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the similarity of the round that just completed
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Similarity of the most recent completed round
    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Number of completed rounds
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

impl From<Vec<f64>> for SimilarityHistory {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}
