//! Similarity measurement adapters

pub mod measurer;

pub use measurer::{EmbeddingScorer, LexicalSimilarity, ResilientSimilarityMeasurer};
