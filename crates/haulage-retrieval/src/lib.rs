//! Hybrid retrieval over the compliance rule corpus.
//!
//! A [`LexicalIndex`] (BM25) and a [`SemanticIndex`] (exact nearest neighbour
//! over precomputed embeddings) are queried independently, then merged by
//! [`fuse`] into one ranked list. [`HybridRetriever`] ties the three together
//! and degrades to whichever side is still usable.

pub mod corpus;
pub mod embeddings;
pub mod fusion;
pub mod hybrid;
pub mod lexical;
pub mod semantic;

pub use corpus::{Corpus, CorpusEntry};
pub use embeddings::{EmbeddingProvider, HttpEmbeddingProvider};
pub use fusion::{fuse, fuse_weighted, FusionWeights};
pub use hybrid::HybridRetriever;
pub use lexical::{Bm25Config, LexicalIndex};
pub use semantic::SemanticIndex;

use serde::{Deserialize, Serialize};

/// A document for lexical indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A document with a precomputed embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    pub id: String,
    pub vector: Vec<f32>,
}

impl EmbeddedDocument {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
        }
    }
}

/// A ranked hit. Higher score = more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub id: String,
    pub score: f64,
}

impl ScoredResult {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}
