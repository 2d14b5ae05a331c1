use tracing::debug;

use haulage_core::error::{HaulageError, Result};

use crate::{EmbeddedDocument, ScoredResult};

/// Exact nearest-neighbour index over fixed-dimension vectors.
///
/// Scores are `1 - squared_euclidean(query, doc)`: higher is closer, and far
/// documents may score below zero.
#[derive(Debug, Clone)]
pub struct SemanticIndex {
    dimension: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl SemanticIndex {
    /// Build an index. Every vector must share the first vector's dimension.
    pub fn build(documents: Vec<EmbeddedDocument>) -> Result<Self> {
        let dimension = documents.first().map(|d| d.vector.len()).unwrap_or(0);
        let mut ids = Vec::with_capacity(documents.len());
        let mut vectors = Vec::with_capacity(documents.len());

        for doc in documents {
            if doc.vector.len() != dimension {
                return Err(HaulageError::DimensionMismatch {
                    expected: dimension,
                    actual: doc.vector.len(),
                });
            }
            ids.push(doc.id);
            vectors.push(doc.vector);
        }

        debug!(documents = ids.len(), dimension, "Semantic index built");
        Ok(Self {
            dimension,
            ids,
            vectors,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The `top_n` nearest documents, closest first. Equal distances keep
    /// corpus order.
    pub fn query(&self, query_vector: &[f32], top_n: usize) -> Result<Vec<ScoredResult>> {
        if self.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimension {
            return Err(HaulageError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let mut ranked: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .map(|v| squared_euclidean(query_vector, v))
            .enumerate()
            .collect();

        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n);

        Ok(ranked
            .into_iter()
            .map(|(i, distance)| ScoredResult::new(self.ids[i].clone(), 1.0 - distance))
            .collect())
    }
}

/// Squared L2 distance. Callers guarantee equal lengths.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum()
}
