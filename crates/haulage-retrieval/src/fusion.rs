//! Weighted score fusion: `fused = w_lex * lexical + w_sem * semantic`.
//!
//! An id missing from one list contributes 0 from that side. Scores are not
//! renormalised, so a single-source match keeps its weighted score.

use std::collections::HashMap;

use haulage_core::config::{DEFAULT_LEXICAL_WEIGHT, DEFAULT_SEMANTIC_WEIGHT};

use crate::ScoredResult;

/// Per-side fusion weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub lexical: f64,
    pub semantic: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: DEFAULT_LEXICAL_WEIGHT,
            semantic: DEFAULT_SEMANTIC_WEIGHT,
        }
    }
}

/// Fuse with the default 0.6 / 0.4 weights.
pub fn fuse(lexical: &[ScoredResult], semantic: &[ScoredResult]) -> Vec<ScoredResult> {
    fuse_weighted(lexical, semantic, FusionWeights::default())
}

/// Fuse two ranked lists. Output is sorted by fused score descending, ties
/// broken by id ascending, so the result is deterministic.
pub fn fuse_weighted(
    lexical: &[ScoredResult],
    semantic: &[ScoredResult],
    weights: FusionWeights,
) -> Vec<ScoredResult> {
    let mut scores: HashMap<&str, f64> = HashMap::new();

    for hit in lexical {
        *scores.entry(hit.id.as_str()).or_default() += hit.score * weights.lexical;
    }
    for hit in semantic {
        *scores.entry(hit.id.as_str()).or_default() += hit.score * weights.semantic;
    }

    let mut fused: Vec<ScoredResult> = scores
        .into_iter()
        .map(|(id, score)| ScoredResult::new(id, score))
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(pairs: &[(&str, f64)]) -> Vec<ScoredResult> {
        pairs.iter().map(|(id, s)| ScoredResult::new(*id, *s)).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_overlapping_lists() {
        let lexical = hits(&[("A", 0.9), ("B", 0.5), ("C", 0.2)]);
        let semantic = hits(&[("B", 0.8), ("D", 0.6), ("A", 0.3)]);

        let fused = fuse(&lexical, &semantic);
        let ids: Vec<_> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "D", "C"]);
        assert!(approx(fused[0].score, 0.66));
        assert!(approx(fused[1].score, 0.62));
        assert!(approx(fused[2].score, 0.24));
        assert!(approx(fused[3].score, 0.12));
    }

    #[test]
    fn test_top_three_drops_lexical_only_tail() {
        let lexical = hits(&[("A", 0.9), ("B", 0.5), ("C", 0.2)]);
        let semantic = hits(&[("B", 0.8), ("D", 0.6), ("A", 0.3)]);

        let mut fused = fuse(&lexical, &semantic);
        fused.truncate(3);

        let ids: Vec<_> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "D"]);
        assert!(approx(fused[0].score, 0.66));
        assert!(approx(fused[1].score, 0.62));
        assert!(approx(fused[2].score, 0.24));
    }

    #[test]
    fn test_disjoint_lists_keep_single_source_scores() {
        let lexical = hits(&[("L1", 1.0), ("L2", 0.5)]);
        let semantic = hits(&[("S1", 0.9), ("S2", 0.1), ("S3", -0.5)]);

        let fused = fuse(&lexical, &semantic);
        assert_eq!(fused.len(), lexical.len() + semantic.len());

        for hit in &lexical {
            let f = fused.iter().find(|r| r.id == hit.id).unwrap();
            assert!(approx(f.score, hit.score * 0.6));
        }
        for hit in &semantic {
            let f = fused.iter().find(|r| r.id == hit.id).unwrap();
            assert!(approx(f.score, hit.score * 0.4));
        }
        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_broken_by_id() {
        let lexical = hits(&[("zeta", 0.4)]);
        let semantic = hits(&[("alpha", 0.6)]);
        let fused = fuse(&lexical, &semantic);
        assert!(approx(fused[0].score, fused[1].score));
        assert_eq!(fused[0].id, "alpha");
        assert_eq!(fused[1].id, "zeta");
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse(&[], &[]).is_empty());
        let only = fuse(&hits(&[("A", 0.5)]), &[]);
        assert_eq!(only.len(), 1);
        assert!(approx(only[0].score, 0.3));
    }

    #[test]
    fn test_custom_weights() {
        let weights = FusionWeights {
            lexical: 0.5,
            semantic: 0.5,
        };
        let fused = fuse_weighted(&hits(&[("A", 1.0)]), &hits(&[("A", 0.0)]), weights);
        assert!(approx(fused[0].score, 0.5));
    }
}
