use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use haulage_core::error::{HaulageError, Result};

use crate::corpus::Corpus;
use crate::embeddings::EmbeddingProvider;
use crate::fusion::{fuse_weighted, FusionWeights};
use crate::lexical::LexicalIndex;
use crate::semantic::SemanticIndex;
use crate::ScoredResult;

const MIN_QUERY_CHARS: usize = 3;

/// Lexical + semantic retrieval fused into one ranking.
///
/// Either side may be absent or fail at query time; it then contributes an
/// empty list and the other side's results are returned alone.
pub struct HybridRetriever {
    lexical: Option<LexicalIndex>,
    semantic: Option<SemanticIndex>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    weights: FusionWeights,
    embed_timeout: Duration,
}

impl Default for HybridRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridRetriever {
    /// A retriever with no indexes. Every query returns empty.
    pub fn new() -> Self {
        Self {
            lexical: None,
            semantic: None,
            embedder: None,
            weights: FusionWeights::default(),
            embed_timeout: Duration::from_secs(30),
        }
    }

    /// Build both indexes from a corpus. A corpus whose embeddings are
    /// inconsistent yields a lexical-only retriever.
    pub fn from_corpus(corpus: &Corpus, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        let mut retriever = Self::new().with_lexical(corpus.lexical_index());
        match corpus.semantic_index() {
            Ok(Some(index)) => match embedder {
                Some(embedder) if embedder.dimensions() != index.dimension() => warn!(
                    corpus = index.dimension(),
                    embedder = embedder.dimensions(),
                    "Embedding dimensions differ from the corpus, semantic search disabled"
                ),
                Some(embedder) => retriever = retriever.with_semantic(index, embedder),
                None => warn!("Corpus has embeddings but no embedding provider is configured"),
            },
            Ok(None) => debug!("Corpus has no embeddings, semantic search disabled"),
            Err(e) => warn!(error = %e, "Semantic index unavailable, using lexical search only"),
        }
        retriever
    }

    pub fn with_lexical(mut self, index: LexicalIndex) -> Self {
        self.lexical = Some(index);
        self
    }

    pub fn with_semantic(
        mut self,
        index: SemanticIndex,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        self.semantic = Some(index);
        self.embedder = Some(embedder);
        self
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Bound on the query-embedding call.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn has_lexical(&self) -> bool {
        self.lexical.is_some()
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic.is_some() && self.embedder.is_some()
    }

    /// Retrieve the `top_n` best documents for `query_text`.
    ///
    /// Fails only on invalid input: a query shorter than 3 characters or a
    /// zero `top_n`.
    pub async fn retrieve(&self, query_text: &str, top_n: usize) -> Result<Vec<ScoredResult>> {
        validate(query_text, top_n)?;

        let (lexical, semantic) = tokio::join!(
            async { self.lexical_hits(query_text, top_n) },
            self.semantic_hits(query_text, top_n),
        );

        Ok(self.combine(query_text, lexical, semantic, top_n))
    }

    fn combine(
        &self,
        query_text: &str,
        lexical: Vec<ScoredResult>,
        semantic: Vec<ScoredResult>,
        top_n: usize,
    ) -> Vec<ScoredResult> {
        let lexical_hits = lexical.len();
        let semantic_hits = semantic.len();

        let mut fused = fuse_weighted(&lexical, &semantic, self.weights);
        fused.truncate(top_n);

        info!(
            query = %query_text,
            lexical_hits,
            semantic_hits,
            results = fused.len(),
            "Hybrid search complete"
        );
        fused
    }

    fn lexical_hits(&self, query_text: &str, top_n: usize) -> Vec<ScoredResult> {
        match &self.lexical {
            Some(index) => index.query(query_text, top_n),
            None => Vec::new(),
        }
    }

    async fn semantic_hits(&self, query_text: &str, top_n: usize) -> Vec<ScoredResult> {
        let (Some(index), Some(embedder)) = (&self.semantic, &self.embedder) else {
            return Vec::new();
        };

        match self.embed_query(embedder.as_ref(), query_text).await {
            Ok(vector) => index.query(&vector, top_n).unwrap_or_else(|e| {
                warn!(error = %e, "Semantic search failed, using lexical results only");
                Vec::new()
            }),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, using lexical results only");
                Vec::new()
            }
        }
    }

    async fn embed_query(
        &self,
        embedder: &dyn EmbeddingProvider,
        query_text: &str,
    ) -> Result<Vec<f32>> {
        tokio::time::timeout(self.embed_timeout, embedder.embed_query(query_text))
            .await
            .map_err(|_| HaulageError::Timeout {
                call: "embed".into(),
                timeout_secs: self.embed_timeout.as_secs(),
            })?
    }
}

fn validate(query_text: &str, top_n: usize) -> Result<()> {
    if query_text.trim().chars().count() < MIN_QUERY_CHARS {
        return Err(HaulageError::InvalidQuery(format!(
            "query must be at least {} characters",
            MIN_QUERY_CHARS
        )));
    }
    if top_n == 0 {
        return Err(HaulageError::InvalidQuery("top_n must be > 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, EmbeddedDocument};
    use futures::future::BoxFuture;

    struct FixedEmbedder(Vec<f32>);

    impl EmbeddingProvider for FixedEmbedder {
        fn embed_query<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
            Box::pin(async move { Ok(self.0.clone()) })
        }
        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    struct BrokenEmbedder;

    impl EmbeddingProvider for BrokenEmbedder {
        fn embed_query<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
            Box::pin(async { Err(HaulageError::Embedding("connection refused".into())) })
        }
        fn dimensions(&self) -> usize {
            2
        }
    }

    fn lexical() -> LexicalIndex {
        LexicalIndex::build(vec![
            Document::new("R1", "commercial invoice required for customs"),
            Document::new("R2", "packing list for hazardous goods"),
            Document::new("R3", "certificate of origin for tariff relief"),
        ])
    }

    fn semantic() -> SemanticIndex {
        SemanticIndex::build(vec![
            EmbeddedDocument::new("R2", vec![1.0, 0.0]),
            EmbeddedDocument::new("R9", vec![0.9, 0.1]),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_both_sides_fused() {
        let retriever = HybridRetriever::new()
            .with_lexical(lexical())
            .with_semantic(semantic(), Arc::new(FixedEmbedder(vec![1.0, 0.0])));

        let results = retriever.retrieve("commercial invoice", 5).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"R1"));
        assert!(ids.contains(&"R2"));
        assert!(ids.contains(&"R9"));
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_lexical() {
        let retriever = HybridRetriever::new()
            .with_lexical(lexical())
            .with_semantic(semantic(), Arc::new(BrokenEmbedder));

        let results = retriever.retrieve("commercial invoice", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "R1");
        let lexical_score = lexical().query("commercial invoice", 5)[0].score;
        assert!((results[0].score - lexical_score * 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_lexical_degrades_to_semantic() {
        let retriever = HybridRetriever::new()
            .with_semantic(semantic(), Arc::new(FixedEmbedder(vec![1.0, 0.0])));

        let results = retriever.retrieve("anything at all", 5).await.unwrap();
        assert_eq!(results[0].id, "R2");
        assert!((results[0].score - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_indexes_returns_empty() {
        let retriever = HybridRetriever::new();
        assert!(retriever.retrieve("invoice", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_queries_rejected() {
        let retriever = HybridRetriever::new().with_lexical(lexical());
        assert!(matches!(
            retriever.retrieve("ab", 3).await,
            Err(HaulageError::InvalidQuery(_))
        ));
        assert!(matches!(
            retriever.retrieve("invoice", 0).await,
            Err(HaulageError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_results_truncated_to_top_n() {
        let retriever = HybridRetriever::new()
            .with_lexical(lexical())
            .with_semantic(semantic(), Arc::new(FixedEmbedder(vec![1.0, 0.0])));

        let results = retriever.retrieve("for", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_from_corpus_without_embedder_is_lexical_only() {
        let corpus = Corpus::new(vec![crate::CorpusEntry {
            id: "R1".into(),
            text: "bill of lading".into(),
            embedding: Some(vec![0.1, 0.2]),
        }]);
        let retriever = HybridRetriever::from_corpus(&corpus, None);
        assert!(retriever.has_lexical());
        assert!(!retriever.has_semantic());
    }

    #[test]
    fn test_from_corpus_with_mismatched_embedder_is_lexical_only() {
        let corpus = Corpus::new(vec![crate::CorpusEntry {
            id: "R1".into(),
            text: "bill of lading".into(),
            embedding: Some(vec![0.1, 0.2]),
        }]);
        let wide: Arc<dyn EmbeddingProvider> = Arc::new(FixedEmbedder(vec![1.0; 3]));
        let retriever = HybridRetriever::from_corpus(&corpus, Some(wide));
        assert!(retriever.has_lexical());
        assert!(!retriever.has_semantic());

        let fitting: Arc<dyn EmbeddingProvider> = Arc::new(FixedEmbedder(vec![1.0, 0.0]));
        let matched = HybridRetriever::from_corpus(&corpus, Some(fitting));
        assert!(matched.has_semantic());
    }
}
