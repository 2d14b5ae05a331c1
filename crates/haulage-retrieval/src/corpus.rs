use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use haulage_core::error::{HaulageError, Result};

use crate::{Document, EmbeddedDocument, LexicalIndex, SemanticIndex};

/// One compliance rule as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub id: String,
    pub text: String,
    /// Precomputed embedding. Entries without one are lexical-only.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// The rule corpus both indexes are built from.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    pub fn new(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }

    /// Load a JSON array of entries.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HaulageError::Retrieval(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;
        let entries: Vec<CorpusEntry> = serde_json::from_str(&content)?;
        info!(path = %path.display(), documents = entries.len(), "Corpus loaded");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.entries
            .iter()
            .map(|e| Document::new(e.id.clone(), e.text.clone()))
            .collect()
    }

    pub fn embedded_documents(&self) -> Vec<EmbeddedDocument> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.embedding
                    .as_ref()
                    .map(|v| EmbeddedDocument::new(e.id.clone(), v.clone()))
            })
            .collect()
    }

    pub fn lexical_index(&self) -> LexicalIndex {
        LexicalIndex::build(self.documents())
    }

    /// `None` when no entry carries an embedding.
    pub fn semantic_index(&self) -> Result<Option<SemanticIndex>> {
        let docs = self.embedded_documents();
        if docs.is_empty() {
            return Ok(None);
        }
        SemanticIndex::build(docs).map(Some)
    }
}
