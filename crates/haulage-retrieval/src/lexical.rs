use std::collections::HashMap;

use tracing::debug;

use crate::{Document, ScoredResult};

/// Okapi BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Config {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Document-length normalisation.
    pub b: f64,
    /// Floor for negative IDFs, as a fraction of the mean IDF.
    pub epsilon: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// BM25 index over a fixed corpus. The vocabulary is built once in
/// [`LexicalIndex::build`] and never changes.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    config: Bm25Config,
    ids: Vec<String>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

/// Whitespace tokenizer, matching how the corpus is indexed.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

impl LexicalIndex {
    pub fn build(documents: Vec<Document>) -> Self {
        Self::with_config(documents, Bm25Config::default())
    }

    pub fn with_config(documents: Vec<Document>, config: Bm25Config) -> Self {
        let mut ids = Vec::with_capacity(documents.len());
        let mut term_freqs = Vec::with_capacity(documents.len());
        let mut doc_lens = Vec::with_capacity(documents.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();

        for doc in documents {
            let tokens = tokenize(&doc.text);
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *tf.entry((*token).to_string()).or_default() += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            doc_lens.push(tokens.len());
            term_freqs.push(tf);
            ids.push(doc.id);
        }

        let n = ids.len() as f64;
        let total_len: usize = doc_lens.iter().sum();
        let avg_doc_len = if ids.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };

        // Terms in more than half the corpus get a negative raw IDF; those are
        // floored to a fraction of the mean so common terms still count a little.
        let mut idf = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, df) in doc_freq {
            let df = df as f64;
            let value = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }
        if !idf.is_empty() {
            let floor = config.epsilon * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        debug!(documents = ids.len(), vocabulary = idf.len(), "BM25 index built");

        Self {
            config,
            ids,
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// BM25 score of every document for `text`, in corpus order. Documents
    /// sharing no term with the query score 0.
    pub fn scores(&self, text: &str) -> Vec<f64> {
        self.matches(text)
            .into_iter()
            .map(|score| score.unwrap_or(0.0))
            .collect()
    }

    /// Per-document score, `None` when no query token occurs in the document.
    /// A matching score can be negative: on a small corpus the IDF floor is
    /// itself negative.
    fn matches(&self, text: &str) -> Vec<Option<f64>> {
        let tokens = tokenize(text);
        let Bm25Config { k1, b, .. } = self.config;

        self.term_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(tf, &len)| {
                let norm = if self.avg_doc_len > 0.0 {
                    1.0 - b + b * len as f64 / self.avg_doc_len
                } else {
                    1.0
                };
                tokens
                    .iter()
                    .filter_map(|token| {
                        let f = *tf.get(*token)? as f64;
                        let idf = self.idf.get(*token).copied().unwrap_or(0.0);
                        Some(idf * (f * (k1 + 1.0)) / (f + k1 * norm))
                    })
                    .fold(None, |acc, term| Some(acc.unwrap_or(0.0) + term))
            })
            .collect()
    }

    /// Top `top_n` matching documents, highest score first. Equal scores keep
    /// corpus order. Documents that share no term with the query are omitted;
    /// matching documents are kept whatever the sign of their score.
    pub fn query(&self, text: &str, top_n: usize) -> Vec<ScoredResult> {
        if self.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, f64)> = self
            .matches(text)
            .into_iter()
            .enumerate()
            .filter_map(|(i, score)| Some((i, score?)))
            .collect();

        // Stable sort keeps corpus order among ties.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n);

        ranked
            .into_iter()
            .map(|(i, score)| ScoredResult::new(self.ids[i].clone(), score))
            .collect()
    }
}
