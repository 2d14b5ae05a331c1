use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use haulage_core::config::EmbeddingConfig;
use haulage_core::error::{HaulageError, Result};

/// Turns a query string into the vector space of the corpus embeddings.
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed one query.
    fn embed_query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

/// Query embedder backed by an OpenAI-compatible `/embeddings` endpoint
/// (OpenAI, Ollama, vLLM).
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    data: Vec<QueryVector>,
}

#[derive(Deserialize)]
struct QueryVector {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        }
    }

    /// First vector of the response, checked against the configured size.
    fn vector_from(&self, response: QueryResponse) -> Result<Vec<f32>> {
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|v| v.embedding)
            .ok_or_else(|| HaulageError::Embedding(format!("{}: empty response", self.model)))?;

        if vector.len() != self.dimensions {
            return Err(HaulageError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed_query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
        Box::pin(async move {
            let failed =
                |detail: String| HaulageError::Embedding(format!("{}: {}", self.model, detail));

            let mut req = self.client.post(&self.endpoint).json(&QueryRequest {
                model: &self.model,
                input: text,
            });
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req.send().await.map_err(|e| failed(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(failed(format!("HTTP {}: {}", status, body)));
            }

            let parsed: QueryResponse = resp
                .json()
                .await
                .map_err(|e| failed(format!("unreadable response: {}", e)))?;
            self.vector_from(parsed)
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dimensions: usize) -> HttpEmbeddingProvider {
        HttpEmbeddingProvider::from_config(&EmbeddingConfig {
            model: "nomic-embed-text".into(),
            base_url: "http://localhost:11434/v1/".into(),
            api_key: None,
            dimensions,
        })
    }

    fn response(json: &str) -> QueryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_endpoint_built_from_base_url() {
        let p = provider(2);
        assert_eq!(p.endpoint, "http://localhost:11434/v1/embeddings");
        assert_eq!(p.dimensions(), 2);
    }

    #[test]
    fn test_first_vector_taken() {
        let p = provider(2);
        let vector = p
            .vector_from(response(r#"{"data": [{"embedding": [0.1, 0.2]}]}"#))
            .unwrap();
        assert_eq!(vector, vec![0.1, 0.2]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let p = provider(3);
        let err = p
            .vector_from(response(r#"{"data": [{"embedding": [0.1, 0.2]}]}"#))
            .unwrap_err();
        assert!(matches!(
            err,
            HaulageError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_empty_response_rejected() {
        let p = provider(2);
        assert!(matches!(
            p.vector_from(response(r#"{"data": []}"#)),
            Err(HaulageError::Embedding(_))
        ));
    }
}
