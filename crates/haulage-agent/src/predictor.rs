use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use haulage_core::config::PredictorsConfig;
use haulage_core::error::{HaulageError, Result};
use haulage_core::traits::Predictor;
use haulage_retrieval::HybridRetriever;

/// Query the compliance agent sends to the retriever for a shipment.
pub fn compliance_query(shipment_id: &str) -> String {
    format!("Missing docs for shipment {}", shipment_id)
}

/// A model served over HTTP: `POST {base_url}/{model}` with
/// `{"subject_id": ...}`, answering `{"prediction": ...}`.
pub struct HttpPredictor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpPredictor {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
            model: model.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &PredictorsConfig, model: &str) -> Self {
        Self::new(&config.base_url, config.api_key.as_deref(), model)
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }

    fn error(&self, message: impl Into<String>) -> HaulageError {
        HaulageError::Predictor {
            model: self.model.clone(),
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    subject_id: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    prediction: serde_json::Value,
}

impl Predictor for HttpPredictor {
    fn name(&self) -> &str {
        &self.model
    }

    fn predict(&self, subject_id: &str) -> BoxFuture<'_, Result<serde_json::Value>> {
        let subject_id = subject_id.to_string();
        Box::pin(async move {
            let mut req = self.client.post(self.url()).json(&PredictRequest {
                subject_id: &subject_id,
            });
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req.send().await.map_err(|e| self.error(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(self.error(format!("API error {}: {}", status, body)));
            }

            let body: PredictResponse = resp
                .json()
                .await
                .map_err(|e| self.error(format!("bad response: {}", e)))?;
            Ok(body.prediction)
        })
    }
}

/// Answers compliance questions from the document corpus.
///
/// The prediction is the fused retrieval result, a JSON array of
/// `{"id", "score"}` objects, best first.
pub struct RetrievalPredictor {
    retriever: Arc<HybridRetriever>,
    top_n: usize,
}

impl RetrievalPredictor {
    pub fn new(retriever: Arc<HybridRetriever>, top_n: usize) -> Self {
        Self { retriever, top_n }
    }
}

impl Predictor for RetrievalPredictor {
    fn name(&self) -> &str {
        "hybrid_retrieval"
    }

    fn predict(&self, subject_id: &str) -> BoxFuture<'_, Result<serde_json::Value>> {
        let query = compliance_query(subject_id);
        Box::pin(async move {
            let results = self.retriever.retrieve(&query, self.top_n).await?;
            Ok(serde_json::to_value(results)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulage_retrieval::{Document, LexicalIndex};

    #[test]
    fn test_url_joining() {
        let p = HttpPredictor::new("http://models.local/v1/", None, "/route_optimizer");
        assert_eq!(p.url(), "http://models.local/v1/route_optimizer");
        assert_eq!(p.name(), "route_optimizer");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: PredictResponse =
            serde_json::from_str(r#"{"prediction": {"risk": 85}}"#).unwrap();
        assert_eq!(parsed.prediction["risk"], 85);
    }

    #[test]
    fn test_compliance_query() {
        assert_eq!(compliance_query("SHP-100"), "Missing docs for shipment SHP-100");
    }

    #[tokio::test]
    async fn test_retrieval_predictor_returns_ranked_ids() {
        let docs = vec![
            Document::new("invoice-policy", "shipment invoice missing docs must be reissued"),
            Document::new("customs", "customs declaration for export"),
            Document::new("packing", "packing list template"),
        ];
        let retriever = HybridRetriever::new().with_lexical(LexicalIndex::build(docs));
        let predictor = RetrievalPredictor::new(Arc::new(retriever), 3);

        let prediction = predictor.predict("SHP-100").await.unwrap();
        let results = prediction.as_array().unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0]["id"], "invoice-policy");
    }
}
