use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HaulageError, Result};

/// Fused-score weight of the lexical (BM25) side.
pub const DEFAULT_LEXICAL_WEIGHT: f64 = 0.6;
/// Fused-score weight of the semantic (vector) side.
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.4;
/// Failure risk (0-100) above which maintenance is scheduled.
pub const DEFAULT_RISK_THRESHOLD: f64 = 80.0;

/// Top-level Haulage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    #[serde(default)]
    pub predictors: Option<PredictorsConfig>,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding memory, checkpoints and the mutation ledger.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String { "~/.haulage/haulage.db".into() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// JSON file of compliance rules (`[{"id", "text", "embedding"?}]`).
    #[serde(default)]
    pub corpus_path: Option<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            top_n: default_top_n(),
            lexical_weight: default_lexical_weight(),
            semantic_weight: default_semantic_weight(),
        }
    }
}

fn default_top_n() -> usize { 5 }
fn default_lexical_weight() -> f64 { DEFAULT_LEXICAL_WEIGHT }
fn default_semantic_weight() -> f64 { DEFAULT_SEMANTIC_WEIGHT }

/// OpenAI-compatible embedding endpoint used to embed queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2", "nomic-embed-text").
    pub model: String,
    /// Base URL for the embedding API (e.g., "http://localhost:11434/v1").
    pub base_url: String,
    /// API key (optional, for cloud providers).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Embedding dimensions (default: 384).
    #[serde(default = "default_embedding_dims")]
    pub dimensions: usize,
}

fn default_embedding_dims() -> usize { 384 }

/// HTTP prediction service hosting the decision models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorsConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_route_model")]
    pub route_model: String,
    #[serde(default = "default_inventory_model")]
    pub inventory_model: String,
    #[serde(default = "default_maintenance_model")]
    pub maintenance_model: String,
    /// Remote compliance model. When unset, compliance uses hybrid retrieval.
    #[serde(default)]
    pub compliance_model: Option<String>,
}

fn default_route_model() -> String { "route_optimizer".into() }
fn default_inventory_model() -> String { "warehouse_prediction".into() }
fn default_maintenance_model() -> String { "detect_failures".into() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Failure risk above which maintenance is scheduled.
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: f64,
    /// Timeout applied to every predictor, mutation and embedding call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            risk_threshold: default_risk_threshold(),
            call_timeout_secs: default_call_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_risk_threshold() -> f64 { DEFAULT_RISK_THRESHOLD }
fn default_call_timeout() -> u64 { 30 }

/// Retry configuration for external calls inside an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 500 }
fn default_max_backoff() -> u64 { 10000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Log every alert through tracing (default: true).
    #[serde(default = "default_log_alerts")]
    pub log: bool,
    /// Webhook URLs that receive alerts as JSON.
    #[serde(default)]
    pub webhooks: Vec<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            log: default_log_alerts(),
            webhooks: vec![],
        }
    }
}

fn default_log_alerts() -> bool { true }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| HaulageError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| HaulageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the workflow cannot run with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.top_n == 0 {
            return Err(HaulageError::Config("retrieval.top_n must be > 0".into()));
        }
        if r.lexical_weight < 0.0 || r.semantic_weight < 0.0 {
            return Err(HaulageError::Config(
                "retrieval weights must be non-negative".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.workflow.risk_threshold) {
            return Err(HaulageError::Config(
                "workflow.risk_threshold must be within 0-100".into(),
            ));
        }
        if self.workflow.call_timeout_secs == 0 {
            return Err(HaulageError::Config(
                "workflow.call_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the database path (expand ~).
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.storage.database_path)
    }

    /// Resolve the corpus path (expand ~), if configured.
    pub fn corpus_path(&self) -> Option<PathBuf> {
        self.retrieval.corpus_path.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Leave the reference in place if the variable is unset
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_HAULAGE_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_HAULAGE_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_HAULAGE_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_HAULAGE_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_HAULAGE_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.retrieval.top_n, 5);
        assert_eq!(config.retrieval.lexical_weight, DEFAULT_LEXICAL_WEIGHT);
        assert_eq!(config.retrieval.semantic_weight, DEFAULT_SEMANTIC_WEIGHT);
        assert_eq!(config.workflow.risk_threshold, DEFAULT_RISK_THRESHOLD);
        assert_eq!(config.workflow.call_timeout_secs, 30);
        assert_eq!(config.workflow.retry.max_retries, 2);
        assert!(config.alerts.log);
        assert!(config.alerts.webhooks.is_empty());
        assert!(config.embedding.is_none());
        assert!(config.predictors.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_predictor_defaults() {
        let toml_str = r#"
[predictors]
base_url = "http://models.internal:8000"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let p = config.predictors.unwrap();
        assert_eq!(p.route_model, "route_optimizer");
        assert_eq!(p.inventory_model, "warehouse_prediction");
        assert_eq!(p.maintenance_model, "detect_failures");
        assert!(p.compliance_model.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let toml_str = r#"
[workflow]
risk_threshold = 120.0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_top_n() {
        let toml_str = r#"
[retrieval]
top_n = 0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }
}
