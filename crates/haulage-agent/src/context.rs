use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use haulage_core::config::{AppConfig, WorkflowConfig};
use haulage_core::error::{HaulageError, Result};
use haulage_core::traits::{CheckpointStore, Predictor, StateMutator};
use haulage_memory::{AgentMemory, SqliteCheckpointStore, SqliteStore};
use haulage_retrieval::{
    Corpus, EmbeddingProvider, FusionWeights, HttpEmbeddingProvider, HybridRetriever,
};

use crate::alert::AlertDispatcher;
use crate::decision::{
    AgentDeps, ComplianceAgent, DecisionAgent, MaintenanceAgent, ShipmentAgent, WarehouseAgent,
};
use crate::envelope::CallEnvelope;
use crate::predictor::{HttpPredictor, RetrievalPredictor};
use crate::workflow::WorkflowOrchestrator;

/// One predictor per stage.
#[derive(Clone)]
pub struct StagePredictors {
    pub compliance: Arc<dyn Predictor>,
    pub shipment: Arc<dyn Predictor>,
    pub warehouse: Arc<dyn Predictor>,
    pub maintenance: Arc<dyn Predictor>,
}

/// Wire the four agents and the orchestrator from their collaborators.
pub fn assemble_orchestrator(
    predictors: StagePredictors,
    mutator: Arc<dyn StateMutator>,
    checkpoints: Arc<dyn CheckpointStore>,
    memory: AgentMemory,
    workflow: &WorkflowConfig,
) -> Result<WorkflowOrchestrator> {
    let envelope = CallEnvelope::from_config(workflow);
    let deps = |predictor: Arc<dyn Predictor>| {
        AgentDeps::new(predictor, mutator.clone(), memory.clone(), envelope.clone())
    };

    let agents: Vec<Arc<dyn DecisionAgent>> = vec![
        Arc::new(ComplianceAgent::new(deps(predictors.compliance))),
        Arc::new(ShipmentAgent::new(deps(predictors.shipment))),
        Arc::new(WarehouseAgent::new(deps(predictors.warehouse))),
        Arc::new(
            MaintenanceAgent::new(deps(predictors.maintenance))
                .with_threshold(workflow.risk_threshold),
        ),
    ];
    WorkflowOrchestrator::new(agents, checkpoints, memory)
}

/// Long-lived application state, built once at startup.
///
/// Opening the database or loading the corpus is the only place a
/// configuration failure can surface; both are fatal.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub checkpoints: Arc<SqliteCheckpointStore>,
    pub memory: AgentMemory,
    pub retriever: Arc<HybridRetriever>,
    pub alerts: AlertDispatcher,
}

impl AppContext {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let db_path = config.database_path();
        let store = Arc::new(SqliteStore::open(&db_path)?);
        let checkpoints = Arc::new(SqliteCheckpointStore::open(&db_path)?);
        let memory = AgentMemory::new(store.clone());

        let corpus = match config.corpus_path() {
            Some(path) => Corpus::load(&path)?,
            None => {
                warn!("No retrieval corpus configured, compliance search will return nothing");
                Corpus::new(vec![])
            }
        };

        let embedder: Option<Arc<dyn EmbeddingProvider>> = config
            .embedding
            .as_ref()
            .map(|e| Arc::new(HttpEmbeddingProvider::from_config(e)) as Arc<dyn EmbeddingProvider>);

        let retriever = HybridRetriever::from_corpus(&corpus, embedder)
            .with_weights(FusionWeights {
                lexical: config.retrieval.lexical_weight,
                semantic: config.retrieval.semantic_weight,
            })
            .with_embed_timeout(Duration::from_secs(config.workflow.call_timeout_secs));

        info!(
            db = %db_path.display(),
            documents = corpus.len(),
            semantic = retriever.has_semantic(),
            "Application context ready"
        );

        let alerts = AlertDispatcher::from_config(&config.alerts);
        Ok(Self {
            config,
            store,
            checkpoints,
            memory,
            retriever: Arc::new(retriever),
            alerts,
        })
    }

    /// Predictors from the `[predictors]` section. Compliance falls back to
    /// corpus retrieval when no remote compliance model is named.
    pub fn predictors(&self) -> Result<StagePredictors> {
        let cfg = self.config.predictors.as_ref().ok_or_else(|| {
            HaulageError::Config("a [predictors] section is required to run workflows".into())
        })?;

        let compliance: Arc<dyn Predictor> = match &cfg.compliance_model {
            Some(model) => Arc::new(HttpPredictor::from_config(cfg, model)),
            None => Arc::new(RetrievalPredictor::new(
                self.retriever.clone(),
                self.config.retrieval.top_n,
            )),
        };

        Ok(StagePredictors {
            compliance,
            shipment: Arc::new(HttpPredictor::from_config(cfg, &cfg.route_model)),
            warehouse: Arc::new(HttpPredictor::from_config(cfg, &cfg.inventory_model)),
            maintenance: Arc::new(HttpPredictor::from_config(cfg, &cfg.maintenance_model)),
        })
    }

    /// The production orchestrator: HTTP predictors, SQLite ledger and
    /// checkpoints.
    pub fn orchestrator(&self) -> Result<WorkflowOrchestrator> {
        assemble_orchestrator(
            self.predictors()?,
            self.store.clone(),
            self.checkpoints.clone(),
            self.memory.clone(),
            &self.config.workflow,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulage_core::config::PredictorsConfig;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.database_path = dir.join("haulage.db").display().to_string();
        config
    }

    #[test]
    fn test_context_without_predictors_cannot_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::from_config(config_in(dir.path())).unwrap();
        assert!(ctx.retriever.has_lexical());
        assert!(!ctx.retriever.has_semantic());
        assert!(matches!(ctx.orchestrator(), Err(HaulageError::Config(_))));
    }

    #[test]
    fn test_compliance_uses_retrieval_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.predictors = Some(PredictorsConfig {
            base_url: "http://models.local".into(),
            api_key: None,
            route_model: "route_optimizer".into(),
            inventory_model: "warehouse_prediction".into(),
            maintenance_model: "detect_failures".into(),
            compliance_model: None,
        });
        let ctx = AppContext::from_config(config).unwrap();

        let predictors = ctx.predictors().unwrap();
        assert_eq!(predictors.compliance.name(), "hybrid_retrieval");
        assert_eq!(predictors.shipment.name(), "route_optimizer");
        assert!(ctx.orchestrator().is_ok());
    }

    #[test]
    fn test_missing_corpus_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.retrieval.corpus_path = Some(dir.path().join("absent.json").display().to_string());
        assert!(AppContext::from_config(config).is_err());
    }
}
