mod doctor;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use haulage_agent::{AppContext, WorkflowRequest};
use haulage_core::config::AppConfig;
use haulage_core::traits::CheckpointStore;
use haulage_core::types::{RunState, Stage, StageStatus, Subjects};

#[derive(Parser)]
#[command(name = "haulage", version, about = "Checkpointed logistics decision workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "haulage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or resume the workflow for a correlation id
    Run {
        /// Correlation id (auto-generated if not provided)
        correlation_id: Option<String>,
        /// Shipment id for the compliance and shipment stages
        #[arg(long)]
        shipment: Option<String>,
        /// Product id for the warehouse stage
        #[arg(long)]
        product: Option<String>,
        /// Equipment id for the maintenance stage
        #[arg(long)]
        equipment: Option<String>,
    },
    /// Show the stored state of a run
    Status {
        correlation_id: String,
    },
    /// Query the compliance corpus
    Search {
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
        /// Number of results (defaults to retrieval.top_n)
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Read an agent memory entry
    Memory {
        /// Agent name, e.g. "Shipment AI" or "orchestrator"
        agent: String,
        key: String,
    },
    /// Show current configuration
    Config,
    /// Run system health checks
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("haulage=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Doctor => {
            println!("Haulage Doctor");
            println!("==============");
            doctor::run_doctor(&config);
        }
        Commands::Run {
            correlation_id,
            shipment,
            product,
            equipment,
        } => {
            let ctx = AppContext::from_config(config)?;
            let orchestrator = ctx.orchestrator()?;

            let correlation_id =
                correlation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let subjects = Subjects {
                shipment_id: shipment.unwrap_or_else(|| correlation_id.clone()),
                product_id: product.unwrap_or_else(|| correlation_id.clone()),
                equipment_id: equipment.unwrap_or_else(|| correlation_id.clone()),
            };

            let state = orchestrator
                .execute_request(WorkflowRequest::new(correlation_id, subjects))
                .await?;
            print_state(&state);

            if state.has_failures() {
                let failed: Vec<&str> = Stage::ALL
                    .iter()
                    .filter(|s| state.status(**s) == StageStatus::Failed)
                    .map(|s| s.as_str())
                    .collect();
                let handle = ctx.alerts.raise(
                    "workflow_failed",
                    serde_json::json!({
                        "correlation_id": state.correlation_id,
                        "attempt": state.attempt,
                        "failed_stages": failed,
                    }),
                );
                if let Err(e) = handle.await {
                    warn!(error = %e, "Alert task did not finish");
                }
            }
        }
        Commands::Status { correlation_id } => {
            let ctx = AppContext::from_config(config)?;
            match ctx.checkpoints.load(&correlation_id).await? {
                Some(state) => print_state(&state),
                None => println!("No run found for '{}'", correlation_id),
            }
        }
        Commands::Search { query, top_n } => {
            let ctx = AppContext::from_config(config)?;
            let text = query.join(" ");
            let top_n = top_n.unwrap_or(ctx.config.retrieval.top_n);
            let results = ctx.retriever.retrieve(&text, top_n).await?;
            if results.is_empty() {
                println!("No matching documents.");
            }
            for (rank, hit) in results.iter().enumerate() {
                println!("{:>3}. {:<32} {:.4}", rank + 1, hit.id, hit.score);
            }
        }
        Commands::Memory { agent, key } => {
            let ctx = AppContext::from_config(config)?;
            match ctx.memory.retrieve_record(&agent, &key).await {
                Some(record) => {
                    println!("{}", serde_json::to_string_pretty(&record.value)?);
                    println!("(updated {})", record.updated_at.to_rfc3339());
                }
                None => println!("No memory for {}:{}", agent, key),
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        return Ok(AppConfig::load(path)?);
    }

    let home_config = dirs_home().map(|h| h.join(".haulage").join("config.toml"));
    if let Some(ref home) = home_config {
        if home.exists() {
            info!(path = %home.display(), "Loading config");
            return Ok(AppConfig::load(home)?);
        }
    }

    warn!(
        path = %path.display(),
        "No config file found, using defaults (see haulage.toml.example)"
    );
    Ok(AppConfig::default())
}

fn print_state(state: &RunState) {
    println!("Run {} (attempt {})", state.correlation_id, state.attempt);
    for stage in Stage::ALL {
        let record = state.stage(stage);
        let status = record.status.to_string();
        let subject = state.subjects.subject_for(stage);
        let detail = match (&record.error, &record.outcome) {
            (Some(error), _) => error.clone(),
            (None, Some(outcome)) => format!("{} {}", outcome.status, outcome.payload),
            (None, None) => String::new(),
        };
        println!(
            "  {:<12} {:<12} {:<16} {}",
            stage.as_str(),
            status,
            subject,
            detail
        );
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
