use haulage_core::config::AppConfig;
use haulage_memory::{SqliteCheckpointStore, SqliteStore};
use haulage_retrieval::Corpus;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn ok(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Print one line per check. Returns the number of failed checks.
pub fn run_doctor(config: &AppConfig) -> usize {
    let checks = vec![
        check_database(config),
        check_checkpoints(config),
        check_corpus(config),
        check_embedding(config),
        check_predictors(config),
        check_alerts(config),
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

fn check_database(config: &AppConfig) -> CheckResult {
    let db_path = config.database_path();
    match SqliteStore::open(&db_path) {
        Ok(_) => CheckResult::ok("Database", db_path.display().to_string()),
        Err(e) => CheckResult::fail("Database", format!("{}: {}", db_path.display(), e)),
    }
}

fn check_checkpoints(config: &AppConfig) -> CheckResult {
    let db_path = config.database_path();
    match SqliteCheckpointStore::open(&db_path).and_then(|store| store.list(1000)) {
        Ok(runs) => CheckResult::ok("Checkpoints", format!("{} recent runs", runs.len())),
        Err(e) => CheckResult::fail("Checkpoints", e.to_string()),
    }
}

fn check_corpus(config: &AppConfig) -> CheckResult {
    let Some(path) = config.corpus_path() else {
        return CheckResult::fail("Corpus", "retrieval.corpus_path not set");
    };
    match Corpus::load(&path) {
        Ok(corpus) if corpus.is_empty() => {
            CheckResult::fail("Corpus", format!("{} (no documents)", path.display()))
        }
        Ok(corpus) => {
            let semantic = match corpus.semantic_index() {
                Ok(Some(index)) => format!("{}-dim embeddings", index.dimension()),
                Ok(None) => "no embeddings".to_string(),
                Err(e) => format!("embeddings unusable: {}", e),
            };
            CheckResult::ok(
                "Corpus",
                format!("{} documents, {}", corpus.len(), semantic),
            )
        }
        Err(e) => CheckResult::fail("Corpus", format!("{}: {}", path.display(), e)),
    }
}

fn check_embedding(config: &AppConfig) -> CheckResult {
    match &config.embedding {
        Some(e) if e.base_url.is_empty() => CheckResult::fail("Embedding", "base_url is empty"),
        Some(e) if e.api_key.as_deref().is_some_and(|k| k.starts_with("${")) => {
            CheckResult::fail("Embedding", format!("{}: api_key env var not set", e.model))
        }
        Some(e) => CheckResult::ok(
            "Embedding",
            format!("{} ({} dims) at {}", e.model, e.dimensions, e.base_url),
        ),
        None => CheckResult::ok("Embedding", "not configured (lexical search only)"),
    }
}

fn check_predictors(config: &AppConfig) -> CheckResult {
    let Some(p) = &config.predictors else {
        return CheckResult::fail("Predictors", "no [predictors] section, `run` is unavailable");
    };
    if p.base_url.is_empty() {
        return CheckResult::fail("Predictors", "base_url is empty");
    }
    let compliance = p.compliance_model.as_deref().unwrap_or("hybrid retrieval");
    CheckResult::ok(
        "Predictors",
        format!(
            "{} (compliance: {}, route: {}, inventory: {}, maintenance: {})",
            p.base_url, compliance, p.route_model, p.inventory_model, p.maintenance_model
        ),
    )
}

fn check_alerts(config: &AppConfig) -> CheckResult {
    let a = &config.alerts;
    if !a.log && a.webhooks.is_empty() {
        return CheckResult::fail("Alerts", "no alert channel enabled");
    }
    if let Some(bad) = a
        .webhooks
        .iter()
        .find(|u| !u.starts_with("http://") && !u.starts_with("https://"))
    {
        return CheckResult::fail("Alerts", format!("invalid webhook url '{}'", bad));
    }
    CheckResult::ok(
        "Alerts",
        format!("log: {}, webhooks: {}", a.log, a.webhooks.len()),
    )
}
