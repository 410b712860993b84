use std::sync::Arc;

use bpmn_lite_core::external::{AppDelegate, NullModelStore, ScriptHost};
use bpmn_lite_core::persistence::{DocumentStore, MemoryStore};
use bpmn_lite_core::Engine;
use tracing_subscriber::EnvFilter;

/// A script host that rejects everything: wiring a real scripting
/// engine is a deployment concern, this binary only demonstrates that
/// the facade boots end to end.
struct UnconfiguredScriptHost;

#[async_trait::async_trait]
impl ScriptHost for UnconfiguredScriptHost {
    async fn eval(&self, script: &str, _vars: &serde_json::Value) -> bpmn_lite_core::Result<serde_json::Value> {
        Err(bpmn_lite_core::EngineError::Script(format!(
            "no script host configured, cannot evaluate: {script}"
        )))
    }

    async fn eval_condition(&self, expr: &str, _vars: &serde_json::Value) -> bpmn_lite_core::Result<bool> {
        Err(bpmn_lite_core::EngineError::Script(format!(
            "no script host configured, cannot evaluate condition: {expr}"
        )))
    }
}

struct UnconfiguredAppDelegate;

#[async_trait::async_trait]
impl AppDelegate for UnconfiguredAppDelegate {
    async fn invoke(&self, element_id: &str, _input: &serde_json::Value) -> bpmn_lite_core::Result<serde_json::Value> {
        Err(bpmn_lite_core::EngineError::Validation {
            element_id: element_id.to_string(),
            message: "no app delegate configured".to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let database_url = parse_database_url();

    let store: Arc<dyn DocumentStore> = match database_url {
        #[cfg(feature = "postgres")]
        Some(url) => {
            tracing::info!("connecting to PostgreSQL");
            let pg = bpmn_lite_core::persistence::PostgresStore::connect(&url).await?;
            tracing::info!("using PostgresStore");
            Arc::new(pg)
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("DATABASE_URL set but the postgres feature is not enabled, using MemoryStore");
            Arc::new(MemoryStore::new())
        }
        None => {
            tracing::info!("using MemoryStore (no DATABASE_URL configured)");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Arc::new(Engine::new(
        store,
        Arc::new(UnconfiguredScriptHost),
        Arc::new(UnconfiguredAppDelegate),
        Arc::new(NullModelStore),
    ));

    tracing::info!("bpmn-lite engine ready");
    // No bundled HTTP/REST/gRPC surface here: a hosting application
    // wires its own transport on top of `Engine`; this binary exists to
    // prove out the boot sequence and feature wiring.
    let _ = engine;
    std::future::pending::<()>().await;
    Ok(())
}

/// Parse database URL from `--database-url <url>` CLI arg or `DATABASE_URL` env var.
fn parse_database_url() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    if let Some(url) = args
        .windows(2)
        .find(|w| w[0] == "--database-url")
        .map(|w| w[1].clone())
    {
        return Some(url);
    }
    std::env::var("DATABASE_URL").ok()
}
