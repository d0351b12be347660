//! Shared helpers for CLI subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dataops_adapters::{PlatformClient, PlatformClientConfig, PlatformTools, QueryService};
use dataops_agent::{DataOpsConfig, JobPoller, LanguageModel, LlmClient, TurnOrchestrator};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Runtime assembly
// ---------------------------------------------------------------------------

/// Everything a subcommand needs to serve turns and queries.
pub struct Runtime {
    pub config: DataOpsConfig,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub queries: QueryService,
}

/// Load configuration and wire the platform client, tools, language model
/// and orchestrator together.
pub fn build_runtime(config_path: &Path) -> Result<Runtime> {
    let config = DataOpsConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let client = PlatformClient::new(PlatformClientConfig::from(&config.platform))
        .context("failed to create platform client")?;
    let client = Arc::new(client);
    let queries = QueryService::new(Arc::clone(&client), JobPoller::new(config.poller_config()));
    let tools = Arc::new(PlatformTools::new(Arc::clone(&client), queries.clone()));
    let registry = PlatformTools::registry(tools).context("failed to register tools")?;

    let llm_config = config
        .llm_client_config()
        .context("invalid [llm] settings")?;
    let provider = llm_config.provider.name();
    let model = llm_config.default_model.clone();
    let llm = LlmClient::new(llm_config).context("failed to create LLM client")?;
    info!(
        provider,
        model = %model,
        configured = llm.is_configured(),
        platform = %client.base_url(),
        sandbox = client.sandbox(),
        "runtime ready"
    );

    let orchestrator = TurnOrchestrator::new(Arc::new(registry), Arc::new(llm))
        .context("failed to create orchestrator")?;

    Ok(Runtime {
        config,
        orchestrator: Arc::new(orchestrator),
        queries,
    })
}
