//! Wiring shared by the commands: store, providers and the concierge agent.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};

use concierge_agent::embedding::build_embedder;
use concierge_agent::llm::build_chat_model;
use concierge_agent::skills::{ConciergeSkills, SystemClock};
use concierge_agent::{AgentRuntime, ChatModel, Embedder};
use concierge_core::booking::CommitRetryPolicy;
use concierge_core::config::AppConfig;
use concierge_db::{
    connect_with_config, migrations, BookingDesk, DbPool, InventoryRepository,
    SqlInventoryRepository,
};

use crate::commands::CommandResult;

/// A classified command failure: error class, exit code and cause chain.
#[derive(Debug)]
pub struct Failure {
    pub error_class: &'static str,
    pub exit_code: u8,
    pub error: anyhow::Error,
}

impl Failure {
    pub fn new(error_class: &'static str, exit_code: u8, error: anyhow::Error) -> Self {
        Self { error_class, exit_code, error }
    }

    pub fn into_result(self, command: &str) -> CommandResult {
        let message = format!("{:#}", self.error);
        CommandResult::failure(command, self.error_class, message, self.exit_code)
    }
}

pub struct Inventory {
    pub pool: DbPool,
    pub repository: Arc<dyn InventoryRepository>,
}

/// Connects and applies pending migrations.
pub async fn open_inventory(config: &AppConfig) -> Result<Inventory, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .with_context(|| format!("failed to connect to `{}`", config.database.url))
        .map_err(|error| Failure::new("db_connectivity", 4, error))?;

    migrations::run_pending(&pool)
        .await
        .context("failed to apply migrations")
        .map_err(|error| Failure::new("migration", 5, error))?;

    let repository: Arc<dyn InventoryRepository> =
        Arc::new(SqlInventoryRepository::new(pool.clone()));
    Ok(Inventory { pool, repository })
}

pub fn embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, Failure> {
    build_embedder(config)
        .map_err(|error| anyhow!(error).context("failed to initialise embedding provider"))
        .map_err(|error| Failure::new("provider_init", 3, error))
}

pub fn chat_model(config: &AppConfig) -> Result<Arc<dyn ChatModel>, Failure> {
    build_chat_model(&config.llm)
        .map_err(|error| anyhow!(error).context("failed to initialise chat model"))
        .map_err(|error| Failure::new("provider_init", 3, error))
}

pub fn concierge(
    config: &AppConfig,
    repository: Arc<dyn InventoryRepository>,
) -> Result<AgentRuntime, Failure> {
    let desk = BookingDesk::new(repository)
        .with_policy(CommitRetryPolicy::new(config.agent.commit_max_attempts))
        .with_store_timeout(Duration::from_secs(config.database.timeout_secs));

    let registry = ConciergeSkills {
        desk: Arc::new(desk),
        embedder: embedder(config)?,
        clock: Arc::new(SystemClock),
        search_top_k: usize::try_from(config.agent.search_top_k).unwrap_or(usize::MAX),
    }
    .into_registry();

    let model = chat_model(config)?;
    Ok(AgentRuntime::from_config(&config.agent, &config.llm, model, Arc::new(registry)))
}
