use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use vocalkart_agent::{ChatCompletionsClient, OpenFoodFactsClient};
use vocalkart_core::config::{AppConfig, ConfigError, LoadOptions};
use vocalkart_core::prompts::{PromptError, PromptLibrary};
use vocalkart_db::{
    connect_with_config, migrations, DbPool, SqlAlternativeRepository, SqlProductRepository,
};

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("prompt templates failed to load: {0}")]
    Prompts(#[from] PromptError),
    #[error("external client setup failed: {0}")]
    Client(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    if !config.llm.has_api_key() {
        warn!(
            event_name = "system.bootstrap.llm_key_missing",
            provider = config.llm.provider.as_str(),
            "no generator API key configured; generator-backed steps will degrade"
        );
    }

    let llm = ChatCompletionsClient::from_config(&config.llm)
        .map_err(|error| BootstrapError::Client(format!("{error:#}")))?;
    let lookup = OpenFoodFactsClient::from_config(&config.lookup)
        .map_err(|error| BootstrapError::Client(format!("{error:#}")))?;
    let prompts = PromptLibrary::new()?;

    let api = ApiState::new(
        Arc::new(SqlProductRepository::new(db_pool.clone())),
        Arc::new(SqlAlternativeRepository::new(db_pool.clone())),
        Arc::new(llm),
        Arc::new(lookup),
        Arc::new(prompts),
        &config.ranking,
    );
    info!(
        event_name = "system.bootstrap.pipeline_ready",
        model = %config.llm.model,
        lookup = %config.lookup.base_url,
        "pipeline wired"
    );

    Ok(Application { config, db_pool, api })
}
