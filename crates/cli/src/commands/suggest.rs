use std::sync::Arc;

use vocalkart_agent::{
    AlternativeSuggester, ChatCompletionsClient, SuggestRequest, SuggestionOutcome,
};
use vocalkart_core::config::AppConfig;
use vocalkart_core::domain::product::ProductId;
use vocalkart_core::errors::ApplicationError;
use vocalkart_core::prompts::PromptLibrary;
use vocalkart_db::{
    connect_with_config, migrations, ProductRepository, SqlAlternativeRepository,
    SqlProductRepository,
};

use crate::commands::{
    prepare, CommandResult, Failure, EXIT_CONFIG, EXIT_DB_CONNECTIVITY, EXIT_INVALID_INPUT,
    EXIT_MIGRATION, EXIT_NOT_FOUND, EXIT_UPSTREAM,
};

/// Runs the alternative pipeline once for a stored product and prints the
/// persisted links.
pub fn run(product_id: &str) -> CommandResult {
    let product_id = product_id.trim();
    if product_id.is_empty() {
        return CommandResult::failure(
            "suggest",
            "invalid_input",
            "--product-id must not be empty",
            EXIT_INVALID_INPUT,
        );
    }

    let (config, runtime) = match prepare("suggest") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    match runtime.block_on(execute(&config, product_id)) {
        Ok(outcome) => CommandResult::success_with(
            "suggest",
            format!("{} alternatives recorded", outcome.alternatives.len()),
            serde_json::to_value(&outcome).ok(),
        ),
        Err(failure) => CommandResult::from_failure("suggest", failure),
    }
}

async fn execute(config: &AppConfig, product_id: &str) -> Result<SuggestionOutcome, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

    let products = Arc::new(SqlProductRepository::new(pool.clone()));
    let alternatives = Arc::new(SqlAlternativeRepository::new(pool.clone()));

    let product = products
        .find_by_id(&ProductId(product_id.to_string()))
        .await
        .map_err(|error| ("persistence", error.to_string(), EXIT_DB_CONNECTIVITY))?
        .ok_or_else(|| {
            ("not_found", format!("product `{product_id}` was not found"), EXIT_NOT_FOUND)
        })?;

    let llm = ChatCompletionsClient::from_config(&config.llm)
        .map_err(|error| ("generator_setup", format!("{error:#}"), EXIT_CONFIG))?;
    let prompts = PromptLibrary::new()
        .map_err(|error| ("configuration", error.to_string(), EXIT_CONFIG))?;

    let suggester =
        AlternativeSuggester::new(products, alternatives, Arc::new(llm), Arc::new(prompts))
            .with_ranking(&config.ranking);
    let request = SuggestRequest {
        product_id: product.id.0.clone(),
        product_name: product.name.clone(),
        product_category: product.category.clone(),
    };

    let outcome = suggester.suggest(&request).await.map_err(|error| {
        let (class, exit_code) = classify(&error);
        (class, error.to_string(), exit_code)
    });
    pool.close().await;
    outcome
}

fn classify(error: &ApplicationError) -> (&'static str, u8) {
    match error {
        ApplicationError::Domain(_) => ("invalid_input", EXIT_INVALID_INPUT),
        ApplicationError::NotFound { .. } => ("not_found", EXIT_NOT_FOUND),
        ApplicationError::Persistence(_) => ("persistence", EXIT_DB_CONNECTIVITY),
        ApplicationError::Integration(_) => ("generator_unavailable", EXIT_UPSTREAM),
        ApplicationError::MalformedOutput(_) => ("malformed_output", EXIT_UPSTREAM),
        ApplicationError::Configuration(_) => ("configuration", EXIT_CONFIG),
    }
}
