use serde_json::json;
use vocalkart_db::{connect_with_config, migrations, DemoCatalog, SqlProductRepository};

use crate::commands::{
    prepare, CommandResult, Failure, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION, EXIT_SEED,
};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let products = SqlProductRepository::new(pool.clone());
        let seeded = DemoCatalog::load(&products)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;
        let verification = DemoCatalog::verify(&products)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED))?;

        pool.close().await;

        if !verification.all_present {
            let message = missing_message(&verification.missing_barcodes);
            return Err(("seed_verification", message, EXIT_SEED));
        }
        Ok::<_, Failure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success_with(
            "seed",
            format!(
                "demo catalog loaded: {} products ({} foreign, {} domestic)",
                seeded.products_seeded, seeded.foreign, seeded.domestic
            ),
            Some(json!({ "barcodes": DemoCatalog::barcodes().collect::<Vec<_>>() })),
        ),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn missing_message(missing: &[String]) -> String {
    if missing.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for barcodes: {}", missing.join(", "))
    }
}
