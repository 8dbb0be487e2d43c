use capquote_core::pricing::fallback::fallback_tables;
use capquote_db::PriceTableSeed;

use crate::commands::{
    load_config, migrated_pool, runtime, CommandResult, StepFailure, EXIT_MIGRATION, EXIT_TABLES,
};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;

        let seeded = PriceTableSeed::load_demo(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;
        let verification = PriceTableSeed::verify(&pool, &fallback_tables())
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_TABLES))?;
        pool.close().await;

        if !verification.all_present {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(table, matches)| (!matches).then(|| table.to_string()))
                .collect::<Vec<_>>();
            return Err((
                "seed_verification",
                format!("seeded tables do not match the demo catalog: {}", failed.join(", ")),
                EXIT_TABLES,
            ));
        }

        let rows = seeded.rows_seeded.values().sum::<usize>();
        let tables = seeded.rows_seeded.len();
        Ok::<String, StepFailure>(format!("seeded {rows} rows across {tables} price tables"))
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
