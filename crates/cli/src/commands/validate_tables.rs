use std::collections::BTreeMap;

use capquote_core::domain::breakdown::PriceSource;
use capquote_core::pricing::catalog::{CatalogLoadOptions, PriceCatalog, RowError};
use capquote_core::pricing::provider::PriceTable;
use capquote_db::SqlPriceTableProvider;
use serde::Serialize;

use crate::commands::{
    load_config, migrated_pool, runtime, CommandResult, StepFailure, EXIT_TABLES,
};

#[derive(Debug, Serialize)]
struct ValidationReport {
    command: &'static str,
    status: &'static str,
    source: PriceSource,
    products: usize,
    accepted: BTreeMap<PriceTable, usize>,
    rejected: Vec<RowError>,
}

pub fn run() -> CommandResult {
    let config = match load_config("validate-tables") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("validate-tables") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let provider = SqlPriceTableProvider::new(pool.clone());
        let options = CatalogLoadOptions { allow_fallback: false, strict: false };
        let loaded = PriceCatalog::load(&provider, options).await;
        pool.close().await;

        let (catalog, report) =
            loaded.map_err(|error| ("table_load", error.to_string(), EXIT_TABLES))?;
        let products = catalog.products().count();
        let valid = report.rejected.is_empty() && products > 0;

        Ok::<_, StepFailure>(ValidationReport {
            command: "validate-tables",
            status: if valid { "ok" } else { "error" },
            source: report.source,
            products,
            accepted: report.accepted,
            rejected: report.rejected,
        })
    });

    match result {
        Ok(report) => {
            let exit_code = if report.status == "ok" { 0 } else { EXIT_TABLES };
            CommandResult::report("validate-tables", exit_code, &report)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("validate-tables", error_class, message, exit_code)
        }
    }
}
