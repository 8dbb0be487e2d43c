use std::fs;
use std::path::Path;

use capquote_core::domain::breakdown::{CostBreakdown, PriceSource};
use capquote_core::domain::specification::QuoteSpecification;
use capquote_core::errors::{ApplicationError, InterfaceError};
use capquote_core::pricing::PricingService;
use capquote_db::SqlPriceTableProvider;
use serde::Serialize;

use crate::commands::{
    load_config, migrated_pool, runtime, CommandResult, StepFailure, EXIT_INPUT, EXIT_PRICING,
};

#[derive(Debug, Serialize)]
struct QuoteReport {
    command: &'static str,
    status: &'static str,
    source: PriceSource,
    breakdown: CostBreakdown,
}

pub fn run(spec_path: &Path, no_cache: bool) -> CommandResult {
    let spec = match read_specification(spec_path) {
        Ok(spec) => spec,
        Err(message) => return CommandResult::failure("quote", "invalid_input", message, EXIT_INPUT),
    };
    let config = match load_config("quote") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("quote") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let mut settings = config.pricing_settings();
    if no_cache {
        settings.cache_enabled = false;
    }

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let provider = SqlPriceTableProvider::new(pool.clone());
        let loaded = PricingService::load(&provider, settings).await;
        pool.close().await;

        let (pricing, _) = loaded.map_err(pricing_failure)?;
        let breakdown = pricing.calculate_quote(&spec).map_err(pricing_failure)?;
        Ok::<_, StepFailure>(QuoteReport {
            command: "quote",
            status: "ok",
            source: pricing.source(),
            breakdown,
        })
    });

    match result {
        Ok(report) => CommandResult::report("quote", 0, &report),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("quote", error_class, message, exit_code)
        }
    }
}

fn read_specification(path: &Path) -> Result<QuoteSpecification, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("cannot read `{}`: {error}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| format!("`{}` is not a valid quote specification: {error}", path.display()))
}

fn pricing_failure(error: impl Into<ApplicationError>) -> StepFailure {
    let mapped = error.into().into_interface("cli-quote");
    let error_class = match mapped {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::Unprocessable { .. } => "unprocessable",
        InterfaceError::Conflict { .. } => "conflict",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    };
    (error_class, mapped.message().to_string(), EXIT_PRICING)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use capquote_core::errors::PricingError;

    use super::{pricing_failure, read_specification};

    #[test]
    fn unreadable_spec_file_names_the_path() {
        let error = read_specification("does/not/exist.json".as_ref()).expect_err("missing file");
        assert!(error.contains("does/not/exist.json"));
    }

    #[test]
    fn malformed_spec_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spec.json");
        fs::write(&path, "{\"quantity\": \"many\"}").expect("write");
        assert!(read_specification(&path).is_err());
    }

    #[test]
    fn zero_quantity_maps_to_bad_request() {
        let (class, _, code) = pricing_failure(PricingError::InvalidQuantity { quantity: 0 });
        assert_eq!(class, "bad_request");
        assert_eq!(code, 7);
    }
}
