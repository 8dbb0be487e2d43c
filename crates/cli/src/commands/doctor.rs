use capquote_core::config::{AppConfig, LoadOptions};
use capquote_core::pricing::catalog::{CatalogLoadOptions, PriceCatalog};
use capquote_db::{connect_with_config, ping, SqlPriceTableProvider};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DB_CONNECTIVITY, EXIT_RUNTIME, EXIT_TABLES};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    exit_code: u8,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), exit_code: 0 }
    }

    fn fail(name: &'static str, details: impl Into<String>, exit_code: u8) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), exit_code }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: format!("skipped because {reason}"),
            exit_code: 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    /// Exit code of the first failing check, zero when everything passed.
    fn exit_code(&self) -> u8 {
        self.checks
            .iter()
            .find(|check| check.status == CheckStatus::Fail)
            .map_or(0, |check| check.exit_code)
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    if json_output {
        return CommandResult::report("doctor", exit_code, &report);
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string(), EXIT_CONFIG));
            checks.push(DoctorCheck::skipped(
                "database_connectivity",
                "configuration did not load",
            ));
            checks.push(DoctorCheck::skipped("price_catalog", "configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Connectivity first; the catalog check only runs against a reachable database.
fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                    EXIT_RUNTIME,
                ),
                DoctorCheck::skipped("price_catalog", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                        EXIT_DB_CONNECTIVITY,
                    ),
                    DoctorCheck::skipped("price_catalog", "the database is unreachable"),
                ];
            }
        };
        if let Err(error) = ping(&pool).await {
            pool.close().await;
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("database did not answer: {error}"),
                    EXIT_DB_CONNECTIVITY,
                ),
                DoctorCheck::skipped("price_catalog", "the database is unreachable"),
            ];
        }

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );

        let provider = SqlPriceTableProvider::new(pool.clone());
        let options = CatalogLoadOptions { allow_fallback: false, strict: false };
        let catalog = match PriceCatalog::load(&provider, options).await {
            Ok((_, report)) if !report.is_clean() => DoctorCheck::fail(
                "price_catalog",
                format!(
                    "{} price table rows rejected; run `capquote validate-tables`",
                    report.rejected.len()
                ),
                EXIT_TABLES,
            ),
            Ok((catalog, _)) if catalog.products().next().is_none() => DoctorCheck::fail(
                "price_catalog",
                "price tables hold no products; run `capquote seed` or load real tables",
                EXIT_TABLES,
            ),
            Ok((catalog, report)) => DoctorCheck::pass(
                "price_catalog",
                format!(
                    "{} products across {} tables loaded from live data",
                    catalog.products().count(),
                    report.accepted.len()
                ),
            ),
            Err(error) => DoctorCheck::fail("price_catalog", error.to_string(), EXIT_TABLES),
        };
        pool.close().await;

        vec![connectivity, catalog]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn first_failing_check_decides_the_exit_code() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: String::new(),
            checks: vec![
                DoctorCheck::pass("config_validation", "ok"),
                DoctorCheck::fail("database_connectivity", "down", 4),
                DoctorCheck::fail("price_catalog", "empty", 6),
            ],
        };
        assert_eq!(report.exit_code(), 4);
    }

    #[test]
    fn skipped_checks_do_not_fail_the_run() {
        let report = DoctorReport {
            overall_status: CheckStatus::Pass,
            summary: String::new(),
            checks: vec![DoctorCheck::skipped("price_catalog", "not needed")],
        };
        assert_eq!(report.exit_code(), 0);
    }
}
