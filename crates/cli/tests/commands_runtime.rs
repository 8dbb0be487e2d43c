use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use capquote_cli::commands::{doctor, migrate, quote, seed, validate_tables};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[("CAPQUOTE_DATABASE_URL", &database_url(&dir))], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("CAPQUOTE_DATABASE_URL", "postgres://localhost/capquote")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_demo_tables_and_reports_row_counts() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[("CAPQUOTE_DATABASE_URL", &database_url(&dir))], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected successful seed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        let message = payload["message"].as_str().expect("message");
        assert!(message.contains("across 8 price tables"), "unexpected message: {message}");
    });
}

#[test]
fn validate_tables_fails_on_an_empty_catalog_and_passes_after_seed() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[("CAPQUOTE_DATABASE_URL", &database_url(&dir))], || {
        let empty = validate_tables::run();
        assert_eq!(empty.exit_code, 6, "empty tables hold no products");
        let payload = parse_payload(&empty.output);
        assert_eq!(payload["products"], 0);

        assert_eq!(seed::run().exit_code, 0);

        let seeded = validate_tables::run();
        assert_eq!(seeded.exit_code, 0, "seeded tables should validate: {}", seeded.output);
        let payload = parse_payload(&seeded.output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["source"], "live");
        assert_eq!(payload["rejected"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn quote_prices_a_spec_file_against_seeded_tables() {
    let dir = TempDir::new().expect("tempdir");
    let spec_path = dir.path().join("order.json");
    fs::write(&spec_path, r#"{"product": "6P AirFrame HSCS", "quantity": 288, "fabrics": ["Acrylic"]}"#)
        .expect("write spec");

    with_env(
        &[
            ("CAPQUOTE_DATABASE_URL", &database_url(&dir)),
            ("CAPQUOTE_PRICING_TIER_POLICY", "lower-inclusive"),
        ],
        || {
            assert_eq!(seed::run().exit_code, 0);

            let result = quote::run(&spec_path, true);
            assert_eq!(result.exit_code, 0, "expected a priced quote: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["source"], "live");
            assert_eq!(payload["breakdown"]["tier"], 144);
            let total = payload["breakdown"]["total_cost"]
                .as_str()
                .and_then(|raw| raw.parse::<f64>().ok())
                .expect("total_cost should be a decimal string");
            assert!((total - 1512.0).abs() < f64::EPSILON, "unexpected total {total}");
        },
    );
}

#[test]
fn quote_rejects_unknown_products_with_pricing_exit_code() {
    let dir = TempDir::new().expect("tempdir");
    let spec_path = dir.path().join("order.json");
    fs::write(&spec_path, r#"{"product": "Bucket Hat", "quantity": 144}"#).expect("write spec");

    with_env(&[("CAPQUOTE_DATABASE_URL", &database_url(&dir))], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = quote::run(&spec_path, false);
        assert_eq!(result.exit_code, 7);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
    });
}

#[test]
fn quote_rejects_malformed_spec_before_touching_the_database() {
    let dir = TempDir::new().expect("tempdir");
    let spec_path = dir.path().join("order.json");
    fs::write(&spec_path, "not json").expect("write spec");

    with_env(&[("CAPQUOTE_DATABASE_URL", "postgres://never-reached")], || {
        let result = quote::run(&spec_path, false);
        assert_eq!(result.exit_code, 8);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn doctor_json_reports_each_check() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[("CAPQUOTE_DATABASE_URL", &database_url(&dir))], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected healthy doctor run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names = payload["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["config_validation", "database_connectivity", "price_catalog"]);
    });
}

#[test]
fn doctor_skips_database_checks_when_config_is_invalid() {
    with_env(&[("CAPQUOTE_CACHE_TTL_SECS", "0")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("[fail] config_validation"));
        assert!(result.output.contains("[skip] database_connectivity"));
        assert!(result.output.contains("[skip] price_catalog"));
    });
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("capquote.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    let keys = [
        "CAPQUOTE_DATABASE_URL",
        "CAPQUOTE_DATABASE_MAX_CONNECTIONS",
        "CAPQUOTE_DATABASE_TIMEOUT_SECS",
        "CAPQUOTE_SERVER_BIND_ADDRESS",
        "CAPQUOTE_SERVER_PORT",
        "CAPQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CAPQUOTE_PRICING_TIER_POLICY",
        "CAPQUOTE_PRICING_ALLOW_FALLBACK",
        "CAPQUOTE_PRICING_STRICT_VALIDATION",
        "CAPQUOTE_CACHE_ENABLED",
        "CAPQUOTE_CACHE_TTL_SECS",
        "CAPQUOTE_CACHE_PREWARM_ON_START",
        "CAPQUOTE_CACHE_PREWARM_QUANTITIES",
        "CAPQUOTE_LOGGING_LEVEL",
        "CAPQUOTE_LOGGING_FORMAT",
        "CAPQUOTE_LOG_LEVEL",
        "CAPQUOTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
