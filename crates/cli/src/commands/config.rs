use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use capquote_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let quantities = config
        .cache
        .prewarm_quantities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let fields: Vec<(&str, String, &[&str])> = vec![
        ("database.url", config.database.url.clone(), &["CAPQUOTE_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CAPQUOTE_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CAPQUOTE_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["CAPQUOTE_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["CAPQUOTE_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CAPQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "pricing.tier_policy",
            config_name(&config.pricing.tier_policy),
            &["CAPQUOTE_PRICING_TIER_POLICY"],
        ),
        (
            "pricing.allow_fallback",
            config.pricing.allow_fallback.to_string(),
            &["CAPQUOTE_PRICING_ALLOW_FALLBACK"],
        ),
        (
            "pricing.strict_validation",
            config.pricing.strict_validation.to_string(),
            &["CAPQUOTE_PRICING_STRICT_VALIDATION"],
        ),
        ("cache.enabled", config.cache.enabled.to_string(), &["CAPQUOTE_CACHE_ENABLED"]),
        ("cache.ttl_secs", config.cache.ttl_secs.to_string(), &["CAPQUOTE_CACHE_TTL_SECS"]),
        (
            "cache.prewarm_on_start",
            config.cache.prewarm_on_start.to_string(),
            &["CAPQUOTE_CACHE_PREWARM_ON_START"],
        ),
        ("cache.prewarm_quantities", quantities, &["CAPQUOTE_CACHE_PREWARM_QUANTITIES"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["CAPQUOTE_LOGGING_LEVEL", "CAPQUOTE_LOG_LEVEL"],
        ),
        (
            "logging.format",
            config_name(&config.logging.format),
            &["CAPQUOTE_LOGGING_FORMAT", "CAPQUOTE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }
    lines.join("\n")
}

/// Enum values as they are spelled in the config file.
fn config_name(value: &impl Serialize) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        _ => "unknown".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("capquote.toml"), PathBuf::from("config/capquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
