use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::tiers::TierPolicy;
use crate::pricing::{PricingSettings, DEFAULT_PREWARM_QUANTITIES};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pricing: PricingConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PricingConfig {
    pub tier_policy: TierPolicy,
    pub allow_fallback: bool,
    pub strict_validation: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub prewarm_on_start: bool,
    pub prewarm_quantities: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub tier_policy: Option<TierPolicy>,
    pub cache_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://capquote.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            pricing: PricingConfig {
                tier_policy: TierPolicy::UpperInclusive,
                allow_fallback: true,
                strict_validation: false,
            },
            cache: CacheConfig {
                enabled: true,
                ttl_secs: 300,
                prewarm_on_start: true,
                prewarm_quantities: DEFAULT_PREWARM_QUANTITIES.to_vec(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("capquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Pricing-engine view of the `pricing` and `cache` sections.
    pub fn pricing_settings(&self) -> PricingSettings {
        PricingSettings {
            tier_policy: self.pricing.tier_policy,
            allow_fallback: self.pricing.allow_fallback,
            strict_validation: self.pricing.strict_validation,
            cache_enabled: self.cache.enabled,
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            prewarm_quantities: self.cache.prewarm_quantities.clone(),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(tier_policy) = pricing.tier_policy {
                self.pricing.tier_policy = tier_policy;
            }
            if let Some(allow_fallback) = pricing.allow_fallback {
                self.pricing.allow_fallback = allow_fallback;
            }
            if let Some(strict_validation) = pricing.strict_validation {
                self.pricing.strict_validation = strict_validation;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(enabled) = cache.enabled {
                self.cache.enabled = enabled;
            }
            if let Some(ttl_secs) = cache.ttl_secs {
                self.cache.ttl_secs = ttl_secs;
            }
            if let Some(prewarm_on_start) = cache.prewarm_on_start {
                self.cache.prewarm_on_start = prewarm_on_start;
            }
            if let Some(prewarm_quantities) = cache.prewarm_quantities {
                self.cache.prewarm_quantities = prewarm_quantities;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = read_env("CAPQUOTE_DATABASE_URL") {
            self.database.url = url;
        }
        set_from_env(&mut self.database.max_connections, "CAPQUOTE_DATABASE_MAX_CONNECTIONS")?;
        set_from_env(&mut self.database.timeout_secs, "CAPQUOTE_DATABASE_TIMEOUT_SECS")?;

        if let Some(bind_address) = read_env("CAPQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        set_from_env(&mut self.server.port, "CAPQUOTE_SERVER_PORT")?;
        set_from_env(
            &mut self.server.graceful_shutdown_secs,
            "CAPQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        )?;

        set_from_env(&mut self.pricing.tier_policy, "CAPQUOTE_PRICING_TIER_POLICY")?;
        set_from_env(&mut self.pricing.allow_fallback, "CAPQUOTE_PRICING_ALLOW_FALLBACK")?;
        set_from_env(&mut self.pricing.strict_validation, "CAPQUOTE_PRICING_STRICT_VALIDATION")?;

        set_from_env(&mut self.cache.enabled, "CAPQUOTE_CACHE_ENABLED")?;
        set_from_env(&mut self.cache.ttl_secs, "CAPQUOTE_CACHE_TTL_SECS")?;
        set_from_env(&mut self.cache.prewarm_on_start, "CAPQUOTE_CACHE_PREWARM_ON_START")?;
        if let Some(list) = read_env("CAPQUOTE_CACHE_PREWARM_QUANTITIES") {
            self.cache.prewarm_quantities = list
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| parse_env_value("CAPQUOTE_CACHE_PREWARM_QUANTITIES", item))
                .collect::<Result<_, _>>()?;
        }

        // The short LOG_* names are accepted as aliases.
        if let Some(level) =
            read_env("CAPQUOTE_LOGGING_LEVEL").or_else(|| read_env("CAPQUOTE_LOG_LEVEL"))
        {
            self.logging.level = level;
        }
        if let Some(format) =
            read_env("CAPQUOTE_LOGGING_FORMAT").or_else(|| read_env("CAPQUOTE_LOG_FORMAT"))
        {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(tier_policy) = overrides.tier_policy {
            self.pricing.tier_policy = tier_policy;
        }
        if let Some(cache_enabled) = overrides.cache_enabled {
            self.cache.enabled = cache_enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_cache(&self.cache)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("capquote.toml"), PathBuf::from("config/capquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.enabled && (cache.ttl_secs == 0 || cache.ttl_secs > 86_400) {
        return Err(ConfigError::Validation(
            "cache.ttl_secs must be in range 1..=86400 when the cache is enabled".to_string(),
        ));
    }

    if cache.prewarm_quantities.iter().any(|quantity| *quantity == 0) {
        return Err(ConfigError::Validation(
            "cache.prewarm_quantities must only contain positive quantities".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Overwrites `target` when `key` is set; an unparseable value names the key.
fn set_from_env<T: FromStr>(target: &mut T, key: &str) -> Result<(), ConfigError> {
    if let Some(value) = read_env(key) {
        *target = parse_env_value(key, &value)?;
    }
    Ok(())
}

fn parse_env_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    pricing: Option<PricingPatch>,
    cache: Option<CachePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    tier_policy: Option<TierPolicy>,
    allow_fallback: Option<bool>,
    strict_validation: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    enabled: Option<bool>,
    ttl_secs: Option<u64>,
    prewarm_on_start: Option<bool>,
    prewarm_quantities: Option<Vec<u32>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
