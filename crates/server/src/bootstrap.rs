use std::sync::Arc;

use capquote_core::config::{AppConfig, ConfigError, LoadOptions};
use capquote_core::conversation::QuoteStateManager;
use capquote_core::errors::PricingError;
use capquote_core::pricing::provider::PriceTableProvider;
use capquote_core::pricing::PricingService;
use capquote_db::{connect_with_config, migrations, DbPool, SqlPriceTableProvider, SqlQuoteStateStore};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub provider: Arc<dyn PriceTableProvider>,
    pub pricing: Arc<PricingService>,
    pub quotes: Arc<QuoteStateManager>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("price catalog could not be loaded: {0}")]
    Pricing(#[source] PricingError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let provider: Arc<dyn PriceTableProvider> =
        Arc::new(SqlPriceTableProvider::new(db_pool.clone()));
    let (pricing, report) = PricingService::load(provider.as_ref(), config.pricing_settings())
        .await
        .map_err(BootstrapError::Pricing)?;
    let pricing = Arc::new(pricing);
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        source = ?report.source,
        rejected = report.rejected.len(),
        "price catalog loaded"
    );
    if pricing.catalog().products().next().is_none() {
        warn!(
            event_name = "system.bootstrap.catalog_empty",
            correlation_id = "bootstrap",
            "price catalog has no products; run `capquote seed` or load the price tables"
        );
    }

    if config.cache.prewarm_on_start {
        // Detached: the server accepts requests while the cache fills.
        drop(pricing.spawn_prewarm(config.cache.prewarm_quantities.clone()));
    }

    let store = Arc::new(SqlQuoteStateStore::new(db_pool.clone()));
    let quotes = Arc::new(QuoteStateManager::new(Arc::clone(&pricing), store));

    Ok(Application { config, db_pool, provider, pricing, quotes })
}

#[cfg(test)]
mod tests {
    use capquote_core::config::{ConfigOverrides, LoadOptions};
    use capquote_core::domain::breakdown::PriceSource;
    use capquote_db::PriceTableSeed;

    use crate::bootstrap::bootstrap;

    fn in_memory() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                cache_enabled: Some(false),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_database_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://localhost/capquote".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("database.url"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_loads_a_live_catalog() {
        let app = bootstrap(in_memory()).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('price_tier', 'product', 'conversation_quote_state')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected pricing tables to be available after bootstrap");
        assert_eq!(table_count, 3);
        assert_eq!(app.pricing.source(), PriceSource::Live);

        PriceTableSeed::load_demo(&app.db_pool).await.expect("seed");
        let report = app.pricing.refresh(app.provider.as_ref()).await.expect("refresh");
        assert!(report.is_clean());
        assert!(app.pricing.catalog().products().next().is_some());
    }
}
