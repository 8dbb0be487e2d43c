use std::sync::Arc;

use capquote_core::conversation::{DeltaOutcome, QuoteStateManager};
use capquote_core::domain::breakdown::PriceSource;
use capquote_core::domain::conversation::ConversationId;
use capquote_core::domain::specification::{PartialSpecification, QuoteSpecification};
use capquote_core::pricing::fallback::fallback_tables;
use capquote_core::pricing::tiers::TierPolicy;
use capquote_core::pricing::{PricingService, PricingSettings};
use capquote_db::{
    connect, migrations, DbPool, PriceTableSeed, SqlPriceTableProvider, SqlQuoteStateStore,
};
use rust_decimal::Decimal;

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn seeded_pool() -> ContractResult<DbPool> {
    let pool = connect("sqlite::memory:").await.map_err(|error| error.to_string())?;
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;
    PriceTableSeed::load_demo(&pool).await.map_err(|error| error.to_string())?;
    Ok(pool)
}

fn lower_inclusive() -> PricingSettings {
    PricingSettings { tier_policy: TierPolicy::LowerInclusive, ..PricingSettings::default() }
}

fn decimal(raw: &str) -> ContractResult<Decimal> {
    raw.parse::<Decimal>().map_err(|error| error.to_string())
}

#[tokio::test]
async fn seeded_database_prices_the_worked_example() -> ContractResult {
    let pool = seeded_pool().await?;
    let provider = SqlPriceTableProvider::new(pool);

    let (service, report) = PricingService::load(&provider, lower_inclusive())
        .await
        .map_err(|error| error.to_string())?;
    require!(report.is_clean(), "seeded tables should load without rejections");
    require_eq!(service.source(), PriceSource::Live);

    let mut specification = QuoteSpecification::new("6P AirFrame HSCS", 288);
    specification.fabrics.push("Acrylic".to_string());
    let breakdown = service.calculate_quote(&specification).map_err(|error| error.to_string())?;

    require_eq!(breakdown.tier.breakpoint(), 144);
    require_eq!(breakdown.total_cost, decimal("1512.00")?);
    require_eq!(breakdown.source, PriceSource::Live);
    Ok(())
}

#[tokio::test]
async fn sql_provider_serves_what_the_seed_wrote() -> ContractResult {
    let pool = seeded_pool().await?;
    let verification = PriceTableSeed::verify(&pool, &fallback_tables())
        .await
        .map_err(|error| error.to_string())?;
    require!(verification.all_present, "seed verification failed: {:?}", verification.checks);
    Ok(())
}

#[tokio::test]
async fn conversation_state_survives_a_delta_through_sqlite() -> ContractResult {
    let pool = seeded_pool().await?;
    let provider = SqlPriceTableProvider::new(pool.clone());
    let (service, _) = PricingService::load(&provider, lower_inclusive())
        .await
        .map_err(|error| error.to_string())?;
    let manager =
        QuoteStateManager::new(Arc::new(service), Arc::new(SqlQuoteStateStore::new(pool)));
    let conversation = ConversationId::from("conv-contract");

    let mut specification = QuoteSpecification::new("6P AirFrame HSCS", 288);
    specification.fabrics.push("Acrylic".to_string());
    let first = manager
        .calculate_quote(&conversation, specification)
        .await
        .map_err(|error| error.to_string())?;
    require_eq!(first.version, 1);

    let delta: PartialSpecification =
        serde_json::from_str(r#"{"quantity": 3000}"#).map_err(|error| error.to_string())?;
    let outcome =
        manager.apply_delta(&conversation, &delta).await.map_err(|error| error.to_string())?;
    let DeltaOutcome::Applied(updated) = outcome else {
        return Err("quantity-only delta should apply".to_string());
    };

    require_eq!(updated.version, 2);
    require_eq!(updated.specification.fabrics, vec!["Acrylic".to_string()]);
    require_eq!(updated.breakdown.tier.breakpoint(), 2880);

    let stored = manager
        .current(&conversation)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "state should be persisted".to_string())?;
    require_eq!(stored, updated);
    Ok(())
}
