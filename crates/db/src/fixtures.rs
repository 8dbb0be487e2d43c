use std::collections::BTreeMap;

use capquote_core::pricing::fallback::fallback_tables;
use capquote_core::pricing::provider::{PriceTable, PriceTableSet, RawTierPrices};
use sqlx::{Sqlite, Transaction};
use tracing::info;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Tables in delete/insert order. Nothing references across tables at the
/// schema level, so the order only keeps seed output stable.
const SEEDED_TABLES: &[PriceTable] = &[
    PriceTable::PriceTiers,
    PriceTable::Products,
    PriceTable::Fabrics,
    PriceTable::MoldCharges,
    PriceTable::LogoMethods,
    PriceTable::Closures,
    PriceTable::Accessories,
    PriceTable::DeliveryMethods,
];

/// Writes a full [`PriceTableSet`] into the price tables, replacing what was
/// there. Loading the same set twice leaves the same rows behind.
pub struct PriceTableSeed;

impl PriceTableSeed {
    /// Seeds the demo catalog (the same tables the engine falls back to).
    pub async fn load_demo(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        Self::load(pool, &fallback_tables()).await
    }

    pub async fn load(pool: &DbPool, tables: &PriceTableSet) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        for table in SEEDED_TABLES {
            sqlx::query(&format!("DELETE FROM {}", table.as_str())).execute(&mut *tx).await?;
        }

        for row in &tables.price_tiers {
            sqlx::query(
                "INSERT INTO price_tier (tier_name, price_48, price_144, price_576, price_1152, price_2880, price_10000, price_20000)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.tier_name)
            .bind(&row.prices.price_48)
            .bind(&row.prices.price_144)
            .bind(&row.prices.price_576)
            .bind(&row.prices.price_1152)
            .bind(&row.prices.price_2880)
            .bind(&row.prices.price_10000)
            .bind(&row.prices.price_20000)
            .execute(&mut *tx)
            .await?;
        }

        for row in &tables.products {
            sqlx::query(
                "INSERT INTO product (name, panel_count, profile, bill_shape, closure_types, price_tier)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.name)
            .bind(&row.panel_count)
            .bind(&row.profile)
            .bind(&row.bill_shape)
            .bind(&row.closure_types)
            .bind(&row.price_tier)
            .execute(&mut *tx)
            .await?;
        }

        for row in &tables.fabrics {
            sqlx::query(
                "INSERT INTO fabric (name, cost_type, price_48, price_144, price_576, price_1152, price_2880, price_10000, price_20000)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.name)
            .bind(&row.cost_type)
            .bind(&row.prices.price_48)
            .bind(&row.prices.price_144)
            .bind(&row.prices.price_576)
            .bind(&row.prices.price_1152)
            .bind(&row.prices.price_2880)
            .bind(&row.prices.price_10000)
            .bind(&row.prices.price_20000)
            .execute(&mut *tx)
            .await?;
        }

        for row in &tables.mold_charges {
            sqlx::query("INSERT INTO mold_charge (name, size, charge) VALUES (?, ?, ?)")
                .bind(&row.name)
                .bind(&row.size)
                .bind(&row.charge)
                .execute(&mut *tx)
                .await?;
        }

        for row in &tables.logo_methods {
            sqlx::query(
                "INSERT INTO logo_method (name, application, size, mold_charge_type, price_48, price_144, price_576, price_1152, price_2880, price_10000, price_20000)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.name)
            .bind(&row.application)
            .bind(&row.size)
            .bind(&row.mold_charge_type)
            .bind(&row.prices.price_48)
            .bind(&row.prices.price_144)
            .bind(&row.prices.price_576)
            .bind(&row.prices.price_1152)
            .bind(&row.prices.price_2880)
            .bind(&row.prices.price_10000)
            .bind(&row.prices.price_20000)
            .execute(&mut *tx)
            .await?;
        }

        for row in &tables.closures {
            insert_named_prices(&mut tx, PriceTable::Closures, &row.name, &row.prices).await?;
        }
        for row in &tables.accessories {
            insert_named_prices(&mut tx, PriceTable::Accessories, &row.name, &row.prices).await?;
        }

        for row in &tables.delivery_methods {
            sqlx::query(
                "INSERT INTO delivery_method (name, delivery_days, price_48, price_144, price_576, price_1152, price_2880, price_10000, price_20000)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.name)
            .bind(&row.delivery_days)
            .bind(&row.prices.price_48)
            .bind(&row.prices.price_144)
            .bind(&row.prices.price_576)
            .bind(&row.prices.price_1152)
            .bind(&row.prices.price_2880)
            .bind(&row.prices.price_10000)
            .bind(&row.prices.price_20000)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let rows_seeded = expected_counts(tables);
        info!(
            event_name = "db.seed.price_tables",
            rows = rows_seeded.values().sum::<usize>(),
            "price tables seeded"
        );
        Ok(SeedResult { rows_seeded })
    }

    /// Checks every table holds exactly the rows `tables` would seed.
    pub async fn verify(
        pool: &DbPool,
        tables: &PriceTableSet,
    ) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (table, expected) in expected_counts(tables) {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {}", table.as_str()))
                .fetch_one(pool)
                .await?;
            checks.push((table, usize::try_from(count).ok() == Some(expected)));
        }

        let all_present = checks.iter().all(|(_, matches)| *matches);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn insert_named_prices(
    tx: &mut Transaction<'_, Sqlite>,
    table: PriceTable,
    name: &str,
    prices: &RawTierPrices,
) -> Result<(), RepositoryError> {
    sqlx::query(&format!(
        "INSERT INTO {} (name, price_48, price_144, price_576, price_1152, price_2880, price_10000, price_20000)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        table.as_str()
    ))
    .bind(name)
    .bind(&prices.price_48)
    .bind(&prices.price_144)
    .bind(&prices.price_576)
    .bind(&prices.price_1152)
    .bind(&prices.price_2880)
    .bind(&prices.price_10000)
    .bind(&prices.price_20000)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn expected_counts(tables: &PriceTableSet) -> BTreeMap<PriceTable, usize> {
    BTreeMap::from([
        (PriceTable::PriceTiers, tables.price_tiers.len()),
        (PriceTable::Products, tables.products.len()),
        (PriceTable::Fabrics, tables.fabrics.len()),
        (PriceTable::LogoMethods, tables.logo_methods.len()),
        (PriceTable::MoldCharges, tables.mold_charges.len()),
        (PriceTable::Closures, tables.closures.len()),
        (PriceTable::Accessories, tables.accessories.len()),
        (PriceTable::DeliveryMethods, tables.delivery_methods.len()),
    ])
}

#[derive(Debug)]
pub struct SeedResult {
    pub rows_seeded: BTreeMap<PriceTable, usize>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(PriceTable, bool)>,
}
