use async_trait::async_trait;
use capquote_core::pricing::provider::{
    AccessoryRow, ClosureRow, DeliveryMethodRow, FabricRow, LogoMethodRow, MoldChargeRow,
    PriceTable, PriceTableProvider, PriceTierRow, ProductRow, ProviderError, RawTierPrices,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::DbPool;

const PRICE_COLUMNS: &str =
    "price_48, price_144, price_576, price_1152, price_2880, price_10000, price_20000";

/// Reads the price tables as stored. Cells stay text; validation happens when
/// the catalog is built from them.
pub struct SqlPriceTableProvider {
    pool: DbPool,
}

impl SqlPriceTableProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, table: PriceTable, sql: &str) -> Result<Vec<SqliteRow>, ProviderError> {
        sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| ProviderError::new(table, error.to_string()))
    }
}

fn decode<T>(
    table: PriceTable,
    rows: Vec<SqliteRow>,
    map: impl Fn(&SqliteRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, ProviderError> {
    rows.iter()
        .map(|row| map(row).map_err(|error| ProviderError::new(table, error.to_string())))
        .collect()
}

fn raw_prices(row: &SqliteRow) -> Result<RawTierPrices, sqlx::Error> {
    Ok(RawTierPrices {
        price_48: row.try_get("price_48")?,
        price_144: row.try_get("price_144")?,
        price_576: row.try_get("price_576")?,
        price_1152: row.try_get("price_1152")?,
        price_2880: row.try_get("price_2880")?,
        price_10000: row.try_get("price_10000")?,
        price_20000: row.try_get("price_20000")?,
    })
}

#[async_trait]
impl PriceTableProvider for SqlPriceTableProvider {
    async fn load_price_tiers(&self) -> Result<Vec<PriceTierRow>, ProviderError> {
        let table = PriceTable::PriceTiers;
        let sql = format!("SELECT tier_name, {PRICE_COLUMNS} FROM price_tier ORDER BY id");
        let rows = self.fetch(table, &sql).await?;
        decode(table, rows, |row| {
            Ok(PriceTierRow { tier_name: row.try_get("tier_name")?, prices: raw_prices(row)? })
        })
    }

    async fn load_products(&self) -> Result<Vec<ProductRow>, ProviderError> {
        let table = PriceTable::Products;
        let rows = self
            .fetch(
                table,
                "SELECT name, panel_count, profile, bill_shape, closure_types, price_tier
                 FROM product ORDER BY id",
            )
            .await?;
        decode(table, rows, |row| {
            Ok(ProductRow {
                name: row.try_get("name")?,
                panel_count: row.try_get("panel_count")?,
                profile: row.try_get("profile")?,
                bill_shape: row.try_get("bill_shape")?,
                closure_types: row.try_get("closure_types")?,
                price_tier: row.try_get("price_tier")?,
            })
        })
    }

    async fn load_fabrics(&self) -> Result<Vec<FabricRow>, ProviderError> {
        let table = PriceTable::Fabrics;
        let sql = format!("SELECT name, cost_type, {PRICE_COLUMNS} FROM fabric ORDER BY id");
        let rows = self.fetch(table, &sql).await?;
        decode(table, rows, |row| {
            Ok(FabricRow {
                name: row.try_get("name")?,
                cost_type: row.try_get("cost_type")?,
                prices: raw_prices(row)?,
            })
        })
    }

    async fn load_logo_methods(&self) -> Result<Vec<LogoMethodRow>, ProviderError> {
        let table = PriceTable::LogoMethods;
        let sql = format!(
            "SELECT name, application, size, mold_charge_type, {PRICE_COLUMNS}
             FROM logo_method ORDER BY id"
        );
        let rows = self.fetch(table, &sql).await?;
        decode(table, rows, |row| {
            Ok(LogoMethodRow {
                name: row.try_get("name")?,
                application: row.try_get("application")?,
                size: row.try_get("size")?,
                prices: raw_prices(row)?,
                mold_charge_type: row.try_get("mold_charge_type")?,
            })
        })
    }

    async fn load_mold_charges(&self) -> Result<Vec<MoldChargeRow>, ProviderError> {
        let table = PriceTable::MoldCharges;
        let rows = self.fetch(table, "SELECT name, size, charge FROM mold_charge ORDER BY id").await?;
        decode(table, rows, |row| {
            Ok(MoldChargeRow {
                name: row.try_get("name")?,
                size: row.try_get("size")?,
                charge: row.try_get("charge")?,
            })
        })
    }

    async fn load_closures(&self) -> Result<Vec<ClosureRow>, ProviderError> {
        let table = PriceTable::Closures;
        let sql = format!("SELECT name, {PRICE_COLUMNS} FROM closure ORDER BY id");
        let rows = self.fetch(table, &sql).await?;
        decode(table, rows, |row| {
            Ok(ClosureRow { name: row.try_get("name")?, prices: raw_prices(row)? })
        })
    }

    async fn load_accessories(&self) -> Result<Vec<AccessoryRow>, ProviderError> {
        let table = PriceTable::Accessories;
        let sql = format!("SELECT name, {PRICE_COLUMNS} FROM accessory ORDER BY id");
        let rows = self.fetch(table, &sql).await?;
        decode(table, rows, |row| {
            Ok(AccessoryRow { name: row.try_get("name")?, prices: raw_prices(row)? })
        })
    }

    async fn load_delivery_methods(&self) -> Result<Vec<DeliveryMethodRow>, ProviderError> {
        let table = PriceTable::DeliveryMethods;
        let sql = format!(
            "SELECT name, delivery_days, {PRICE_COLUMNS} FROM delivery_method ORDER BY id"
        );
        let rows = self.fetch(table, &sql).await?;
        decode(table, rows, |row| {
            Ok(DeliveryMethodRow {
                name: row.try_get("name")?,
                delivery_days: row.try_get("delivery_days")?,
                prices: raw_prices(row)?,
            })
        })
    }
}
