//! Contract for the external pricing data source.
//!
//! Rows arrive as the source stores them (text cells), and are only turned
//! into typed prices by [`crate::pricing::catalog::PriceCatalog::load`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::tier::STANDARD_BREAKPOINTS;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTable {
    PriceTiers,
    Products,
    Fabrics,
    LogoMethods,
    MoldCharges,
    Closures,
    Accessories,
    DeliveryMethods,
}

impl PriceTable {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceTable::PriceTiers => "price_tier",
            PriceTable::Products => "product",
            PriceTable::Fabrics => "fabric",
            PriceTable::LogoMethods => "logo_method",
            PriceTable::MoldCharges => "mold_charge",
            PriceTable::Closures => "closure",
            PriceTable::Accessories => "accessory",
            PriceTable::DeliveryMethods => "delivery_method",
        }
    }
}

impl fmt::Display for PriceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("could not load `{table}`: {reason}")]
pub struct ProviderError {
    pub table: PriceTable,
    pub reason: String,
}

impl ProviderError {
    pub fn new(table: PriceTable, reason: impl Into<String>) -> Self {
        Self { table, reason: reason.into() }
    }
}

/// One text cell per standard breakpoint, as stored by the source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTierPrices {
    #[serde(default)]
    pub price_48: Option<String>,
    #[serde(default)]
    pub price_144: Option<String>,
    #[serde(default)]
    pub price_576: Option<String>,
    #[serde(default)]
    pub price_1152: Option<String>,
    #[serde(default)]
    pub price_2880: Option<String>,
    #[serde(default)]
    pub price_10000: Option<String>,
    #[serde(default)]
    pub price_20000: Option<String>,
}

impl RawTierPrices {
    /// Builds a row from cells in breakpoint order; extra cells are ignored and
    /// missing trailing cells stay absent.
    pub fn from_cells(cells: &[&str]) -> Self {
        let cell = |index: usize| cells.get(index).map(|value| value.to_string());
        Self {
            price_48: cell(0),
            price_144: cell(1),
            price_576: cell(2),
            price_1152: cell(3),
            price_2880: cell(4),
            price_10000: cell(5),
            price_20000: cell(6),
        }
    }

    pub fn cells(&self) -> [(u32, Option<&str>); 7] {
        let [b48, b144, b576, b1152, b2880, b10000, b20000] = STANDARD_BREAKPOINTS;
        [
            (b48, self.price_48.as_deref()),
            (b144, self.price_144.as_deref()),
            (b576, self.price_576.as_deref()),
            (b1152, self.price_1152.as_deref()),
            (b2880, self.price_2880.as_deref()),
            (b10000, self.price_10000.as_deref()),
            (b20000, self.price_20000.as_deref()),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTierRow {
    pub tier_name: String,
    #[serde(flatten)]
    pub prices: RawTierPrices,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    pub name: String,
    #[serde(default)]
    pub panel_count: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub bill_shape: Option<String>,
    /// Comma-separated closure names.
    #[serde(default)]
    pub closure_types: Option<String>,
    #[serde(default)]
    pub price_tier: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricRow {
    pub name: String,
    #[serde(default)]
    pub cost_type: Option<String>,
    #[serde(flatten)]
    pub prices: RawTierPrices,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoMethodRow {
    pub name: String,
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(flatten)]
    pub prices: RawTierPrices,
    #[serde(default)]
    pub mold_charge_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoldChargeRow {
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub charge: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRow {
    pub name: String,
    #[serde(flatten)]
    pub prices: RawTierPrices,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryRow {
    pub name: String,
    #[serde(flatten)]
    pub prices: RawTierPrices,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMethodRow {
    pub name: String,
    #[serde(default)]
    pub delivery_days: Option<String>,
    #[serde(flatten)]
    pub prices: RawTierPrices,
}

/// Every pricing table in row form. Used for in-memory providers, seeds and
/// the compiled-in fallback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTableSet {
    #[serde(default)]
    pub price_tiers: Vec<PriceTierRow>,
    #[serde(default)]
    pub products: Vec<ProductRow>,
    #[serde(default)]
    pub fabrics: Vec<FabricRow>,
    #[serde(default)]
    pub logo_methods: Vec<LogoMethodRow>,
    #[serde(default)]
    pub mold_charges: Vec<MoldChargeRow>,
    #[serde(default)]
    pub closures: Vec<ClosureRow>,
    #[serde(default)]
    pub accessories: Vec<AccessoryRow>,
    #[serde(default)]
    pub delivery_methods: Vec<DeliveryMethodRow>,
}

/// Read-only access to the pricing tables. Each call may be a network round
/// trip; implementations should fail fast instead of retrying.
#[async_trait]
pub trait PriceTableProvider: Send + Sync {
    async fn load_price_tiers(&self) -> Result<Vec<PriceTierRow>, ProviderError>;
    async fn load_products(&self) -> Result<Vec<ProductRow>, ProviderError>;
    async fn load_fabrics(&self) -> Result<Vec<FabricRow>, ProviderError>;
    async fn load_logo_methods(&self) -> Result<Vec<LogoMethodRow>, ProviderError>;
    async fn load_mold_charges(&self) -> Result<Vec<MoldChargeRow>, ProviderError>;
    async fn load_closures(&self) -> Result<Vec<ClosureRow>, ProviderError>;
    async fn load_accessories(&self) -> Result<Vec<AccessoryRow>, ProviderError>;
    async fn load_delivery_methods(&self) -> Result<Vec<DeliveryMethodRow>, ProviderError>;
}

/// Serves a fixed [`PriceTableSet`] from memory.
#[derive(Clone, Debug, Default)]
pub struct StaticPriceTableProvider {
    tables: PriceTableSet,
}

impl StaticPriceTableProvider {
    pub fn new(tables: PriceTableSet) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &PriceTableSet {
        &self.tables
    }
}

#[async_trait]
impl PriceTableProvider for StaticPriceTableProvider {
    async fn load_price_tiers(&self) -> Result<Vec<PriceTierRow>, ProviderError> {
        Ok(self.tables.price_tiers.clone())
    }

    async fn load_products(&self) -> Result<Vec<ProductRow>, ProviderError> {
        Ok(self.tables.products.clone())
    }

    async fn load_fabrics(&self) -> Result<Vec<FabricRow>, ProviderError> {
        Ok(self.tables.fabrics.clone())
    }

    async fn load_logo_methods(&self) -> Result<Vec<LogoMethodRow>, ProviderError> {
        Ok(self.tables.logo_methods.clone())
    }

    async fn load_mold_charges(&self) -> Result<Vec<MoldChargeRow>, ProviderError> {
        Ok(self.tables.mold_charges.clone())
    }

    async fn load_closures(&self) -> Result<Vec<ClosureRow>, ProviderError> {
        Ok(self.tables.closures.clone())
    }

    async fn load_accessories(&self) -> Result<Vec<AccessoryRow>, ProviderError> {
        Ok(self.tables.accessories.clone())
    }

    async fn load_delivery_methods(&self) -> Result<Vec<DeliveryMethodRow>, ProviderError> {
        Ok(self.tables.delivery_methods.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{LogoMethodRow, RawTierPrices};

    #[test]
    fn rows_deserialize_from_flat_columns() {
        let row: LogoMethodRow = serde_json::from_value(json!({
            "name": "Rubber",
            "application": "Patch",
            "size": "Medium",
            "price_48": "2.50",
            "price_144": "2.25",
            "mold_charge_type": "Medium Mold Charge"
        }))
        .expect("flat row should deserialize");

        assert_eq!(row.prices.price_48.as_deref(), Some("2.50"));
        assert_eq!(row.prices.price_576, None);
        assert_eq!(row.mold_charge_type.as_deref(), Some("Medium Mold Charge"));
    }

    #[test]
    fn cells_follow_breakpoint_order() {
        let prices = RawTierPrices::from_cells(&["5.00", "4.25"]);
        let cells = prices.cells();
        assert_eq!(cells[0], (48, Some("5.00")));
        assert_eq!(cells[1], (144, Some("4.25")));
        assert_eq!(cells[6], (20000, None));
    }
}
