//! Typed, validated in-memory snapshot of every pricing table.
//!
//! Rows that fail validation are rejected one by one with an itemized
//! [`RowError`]; nothing is coerced to zero. When the data source itself is
//! unreachable the compiled-in fallback tables are used instead and every price
//! they produce is tagged [`PriceSource::Fallback`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::breakdown::PriceSource;
use crate::domain::options::{
    normalize_key, DeliveryMethod, LogoApplication, LogoMethod, LogoMethodKey, LogoSize,
    MoldCharge, PricedOption,
};
use crate::domain::product::{Product, ProductId};
use crate::domain::tier::{TierKey, TierPrices, STANDARD_BREAKPOINTS};
use crate::errors::PricingError;
use crate::pricing::fallback;
use crate::pricing::provider::{PriceTable, PriceTableProvider, PriceTableSet, RawTierPrices};
use crate::pricing::tiers::{TierPolicy, TierResolver};

const TOP_BREAKPOINT: u32 = 20000;

/// Largest unit price or flat charge a row may carry. Keeps every line total
/// and quote total far inside `Decimal` range for any `u32` quantity.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub table: PriceTable,
    /// Zero-based position of the row in what the provider returned.
    pub row: usize,
    pub name: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row {} (`{}`) field `{}`: {}",
            self.table, self.row, self.name, self.field, self.message
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogLoadReport {
    pub source: PriceSource,
    pub accepted: BTreeMap<PriceTable, usize>,
    pub rejected: Vec<RowError>,
    pub fallback_reason: Option<String>,
}

impl CatalogLoadReport {
    fn new(source: PriceSource) -> Self {
        Self { source, accepted: BTreeMap::new(), rejected: Vec::new(), fallback_reason: None }
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.fallback_reason.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogLoadOptions {
    pub allow_fallback: bool,
    /// Any rejected row fails the whole load.
    pub strict: bool,
}

impl Default for CatalogLoadOptions {
    fn default() -> Self {
        Self { allow_fallback: true, strict: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceCatalog {
    source: PriceSource,
    generation: u64,
    breakpoints: Vec<u32>,
    price_tiers: BTreeMap<String, PricedOption>,
    products: BTreeMap<ProductId, Product>,
    fabrics: BTreeMap<String, PricedOption>,
    logo_methods: BTreeMap<LogoMethodKey, LogoMethod>,
    mold_charges: BTreeMap<String, MoldCharge>,
    closures: BTreeMap<String, PricedOption>,
    accessories: BTreeMap<String, PricedOption>,
    delivery_methods: BTreeMap<String, DeliveryMethod>,
}

impl PriceCatalog {
    /// Reads every table from `provider` and validates it. A provider failure
    /// becomes [`PricingError::DataSourceUnavailable`], or a fallback catalog
    /// when `options.allow_fallback` is set.
    pub async fn load(
        provider: &dyn PriceTableProvider,
        options: CatalogLoadOptions,
    ) -> Result<(Self, CatalogLoadReport), PricingError> {
        match fetch_tables(provider).await {
            Ok(tables) => Self::from_tables(tables, PriceSource::Live, options.strict),
            Err(error) => {
                let unavailable = PricingError::DataSourceUnavailable {
                    table: error.table.to_string(),
                    reason: error.reason,
                };
                if !options.allow_fallback {
                    warn!(
                        event_name = "pricing.catalog.unavailable",
                        correlation_id = "catalog_load",
                        error = %unavailable,
                        "pricing data source unavailable and fallback is disabled"
                    );
                    return Err(unavailable);
                }

                warn!(
                    event_name = "pricing.catalog.fallback",
                    correlation_id = "catalog_load",
                    error = %unavailable,
                    "pricing data source unavailable; serving compiled-in fallback prices"
                );
                let (catalog, mut report) =
                    Self::from_tables(fallback::fallback_tables(), PriceSource::Fallback, false)?;
                report.fallback_reason = Some(unavailable.to_string());
                Ok((catalog, report))
            }
        }
    }

    /// Compiled-in tables only, tagged as fallback.
    pub fn fallback() -> Result<Self, PricingError> {
        Self::from_tables(fallback::fallback_tables(), PriceSource::Fallback, false)
            .map(|(catalog, _)| catalog)
    }

    pub fn from_tables(
        tables: PriceTableSet,
        source: PriceSource,
        strict: bool,
    ) -> Result<(Self, CatalogLoadReport), PricingError> {
        let mut report = CatalogLoadReport::new(source);
        let mut builder = CatalogBuilder::default();

        builder.add_price_tiers(&tables, &mut report.rejected);
        builder.add_products(&tables, &mut report.rejected);
        builder.add_fabrics(&tables, &mut report.rejected);
        builder.add_mold_charges(&tables, &mut report.rejected);
        builder.add_logo_methods(&tables, &mut report.rejected);
        builder.add_closures(&tables, &mut report.rejected);
        builder.add_accessories(&tables, &mut report.rejected);
        builder.add_delivery_methods(&tables, &mut report.rejected);

        for row_error in &report.rejected {
            warn!(
                event_name = "pricing.catalog.row_rejected",
                correlation_id = "catalog_load",
                table = %row_error.table,
                row = row_error.row,
                option = %row_error.name,
                field = %row_error.field,
                reason = %row_error.message,
                "price table row rejected"
            );
        }

        if strict && !report.rejected.is_empty() {
            let first = report.rejected[0].to_string();
            return Err(PricingError::TableValidation { count: report.rejected.len(), first });
        }

        let catalog = builder.finish(source);
        report.accepted = catalog.accepted_counts();

        info!(
            event_name = "pricing.catalog.loaded",
            correlation_id = "catalog_load",
            source = ?source,
            products = catalog.products.len(),
            logo_methods = catalog.logo_methods.len(),
            rejected = report.rejected.len(),
            "price catalog loaded"
        );

        Ok((catalog, report))
    }

    pub fn source(&self) -> PriceSource {
        self.source
    }

    /// Bumped on every swap into a running service; cached prices carry it so
    /// entries resolved against an older catalog are never served.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Breakpoints present in the loaded tables (20000 only when some row prices it).
    pub fn breakpoints(&self) -> &[u32] {
        &self.breakpoints
    }

    pub fn tier_resolver(&self, policy: TierPolicy) -> TierResolver {
        TierResolver::new(self.breakpoints.iter().copied(), policy)
    }

    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.get(&ProductId::from_name(name))
    }

    pub fn price_tier(&self, name: &str) -> Option<&PricedOption> {
        self.price_tiers.get(&normalize_key(name))
    }

    pub fn fabric(&self, name: &str) -> Option<&PricedOption> {
        self.fabrics.get(&normalize_key(name))
    }

    pub fn logo_method(&self, key: &LogoMethodKey) -> Option<&LogoMethod> {
        self.logo_methods.get(key)
    }

    pub fn mold_charge(&self, name: &str) -> Option<&MoldCharge> {
        self.mold_charges.get(&normalize_key(name))
    }

    pub fn closure(&self, name: &str) -> Option<&PricedOption> {
        self.closures.get(&normalize_key(name))
    }

    pub fn accessory(&self, name: &str) -> Option<&PricedOption> {
        self.accessories.get(&normalize_key(name))
    }

    pub fn delivery_method(&self, name: &str) -> Option<&DeliveryMethod> {
        self.delivery_methods.get(&normalize_key(name))
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn fabrics(&self) -> impl Iterator<Item = &PricedOption> {
        self.fabrics.values()
    }

    pub fn logo_methods(&self) -> impl Iterator<Item = &LogoMethod> {
        self.logo_methods.values()
    }

    pub fn closures(&self) -> impl Iterator<Item = &PricedOption> {
        self.closures.values()
    }

    pub fn accessories(&self) -> impl Iterator<Item = &PricedOption> {
        self.accessories.values()
    }

    pub fn delivery_methods(&self) -> impl Iterator<Item = &DeliveryMethod> {
        self.delivery_methods.values()
    }

    fn accepted_counts(&self) -> BTreeMap<PriceTable, usize> {
        BTreeMap::from([
            (PriceTable::PriceTiers, self.price_tiers.len()),
            (PriceTable::Products, self.products.len()),
            (PriceTable::Fabrics, self.fabrics.len()),
            (PriceTable::LogoMethods, self.logo_methods.len()),
            (PriceTable::MoldCharges, self.mold_charges.len()),
            (PriceTable::Closures, self.closures.len()),
            (PriceTable::Accessories, self.accessories.len()),
            (PriceTable::DeliveryMethods, self.delivery_methods.len()),
        ])
    }
}

async fn fetch_tables(
    provider: &dyn PriceTableProvider,
) -> Result<PriceTableSet, crate::pricing::provider::ProviderError> {
    Ok(PriceTableSet {
        price_tiers: provider.load_price_tiers().await?,
        products: provider.load_products().await?,
        fabrics: provider.load_fabrics().await?,
        logo_methods: provider.load_logo_methods().await?,
        mold_charges: provider.load_mold_charges().await?,
        closures: provider.load_closures().await?,
        accessories: provider.load_accessories().await?,
        delivery_methods: provider.load_delivery_methods().await?,
    })
}

#[derive(Default)]
struct CatalogBuilder {
    price_tiers: BTreeMap<String, PricedOption>,
    products: BTreeMap<ProductId, Product>,
    fabrics: BTreeMap<String, PricedOption>,
    logo_methods: BTreeMap<LogoMethodKey, LogoMethod>,
    mold_charges: BTreeMap<String, MoldCharge>,
    closures: BTreeMap<String, PricedOption>,
    accessories: BTreeMap<String, PricedOption>,
    delivery_methods: BTreeMap<String, DeliveryMethod>,
}

struct RowContext<'a> {
    table: PriceTable,
    row: usize,
    name: &'a str,
}

impl RowContext<'_> {
    fn error(&self, field: &str, message: impl Into<String>) -> RowError {
        RowError {
            table: self.table,
            row: self.row,
            name: self.name.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn required_name(&self) -> Result<String, RowError> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            return Err(self.error("name", "required field is blank"));
        }
        Ok(trimmed.to_string())
    }

    fn required<'v>(&self, field: &str, value: Option<&'v str>) -> Result<&'v str, RowError> {
        value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| self.error(field, "required field is missing"))
    }

    fn parse<T: FromStr>(&self, field: &str, value: Option<&str>) -> Result<T, RowError>
    where
        T::Err: fmt::Display,
    {
        let raw = self.required(field, value)?;
        raw.parse::<T>().map_err(|error| self.error(field, format!("`{raw}`: {error}")))
    }

    fn tier_prices(&self, raw: &RawTierPrices) -> Result<TierPrices, RowError> {
        let mut prices = TierPrices::new();
        for (breakpoint, cell) in raw.cells() {
            let field = format!("price_{breakpoint}");
            let Some(amount) = parse_price_cell(cell).map_err(|message| self.error(&field, message))?
            else {
                continue;
            };
            prices.insert(TierKey(breakpoint), amount);
        }

        if prices.is_empty() {
            return Err(self.error("prices", "row has no price at any tier"));
        }

        prices.check_non_increasing().map_err(|violation| {
            self.error(
                &format!("price_{}", violation.upper.breakpoint()),
                format!(
                    "price {} at {} is higher than {} at {}; prices must not increase with quantity",
                    violation.upper_price, violation.upper, violation.lower_price, violation.lower
                ),
            )
        })?;

        Ok(prices)
    }
}

/// `Ok(None)` for cells that mean "not offered at this tier".
fn parse_price_cell(cell: Option<&str>) -> Result<Option<Decimal>, String> {
    let Some(raw) = cell.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() || matches!(raw.to_ascii_lowercase().as_str(), "n/a" | "na" | "-") {
        return Ok(None);
    }

    let cleaned = raw.trim_start_matches('$').replace(',', "");
    let amount = Decimal::from_str(cleaned.trim())
        .map_err(|error| format!("`{raw}` is not a valid price: {error}"))?;
    if amount.is_sign_negative() {
        return Err(format!("`{raw}` is negative"));
    }
    if amount > MAX_PRICE {
        return Err(format!("`{raw}` exceeds the maximum price of {MAX_PRICE}"));
    }
    Ok(Some(amount))
}

fn insert_unique<K: Ord, V>(
    map: &mut BTreeMap<K, V>,
    key: K,
    value: V,
    context: &RowContext<'_>,
) -> Result<(), RowError> {
    if map.contains_key(&key) {
        return Err(context.error("name", "duplicate row for this option"));
    }
    map.insert(key, value);
    Ok(())
}

impl CatalogBuilder {
    fn add_price_tiers(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.price_tiers.iter().enumerate() {
            let context = RowContext { table: PriceTable::PriceTiers, row, name: &raw.tier_name };
            let result = (|| {
                let name = context.required_name()?;
                let prices = context.tier_prices(&raw.prices)?;
                insert_unique(
                    &mut self.price_tiers,
                    normalize_key(&name),
                    PricedOption { name, prices },
                    &context,
                )
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn add_products(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.products.iter().enumerate() {
            let context = RowContext { table: PriceTable::Products, row, name: &raw.name };
            let result = (|| {
                let name = context.required_name()?;
                let panel_count = context.parse::<u8>("panel_count", raw.panel_count.as_deref())?;
                let price_tier = context.required("price_tier", raw.price_tier.as_deref())?;
                if !self.price_tiers.contains_key(&normalize_key(price_tier)) {
                    return Err(context.error(
                        "price_tier",
                        format!("references unknown price tier `{price_tier}`"),
                    ));
                }
                let closure_types = raw
                    .closure_types
                    .as_deref()
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(ToString::to_string)
                    .collect();

                let product = Product {
                    id: ProductId::from_name(&name),
                    name,
                    panel_count,
                    profile: raw.profile.clone().unwrap_or_default().trim().to_string(),
                    bill_shape: raw.bill_shape.clone().unwrap_or_default().trim().to_string(),
                    closure_types,
                    price_tier: price_tier.to_string(),
                };
                insert_unique(&mut self.products, product.id.clone(), product, &context)
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn add_fabrics(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.fabrics.iter().enumerate() {
            let context = RowContext { table: PriceTable::Fabrics, row, name: &raw.name };
            let result = (|| {
                let name = context.required_name()?;
                let is_free = raw
                    .cost_type
                    .as_deref()
                    .map(|cost_type| cost_type.trim().eq_ignore_ascii_case("free"))
                    .unwrap_or(false);
                let no_cells = raw.prices.cells().iter().all(|(_, cell)| {
                    cell.map(str::trim).map(str::is_empty).unwrap_or(true)
                });
                let prices = if is_free && no_cells {
                    TierPrices::uniform(Decimal::ZERO)
                } else {
                    context.tier_prices(&raw.prices)?
                };
                insert_unique(
                    &mut self.fabrics,
                    normalize_key(&name),
                    PricedOption { name, prices },
                    &context,
                )
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn add_mold_charges(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.mold_charges.iter().enumerate() {
            let context = RowContext { table: PriceTable::MoldCharges, row, name: &raw.name };
            let result = (|| {
                let name = context.required_name()?;
                let size = context.parse::<LogoSize>("size", raw.size.as_deref())?;
                let charge = parse_price_cell(raw.charge.as_deref())
                    .map_err(|message| context.error("charge", message))?
                    .ok_or_else(|| context.error("charge", "required field is missing"))?;
                insert_unique(
                    &mut self.mold_charges,
                    normalize_key(&name),
                    MoldCharge { name, size, charge },
                    &context,
                )
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn add_logo_methods(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.logo_methods.iter().enumerate() {
            let context = RowContext { table: PriceTable::LogoMethods, row, name: &raw.name };
            let result = (|| {
                let name = context.required_name()?;
                let application =
                    context.parse::<LogoApplication>("application", raw.application.as_deref())?;
                let size = context.parse::<LogoSize>("size", raw.size.as_deref())?;
                let prices = context.tier_prices(&raw.prices)?;
                let mold_charge_type = raw
                    .mold_charge_type
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(ToString::to_string);
                if let Some(mold) = &mold_charge_type {
                    let charge = self.mold_charges.get(&normalize_key(mold)).ok_or_else(|| {
                        context.error(
                            "mold_charge_type",
                            format!("references unknown mold charge `{mold}`"),
                        )
                    })?;
                    if charge.size != size {
                        return Err(context.error(
                            "mold_charge_type",
                            format!(
                                "{size} logo references {} mold charge `{}`",
                                charge.size, charge.name
                            ),
                        ));
                    }
                }

                let method = LogoMethod { name, application, size, prices, mold_charge_type };
                insert_unique(&mut self.logo_methods, method.key(), method, &context)
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn add_closures(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.closures.iter().enumerate() {
            let context = RowContext { table: PriceTable::Closures, row, name: &raw.name };
            let result = (|| {
                let name = context.required_name()?;
                let prices = context.tier_prices(&raw.prices)?;
                insert_unique(
                    &mut self.closures,
                    normalize_key(&name),
                    PricedOption { name, prices },
                    &context,
                )
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn add_accessories(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.accessories.iter().enumerate() {
            let context = RowContext { table: PriceTable::Accessories, row, name: &raw.name };
            let result = (|| {
                let name = context.required_name()?;
                let prices = context.tier_prices(&raw.prices)?;
                insert_unique(
                    &mut self.accessories,
                    normalize_key(&name),
                    PricedOption { name, prices },
                    &context,
                )
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn add_delivery_methods(&mut self, tables: &PriceTableSet, rejected: &mut Vec<RowError>) {
        for (row, raw) in tables.delivery_methods.iter().enumerate() {
            let context = RowContext { table: PriceTable::DeliveryMethods, row, name: &raw.name };
            let result = (|| {
                let name = context.required_name()?;
                let prices = context.tier_prices(&raw.prices)?;
                let delivery_days = raw
                    .delivery_days
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(ToString::to_string);
                insert_unique(
                    &mut self.delivery_methods,
                    normalize_key(&name),
                    DeliveryMethod { option: PricedOption { name, prices }, delivery_days },
                    &context,
                )
            })();
            if let Err(error) = result {
                rejected.push(error);
            }
        }
    }

    fn finish(self, source: PriceSource) -> PriceCatalog {
        let top = TierKey(TOP_BREAKPOINT);
        let priced_at_top = self.price_tiers.values().any(|option| option.prices.has_tier(top))
            || self.fabrics.values().any(|option| option.prices.has_tier(top))
            || self.logo_methods.values().any(|method| method.prices.has_tier(top))
            || self.closures.values().any(|option| option.prices.has_tier(top))
            || self.accessories.values().any(|option| option.prices.has_tier(top))
            || self.delivery_methods.values().any(|method| method.option.prices.has_tier(top));

        let breakpoints = STANDARD_BREAKPOINTS
            .iter()
            .copied()
            .filter(|bp| *bp != TOP_BREAKPOINT || priced_at_top)
            .collect();

        PriceCatalog {
            source,
            generation: 0,
            breakpoints,
            price_tiers: self.price_tiers,
            products: self.products,
            fabrics: self.fabrics,
            logo_methods: self.logo_methods,
            mold_charges: self.mold_charges,
            closures: self.closures,
            accessories: self.accessories,
            delivery_methods: self.delivery_methods,
        }
    }
}
