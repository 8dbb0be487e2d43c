use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::options::CostCategory;
use crate::domain::specification::LogoPosition;
use crate::domain::tier::TierKey;
use crate::errors::PricingError;

/// Where a price came from. `Fallback` marks the compiled-in tables used when
/// the pricing data source could not be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Live,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ChargeBasis {
    PerUnit { quantity: u32 },
    Flat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostComponent {
    pub category: CostCategory,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<LogoPosition>,
    pub unit_price: Decimal,
    pub basis: ChargeBasis,
    pub line_total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierKey>,
    pub source: PriceSource,
}

impl CostComponent {
    /// `unit_price × quantity`, exact. Fails instead of wrapping when the
    /// product leaves `Decimal` range.
    pub fn per_unit(
        category: CostCategory,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
        tier: TierKey,
        source: PriceSource,
    ) -> Result<Self, PricingError> {
        let name = name.into();
        let Some(line_total) = unit_price.checked_mul(Decimal::from(quantity)) else {
            return Err(PricingError::AmountOverflow { category, key: name });
        };
        Ok(Self {
            category,
            name,
            position: None,
            unit_price,
            basis: ChargeBasis::PerUnit { quantity },
            line_total,
            tier: Some(tier),
            source,
        })
    }

    pub fn flat(
        category: CostCategory,
        name: impl Into<String>,
        amount: Decimal,
        source: PriceSource,
    ) -> Self {
        Self {
            category,
            name: name.into(),
            position: None,
            unit_price: amount,
            basis: ChargeBasis::Flat,
            line_total: amount,
            tier: None,
            source,
        }
    }

    pub fn at_position(mut self, position: LogoPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.basis, ChargeBasis::Flat)
    }
}

/// A selected optional component that has no price at the resolved tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedComponent {
    pub category: CostCategory,
    pub name: String,
    pub reason: String,
}

/// Authoritative cost of a specification. Derived only; always recomputable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub quantity: u32,
    pub tier: TierKey,
    pub components: Vec<CostComponent>,
    pub category_totals: BTreeMap<CostCategory, Decimal>,
    #[serde(default)]
    pub omitted: Vec<OmittedComponent>,
    pub total_cost: Decimal,
    pub source: PriceSource,
}

impl CostBreakdown {
    pub fn category_total(&self, category: CostCategory) -> Decimal {
        self.category_totals.get(&category).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn components_in(&self, category: CostCategory) -> impl Iterator<Item = &CostComponent> {
        self.components.iter().filter(move |component| component.category == category)
    }

    /// Σ(per-unit line totals) + Σ(flat charges), recomputed from the lines.
    pub fn recomputed_total(&self) -> Decimal {
        self.components.iter().map(|component| component.line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ChargeBasis, CostComponent, PriceSource};
    use crate::domain::options::CostCategory;
    use crate::domain::tier::TierKey;
    use crate::errors::PricingError;

    #[test]
    fn per_unit_line_total_is_exact() {
        let line = CostComponent::per_unit(
            CostCategory::BlankCap,
            "6P AirFrame HSCS",
            Decimal::new(425, 2),
            288,
            TierKey(144),
            PriceSource::Live,
        )
        .expect("in range");
        assert_eq!(line.line_total, Decimal::new(122400, 2));
        assert_eq!(line.basis, ChargeBasis::PerUnit { quantity: 288 });
    }

    #[test]
    fn flat_charge_ignores_quantity() {
        let line = CostComponent::flat(
            CostCategory::MoldCharge,
            "Medium Mold Charge",
            Decimal::new(8000, 2),
            PriceSource::Live,
        );
        assert!(line.is_flat());
        assert_eq!(line.line_total, Decimal::new(8000, 2));
        assert_eq!(line.tier, None);
    }

    #[test]
    fn out_of_range_line_total_names_the_option() {
        let error = CostComponent::per_unit(
            CostCategory::BlankCap,
            "6P AirFrame HSCS",
            Decimal::MAX,
            2,
            TierKey(48),
            PriceSource::Live,
        )
        .expect_err("Decimal::MAX × 2 is out of range");
        assert_eq!(
            error,
            PricingError::AmountOverflow {
                category: CostCategory::BlankCap,
                key: "6P AirFrame HSCS".to_string(),
            }
        );
    }
}
