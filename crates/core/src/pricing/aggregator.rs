use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::breakdown::{CostBreakdown, CostComponent, OmittedComponent, PriceSource};
use crate::domain::options::CostCategory;
use crate::domain::tier::TierKey;
use crate::errors::PricingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    Mandatory,
    Optional,
}

/// One selected line, resolved or not. The aggregator decides what a failure
/// means based on `requirement`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentOutcome {
    pub category: CostCategory,
    pub name: String,
    pub requirement: Requirement,
    pub result: Result<CostComponent, PricingError>,
}

impl ComponentOutcome {
    pub fn mandatory(
        category: CostCategory,
        name: impl Into<String>,
        result: Result<CostComponent, PricingError>,
    ) -> Self {
        Self { category, name: name.into(), requirement: Requirement::Mandatory, result }
    }

    pub fn optional(
        category: CostCategory,
        name: impl Into<String>,
        result: Result<CostComponent, PricingError>,
    ) -> Self {
        Self { category, name: name.into(), requirement: Requirement::Optional, result }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CostAggregator;

impl CostAggregator {
    /// Builds the breakdown from lines in presentation order.
    ///
    /// A mandatory failure aborts with [`PricingError::MandatoryComponentMissing`].
    /// An optional line with no price at the tier is listed under `omitted`;
    /// any other optional failure is returned unchanged.
    pub fn aggregate(
        &self,
        quantity: u32,
        tier: TierKey,
        catalog_source: PriceSource,
        outcomes: Vec<ComponentOutcome>,
    ) -> Result<CostBreakdown, PricingError> {
        let mut components = Vec::with_capacity(outcomes.len());
        let mut omitted = Vec::new();

        for outcome in outcomes {
            match (outcome.result, outcome.requirement) {
                (Ok(component), _) => components.push(component),
                (Err(error), Requirement::Mandatory) => {
                    return Err(PricingError::MandatoryComponentMissing {
                        product: outcome.name,
                        reason: error.to_string(),
                    });
                }
                (Err(error @ PricingError::PriceNotApplicable { .. }), Requirement::Optional) => {
                    warn!(
                        event_name = "pricing.component.omitted",
                        correlation_id = "quote_calculation",
                        category = %outcome.category,
                        option = %outcome.name,
                        tier = %tier,
                        "optional component has no price at this tier and was omitted"
                    );
                    omitted.push(OmittedComponent {
                        category: outcome.category,
                        name: outcome.name,
                        reason: error.to_string(),
                    });
                }
                (Err(error), Requirement::Optional) => return Err(error),
            }
        }

        let mut category_totals: BTreeMap<CostCategory, Decimal> =
            CostCategory::ALL.iter().map(|category| (*category, Decimal::ZERO)).collect();
        let mut total_cost = Decimal::ZERO;
        for component in &components {
            let overflow = || PricingError::AmountOverflow {
                category: component.category,
                key: component.name.clone(),
            };
            let subtotal = category_totals.entry(component.category).or_insert(Decimal::ZERO);
            *subtotal = subtotal.checked_add(component.line_total).ok_or_else(overflow)?;
            total_cost = total_cost.checked_add(component.line_total).ok_or_else(overflow)?;
        }

        let source = if catalog_source == PriceSource::Fallback
            || components.iter().any(|component| component.source == PriceSource::Fallback)
        {
            PriceSource::Fallback
        } else {
            PriceSource::Live
        };

        Ok(CostBreakdown { quantity, tier, components, category_totals, omitted, total_cost, source })
    }
}
