use std::collections::BTreeMap;

use crate::domain::breakdown::CostComponent;
use crate::domain::options::{CostCategory, LogoMethodKey};
use crate::domain::specification::{LogoPlacement, LogoPosition};
use crate::errors::PricingError;
use crate::pricing::catalog::PriceCatalog;

/// Flat one-time charges for patch placements that carry a mold type.
///
/// Charges are keyed by placement (position, method, size), so each placement
/// is billed exactly once and quantity never enters the amount.
pub struct MoldChargeResolver<'a> {
    catalog: &'a PriceCatalog,
}

impl<'a> MoldChargeResolver<'a> {
    pub fn new(catalog: &'a PriceCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(
        &self,
        logos: &BTreeMap<LogoPosition, LogoPlacement>,
    ) -> Result<Vec<CostComponent>, PricingError> {
        let mut charges: BTreeMap<(LogoPosition, LogoMethodKey), CostComponent> = BTreeMap::new();

        for (position, placement) in logos {
            let key = placement.method_key();
            let method = self
                .catalog
                .logo_method(&key)
                .ok_or_else(|| PricingError::unknown(CostCategory::Logo, key.to_string()))?;
            if !method.requires_mold() {
                continue;
            }
            let Some(mold_name) = method.mold_charge_type.as_deref() else {
                continue;
            };
            let mold = self
                .catalog
                .mold_charge(mold_name)
                .ok_or_else(|| PricingError::unknown(CostCategory::MoldCharge, mold_name))?;

            charges.entry((*position, key)).or_insert_with(|| {
                CostComponent::flat(
                    CostCategory::MoldCharge,
                    mold.name.clone(),
                    mold.charge,
                    self.catalog.source(),
                )
                .at_position(*position)
            });
        }

        Ok(charges.into_values().collect())
    }
}
