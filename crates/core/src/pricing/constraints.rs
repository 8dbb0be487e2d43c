use std::collections::HashSet;

use crate::domain::options::{normalize_key, CostCategory};
use crate::domain::specification::QuoteSpecification;
use crate::errors::PricingError;
use crate::pricing::catalog::PriceCatalog;

pub const MAX_FABRICS: usize = 2;

/// Structural checks run before any price is looked up.
pub trait SpecificationConstraints: Send + Sync {
    fn validate(&self, spec: &QuoteSpecification, catalog: &PriceCatalog)
        -> Result<(), PricingError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicConstraints;

impl SpecificationConstraints for DeterministicConstraints {
    fn validate(
        &self,
        spec: &QuoteSpecification,
        catalog: &PriceCatalog,
    ) -> Result<(), PricingError> {
        validate_specification(spec, catalog)
    }
}

pub fn validate_specification(
    spec: &QuoteSpecification,
    catalog: &PriceCatalog,
) -> Result<(), PricingError> {
    if spec.product.trim().is_empty() {
        return Err(invalid("product", "a product must be selected"));
    }
    if spec.quantity == 0 {
        return Err(PricingError::InvalidQuantity { quantity: spec.quantity });
    }
    if spec.fabrics.len() > MAX_FABRICS {
        return Err(invalid(
            "fabrics",
            format!("at most {MAX_FABRICS} fabrics can be combined, got {}", spec.fabrics.len()),
        ));
    }
    check_names("fabrics", &spec.fabrics)?;
    check_names("accessories", &spec.accessories)?;

    if let Some(placement) = spec.logos.values().find(|placement| placement.method.trim().is_empty())
    {
        return Err(invalid("logos", format!("logo placement `{placement}` has no method")));
    }

    if let (Some(closure), Some(product)) = (spec.closure.as_deref(), catalog.product(&spec.product))
    {
        if closure.trim().is_empty() {
            return Err(invalid("closure", "closure name is blank"));
        }
        if !product.accepts_closure(closure) {
            return Err(PricingError::IncompatibleOption {
                category: CostCategory::Closure,
                key: closure.to_string(),
                product: product.name.clone(),
            });
        }
    }

    Ok(())
}

fn check_names(field: &str, names: &[String]) -> Result<(), PricingError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(invalid(field, "option name is blank"));
        }
        if !seen.insert(normalize_key(name)) {
            return Err(invalid(field, format!("`{name}` is selected more than once")));
        }
    }
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> PricingError {
    PricingError::InvalidSpecification { field: field.to_string(), message: message.into() }
}

#[cfg(test)]
mod tests {
    use super::validate_specification;
    use crate::domain::breakdown::PriceSource;
    use crate::domain::options::CostCategory;
    use crate::domain::specification::QuoteSpecification;
    use crate::errors::PricingError;
    use crate::pricing::catalog::PriceCatalog;
    use crate::pricing::fallback::fallback_tables;

    fn catalog() -> PriceCatalog {
        PriceCatalog::from_tables(fallback_tables(), PriceSource::Live, true)
            .expect("demo tables are valid")
            .0
    }

    #[test]
    fn three_fabrics_are_rejected() {
        let mut spec = QuoteSpecification::new("6P AirFrame HSCS", 100);
        spec.fabrics = vec!["Acrylic".into(), "Trucker Mesh".into(), "Polyester".into()];

        let error = validate_specification(&spec, &catalog()).expect_err("too many fabrics");
        assert!(matches!(error, PricingError::InvalidSpecification { ref field, .. } if field == "fabrics"));
    }

    #[test]
    fn duplicate_accessories_are_rejected() {
        let mut spec = QuoteSpecification::new("6P AirFrame HSCS", 100);
        spec.accessories = vec!["Hang Tag".into(), "hang tag".into()];

        assert!(validate_specification(&spec, &catalog()).is_err());
    }

    #[test]
    fn closure_must_suit_the_product() {
        let mut spec = QuoteSpecification::new("6P Bravo Flat", 100);
        spec.closure = Some("Buckle".into());

        let error = validate_specification(&spec, &catalog()).expect_err("snapback only");
        assert_eq!(error.category(), Some(CostCategory::Closure));

        spec.closure = Some("snapback".into());
        assert!(validate_specification(&spec, &catalog()).is_ok());
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let spec = QuoteSpecification::new("6P AirFrame HSCS", 0);
        assert_eq!(
            validate_specification(&spec, &catalog()),
            Err(PricingError::InvalidQuantity { quantity: 0 })
        );
    }
}
