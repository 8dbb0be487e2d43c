use thiserror::Error;

use crate::domain::options::CostCategory;
use crate::domain::tier::TierKey;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("invalid quantity {quantity}: quantity must be greater than zero")]
    InvalidQuantity { quantity: u32 },
    #[error("unknown {category} option `{key}`")]
    UnknownOption { category: CostCategory, key: String },
    #[error("{category} option `{key}` has no price at {tier}")]
    PriceNotApplicable { category: CostCategory, key: String, tier: TierKey },
    #[error("{category} option `{key}` is not available for product `{product}`")]
    IncompatibleOption { category: CostCategory, key: String, product: String },
    #[error("{category} option `{key}` pushes the quote total out of range")]
    AmountOverflow { category: CostCategory, key: String },
    #[error("base product `{product}` could not be priced: {reason}")]
    MandatoryComponentMissing { product: String, reason: String },
    #[error("pricing data source unavailable while loading `{table}`: {reason}")]
    DataSourceUnavailable { table: String, reason: String },
    #[error("price tables rejected {count} row(s); first: {first}")]
    TableValidation { count: usize, first: String },
    #[error("invalid specification field `{field}`: {message}")]
    InvalidSpecification { field: String, message: String },
    #[error("specification is incomplete; missing: {}", missing.join(", "))]
    IncompleteSpecification { missing: Vec<String> },
}

impl PricingError {
    pub fn unknown(category: CostCategory, key: impl Into<String>) -> Self {
        Self::UnknownOption { category, key: key.into() }
    }

    /// Category of the offending option, when the error is about one.
    pub fn category(&self) -> Option<CostCategory> {
        match self {
            Self::UnknownOption { category, .. }
            | Self::PriceNotApplicable { category, .. }
            | Self::IncompatibleOption { category, .. }
            | Self::AmountOverflow { category, .. } => Some(*category),
            Self::MandatoryComponentMissing { .. } => Some(CostCategory::BlankCap),
            _ => None,
        }
    }

    /// Offending option name or field, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnknownOption { key, .. }
            | Self::PriceNotApplicable { key, .. }
            | Self::IncompatibleOption { key, .. }
            | Self::AmountOverflow { key, .. } => Some(key),
            Self::MandatoryComponentMissing { product, .. } => Some(product),
            Self::DataSourceUnavailable { table, .. } => Some(table),
            Self::InvalidSpecification { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error(
        "conversation `{conversation_id}` was modified concurrently (expected version {expected:?}, found {actual:?})"
    )]
    VersionConflict { conversation_id: String, expected: Option<u64>, actual: Option<u64> },
    #[error("conversation `{conversation_id}` already has a quote at version {version}; change it with a delta")]
    QuoteExists { conversation_id: String, version: u64 },
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The quote request could not be processed. Check the selected options and try again."
            }
            Self::Unprocessable { .. } => {
                "The quote cannot be priced at this quantity with the selected options."
            }
            Self::Conflict { .. } => {
                "This conversation already has a quote. Describe the change instead of a new specification."
            }
            Self::ServiceUnavailable { .. } => {
                "Pricing is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Unprocessable { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            ApplicationError::Pricing(
                PricingError::InvalidQuantity { .. }
                | PricingError::UnknownOption { .. }
                | PricingError::IncompatibleOption { .. }
                | PricingError::InvalidSpecification { .. }
                | PricingError::IncompleteSpecification { .. },
            ) => Self::BadRequest { message, correlation_id },
            ApplicationError::Pricing(
                PricingError::PriceNotApplicable { .. }
                | PricingError::AmountOverflow { .. }
                | PricingError::MandatoryComponentMissing { .. },
            ) => Self::Unprocessable { message, correlation_id },
            ApplicationError::Pricing(
                PricingError::DataSourceUnavailable { .. } | PricingError::TableValidation { .. },
            )
            | ApplicationError::Persistence(_)
            | ApplicationError::VersionConflict { .. } => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::QuoteExists { .. } => Self::Conflict { message, correlation_id },
            ApplicationError::Configuration(_) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::options::CostCategory;
    use crate::domain::tier::TierKey;
    use crate::errors::{ApplicationError, InterfaceError, PricingError};

    #[test]
    fn unknown_option_maps_to_bad_request_and_keeps_the_key() {
        let interface =
            ApplicationError::from(PricingError::unknown(CostCategory::Fabric, "Unobtanium"))
                .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, ref message }
                if correlation_id == "req-1" && message.contains("Unobtanium") && message.contains("fabric")
        ));
    }

    #[test]
    fn price_not_applicable_is_unprocessable() {
        let interface = ApplicationError::from(PricingError::PriceNotApplicable {
            category: CostCategory::Delivery,
            key: "Air Freight".to_string(),
            tier: TierKey(48),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Unprocessable { .. }));
        assert!(interface.message().contains("tier48"));
    }

    #[test]
    fn data_source_failure_maps_to_service_unavailable() {
        let interface = ApplicationError::from(PricingError::DataSourceUnavailable {
            table: "logo_method".to_string(),
            reason: "connection refused".to_string(),
        })
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "Pricing is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("bad cache ttl".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn existing_quote_maps_to_conflict() {
        let interface = ApplicationError::QuoteExists {
            conversation_id: "conv-9".to_owned(),
            version: 3,
        }
        .into_interface("req-5");

        assert!(matches!(
            interface,
            InterfaceError::Conflict { ref correlation_id, ref message }
                if correlation_id == "req-5" && message.contains("conv-9") && message.contains("delta")
        ));
    }

    #[test]
    fn errors_expose_category_and_key() {
        let error = PricingError::IncompatibleOption {
            category: CostCategory::Closure,
            key: "Buckle".to_string(),
            product: "Trucker".to_string(),
        };
        assert_eq!(error.category(), Some(CostCategory::Closure));
        assert_eq!(error.key(), Some("Buckle"));
    }
}
