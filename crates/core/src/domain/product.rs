use serde::{Deserialize, Serialize};

use crate::domain::options::normalize_key;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    /// Identity used for lookups: case and surrounding whitespace do not matter.
    pub fn from_name(name: &str) -> Self {
        Self(normalize_key(name))
    }
}

/// Blank cap reference data. Immutable once loaded into a catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub panel_count: u8,
    pub profile: String,
    pub bill_shape: String,
    /// Closure names this style can be built with. Empty means unrestricted.
    pub closure_types: Vec<String>,
    /// Blank cap price family, e.g. "Tier 1".
    pub price_tier: String,
}

impl Product {
    pub fn accepts_closure(&self, closure: &str) -> bool {
        if self.closure_types.is_empty() {
            return true;
        }
        let wanted = normalize_key(closure);
        self.closure_types.iter().any(|candidate| normalize_key(candidate) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::{Product, ProductId};

    fn product(closures: &[&str]) -> Product {
        Product {
            id: ProductId::from_name("6P AirFrame HSCS"),
            name: "6P AirFrame HSCS".to_string(),
            panel_count: 6,
            profile: "High".to_string(),
            bill_shape: "Slight Curved".to_string(),
            closure_types: closures.iter().map(ToString::to_string).collect(),
            price_tier: "Tier 1".to_string(),
        }
    }

    #[test]
    fn closure_compatibility_ignores_case() {
        let cap = product(&["Snapback", "Fitted"]);
        assert!(cap.accepts_closure("snapback"));
        assert!(!cap.accepts_closure("Buckle"));
    }

    #[test]
    fn products_without_closure_list_accept_anything() {
        assert!(product(&[]).accepts_closure("Buckle"));
    }

    #[test]
    fn product_id_is_normalized() {
        assert_eq!(ProductId::from_name("  6P  AirFrame HSCS "), ProductId("6p airframe hscs".into()));
    }
}
