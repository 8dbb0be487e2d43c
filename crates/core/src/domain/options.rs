use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tier::TierPrices;

/// Lookup form of an option name: trimmed, lowercased, inner whitespace collapsed.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Cost categories. Each has its own pricing table and its own resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    BlankCap,
    Fabric,
    Logo,
    MoldCharge,
    Closure,
    Accessory,
    Delivery,
}

impl CostCategory {
    pub const ALL: [CostCategory; 7] = [
        CostCategory::BlankCap,
        CostCategory::Fabric,
        CostCategory::Logo,
        CostCategory::MoldCharge,
        CostCategory::Closure,
        CostCategory::Accessory,
        CostCategory::Delivery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CostCategory::BlankCap => "blank_cap",
            CostCategory::Fabric => "fabric",
            CostCategory::Logo => "logo",
            CostCategory::MoldCharge => "mold_charge",
            CostCategory::Closure => "closure",
            CostCategory::Accessory => "accessory",
            CostCategory::Delivery => "delivery",
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown cost category `{}` (expected blank_cap|fabric|logo|mold_charge|closure|accessory|delivery)",
            self.0
        )
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for CostCategory {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "blank_cap" | "blank_caps" | "product" | "products" | "price_tier" => {
                Ok(CostCategory::BlankCap)
            }
            "fabric" | "fabrics" => Ok(CostCategory::Fabric),
            "logo" | "logos" | "logo_method" | "logo_methods" => Ok(CostCategory::Logo),
            "mold_charge" | "mold_charges" | "mold" => Ok(CostCategory::MoldCharge),
            "closure" | "closures" => Ok(CostCategory::Closure),
            "accessory" | "accessories" => Ok(CostCategory::Accessory),
            "delivery" | "delivery_method" | "delivery_methods" => Ok(CostCategory::Delivery),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogoApplication {
    Direct,
    Patch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogoSize {
    Small,
    Medium,
    Large,
}

macro_rules! parse_label {
    ($ty:ty, $label:literal, { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(format!("unsupported {} `{other}`", $label)),
                }
            }
        }
    };
}

parse_label!(LogoApplication, "logo application", {
    "direct" => LogoApplication::Direct,
    "patch" => LogoApplication::Patch,
});

parse_label!(LogoSize, "logo size", {
    "small" => LogoSize::Small,
    "medium" => LogoSize::Medium,
    "large" => LogoSize::Large,
});

impl fmt::Display for LogoApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogoApplication::Direct => "Direct",
            LogoApplication::Patch => "Patch",
        })
    }
}

impl fmt::Display for LogoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogoSize::Small => "Small",
            LogoSize::Medium => "Medium",
            LogoSize::Large => "Large",
        })
    }
}

/// A named option priced per unit at each tier (fabrics, closures, accessories,
/// delivery methods, blank-cap price families).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedOption {
    pub name: String,
    pub prices: TierPrices,
}

/// Identity of a logo price row: method name, how it is applied, and its size.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogoMethodKey {
    pub method: String,
    pub application: LogoApplication,
    pub size: LogoSize,
}

impl LogoMethodKey {
    pub fn new(method: &str, application: LogoApplication, size: LogoSize) -> Self {
        Self { method: normalize_key(method), application, size }
    }
}

impl fmt::Display for LogoMethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.method, self.application, self.size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoMethod {
    pub name: String,
    pub application: LogoApplication,
    pub size: LogoSize,
    pub prices: TierPrices,
    /// Name of the mold charge row billed once per placement, if any.
    pub mold_charge_type: Option<String>,
}

impl LogoMethod {
    pub fn key(&self) -> LogoMethodKey {
        LogoMethodKey::new(&self.name, self.application, self.size)
    }

    pub fn requires_mold(&self) -> bool {
        self.application == LogoApplication::Patch && self.mold_charge_type.is_some()
    }
}

/// Flat one-time fee, independent of quantity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoldCharge {
    pub name: String,
    pub size: LogoSize,
    pub charge: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMethod {
    pub option: PricedOption,
    pub delivery_days: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{normalize_key, CostCategory, LogoApplication, LogoMethodKey, LogoSize};

    #[test]
    fn category_parses_plural_and_aliases() {
        assert_eq!("logos".parse::<CostCategory>(), Ok(CostCategory::Logo));
        assert_eq!("Delivery-Method".parse::<CostCategory>(), Ok(CostCategory::Delivery));
        assert!("tax".parse::<CostCategory>().is_err());
    }

    #[test]
    fn logo_keys_ignore_method_case() {
        let a = LogoMethodKey::new("3D Embroidery", LogoApplication::Direct, LogoSize::Large);
        let b = LogoMethodKey::new("3d  embroidery", LogoApplication::Direct, LogoSize::Large);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "3d embroidery|Direct|Large");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_key("  Hang   Tag "), "hang tag");
    }
}
