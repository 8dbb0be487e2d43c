use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::options::{normalize_key, LogoApplication, LogoMethodKey, LogoSize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoPosition {
    Front,
    Left,
    Right,
    Back,
}

impl LogoPosition {
    pub const ALL: [LogoPosition; 4] =
        [LogoPosition::Front, LogoPosition::Left, LogoPosition::Right, LogoPosition::Back];
}

impl fmt::Display for LogoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogoPosition::Front => "front",
            LogoPosition::Left => "left",
            LogoPosition::Right => "right",
            LogoPosition::Back => "back",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoPlacement {
    pub method: String,
    pub application: LogoApplication,
    pub size: LogoSize,
}

impl LogoPlacement {
    pub fn new(method: impl Into<String>, application: LogoApplication, size: LogoSize) -> Self {
        Self { method: method.into(), application, size }
    }

    pub fn method_key(&self) -> LogoMethodKey {
        LogoMethodKey::new(&self.method, self.application, self.size)
    }
}

impl fmt::Display for LogoPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.size, self.method, self.application)
    }
}

/// Everything needed to price an order. This is the unit of conversational state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSpecification {
    pub product: String,
    pub quantity: u32,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub fabrics: Vec<String>,
    #[serde(default)]
    pub logos: BTreeMap<LogoPosition, LogoPlacement>,
    #[serde(default)]
    pub accessories: Vec<String>,
    #[serde(default)]
    pub closure: Option<String>,
    #[serde(default)]
    pub delivery: Option<String>,
}

impl QuoteSpecification {
    pub fn new(product: impl Into<String>, quantity: u32) -> Self {
        Self {
            product: product.into(),
            quantity,
            colors: Vec::new(),
            fabrics: Vec::new(),
            logos: BTreeMap::new(),
            accessories: Vec::new(),
            closure: None,
            delivery: None,
        }
    }
}

/// Change to a scalar field that may also be cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarChange<T> {
    Set(T),
    Remove,
}

/// Change to a name-keyed list (fabrics, accessories).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListChange {
    Add(String),
    Remove(String),
    /// Swap one entry for another. Without `from` the list must hold exactly one entry.
    Replace {
        #[serde(default)]
        from: Option<String>,
        to: String,
    },
}

/// Attribute filter used when the caller refers to a placement by what it is
/// ("the patch") rather than where it is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoSelector {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub application: Option<LogoApplication>,
    #[serde(default)]
    pub size: Option<LogoSize>,
}

impl LogoSelector {
    pub fn matches(&self, placement: &LogoPlacement) -> bool {
        let method_ok = self
            .method
            .as_deref()
            .map(|method| normalize_key(method) == normalize_key(&placement.method))
            .unwrap_or(true);
        let application_ok = self.application.map(|a| a == placement.application).unwrap_or(true);
        let size_ok = self.size.map(|s| s == placement.size).unwrap_or(true);
        method_ok && application_ok && size_ok
    }
}

impl fmt::Display for LogoSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(size) = self.size {
            parts.push(size.to_string());
        }
        if let Some(method) = &self.method {
            parts.push(method.clone());
        }
        if let Some(application) = self.application {
            parts.push(application.to_string());
        }
        if parts.is_empty() {
            f.write_str("any logo")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoTarget {
    Position(LogoPosition),
    Matching(LogoSelector),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoPatch {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub application: Option<LogoApplication>,
    #[serde(default)]
    pub size: Option<LogoSize>,
}

impl LogoPatch {
    pub fn apply_to(&self, placement: &LogoPlacement) -> LogoPlacement {
        LogoPlacement {
            method: self.method.clone().unwrap_or_else(|| placement.method.clone()),
            application: self.application.unwrap_or(placement.application),
            size: self.size.unwrap_or(placement.size),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoChange {
    /// Insert or fully replace the placement at a position.
    Set { position: LogoPosition, placement: LogoPlacement },
    /// Change selected attributes of exactly one existing placement.
    Update { target: LogoTarget, patch: LogoPatch },
    Remove { target: LogoTarget },
}

/// The fields a user changed in one conversational turn. Absent fields mean
/// "keep what was there"; removals are always explicit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSpecification {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub closure: Option<ScalarChange<String>>,
    #[serde(default)]
    pub delivery: Option<ScalarChange<String>>,
    #[serde(default)]
    pub fabrics: Vec<ListChange>,
    #[serde(default)]
    pub accessories: Vec<ListChange>,
    #[serde(default)]
    pub logos: Vec<LogoChange>,
}

impl PartialSpecification {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Delta that, applied to nothing, yields `spec` exactly.
    pub fn from_specification(spec: &QuoteSpecification) -> Self {
        Self {
            product: Some(spec.product.clone()),
            quantity: Some(spec.quantity),
            colors: (!spec.colors.is_empty()).then(|| spec.colors.clone()),
            closure: spec.closure.clone().map(ScalarChange::Set),
            delivery: spec.delivery.clone().map(ScalarChange::Set),
            fabrics: spec.fabrics.iter().cloned().map(ListChange::Add).collect(),
            accessories: spec.accessories.iter().cloned().map(ListChange::Add).collect(),
            logos: spec
                .logos
                .iter()
                .map(|(position, placement)| LogoChange::Set {
                    position: *position,
                    placement: placement.clone(),
                })
                .collect(),
        }
    }
}
