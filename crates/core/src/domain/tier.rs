use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quantity breakpoints every pricing table is indexed by, in ascending order.
pub const STANDARD_BREAKPOINTS: [u32; 7] = [48, 144, 576, 1152, 2880, 10000, 20000];

/// A quantity breakpoint that identifies one pricing bracket (e.g. `tier144`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierKey(pub u32);

impl TierKey {
    pub fn breakpoint(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.0)
    }
}

/// One unit price per breakpoint. A missing breakpoint means the option is not
/// offered at that bracket, which is distinct from a zero price.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrices {
    prices: BTreeMap<TierKey, Decimal>,
}

/// Two adjacent priced breakpoints where the larger bracket costs more.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonotonicViolation {
    pub lower: TierKey,
    pub lower_price: Decimal,
    pub upper: TierKey,
    pub upper_price: Decimal,
}

impl TierPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same price at every standard breakpoint (free fabrics, flat-priced rows).
    pub fn uniform(price: Decimal) -> Self {
        let prices = STANDARD_BREAKPOINTS.iter().map(|bp| (TierKey(*bp), price)).collect();
        Self { prices }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, Decimal)>) -> Self {
        let prices = pairs.into_iter().map(|(bp, price)| (TierKey(bp), price)).collect();
        Self { prices }
    }

    pub fn insert(&mut self, tier: TierKey, price: Decimal) {
        self.prices.insert(tier, price);
    }

    pub fn price_at(&self, tier: TierKey) -> Option<Decimal> {
        self.prices.get(&tier).copied()
    }

    pub fn has_tier(&self, tier: TierKey) -> bool {
        self.prices.contains_key(&tier)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TierKey, Decimal)> + '_ {
        self.prices.iter().map(|(tier, price)| (*tier, *price))
    }

    /// Checks the volume-discount invariant across the breakpoints that carry a
    /// price. Absent brackets are skipped rather than treated as zero.
    pub fn check_non_increasing(&self) -> Result<(), MonotonicViolation> {
        let mut previous: Option<(TierKey, Decimal)> = None;
        for (tier, price) in self.iter() {
            if let Some((lower, lower_price)) = previous {
                if price > lower_price {
                    return Err(MonotonicViolation {
                        lower,
                        lower_price,
                        upper: tier,
                        upper_price: price,
                    });
                }
            }
            previous = Some((tier, price));
        }
        Ok(())
    }
}
