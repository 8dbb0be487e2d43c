use serde::{Deserialize, Serialize};

use crate::domain::tier::{TierKey, STANDARD_BREAKPOINTS};
use crate::errors::PricingError;

/// How an exact-breakpoint quantity is bracketed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPolicy {
    /// Each breakpoint closes the bracket that ends at it: 48 < q <= 144 is `tier144`.
    /// Anything above the second-to-last breakpoint uses the last one.
    #[default]
    UpperInclusive,
    /// Each breakpoint opens the bracket that starts at it: 144 <= q < 576 is `tier144`.
    /// Anything below the first breakpoint uses the first one.
    LowerInclusive,
}

impl std::str::FromStr for TierPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "upper_inclusive" | "upper" => Ok(Self::UpperInclusive),
            "lower_inclusive" | "lower" => Ok(Self::LowerInclusive),
            other => Err(format!(
                "unsupported tier policy `{other}` (expected upper_inclusive|lower_inclusive)"
            )),
        }
    }
}

/// Maps a quantity to its pricing bracket. One instance is shared by every
/// component resolver so all lines of a quote land on the same tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierResolver {
    breakpoints: Vec<TierKey>,
    policy: TierPolicy,
}

impl Default for TierResolver {
    fn default() -> Self {
        Self::standard(TierPolicy::default())
    }
}

impl TierResolver {
    pub fn standard(policy: TierPolicy) -> Self {
        Self::new(STANDARD_BREAKPOINTS.iter().copied(), policy)
    }

    /// Breakpoints are sorted and deduplicated; an empty list falls back to the
    /// standard set.
    pub fn new(breakpoints: impl IntoIterator<Item = u32>, policy: TierPolicy) -> Self {
        let mut breakpoints: Vec<TierKey> =
            breakpoints.into_iter().filter(|bp| *bp > 0).map(TierKey).collect();
        breakpoints.sort();
        breakpoints.dedup();
        if breakpoints.is_empty() {
            breakpoints = STANDARD_BREAKPOINTS.iter().copied().map(TierKey).collect();
        }
        Self { breakpoints, policy }
    }

    pub fn policy(&self) -> TierPolicy {
        self.policy
    }

    pub fn breakpoints(&self) -> &[TierKey] {
        &self.breakpoints
    }

    pub fn resolve(&self, quantity: u32) -> Result<TierKey, PricingError> {
        if quantity == 0 {
            return Err(PricingError::InvalidQuantity { quantity });
        }

        let first = self.breakpoints[0];
        let last = self.breakpoints[self.breakpoints.len() - 1];

        let tier = match self.policy {
            TierPolicy::UpperInclusive => self
                .breakpoints
                .iter()
                .copied()
                .find(|bp| quantity <= bp.breakpoint())
                .unwrap_or(last),
            TierPolicy::LowerInclusive => self
                .breakpoints
                .iter()
                .rev()
                .copied()
                .find(|bp| quantity >= bp.breakpoint())
                .unwrap_or(first),
        };

        Ok(tier)
    }
}
