use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::breakdown::CostBreakdown;
use crate::domain::specification::QuoteSpecification;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The priced specification a conversation currently holds. Replaced as a
/// whole on every successful change; never edited field by field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationQuoteState {
    pub conversation_id: ConversationId,
    pub specification: QuoteSpecification,
    pub breakdown: CostBreakdown,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl ConversationQuoteState {
    pub fn initial(
        conversation_id: ConversationId,
        specification: QuoteSpecification,
        breakdown: CostBreakdown,
    ) -> Self {
        Self { conversation_id, specification, breakdown, version: 1, updated_at: Utc::now() }
    }

    pub fn succeed(&self, specification: QuoteSpecification, breakdown: CostBreakdown) -> Self {
        Self {
            conversation_id: self.conversation_id.clone(),
            specification,
            breakdown,
            version: self.version + 1,
            updated_at: Utc::now(),
        }
    }
}
