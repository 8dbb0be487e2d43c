pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use conversation::clarification::{ClarificationNeeded, ClarificationOption, ClarificationReason};
pub use conversation::store::{InMemoryQuoteStateStore, QuoteStateStore};
pub use conversation::{DeltaOutcome, QuoteStateManager};
pub use domain::breakdown::{CostBreakdown, CostComponent, OmittedComponent, PriceSource};
pub use domain::conversation::{ConversationId, ConversationQuoteState};
pub use domain::options::CostCategory;
pub use domain::product::{Product, ProductId};
pub use domain::specification::{PartialSpecification, QuoteSpecification};
pub use domain::tier::TierKey;
pub use errors::{ApplicationError, InterfaceError, PricingError};
pub use pricing::cache::{CacheStats, CacheStore};
pub use pricing::provider::{PriceTableProvider, PriceTableSet, ProviderError};
pub use pricing::tiers::{TierPolicy, TierResolver};
pub use pricing::{PricingService, PricingSettings};
