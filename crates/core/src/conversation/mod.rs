pub mod clarification;
pub mod merge;
pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::info;

use crate::domain::conversation::{ConversationId, ConversationQuoteState};
use crate::domain::specification::{PartialSpecification, QuoteSpecification};
use crate::errors::ApplicationError;
use crate::pricing::PricingService;

use self::clarification::ClarificationNeeded;
use self::merge::{merge, MergeResult};
use self::store::QuoteStateStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DeltaOutcome {
    Applied(ConversationQuoteState),
    ClarificationNeeded(ClarificationNeeded),
}

/// Owns the per-conversation quote state.
///
/// Calls for one conversation are serialized by a per-conversation mutex;
/// different conversations never wait on each other. A state is either fully
/// merged, repriced and saved, or left exactly as it was.
pub struct QuoteStateManager {
    pricing: Arc<PricingService>,
    store: Arc<dyn QuoteStateStore>,
    locks: Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl QuoteStateManager {
    pub fn new(pricing: Arc<PricingService>, store: Arc<dyn QuoteStateStore>) -> Self {
        Self { pricing, store, locks: Mutex::new(HashMap::new()) }
    }

    pub fn pricing(&self) -> &Arc<PricingService> {
        &self.pricing
    }

    pub async fn current(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationQuoteState>, ApplicationError> {
        self.store.load(conversation_id).await
    }

    /// Prices a complete specification as the conversation's first quote.
    /// Once a quote exists it only changes through [`Self::apply_delta`].
    pub async fn calculate_quote(
        &self,
        conversation_id: &ConversationId,
        specification: QuoteSpecification,
    ) -> Result<ConversationQuoteState, ApplicationError> {
        let _guard = self.lock(conversation_id).await;
        if let Some(existing) = self.store.load(conversation_id).await? {
            return Err(ApplicationError::QuoteExists {
                conversation_id: conversation_id.to_string(),
                version: existing.version,
            });
        }

        let breakdown = self.pricing.calculate_quote(&specification)?;
        let state =
            ConversationQuoteState::initial(conversation_id.clone(), specification, breakdown);
        self.store.save(&state, None).await?;

        info!(
            event_name = "quote.calculated",
            conversation_id = %conversation_id,
            version = state.version,
            total_cost = %state.breakdown.total_cost,
            "conversation quote calculated"
        );
        Ok(state)
    }

    /// Merges `delta` into the stored specification and reprices it from
    /// scratch at the merged quantity.
    pub async fn apply_delta(
        &self,
        conversation_id: &ConversationId,
        delta: &PartialSpecification,
    ) -> Result<DeltaOutcome, ApplicationError> {
        let _guard = self.lock(conversation_id).await;
        let prior = self.store.load(conversation_id).await?;

        let specification = match merge(prior.as_ref().map(|state| &state.specification), delta)? {
            MergeResult::Merged(specification) => specification,
            MergeResult::Clarification(clarification) => {
                info!(
                    event_name = "quote.delta.clarification_needed",
                    conversation_id = %conversation_id,
                    field = %clarification.field,
                    reference = %clarification.reference,
                    candidates = clarification.candidates.len(),
                    "delta reference is ambiguous; nothing was changed"
                );
                return Ok(DeltaOutcome::ClarificationNeeded(clarification));
            }
        };

        let breakdown = self.pricing.calculate_quote(&specification)?;
        let state = match &prior {
            Some(prior) => prior.succeed(specification, breakdown),
            None => ConversationQuoteState::initial(conversation_id.clone(), specification, breakdown),
        };
        self.store.save(&state, prior.as_ref().map(|prior| prior.version)).await?;

        info!(
            event_name = "quote.delta.applied",
            conversation_id = %conversation_id,
            version = state.version,
            tier = %state.breakdown.tier,
            total_cost = %state.breakdown.total_cost,
            "conversational delta applied"
        );
        Ok(DeltaOutcome::Applied(state))
    }

    async fn lock(&self, conversation_id: &ConversationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only the map still references are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(conversation_id.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::{DeltaOutcome, QuoteStateManager};
    use crate::conversation::store::{InMemoryQuoteStateStore, QuoteStateStore};
    use crate::domain::breakdown::PriceSource;
    use crate::domain::conversation::{ConversationId, ConversationQuoteState};
    use crate::domain::options::{CostCategory, LogoApplication, LogoSize};
    use crate::domain::specification::{
        ListChange, LogoChange, LogoPatch, LogoPlacement, LogoPosition, LogoSelector, LogoTarget,
        PartialSpecification, QuoteSpecification,
    };
    use crate::domain::tier::TierKey;
    use crate::errors::{ApplicationError, PricingError};
    use crate::pricing::catalog::PriceCatalog;
    use crate::pricing::fallback::fallback_tables;
    use crate::pricing::{PricingService, PricingSettings};

    fn manager() -> (QuoteStateManager, Arc<InMemoryQuoteStateStore>) {
        let catalog = PriceCatalog::from_tables(fallback_tables(), PriceSource::Live, true)
            .expect("demo tables are valid")
            .0;
        let pricing = Arc::new(PricingService::with_settings(catalog, PricingSettings::default()));
        let store = Arc::new(InMemoryQuoteStateStore::new());
        (QuoteStateManager::new(pricing, store.clone()), store)
    }

    fn patched_spec(quantity: u32) -> QuoteSpecification {
        let mut spec = QuoteSpecification::new("6P AirFrame HSCS", quantity);
        spec.fabrics = vec!["Acrylic".into()];
        spec.logos.insert(
            LogoPosition::Front,
            LogoPlacement::new("Rubber", LogoApplication::Patch, LogoSize::Medium),
        );
        spec.logos.insert(
            LogoPosition::Left,
            LogoPlacement::new("Flat Embroidery", LogoApplication::Direct, LogoSize::Small),
        );
        spec.logos.insert(
            LogoPosition::Right,
            LogoPlacement::new("Flat Embroidery", LogoApplication::Direct, LogoSize::Small),
        );
        spec.logos.insert(
            LogoPosition::Back,
            LogoPlacement::new("3D Embroidery", LogoApplication::Direct, LogoSize::Medium),
        );
        spec.accessories = vec!["Hang Tag".into()];
        spec.closure = Some("Snapback".into());
        spec.delivery = Some("Regular Delivery".into());
        spec
    }

    fn applied(outcome: DeltaOutcome) -> ConversationQuoteState {
        match outcome {
            DeltaOutcome::Applied(state) => state,
            DeltaOutcome::ClarificationNeeded(c) => panic!("unexpected clarification: {}", c.prompt),
        }
    }

    #[tokio::test]
    async fn first_quote_creates_version_one() {
        let (manager, _) = manager();
        let id = ConversationId::from("conv-1");

        let state = manager.calculate_quote(&id, patched_spec(800)).await.expect("priced");

        assert_eq!(state.version, 1);
        assert_eq!(manager.current(&id).await.expect("load"), Some(state));
    }

    #[tokio::test]
    async fn second_full_quote_is_refused_and_state_kept() {
        let (manager, store) = manager();
        let id = ConversationId::from("conv-1b");
        let before = manager.calculate_quote(&id, patched_spec(800)).await.expect("priced");

        let error = manager
            .calculate_quote(&id, QuoteSpecification::new("6P Bravo Flat", 10))
            .await
            .expect_err("a quote already exists");

        assert_eq!(
            error,
            ApplicationError::QuoteExists { conversation_id: "conv-1b".to_string(), version: 1 }
        );
        let stored = store.load(&id).await.expect("load").expect("state kept");
        assert_eq!(stored, before);
        assert_eq!(stored.specification.accessories, vec!["Hang Tag".to_string()]);
    }

    #[tokio::test]
    async fn empty_delta_round_trips() {
        let (manager, _) = manager();
        let id = ConversationId::from("conv-2");
        let before = manager.calculate_quote(&id, patched_spec(800)).await.expect("priced");

        let after = applied(
            manager.apply_delta(&id, &PartialSpecification::default()).await.expect("applied"),
        );

        assert_eq!(after.specification, before.specification);
        assert_eq!(after.breakdown, before.breakdown);
        assert_eq!(after.version, 2);
    }

    #[tokio::test]
    async fn quantity_change_keeps_the_single_mold_line() {
        let (manager, _) = manager();
        let id = ConversationId::from("conv-3");
        let before = manager.calculate_quote(&id, patched_spec(800)).await.expect("priced");
        let before_molds: Vec<_> =
            before.breakdown.components_in(CostCategory::MoldCharge).cloned().collect();
        assert_eq!(before_molds.len(), 1);

        let delta = PartialSpecification { quantity: Some(600), ..PartialSpecification::default() };
        let after = applied(manager.apply_delta(&id, &delta).await.expect("applied"));

        let after_molds: Vec<_> =
            after.breakdown.components_in(CostCategory::MoldCharge).cloned().collect();
        assert_eq!(after_molds, before_molds);
        assert_eq!(after_molds[0].line_total, Decimal::new(8000, 2));

        let base = &after.breakdown.components[0];
        assert_eq!(base.line_total, base.unit_price * Decimal::from(600u32));
        assert_eq!(after.specification.logos, before.specification.logos);
    }

    #[tokio::test]
    async fn quantity_change_reprices_at_the_new_tier() {
        let (manager, _) = manager();
        let id = ConversationId::from("conv-4");
        manager.calculate_quote(&id, patched_spec(100)).await.expect("priced");

        let delta = PartialSpecification { quantity: Some(3000), ..PartialSpecification::default() };
        let after = applied(manager.apply_delta(&id, &delta).await.expect("applied"));

        assert_eq!(after.breakdown.tier, TierKey(10000));
        assert!(after
            .breakdown
            .components
            .iter()
            .filter(|c| !c.is_flat())
            .all(|c| c.tier == Some(TierKey(10000))));
        assert_eq!(after.breakdown.components[0].unit_price, Decimal::new(325, 2));
    }

    #[tokio::test]
    async fn front_change_leaves_other_placements_equal() {
        let (manager, _) = manager();
        let id = ConversationId::from("conv-5");
        let before = manager.calculate_quote(&id, patched_spec(800)).await.expect("priced");

        let delta = PartialSpecification {
            logos: vec![LogoChange::Update {
                target: LogoTarget::Position(LogoPosition::Front),
                patch: LogoPatch {
                    method: Some("3D Embroidery".into()),
                    application: Some(LogoApplication::Direct),
                    size: None,
                },
            }],
            ..PartialSpecification::default()
        };
        let after = applied(manager.apply_delta(&id, &delta).await.expect("applied"));

        for position in [LogoPosition::Left, LogoPosition::Right, LogoPosition::Back] {
            assert_eq!(
                after.specification.logos[&position],
                before.specification.logos[&position]
            );
        }
        assert_eq!(after.breakdown.components_in(CostCategory::MoldCharge).count(), 0);
    }

    #[tokio::test]
    async fn ambiguous_delta_changes_nothing() {
        let (manager, store) = manager();
        let id = ConversationId::from("conv-6");
        let mut spec = patched_spec(800);
        spec.logos.insert(
            LogoPosition::Back,
            LogoPlacement::new("Leather", LogoApplication::Patch, LogoSize::Small),
        );
        let before = manager.calculate_quote(&id, spec).await.expect("priced");

        let delta = PartialSpecification {
            quantity: Some(600),
            logos: vec![LogoChange::Update {
                target: LogoTarget::Matching(LogoSelector {
                    application: Some(LogoApplication::Patch),
                    ..LogoSelector::default()
                }),
                patch: LogoPatch { size: Some(LogoSize::Large), ..LogoPatch::default() },
            }],
            ..PartialSpecification::default()
        };
        let outcome = manager.apply_delta(&id, &delta).await.expect("not an error");

        assert!(matches!(outcome, DeltaOutcome::ClarificationNeeded(ref c) if c.candidates.len() == 2));
        assert_eq!(store.load(&id).await.expect("load"), Some(before));
    }

    #[tokio::test]
    async fn failed_repricing_does_not_commit() {
        let (manager, store) = manager();
        let id = ConversationId::from("conv-7");
        let before = manager.calculate_quote(&id, patched_spec(800)).await.expect("priced");

        let delta = PartialSpecification {
            quantity: Some(50),
            accessories: vec![ListChange::Add("Glitter".into())],
            ..PartialSpecification::default()
        };
        let error = manager.apply_delta(&id, &delta).await.expect_err("unknown accessory");

        assert_eq!(
            error,
            ApplicationError::Pricing(PricingError::unknown(CostCategory::Accessory, "Glitter"))
        );
        assert_eq!(store.load(&id).await.expect("load"), Some(before));
    }

    #[tokio::test]
    async fn delta_without_state_needs_product_and_quantity() {
        let (manager, _) = manager();
        let id = ConversationId::from("conv-8");

        let error = manager
            .apply_delta(&id, &PartialSpecification { quantity: Some(10), ..PartialSpecification::default() })
            .await
            .expect_err("incomplete");
        assert!(matches!(error, ApplicationError::Pricing(PricingError::IncompleteSpecification { .. })));

        let state = applied(
            manager
                .apply_delta(&id, &PartialSpecification::from_specification(&patched_spec(10)))
                .await
                .expect("complete delta"),
        );
        assert_eq!(state.version, 1);
        assert_eq!(state.specification, patched_spec(10));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deltas_on_one_conversation_are_serialized() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);
        let id = ConversationId::from("conv-9");
        manager.calculate_quote(&id, QuoteSpecification::new("6P AirFrame HSCS", 100)).await.expect("priced");

        let accessories = ["Hang Tag", "Inside Label", "B-Tape Print", "Sticker"];
        let handles: Vec<_> = accessories
            .iter()
            .map(|name| {
                let manager = Arc::clone(&manager);
                let id = id.clone();
                let delta = PartialSpecification {
                    accessories: vec![ListChange::Add((*name).to_string())],
                    ..PartialSpecification::default()
                };
                tokio::spawn(async move { manager.apply_delta(&id, &delta).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task").expect("applied");
        }

        let state = manager.current(&id).await.expect("load").expect("present");
        assert_eq!(state.version, 5);
        assert_eq!(state.specification.accessories.len(), 4);
    }
}
