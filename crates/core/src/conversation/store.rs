use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::conversation::{ConversationId, ConversationQuoteState};
use crate::errors::ApplicationError;

/// Persistence for conversation quote state. `save` is a compare-and-swap on
/// the version: `expected_version` is the version the caller loaded, or `None`
/// when it saw no state at all.
#[async_trait]
pub trait QuoteStateStore: Send + Sync {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationQuoteState>, ApplicationError>;

    async fn save(
        &self,
        state: &ConversationQuoteState,
        expected_version: Option<u64>,
    ) -> Result<(), ApplicationError>;
}

#[derive(Default)]
pub struct InMemoryQuoteStateStore {
    states: RwLock<HashMap<ConversationId, ConversationQuoteState>>,
}

impl InMemoryQuoteStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteStateStore for InMemoryQuoteStateStore {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationQuoteState>, ApplicationError> {
        let states = self.states.read().await;
        Ok(states.get(conversation_id).cloned())
    }

    async fn save(
        &self,
        state: &ConversationQuoteState,
        expected_version: Option<u64>,
    ) -> Result<(), ApplicationError> {
        let mut states = self.states.write().await;
        let actual = states.get(&state.conversation_id).map(|current| current.version);
        if actual != expected_version {
            return Err(ApplicationError::VersionConflict {
                conversation_id: state.conversation_id.to_string(),
                expected: expected_version,
                actual,
            });
        }
        states.insert(state.conversation_id.clone(), state.clone());
        Ok(())
    }
}
