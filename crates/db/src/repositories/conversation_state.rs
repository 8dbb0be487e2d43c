use async_trait::async_trait;
use capquote_core::conversation::store::QuoteStateStore;
use capquote_core::domain::conversation::{ConversationId, ConversationQuoteState};
use capquote_core::errors::ApplicationError;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::RepositoryError;
use crate::DbPool;

/// Conversation state in `conversation_quote_state`, one row per conversation.
/// The specification and breakdown are stored as JSON documents.
pub struct SqlQuoteStateStore {
    pool: DbPool,
}

impl SqlQuoteStateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn current_version(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<u64>, RepositoryError> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM conversation_quote_state WHERE conversation_id = ?",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;
        version.map(decode_version).transpose()
    }

    async fn load_row(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationQuoteState>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT conversation_id, version, specification_json, breakdown_json, updated_at
            FROM conversation_quote_state
            WHERE conversation_id = ?
            "#,
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let specification_json: String = row.try_get("specification_json")?;
        let breakdown_json: String = row.try_get("breakdown_json")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Some(ConversationQuoteState {
            conversation_id: ConversationId(row.try_get("conversation_id")?),
            specification: serde_json::from_str(&specification_json).map_err(|error| {
                RepositoryError::Decode(format!("specification_json: {error}"))
            })?,
            breakdown: serde_json::from_str(&breakdown_json)
                .map_err(|error| RepositoryError::Decode(format!("breakdown_json: {error}")))?,
            version: decode_version(row.try_get("version")?)?,
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|value| value.with_timezone(&Utc))
                .map_err(|error| RepositoryError::Decode(format!("updated_at: {error}")))?,
        }))
    }

    /// Returns the number of rows written; zero means the version check failed.
    async fn write_row(
        &self,
        state: &ConversationQuoteState,
        expected_version: Option<u64>,
    ) -> Result<u64, RepositoryError> {
        let specification_json = serde_json::to_string(&state.specification)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let breakdown_json = serde_json::to_string(&state.breakdown)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let version = encode_version(state.version)?;
        let total_cost = state.breakdown.total_cost.to_string();
        let updated_at = state.updated_at.to_rfc3339();

        let result = match expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO conversation_quote_state
                        (conversation_id, version, specification_json, breakdown_json, total_cost, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(conversation_id) DO NOTHING
                    "#,
                )
                .bind(&state.conversation_id.0)
                .bind(version)
                .bind(&specification_json)
                .bind(&breakdown_json)
                .bind(&total_cost)
                .bind(&updated_at)
                .execute(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE conversation_quote_state
                    SET version = ?, specification_json = ?, breakdown_json = ?,
                        total_cost = ?, updated_at = ?
                    WHERE conversation_id = ? AND version = ?
                    "#,
                )
                .bind(version)
                .bind(&specification_json)
                .bind(&breakdown_json)
                .bind(&total_cost)
                .bind(&updated_at)
                .bind(&state.conversation_id.0)
                .bind(encode_version(expected)?)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }
}

fn decode_version(raw: i64) -> Result<u64, RepositoryError> {
    u64::try_from(raw).map_err(|_| RepositoryError::Decode(format!("invalid version `{raw}`")))
}

fn encode_version(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("version `{version}` does not fit in i64")))
}

#[async_trait]
impl QuoteStateStore for SqlQuoteStateStore {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationQuoteState>, ApplicationError> {
        Ok(self.load_row(conversation_id).await?)
    }

    async fn save(
        &self,
        state: &ConversationQuoteState,
        expected_version: Option<u64>,
    ) -> Result<(), ApplicationError> {
        if self.write_row(state, expected_version).await? == 1 {
            return Ok(());
        }

        let actual = self.current_version(&state.conversation_id).await?;
        Err(ApplicationError::VersionConflict {
            conversation_id: state.conversation_id.to_string(),
            expected: expected_version,
            actual,
        })
    }
}
