//! JSON API over the pricing engine and conversation state.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use capquote_core::conversation::{DeltaOutcome, QuoteStateManager};
use capquote_core::domain::breakdown::CostBreakdown;
use capquote_core::domain::conversation::{ConversationId, ConversationQuoteState};
use capquote_core::domain::options::CostCategory;
use capquote_core::domain::specification::{PartialSpecification, QuoteSpecification};
use capquote_core::errors::{ApplicationError, InterfaceError};
use capquote_core::pricing::cache::CacheStats;
use capquote_core::pricing::catalog::CatalogLoadReport;
use capquote_core::pricing::provider::PriceTableProvider;
use capquote_core::pricing::PricingService;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub pricing: Arc<PricingService>,
    pub quotes: Arc<QuoteStateManager>,
    pub provider: Arc<dyn PriceTableProvider>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/quotes/calculate", post(calculate_quote))
        .route("/api/v1/conversations/{id}", get(get_conversation))
        .route("/api/v1/conversations/{id}/quote", post(calculate_conversation_quote))
        .route("/api/v1/conversations/{id}/delta", post(apply_delta))
        .route("/api/v1/pricing/cache/stats", get(cache_stats))
        .route("/api/v1/pricing/cache/clear", post(clear_cache))
        .route("/api/v1/pricing/cache/invalidate/{category}", post(invalidate_category))
        .route("/api/v1/pricing/cache/prewarm", post(prewarm_cache))
        .route("/api/v1/pricing/refresh", post(refresh_catalog))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub class: String,
    pub message: String,
    pub user_message: String,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug)]
pub enum ApiError {
    Interface(InterfaceError),
    NotFound { message: String, correlation_id: String },
}

impl ApiError {
    fn from_application(error: impl Into<ApplicationError>, correlation_id: &str) -> Self {
        let error = error.into();
        warn!(
            event_name = "api.request.failed",
            correlation_id,
            error = %error,
            "request failed"
        );
        Self::Interface(error.into_interface(correlation_id))
    }

    fn bad_request(message: String, correlation_id: &str) -> Self {
        warn!(
            event_name = "api.request.rejected",
            correlation_id,
            error = %message,
            "request rejected"
        );
        Self::Interface(InterfaceError::BadRequest {
            message,
            correlation_id: correlation_id.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound { message, correlation_id } => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    class: "not_found".to_string(),
                    user_message: "No quote exists for this conversation yet.".to_string(),
                    message,
                    correlation_id,
                },
            ),
            ApiError::Interface(error) => {
                let (status, class, correlation_id) = match &error {
                    InterfaceError::BadRequest { correlation_id, .. } => {
                        (StatusCode::BAD_REQUEST, "bad_request", correlation_id)
                    }
                    InterfaceError::Unprocessable { correlation_id, .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", correlation_id)
                    }
                    InterfaceError::Conflict { correlation_id, .. } => {
                        (StatusCode::CONFLICT, "conflict", correlation_id)
                    }
                    InterfaceError::ServiceUnavailable { correlation_id, .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", correlation_id)
                    }
                    InterfaceError::Internal { correlation_id, .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal", correlation_id)
                    }
                };
                let body = ErrorBody {
                    class: class.to_string(),
                    message: error.message().to_string(),
                    user_message: error.user_message().to_string(),
                    correlation_id: correlation_id.clone(),
                };
                (status, body)
            }
        };
        (status, Json(ErrorEnvelope { error: body })).into_response()
    }
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

async fn calculate_quote(
    State(state): State<ApiState>,
    Json(specification): Json<QuoteSpecification>,
) -> Result<Json<CostBreakdown>, ApiError> {
    let correlation_id = correlation_id();
    let breakdown = state
        .pricing
        .calculate_quote(&specification)
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(breakdown))
}

async fn get_conversation(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<ConversationQuoteState>, ApiError> {
    let correlation_id = correlation_id();
    let conversation_id = ConversationId(id);
    state
        .quotes
        .current(&conversation_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            message: format!("conversation `{conversation_id}` has no quote state"),
            correlation_id,
        })
}

/// Opens a conversation's quote. 409 once one exists; later changes go
/// through the delta route.
async fn calculate_conversation_quote(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(specification): Json<QuoteSpecification>,
) -> Result<Json<ConversationQuoteState>, ApiError> {
    let correlation_id = correlation_id();
    let quote = state
        .quotes
        .calculate_quote(&ConversationId(id), specification)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(quote))
}

/// 200 with the new state, or 409 with the clarification when the delta
/// referred to something the prior quote cannot pin down.
async fn apply_delta(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(delta): Json<PartialSpecification>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id();
    let outcome = state
        .quotes
        .apply_delta(&ConversationId(id), &delta)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok(match outcome {
        DeltaOutcome::Applied(quote) => (StatusCode::OK, Json(quote)).into_response(),
        DeltaOutcome::ClarificationNeeded(clarification) => {
            (StatusCode::CONFLICT, Json(clarification)).into_response()
        }
    })
}

// ---------------------------------------------------------------------------
// Pricing administration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub category: CostCategory,
    pub invalidated: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrewarmQuery {
    /// Comma-separated quantities; the configured list when absent.
    pub quantities: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrewarmAccepted {
    pub status: String,
    pub quantities: Vec<u32>,
}

async fn cache_stats(State(state): State<ApiState>) -> Json<CacheStats> {
    Json(state.pricing.cache_stats())
}

async fn clear_cache(State(state): State<ApiState>) -> StatusCode {
    state.pricing.clear_cache();
    info!(
        event_name = "pricing.cache.cleared",
        correlation_id = "cache_admin",
        "pricing cache cleared"
    );
    StatusCode::NO_CONTENT
}

async fn invalidate_category(
    Path(category): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let correlation_id = correlation_id();
    let category = category
        .parse::<CostCategory>()
        .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?;
    let invalidated = state.pricing.invalidate_category(category);
    Ok(Json(InvalidateResponse { category, invalidated }))
}

async fn prewarm_cache(
    State(state): State<ApiState>,
    Query(query): Query<PrewarmQuery>,
) -> Result<(StatusCode, Json<PrewarmAccepted>), ApiError> {
    let correlation_id = correlation_id();
    let quantities = match query.quantities.as_deref() {
        Some(raw) => parse_quantities(raw)
            .map_err(|message| ApiError::bad_request(message, &correlation_id))?,
        None => state.pricing.settings().prewarm_quantities.clone(),
    };

    drop(state.pricing.spawn_prewarm(quantities.clone()));
    Ok((
        StatusCode::ACCEPTED,
        Json(PrewarmAccepted { status: "accepted".to_string(), quantities }),
    ))
}

async fn refresh_catalog(
    State(state): State<ApiState>,
) -> Result<Json<CatalogLoadReport>, ApiError> {
    let correlation_id = correlation_id();
    let report = state
        .pricing
        .refresh(state.provider.as_ref())
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(report))
}

fn parse_quantities(raw: &str) -> Result<Vec<u32>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.parse::<u32>() {
            Ok(quantity) if quantity > 0 => Ok(quantity),
            _ => Err(format!("invalid prewarm quantity `{item}`")),
        })
        .collect()
}
