use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use capquote_core::domain::breakdown::PriceSource;
use capquote_core::pricing::PricingService;
use capquote_db::{ping, DbPool};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub pricing: Arc<PricingService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub pricing: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Fallback prices still answer quotes, so they degrade the report without
/// failing it. Only an unreachable database is a 503.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let pricing = pricing_check(&state.pricing);
    let ready = database.status == "ready" && pricing.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "capquote-server runtime initialized".to_string(),
        },
        database: database.clone(),
        pricing,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code =
        if database.status == "ready" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn pricing_check(pricing: &PricingService) -> HealthCheck {
    let catalog = pricing.catalog();
    let products = catalog.products().count();
    match catalog.source() {
        PriceSource::Fallback => HealthCheck {
            status: "degraded",
            detail: format!("serving compiled-in fallback prices ({products} products)"),
        },
        PriceSource::Live if products == 0 => HealthCheck {
            status: "degraded",
            detail: "price catalog is empty".to_string(),
        },
        PriceSource::Live => HealthCheck {
            status: "ready",
            detail: format!("live price catalog loaded ({products} products)"),
        },
    }
}
