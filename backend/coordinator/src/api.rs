//! Axum REST API handlers.
//!
//! A thin shell over [`crate::lifecycle`] and [`crate::metrics`]. Caller
//! identity arrives in the `x-user-id` header, set by the upstream auth
//! layer; role checks happen there too.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::errors::{Result, ServiceError};
use crate::lifecycle;
use crate::metrics;
use crate::models::{Acceptance, ListFilter, NewDonation};

/// Header carrying the authenticated caller's id.
pub const CALLER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// Prefix every donation and analytics route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

pub fn router(state: Arc<ApiState>) -> Router {
    let v1 = Router::new()
        .route("/donations", post(create_donation).get(list_donations))
        .route("/donations/:id", get(get_donation))
        .route("/donations/:id/acceptances", get(list_acceptances))
        .route("/donations/:id/accept", post(accept_donation))
        .route("/donations/:id/complete", post(complete_donation))
        .route("/donations/:id/cancel", post(cancel_donation))
        .route("/analytics/metrics", get(get_metrics))
        .route("/analytics/donor/:donor_id", get(get_donor_stats));

    Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, v1)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub area: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListParams {
    fn into_filter(self, default_limit: u32, max_limit: u32) -> Result<ListFilter> {
        let defaults = ListFilter::default();
        Ok(ListFilter {
            area: self.area,
            status: match self.status {
                Some(s) => s.parse()?,
                None => defaults.status,
            },
            sort: match self.sort {
                Some(s) => s.parse()?,
                None => defaults.sort,
            },
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(default_limit).min(max_limit),
        })
    }
}

#[derive(Serialize)]
pub struct AcceptResponse {
    pub message: &'static str,
    pub acceptance: Acceptance,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::DonationUnavailable => StatusCode::CONFLICT,
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::NotAuthorized => StatusCode::FORBIDDEN,
            ServiceError::InvalidTransition { .. } | ServiceError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Migrate(_)
            | ServiceError::Config(_)
            | ServiceError::Store(_)
            | ServiceError::CorruptRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            error!("Request failed: {self}");
            if self.is_retriable() {
                "Store unavailable, retry later".to_string()
            } else {
                "Server error".to_string()
            }
        } else {
            self.to_string()
        };

        (
            status,
            Json(serde_json::json!(ErrorResponse { error: message })),
        )
            .into_response()
    }
}

fn caller_id(headers: &HeaderMap) -> Result<String> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ServiceError::Unauthenticated)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /donations`
pub async fn create_donation(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<NewDonation>,
) -> Result<impl IntoResponse> {
    let donor_id = caller_id(&headers)?;
    let donation = lifecycle::create_donation(&state.pool, &donor_id, body).await?;
    Ok((StatusCode::CREATED, Json(donation)))
}

/// `GET /donations?area=&status=&sort=&page=&limit=`
///
/// Defaults to available donations, newest first.
pub async fn list_donations(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse> {
    let filter = params.into_filter(state.default_page_size, state.max_page_size)?;
    let donations = lifecycle::list_donations(&state.pool, &filter).await?;
    Ok(Json(donations))
}

/// `GET /donations/:id`
pub async fn get_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(lifecycle::get_donation(&state.pool, &id).await?))
}

/// `POST /donations/:id/accept`
pub async fn accept_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let volunteer_id = caller_id(&headers)?;
    let acceptance = lifecycle::accept_donation(&state.pool, &id, &volunteer_id).await?;
    Ok(Json(AcceptResponse {
        message: "Donation accepted",
        acceptance,
    }))
}

/// `GET /donations/:id/acceptances`
pub async fn list_acceptances(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(lifecycle::list_acceptances(&state.pool, &id).await?))
}

/// `POST /donations/:id/complete`
pub async fn complete_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let volunteer_id = caller_id(&headers)?;
    lifecycle::complete_donation(&state.pool, &id, &volunteer_id).await?;
    Ok(Json(MessageResponse {
        message: "Donation completed",
    }))
}

/// `POST /donations/:id/cancel`
pub async fn cancel_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let donor_id = caller_id(&headers)?;
    Ok(Json(
        lifecycle::cancel_donation(&state.pool, &id, &donor_id).await?,
    ))
}

/// `GET /analytics/metrics`
pub async fn get_metrics(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse> {
    Ok(Json(metrics::get_metrics(&state.pool).await?))
}

/// `GET /analytics/donor/:donor_id`
pub async fn get_donor_stats(
    State(state): State<Arc<ApiState>>,
    Path(donor_id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(metrics::get_donor_stats(&state.pool, &donor_id).await?))
}
