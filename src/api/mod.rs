//! # API — HTTP Surface for the Settlement Core
//!
//! Runs an Axum HTTP server exposing the three settlement operations
//! (guarantee sweep, winner selection, payout processing) plus the boost
//! and retry actions, round inspection, and the health/metrics trio.
//!
//! Every operation responds with a uniform envelope: `{"success": true,
//! ...payload}` on success, `{"success": false, "error": "..."}` with a
//! non-2xx status on failure. All operations are idempotent per the core's
//! guards, so schedulers and admins may re-invoke them freely.

mod routes_entries;
mod routes_guarantees;
mod routes_health;
mod routes_payouts;
mod routes_rounds;
mod routes_winners;

use crate::error::MarketError;
use crate::payout::TransferProvider;
use crate::{db, prom_metrics};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

pub struct AppState {
    pub db: db::Database,
    pub transfer: Arc<dyn TransferProvider>,
    pub transfer_timeout: Duration,
    pub prom_metrics: prom_metrics::Metrics,
}

impl AppState {
    pub fn new(
        db: db::Database,
        transfer: Arc<dyn TransferProvider>,
        transfer_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(AppState {
            db,
            transfer,
            transfer_timeout,
            prom_metrics: prom_metrics::Metrics::new(),
        })
    }
}

/// Wrap a payload in the success envelope.
pub(crate) fn envelope_ok(payload: serde_json::Value) -> Response {
    let mut body = payload;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("success".into(), serde_json::json!(true));
    }
    Json(body).into_response()
}

/// Build the failure envelope with an explicit status code.
pub(crate) fn envelope_err(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": message })),
    )
        .into_response()
}

/// Map a domain error to its HTTP status and failure envelope.
pub(crate) fn error_response(err: &MarketError) -> Response {
    let status = match err {
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::Forbidden => StatusCode::FORBIDDEN,
        MarketError::ContestStillActive
        | MarketError::AlreadyCompleted
        | MarketError::LimitExceeded { .. } => StatusCode::CONFLICT,
        MarketError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
        MarketError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    envelope_err(status, &err.to_string())
}

/// Middleware that records HTTP request duration into the Prometheus
/// histogram, generates (or propagates) a request ID for correlation, and
/// wraps the request in a tracing span using `.instrument()` for proper
/// async propagation.
async fn metrics_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let norm_path = normalize_path(&raw_path);
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let response = next.run(req).instrument(span).await;

    let duration = start.elapsed().as_secs_f64();
    state
        .prom_metrics
        .http_request_duration
        .get_or_create(&prom_metrics::HttpLabel {
            method,
            path: norm_path,
        })
        .observe(duration);

    let mut response = response;
    response
        .headers_mut()
        .insert("x-request-id", request_id.parse().unwrap());
    response
}

/// Normalize URL path to collapse high-cardinality segments (numeric IDs)
/// into placeholders, preventing histogram label explosion.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()) {
                ":id".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .route(
            "/api/guarantees/check",
            post(routes_guarantees::handler_guarantees_check),
        )
        .route(
            "/api/winners/select",
            post(routes_winners::handler_winners_select),
        )
        .route(
            "/api/payouts/process",
            post(routes_payouts::handler_payouts_process),
        )
        .route(
            "/api/payouts/retry",
            post(routes_payouts::handler_payouts_retry),
        )
        .route(
            "/api/entries/boost",
            post(routes_entries::handler_entries_boost),
        )
        .route("/api/rounds/{id}", get(routes_rounds::handler_round_get))
        // Un-prefixed aliases for schedulers wired to the bare operation paths.
        .route(
            "/guarantees/check",
            post(routes_guarantees::handler_guarantees_check),
        )
        .route(
            "/winners/select",
            post(routes_winners::handler_winners_select),
        )
        .route(
            "/payouts/process",
            post(routes_payouts::handler_payouts_process),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_collapses_numeric_ids() {
        assert_eq!(normalize_path("/api/rounds/1234"), "/api/rounds/:id");
        assert_eq!(normalize_path("/api/rounds"), "/api/rounds");
        assert_eq!(normalize_path("/healthz"), "/healthz");
    }

    #[test]
    fn envelope_ok_merges_success_flag() {
        let resp = envelope_ok(serde_json::json!({ "message": "done" }));
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
