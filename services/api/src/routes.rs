use crate::infra::{AppState, SharedLoanData};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use homebuyer::affordability::{affordability_router, AffordabilityService};
use homebuyer::flags::FeatureFlagStore;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes<F>(service: Arc<AffordabilityService<F>>) -> axum::Router
where
    F: FeatureFlagStore + 'static,
{
    affordability_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/loan-data", axum::routing::get(loan_data_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Loan fields most recently pushed by the coordinator.
pub(crate) async fn loan_data_endpoint(
    Extension(loan_data): Extension<SharedLoanData>,
) -> Json<serde_json::Value> {
    match loan_data.snapshot() {
        Some((location, bundle)) => Json(json!({
            "location": location,
            "rates": bundle,
        })),
        None => Json(json!({
            "location": null,
            "rates": null,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use homebuyer::rates::{LoanDataSink, LocationKey, RateBundle, RateSourceKind};

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn loan_data_endpoint_reflects_sink_updates() {
        let loan_data = SharedLoanData::default();

        let Json(empty) = loan_data_endpoint(Extension(loan_data.clone())).await;
        assert!(empty["rates"].is_null());

        let location =
            LocationKey::from_parts(Some("AZ"), Some("Maricopa"), None).expect("complete location");
        loan_data.apply(
            &location,
            &RateBundle {
                conventional_rate: Some(6.9),
                fha_rate: Some(6.4),
                property_tax_rate: Some(0.6),
                property_insurance_rate: Some(0.5),
                upfront_mip: None,
                ongoing_mip: None,
                source: RateSourceKind::AiInference,
                fetched_at: Utc::now(),
                rate_date: None,
            },
        );

        let Json(body) = loan_data_endpoint(Extension(loan_data)).await;
        assert_eq!(body["location"]["county"], "Maricopa");
        assert_eq!(body["rates"]["source"], "ai_inference");
    }
}
