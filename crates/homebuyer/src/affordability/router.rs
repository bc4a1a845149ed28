use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::service::{AffordabilityService, AffordabilityServiceError, LocationInput, QuoteRequest};
use crate::error::AppError;
use crate::flags::{FeatureFlag, FeatureFlagStore};
use crate::rates::{
    AcquisitionOutcome, AcquisitionPhase, AcquisitionResult, FetchProgressState, LocationKey,
    RateBundle,
};

/// Router builder exposing rate acquisition, affordability, and flag endpoints.
pub fn affordability_router<F>(service: Arc<AffordabilityService<F>>) -> Router
where
    F: FeatureFlagStore + 'static,
{
    Router::new()
        .route("/api/v1/rates", get(rates_handler::<F>))
        .route("/api/v1/rates/refresh", post(refresh_handler::<F>))
        .route("/api/v1/rates/progress", get(progress_handler::<F>))
        .route("/api/v1/affordability", post(quote_handler::<F>))
        .route(
            "/api/v1/flags/:user_id",
            get(flags_handler::<F>).put(set_flag_handler::<F>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub struct RatesQuery {
    pub state: Option<String>,
    pub county: Option<String>,
    pub zip: Option<String>,
    #[serde(default)]
    pub silent: bool,
}

impl RatesQuery {
    fn location(&self) -> LocationInput {
        LocationInput {
            state: self.state.clone(),
            county: self.county.clone(),
            zip_code: self.zip.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLabel {
    Cached,
    Fetched,
    Discarded,
}

#[derive(Debug, Serialize)]
pub struct RatesView {
    pub outcome: OutcomeLabel,
    pub phase: AcquisitionPhase,
    pub location: Option<LocationKey>,
    pub bundle: Option<RateBundle>,
    pub progress: FetchProgressState,
}

#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub phase: AcquisitionPhase,
    pub location: Option<LocationKey>,
    #[serde(flatten)]
    pub progress: FetchProgressState,
}

#[derive(Debug, Deserialize)]
pub struct FlagUpdate {
    pub flag: FeatureFlag,
    pub enabled: bool,
}

pub(crate) async fn rates_handler<F>(
    State(service): State<Arc<AffordabilityService<F>>>,
    Query(query): Query<RatesQuery>,
) -> Response
where
    F: FeatureFlagStore + 'static,
{
    let result = service.rates(&query.location(), query.silent).await;
    rates_response(&service, result)
}

pub(crate) async fn refresh_handler<F>(
    State(service): State<Arc<AffordabilityService<F>>>,
    Query(query): Query<RefreshQuery>,
) -> Response
where
    F: FeatureFlagStore + 'static,
{
    let result = service.refresh(query.silent).await;
    rates_response(&service, result)
}

pub(crate) async fn progress_handler<F>(
    State(service): State<Arc<AffordabilityService<F>>>,
) -> Response
where
    F: FeatureFlagStore + 'static,
{
    let view = ProgressView {
        phase: service.coordinator().phase(),
        location: service.coordinator().current_location(),
        progress: service.progress(),
    };
    (StatusCode::OK, axum::Json(view)).into_response()
}

pub(crate) async fn quote_handler<F>(
    State(service): State<Arc<AffordabilityService<F>>>,
    axum::Json(request): axum::Json<QuoteRequest>,
) -> Response
where
    F: FeatureFlagStore + 'static,
{
    match service.quote(request).await {
        Ok(quote) => (StatusCode::OK, axum::Json(quote)).into_response(),
        Err(AffordabilityServiceError::Acquisition(error)) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn flags_handler<F>(
    State(service): State<Arc<AffordabilityService<F>>>,
    Path(user_id): Path<String>,
) -> Response
where
    F: FeatureFlagStore + 'static,
{
    let overrides = service.flags().overrides(&user_id);
    (StatusCode::OK, axum::Json(flag_view(&user_id, overrides))).into_response()
}

pub(crate) async fn set_flag_handler<F>(
    State(service): State<Arc<AffordabilityService<F>>>,
    Path(user_id): Path<String>,
    axum::Json(update): axum::Json<FlagUpdate>,
) -> Response
where
    F: FeatureFlagStore + 'static,
{
    service
        .flags()
        .set_override(&user_id, update.flag, update.enabled);
    let overrides = service.flags().overrides(&user_id);
    (StatusCode::OK, axum::Json(flag_view(&user_id, overrides))).into_response()
}

fn flag_view(user_id: &str, overrides: BTreeMap<FeatureFlag, bool>) -> serde_json::Value {
    let overrides: BTreeMap<&'static str, bool> = overrides
        .into_iter()
        .map(|(flag, enabled)| (flag.key(), enabled))
        .collect();
    json!({
        "user_id": user_id,
        "overrides": overrides,
    })
}

fn rates_response<F>(service: &AffordabilityService<F>, result: AcquisitionResult) -> Response
where
    F: FeatureFlagStore + 'static,
{
    match result {
        Ok(outcome) => {
            let label = match &outcome {
                AcquisitionOutcome::Cached(_) => OutcomeLabel::Cached,
                AcquisitionOutcome::Fetched(_) => OutcomeLabel::Fetched,
                AcquisitionOutcome::Discarded => OutcomeLabel::Discarded,
            };
            let view = RatesView {
                outcome: label,
                phase: service.coordinator().phase(),
                location: service.coordinator().current_location(),
                bundle: outcome.bundle().cloned(),
                progress: service.progress(),
            };
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => AppError::from(error).into_response(),
    }
}
