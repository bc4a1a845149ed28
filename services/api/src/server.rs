use crate::cli::ServeArgs;
use crate::infra::{AppState, LogNotifier, SharedLoanData};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use homebuyer::affordability::AffordabilityService;
use homebuyer::config::AppConfig;
use homebuyer::error::AppError;
use homebuyer::flags::InMemoryFeatureFlags;
use homebuyer::rates::{
    DataAcquisitionCoordinator, InMemoryKeyValueStore, RateDataFetcher, RateDataStore, SystemClock,
};
use homebuyer::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock = Arc::new(SystemClock);
    let store = RateDataStore::new(
        Arc::new(InMemoryKeyValueStore::default()),
        clock.clone(),
        config.rates.cache_ttl,
    );
    let fetcher = RateDataFetcher::from_config(&config.rates, reqwest::Client::new(), clock)
        .with_notifier(Arc::new(LogNotifier));
    if fetcher.source_kinds().is_empty() {
        warn!("no rate endpoints configured; every lookup will report rates unavailable");
    }

    let loan_data = SharedLoanData::default();
    let coordinator = Arc::new(DataAcquisitionCoordinator::new(
        store,
        fetcher,
        Arc::new(loan_data.clone()),
    ));
    let service = Arc::new(AffordabilityService::new(
        coordinator,
        Arc::new(InMemoryFeatureFlags::default()),
    ));

    let app = with_service_routes(service)
        .layer(Extension(app_state))
        .layer(Extension(loan_data))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "homebuyer affordability service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
