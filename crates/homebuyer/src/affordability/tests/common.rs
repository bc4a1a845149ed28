use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::affordability::domain::{BorrowerProfile, LoanRequest, LoanType};
use crate::affordability::service::{AffordabilityService, LocationInput, QuoteRequest};
use crate::flags::InMemoryFeatureFlags;
use crate::rates::{
    DataAcquisitionCoordinator, InMemoryKeyValueStore, LoanDataSink, LocationKey, RateBand,
    RateBundle, RateDataFetcher, RateDataStore, RateSource, RateSourceKind, SourceError,
    SystemClock,
};

pub(super) fn bundle() -> RateBundle {
    RateBundle {
        conventional_rate: Some(6.5),
        fha_rate: Some(6.125),
        property_tax_rate: Some(1.6),
        property_insurance_rate: Some(0.4),
        upfront_mip: None,
        ongoing_mip: None,
        source: RateSourceKind::DatabaseSnapshot,
        fetched_at: Utc::now(),
        rate_date: None,
    }
}

/// Source answering every location with the same bundle, or failing.
pub(super) struct StaticSource {
    bundle: Option<RateBundle>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub(super) fn answering(bundle: RateBundle) -> Self {
        Self {
            bundle: Some(bundle),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn down() -> Self {
        Self {
            bundle: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for StaticSource {
    fn kind(&self) -> RateSourceKind {
        RateSourceKind::DatabaseSnapshot
    }

    async fn fetch(&self, _location: &LocationKey) -> Result<RateBundle, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bundle.clone().ok_or_else(|| {
            SourceError::Unavailable(RateSourceKind::DatabaseSnapshot, "offline".to_string())
        })
    }
}

#[derive(Default)]
pub(super) struct LoanFields {
    current: Mutex<Option<RateBundle>>,
}

impl LoanFields {
    pub(super) fn current(&self) -> Option<RateBundle> {
        self.current.lock().expect("loan fields mutex poisoned").clone()
    }
}

impl LoanDataSink for LoanFields {
    fn apply(&self, _location: &LocationKey, bundle: &RateBundle) {
        *self.current.lock().expect("loan fields mutex poisoned") = Some(bundle.clone());
    }

    fn clear(&self) {
        *self.current.lock().expect("loan fields mutex poisoned") = None;
    }
}

pub(super) struct Fixture {
    pub(super) service: Arc<AffordabilityService<InMemoryFeatureFlags>>,
    pub(super) flags: Arc<InMemoryFeatureFlags>,
    pub(super) fields: Arc<LoanFields>,
}

pub(super) fn fixture(source: Arc<StaticSource>) -> Fixture {
    let clock = Arc::new(SystemClock);
    let store = RateDataStore::new(
        Arc::new(InMemoryKeyValueStore::default()),
        clock.clone(),
        Duration::from_secs(4 * 60 * 60),
    );
    let fetcher =
        RateDataFetcher::new(Duration::from_secs(5), RateBand::default(), clock).with_source(source);
    let fields = Arc::new(LoanFields::default());
    let coordinator = Arc::new(DataAcquisitionCoordinator::new(store, fetcher, fields.clone()));
    let flags = Arc::new(InMemoryFeatureFlags::default());
    let service = Arc::new(AffordabilityService::new(coordinator, flags.clone()));

    Fixture {
        service,
        flags,
        fields,
    }
}

pub(super) fn profile() -> BorrowerProfile {
    BorrowerProfile {
        annual_income: 110_000.0,
        fico_score: 705,
        monthly_debts: 0.0,
        debt_items: Vec::new(),
        selected_factors: BTreeMap::from([(
            "cash_reserves".to_string(),
            "3-5 months".to_string(),
        )]),
    }
}

pub(super) fn location() -> LocationInput {
    LocationInput {
        state: Some("CO".to_string()),
        county: Some("Denver".to_string()),
        zip_code: Some("80202".to_string()),
    }
}

pub(super) fn quote_request(user_id: Option<&str>) -> QuoteRequest {
    QuoteRequest {
        user_id: user_id.map(str::to_string),
        location: location(),
        profile: profile(),
        loan: LoanRequest {
            loan_type: LoanType::Conventional,
            down_payment_percent: 10.0,
        },
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
