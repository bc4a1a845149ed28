use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use crate::rates::coordinator::{DataAcquisitionCoordinator, LoanDataSink};
use crate::rates::domain::{LocationKey, RateBand, RateBundle, RateSourceKind};
use crate::rates::fetcher::RateDataFetcher;
use crate::rates::progress::{Notice, Notifier};
use crate::rates::sources::{RateSource, SourceError};
use crate::rates::store::{Clock, InMemoryKeyValueStore, RateDataStore};

pub(super) const TTL: Duration = Duration::from_secs(4 * 60 * 60);

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn travis() -> LocationKey {
    LocationKey::from_parts(Some("TX"), Some("Travis"), Some("78701")).expect("complete location")
}

pub(super) fn king() -> LocationKey {
    LocationKey::from_parts(Some("WA"), Some("King"), None).expect("complete location")
}

pub(super) fn bundle(source: RateSourceKind, conventional: Option<f64>) -> RateBundle {
    RateBundle {
        conventional_rate: conventional,
        fha_rate: conventional.map(|rate| rate - 0.4),
        property_tax_rate: Some(1.8),
        property_insurance_rate: Some(0.35),
        upfront_mip: None,
        ongoing_mip: None,
        source,
        fetched_at: start_time(),
        rate_date: None,
    }
}

#[derive(Debug)]
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

type Responder = dyn Fn(&LocationKey) -> Result<RateBundle, SourceError> + Send + Sync;

/// Scripted source counting its calls, optionally parking fetches for given
/// locations until released.
pub(super) struct FakeSource {
    kind: RateSourceKind,
    responder: Box<Responder>,
    calls: AtomicUsize,
    gates: Vec<(LocationKey, Arc<Notify>)>,
}

impl FakeSource {
    pub(super) fn ok(kind: RateSourceKind, conventional: f64) -> Self {
        Self::with(kind, move |_| Ok(bundle(kind, Some(conventional))))
    }

    pub(super) fn failing(kind: RateSourceKind) -> Self {
        Self::with(kind, move |_| {
            Err(SourceError::Unavailable(kind, "backend down".to_string()))
        })
    }

    pub(super) fn with<F>(kind: RateSourceKind, responder: F) -> Self
    where
        F: Fn(&LocationKey) -> Result<RateBundle, SourceError> + Send + Sync + 'static,
    {
        Self {
            kind,
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            gates: Vec::new(),
        }
    }

    pub(super) fn gated(mut self, location: LocationKey, gate: Arc<Notify>) -> Self {
        self.gates.push((location, gate));
        self
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for FakeSource {
    fn kind(&self) -> RateSourceKind {
        self.kind
    }

    async fn fetch(&self, location: &LocationKey) -> Result<RateBundle, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, gate)) = self.gates.iter().find(|(gated, _)| gated == location) {
            gate.notified().await;
        }
        (self.responder)(location)
    }
}

/// Source that never answers.
pub(super) struct HangingSource;

#[async_trait]
impl RateSource for HangingSource {
    fn kind(&self) -> RateSourceKind {
        RateSourceKind::DatabaseSnapshot
    }

    async fn fetch(&self, _location: &LocationKey) -> Result<RateBundle, SourceError> {
        std::future::pending().await
    }
}

#[derive(Default)]
pub(super) struct RecordingSink {
    applied: Mutex<Vec<(LocationKey, RateBundle)>>,
    clears: AtomicUsize,
}

impl RecordingSink {
    pub(super) fn applied(&self) -> Vec<(LocationKey, RateBundle)> {
        self.applied.lock().expect("sink mutex poisoned").clone()
    }

    pub(super) fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl LoanDataSink for RecordingSink {
    fn apply(&self, location: &LocationKey, bundle: &RateBundle) {
        self.applied
            .lock()
            .expect("sink mutex poisoned")
            .push((location.clone(), bundle.clone()));
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(super) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
    }
}

pub(super) fn store(clock: Arc<ManualClock>) -> (RateDataStore, Arc<InMemoryKeyValueStore>) {
    let kv = Arc::new(InMemoryKeyValueStore::default());
    (RateDataStore::new(kv.clone(), clock, TTL), kv)
}

pub(super) fn fetcher(clock: Arc<ManualClock>, sources: Vec<Arc<dyn RateSource>>) -> RateDataFetcher {
    sources.into_iter().fold(
        RateDataFetcher::new(Duration::from_secs(5), RateBand::default(), clock),
        |fetcher, source| fetcher.with_source(source),
    )
}

pub(super) struct Harness {
    pub(super) coordinator: DataAcquisitionCoordinator,
    pub(super) clock: Arc<ManualClock>,
    pub(super) kv: Arc<InMemoryKeyValueStore>,
    pub(super) sink: Arc<RecordingSink>,
    pub(super) notifier: Arc<RecordingNotifier>,
}

pub(super) fn harness(sources: Vec<Arc<dyn RateSource>>) -> Harness {
    let clock = Arc::new(ManualClock::new(start_time()));
    let (store, kv) = store(clock.clone());
    let sink = Arc::new(RecordingSink::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let fetcher = fetcher(clock.clone(), sources).with_notifier(notifier.clone());
    let coordinator = DataAcquisitionCoordinator::new(store, fetcher, sink.clone());
    Harness {
        coordinator,
        clock,
        kv,
        sink,
        notifier,
    }
}

pub(super) fn dynamic<S: RateSource + 'static>(source: &Arc<S>) -> Arc<dyn RateSource> {
    source.clone()
}
