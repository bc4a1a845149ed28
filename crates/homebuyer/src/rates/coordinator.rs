use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use super::domain::{LocationKey, RateBundle};
use super::fetcher::{FetchError, RateDataFetcher};
use super::progress::FetchProgressState;
use super::store::RateDataStore;

/// Acquisition lifecycle for the current location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionPhase {
    Idle,
    Checking,
    CacheHit,
    Fetching,
    Ready,
    Error,
}

/// Callbacks pushing loan data back into shared application state.
///
/// Invoked while the coordinator holds its state lock so that writes land in
/// cycle order; implementations must not call back into the coordinator.
pub trait LoanDataSink: Send + Sync {
    fn apply(&self, location: &LocationKey, bundle: &RateBundle);
    fn clear(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    Cached(RateBundle),
    Fetched(RateBundle),
    /// The location changed while the fetch was in flight; its result was dropped.
    Discarded,
}

impl AcquisitionOutcome {
    pub fn bundle(&self) -> Option<&RateBundle> {
        match self {
            AcquisitionOutcome::Cached(bundle) | AcquisitionOutcome::Fetched(bundle) => Some(bundle),
            AcquisitionOutcome::Discarded => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AcquisitionError {
    #[error("state and county are required before rates can be loaded")]
    LocationMissing,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type AcquisitionResult = Result<AcquisitionOutcome, AcquisitionError>;

struct InFlight {
    location: LocationKey,
    generation: u64,
    done: watch::Receiver<Option<AcquisitionResult>>,
}

struct CoordinatorState {
    phase: AcquisitionPhase,
    location: Option<LocationKey>,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl CoordinatorState {
    fn is_cycle(&self, key: &LocationKey, generation: u64) -> bool {
        self.generation == generation && self.location.as_ref() == Some(key)
    }
}

enum Plan {
    Done(AcquisitionResult),
    Join(watch::Receiver<Option<AcquisitionResult>>),
    Lead {
        generation: u64,
        sender: watch::Sender<Option<AcquisitionResult>>,
    },
}

/// Decides per location change whether to serve the cache or fetch, and owns
/// the cache slot. At most one fetch runs per location; every fetch cycle is
/// tagged with a generation and its result only applies if that generation is
/// still current on completion.
pub struct DataAcquisitionCoordinator {
    store: RateDataStore,
    fetcher: RateDataFetcher,
    sink: Arc<dyn LoanDataSink>,
    state: Mutex<CoordinatorState>,
}

impl DataAcquisitionCoordinator {
    pub fn new(store: RateDataStore, fetcher: RateDataFetcher, sink: Arc<dyn LoanDataSink>) -> Self {
        Self {
            store,
            fetcher,
            sink,
            state: Mutex::new(CoordinatorState {
                phase: AcquisitionPhase::Idle,
                location: None,
                generation: 0,
                in_flight: None,
            }),
        }
    }

    pub fn phase(&self) -> AcquisitionPhase {
        self.lock().phase
    }

    pub fn current_location(&self) -> Option<LocationKey> {
        self.lock().location.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn progress(&self) -> FetchProgressState {
        self.fetcher.progress().current()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<FetchProgressState> {
        self.fetcher.progress().subscribe()
    }

    /// Move an errored cycle back to idle once the error has been shown.
    pub fn acknowledge_error(&self) {
        let mut state = self.lock();
        if state.phase == AcquisitionPhase::Error {
            state.phase = AcquisitionPhase::Idle;
        }
    }

    /// React to the location inputs changing. `None` means state or county is
    /// still missing, which never triggers a fetch.
    pub async fn on_location(&self, location: Option<LocationKey>, silent: bool) -> AcquisitionResult {
        match location {
            Some(key) => self.acquire(key, silent, false).await,
            None => {
                let mut state = self.lock();
                if state.location.take().is_some() {
                    state.generation += 1;
                    state.in_flight = None;
                }
                state.phase = AcquisitionPhase::Idle;
                Err(AcquisitionError::LocationMissing)
            }
        }
    }

    /// Re-fetch for the current location, bypassing the cache.
    pub async fn refresh(&self, silent: bool) -> AcquisitionResult {
        let key = self
            .current_location()
            .ok_or(AcquisitionError::LocationMissing)?;
        self.acquire(key, silent, true).await
    }

    async fn acquire(&self, key: LocationKey, silent: bool, bypass_cache: bool) -> AcquisitionResult {
        loop {
            match self.plan(&key, bypass_cache) {
                Plan::Done(result) => return result,
                Plan::Join(receiver) => {
                    debug!(state = %key.state, county = %key.county, "joining in-flight rate fetch");
                    if let Some(result) = wait_for(receiver).await {
                        return result;
                    }
                    // Leader went away without publishing; plan again.
                }
                Plan::Lead { generation, sender } => {
                    let fetched = self
                        .fetcher
                        .fetch_while(&key, &|| self.is_current(&key, generation))
                        .await;
                    let result = self.complete(&key, generation, fetched, silent);
                    sender.send_replace(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    fn plan(&self, key: &LocationKey, bypass_cache: bool) -> Plan {
        let mut state = self.lock();

        if state.location.as_ref() != Some(key) {
            state.generation += 1;
            state.location = Some(key.clone());
            state.in_flight = None;
            self.store.invalidate_other(key);
            debug!(state = %key.state, county = %key.county, generation = state.generation, "location changed");
        }

        if let Some(in_flight) = &state.in_flight {
            let alive = in_flight.done.has_changed().is_ok();
            if alive && &in_flight.location == key && in_flight.generation == state.generation {
                return Plan::Join(in_flight.done.clone());
            }
            state.in_flight = None;
        }

        state.phase = AcquisitionPhase::Checking;

        if !bypass_cache {
            if let Some(entry) = self.store.read(key) {
                if self.store.is_fresh(&entry, key, self.store.now()) {
                    state.phase = AcquisitionPhase::CacheHit;
                    info!(state = %key.state, county = %key.county, "serving cached rates");
                    self.sink.apply(key, &entry.bundle);
                    self.fetcher.progress().succeeded("Using cached rates");
                    state.phase = AcquisitionPhase::Ready;
                    return Plan::Done(Ok(AcquisitionOutcome::Cached(entry.bundle)));
                }
                debug!(state = %key.state, county = %key.county, "cached rates are stale");
            }
        }

        let (sender, receiver) = watch::channel(None);
        state.in_flight = Some(InFlight {
            location: key.clone(),
            generation: state.generation,
            done: receiver,
        });
        state.phase = AcquisitionPhase::Fetching;

        Plan::Lead {
            generation: state.generation,
            sender,
        }
    }

    fn complete(
        &self,
        key: &LocationKey,
        generation: u64,
        fetched: Result<RateBundle, FetchError>,
        silent: bool,
    ) -> AcquisitionResult {
        let mut state = self.lock();

        if !state.is_cycle(key, generation) {
            info!(
                state = %key.state,
                county = %key.county,
                generation,
                current = state.generation,
                "discarding rates for superseded location"
            );
            return Ok(AcquisitionOutcome::Discarded);
        }

        state.in_flight = None;
        self.fetcher.publish_outcome(key, &fetched, silent);

        match fetched {
            Ok(bundle) => {
                self.store.write(key, &bundle);
                self.sink.apply(key, &bundle);
                state.phase = AcquisitionPhase::Ready;
                Ok(AcquisitionOutcome::Fetched(bundle))
            }
            Err(err) => {
                self.store.invalidate();
                self.sink.clear();
                state.phase = AcquisitionPhase::Error;
                Err(err.into())
            }
        }
    }

    fn is_current(&self, key: &LocationKey, generation: u64) -> bool {
        self.lock().is_cycle(key, generation)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CoordinatorState> {
        self.state.lock().expect("coordinator mutex poisoned")
    }
}

async fn wait_for(
    mut receiver: watch::Receiver<Option<AcquisitionResult>>,
) -> Option<AcquisitionResult> {
    loop {
        let published = receiver.borrow_and_update().clone();
        if published.is_some() {
            return published;
        }
        if receiver.changed().await.is_err() {
            return receiver.borrow().clone();
        }
    }
}

impl std::fmt::Debug for DataAcquisitionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAcquisitionCoordinator")
            .field("phase", &self.phase())
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}
