//! Rate and property-cost acquisition: a single-slot cache, an ordered
//! fallback chain of backend sources, and the coordinator deciding between
//! them whenever the location changes.

pub mod coordinator;
pub mod domain;
pub mod fetcher;
pub mod progress;
pub mod sources;
pub mod store;

#[cfg(test)]
mod tests;

pub use coordinator::{
    AcquisitionError, AcquisitionOutcome, AcquisitionPhase, AcquisitionResult,
    DataAcquisitionCoordinator, LoanDataSink,
};
pub use domain::{CachedEntry, LocationKey, RateBand, RateBundle, RateSourceKind};
pub use fetcher::{FetchError, RateDataFetcher};
pub use progress::{
    FetchProgressState, Notice, NoticeLevel, Notifier, NoopNotifier, ProgressReporter,
};
pub use sources::{HttpRateSource, RatePayload, RateSource, SourceEnvelope, SourceError};
pub use store::{
    Clock, InMemoryKeyValueStore, KeyValueStore, RateDataStore, SystemClock, CACHE_SLOT_KEY,
};
