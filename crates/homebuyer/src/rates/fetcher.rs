use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::domain::{LocationKey, RateBand, RateBundle, RateSourceKind};
use super::progress::{Notice, NoticeLevel, Notifier, NoopNotifier, ProgressReporter};
use super::sources::{HttpRateSource, RateSource, SourceError};
use super::store::Clock;
use crate::config::RatesConfig;

/// Terminal failure of the whole fallback chain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("unable to load mortgage rates: all {} source(s) failed", .failures.len())]
    AllSourcesExhausted { failures: Vec<SourceError> },
}

/// Walks the ordered fallback chain and returns the first usable bundle.
pub struct RateDataFetcher {
    sources: Vec<Arc<dyn RateSource>>,
    step_timeout: Duration,
    sanity_band: RateBand,
    clock: Arc<dyn Clock>,
    progress: ProgressReporter,
    notifier: Arc<dyn Notifier>,
}

impl RateDataFetcher {
    pub fn new(step_timeout: Duration, sanity_band: RateBand, clock: Arc<dyn Clock>) -> Self {
        Self {
            sources: Vec::new(),
            step_timeout,
            sanity_band,
            clock,
            progress: ProgressReporter::new(),
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Chain of HTTP sources in priority order: snapshot, scrape, inference.
    pub fn from_config(config: &RatesConfig, client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        let endpoints = [
            (&config.endpoints.snapshot_url, RateSourceKind::DatabaseSnapshot),
            (&config.endpoints.scrape_url, RateSourceKind::ScrapedIndex),
            (&config.endpoints.inference_url, RateSourceKind::AiInference),
        ];

        endpoints.into_iter().fold(
            Self::new(config.step_timeout, config.sanity_band, clock.clone()),
            |fetcher, (endpoint, kind)| match endpoint {
                Some(url) => fetcher.with_source(Arc::new(HttpRateSource::new(
                    client.clone(),
                    url.clone(),
                    kind,
                    clock.clone(),
                ))),
                None => fetcher,
            },
        )
    }

    pub fn with_source(mut self, source: Arc<dyn RateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn source_kinds(&self) -> Vec<RateSourceKind> {
        self.sources.iter().map(|source| source.kind()).collect()
    }

    /// Try each source in order, stopping at the first usable bundle. Only
    /// per-step progress is published; see [`RateDataFetcher::publish_outcome`].
    pub async fn fetch(&self, location: &LocationKey) -> Result<RateBundle, FetchError> {
        self.fetch_while(location, &|| true).await
    }

    /// Like `fetch`, but step progress is only published while `is_current`
    /// holds, so a superseded cycle stops touching the shared progress state.
    pub async fn fetch_while(
        &self,
        location: &LocationKey,
        is_current: &(dyn Fn() -> bool + Sync),
    ) -> Result<RateBundle, FetchError> {
        if is_current() {
            self.progress
                .started(format!("Looking up rates for {}", location.label()));
        }

        let total = self.sources.len().max(1);
        let mut failures = Vec::new();

        for (index, source) in self.sources.iter().enumerate() {
            let kind = source.kind();
            if is_current() {
                self.progress
                    .advance(step_progress(index, total), format!("Checking {kind}"));
            }

            match self.attempt(source.as_ref(), location).await {
                Ok(bundle) => {
                    info!(state = %location.state, county = %location.county, source = %kind, "rates loaded");
                    return Ok(bundle);
                }
                Err(err) => {
                    warn!(state = %location.state, county = %location.county, source = %kind, error = %err, "rate source failed; falling back");
                    failures.push(err);
                }
            }
        }

        let error = FetchError::AllSourcesExhausted { failures };
        warn!(state = %location.state, county = %location.county, "{error}");
        Err(error)
    }

    /// Terminal progress and, unless `silent`, a notice for a finished fetch.
    /// Callers publish only outcomes that still apply to the current location.
    pub fn publish_outcome(
        &self,
        location: &LocationKey,
        outcome: &Result<RateBundle, FetchError>,
        silent: bool,
    ) {
        let notice = match outcome {
            Ok(bundle) => {
                self.progress
                    .succeeded(format!("Rates loaded from {}", bundle.source));
                Notice {
                    level: NoticeLevel::Success,
                    message: format!("Rates updated for {}", location.label()),
                }
            }
            Err(error) => {
                self.progress.failed(error.to_string());
                Notice {
                    level: NoticeLevel::Error,
                    message: error.to_string(),
                }
            }
        };

        if !silent {
            self.notifier.notify(notice);
        }
    }

    async fn attempt(&self, source: &dyn RateSource, location: &LocationKey) -> Result<RateBundle, SourceError> {
        let kind = source.kind();
        let bundle = tokio::time::timeout(self.step_timeout, source.fetch(location))
            .await
            .map_err(|_| SourceError::Timeout(kind, self.step_timeout))??;

        self.validate(kind, bundle)
    }

    fn validate(&self, kind: RateSourceKind, bundle: RateBundle) -> Result<RateBundle, SourceError> {
        if !bundle.is_usable() {
            return Err(SourceError::Unusable(kind));
        }

        if kind == RateSourceKind::ScrapedIndex {
            let rate = bundle.conventional_rate.ok_or(SourceError::Unusable(kind))?;
            if !self.sanity_band.contains(rate) {
                return Err(SourceError::InvalidRateValue {
                    kind,
                    rate,
                    min: self.sanity_band.min,
                    max: self.sanity_band.max,
                });
            }
        }

        let today = self.clock.now().date_naive();
        if let Some(rate_date) = bundle.rate_date {
            if rate_date > today {
                return Err(SourceError::Malformed(
                    kind,
                    format!("rate date {rate_date} is after {today}"),
                ));
            }
        }

        Ok(bundle)
    }
}

fn step_progress(index: usize, total: usize) -> u8 {
    let span = 90 / total;
    (10 + index * span).min(95) as u8
}

impl std::fmt::Debug for RateDataFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateDataFetcher")
            .field("sources", &self.source_kinds())
            .field("step_timeout", &self.step_timeout)
            .field("sanity_band", &self.sanity_band)
            .finish_non_exhaustive()
    }
}
