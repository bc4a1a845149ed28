use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{LocationKey, RateBundle, RateSourceKind};
use super::store::Clock;

/// One failed fallback step. Never surfaced on its own; the fetcher moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("{0} unavailable: {1}")]
    Unavailable(RateSourceKind, String),
    #[error("{0} timed out after {1:?}")]
    Timeout(RateSourceKind, Duration),
    #[error("{kind} returned rate {rate} outside sanity band {min}..{max}")]
    InvalidRateValue {
        kind: RateSourceKind,
        rate: f64,
        min: f64,
        max: f64,
    },
    #[error("{0} returned no usable mortgage rate")]
    Unusable(RateSourceKind),
    #[error("{0} returned a malformed response: {1}")]
    Malformed(RateSourceKind, String),
}

impl SourceError {
    pub fn kind(&self) -> RateSourceKind {
        match self {
            SourceError::Unavailable(kind, _)
            | SourceError::Timeout(kind, _)
            | SourceError::Unusable(kind)
            | SourceError::Malformed(kind, _) => *kind,
            SourceError::InvalidRateValue { kind, .. } => *kind,
        }
    }
}

/// One link of the fallback chain.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn kind(&self) -> RateSourceKind;
    async fn fetch(&self, location: &LocationKey) -> Result<RateBundle, SourceError>;
}

/// Tagged result every backend endpoint returns:
/// `{"success": true, "data": ...}` or `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> SourceEnvelope<T> {
    pub fn into_result(self, kind: RateSourceKind) -> Result<T, SourceError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(SourceError::Malformed(
                kind,
                "success without data".to_string(),
            )),
            (false, _) => Err(SourceError::Unavailable(
                kind,
                self.error.unwrap_or_else(|| "unspecified error".to_string()),
            )),
        }
    }
}

/// Wire shape shared by the three endpoints; each fills what it knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePayload {
    #[serde(default)]
    pub conventional_rate: Option<f64>,
    #[serde(default)]
    pub fha_rate: Option<f64>,
    #[serde(default)]
    pub property_tax_rate: Option<f64>,
    #[serde(default)]
    pub property_insurance_rate: Option<f64>,
    #[serde(default, rename = "upfrontMIP")]
    pub upfront_mip: Option<f64>,
    #[serde(default, rename = "ongoingMIP")]
    pub ongoing_mip: Option<f64>,
    #[serde(default)]
    pub rate_date: Option<NaiveDate>,
}

impl RatePayload {
    pub fn into_bundle(self, source: RateSourceKind, fetched_at: DateTime<Utc>) -> RateBundle {
        RateBundle {
            conventional_rate: finite(self.conventional_rate),
            fha_rate: finite(self.fha_rate),
            property_tax_rate: finite(self.property_tax_rate),
            property_insurance_rate: finite(self.property_insurance_rate),
            upfront_mip: finite(self.upfront_mip),
            ongoing_mip: finite(self.ongoing_mip),
            source,
            fetched_at,
            rate_date: self.rate_date,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateRequest<'a> {
    state: &'a str,
    county: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    zip_code: Option<&'a str>,
    as_of: NaiveDate,
}

/// JSON-over-HTTP backend for any of the three fallback steps. Dates sent and
/// stamped come from the same clock the fetcher validates against.
#[derive(Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    endpoint: String,
    kind: RateSourceKind,
    clock: Arc<dyn Clock>,
}

impl HttpRateSource {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        kind: RateSourceKind,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            kind,
            clock,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn kind(&self) -> RateSourceKind {
        self.kind
    }

    async fn fetch(&self, location: &LocationKey) -> Result<RateBundle, SourceError> {
        let request = RateRequest {
            state: location.state.trim(),
            county: location.county.trim(),
            zip_code: location.zip_code.as_deref(),
            as_of: self.clock.now().date_naive(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| SourceError::Unavailable(self.kind, err.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(
                self.kind,
                format!("status {}", response.status()),
            ));
        }

        let envelope: SourceEnvelope<RatePayload> = response
            .json()
            .await
            .map_err(|err| SourceError::Malformed(self.kind, err.to_string()))?;

        let payload = envelope.into_result(self.kind)?;
        Ok(payload.into_bundle(self.kind, self.clock.now()))
    }
}

impl std::fmt::Debug for HttpRateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRateSource")
            .field("endpoint", &self.endpoint)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
