use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identity used to scope cached rate data. Two keys are equal when state and
/// county match; the zip code is advisory and ignored for equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationKey {
    pub state: String,
    pub county: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

impl LocationKey {
    /// Build a key only when both state and county are present.
    pub fn from_parts(state: Option<&str>, county: Option<&str>, zip_code: Option<&str>) -> Option<Self> {
        let state = state.map(str::trim).filter(|value| !value.is_empty())?;
        let county = county.map(str::trim).filter(|value| !value.is_empty())?;
        let zip_code = zip_code
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Some(Self {
            state: state.to_string(),
            county: county.to_string(),
            zip_code,
        })
    }

    fn normalized(&self) -> (String, String) {
        (
            self.state.trim().to_ascii_lowercase(),
            self.county.trim().to_ascii_lowercase(),
        )
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.county.trim(), self.state.trim())
    }
}

impl PartialEq for LocationKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for LocationKey {}

impl Hash for LocationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

/// Which step of the fallback chain produced a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSourceKind {
    DatabaseSnapshot,
    ScrapedIndex,
    AiInference,
}

impl RateSourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            RateSourceKind::DatabaseSnapshot => "stored daily rates",
            RateSourceKind::ScrapedIndex => "public rate index",
            RateSourceKind::AiInference => "AI rate estimate",
        }
    }
}

impl fmt::Display for RateSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized rate and property-cost data for one location. Every rate is a
/// percentage and may be absent; absence propagates rather than defaulting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBundle {
    pub conventional_rate: Option<f64>,
    pub fha_rate: Option<f64>,
    pub property_tax_rate: Option<f64>,
    pub property_insurance_rate: Option<f64>,
    #[serde(default)]
    pub upfront_mip: Option<f64>,
    #[serde(default)]
    pub ongoing_mip: Option<f64>,
    pub source: RateSourceKind,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub rate_date: Option<NaiveDate>,
}

impl RateBundle {
    /// A bundle is usable only when at least one mortgage rate is known.
    pub fn is_usable(&self) -> bool {
        self.conventional_rate.is_some() || self.fha_rate.is_some()
    }
}

/// The single persisted cache slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub location_key: LocationKey,
    pub bundle: RateBundle,
    pub timestamp: DateTime<Utc>,
}

/// Inclusive bounds a scraped conventional rate must fall within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBand {
    pub min: f64,
    pub max: f64,
}

impl RateBand {
    pub fn new(min: f64, max: f64) -> Option<Self> {
        if min.is_finite() && max.is_finite() && min > 0.0 && min < max {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn contains(&self, rate: f64) -> bool {
        rate.is_finite() && rate >= self.min && rate <= self.max
    }
}

impl Default for RateBand {
    fn default() -> Self {
        Self { min: 3.0, max: 8.0 }
    }
}
