use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Affordability, BorrowerProfile, LoanRequest};
use super::factors::FactorAssessment;
use super::scenarios::{ImprovementScenario, ScenarioGenerator};
use crate::flags::{self, FeatureFlag, FeatureFlagStore};
use crate::rates::{
    AcquisitionError, AcquisitionOutcome, AcquisitionResult, DataAcquisitionCoordinator,
    FetchProgressState, LocationKey, RateBundle, RateSourceKind,
};

/// Location fields as entered; state and county are both required before
/// rates can be looked up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
}

impl LocationInput {
    pub fn key(&self) -> Option<LocationKey> {
        LocationKey::from_parts(
            self.state.as_deref(),
            self.county.as_deref(),
            self.zip_code.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub location: LocationInput,
    pub profile: BorrowerProfile,
    pub loan: LoanRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffordabilityQuote {
    pub location: Option<LocationKey>,
    pub rate_source: Option<RateSourceKind>,
    pub affordability: Affordability,
    pub factors: FactorAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<ImprovementScenario>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rates_error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AffordabilityServiceError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

/// Connects rate acquisition, the affordability pipeline, and flag lookups.
pub struct AffordabilityService<F> {
    coordinator: Arc<DataAcquisitionCoordinator>,
    flags: Arc<F>,
    generator: ScenarioGenerator,
}

impl<F> AffordabilityService<F>
where
    F: FeatureFlagStore + 'static,
{
    pub fn new(coordinator: Arc<DataAcquisitionCoordinator>, flags: Arc<F>) -> Self {
        Self {
            coordinator,
            flags,
            generator: ScenarioGenerator::default(),
        }
    }

    pub fn coordinator(&self) -> &DataAcquisitionCoordinator {
        &self.coordinator
    }

    pub fn flags(&self) -> &F {
        &self.flags
    }

    pub async fn rates(&self, location: &LocationInput, silent: bool) -> AcquisitionResult {
        self.coordinator.on_location(location.key(), silent).await
    }

    pub async fn refresh(&self, silent: bool) -> AcquisitionResult {
        self.coordinator.refresh(silent).await
    }

    pub fn progress(&self) -> FetchProgressState {
        self.coordinator.progress()
    }

    /// Load rates for the request's location, then evaluate. A failed fetch
    /// still produces a quote, reported as unavailable.
    pub async fn quote(
        &self,
        request: QuoteRequest,
    ) -> Result<AffordabilityQuote, AffordabilityServiceError> {
        let location = request.location.key();
        let (bundle, rates_error) = match self.coordinator.on_location(location.clone(), true).await {
            Ok(AcquisitionOutcome::Discarded) => {
                warn!("rate lookup superseded by another location");
                (None, Some("rate lookup superseded by another location".to_string()))
            }
            Ok(outcome) => (outcome.bundle().cloned(), None),
            Err(AcquisitionError::LocationMissing) => {
                return Err(AcquisitionError::LocationMissing.into())
            }
            Err(AcquisitionError::Fetch(err)) => (None, Some(err.to_string())),
        };

        let include_scenarios = flags::is_enabled(
            self.flags.as_ref(),
            request.user_id.as_deref(),
            FeatureFlag::Scenarios,
        );

        let mut quote = self.evaluate(&request.profile, bundle.as_ref(), &request.loan, include_scenarios);
        quote.location = location;
        quote.rates_error = rates_error;
        Ok(quote)
    }

    /// Evaluate against an explicit bundle without touching the coordinator.
    pub fn evaluate(
        &self,
        profile: &BorrowerProfile,
        bundle: Option<&RateBundle>,
        loan: &LoanRequest,
        include_scenarios: bool,
    ) -> AffordabilityQuote {
        evaluate_quote(&self.generator, profile, bundle, loan, include_scenarios)
    }
}

/// The full pipeline for one input set: factors, calculator, and optionally
/// the ranked scenarios.
pub fn evaluate_quote(
    generator: &ScenarioGenerator,
    profile: &BorrowerProfile,
    bundle: Option<&RateBundle>,
    loan: &LoanRequest,
    include_scenarios: bool,
) -> AffordabilityQuote {
    let (factors, affordability) = generator.evaluate(profile, bundle, loan);

    let scenarios = include_scenarios.then(|| match generator.generate(profile, bundle, loan) {
        Ok(set) => set.scenarios,
        Err(err) => {
            info!(error = %err, "skipping scenarios");
            Vec::new()
        }
    });

    AffordabilityQuote {
        location: None,
        rate_source: bundle.map(|bundle| bundle.source),
        affordability,
        factors,
        scenarios,
        rates_error: None,
    }
}
