use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::calculator;
use super::domain::{
    Affordability, AffordabilityResult, BorrowerProfile, LoanRequest, LoanType, UnavailableReason,
};
use super::factors::{CompensatingFactorsEngine, FactorAssessment};
use super::pricing;
use crate::rates::RateBundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    HigherFicoBand,
    LowerLtv,
    SwitchLoanType,
}

/// One perturbed input and what it does to buying power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementScenario {
    pub kind: ScenarioKind,
    pub description: String,
    pub fico_change: i32,
    /// Change in LTV percentage points; negative means a larger down payment.
    pub ltv_change: f64,
    pub loan_type: LoanType,
    pub max_home_price: Option<f64>,
    pub monthly_payment: Option<f64>,
    /// Change in maximum home price versus the baseline. `None` when the
    /// candidate could not be evaluated.
    pub delta: Option<f64>,
    pub unavailable_reason: Option<UnavailableReason>,
}

impl ImprovementScenario {
    pub fn is_improvement(&self) -> bool {
        self.delta.is_some_and(|delta| delta > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub baseline: AffordabilityResult,
    pub scenarios: Vec<ImprovementScenario>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioError {
    #[error("baseline affordability unavailable: {}", .0.message())]
    BaselineUnavailable(UnavailableReason),
}

struct Candidate {
    kind: ScenarioKind,
    description: String,
    profile: BorrowerProfile,
    request: LoanRequest,
}

/// Re-runs the full pipeline with one input changed at a time and ranks the
/// results by gain in maximum home price.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioGenerator {
    engine: CompensatingFactorsEngine,
}

impl ScenarioGenerator {
    pub fn new(engine: CompensatingFactorsEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &CompensatingFactorsEngine {
        &self.engine
    }

    /// Factor assessment followed by the calculator.
    pub fn evaluate(
        &self,
        profile: &BorrowerProfile,
        bundle: Option<&RateBundle>,
        request: &LoanRequest,
    ) -> (FactorAssessment, Affordability) {
        let assessment = self.engine.assess(profile, request.loan_type);
        let affordability = calculator::evaluate(
            profile,
            bundle,
            request,
            assessment.limits,
            assessment.strong_factor_count,
        );
        (assessment, affordability)
    }

    pub fn generate(
        &self,
        profile: &BorrowerProfile,
        bundle: Option<&RateBundle>,
        request: &LoanRequest,
    ) -> Result<ScenarioSet, ScenarioError> {
        let baseline = match self.evaluate(profile, bundle, request).1 {
            Affordability::Available(result) => result,
            Affordability::Unavailable { reason } => {
                return Err(ScenarioError::BaselineUnavailable(reason))
            }
        };

        let mut scenarios: Vec<ImprovementScenario> = self
            .candidates(profile, &baseline)
            .into_iter()
            .map(|candidate| self.score(candidate, profile, &baseline, bundle))
            .collect();

        // Stable sort keeps candidate order among equal deltas.
        scenarios.sort_by(|a, b| match (a.delta, b.delta) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        Ok(ScenarioSet {
            baseline,
            scenarios,
        })
    }

    fn candidates(&self, profile: &BorrowerProfile, baseline: &AffordabilityResult) -> Vec<Candidate> {
        let fico = profile.clamped_fico();
        let loan_type = baseline.loan_type;
        let request = LoanRequest {
            loan_type,
            down_payment_percent: baseline.down_payment_percent,
        };
        let mut candidates = Vec::with_capacity(3);

        if let Some(next_score) = pricing::next_fico_band(loan_type, fico) {
            candidates.push(Candidate {
                kind: ScenarioKind::HigherFicoBand,
                description: format!("Raise credit score from {fico} to {next_score}"),
                profile: BorrowerProfile {
                    fico_score: next_score,
                    ..profile.clone()
                },
                request,
            });
        }

        if let Some(next_down) = pricing::next_down_payment_band(baseline.down_payment_percent) {
            candidates.push(Candidate {
                kind: ScenarioKind::LowerLtv,
                description: format!(
                    "Increase down payment from {}% to {next_down}%",
                    baseline.down_payment_percent
                ),
                profile: profile.clone(),
                request: LoanRequest {
                    loan_type,
                    down_payment_percent: next_down,
                },
            });
        }

        let alternate = loan_type.alternate();
        candidates.push(Candidate {
            kind: ScenarioKind::SwitchLoanType,
            description: format!("Switch from {} to {}", loan_type.label(), alternate.label()),
            profile: profile.clone(),
            request: LoanRequest {
                loan_type: alternate,
                down_payment_percent: baseline.down_payment_percent,
            },
        });

        candidates
    }

    fn score(
        &self,
        candidate: Candidate,
        profile: &BorrowerProfile,
        baseline: &AffordabilityResult,
        bundle: Option<&RateBundle>,
    ) -> ImprovementScenario {
        let fico_change =
            i32::from(candidate.profile.clamped_fico()) - i32::from(profile.clamped_fico());

        match self.evaluate(&candidate.profile, bundle, &candidate.request).1 {
            Affordability::Available(result) => {
                let delta = result.max_home_price - baseline.max_home_price;
                debug!(scenario = ?candidate.kind, delta, "scenario evaluated");
                ImprovementScenario {
                    kind: candidate.kind,
                    description: candidate.description,
                    fico_change,
                    ltv_change: baseline.down_payment_percent - result.down_payment_percent,
                    loan_type: result.loan_type,
                    max_home_price: Some(result.max_home_price),
                    monthly_payment: Some(result.max_monthly_payment),
                    delta: Some(delta),
                    unavailable_reason: None,
                }
            }
            Affordability::Unavailable { reason } => {
                debug!(scenario = ?candidate.kind, ?reason, "scenario unavailable");
                ImprovementScenario {
                    kind: candidate.kind,
                    description: candidate.description,
                    fico_change,
                    ltv_change: baseline.down_payment_percent
                        - candidate.request.down_payment_percent,
                    loan_type: candidate.request.loan_type,
                    max_home_price: None,
                    monthly_payment: None,
                    delta: None,
                    unavailable_reason: Some(reason),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateSourceKind;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn bundle() -> RateBundle {
        RateBundle {
            conventional_rate: Some(6.75),
            fha_rate: Some(6.25),
            property_tax_rate: Some(1.9),
            property_insurance_rate: Some(0.45),
            upfront_mip: None,
            ongoing_mip: None,
            source: RateSourceKind::DatabaseSnapshot,
            fetched_at: Utc::now(),
            rate_date: None,
        }
    }

    fn profile(fico: u16) -> BorrowerProfile {
        BorrowerProfile {
            annual_income: 96_000.0,
            fico_score: fico,
            monthly_debts: 450.0,
            debt_items: Vec::new(),
            selected_factors: BTreeMap::new(),
        }
    }

    fn conventional(down_payment_percent: f64) -> LoanRequest {
        LoanRequest {
            loan_type: LoanType::Conventional,
            down_payment_percent,
        }
    }

    #[test]
    fn perturbs_one_dimension_at_a_time() {
        let generator = ScenarioGenerator::default();
        let set = generator
            .generate(&profile(700), Some(&bundle()), &conventional(5.0))
            .expect("baseline available");

        assert_eq!(set.scenarios.len(), 3);

        let fico = set
            .scenarios
            .iter()
            .find(|s| s.kind == ScenarioKind::HigherFicoBand)
            .expect("fico scenario");
        assert_eq!(fico.fico_change, 20);
        assert_eq!(fico.ltv_change, 0.0);
        assert_eq!(fico.loan_type, LoanType::Conventional);
        assert!(fico.is_improvement());

        let ltv = set
            .scenarios
            .iter()
            .find(|s| s.kind == ScenarioKind::LowerLtv)
            .expect("ltv scenario");
        assert_eq!(ltv.fico_change, 0);
        assert_eq!(ltv.ltv_change, -5.0);

        let switch = set
            .scenarios
            .iter()
            .find(|s| s.kind == ScenarioKind::SwitchLoanType)
            .expect("switch scenario");
        assert_eq!(switch.loan_type, LoanType::Fha);
        assert_eq!(switch.fico_change, 0);
    }

    #[test]
    fn ranked_by_delta_descending() {
        let generator = ScenarioGenerator::default();
        let set = generator
            .generate(&profile(650), Some(&bundle()), &conventional(3.0))
            .expect("baseline available");

        let deltas: Vec<f64> = set.scenarios.iter().filter_map(|s| s.delta).collect();
        assert!(deltas.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn generation_is_idempotent() {
        let generator = ScenarioGenerator::default();
        let borrower = profile(690);
        let request = conventional(10.0);
        let first = generator.generate(&borrower, Some(&bundle()), &request);
        let second = generator.generate(&borrower, Some(&bundle()), &request);
        assert_eq!(first, second);
    }

    #[test]
    fn unavailable_alternatives_are_reported_last() {
        let mut partial = bundle();
        partial.fha_rate = None;

        let set = ScenarioGenerator::default()
            .generate(&profile(700), Some(&partial), &conventional(5.0))
            .expect("baseline available");

        let last = set.scenarios.last().expect("scenarios");
        assert_eq!(last.kind, ScenarioKind::SwitchLoanType);
        assert_eq!(last.delta, None);
        assert_eq!(
            last.unavailable_reason,
            Some(UnavailableReason::MissingRate(LoanType::Fha))
        );
        assert!(!last.is_improvement());
    }

    #[test]
    fn top_tier_borrower_gets_no_fico_scenario() {
        let set = ScenarioGenerator::default()
            .generate(&profile(800), Some(&bundle()), &conventional(25.0))
            .expect("baseline available");

        assert!(set
            .scenarios
            .iter()
            .all(|s| s.kind == ScenarioKind::SwitchLoanType));
        assert_eq!(set.scenarios.len(), 1);
    }

    #[test]
    fn missing_baseline_is_an_error() {
        let result = ScenarioGenerator::default().generate(&profile(700), None, &conventional(5.0));
        assert_eq!(
            result,
            Err(ScenarioError::BaselineUnavailable(UnavailableReason::MissingRates))
        );
    }
}
