use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::domain::{BorrowerProfile, DtiLimits, LoanType};

pub const CREDIT_HISTORY: &str = "credit_history";
pub const NON_HOUSING_DTI: &str = "non_housing_dti";

/// Strong selections needed before the back-end ceiling is raised.
pub const STRONG_FACTOR_THRESHOLD: usize = 2;

/// A qualitative borrower attribute and the option that counts as weakest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub options: &'static [&'static str],
    pub weakest: &'static str,
}

pub const FACTORS: [FactorDefinition; 8] = [
    FactorDefinition {
        id: "cash_reserves",
        label: "Cash reserves",
        options: &["none", "1-2 months", "3-5 months", "6+ months"],
        weakest: "none",
    },
    FactorDefinition {
        id: "residual_income",
        label: "Residual income",
        options: &["none", "meets guideline", "exceeds guideline"],
        weakest: "none",
    },
    FactorDefinition {
        id: "employment_history",
        label: "Employment history",
        options: &["<2 years", "2-5 years", "5+ years"],
        weakest: "<2 years",
    },
    FactorDefinition {
        id: "housing_payment_increase",
        label: "Housing payment increase",
        options: &[">20%", "10-20%", "<10%"],
        weakest: ">20%",
    },
    FactorDefinition {
        id: "credit_utilization",
        label: "Credit utilization",
        options: &[">30%", "10-30%", "<10%"],
        weakest: ">30%",
    },
    FactorDefinition {
        id: "additional_income",
        label: "Significant additional income",
        options: &["<5%", "5-10%", ">10%"],
        weakest: "<5%",
    },
    FactorDefinition {
        id: CREDIT_HISTORY,
        label: "Credit history",
        options: &["<680", "680-739", "740+"],
        weakest: "<680",
    },
    FactorDefinition {
        id: NON_HOUSING_DTI,
        label: "Non-housing DTI",
        options: &[">10%", "5-10%", "<5%"],
        weakest: ">10%",
    },
];

pub fn definition(id: &str) -> Option<&'static FactorDefinition> {
    FACTORS.iter().find(|factor| factor.id == id)
}

pub fn credit_history_option(fico_score: u16) -> &'static str {
    match fico_score {
        740..=u16::MAX => "740+",
        680..=739 => "680-739",
        _ => "<680",
    }
}

pub fn non_housing_dti_option(monthly_debt: f64, monthly_income: f64) -> &'static str {
    if monthly_income <= 0.0 {
        return ">10%";
    }
    let ratio = monthly_debt.max(0.0) / monthly_income * 100.0;
    if ratio < 5.0 {
        "<5%"
    } else if ratio <= 10.0 {
        "5-10%"
    } else {
        ">10%"
    }
}

/// Base ceilings per program, with the back-end raised for strong files.
pub fn dti_limits(loan_type: LoanType, has_strong_factors: bool) -> DtiLimits {
    let (front_end, back_end, strong_back_end) = match loan_type {
        LoanType::Conventional => (28.0, 36.0, 50.0),
        LoanType::Fha => (31.0, 43.0, 57.0),
    };
    DtiLimits {
        front_end,
        back_end: if has_strong_factors {
            strong_back_end
        } else {
            back_end
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorAssessment {
    pub factors: BTreeMap<String, String>,
    pub strong_factor_count: usize,
    pub has_strong_factors: bool,
    pub limits: DtiLimits,
}

/// Counts strong compensating factors and picks the DTI limits they unlock.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompensatingFactorsEngine;

impl CompensatingFactorsEngine {
    pub fn new() -> Self {
        Self
    }

    /// User selections plus the two factors derived from the numbers. Derived
    /// values replace any user-supplied entry under the same id.
    pub fn merged_factors(&self, profile: &BorrowerProfile) -> BTreeMap<String, String> {
        let mut factors = profile.selected_factors.clone();
        factors.insert(
            CREDIT_HISTORY.to_string(),
            credit_history_option(profile.clamped_fico()).to_string(),
        );
        factors.insert(
            NON_HOUSING_DTI.to_string(),
            non_housing_dti_option(profile.total_monthly_debt(), profile.monthly_income())
                .to_string(),
        );
        factors
    }

    /// Selections that name a defined option other than the factor's weakest.
    pub fn strong_factor_count(&self, factors: &BTreeMap<String, String>) -> usize {
        factors
            .iter()
            .filter(|(id, value)| match definition(id) {
                Some(factor) if factor.options.contains(&value.as_str()) => {
                    value.as_str() != factor.weakest
                }
                Some(_) => {
                    debug!(factor = %id, option = %value, "ignoring unknown factor option");
                    false
                }
                None => {
                    debug!(factor = %id, "ignoring unknown factor");
                    false
                }
            })
            .count()
    }

    pub fn assess(&self, profile: &BorrowerProfile, loan_type: LoanType) -> FactorAssessment {
        let factors = self.merged_factors(profile);
        let strong_factor_count = self.strong_factor_count(&factors);
        let has_strong_factors = strong_factor_count >= STRONG_FACTOR_THRESHOLD;
        FactorAssessment {
            factors,
            strong_factor_count,
            has_strong_factors,
            limits: dti_limits(loan_type, has_strong_factors),
        }
    }
}
