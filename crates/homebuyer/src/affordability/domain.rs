use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rates::RateBundle;

pub const MIN_FICO: u16 = 300;
pub const MAX_FICO: u16 = 850;

/// Supported mortgage programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanType {
    Conventional,
    Fha,
}

impl LoanType {
    pub const ALL: [LoanType; 2] = [LoanType::Conventional, LoanType::Fha];

    pub fn label(&self) -> &'static str {
        match self {
            LoanType::Conventional => "Conventional",
            LoanType::Fha => "FHA",
        }
    }

    /// Fixed 30-year amortization for every program.
    pub fn term_months(&self) -> u32 {
        360
    }

    pub fn alternate(&self) -> LoanType {
        match self {
            LoanType::Conventional => LoanType::Fha,
            LoanType::Fha => LoanType::Conventional,
        }
    }

    pub fn base_rate(&self, bundle: &RateBundle) -> Option<f64> {
        match self {
            LoanType::Conventional => bundle.conventional_rate,
            LoanType::Fha => bundle.fha_rate,
        }
    }
}

impl std::str::FromStr for LoanType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "conventional" | "conv" => Ok(LoanType::Conventional),
            "fha" => Ok(LoanType::Fha),
            other => Err(format!("unknown loan type '{other}' (expected conventional or fha)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtItem {
    pub label: String,
    pub monthly_payment: f64,
}

/// Borrower inputs supplied by the application layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerProfile {
    pub annual_income: f64,
    pub fico_score: u16,
    #[serde(default)]
    pub monthly_debts: f64,
    #[serde(default)]
    pub debt_items: Vec<DebtItem>,
    #[serde(default)]
    pub selected_factors: BTreeMap<String, String>,
}

impl BorrowerProfile {
    pub fn monthly_income(&self) -> f64 {
        (self.annual_income / 12.0).max(0.0)
    }

    /// Itemized debts win over the declared total when present.
    pub fn total_monthly_debt(&self) -> f64 {
        let total = if self.debt_items.is_empty() {
            self.monthly_debts
        } else {
            self.debt_items.iter().map(|item| item.monthly_payment).sum()
        };
        total.max(0.0)
    }

    pub fn clamped_fico(&self) -> u16 {
        self.fico_score.clamp(MIN_FICO, MAX_FICO)
    }
}

/// Loan program and down payment under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub loan_type: LoanType,
    pub down_payment_percent: f64,
}

impl LoanRequest {
    pub fn ltv_percent(&self) -> f64 {
        100.0 - self.down_payment_percent
    }
}

/// Debt-to-income ceilings in percent. Recomputed per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DtiLimits {
    pub front_end: f64,
    pub back_end: f64,
}

/// Result of the pure loan-size solver: a computed amount or missing inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "amount", rename_all = "snake_case")]
pub enum LoanEstimate {
    Available(f64),
    Unavailable,
}

impl LoanEstimate {
    pub fn amount(&self) -> Option<f64> {
        match self {
            LoanEstimate::Available(amount) => Some(*amount),
            LoanEstimate::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    pub principal_and_interest: f64,
    pub property_tax: f64,
    pub insurance: f64,
    pub mortgage_insurance: f64,
    pub total: f64,
}

/// Borrowing power for one set of inputs. Amounts keep full precision; round
/// only for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityResult {
    pub loan_type: LoanType,
    pub max_loan_amount: f64,
    /// Total housing budget: principal, interest, tax, insurance, and mortgage insurance.
    pub max_monthly_payment: f64,
    /// Back-end DTI in percent at the maximum payment.
    pub dti_ratio: f64,
    /// Back-end headroom left after debts and the maximum housing payment.
    pub remaining_monthly_payment: f64,
    pub max_home_price: f64,
    pub down_payment: f64,
    pub down_payment_percent: f64,
    pub effective_rate: f64,
    pub dti_limits: DtiLimits,
    pub strong_factor_count: usize,
    pub breakdown: PaymentBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    MissingRates,
    MissingRate(LoanType),
    MissingPropertyTax,
    MissingInsurance,
    NoIncome,
}

impl UnavailableReason {
    pub fn message(&self) -> String {
        match self {
            UnavailableReason::MissingRates => "rate data unavailable for this location".to_string(),
            UnavailableReason::MissingRate(loan_type) => {
                format!("{} rate unavailable for this location", loan_type.label())
            }
            UnavailableReason::MissingPropertyTax => "property tax rate unavailable".to_string(),
            UnavailableReason::MissingInsurance => "property insurance rate unavailable".to_string(),
            UnavailableReason::NoIncome => "annual income must be greater than zero".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Affordability {
    Available(AffordabilityResult),
    Unavailable { reason: UnavailableReason },
}

impl Affordability {
    pub fn result(&self) -> Option<&AffordabilityResult> {
        match self {
            Affordability::Available(result) => Some(result),
            Affordability::Unavailable { .. } => None,
        }
    }
}
