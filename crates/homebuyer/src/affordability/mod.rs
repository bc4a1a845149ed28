//! Borrowing power from income, debts, credit, and the loaded rate bundle,
//! plus compensating factors and what-if scenarios.

pub mod calculator;
pub mod domain;
pub mod factors;
pub mod pricing;
pub mod router;
pub mod scenarios;
pub mod service;

#[cfg(test)]
mod tests;

pub use calculator::{dti_ratio, evaluate, max_loan_amount, monthly_payment, payment_breakdown};
pub use domain::{
    Affordability, AffordabilityResult, BorrowerProfile, DebtItem, DtiLimits, LoanEstimate,
    LoanRequest, LoanType, PaymentBreakdown, UnavailableReason,
};
pub use factors::{CompensatingFactorsEngine, FactorAssessment};
pub use router::affordability_router;
pub use scenarios::{ImprovementScenario, ScenarioError, ScenarioGenerator, ScenarioKind, ScenarioSet};
pub use service::{
    evaluate_quote, AffordabilityQuote, AffordabilityService, AffordabilityServiceError,
    LocationInput, QuoteRequest,
};
