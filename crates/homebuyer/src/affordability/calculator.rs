//! Pure affordability arithmetic. Nothing here touches shared state.

use super::domain::{
    Affordability, AffordabilityResult, BorrowerProfile, DtiLimits, LoanEstimate, LoanRequest,
    LoanType, PaymentBreakdown, UnavailableReason,
};
use super::pricing;
use crate::rates::RateBundle;

/// Annual percent to periodic monthly rate.
pub fn monthly_rate(annual_rate: f64) -> f64 {
    annual_rate / 12.0 / 100.0
}

/// Monthly payment per dollar of principal over `months` periods.
pub fn annuity_factor(annual_rate: f64, months: u32) -> f64 {
    let months = months.max(1);
    let rate = monthly_rate(annual_rate);
    if rate.abs() < f64::EPSILON {
        return 1.0 / f64::from(months);
    }
    rate / (1.0 - (1.0 + rate).powi(-(months as i32)))
}

pub fn monthly_payment(principal: f64, annual_rate: f64, months: u32) -> f64 {
    principal.max(0.0) * annuity_factor(annual_rate, months)
}

/// Principal that a fixed monthly payment can carry.
pub fn principal_for_payment(payment: f64, annual_rate: f64, months: u32) -> f64 {
    payment.max(0.0) / annuity_factor(annual_rate, months)
}

/// Largest loan whose payment fits under `max_dti` after existing debts.
/// A missing rate is reported as unavailable rather than as a zero loan.
///
/// This is the principal-and-interest ceiling: the whole room under the cap
/// goes to the loan. [`evaluate`] carries the same principal for the P&I share
/// of its housing payment, which is smaller once taxes, insurance, mortgage
/// insurance and the front-end cap take their part, so its
/// `max_loan_amount` never exceeds this figure at the same rate.
pub fn max_loan_amount(
    annual_income: f64,
    monthly_debt: f64,
    max_dti: f64,
    annual_rate: Option<f64>,
    loan_type: LoanType,
) -> LoanEstimate {
    let Some(rate) = annual_rate.filter(|rate| rate.is_finite()) else {
        return LoanEstimate::Unavailable;
    };
    let payment = (annual_income / 12.0 * max_dti / 100.0 - monthly_debt).max(0.0);
    LoanEstimate::Available(principal_for_payment(payment, rate, loan_type.term_months()))
}

/// Payment as a percent of monthly income, to two decimals.
pub fn dti_ratio(payment: f64, monthly_income: f64) -> Option<f64> {
    if monthly_income <= 0.0 {
        return None;
    }
    Some(round_to(payment / monthly_income * 100.0, 2))
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Display rounding for currency.
pub fn round_currency(value: f64) -> f64 {
    value.round()
}

/// Monthly housing budget: the lower of the front-end cap and what the
/// back-end cap leaves after existing debts.
pub fn housing_budget(monthly_income: f64, monthly_debt: f64, limits: DtiLimits) -> f64 {
    let front = monthly_income * limits.front_end / 100.0;
    let back = monthly_income * limits.back_end / 100.0 - monthly_debt;
    front.min(back).max(0.0)
}

/// Housing cost components for a purchase, all annual rates in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentInputs {
    pub home_price: f64,
    pub down_payment_percent: f64,
    pub annual_rate: f64,
    pub property_tax_rate: f64,
    pub insurance_rate: f64,
    pub upfront_premium: f64,
    pub mortgage_insurance_rate: f64,
    pub months: u32,
}

impl PaymentInputs {
    /// Base loan plus any financed upfront premium.
    pub fn loan_amount(&self) -> f64 {
        let ltv = (100.0 - self.down_payment_percent) / 100.0;
        self.home_price * ltv * (1.0 + self.upfront_premium / 100.0)
    }
}

pub fn payment_breakdown(inputs: &PaymentInputs) -> PaymentBreakdown {
    let loan = inputs.loan_amount();
    let principal_and_interest = monthly_payment(loan, inputs.annual_rate, inputs.months);
    let property_tax = inputs.home_price * inputs.property_tax_rate / 100.0 / 12.0;
    let insurance = inputs.home_price * inputs.insurance_rate / 100.0 / 12.0;
    let mortgage_insurance = loan * inputs.mortgage_insurance_rate / 100.0 / 12.0;
    PaymentBreakdown {
        principal_and_interest,
        property_tax,
        insurance,
        mortgage_insurance,
        total: principal_and_interest + property_tax + insurance + mortgage_insurance,
    }
}

/// Monthly housing cost per dollar of home price for the given terms.
fn cost_per_dollar(inputs: &PaymentInputs) -> f64 {
    let unit = PaymentInputs {
        home_price: 1.0,
        ..*inputs
    };
    payment_breakdown(&unit).total
}

/// Highest price whose full housing payment fits the budget.
pub fn max_home_price(budget: f64, inputs: &PaymentInputs) -> f64 {
    let per_dollar = cost_per_dollar(inputs);
    if per_dollar <= 0.0 || !per_dollar.is_finite() {
        return 0.0;
    }
    budget.max(0.0) / per_dollar
}

/// Full evaluation for one profile, rate bundle, and loan request. Every
/// missing input is reported as unavailable rather than treated as zero.
pub fn evaluate(
    profile: &BorrowerProfile,
    bundle: Option<&RateBundle>,
    request: &LoanRequest,
    limits: DtiLimits,
    strong_factor_count: usize,
) -> Affordability {
    let unavailable = |reason| Affordability::Unavailable { reason };

    let Some(bundle) = bundle else {
        return unavailable(UnavailableReason::MissingRates);
    };
    let loan_type = request.loan_type;
    let Some(base_rate) = loan_type.base_rate(bundle) else {
        return unavailable(UnavailableReason::MissingRate(loan_type));
    };
    let Some(property_tax_rate) = bundle.property_tax_rate else {
        return unavailable(UnavailableReason::MissingPropertyTax);
    };
    let Some(insurance_rate) = bundle.property_insurance_rate else {
        return unavailable(UnavailableReason::MissingInsurance);
    };
    let monthly_income = profile.monthly_income();
    if monthly_income <= 0.0 {
        return unavailable(UnavailableReason::NoIncome);
    }

    let fico = profile.clamped_fico();
    let down_payment_percent =
        pricing::clamp_down_payment(loan_type, fico, request.down_payment_percent);
    let ltv_percent = 100.0 - down_payment_percent;
    let effective_rate = pricing::effective_rate(loan_type, base_rate, fico);

    let monthly_debt = profile.total_monthly_debt();
    let budget = housing_budget(monthly_income, monthly_debt, limits);

    let mut inputs = PaymentInputs {
        home_price: 0.0,
        down_payment_percent,
        annual_rate: effective_rate,
        property_tax_rate,
        insurance_rate,
        upfront_premium: pricing::upfront_premium(loan_type, bundle),
        mortgage_insurance_rate: pricing::mortgage_insurance_rate(
            loan_type,
            fico,
            ltv_percent,
            bundle,
        ),
        months: loan_type.term_months(),
    };
    inputs.home_price = max_home_price(budget, &inputs);
    let breakdown = payment_breakdown(&inputs);

    let back_end_cap = monthly_income * limits.back_end / 100.0;
    let dti_ratio = dti_ratio(breakdown.total + monthly_debt, monthly_income).unwrap_or_default();

    Affordability::Available(AffordabilityResult {
        loan_type,
        max_loan_amount: principal_for_payment(
            breakdown.principal_and_interest,
            effective_rate,
            inputs.months,
        ),
        max_monthly_payment: breakdown.total,
        dti_ratio,
        remaining_monthly_payment: (back_end_cap - monthly_debt - breakdown.total).max(0.0),
        max_home_price: inputs.home_price,
        down_payment: inputs.home_price * down_payment_percent / 100.0,
        down_payment_percent,
        effective_rate,
        dti_limits: limits,
        strong_factor_count,
        breakdown,
    })
}
