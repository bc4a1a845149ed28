//! Rate add-ons, down payment floors, and mortgage insurance tables.

use super::domain::LoanType;
use crate::rates::RateBundle;

/// One credit tier. Scores at or above `min_score` fall into the band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FicoBand {
    pub min_score: u16,
    /// Percentage points added to the base rate.
    pub rate_adjustment: f64,
    /// Annual private mortgage insurance in percent of the loan at 95% LTV.
    pub pmi_rate: f64,
}

const fn band(min_score: u16, rate_adjustment: f64, pmi_rate: f64) -> FicoBand {
    FicoBand {
        min_score,
        rate_adjustment,
        pmi_rate,
    }
}

const CONVENTIONAL_BANDS: [FicoBand; 8] = [
    band(760, 0.0, 0.30),
    band(740, 0.125, 0.40),
    band(720, 0.25, 0.50),
    band(700, 0.375, 0.60),
    band(680, 0.5, 0.75),
    band(660, 0.75, 0.95),
    band(640, 1.0, 1.15),
    band(0, 1.25, 1.35),
];

const FHA_BANDS: [FicoBand; 5] = [
    band(680, 0.0, 0.0),
    band(640, 0.125, 0.0),
    band(620, 0.25, 0.0),
    band(580, 0.5, 0.0),
    band(0, 0.75, 0.0),
];

/// Down payment tiers in percent, lowest first.
pub const DOWN_PAYMENT_BANDS: [f64; 7] = [3.0, 3.5, 5.0, 10.0, 15.0, 20.0, 25.0];

pub const FHA_UPFRONT_MIP: f64 = 1.75;
pub const FHA_ANNUAL_MIP_HIGH_LTV: f64 = 0.55;
pub const FHA_ANNUAL_MIP: f64 = 0.50;
pub const FHA_LOW_SCORE_CUTOFF: u16 = 580;

const EPSILON: f64 = 1e-9;

/// Bands ordered from the best tier down.
pub fn fico_bands(loan_type: LoanType) -> &'static [FicoBand] {
    match loan_type {
        LoanType::Conventional => &CONVENTIONAL_BANDS,
        LoanType::Fha => &FHA_BANDS,
    }
}

pub fn band_for(loan_type: LoanType, fico: u16) -> FicoBand {
    let bands = fico_bands(loan_type);
    bands
        .iter()
        .copied()
        .find(|band| fico >= band.min_score)
        .unwrap_or(bands[bands.len() - 1])
}

/// Lowest score of the next better tier, if one exists.
pub fn next_fico_band(loan_type: LoanType, fico: u16) -> Option<u16> {
    let current = band_for(loan_type, fico).min_score;
    fico_bands(loan_type)
        .iter()
        .rev()
        .map(|band| band.min_score)
        .find(|min_score| *min_score > current)
}

pub fn effective_rate(loan_type: LoanType, base_rate: f64, fico: u16) -> f64 {
    base_rate + band_for(loan_type, fico).rate_adjustment
}

pub fn minimum_down_payment(loan_type: LoanType, fico: u16) -> f64 {
    match loan_type {
        LoanType::Conventional => 3.0,
        LoanType::Fha if fico >= FHA_LOW_SCORE_CUTOFF => 3.5,
        LoanType::Fha => 10.0,
    }
}

/// Requested down payment raised to the program floor and capped at 100%.
pub fn clamp_down_payment(loan_type: LoanType, fico: u16, requested: f64) -> f64 {
    let requested = if requested.is_finite() { requested } else { 0.0 };
    requested.max(minimum_down_payment(loan_type, fico)).min(100.0)
}

/// Next larger down payment tier above `current`.
pub fn next_down_payment_band(current: f64) -> Option<f64> {
    DOWN_PAYMENT_BANDS
        .iter()
        .copied()
        .find(|band| *band > current + EPSILON)
}

fn pmi_ltv_multiplier(ltv_percent: f64) -> f64 {
    if ltv_percent <= 80.0 + EPSILON {
        0.0
    } else if ltv_percent <= 85.0 + EPSILON {
        0.5
    } else if ltv_percent <= 90.0 + EPSILON {
        0.75
    } else if ltv_percent <= 95.0 + EPSILON {
        1.0
    } else {
        1.25
    }
}

/// Financed upfront premium in percent of the base loan.
pub fn upfront_premium(loan_type: LoanType, bundle: &RateBundle) -> f64 {
    match loan_type {
        LoanType::Conventional => 0.0,
        LoanType::Fha => bundle.upfront_mip.unwrap_or(FHA_UPFRONT_MIP),
    }
}

/// Annual mortgage insurance in percent of the loan balance.
pub fn mortgage_insurance_rate(
    loan_type: LoanType,
    fico: u16,
    ltv_percent: f64,
    bundle: &RateBundle,
) -> f64 {
    match loan_type {
        LoanType::Conventional => {
            band_for(loan_type, fico).pmi_rate * pmi_ltv_multiplier(ltv_percent)
        }
        LoanType::Fha => bundle.ongoing_mip.unwrap_or(if ltv_percent > 95.0 + EPSILON {
            FHA_ANNUAL_MIP_HIGH_LTV
        } else {
            FHA_ANNUAL_MIP
        }),
    }
}
