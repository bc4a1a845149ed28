use crate::infra::parse_factor;
use chrono::Utc;
use clap::Args;
use homebuyer::affordability::calculator::round_currency;
use homebuyer::affordability::{
    evaluate_quote, Affordability, AffordabilityQuote, BorrowerProfile, LoanRequest, LoanType,
    ScenarioGenerator,
};
use homebuyer::error::AppError;
use homebuyer::rates::{RateBundle, RateSourceKind};

#[derive(Args, Debug)]
pub(crate) struct EstimateArgs {
    /// Gross annual income in dollars
    #[arg(long)]
    pub(crate) income: f64,
    /// Existing monthly debt payments in dollars
    #[arg(long, default_value_t = 0.0)]
    pub(crate) debt: f64,
    /// Credit score (300-850)
    #[arg(long)]
    pub(crate) fico: u16,
    /// Loan program: conventional or fha
    #[arg(long, default_value = "conventional")]
    pub(crate) loan_type: LoanType,
    /// Down payment as a percent of the purchase price
    #[arg(long, default_value_t = 5.0)]
    pub(crate) down_payment: f64,
    /// Base annual rate in percent for the chosen program
    #[arg(long)]
    pub(crate) rate: f64,
    /// Base annual rate for the other program; without it the switch scenario is unavailable
    #[arg(long)]
    pub(crate) alternate_rate: Option<f64>,
    /// Annual property tax in percent of the price
    #[arg(long, default_value_t = 1.1)]
    pub(crate) tax_rate: f64,
    /// Annual homeowners insurance in percent of the price
    #[arg(long, default_value_t = 0.35)]
    pub(crate) insurance_rate: f64,
    /// Compensating factor selection as id=value (repeatable)
    #[arg(long = "factor", value_parser = parse_factor)]
    pub(crate) factors: Vec<(String, String)>,
    /// Skip improvement scenarios
    #[arg(long)]
    pub(crate) no_scenarios: bool,
}

pub(crate) fn run_estimate(args: EstimateArgs) -> Result<(), AppError> {
    if !(300..=850).contains(&args.fico) {
        return Err(AppError::Input(format!(
            "credit score {} is outside 300-850",
            args.fico
        )));
    }

    let (conventional_rate, fha_rate) = match args.loan_type {
        LoanType::Conventional => (Some(args.rate), args.alternate_rate),
        LoanType::Fha => (args.alternate_rate, Some(args.rate)),
    };
    let bundle = RateBundle {
        conventional_rate,
        fha_rate,
        property_tax_rate: Some(args.tax_rate),
        property_insurance_rate: Some(args.insurance_rate),
        upfront_mip: None,
        ongoing_mip: None,
        source: RateSourceKind::DatabaseSnapshot,
        fetched_at: Utc::now(),
        rate_date: None,
    };
    let profile = BorrowerProfile {
        annual_income: args.income,
        fico_score: args.fico,
        monthly_debts: args.debt,
        debt_items: Vec::new(),
        selected_factors: args.factors.into_iter().collect(),
    };
    let request = LoanRequest {
        loan_type: args.loan_type,
        down_payment_percent: args.down_payment,
    };

    let quote = evaluate_quote(
        &ScenarioGenerator::default(),
        &profile,
        Some(&bundle),
        &request,
        !args.no_scenarios,
    );
    render_quote(&quote);
    Ok(())
}

fn dollars(value: f64) -> String {
    let rounded = round_currency(value) as i64;
    let digits = rounded.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn render_quote(quote: &AffordabilityQuote) {
    println!("Affordability estimate");
    let result = match &quote.affordability {
        Affordability::Available(result) => result,
        Affordability::Unavailable { reason } => {
            println!("  Unavailable: {}", reason.message());
            return;
        }
    };

    println!("  Program: {}", result.loan_type.label());
    println!("  Effective rate: {:.3}%", result.effective_rate);
    println!(
        "  DTI limits: {:.0}% front-end / {:.0}% back-end ({} strong factor(s))",
        result.dti_limits.front_end, result.dti_limits.back_end, result.strong_factor_count
    );
    println!("  Max home price: {}", dollars(result.max_home_price));
    println!(
        "  Down payment: {} ({:.1}%)",
        dollars(result.down_payment),
        result.down_payment_percent
    );
    println!("  Max loan amount: {}", dollars(result.max_loan_amount));
    println!("  Monthly payment: {}", dollars(result.max_monthly_payment));
    println!(
        "    principal & interest {} | tax {} | insurance {} | mortgage insurance {}",
        dollars(result.breakdown.principal_and_interest),
        dollars(result.breakdown.property_tax),
        dollars(result.breakdown.insurance),
        dollars(result.breakdown.mortgage_insurance)
    );
    println!("  Back-end DTI at max payment: {:.2}%", result.dti_ratio);
    println!(
        "  Remaining back-end room: {}",
        dollars(result.remaining_monthly_payment)
    );

    let Some(scenarios) = &quote.scenarios else {
        return;
    };
    println!("\nImprovement scenarios");
    if scenarios.is_empty() {
        println!("  None available");
    }
    for scenario in scenarios {
        match (scenario.max_home_price, scenario.delta) {
            (Some(price), Some(delta)) => {
                let marker = if scenario.is_improvement() { "+" } else { " " };
                println!(
                    "  {marker} {}: {} ({} vs today)",
                    scenario.description,
                    dollars(price),
                    dollars(delta)
                );
            }
            _ => {
                let reason = scenario
                    .unavailable_reason
                    .map(|reason| reason.message())
                    .unwrap_or_else(|| "unavailable".to_string());
                println!("    {}: {}", scenario.description, reason);
            }
        }
    }
}
