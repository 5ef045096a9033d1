use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use super::debt::{debt_amount, dscr, mortgage_constant};
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Ratio};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which underwriting test limited the loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstrainingTest {
    #[serde(rename = "LTV")]
    Ltv,
    #[serde(rename = "DSCR")]
    Dscr,
}

impl fmt::Display for ConstrainingTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstrainingTest::Ltv => write!(f, "LTV"),
            ConstrainingTest::Dscr => write!(f, "DSCR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSizingResult {
    pub max_loan: Money,
    pub ltv_based_loan: Money,
    pub dscr_based_loan: Money,
    pub constraining_test: ConstrainingTest,
}

/// Inputs for sizing a loan against both the LTV and DSCR limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSizingInput {
    pub purchase_price: Money,
    pub max_ltv_percent: Percent,
    pub noi: Money,
    pub min_dscr: Ratio,
    pub interest_rate_percent: Percent,
    pub amortization_years: u32,
    #[serde(default)]
    pub is_interest_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSizingOutput {
    #[serde(flatten)]
    pub sizing: LoanSizingResult,
    pub mortgage_constant: Ratio,
    /// NOI over debt service at the sized loan
    pub implied_dscr: Ratio,
    pub implied_ltv_percent: Percent,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Largest loan whose debt service keeps coverage at `min_dscr`.
/// Zero if either `min_dscr` or the constant is zero, or NOI is not positive.
pub fn max_loan_by_dscr(noi: Money, min_dscr: Ratio, mortgage_constant: Ratio) -> Money {
    let denominator = min_dscr * mortgage_constant;
    if denominator <= Decimal::ZERO || noi <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (noi / denominator).round_dp(2)
}

/// Smaller of the LTV-based and DSCR-based loans. Ties go to LTV.
pub fn constrained_loan(
    purchase_price: Money,
    max_ltv_percent: Percent,
    noi: Money,
    min_dscr: Ratio,
    mortgage_constant: Ratio,
) -> LoanSizingResult {
    let ltv_based_loan = debt_amount(purchase_price, max_ltv_percent);
    let dscr_based_loan = max_loan_by_dscr(noi, min_dscr, mortgage_constant);

    let (max_loan, constraining_test) = if dscr_based_loan < ltv_based_loan {
        (dscr_based_loan, ConstrainingTest::Dscr)
    } else {
        (ltv_based_loan, ConstrainingTest::Ltv)
    };

    LoanSizingResult {
        max_loan,
        ltv_based_loan,
        dscr_based_loan,
        constraining_test,
    }
}

/// Size a loan from deal terms, reporting the binding test.
pub fn size_loan(input: &LoanSizingInput) -> UnderwritingResult<ComputationOutput<LoanSizingOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let constant = mortgage_constant(
        input.interest_rate_percent,
        input.amortization_years,
        input.is_interest_only,
    );
    let sizing = constrained_loan(
        input.purchase_price,
        input.max_ltv_percent,
        input.noi,
        input.min_dscr,
        constant,
    );

    if constant.is_zero() {
        warnings.push("Mortgage constant is zero; DSCR-based loan cannot be sized".into());
    }
    if input.noi <= Decimal::ZERO {
        warnings.push("NOI is not positive; DSCR-based loan is zero".into());
    }

    let debt_service = (sizing.max_loan * constant).round_dp(2);
    let implied_dscr = dscr(input.noi, debt_service);
    let implied_ltv_percent = super::debt::ltv_percent(sizing.max_loan, input.purchase_price);

    debug!(
        "loan sizing: ltv={} dscr={} -> {} constrains",
        sizing.ltv_based_loan, sizing.dscr_based_loan, sizing.constraining_test
    );

    let output = LoanSizingOutput {
        sizing,
        mortgage_constant: constant,
        implied_dscr,
        implied_ltv_percent,
    };

    Ok(with_metadata(
        "Constrained loan sizing (min of LTV and DSCR tests)",
        input,
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
