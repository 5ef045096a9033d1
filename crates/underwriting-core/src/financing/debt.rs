use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::ProtocolDefaults;
use crate::types::{ratio_or_zero, Money, Percent, Ratio};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Acquisition and financing terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingTerms {
    pub purchase_price: Money,
    pub ltv_percent: Percent,
    pub interest_rate_percent: Percent,
    #[serde(default)]
    pub is_interest_only: bool,
    pub amortization_years: u32,
    /// Market cap rate, percent
    pub market_cap_rate_percent: Percent,
}

/// Year-one debt and return metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtAndReturns {
    pub loan_amount: Money,
    pub mortgage_constant: Ratio,
    pub annual_debt_service: Money,
    pub acquisition_costs: Money,
    pub equity_required: Money,
    /// NOI / price, percent 1 dp
    pub entry_cap_rate: Percent,
    pub exit_cap_rate: Percent,
    pub annual_reserves: Money,
    /// Percent 1 dp
    pub cash_on_cash: Percent,
    /// 2 dp
    pub dscr: Ratio,
}

// ---------------------------------------------------------------------------
// Mortgage math
// ---------------------------------------------------------------------------

/// (1 + r)^n, or `None` once it leaves the `Decimal` range.
pub fn compound_factor(periodic_rate: Ratio, periods: u64) -> Option<Decimal> {
    (Decimal::ONE + periodic_rate).checked_powu(periods)
}

/// Monthly payments over `years`.
pub fn months(years: u32) -> u64 {
    u64::from(years) * 12
}

/// Annual debt service per dollar of loan.
///
/// Interest-only: `rate / 100`. Amortizing: the annualised fixed-rate annuity
/// constant on monthly compounding, or `1 / amortization_years` at a zero rate.
/// A schedule long enough to overflow the compound factor converges on the
/// interest-only constant.
pub fn mortgage_constant(
    interest_rate_percent: Percent,
    amortization_years: u32,
    is_interest_only: bool,
) -> Ratio {
    let annual_rate = interest_rate_percent / dec!(100);

    if is_interest_only {
        return annual_rate;
    }

    if amortization_years == 0 {
        return Decimal::ZERO;
    }

    if annual_rate.is_zero() {
        return Decimal::ONE / Decimal::from(amortization_years);
    }

    let monthly_rate = annual_rate / dec!(12);
    let Some(compound) = compound_factor(monthly_rate, months(amortization_years)) else {
        return annual_rate;
    };
    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Decimal::ZERO;
    }

    dec!(12) * monthly_rate * compound / denominator
}

/// Level monthly payment for an amortizing loan (zero if it cannot be formed).
pub fn monthly_payment(principal: Money, interest_rate_percent: Percent, amortization_years: u32) -> Money {
    mortgage_constant(interest_rate_percent, amortization_years, false) * principal / dec!(12)
}

pub fn debt_amount(purchase_price: Money, ltv_percent: Percent) -> Money {
    purchase_price * (ltv_percent / dec!(100))
}

/// Loan x mortgage constant, rounded to cents. Zero loan means zero service.
pub fn annual_debt_service(
    loan_amount: Money,
    interest_rate_percent: Percent,
    is_interest_only: bool,
    amortization_years: u32,
) -> Money {
    if loan_amount.is_zero() {
        return Decimal::ZERO;
    }
    (loan_amount * mortgage_constant(interest_rate_percent, amortization_years, is_interest_only))
        .round_dp(2)
}

// ---------------------------------------------------------------------------
// Return metrics
// ---------------------------------------------------------------------------

pub fn acquisition_costs(purchase_price: Money, ratio: Ratio) -> Money {
    purchase_price * ratio
}

pub fn equity_required(purchase_price: Money, acquisition_costs: Money, loan_amount: Money) -> Money {
    purchase_price + acquisition_costs - loan_amount
}

pub fn entry_cap_rate(noi: Money, purchase_price: Money) -> Percent {
    (ratio_or_zero(noi, purchase_price) * dec!(100)).round_dp(1)
}

pub fn exit_cap_rate(market_cap_rate_percent: Percent, spread: Percent) -> Percent {
    market_cap_rate_percent + spread
}

pub fn annual_reserves(unit_count: u32, per_unit: Money) -> Money {
    Decimal::from(unit_count) * per_unit
}

/// Levered year-one yield after reserves. Zero when equity is not positive.
pub fn cash_on_cash(noi: Money, annual_debt_service: Money, reserves: Money, equity: Money) -> Percent {
    if equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((noi - annual_debt_service - reserves) / equity * dec!(100)).round_dp(1)
}

pub fn dscr(noi: Money, annual_debt_service: Money) -> Ratio {
    ratio_or_zero(noi, annual_debt_service).round_dp(2)
}

/// Loan-to-value in percent; zero without a price.
pub fn ltv_percent(loan_amount: Money, purchase_price: Money) -> Percent {
    ratio_or_zero(loan_amount, purchase_price) * dec!(100)
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Debt sizing and year-one returns for a given NOI.
pub fn calculate_debt_and_returns(
    terms: &FinancingTerms,
    noi: Money,
    unit_count: u32,
    defaults: &ProtocolDefaults,
) -> DebtAndReturns {
    let loan_amount = debt_amount(terms.purchase_price, terms.ltv_percent);
    let constant = mortgage_constant(
        terms.interest_rate_percent,
        terms.amortization_years,
        terms.is_interest_only,
    );
    let debt_service = annual_debt_service(
        loan_amount,
        terms.interest_rate_percent,
        terms.is_interest_only,
        terms.amortization_years,
    );
    let acq = acquisition_costs(terms.purchase_price, defaults.acquisition_cost_ratio);
    let equity = equity_required(terms.purchase_price, acq, loan_amount);
    let reserves = annual_reserves(unit_count, defaults.reserves_per_unit);

    DebtAndReturns {
        loan_amount,
        mortgage_constant: constant,
        annual_debt_service: debt_service,
        acquisition_costs: acq,
        equity_required: equity,
        entry_cap_rate: entry_cap_rate(noi, terms.purchase_price),
        exit_cap_rate: exit_cap_rate(terms.market_cap_rate_percent, defaults.exit_cap_spread),
        annual_reserves: reserves,
        cash_on_cash: cash_on_cash(noi, debt_service, reserves, equity),
        dscr: dscr(noi, debt_service),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
