use log::{debug, warn};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::IrrSettings;
use crate::financing::debt::{compound_factor, months, mortgage_constant};
use crate::types::{Money, Percent, Ratio};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Serialized multi-year projection consumed by report renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowProjection {
    /// Levered cash flow per hold year
    pub cash_flows: Vec<Money>,
    /// NOI per hold year
    pub projected_noi: Vec<Money>,
}

impl CashFlowProjection {
    /// Last projected NOI, if any year was projected.
    pub fn terminal_noi(&self) -> Option<Money> {
        self.projected_noi.last().copied()
    }

    pub fn total_cash_flow(&self) -> Money {
        self.cash_flows.iter().copied().sum()
    }
}

/// Outcome of the IRR solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrSolution {
    /// Percent, 1 dp
    pub irr: Percent,
    pub iterations: u32,
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// NOI and cash flow
// ---------------------------------------------------------------------------

/// Grow NOI year by year, rounding each year to cents before it becomes the
/// base for the next.
pub fn project_noi(base_noi: Money, growth_rates: &[Percent]) -> Vec<Money> {
    let mut projected = Vec::with_capacity(growth_rates.len());
    let mut current = base_noi;
    for rate in growth_rates {
        current = (current * (Decimal::ONE + *rate / dec!(100))).round_dp(2);
        projected.push(current);
    }
    projected
}

pub fn project_cash_flows(nois: &[Money], annual_debt_service: Money, reserves: Money) -> Vec<Money> {
    nois.iter()
        .map(|noi| *noi - annual_debt_service - reserves)
        .collect()
}

pub fn build_projection(
    base_noi: Money,
    growth_rates: &[Percent],
    annual_debt_service: Money,
    reserves: Money,
) -> CashFlowProjection {
    let projected_noi = project_noi(base_noi, growth_rates);
    let cash_flows = project_cash_flows(&projected_noi, annual_debt_service, reserves);
    CashFlowProjection {
        cash_flows,
        projected_noi,
    }
}

// ---------------------------------------------------------------------------
// Exit
// ---------------------------------------------------------------------------

/// Terminal NOI capitalised at the exit cap rate. Zero cap yields zero.
pub fn exit_value(terminal_noi: Money, exit_cap_percent: Percent) -> Money {
    if exit_cap_percent.is_zero() {
        return Decimal::ZERO;
    }
    (terminal_noi / (exit_cap_percent / dec!(100))).round_dp(2)
}

pub fn sale_costs(exit_value: Money, ratio: Ratio) -> Money {
    (exit_value * ratio).round_dp(2)
}

/// Outstanding principal after `years_elapsed` years of monthly payments.
///
/// Interest-only loans never amortize. At a zero rate principal falls in equal
/// monthly slices. Otherwise the standard remaining-balance formula
/// `P(1+r)^k - PMT((1+r)^k - 1)/r` applies, floored at zero once the loan is
/// paid off. When that formula leaves the `Decimal` range the equivalent
/// discounted form `P(1 - v^(n-k))/(1 - v^n)`, with `v = 1/(1+r)`, is used.
pub fn loan_balance(
    original_loan: Money,
    interest_rate_percent: Percent,
    is_interest_only: bool,
    amortization_years: u32,
    years_elapsed: u32,
) -> Money {
    if is_interest_only || amortization_years == 0 {
        return original_loan;
    }
    if years_elapsed >= amortization_years {
        return Decimal::ZERO;
    }

    let total_payments = months(amortization_years);
    let payments_made = months(years_elapsed);

    if interest_rate_percent.is_zero() {
        let monthly_principal = original_loan / Decimal::from(total_payments);
        return (original_loan - monthly_principal * Decimal::from(payments_made))
            .round_dp(2)
            .max(Decimal::ZERO);
    }

    let monthly_rate = interest_rate_percent / dec!(100) / dec!(12);
    let payment = mortgage_constant(interest_rate_percent, amortization_years, false) * original_loan
        / dec!(12);

    let balance = compound_factor(monthly_rate, payments_made)
        .and_then(|held| {
            let accrued = original_loan.checked_mul(held)?;
            let paid = payment.checked_mul(held - Decimal::ONE)?.checked_div(monthly_rate)?;
            accrued.checked_sub(paid)
        })
        .or_else(|| discounted_balance(original_loan, monthly_rate, total_payments, payments_made))
        .unwrap_or(original_loan);
    balance.round_dp(2).max(Decimal::ZERO)
}

fn discounted_balance(original_loan: Money, monthly_rate: Ratio, total_payments: u64, payments_made: u64) -> Option<Money> {
    let discount = Decimal::ONE.checked_div(Decimal::ONE + monthly_rate)?;
    let remaining = Decimal::ONE - discount.checked_powu(total_payments - payments_made)?;
    let whole = Decimal::ONE - discount.checked_powu(total_payments)?;
    original_loan.checked_mul(remaining.checked_div(whole)?)
}

pub fn net_sale_proceeds(exit_value: Money, sale_costs: Money, loan_balance: Money) -> Money {
    exit_value - sale_costs - loan_balance
}

/// Total distributions over equity, 2 dp. Zero equity yields zero.
pub fn equity_multiple(cash_flows: &[Money], net_sale_proceeds: Money, equity: Money) -> Ratio {
    if equity.is_zero() {
        return Decimal::ZERO;
    }
    let total: Money = cash_flows.iter().copied().sum::<Money>() + net_sale_proceeds;
    (total / equity).round_dp(2)
}

// ---------------------------------------------------------------------------
// IRR (Newton-Raphson)
// ---------------------------------------------------------------------------

/// Equity IRR in percent, 1 dp. See [`solve_irr`].
pub fn irr(
    initial_equity: Money,
    annual_cash_flows: &[Money],
    terminal_proceeds: Money,
    settings: &IrrSettings,
) -> Percent {
    solve_irr(initial_equity, annual_cash_flows, terminal_proceeds, settings).irr
}

/// Solve for the rate at which
/// `-equity + sum(cf_i / (1+r)^(i+1)) + terminal / (1+r)^n = 0`.
///
/// Newton-Raphson from `settings.initial_guess`, capped at
/// `settings.max_iterations`. A non-converging run returns the last estimate
/// with `converged = false`. Zero equity or an empty hold returns 0.
pub fn solve_irr(
    initial_equity: Money,
    annual_cash_flows: &[Money],
    terminal_proceeds: Money,
    settings: &IrrSettings,
) -> IrrSolution {
    if initial_equity.is_zero() || annual_cash_flows.is_empty() {
        return IrrSolution {
            irr: Decimal::ZERO,
            iterations: 0,
            converged: false,
        };
    }

    let mut flows = Vec::with_capacity(annual_cash_flows.len() + 1);
    flows.push(-initial_equity);
    flows.extend_from_slice(annual_cash_flows);
    if let Some(last) = flows.last_mut() {
        *last += terminal_proceeds;
    }

    let mut rate = settings.initial_guess;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < settings.max_iterations {
        iterations += 1;

        let Some((npv, dnpv)) = npv_and_derivative(&flows, rate) else {
            warn!("IRR: discounting overflowed at rate {}", rate);
            break;
        };

        if dnpv.abs() < dec!(0.000000000001) {
            warn!("IRR: derivative near zero at rate {}", rate);
            break;
        }

        let new_rate = rate - npv / dnpv;

        if (new_rate - rate).abs() < settings.tolerance {
            rate = new_rate;
            converged = true;
            break;
        }

        // Guard against runaway
        rate = new_rate.clamp(dec!(-0.99), dec!(10.0));
    }

    debug!(
        "IRR solver: rate={} iterations={} converged={}",
        rate, iterations, converged
    );

    IrrSolution {
        irr: (rate * dec!(100)).round_dp(1),
        iterations,
        converged,
    }
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
/// `None` when a discount factor leaves the representable range.
fn npv_and_derivative(cash_flows: &[Money], rate: Decimal) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r.is_zero() {
        return None;
    }
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        let pv = cf.checked_mul(discount)?;
        npv = npv.checked_add(pv)?;
        if t > 0 {
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            let term = Decimal::from(t as i64).checked_mul(pv)?.checked_div(one_plus_r)?;
            dnpv = dnpv.checked_sub(term)?;
        }
        discount = discount.checked_div(one_plus_r)?;
    }

    Some((npv, dnpv))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
