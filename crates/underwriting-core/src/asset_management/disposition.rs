use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::asset_management::actuals::{trailing_twelve, MonthlyActual};
use crate::financing::debt::compound_factor;
use crate::types::{ratio_or_zero, with_metadata, ComputationOutput, Money, Percent, Ratio};
use crate::underwriting::CalculationResult;
use crate::{UnderwritingError, UnderwritingResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn default_selling_cost_percent() -> Percent {
    dec!(3)
}

fn default_noi_growth_percent() -> Percent {
    dec!(2)
}

fn default_additional_years() -> u32 {
    5
}

/// Longest further hold a disposition review will project.
pub const MAX_ADDITIONAL_HOLD_YEARS: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleAssumptions {
    pub sale_price: Money,
    #[serde(default = "default_selling_cost_percent")]
    pub selling_cost_percent: Percent,
    pub hold_months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldAssumptions {
    #[serde(default = "default_additional_years")]
    pub additional_years: u32,
    #[serde(default = "default_noi_growth_percent")]
    pub noi_growth_percent: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinanceAssumptions {
    pub new_loan_amount: Money,
    pub new_rate_percent: Percent,
}

/// Inputs for a sell / hold / refinance review of an owned asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispositionInput {
    pub projection: CalculationResult,
    #[serde(default)]
    pub actuals: Vec<MonthlyActual>,
    #[serde(default)]
    pub market_cap_rate_percent: Option<Percent>,
    #[serde(default)]
    pub broker_opinion_of_value: Option<Money>,
    #[serde(default)]
    pub sale: Option<SaleAssumptions>,
    #[serde(default)]
    pub hold: Option<HoldAssumptions>,
    #[serde(default)]
    pub refinance: Option<RefinanceAssumptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellScenario {
    pub sale_price: Money,
    pub selling_costs: Money,
    pub remaining_loan_balance: Money,
    pub net_proceeds: Money,
    pub equity_invested: Money,
    pub cumulative_cash_flow: Money,
    pub total_profit: Money,
    pub equity_multiple: Ratio,
    pub hold_months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldScenario {
    pub additional_years: u32,
    pub projected_annual_noi: Money,
    pub projected_exit_value: Money,
    pub projected_cash_on_cash: Percent,
    pub projected_equity_multiple: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinanceScenario {
    pub new_loan_amount: Money,
    pub current_loan_balance: Money,
    pub cash_out: Money,
    pub new_rate_percent: Percent,
    /// Interest-only on the new loan
    pub new_annual_debt_service: Money,
    pub remaining_equity: Money,
    pub go_forward_cash_on_cash: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionAnalysis {
    pub deal_id: String,
    pub trailing_twelve_noi: Money,
    pub months_reported: u32,
    pub market_cap_rate_percent: Option<Percent>,
    pub broker_opinion_of_value: Option<Money>,
    pub implied_value: Money,
    /// BOV over implied value, percent. Absent without a BOV or a value.
    pub bov_premium_percent: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell: Option<SellScenario>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold: Option<HoldScenario>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinance: Option<RefinanceScenario>,
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

/// NOI over the trailing twelve months, scaled by 12/n when fewer than twelve
/// are on record.
pub fn trailing_twelve_noi(actuals: &[MonthlyActual]) -> Money {
    let t12 = trailing_twelve(actuals);
    let total: Money = t12.iter().map(|a| a.net_operating_income).sum();
    let n = t12.len();
    if n > 0 && n < 12 {
        total * dec!(12) / Decimal::from(n as u64)
    } else {
        total
    }
}

/// Direct capitalization of `t12_noi`. Zero without a positive cap rate.
pub fn implied_value(t12_noi: Money, market_cap_rate_percent: Option<Percent>) -> Money {
    match market_cap_rate_percent {
        Some(cap) if cap > Decimal::ZERO => t12_noi / (cap / dec!(100)),
        _ => Decimal::ZERO,
    }
}

/// Current NOI for forward scenarios: actuals when recorded, underwriting otherwise.
fn current_noi(projection: &CalculationResult, actuals: &[MonthlyActual]) -> Money {
    if actuals.is_empty() {
        projection.net_operating_income
    } else {
        trailing_twelve_noi(actuals)
    }
}

fn invested_equity(projection: &CalculationResult) -> Money {
    projection.purchase_price - projection.loan_amount
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Sale at `sale_price`. The loan is carried at its original amount.
pub fn sell_scenario(
    projection: &CalculationResult,
    actuals: &[MonthlyActual],
    sale: &SaleAssumptions,
) -> SellScenario {
    let selling_costs = sale.sale_price * sale.selling_cost_percent / dec!(100);
    let loan = projection.loan_amount;
    let net_proceeds = sale.sale_price - selling_costs - loan;
    let equity = invested_equity(projection);
    let cumulative_cash_flow: Money = trailing_twelve(actuals).iter().map(|a| a.cash_flow).sum();

    SellScenario {
        sale_price: sale.sale_price,
        selling_costs,
        remaining_loan_balance: loan,
        net_proceeds,
        equity_invested: equity,
        cumulative_cash_flow,
        total_profit: net_proceeds - equity + cumulative_cash_flow,
        equity_multiple: if equity > Decimal::ZERO {
            ((net_proceeds + cumulative_cash_flow) / equity).round_dp(2)
        } else {
            Decimal::ZERO
        },
        hold_months: sale.hold_months,
    }
}

/// Keep the asset for `additional_years` more, growing NOI and exiting at the
/// entry cap rate. Errors when the horizon is out of range or the grown NOI
/// cannot be represented.
pub fn hold_scenario(
    projection: &CalculationResult,
    actuals: &[MonthlyActual],
    hold: &HoldAssumptions,
) -> UnderwritingResult<HoldScenario> {
    if hold.additional_years > MAX_ADDITIONAL_HOLD_YEARS {
        return Err(UnderwritingError::out_of_range(
            "hold.additional_years",
            i64::from(hold.additional_years),
            0,
            i64::from(MAX_ADDITIONAL_HOLD_YEARS),
        ));
    }

    let noi = current_noi(projection, actuals);
    let years = Decimal::from(hold.additional_years);
    let overflow = || UnderwritingError::InvalidInput {
        field: "hold.noi_growth_percent".into(),
        reason: format!(
            "{}% over {} years exceeds the representable range",
            hold.noi_growth_percent, hold.additional_years
        ),
    };

    let future_noi = compound_factor(hold.noi_growth_percent / dec!(100), u64::from(hold.additional_years))
        .and_then(|growth| noi.checked_mul(growth))
        .ok_or_else(overflow)?
        .round_dp(2);
    let exit = if projection.entry_cap_rate.is_zero() {
        Decimal::ZERO
    } else {
        future_noi
            .checked_div(projection.entry_cap_rate / dec!(100))
            .ok_or_else(overflow)?
            .round_dp(2)
    };
    let equity = invested_equity(projection);
    let annual_cash_flow = noi - projection.annual_debt_service;

    let (coc, multiple) = if equity > Decimal::ZERO {
        let distributions = annual_cash_flow
            .checked_mul(years)
            .and_then(|held| exit.checked_add(held))
            .ok_or_else(overflow)?;
        (
            (annual_cash_flow / equity * dec!(100)).round_dp(1),
            distributions.checked_div(equity).ok_or_else(overflow)?.round_dp(2),
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    Ok(HoldScenario {
        additional_years: hold.additional_years,
        projected_annual_noi: future_noi,
        projected_exit_value: exit,
        projected_cash_on_cash: coc,
        projected_equity_multiple: multiple,
    })
}

/// Replace the loan with an interest-only loan of `new_loan_amount`.
pub fn refinance_scenario(
    projection: &CalculationResult,
    actuals: &[MonthlyActual],
    refi: &RefinanceAssumptions,
) -> RefinanceScenario {
    let current_balance = projection.loan_amount;
    let new_ds = (refi.new_loan_amount * refi.new_rate_percent / dec!(100)).round_dp(2);
    let remaining_equity = projection.purchase_price - refi.new_loan_amount;
    let cash_flow = current_noi(projection, actuals) - new_ds;
    let coc = if remaining_equity > Decimal::ZERO {
        (cash_flow / remaining_equity * dec!(100)).round_dp(1)
    } else {
        Decimal::ZERO
    };

    RefinanceScenario {
        new_loan_amount: refi.new_loan_amount,
        current_loan_balance: current_balance,
        cash_out: (refi.new_loan_amount - current_balance).max(Decimal::ZERO),
        new_rate_percent: refi.new_rate_percent,
        new_annual_debt_service: new_ds,
        remaining_equity,
        go_forward_cash_on_cash: coc,
    }
}

/// Valuation plus whichever scenarios were requested.
pub fn evaluate_disposition(input: &DispositionInput) -> UnderwritingResult<DispositionAnalysis> {
    let t12 = trailing_twelve_noi(&input.actuals);
    let value = implied_value(t12, input.market_cap_rate_percent);
    let bov_premium_percent = input
        .broker_opinion_of_value
        .filter(|_| !value.is_zero())
        .map(|bov| (ratio_or_zero(bov - value, value) * dec!(100)).round_dp(1));

    debug!(
        "disposition {}: t12 noi {} implied value {}",
        input.projection.deal_id, t12, value
    );

    let hold = input
        .hold
        .as_ref()
        .map(|h| hold_scenario(&input.projection, &input.actuals, h))
        .transpose()?;

    Ok(DispositionAnalysis {
        deal_id: input.projection.deal_id.clone(),
        trailing_twelve_noi: t12,
        months_reported: trailing_twelve(&input.actuals).len() as u32,
        market_cap_rate_percent: input.market_cap_rate_percent,
        broker_opinion_of_value: input.broker_opinion_of_value,
        implied_value: value,
        bov_premium_percent,
        sell: input
            .sale
            .as_ref()
            .map(|s| sell_scenario(&input.projection, &input.actuals, s)),
        hold,
        refinance: input
            .refinance
            .as_ref()
            .map(|r| refinance_scenario(&input.projection, &input.actuals, r)),
    })
}

/// Disposition review wrapped in the standard output envelope.
pub fn analyze_disposition(input: &DispositionInput) -> UnderwritingResult<ComputationOutput<DispositionAnalysis>> {
    let start = Instant::now();
    let analysis = evaluate_disposition(input)?;

    let mut warnings: Vec<String> = Vec::new();
    if input.actuals.is_empty() {
        warnings.push("No monthly actuals; trailing-twelve NOI is 0 and scenarios use underwritten NOI".into());
    } else if analysis.months_reported < 12 {
        warnings.push(format!(
            "Only {} months on record; trailing-twelve NOI annualized",
            analysis.months_reported
        ));
    }
    if !matches!(input.market_cap_rate_percent, Some(c) if c > Decimal::ZERO) {
        warnings.push("No positive market cap rate; implied value is 0".into());
    }

    Ok(with_metadata(
        "Disposition review (T12 direct capitalization, sell / hold / refinance scenarios)",
        input,
        warnings,
        start.elapsed().as_micros() as u64,
        analysis,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
