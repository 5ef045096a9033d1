use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::expenses::{effective_expense_lines, DetailedExpenses};
use crate::config::ProtocolDefaults;
use crate::types::{ratio_or_zero, with_metadata, ComputationOutput, Money, Percent, Ratio};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Rent-roll inputs for the revenue pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueInput {
    /// Average monthly rent per unit
    pub rent_per_unit: Money,
    pub unit_count: u32,
    /// Physical occupancy, 0-100
    pub occupancy_percent: Percent,
    /// Actual other income (used verbatim, including zero)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_other_income: Option<Money>,
    /// Actual total operating expenses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_operating_expenses: Option<Money>,
    /// Line-item expenses; take precedence over the actual total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_expenses: Option<DetailedExpenses>,
}

/// Where the operating expense figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseBasis {
    Detailed,
    Actual,
    Ratio,
}

/// Year-one revenue and NOI figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub gross_potential_rent: Money,
    pub vacancy_loss: Money,
    pub net_rent: Money,
    pub other_income: Money,
    pub effective_gross_income: Money,
    pub operating_expenses: Money,
    pub expense_basis: ExpenseBasis,
    pub net_operating_income: Money,
    /// NOI / EGI in percent, 1 dp
    pub noi_margin: Percent,
}

// ---------------------------------------------------------------------------
// Formula primitives
// ---------------------------------------------------------------------------

/// Annual rent at full occupancy.
pub fn gross_potential_rent(rent_per_unit: Money, unit_count: u32) -> Money {
    rent_per_unit * Decimal::from(unit_count) * dec!(12)
}

pub fn vacancy_loss(gpr: Money, occupancy_percent: Percent) -> Money {
    gpr * (Decimal::ONE - occupancy_percent / dec!(100))
}

pub fn net_rent(gpr: Money, vacancy_loss: Money) -> Money {
    gpr - vacancy_loss
}

/// Actual other income if supplied (zero included), else a share of net rent.
pub fn other_income(net_rent: Money, actual: Option<Money>, ratio: Ratio) -> Money {
    match actual {
        Some(v) => v,
        None => net_rent * ratio,
    }
}

pub fn effective_gross_income(net_rent: Money, other_income: Money) -> Money {
    net_rent + other_income
}

/// Actual total if supplied, else `egi x ratio` rounded to cents.
pub fn ratio_operating_expenses(egi: Money, actual: Option<Money>, ratio: Ratio) -> Money {
    match actual {
        Some(v) => v,
        None => (egi * ratio).round_dp(2),
    }
}

pub fn net_operating_income(egi: Money, operating_expenses: Money) -> Money {
    egi - operating_expenses
}

pub fn noi_margin(noi: Money, egi: Money) -> Percent {
    (ratio_or_zero(noi, egi) * dec!(100)).round_dp(1)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full rent-roll to NOI pipeline.
pub fn calculate_revenue(input: &RevenueInput, defaults: &ProtocolDefaults) -> RevenueBreakdown {
    let gpr = gross_potential_rent(input.rent_per_unit, input.unit_count);
    revenue_from_gpr(input, gpr, input.occupancy_percent, defaults)
}

/// Pipeline from an already-known GPR and occupancy. Sensitivity stresses
/// re-enter here with a reduced GPR or occupancy.
pub fn revenue_from_gpr(
    input: &RevenueInput,
    gpr: Money,
    occupancy_percent: Percent,
    defaults: &ProtocolDefaults,
) -> RevenueBreakdown {
    let vacancy = vacancy_loss(gpr, occupancy_percent);
    let rent = net_rent(gpr, vacancy);
    let other = other_income(rent, input.actual_other_income, defaults.other_income_ratio);
    let egi = effective_gross_income(rent, other);

    let (operating_expenses, expense_basis) = match input.detailed_expenses.as_ref() {
        Some(d) if d.has_any_values() => {
            let total = effective_expense_lines(d, input.unit_count, egi, &defaults.expense_floors)
                .iter()
                .map(|l| l.effective)
                .sum();
            (total, ExpenseBasis::Detailed)
        }
        _ => match input.actual_operating_expenses {
            Some(v) => (v, ExpenseBasis::Actual),
            None => (
                ratio_operating_expenses(egi, None, defaults.opex_ratio),
                ExpenseBasis::Ratio,
            ),
        },
    };

    let noi = net_operating_income(egi, operating_expenses);

    RevenueBreakdown {
        gross_potential_rent: gpr,
        vacancy_loss: vacancy,
        net_rent: rent,
        other_income: other,
        effective_gross_income: egi,
        operating_expenses,
        expense_basis,
        net_operating_income: noi,
        noi_margin: noi_margin(noi, egi),
    }
}

/// Revenue pipeline wrapped in the standard output envelope.
pub fn analyze_revenue(
    input: &RevenueInput,
    defaults: &ProtocolDefaults,
) -> UnderwritingResult<ComputationOutput<RevenueBreakdown>> {
    let start = Instant::now();
    let mut warnings = revenue_warnings(input, defaults);

    let breakdown = calculate_revenue(input, defaults);
    if breakdown.net_operating_income < Decimal::ZERO {
        warnings.push(format!(
            "NOI is negative ({}); operating expenses exceed EGI",
            breakdown.net_operating_income
        ));
    }
    debug!(
        "revenue: egi={} opex={} ({:?}) noi={}",
        breakdown.effective_gross_income,
        breakdown.operating_expenses,
        breakdown.expense_basis,
        breakdown.net_operating_income
    );

    Ok(with_metadata(
        "Rent roll to NOI (GPR, vacancy, other income, operating expenses)",
        input,
        warnings,
        start.elapsed().as_micros() as u64,
        breakdown,
    ))
}

/// Non-fatal observations about a rent roll.
pub fn revenue_warnings(input: &RevenueInput, defaults: &ProtocolDefaults) -> Vec<String> {
    let mut warnings = Vec::new();

    if input.occupancy_percent > dec!(100) || input.occupancy_percent < Decimal::ZERO {
        warnings.push(format!(
            "Occupancy {}% is outside 0-100; vacancy loss will be distorted",
            input.occupancy_percent
        ));
    }

    if input.unit_count == 0 {
        warnings.push("Unit count is zero; revenue figures will be zero".into());
    }

    if let Some(d) = input.detailed_expenses.as_ref() {
        if d.has_any_values() && input.actual_operating_expenses.is_some() {
            warnings.push(
                "Both detailed and total operating expenses supplied; detailed breakdown used"
                    .into(),
            );
        }
        let gpr = gross_potential_rent(input.rent_per_unit, input.unit_count);
        let rent = net_rent(gpr, vacancy_loss(gpr, input.occupancy_percent));
        let egi = effective_gross_income(
            rent,
            other_income(rent, input.actual_other_income, defaults.other_income_ratio),
        );
        for line in effective_expense_lines(d, input.unit_count, egi, &defaults.expense_floors) {
            if line.is_floored() {
                warnings.push(format!(
                    "{} raised from {} to per-unit floor {}",
                    line.category, line.entered, line.effective
                ));
            }
        }
    }

    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
