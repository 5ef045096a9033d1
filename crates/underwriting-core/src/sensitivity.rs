use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::ProtocolDefaults;
use crate::income::revenue::{calculate_revenue, gross_potential_rent, revenue_from_gpr, RevenueInput};
use crate::projection::exit_value;
use crate::types::{with_metadata, ComputationOutput, Money, Percent};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One stressed variant of the base deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityScenario {
    pub name: String,
    pub noi: Money,
    pub noi_delta: Money,
    pub exit_value: Money,
    pub exit_value_delta: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub revenue: RevenueInput,
    /// Exit cap rate before stress, percent
    pub exit_cap_rate_percent: Percent,
    /// NOI capitalised at exit; the base NOI when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_noi: Option<Money>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The four standard scenarios, in order: base, income stress, occupancy
/// stress, exit cap stress.
///
/// Income and occupancy stresses re-run the revenue pipeline and leave exit
/// value at base. The cap stress keeps base NOI and moves only exit value.
pub fn run_scenarios(
    revenue: &RevenueInput,
    exit_cap_rate_percent: Percent,
    terminal_noi: Money,
    defaults: &ProtocolDefaults,
) -> Vec<SensitivityScenario> {
    let stress = &defaults.stress;

    let base_noi = calculate_revenue(revenue, defaults).net_operating_income;
    let base_exit = exit_value(terminal_noi, exit_cap_rate_percent);

    let gpr = gross_potential_rent(revenue.rent_per_unit, revenue.unit_count);
    let stressed_gpr = gpr * (Decimal::ONE - stress.income_reduction / dec!(100));
    let income_noi =
        revenue_from_gpr(revenue, stressed_gpr, revenue.occupancy_percent, defaults).net_operating_income;

    let stressed_occupancy = revenue.occupancy_percent - stress.occupancy_drop;
    let occupancy_noi =
        revenue_from_gpr(revenue, gpr, stressed_occupancy, defaults).net_operating_income;

    let stressed_exit = exit_value(terminal_noi, exit_cap_rate_percent + stress.exit_cap_increase);

    debug!(
        "sensitivity: base={} income={} occupancy={} exit {} -> {}",
        base_noi, income_noi, occupancy_noi, base_exit, stressed_exit
    );

    vec![
        SensitivityScenario {
            name: "Base Case".into(),
            noi: base_noi,
            noi_delta: Decimal::ZERO,
            exit_value: base_exit,
            exit_value_delta: Decimal::ZERO,
        },
        SensitivityScenario {
            name: format!("Income -{}%", stress.income_reduction.normalize()),
            noi: income_noi,
            noi_delta: income_noi - base_noi,
            exit_value: base_exit,
            exit_value_delta: Decimal::ZERO,
        },
        SensitivityScenario {
            name: format!("Occupancy -{}%", stress.occupancy_drop.normalize()),
            noi: occupancy_noi,
            noi_delta: occupancy_noi - base_noi,
            exit_value: base_exit,
            exit_value_delta: Decimal::ZERO,
        },
        SensitivityScenario {
            name: format!(
                "Cap Rate +{}bps",
                (stress.exit_cap_increase * dec!(100)).normalize()
            ),
            noi: base_noi,
            noi_delta: Decimal::ZERO,
            exit_value: stressed_exit,
            exit_value_delta: stressed_exit - base_exit,
        },
    ]
}

/// Sensitivity scenarios wrapped in the standard output envelope.
pub fn run_sensitivity(
    input: &SensitivityInput,
    defaults: &ProtocolDefaults,
) -> UnderwritingResult<ComputationOutput<Vec<SensitivityScenario>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let terminal_noi = match input.terminal_noi {
        Some(noi) => noi,
        None => {
            warnings.push("No terminal NOI supplied; base NOI capitalised at exit".into());
            calculate_revenue(&input.revenue, defaults).net_operating_income
        }
    };
    if input.exit_cap_rate_percent.is_zero() {
        warnings.push("Exit cap rate is zero; exit values are zero".into());
    }
    if input.revenue.occupancy_percent < defaults.stress.occupancy_drop {
        warnings.push("Occupancy stress drives occupancy below zero".into());
    }

    let scenarios = run_scenarios(
        &input.revenue,
        input.exit_cap_rate_percent,
        terminal_noi,
        defaults,
    );

    Ok(with_metadata(
        "Sensitivity scenarios (income, occupancy, exit cap stress)",
        input,
        warnings,
        start.elapsed().as_micros() as u64,
        scenarios,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
