use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwritingError;
use crate::types::{Money, Percent, Ratio};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Protocol defaults
// ---------------------------------------------------------------------------

/// Underwriting protocol defaults passed explicitly into every calculator.
///
/// `Default` yields the published protocol values. Any subset can be
/// overridden from a JSON or YAML document; missing fields keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolDefaults {
    /// Other income as a fraction of net rent when no actual figure is given
    pub other_income_ratio: Ratio,
    /// Operating expenses as a fraction of EGI when no actual figure is given
    pub opex_ratio: Ratio,
    /// Acquisition costs as a fraction of purchase price
    pub acquisition_cost_ratio: Ratio,
    /// Exit cap spread over the market cap rate, in percentage points
    pub exit_cap_spread: Percent,
    /// Annual replacement reserves per unit
    pub reserves_per_unit: Money,
    /// Sale costs as a fraction of exit value
    pub sale_cost_ratio: Ratio,
    pub expense_floors: ExpenseFloors,
    pub stress: StressSettings,
    pub irr: IrrSettings,
    pub variance_allocation: VarianceAllocation,
    pub deal_fallbacks: DealFallbacks,
}

impl Default for ProtocolDefaults {
    fn default() -> Self {
        Self {
            other_income_ratio: dec!(0.135),
            opex_ratio: dec!(0.5435),
            acquisition_cost_ratio: dec!(0.02),
            exit_cap_spread: dec!(0.5),
            reserves_per_unit: dec!(250),
            sale_cost_ratio: dec!(0.02),
            expense_floors: ExpenseFloors::default(),
            stress: StressSettings::default(),
            irr: IrrSettings::default(),
            variance_allocation: VarianceAllocation::default(),
            deal_fallbacks: DealFallbacks::default(),
        }
    }
}

/// Per-unit-per-annum minimums for detailed expense categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseFloors {
    pub repairs_and_maintenance: Money,
    pub payroll: Money,
    pub marketing: Money,
    pub general_and_admin: Money,
}

impl Default for ExpenseFloors {
    fn default() -> Self {
        Self {
            repairs_and_maintenance: dec!(600),
            payroll: dec!(1000),
            marketing: dec!(50),
            general_and_admin: dec!(250),
        }
    }
}

/// Magnitudes of the sensitivity stresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressSettings {
    /// GPR reduction, percent
    pub income_reduction: Percent,
    /// Occupancy reduction, percentage points
    pub occupancy_drop: Percent,
    /// Exit cap increase, percentage points
    pub exit_cap_increase: Percent,
}

impl Default for StressSettings {
    fn default() -> Self {
        Self {
            income_reduction: dec!(5),
            occupancy_drop: dec!(10),
            exit_cap_increase: dec!(1.0),
        }
    }
}

/// Newton-Raphson settings for the equity IRR solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrSettings {
    pub initial_guess: Ratio,
    pub max_iterations: u32,
    /// Convergence threshold on the change in rate between iterations
    pub tolerance: Ratio,
}

impl Default for IrrSettings {
    fn default() -> Self {
        Self {
            initial_guess: dec!(0.10),
            max_iterations: 100,
            tolerance: dec!(0.0001),
        }
    }
}

/// Shares of projected operating expenses assigned to each variance category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarianceAllocation {
    pub property_taxes: Ratio,
    pub insurance: Ratio,
    pub utilities: Ratio,
    pub repairs_and_maintenance: Ratio,
    pub management: Ratio,
    pub other_expenses: Ratio,
}

impl Default for VarianceAllocation {
    fn default() -> Self {
        Self {
            property_taxes: dec!(0.25),
            insurance: dec!(0.10),
            utilities: dec!(0.15),
            repairs_and_maintenance: dec!(0.10),
            management: dec!(0.20),
            other_expenses: dec!(0.20),
        }
    }
}

impl VarianceAllocation {
    pub fn total(&self) -> Ratio {
        self.property_taxes
            + self.insurance
            + self.utilities
            + self.repairs_and_maintenance
            + self.management
            + self.other_expenses
    }
}

/// Deal-entry fallbacks. The core never applies these on its own; callers
/// that assemble `CalculationInputs` from partial user entry use them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealFallbacks {
    pub ltv_percent: Percent,
    pub hold_period_years: u32,
    pub occupancy_percent: Percent,
    pub amortization_years: u32,
    pub loan_term_years: u32,
}

impl Default for DealFallbacks {
    fn default() -> Self {
        Self {
            ltv_percent: dec!(65),
            hold_period_years: 5,
            occupancy_percent: dec!(95),
            amortization_years: 30,
            loan_term_years: 5,
        }
    }
}

impl DealFallbacks {
    pub fn ltv_or_default(&self, input: Option<Percent>) -> Percent {
        input.unwrap_or(self.ltv_percent)
    }

    pub fn hold_period_or_default(&self, input: Option<u32>) -> u32 {
        input.unwrap_or(self.hold_period_years)
    }

    pub fn occupancy_or_default(&self, input: Option<Percent>) -> Percent {
        input.unwrap_or(self.occupancy_percent)
    }

    pub fn amortization_or_default(&self, input: Option<u32>) -> u32 {
        input.unwrap_or(self.amortization_years)
    }

    pub fn loan_term_or_default(&self, input: Option<u32>) -> u32 {
        input.unwrap_or(self.loan_term_years)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl ProtocolDefaults {
    /// Reject override documents that would make the calculators meaningless.
    pub fn validate(&self) -> UnderwritingResult<()> {
        let ratios = [
            ("other_income_ratio", self.other_income_ratio),
            ("opex_ratio", self.opex_ratio),
            ("acquisition_cost_ratio", self.acquisition_cost_ratio),
            ("sale_cost_ratio", self.sale_cost_ratio),
        ];
        for (field, value) in ratios {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(UnderwritingError::InvalidInput {
                    field: field.into(),
                    reason: format!("must be between 0 and 1, got {value}"),
                });
            }
        }

        if self.reserves_per_unit < Decimal::ZERO {
            return Err(UnderwritingError::InvalidInput {
                field: "reserves_per_unit".into(),
                reason: "reserves cannot be negative".into(),
            });
        }

        if self.irr.max_iterations == 0 {
            return Err(UnderwritingError::InvalidInput {
                field: "irr.max_iterations".into(),
                reason: "solver needs at least one iteration".into(),
            });
        }

        if self.irr.tolerance <= Decimal::ZERO {
            return Err(UnderwritingError::InvalidInput {
                field: "irr.tolerance".into(),
                reason: "tolerance must be positive".into(),
            });
        }

        if self.variance_allocation.total() != Decimal::ONE {
            return Err(UnderwritingError::InvalidInput {
                field: "variance_allocation".into(),
                reason: format!(
                    "category shares must sum to 1, got {}",
                    self.variance_allocation.total()
                ),
            });
        }

        Ok(())
    }
}
