use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwritingError;
use crate::types::{Money, Percent};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

/// One calendar month of recorded operations for a deal.
///
/// Raw fields are entered; derived fields (`effective_gross_income`,
/// `total_operating_expenses`, `net_operating_income`, `cash_flow`,
/// `occupancy_percent`) are rebuilt by [`MonthlyActual::recalculate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyActual {
    pub deal_id: String,
    pub year: i32,
    pub month: u32,

    // Revenue
    #[serde(default)]
    pub gross_rental_income: Money,
    #[serde(default)]
    pub vacancy_loss: Money,
    #[serde(default)]
    pub other_income: Money,
    #[serde(default)]
    pub effective_gross_income: Money,

    // Expenses
    #[serde(default)]
    pub property_taxes: Money,
    #[serde(default)]
    pub insurance: Money,
    #[serde(default)]
    pub utilities: Money,
    #[serde(default)]
    pub repairs: Money,
    #[serde(default)]
    pub management: Money,
    #[serde(default)]
    pub payroll: Money,
    #[serde(default)]
    pub marketing: Money,
    #[serde(default)]
    pub administrative: Money,
    #[serde(default)]
    pub other_expenses: Money,
    #[serde(default)]
    pub total_operating_expenses: Money,

    // Bottom line
    #[serde(default)]
    pub net_operating_income: Money,
    #[serde(default)]
    pub debt_service: Money,
    #[serde(default)]
    pub capital_expenditures: Money,
    #[serde(default)]
    pub cash_flow: Money,

    // Occupancy snapshot
    #[serde(default)]
    pub occupied_units: u32,
    #[serde(default)]
    pub total_units: u32,
    #[serde(default)]
    pub occupancy_percent: Percent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl MonthlyActual {
    /// Empty month for `deal_id`. Year must be 2000-2100 and month 1-12.
    pub fn new(deal_id: impl Into<String>, year: i32, month: u32) -> UnderwritingResult<Self> {
        validate_period(year, month)?;
        Ok(Self {
            deal_id: deal_id.into(),
            year,
            month,
            gross_rental_income: Decimal::ZERO,
            vacancy_loss: Decimal::ZERO,
            other_income: Decimal::ZERO,
            effective_gross_income: Decimal::ZERO,
            property_taxes: Decimal::ZERO,
            insurance: Decimal::ZERO,
            utilities: Decimal::ZERO,
            repairs: Decimal::ZERO,
            management: Decimal::ZERO,
            payroll: Decimal::ZERO,
            marketing: Decimal::ZERO,
            administrative: Decimal::ZERO,
            other_expenses: Decimal::ZERO,
            total_operating_expenses: Decimal::ZERO,
            net_operating_income: Decimal::ZERO,
            debt_service: Decimal::ZERO,
            capital_expenditures: Decimal::ZERO,
            cash_flow: Decimal::ZERO,
            occupied_units: 0,
            total_units: 0,
            occupancy_percent: Decimal::ZERO,
            notes: None,
        })
    }

    /// Rebuild the derived fields from the raw ones. Occupancy is left as is
    /// when no total unit count was recorded.
    pub fn recalculate(&mut self) {
        self.effective_gross_income = self.gross_rental_income - self.vacancy_loss + self.other_income;
        self.total_operating_expenses = self.property_taxes
            + self.insurance
            + self.utilities
            + self.repairs
            + self.management
            + self.payroll
            + self.marketing
            + self.administrative
            + self.other_expenses;
        self.net_operating_income = self.effective_gross_income - self.total_operating_expenses;
        self.cash_flow = self.net_operating_income - self.debt_service - self.capital_expenditures;
        if self.total_units > 0 {
            self.occupancy_percent =
                Decimal::from(self.occupied_units) / Decimal::from(self.total_units) * dec!(100);
        }
    }

    /// Payroll, marketing, administrative and other, reported together.
    pub fn other_operating_expenses(&self) -> Money {
        self.payroll + self.marketing + self.administrative + self.other_expenses
    }

    /// Months since year 0, for ordering.
    fn period_index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }
}

/// Totals for one calendar year of actuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub year: i32,
    pub total_revenue: Money,
    pub total_expenses: Money,
    pub total_noi: Money,
    pub total_cash_flow: Money,
    pub average_occupancy: Percent,
    pub months_reported: u32,
}

impl AnnualSummary {
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            total_revenue: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            total_noi: Decimal::ZERO,
            total_cash_flow: Decimal::ZERO,
            average_occupancy: Decimal::ZERO,
            months_reported: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn validate_period(year: i32, month: u32) -> UnderwritingResult<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(UnderwritingError::out_of_range(
            "year",
            i64::from(year),
            i64::from(MIN_YEAR),
            i64::from(MAX_YEAR),
        ));
    }
    if !(1..=12).contains(&month) {
        return Err(UnderwritingError::out_of_range("month", i64::from(month), 1, 12));
    }
    Ok(())
}

/// The twelve most recent months, oldest first. Input order does not matter.
pub fn trailing_twelve(actuals: &[MonthlyActual]) -> Vec<MonthlyActual> {
    let mut sorted: Vec<MonthlyActual> = actuals.to_vec();
    sorted.sort_by_key(MonthlyActual::period_index);
    let skip = sorted.len().saturating_sub(12);
    sorted.split_off(skip)
}

/// Totals for `year`; a zeroed summary when the year has no months.
pub fn annual_summary(actuals: &[MonthlyActual], year: i32) -> AnnualSummary {
    let months: Vec<&MonthlyActual> = actuals.iter().filter(|a| a.year == year).collect();
    if months.is_empty() {
        return AnnualSummary::empty(year);
    }

    let count = Decimal::from(months.len() as u64);
    AnnualSummary {
        year,
        total_revenue: months.iter().map(|a| a.effective_gross_income).sum(),
        total_expenses: months.iter().map(|a| a.total_operating_expenses).sum(),
        total_noi: months.iter().map(|a| a.net_operating_income).sum(),
        total_cash_flow: months.iter().map(|a| a.cash_flow).sum(),
        average_occupancy: months.iter().map(|a| a.occupancy_percent).sum::<Decimal>() / count,
        months_reported: months.len() as u32,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
