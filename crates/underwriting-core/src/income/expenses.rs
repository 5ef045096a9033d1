use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::ExpenseFloors;
use crate::types::{Money, Percent};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Line-item annual expense breakdown. When any item is present it replaces
/// ratio-based operating expenses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedExpenses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_estate_taxes: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilities: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repairs_and_maintenance: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payroll: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_and_admin: Option<Money>,
    /// Flat annual management fee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_fee: Option<Money>,
    /// Management fee as a percent of EGI (0-100); overrides the flat fee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_fee_pct: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_reserves: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_expenses: Option<Money>,
}

impl DetailedExpenses {
    /// True when at least one line item has been entered.
    pub fn has_any_values(&self) -> bool {
        self.real_estate_taxes.is_some()
            || self.insurance.is_some()
            || self.utilities.is_some()
            || self.repairs_and_maintenance.is_some()
            || self.payroll.is_some()
            || self.marketing.is_some()
            || self.general_and_admin.is_some()
            || self.management_fee.is_some()
            || self.management_fee_pct.is_some()
            || self.replacement_reserves.is_some()
            || self.other_expenses.is_some()
    }
}

/// One category after the PUPA floor and management-fee rules are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseLine {
    pub category: String,
    pub entered: Money,
    /// Floor for the whole property (per-unit floor x units), if the category has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<Money>,
    pub effective: Money,
}

impl ExpenseLine {
    pub fn is_floored(&self) -> bool {
        self.effective > self.entered
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve each entered category to its effective amount.
///
/// Absent categories are skipped entirely, so no floor applies to them. A
/// management fee percentage is converted against `egi` and takes precedence
/// over a flat fee.
pub fn effective_expense_lines(
    expenses: &DetailedExpenses,
    unit_count: u32,
    egi: Money,
    floors: &ExpenseFloors,
) -> Vec<ExpenseLine> {
    let units = Decimal::from(unit_count);
    let mut lines = Vec::new();

    push_line(&mut lines, "Real Estate Taxes", expenses.real_estate_taxes, None);
    push_line(&mut lines, "Insurance", expenses.insurance, None);
    push_line(&mut lines, "Utilities", expenses.utilities, None);
    push_line(
        &mut lines,
        "Repairs & Maintenance",
        expenses.repairs_and_maintenance,
        Some(floors.repairs_and_maintenance * units),
    );
    push_line(
        &mut lines,
        "Payroll",
        expenses.payroll,
        Some(floors.payroll * units),
    );
    push_line(
        &mut lines,
        "Marketing",
        expenses.marketing,
        Some(floors.marketing * units),
    );
    push_line(
        &mut lines,
        "General & Administrative",
        expenses.general_and_admin,
        Some(floors.general_and_admin * units),
    );

    let management = match expenses.management_fee_pct {
        Some(pct) => Some(egi * pct / dec!(100)),
        None => expenses.management_fee,
    };
    push_line(&mut lines, "Management Fee", management, None);
    push_line(
        &mut lines,
        "Replacement Reserves",
        expenses.replacement_reserves,
        None,
    );
    push_line(&mut lines, "Other Expenses", expenses.other_expenses, None);

    lines
}

/// Total operating expenses from a detailed breakdown. `None` or an empty
/// breakdown totals zero.
pub fn total_detailed_expenses(
    expenses: Option<&DetailedExpenses>,
    unit_count: u32,
    egi: Money,
    floors: &ExpenseFloors,
) -> Money {
    match expenses {
        Some(e) => effective_expense_lines(e, unit_count, egi, floors)
            .iter()
            .map(|l| l.effective)
            .sum(),
        None => Decimal::ZERO,
    }
}

fn push_line(
    lines: &mut Vec<ExpenseLine>,
    category: &str,
    entered: Option<Money>,
    floor: Option<Money>,
) {
    let Some(entered) = entered else {
        return;
    };
    let effective = match floor {
        Some(f) => entered.max(f),
        None => entered,
    };
    lines.push(ExpenseLine {
        category: category.to_string(),
        entered,
        floor,
        effective,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_expenses() -> DetailedExpenses {
        DetailedExpenses {
            real_estate_taxes: Some(dec!(100000)),
            insurance: Some(dec!(50000)),
            utilities: Some(dec!(30000)),
            repairs_and_maintenance: Some(dec!(60000)),
            payroll: Some(dec!(80000)),
            marketing: Some(dec!(10000)),
            general_and_admin: Some(dec!(25000)),
            management_fee: Some(dec!(40000)),
            management_fee_pct: None,
            replacement_reserves: Some(dec!(20000)),
            other_expenses: Some(dec!(5000)),
        }
    }

    #[test]
    fn test_full_breakdown_with_payroll_floor() {
        // Payroll 80k is below 100 units x $1,000 and is lifted to 100k
        let total = total_detailed_expenses(
            Some(&sample_expenses()),
            100,
            dec!(1000000),
            &ExpenseFloors::default(),
        );
        assert_eq!(total, dec!(440000));
    }

    #[test]
    fn test_management_pct_overrides_flat_fee() {
        let expenses = DetailedExpenses {
            management_fee: Some(dec!(99999)),
            management_fee_pct: Some(dec!(3.5)),
            ..Default::default()
        };
        let total =
            total_detailed_expenses(Some(&expenses), 100, dec!(1000000), &ExpenseFloors::default());
        assert_eq!(total, dec!(35000));
    }

    #[test]
    fn test_all_floored_categories() {
        let expenses = DetailedExpenses {
            repairs_and_maintenance: Some(dec!(1000)),
            payroll: Some(dec!(1000)),
            marketing: Some(dec!(100)),
            general_and_admin: Some(dec!(500)),
            ..Default::default()
        };
        // 50 x (600 + 1000 + 50 + 250)
        let total =
            total_detailed_expenses(Some(&expenses), 50, dec!(500000), &ExpenseFloors::default());
        assert_eq!(total, dec!(95000));
    }

    #[test]
    fn test_repairs_floor_lifts_entered_value() {
        let expenses = DetailedExpenses {
            repairs_and_maintenance: Some(dec!(40000)),
            ..Default::default()
        };
        let lines = effective_expense_lines(&expenses, 100, dec!(0), &ExpenseFloors::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].effective, dec!(60000));
        assert!(lines[0].is_floored());
    }

    #[test]
    fn test_absent_categories_contribute_nothing() {
        let floors = ExpenseFloors::default();
        assert_eq!(total_detailed_expenses(None, 100, dec!(1000000), &floors), dec!(0));
        assert_eq!(
            total_detailed_expenses(Some(&DetailedExpenses::default()), 100, dec!(1000000), &floors),
            dec!(0)
        );
        assert!(!DetailedExpenses::default().has_any_values());
    }
}
