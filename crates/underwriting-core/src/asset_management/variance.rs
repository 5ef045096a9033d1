use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::asset_management::actuals::MonthlyActual;
use crate::config::{ProtocolDefaults, VarianceAllocation};
use crate::types::{ratio_or_zero, with_metadata, ComputationOutput, Money, Percent};
use crate::underwriting::CalculationResult;
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

const WARNING_THRESHOLD: Percent = dec!(5);
const CRITICAL_THRESHOLD: Percent = dec!(15);

/// How far a line item has drifted from its projection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VarianceSeverity {
    /// Under 5% either way
    #[default]
    OnTrack,
    /// 5% to 15%
    Warning,
    /// 15% and beyond
    Critical,
}

impl VarianceSeverity {
    pub fn classify(variance_percent: Percent) -> Self {
        let magnitude = variance_percent.abs();
        if magnitude < WARNING_THRESHOLD {
            VarianceSeverity::OnTrack
        } else if magnitude < CRITICAL_THRESHOLD {
            VarianceSeverity::Warning
        } else {
            VarianceSeverity::Critical
        }
    }
}

/// Projected vs annualized actual for one revenue or expense line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceLineItem {
    pub name: String,
    pub projected: Money,
    pub actual: Money,
    /// actual - projected
    pub variance: Money,
    pub variance_percent: Percent,
    pub severity: VarianceSeverity,
    /// Revenue above projection, or cost/loss below it
    pub favorable: bool,
}

impl VarianceLineItem {
    fn new(name: &str, projected: Money, actual: Money, higher_is_better: bool) -> Self {
        let variance = actual - projected;
        let variance_percent = ratio_or_zero(variance, projected) * dec!(100);
        Self {
            name: name.to_string(),
            projected,
            actual,
            variance,
            variance_percent,
            severity: VarianceSeverity::classify(variance_percent),
            favorable: if higher_is_better {
                variance >= Decimal::ZERO
            } else {
                variance <= Decimal::ZERO
            },
        }
    }
}

/// Underwriting projection against annualized actuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VarianceReport {
    pub months_analyzed: u32,
    pub projected_noi: Money,
    pub actual_noi: Money,
    pub noi_variance: Money,
    pub noi_variance_percent: Percent,
    pub projected_revenue: Money,
    pub actual_revenue: Money,
    pub projected_expenses: Money,
    pub actual_expenses: Money,
    pub projected_cash_on_cash: Percent,
    pub actual_cash_on_cash: Percent,
    pub revenue_items: Vec<VarianceLineItem>,
    pub expense_items: Vec<VarianceLineItem>,
}

impl VarianceReport {
    /// Line items at the given severity, revenue first.
    pub fn items_at(&self, severity: VarianceSeverity) -> impl Iterator<Item = &VarianceLineItem> {
        self.revenue_items
            .iter()
            .chain(self.expense_items.iter())
            .filter(move |i| i.severity == severity)
    }

    pub fn has_critical(&self) -> bool {
        self.items_at(VarianceSeverity::Critical).next().is_some()
    }
}

/// Request for [`analyze_variance`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceRequest {
    pub projection: CalculationResult,
    pub actuals: Vec<MonthlyActual>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Sum of `field` over the months, scaled to a full year.
fn annualized(actuals: &[MonthlyActual], factor: Decimal, field: impl Fn(&MonthlyActual) -> Money) -> Money {
    actuals.iter().map(field).sum::<Decimal>() * factor
}

/// Compare the projection with recorded months. Empty actuals give an empty
/// report. The months are annualized by `12 / n` whatever `n` is.
pub fn calculate_variance(
    projection: &CalculationResult,
    actuals: &[MonthlyActual],
    allocation: &VarianceAllocation,
) -> VarianceReport {
    if actuals.is_empty() {
        return VarianceReport::default();
    }

    let factor = dec!(12) / Decimal::from(actuals.len() as u64);
    let actual_noi = annualized(actuals, factor, |a| a.net_operating_income);
    let actual_revenue = annualized(actuals, factor, |a| a.effective_gross_income);
    let actual_expenses = annualized(actuals, factor, |a| a.total_operating_expenses);
    let actual_cash_flow = annualized(actuals, factor, |a| a.cash_flow);

    let projected_noi = projection.net_operating_income;
    let noi_variance = actual_noi - projected_noi;
    let noi_variance_percent = ratio_or_zero(noi_variance, projected_noi.abs()) * dec!(100);

    let revenue_items = vec![
        VarianceLineItem::new(
            "Gross Rental Income",
            projection.gross_potential_rent,
            annualized(actuals, factor, |a| a.gross_rental_income),
            true,
        ),
        VarianceLineItem::new(
            "Vacancy Loss",
            projection.vacancy_loss,
            annualized(actuals, factor, |a| a.vacancy_loss),
            false,
        ),
        VarianceLineItem::new(
            "Other Income",
            projection.other_income,
            annualized(actuals, factor, |a| a.other_income),
            true,
        ),
    ];

    let opex = projection.operating_expenses;
    let expense_items = vec![
        VarianceLineItem::new(
            "Property Taxes",
            opex * allocation.property_taxes,
            annualized(actuals, factor, |a| a.property_taxes),
            false,
        ),
        VarianceLineItem::new(
            "Insurance",
            opex * allocation.insurance,
            annualized(actuals, factor, |a| a.insurance),
            false,
        ),
        VarianceLineItem::new(
            "Utilities",
            opex * allocation.utilities,
            annualized(actuals, factor, |a| a.utilities),
            false,
        ),
        VarianceLineItem::new(
            "Repairs & Maintenance",
            opex * allocation.repairs_and_maintenance,
            annualized(actuals, factor, |a| a.repairs),
            false,
        ),
        VarianceLineItem::new(
            "Management",
            opex * allocation.management,
            annualized(actuals, factor, |a| a.management),
            false,
        ),
        VarianceLineItem::new(
            "Other Expenses",
            opex * allocation.other_expenses,
            annualized(actuals, factor, MonthlyActual::other_operating_expenses),
            false,
        ),
    ];

    let equity = projection.purchase_price - projection.loan_amount;
    let actual_cash_on_cash = if equity > Decimal::ZERO {
        actual_cash_flow / equity * dec!(100)
    } else {
        Decimal::ZERO
    };

    debug!(
        "variance {}: {} months, noi {} vs {} ({}%)",
        projection.deal_id,
        actuals.len(),
        actual_noi,
        projected_noi,
        noi_variance_percent.round_dp(1)
    );

    VarianceReport {
        months_analyzed: actuals.len() as u32,
        projected_noi,
        actual_noi,
        noi_variance,
        noi_variance_percent,
        projected_revenue: projection.effective_gross_income,
        actual_revenue,
        projected_expenses: opex,
        actual_expenses,
        projected_cash_on_cash: projection.cash_on_cash_return,
        actual_cash_on_cash,
        revenue_items,
        expense_items,
    }
}

/// Variance analysis wrapped in the standard output envelope.
pub fn analyze_variance(
    request: &VarianceRequest,
    defaults: &ProtocolDefaults,
) -> UnderwritingResult<ComputationOutput<VarianceReport>> {
    let start = Instant::now();
    defaults.validate()?;

    let mut warnings: Vec<String> = Vec::new();
    if request.actuals.is_empty() {
        warnings.push("No monthly actuals supplied; variance report is empty".into());
    } else if request.actuals.len() > 12 {
        warn!(
            "variance for {} given {} months; annualizing all of them",
            request.projection.deal_id,
            request.actuals.len()
        );
        warnings.push(format!(
            "{} months supplied; more than twelve months are scaled down to one year",
            request.actuals.len()
        ));
    }
    let allocation_total = defaults.variance_allocation.total();
    if allocation_total != Decimal::ONE {
        warnings.push(format!(
            "Expense allocation weights sum to {}, not 1",
            allocation_total.normalize()
        ));
    }

    let report = calculate_variance(&request.projection, &request.actuals, &defaults.variance_allocation);
    for item in report.items_at(VarianceSeverity::Critical) {
        warnings.push(format!(
            "{} is {:.1}% off projection",
            item.name, item.variance_percent
        ));
    }

    Ok(with_metadata(
        "Underwriting vs annualized actuals variance (12/n annualization, allocated expense lines)",
        request,
        warnings,
        start.elapsed().as_micros() as u64,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::asset_management::actuals::tests::sample_month;
    use crate::underwriting::tests::sample_inputs;
    use crate::underwriting::assemble;

    pub(crate) fn sample_projection() -> CalculationResult {
        assemble(&sample_inputs(), &ProtocolDefaults::default())
    }

    #[test]
    fn test_empty_actuals_give_empty_report() {
        let r = calculate_variance(&sample_projection(), &[], &VarianceAllocation::default());
        assert_eq!(r, VarianceReport::default());
        assert!(r.revenue_items.is_empty());
    }

    #[test]
    fn test_twelve_months_are_not_scaled() {
        let months: Vec<MonthlyActual> = (1..=12).map(|m| sample_month(2025, m)).collect();
        let r = calculate_variance(&sample_projection(), &months, &VarianceAllocation::default());
        assert_eq!(r.months_analyzed, 12);
        assert_eq!(r.actual_noi, dec!(660000));
        assert_eq!(r.actual_revenue, dec!(1200000));
        assert_eq!(r.actual_expenses, dec!(540000));
        assert_eq!(r.projected_noi, dec!(693876.35));
        assert_eq!(r.noi_variance, dec!(-33876.35));
    }

    #[test]
    fn test_six_months_annualize_to_double() {
        let six: Vec<MonthlyActual> = (1..=6).map(|m| sample_month(2025, m)).collect();
        let twelve: Vec<MonthlyActual> = (1..=12).map(|m| sample_month(2025, m)).collect();
        let alloc = VarianceAllocation::default();
        let projection = sample_projection();
        let a = calculate_variance(&projection, &six, &alloc);
        let b = calculate_variance(&projection, &twelve, &alloc);
        assert_eq!(a.actual_noi, b.actual_noi);
        assert_eq!(a.actual_revenue, b.actual_revenue);
        assert_eq!(a.actual_cash_on_cash, b.actual_cash_on_cash);
    }

    #[test]
    fn test_line_items_and_severity() {
        let months: Vec<MonthlyActual> = (1..=12).map(|m| sample_month(2025, m)).collect();
        let r = calculate_variance(&sample_projection(), &months, &VarianceAllocation::default());

        let names: Vec<&str> = r.revenue_items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Gross Rental Income", "Vacancy Loss", "Other Income"]);
        assert_eq!(r.expense_items.len(), 6);
        assert_eq!(r.expense_items[3].name, "Repairs & Maintenance");

        // 1,200,000 actual GRI vs 1,440,000 GPR: -16.7%
        let gri = &r.revenue_items[0];
        assert_eq!(gri.variance, dec!(-240000));
        assert_eq!(gri.severity, VarianceSeverity::Critical);
        assert!(!gri.favorable);

        // Payroll, marketing and admin land in Other Expenses: 10,000 x 12
        let other = &r.expense_items[5];
        assert_eq!(other.name, "Other Expenses");
        assert_eq!(other.actual, dec!(120000));
        assert!(r.has_critical());
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(VarianceSeverity::classify(dec!(4.99)), VarianceSeverity::OnTrack);
        assert_eq!(VarianceSeverity::classify(dec!(-5)), VarianceSeverity::Warning);
        assert_eq!(VarianceSeverity::classify(dec!(14.9)), VarianceSeverity::Warning);
        assert_eq!(VarianceSeverity::classify(dec!(15)), VarianceSeverity::Critical);
        assert_eq!(VarianceSeverity::classify(dec!(-40)), VarianceSeverity::Critical);
    }

    #[test]
    fn test_cash_on_cash_uses_price_less_loan() {
        let months: Vec<MonthlyActual> = (1..=12).map(|m| sample_month(2025, m)).collect();
        let projection = sample_projection();
        let r = calculate_variance(&projection, &months, &VarianceAllocation::default());
        // 8,312.50 x 12 over 5,250,000 equity
        assert_eq!(r.actual_cash_on_cash, dec!(99750) / dec!(5250000) * dec!(100));
        assert_eq!(r.projected_cash_on_cash, projection.cash_on_cash_return);
    }

    #[test]
    fn test_zero_projection_never_divides() {
        let mut projection = sample_projection();
        projection.net_operating_income = Decimal::ZERO;
        projection.gross_potential_rent = Decimal::ZERO;
        projection.purchase_price = Decimal::ZERO;
        let r = calculate_variance(&projection, &[sample_month(2025, 1)], &VarianceAllocation::default());
        assert_eq!(r.noi_variance_percent, Decimal::ZERO);
        assert_eq!(r.revenue_items[0].variance_percent, Decimal::ZERO);
        assert_eq!(r.actual_cash_on_cash, Decimal::ZERO);
    }

    #[test]
    fn test_analyze_variance_warns_on_long_series() {
        let months: Vec<MonthlyActual> = (1..=12)
            .map(|m| sample_month(2024, m))
            .chain((1..=2).map(|m| sample_month(2025, m)))
            .collect();
        let out = analyze_variance(
            &VarianceRequest { projection: sample_projection(), actuals: months },
            &ProtocolDefaults::default(),
        )
        .unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("14 months")));
        assert!(out.warnings.iter().any(|w| w.contains("Gross Rental Income")));
    }
}
