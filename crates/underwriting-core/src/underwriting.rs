//! Full deal underwriting: revenue, debt, projection, sensitivity and,
//! when a product is selected, agency compliance and risk.

use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::compliance::{self, AgencyComplianceResult, ComplianceSelection, DealMetrics};
use crate::config::ProtocolDefaults;
use crate::financing::debt::{calculate_debt_and_returns, FinancingTerms};
use crate::income::expenses::DetailedExpenses;
use crate::income::revenue::{calculate_revenue, revenue_warnings, RevenueInput};
use crate::projection::{
    build_projection, equity_multiple, exit_value, loan_balance, net_sale_proceeds, sale_costs,
    solve_irr, CashFlowProjection,
};
use crate::risk::RiskRatingSummary;
use crate::sensitivity::{run_scenarios, SensitivityScenario};
use crate::types::{ratio_or_zero, with_metadata, ComputationOutput, Money, Percent, Ratio};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything one underwriting run reads. Immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationInputs {
    pub deal_id: String,
    pub rent_per_unit: Money,
    pub unit_count: u32,
    pub occupancy_percent: Percent,
    pub purchase_price: Money,
    pub ltv_percent: Percent,
    pub interest_rate_percent: Percent,
    #[serde(default)]
    pub is_interest_only: bool,
    pub amortization_years: u32,
    pub hold_period_years: u32,
    pub market_cap_rate_percent: Percent,
    /// One entry per projected year, percent
    #[serde(default)]
    pub growth_rates: Vec<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_other_income: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_operating_expenses: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_expenses: Option<DetailedExpenses>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceSelection>,
}

impl CalculationInputs {
    /// Occupancy fed to the revenue pipeline, after any product occupancy cap.
    pub fn underwritten_occupancy(&self) -> Percent {
        match self.occupancy_cap() {
            Some(cap) if self.occupancy_percent > cap => cap,
            _ => self.occupancy_percent,
        }
    }

    /// Manufactured-housing vacancy floor expressed as an occupancy ceiling.
    fn occupancy_cap(&self) -> Option<Percent> {
        self.compliance
            .as_ref()
            .filter(|s| s.is_manufactured_housing())
            .and_then(|s| s.profile().occupancy_cap())
    }

    pub fn revenue_input(&self) -> RevenueInput {
        RevenueInput {
            rent_per_unit: self.rent_per_unit,
            unit_count: self.unit_count,
            occupancy_percent: self.underwritten_occupancy(),
            actual_other_income: self.actual_other_income,
            actual_operating_expenses: self.actual_operating_expenses,
            detailed_expenses: self.detailed_expenses.clone(),
        }
    }

    pub fn financing_terms(&self) -> FinancingTerms {
        FinancingTerms {
            purchase_price: self.purchase_price,
            ltv_percent: self.ltv_percent,
            interest_rate_percent: self.interest_rate_percent,
            is_interest_only: self.is_interest_only,
            amortization_years: self.amortization_years,
            market_cap_rate_percent: self.market_cap_rate_percent,
        }
    }
}

/// Output of one underwriting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub deal_id: String,

    // Revenue
    pub gross_potential_rent: Money,
    pub vacancy_loss: Money,
    pub other_income: Money,
    pub effective_gross_income: Money,
    pub operating_expenses: Money,
    pub net_operating_income: Money,
    pub noi_margin: Percent,

    // Debt
    pub purchase_price: Money,
    pub loan_amount: Money,
    pub annual_debt_service: Money,
    pub debt_service_coverage_ratio: Ratio,
    pub ltv_percent: Percent,

    // Returns
    pub acquisition_costs: Money,
    pub equity_required: Money,
    pub entry_cap_rate: Percent,
    pub exit_cap_rate: Percent,
    pub annual_reserves: Money,
    pub cash_on_cash_return: Percent,
    pub price_per_unit: Money,
    pub exit_value: Money,
    pub sale_costs: Money,
    pub loan_balance_at_exit: Money,
    pub net_sale_proceeds: Money,
    pub equity_multiple: Ratio,
    pub internal_rate_of_return: Percent,
    pub irr_converged: bool,
    pub total_profit: Money,

    // Documents
    pub cash_flow_projection: CashFlowProjection,
    pub sensitivity: Vec<SensitivityScenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<AgencyComplianceResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskRatingSummary>,
}

impl CalculationResult {
    /// Deal figures for compliance testing.
    pub fn deal_metrics(&self, amortization_years: u32) -> DealMetrics {
        DealMetrics {
            actual_dscr: self.debt_service_coverage_ratio,
            actual_ltv_percent: self.ltv_percent,
            actual_amortization_years: amortization_years,
            noi: self.net_operating_income,
            annual_debt_service: self.annual_debt_service,
            loan_amount: self.loan_amount,
            purchase_price: self.purchase_price,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the whole underwriting pipeline. Pure: identical inputs and defaults
/// give an identical result.
pub fn assemble(inputs: &CalculationInputs, defaults: &ProtocolDefaults) -> CalculationResult {
    // Phase 1: revenue and NOI
    let revenue_input = inputs.revenue_input();
    let revenue = calculate_revenue(&revenue_input, defaults);
    let noi = revenue.net_operating_income;

    // Phase 2: debt and year-one returns
    let debt = calculate_debt_and_returns(&inputs.financing_terms(), noi, inputs.unit_count, defaults);
    debug!(
        "underwrite {}: noi={} loan={} ds={} dscr={}",
        inputs.deal_id, noi, debt.loan_amount, debt.annual_debt_service, debt.dscr
    );

    // Phase 3: projection and exit
    let projection = build_projection(
        noi,
        &inputs.growth_rates,
        debt.annual_debt_service,
        debt.annual_reserves,
    );
    let terminal_noi = projection.terminal_noi().unwrap_or(noi);
    let exit = exit_value(terminal_noi, debt.exit_cap_rate);
    let costs = sale_costs(exit, defaults.sale_cost_ratio);
    let balance = loan_balance(
        debt.loan_amount,
        inputs.interest_rate_percent,
        inputs.is_interest_only,
        inputs.amortization_years,
        inputs.hold_period_years,
    );
    let proceeds = net_sale_proceeds(exit, costs, balance);
    let multiple = equity_multiple(&projection.cash_flows, proceeds, debt.equity_required);
    let irr = solve_irr(
        debt.equity_required,
        &projection.cash_flows,
        proceeds,
        &defaults.irr,
    );
    let total_profit = proceeds + projection.total_cash_flow() - debt.equity_required;

    // Phase 4: sensitivity
    let sensitivity = run_scenarios(&revenue_input, debt.exit_cap_rate, terminal_noi, defaults);

    let mut result = CalculationResult {
        deal_id: inputs.deal_id.clone(),
        gross_potential_rent: revenue.gross_potential_rent,
        vacancy_loss: revenue.vacancy_loss,
        other_income: revenue.other_income,
        effective_gross_income: revenue.effective_gross_income,
        operating_expenses: revenue.operating_expenses,
        net_operating_income: noi,
        noi_margin: revenue.noi_margin,
        purchase_price: inputs.purchase_price,
        loan_amount: debt.loan_amount,
        annual_debt_service: debt.annual_debt_service,
        debt_service_coverage_ratio: debt.dscr,
        ltv_percent: inputs.ltv_percent,
        acquisition_costs: debt.acquisition_costs,
        equity_required: debt.equity_required,
        entry_cap_rate: debt.entry_cap_rate,
        exit_cap_rate: debt.exit_cap_rate,
        annual_reserves: debt.annual_reserves,
        cash_on_cash_return: debt.cash_on_cash,
        price_per_unit: ratio_or_zero(inputs.purchase_price, Decimal::from(inputs.unit_count)),
        exit_value: exit,
        sale_costs: costs,
        loan_balance_at_exit: balance,
        net_sale_proceeds: proceeds,
        equity_multiple: multiple,
        internal_rate_of_return: irr.irr,
        irr_converged: irr.converged,
        total_profit,
        cash_flow_projection: projection,
        sensitivity,
        compliance: None,
        risk: None,
    };

    // Phase 5: agency compliance
    if let Some(selection) = inputs.compliance.as_ref() {
        let metrics = result.deal_metrics(inputs.amortization_years);
        result.compliance = Some(compliance::evaluate(selection, &metrics));
        result.risk = Some(compliance::assess(selection, &metrics));
    }

    result
}

/// Non-fatal observations about a finished run.
pub fn underwriting_warnings(
    inputs: &CalculationInputs,
    result: &CalculationResult,
    defaults: &ProtocolDefaults,
) -> Vec<String> {
    let mut warnings = revenue_warnings(&inputs.revenue_input(), defaults);

    let occupancy = inputs.underwritten_occupancy();
    if occupancy < inputs.occupancy_percent {
        warnings.push(format!(
            "Manufactured housing vacancy floor: occupancy capped at {}% (reported {}%)",
            occupancy.normalize(),
            inputs.occupancy_percent
        ));
    }
    if inputs.growth_rates.is_empty() {
        warnings.push("No growth rates supplied; base NOI used as terminal NOI".into());
    } else if inputs.growth_rates.len() as u32 != inputs.hold_period_years {
        warnings.push(format!(
            "{} growth rates supplied for a {}-year hold",
            inputs.growth_rates.len(),
            inputs.hold_period_years
        ));
    }
    if inputs.unit_count == 0 {
        warnings.push("Unit count is zero; price per unit reported as 0".into());
    }
    if result.annual_debt_service > Decimal::ZERO && result.debt_service_coverage_ratio < Decimal::ONE {
        warnings.push(format!(
            "DSCR {}x is below 1.00x; NOI does not cover debt service",
            result.debt_service_coverage_ratio
        ));
    }
    if result.equity_required <= Decimal::ZERO {
        warnings.push("Equity required is not positive; returns reported as 0".into());
    }
    if !result.irr_converged && !result.equity_required.is_zero() && !result.cash_flow_projection.cash_flows.is_empty() {
        warn!("IRR did not converge for deal {}", inputs.deal_id);
        warnings.push(format!(
            "IRR solver did not converge; last estimate {}% reported",
            result.internal_rate_of_return
        ));
    }
    if result.exit_cap_rate <= Decimal::ZERO {
        warnings.push("Exit cap rate is zero; exit value is 0".into());
    }
    if inputs.ltv_percent > dec!(100) {
        warnings.push(format!("LTV {}% exceeds 100%", inputs.ltv_percent));
    }
    if let Some(compliance) = result.compliance.as_ref() {
        for failed in compliance.result().failed() {
            warnings.push(format!("Compliance failed: {}", failed.name));
        }
    }

    warnings
}

/// Full underwriting run wrapped in the standard output envelope.
pub fn underwrite(
    inputs: &CalculationInputs,
    defaults: &ProtocolDefaults,
) -> UnderwritingResult<ComputationOutput<CalculationResult>> {
    let start = Instant::now();
    defaults.validate()?;

    let result = assemble(inputs, defaults);
    let warnings = underwriting_warnings(inputs, &result, defaults);

    Ok(with_metadata(
        "Multifamily underwriting (NOI, debt, hold projection, IRR, sensitivity, agency compliance)",
        inputs,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compliance::fannie::FannieProduct;
    use crate::compliance::freddie::{FreddieComplianceInputs, FreddieProduct};

    pub(crate) fn sample_inputs() -> CalculationInputs {
        CalculationInputs {
            deal_id: "deal-001".into(),
            rent_per_unit: dec!(1200),
            unit_count: 100,
            occupancy_percent: dec!(93),
            purchase_price: dec!(15000000),
            ltv_percent: dec!(65),
            interest_rate_percent: dec!(5.5),
            is_interest_only: true,
            amortization_years: 30,
            hold_period_years: 5,
            market_cap_rate_percent: dec!(5.0),
            growth_rates: vec![dec!(3); 5],
            actual_other_income: None,
            actual_operating_expenses: None,
            detailed_expenses: None,
            compliance: None,
        }
    }

    #[test]
    fn test_reference_deal_scalars() {
        let r = assemble(&sample_inputs(), &ProtocolDefaults::default());
        assert_eq!(r.gross_potential_rent, dec!(1440000));
        assert_eq!(r.effective_gross_income, dec!(1519992));
        assert_eq!(r.net_operating_income, dec!(693876.35));
        assert_eq!(r.noi_margin, dec!(45.7));
        assert_eq!(r.loan_amount, dec!(9750000));
        assert_eq!(r.annual_debt_service, dec!(536250));
        assert_eq!(r.debt_service_coverage_ratio, dec!(1.29));
        assert_eq!(r.equity_required, dec!(5550000));
        assert_eq!(r.cash_on_cash_return, dec!(2.4));
        assert_eq!(r.price_per_unit, dec!(150000));
        assert_eq!(r.exit_cap_rate, dec!(5.5));
    }

    #[test]
    fn test_projection_and_exit_tie_together() {
        let r = assemble(&sample_inputs(), &ProtocolDefaults::default());
        assert_eq!(r.cash_flow_projection.projected_noi.len(), 5);
        let terminal = *r.cash_flow_projection.projected_noi.last().unwrap();
        assert_eq!(r.exit_value, exit_value(terminal, dec!(5.5)));
        // interest-only: balance never moves
        assert_eq!(r.loan_balance_at_exit, dec!(9750000));
        assert_eq!(r.net_sale_proceeds, r.exit_value - r.sale_costs - r.loan_balance_at_exit);
        assert_eq!(
            r.total_profit,
            r.net_sale_proceeds + r.cash_flow_projection.total_cash_flow() - r.equity_required
        );
        assert!(r.irr_converged);
        // Thin 4.6% entry against a 5.5% exit: distributions barely return equity
        assert_eq!(r.equity_multiple, dec!(1.00));
        assert!(
            r.internal_rate_of_return > dec!(-1) && r.internal_rate_of_return < dec!(1),
            "IRR should be near zero, got {}",
            r.internal_rate_of_return
        );
        assert_eq!(r.sensitivity.len(), 4);
        assert!(r.compliance.is_none());
        assert!(r.risk.is_none());
    }

    #[test]
    fn test_no_growth_rates_uses_base_noi() {
        let mut inputs = sample_inputs();
        inputs.growth_rates.clear();
        let defaults = ProtocolDefaults::default();
        let r = assemble(&inputs, &defaults);
        assert!(r.cash_flow_projection.cash_flows.is_empty());
        assert_eq!(r.exit_value, exit_value(dec!(693876.35), dec!(5.5)));
        assert_eq!(r.internal_rate_of_return, Decimal::ZERO);
        let w = underwriting_warnings(&inputs, &r, &defaults);
        assert!(w.iter().any(|w| w.contains("No growth rates")));
    }

    #[test]
    fn test_zero_units_is_zero_filled() {
        let mut inputs = sample_inputs();
        inputs.unit_count = 0;
        inputs.purchase_price = Decimal::ZERO;
        let r = assemble(&inputs, &ProtocolDefaults::default());
        assert_eq!(r.price_per_unit, Decimal::ZERO);
        assert_eq!(r.net_operating_income, Decimal::ZERO);
        assert_eq!(r.entry_cap_rate, Decimal::ZERO);
        assert_eq!(r.debt_service_coverage_ratio, Decimal::ZERO);
    }

    #[test]
    fn test_compliance_runs_for_selected_agency() {
        let mut inputs = sample_inputs();
        inputs.compliance = Some(ComplianceSelection::Fannie {
            product: FannieProduct::Conventional,
            inputs: None,
        });
        let r = assemble(&inputs, &ProtocolDefaults::default());
        let c = r.compliance.as_ref().unwrap();
        assert!(matches!(c, AgencyComplianceResult::Fannie { .. }));
        assert!(c.overall_pass());
        assert_eq!(r.risk.as_ref().unwrap().product, "Conventional");
    }

    #[test]
    fn test_manufactured_housing_caps_occupancy() {
        let mut inputs = sample_inputs();
        inputs.occupancy_percent = dec!(98);
        inputs.compliance = Some(ComplianceSelection::Freddie {
            product: FreddieProduct::ManufacturedHousing,
            inputs: Some(FreddieComplianceInputs::default()),
        });
        let defaults = ProtocolDefaults::default();
        let r = assemble(&inputs, &defaults);
        // 5% vacancy on 1,440,000 GPR
        assert_eq!(r.vacancy_loss, dec!(72000));
        let w = underwriting_warnings(&inputs, &r, &defaults);
        assert!(w.iter().any(|w| w.contains("vacancy floor")));
    }

    #[test]
    fn test_occupancy_cap_only_for_manufactured_housing() {
        let mut inputs = sample_inputs();
        inputs.occupancy_percent = dec!(98);
        inputs.compliance = Some(ComplianceSelection::Freddie {
            product: FreddieProduct::Conventional,
            inputs: None,
        });
        assert_eq!(inputs.underwritten_occupancy(), dec!(98));
    }

    #[test]
    fn test_underwrite_is_idempotent() {
        let defaults = ProtocolDefaults::default();
        let a = underwrite(&sample_inputs(), &defaults).unwrap();
        let b = underwrite(&sample_inputs(), &defaults).unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.warnings, b.warnings);
    }
}
