use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use underwriting_core::financing::debt::{annual_debt_service, mortgage_constant};
use underwriting_core::financing::sizing::{constrained_loan, size_loan, ConstrainingTest, LoanSizingInput};
use underwriting_core::income::expenses::DetailedExpenses;
use underwriting_core::income::revenue::{calculate_revenue, ExpenseBasis, RevenueInput};
use underwriting_core::projection::{equity_multiple, exit_value, solve_irr};
use underwriting_core::sensitivity::run_scenarios;
use underwriting_core::underwriting::{assemble, underwrite, CalculationInputs};
use underwriting_core::ProtocolDefaults;

// ===========================================================================
// Fixtures
// ===========================================================================

fn sample_revenue() -> RevenueInput {
    RevenueInput {
        rent_per_unit: dec!(1200),
        unit_count: 100,
        occupancy_percent: dec!(93),
        actual_other_income: None,
        actual_operating_expenses: None,
        detailed_expenses: None,
    }
}

fn sample_deal() -> CalculationInputs {
    CalculationInputs {
        deal_id: "maple-court".into(),
        rent_per_unit: dec!(1200),
        unit_count: 100,
        occupancy_percent: dec!(93),
        purchase_price: dec!(15_000_000),
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

// ===========================================================================
// Reference scenarios
// ===========================================================================

#[test]
fn test_reference_revenue_pipeline() {
    let r = calculate_revenue(&sample_revenue(), &ProtocolDefaults::default());

    assert_eq!(r.gross_potential_rent, dec!(1_440_000));
    assert_eq!(r.vacancy_loss, dec!(100_800));
    assert_eq!(r.net_rent, dec!(1_339_200));
    assert_eq!(r.other_income, dec!(180_792));
    assert_eq!(r.effective_gross_income, dec!(1_519_992));
    assert_eq!(r.operating_expenses, dec!(826_115.65));
    assert_eq!(r.net_operating_income, dec!(693_876.35));
    assert_eq!(r.noi_margin, dec!(45.7));
    assert_eq!(r.expense_basis, ExpenseBasis::Ratio);
}

#[test]
fn test_reference_debt_and_returns() {
    let r = assemble(&sample_deal(), &ProtocolDefaults::default());

    assert_eq!(r.loan_amount, dec!(9_750_000));
    assert_eq!(r.annual_debt_service, dec!(536_250));
    assert_eq!(r.acquisition_costs, dec!(300_000));
    assert_eq!(r.equity_required, dec!(5_550_000));
    assert_eq!(r.entry_cap_rate, dec!(4.6));
    assert_eq!(r.annual_reserves, dec!(25_000));
    assert_eq!(r.cash_on_cash_return, dec!(2.4));
    assert_eq!(r.debt_service_coverage_ratio, dec!(1.29));
}

#[test]
fn test_mortgage_constant_bounds() {
    let amortizing = mortgage_constant(dec!(5), 30, false);
    assert!(
        amortizing > dec!(0.0640) && amortizing < dec!(0.0650),
        "5% / 30y constant should be ~6.44%, got {}",
        amortizing
    );

    let zero_rate = mortgage_constant(Decimal::ZERO, 30, false);
    assert!(
        zero_rate > dec!(0.0330) && zero_rate < dec!(0.0340),
        "0% / 30y constant should be ~1/30, got {}",
        zero_rate
    );
}

#[test]
fn test_pupa_floor_lifts_repairs() {
    let mut input = sample_revenue();
    input.detailed_expenses = Some(DetailedExpenses {
        repairs_and_maintenance: Some(dec!(40_000)),
        ..Default::default()
    });
    let r = calculate_revenue(&input, &ProtocolDefaults::default());

    // $400/unit entered, $600/unit floor
    assert_eq!(r.operating_expenses, dec!(60_000));
    assert_eq!(r.expense_basis, ExpenseBasis::Detailed);
}

// ===========================================================================
// Properties
// ===========================================================================

#[test]
fn test_higher_min_dscr_never_raises_dscr_loan() {
    let constant = mortgage_constant(dec!(6), 30, false);
    let mut previous = Decimal::MAX;
    for step in 0..20 {
        let min_dscr = dec!(1.00) + Decimal::from(step) * dec!(0.05);
        let sized = constrained_loan(dec!(15_000_000), dec!(80), dec!(693_876.35), min_dscr, constant);
        assert!(
            sized.dscr_based_loan <= previous,
            "DSCR loan rose at min DSCR {}: {} > {}",
            min_dscr,
            sized.dscr_based_loan,
            previous
        );
        previous = sized.dscr_based_loan;
    }
}

#[test]
fn test_longer_amortization_never_raises_debt_service() {
    for rate in [Decimal::ZERO, dec!(3), dec!(5.5), dec!(9)] {
        let mut previous = Decimal::MAX;
        for years in [5u32, 10, 15, 20, 25, 30, 35, 40] {
            let ds = annual_debt_service(dec!(9_750_000), rate, false, years);
            assert!(
                ds <= previous,
                "debt service rose at {}% / {}y: {} > {}",
                rate,
                years,
                ds,
                previous
            );
            previous = ds;
        }
    }
}

#[test]
fn test_constrained_loan_reports_smaller_test() {
    let constant = mortgage_constant(dec!(5.5), 30, true);
    for (price, noi) in [
        (dec!(15_000_000), dec!(693_876.35)),
        (dec!(15_000_000), dec!(1_500_000)),
        (dec!(4_000_000), dec!(250_000)),
    ] {
        let r = constrained_loan(price, dec!(75), noi, dec!(1.25), constant);
        assert_eq!(r.max_loan, r.ltv_based_loan.min(r.dscr_based_loan));
        let expected = if r.dscr_based_loan < r.ltv_based_loan {
            ConstrainingTest::Dscr
        } else {
            ConstrainingTest::Ltv
        };
        assert_eq!(r.constraining_test, expected);
    }
}

#[test]
fn test_size_loan_envelope() {
    let out = size_loan(&LoanSizingInput {
        purchase_price: dec!(15_000_000),
        max_ltv_percent: dec!(80),
        noi: dec!(693_876.35),
        min_dscr: dec!(1.25),
        interest_rate_percent: dec!(5.5),
        amortization_years: 30,
        is_interest_only: true,
    })
    .unwrap();
    // DSCR loan: 693,876.35 / (1.25 x 0.055) = 10,092,746.91 < 12,000,000
    assert_eq!(out.result.sizing.constraining_test, ConstrainingTest::Dscr);
    assert_eq!(out.result.sizing.max_loan, dec!(10_092_746.91));
    assert_eq!(out.result.mortgage_constant, dec!(0.055));
}

#[test]
fn test_extreme_schedules_stay_defined() {
    let out = size_loan(&LoanSizingInput {
        purchase_price: dec!(15_000_000),
        max_ltv_percent: dec!(80),
        noi: dec!(693_876.35),
        min_dscr: dec!(1.25),
        interest_rate_percent: dec!(100),
        amortization_years: 80,
        is_interest_only: false,
    })
    .unwrap();
    assert_eq!(out.result.mortgage_constant, dec!(1));

    let mut deal = sample_deal();
    deal.is_interest_only = false;
    deal.amortization_years = u32::MAX;
    let r = assemble(&deal, &ProtocolDefaults::default());
    assert_eq!(r.annual_debt_service, dec!(536_250));
    assert!(
        r.loan_balance_at_exit > dec!(9_740_000) && r.loan_balance_at_exit <= r.loan_amount,
        "an unbounded schedule should behave like interest-only, balance {}",
        r.loan_balance_at_exit
    );
}

#[test]
fn test_zero_denominators_yield_zero() {
    let defaults = ProtocolDefaults::default();

    let empty = calculate_revenue(
        &RevenueInput {
            rent_per_unit: Decimal::ZERO,
            unit_count: 0,
            occupancy_percent: Decimal::ZERO,
            actual_other_income: None,
            actual_operating_expenses: None,
            detailed_expenses: None,
        },
        &defaults,
    );
    assert_eq!(empty.noi_margin, Decimal::ZERO);

    let mut deal = sample_deal();
    deal.purchase_price = Decimal::ZERO;
    deal.interest_rate_percent = Decimal::ZERO;
    let r = assemble(&deal, &defaults);
    assert_eq!(r.entry_cap_rate, Decimal::ZERO);
    assert_eq!(r.debt_service_coverage_ratio, Decimal::ZERO);
    assert_eq!(r.loan_amount, Decimal::ZERO);

    assert_eq!(exit_value(dec!(700_000), Decimal::ZERO), Decimal::ZERO);
    assert_eq!(equity_multiple(&[dec!(100)], dec!(1_000), Decimal::ZERO), Decimal::ZERO);
    let irr = solve_irr(Decimal::ZERO, &[dec!(100)], dec!(1_000), &defaults.irr);
    assert_eq!(irr.irr, Decimal::ZERO);
}

#[test]
fn test_stress_scenarios_never_beat_base() {
    let defaults = ProtocolDefaults::default();
    let scenarios = run_scenarios(&sample_revenue(), dec!(5.5), dec!(780_000), &defaults);
    assert_eq!(scenarios.len(), 4);
    for s in &scenarios[1..] {
        assert!(
            s.exit_value <= scenarios[0].exit_value,
            "{} exit value {} exceeds base {}",
            s.name,
            s.exit_value,
            scenarios[0].exit_value
        );
    }
}

#[test]
fn test_pipeline_is_bit_identical_across_runs() {
    let defaults = ProtocolDefaults::default();
    assert_eq!(assemble(&sample_deal(), &defaults), assemble(&sample_deal(), &defaults));

    let a = underwrite(&sample_deal(), &defaults).unwrap();
    let b = underwrite(&sample_deal(), &defaults).unwrap();
    assert_eq!(a.result, b.result);
    assert_eq!(a.assumptions, b.assumptions);
}

#[test]
fn test_amortizing_deal_pays_down_principal() {
    let mut deal = sample_deal();
    deal.is_interest_only = false;
    let r = assemble(&deal, &ProtocolDefaults::default());
    assert!(
        r.loan_balance_at_exit < r.loan_amount && r.loan_balance_at_exit > dec!(8_000_000),
        "five years of a 30y schedule should retire a modest slice, balance {}",
        r.loan_balance_at_exit
    );
    assert!(r.annual_debt_service > dec!(536_250));
}
