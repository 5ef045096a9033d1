use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use underwriting_core::compliance::fannie::{FannieComplianceInputs, FannieProduct};
use underwriting_core::compliance::freddie::{FreddieComplianceInputs, FreddieProduct};
use underwriting_core::compliance::{
    assess_risk, evaluate, evaluate_compliance, AgencyComplianceResult, ComplianceRequest,
    ComplianceSelection, DealMetrics, RiskAssessmentRequest,
};
use underwriting_core::risk::RiskSeverity;

// ===========================================================================
// Fixtures
// ===========================================================================

fn reference_metrics() -> DealMetrics {
    DealMetrics {
        actual_dscr: dec!(1.29),
        actual_ltv_percent: dec!(65),
        actual_amortization_years: 30,
        noi: dec!(693_876.35),
        annual_debt_service: dec!(536_250),
        loan_amount: dec!(9_750_000),
        purchase_price: dec!(15_000_000),
    }
}

fn fannie(product: FannieProduct, inputs: Option<FannieComplianceInputs>) -> ComplianceSelection {
    ComplianceSelection::Fannie { product, inputs }
}

fn freddie(product: FreddieProduct, inputs: Option<FreddieComplianceInputs>) -> ComplianceSelection {
    ComplianceSelection::Freddie { product, inputs }
}

// ===========================================================================
// Universal tests
// ===========================================================================

#[test]
fn test_every_product_runs_universal_tests() {
    let metrics = reference_metrics();
    for product in FannieProduct::ALL {
        let r = evaluate(&fannie(product, None), &metrics);
        assert_eq!(r.result().dscr_test.actual_value, dec!(1.29));
        assert!(r.result().product_tests.is_empty(), "{:?} ran product tests without inputs", product);
    }
    for product in FreddieProduct::ALL {
        let r = evaluate(&freddie(product, None), &metrics);
        assert_eq!(r.result().ltv_test.actual_value, dec!(65));
        assert!(r.result().product_tests.is_empty(), "{:?} ran product tests without inputs", product);
    }
}

#[test]
fn test_overall_pass_is_and_of_tests() {
    let metrics = reference_metrics();
    for product in FannieProduct::ALL {
        let r = evaluate(&fannie(product, Some(FannieComplianceInputs::default())), &metrics);
        let expected = r.result().all_tests().all(|t| t.pass);
        assert_eq!(r.overall_pass(), expected, "{:?}", product);
    }
    for product in FreddieProduct::ALL {
        let r = evaluate(&freddie(product, Some(FreddieComplianceInputs::default())), &metrics);
        let expected = r.result().all_tests().all(|t| t.pass);
        assert_eq!(r.overall_pass(), expected, "{:?}", product);
    }
}

#[test]
fn test_dscr_below_minimum_fails() {
    let mut metrics = reference_metrics();
    metrics.actual_dscr = dec!(1.10);
    let r = evaluate(&fannie(FannieProduct::Conventional, None), &metrics);
    assert!(!r.result().dscr_test.pass);
    assert!(!r.overall_pass());
}

#[test]
fn test_amortization_above_maximum_fails() {
    let mut metrics = reference_metrics();
    metrics.actual_amortization_years = 40;
    let r = evaluate(&freddie(FreddieProduct::Conventional, None), &metrics);
    assert!(!r.result().amortization_test.pass);
}

// ===========================================================================
// Product tests
// ===========================================================================

#[test]
fn test_supplemental_combined_limits_by_agency() {
    let metrics = reference_metrics();
    let fannie_inputs = FannieComplianceInputs {
        senior_loan_amount: Some(dec!(1_000_000)),
        senior_debt_service: Some(dec!(60_000)),
        ..Default::default()
    };
    let r = evaluate(&fannie(FannieProduct::Supplemental, Some(fannie_inputs)), &metrics);
    // (1,000,000 + 9,750,000) / 15,000,000 = 71.7% > 70%
    let combined_ltv = r
        .result()
        .product_tests
        .iter()
        .find(|t| t.name.contains("Combined LTV"))
        .unwrap();
    assert_eq!(combined_ltv.actual_value, dec!(71.7));
    assert!(!combined_ltv.pass);

    let freddie_inputs = FreddieComplianceInputs {
        senior_loan_amount: Some(dec!(1_000_000)),
        senior_debt_service: Some(dec!(60_000)),
        ..Default::default()
    };
    let r = evaluate(&freddie(FreddieProduct::Supplemental, Some(freddie_inputs)), &metrics);
    let combined_ltv = r
        .result()
        .product_tests
        .iter()
        .find(|t| t.name.contains("Combined LTV"))
        .unwrap();
    assert!(combined_ltv.pass, "71.7% is inside Freddie's 80% limit");
}

#[test]
fn test_floating_rate_cap_threshold() {
    let metrics = reference_metrics();
    let without_cap = FreddieComplianceInputs { has_rate_cap: false, ..Default::default() };
    let r = evaluate(&freddie(FreddieProduct::FloatingRate, Some(without_cap)), &metrics);
    assert!(!r.overall_pass(), "65% LTV above the 60% threshold needs a cap");

    let mut low = reference_metrics();
    low.actual_ltv_percent = dec!(55);
    let r = evaluate(
        &freddie(FreddieProduct::FloatingRate, Some(FreddieComplianceInputs::default())),
        &low,
    );
    assert!(r.overall_pass());
}

#[test]
fn test_zero_debt_service_fails_rehab_test() {
    let mut metrics = reference_metrics();
    metrics.annual_debt_service = Decimal::ZERO;
    metrics.actual_dscr = Decimal::ZERO;
    let inputs = FreddieComplianceInputs { is_rehab_period: true, ..Default::default() };
    let r = evaluate(&freddie(FreddieProduct::ValueAdd, Some(inputs)), &metrics);
    assert!(r.result().product_tests.iter().all(|t| !t.name.contains("Rehab") || !t.pass));
    assert!(!r.overall_pass());
}

// ===========================================================================
// Envelopes and serialization
// ===========================================================================

#[test]
fn test_evaluate_compliance_envelope() {
    let out = evaluate_compliance(&ComplianceRequest {
        selection: fannie(FannieProduct::Conventional, None),
        metrics: reference_metrics(),
    })
    .unwrap();
    assert!(matches!(out.result, AgencyComplianceResult::Fannie { .. }));
    assert!(out.result.overall_pass());
}

#[test]
fn test_assess_risk_flags_thin_coverage() {
    let mut metrics = reference_metrics();
    metrics.actual_dscr = dec!(1.05);
    let out = assess_risk(&RiskAssessmentRequest {
        selection: freddie(FreddieProduct::Conventional, None),
        metrics,
        market: None,
    })
    .unwrap();
    assert!(
        out.result.overall_severity >= RiskSeverity::High,
        "DSCR 1.05 should rate at least High, got {:?}",
        out.result.overall_severity
    );
}

#[test]
fn test_selection_round_trips_through_json() {
    let json = r#"{"agency":"fannie","product":"Cooperative","inputs":{"market_rental_noi":"900000"}}"#;
    let selection: ComplianceSelection = serde_json::from_str(json).unwrap();
    let r = evaluate(&selection, &reference_metrics());
    assert_eq!(r.result().product_tests.len(), 2);

    let value = serde_json::to_value(&r).unwrap();
    assert_eq!(value["agency"], "fannie");
}
