//! Agency compliance rule engines.
//!
//! Each agency is an enum of products. A product resolves to a
//! [`ProductProfile`] (its leverage limits and any product-specific
//! sub-thresholds) and selects which product-specific tests run on top of
//! the three universal ones. Missing product inputs omit a test rather than
//! failing it.

pub mod fannie;
pub mod freddie;

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::financing::debt::ltv_percent;
use crate::risk::{MarketRiskSignals, RiskRatingSummary, RiskSeverity};
use crate::types::{format_whole_dollars, with_metadata, ComputationOutput, Money, Percent, Ratio};
use crate::UnderwritingResult;

use fannie::{FannieComplianceInputs, FannieProduct};
use freddie::{FreddieComplianceInputs, FreddieProduct};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One pass/fail check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceTest {
    pub name: String,
    pub pass: bool,
    pub actual_value: Decimal,
    pub required_value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Deal figures every compliance test reads from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealMetrics {
    pub actual_dscr: Ratio,
    pub actual_ltv_percent: Percent,
    pub actual_amortization_years: u32,
    pub noi: Money,
    pub annual_debt_service: Money,
    pub loan_amount: Money,
    pub purchase_price: Money,
}

/// Interest-only and amortizing rehab-period minimum DSCRs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RehabDscr {
    pub interest_only: Ratio,
    pub amortizing: Ratio,
}

/// Combined senior + supplemental limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombinedLimits {
    pub max_ltv_percent: Percent,
    pub min_dscr: Ratio,
}

/// Lease-up closing thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeaseUpLimits {
    pub min_occupancy_percent: Percent,
    pub min_leased_percent: Percent,
}

/// Per-care-level minimum DSCRs for seniors bed-mix blending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CareLevelDscr {
    pub independent_living: Ratio,
    pub assisted_living: Ratio,
    /// Memory care (Fannie) or skilled nursing (Freddie)
    pub high_acuity: Ratio,
}

/// Underwriting profile for one agency product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductProfile {
    pub display_name: &'static str,
    pub max_ltv_percent: Percent,
    pub min_dscr: Ratio,
    pub max_amortization_years: u32,
    pub min_loan_amount: Option<Money>,
    pub max_loan_amount: Option<Money>,
    pub min_occupancy_percent: Option<Percent>,
    /// Vacancy that must be underwritten regardless of reported occupancy
    pub min_vacancy_percent: Option<Percent>,
    pub min_term_years: u32,
    pub max_term_years: u32,
    pub care_level_dscr: Option<CareLevelDscr>,
    pub max_snf_share_percent: Option<Percent>,
    /// Co-op actual-operations and market-rental minimums
    pub coop_dscr: Option<(Ratio, Ratio)>,
    /// Minimum DSCR at the maximum note rate
    pub stress_min_dscr: Option<Ratio>,
    /// Owner and tenant projected-savings credit, as fractions
    pub green_savings_credit: Option<(Ratio, Ratio)>,
    pub rehab_dscr: Option<RehabDscr>,
    pub combined_limits: Option<CombinedLimits>,
    /// Cap on tenant-occupied (Fannie) or rental (Freddie) homes in an MHC
    pub max_mhc_homes_percent: Option<Percent>,
    /// LTV above which a floating-rate loan needs a rate cap
    pub rate_cap_ltv_threshold: Option<Percent>,
    pub lease_up: Option<LeaseUpLimits>,
    pub notes: &'static str,
}

impl ProductProfile {
    /// Profile with only the leverage limits set.
    pub fn base(
        display_name: &'static str,
        max_ltv_percent: Percent,
        min_dscr: Ratio,
        max_amortization_years: u32,
    ) -> Self {
        Self {
            display_name,
            max_ltv_percent,
            min_dscr,
            max_amortization_years,
            min_loan_amount: None,
            max_loan_amount: None,
            min_occupancy_percent: None,
            min_vacancy_percent: None,
            min_term_years: 5,
            max_term_years: 30,
            care_level_dscr: None,
            max_snf_share_percent: None,
            coop_dscr: None,
            stress_min_dscr: None,
            green_savings_credit: None,
            rehab_dscr: None,
            combined_limits: None,
            max_mhc_homes_percent: None,
            rate_cap_ltv_threshold: None,
            lease_up: None,
            notes: "",
        }
    }

    /// Occupancy ceiling implied by a minimum underwritten vacancy.
    pub fn occupancy_cap(&self) -> Option<Percent> {
        self.min_vacancy_percent.map(|v| dec!(100) - v)
    }
}

/// Result of running one product's rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub product_display_name: String,
    pub product_min_dscr: Ratio,
    pub product_max_ltv_percent: Percent,
    pub product_max_amortization_years: u32,
    pub dscr_test: ComplianceTest,
    pub ltv_test: ComplianceTest,
    pub amortization_test: ComplianceTest,
    /// Product-specific tests in evaluation order
    pub product_tests: Vec<ComplianceTest>,
    /// AND of every test present
    pub overall_pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green_ncf_adjustment: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_ncf: Option<Money>,
}

impl ComplianceResult {
    /// Universal tests for `profile` with no product tests yet.
    pub(crate) fn universal(profile: &ProductProfile, metrics: &DealMetrics) -> Self {
        let dscr_test = dscr_minimum(metrics.actual_dscr, profile.min_dscr);
        let ltv_test = ltv_maximum(metrics.actual_ltv_percent, profile.max_ltv_percent);
        let amortization_test = amortization_maximum(
            metrics.actual_amortization_years,
            profile.max_amortization_years,
        );
        let overall_pass = dscr_test.pass && ltv_test.pass && amortization_test.pass;
        Self {
            product_display_name: profile.display_name.to_string(),
            product_min_dscr: profile.min_dscr,
            product_max_ltv_percent: profile.max_ltv_percent,
            product_max_amortization_years: profile.max_amortization_years,
            dscr_test,
            ltv_test,
            amortization_test,
            product_tests: Vec::new(),
            overall_pass,
            green_ncf_adjustment: None,
            adjusted_ncf: None,
        }
    }

    pub(crate) fn push(&mut self, test: ComplianceTest) {
        self.overall_pass &= test.pass;
        self.product_tests.push(test);
    }

    /// Every test in evaluation order, universal tests first.
    pub fn all_tests(&self) -> impl Iterator<Item = &ComplianceTest> {
        [&self.dscr_test, &self.ltv_test, &self.amortization_test]
            .into_iter()
            .chain(self.product_tests.iter())
    }

    pub fn find(&self, name: &str) -> Option<&ComplianceTest> {
        self.all_tests().find(|t| t.name == name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ComplianceTest> {
        self.all_tests().filter(|t| !t.pass)
    }
}

/// Which agency rule set to run, and its product-specific inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "agency", rename_all = "snake_case")]
pub enum ComplianceSelection {
    Fannie {
        product: FannieProduct,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inputs: Option<FannieComplianceInputs>,
    },
    Freddie {
        product: FreddieProduct,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inputs: Option<FreddieComplianceInputs>,
    },
}

impl ComplianceSelection {
    pub fn profile(&self) -> ProductProfile {
        match self {
            ComplianceSelection::Fannie { product, .. } => product.profile(),
            ComplianceSelection::Freddie { product, .. } => product.profile(),
        }
    }

    pub fn is_manufactured_housing(&self) -> bool {
        matches!(
            self,
            ComplianceSelection::Fannie {
                product: FannieProduct::ManufacturedHousing,
                ..
            } | ComplianceSelection::Freddie {
                product: FreddieProduct::ManufacturedHousing,
                ..
            }
        )
    }
}

/// Compliance document: exactly one agency's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "agency", rename_all = "snake_case")]
pub enum AgencyComplianceResult {
    Fannie {
        product: FannieProduct,
        result: ComplianceResult,
    },
    Freddie {
        product: FreddieProduct,
        result: ComplianceResult,
    },
}

impl AgencyComplianceResult {
    pub fn result(&self) -> &ComplianceResult {
        match self {
            AgencyComplianceResult::Fannie { result, .. } => result,
            AgencyComplianceResult::Freddie { result, .. } => result,
        }
    }

    pub fn overall_pass(&self) -> bool {
        self.result().overall_pass
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run the selected agency's rule set.
pub fn evaluate(selection: &ComplianceSelection, metrics: &DealMetrics) -> AgencyComplianceResult {
    match selection {
        ComplianceSelection::Fannie { product, inputs } => AgencyComplianceResult::Fannie {
            product: *product,
            result: fannie::evaluate(*product, metrics, inputs.as_ref()),
        },
        ComplianceSelection::Freddie { product, inputs } => AgencyComplianceResult::Freddie {
            product: *product,
            result: freddie::evaluate(*product, metrics, inputs.as_ref()),
        },
    }
}

/// Run the selected agency's product risk ratings.
pub fn assess(selection: &ComplianceSelection, metrics: &DealMetrics) -> RiskRatingSummary {
    match selection {
        ComplianceSelection::Fannie { product, inputs } => {
            fannie::assess(*product, metrics, inputs.as_ref())
        }
        ComplianceSelection::Freddie { product, inputs } => {
            freddie::assess(*product, metrics, inputs.as_ref())
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope entry points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRequest {
    pub selection: ComplianceSelection,
    pub metrics: DealMetrics,
}

/// Compliance evaluation wrapped in the standard output envelope.
pub fn evaluate_compliance(
    request: &ComplianceRequest,
) -> UnderwritingResult<ComputationOutput<AgencyComplianceResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let implied_ltv = ltv_percent(request.metrics.loan_amount, request.metrics.purchase_price);
    if (implied_ltv - request.metrics.actual_ltv_percent).abs() > dec!(0.5) {
        warnings.push(format!(
            "Reported LTV {}% differs from loan / price ({:.1}%)",
            request.metrics.actual_ltv_percent, implied_ltv
        ));
    }

    let result = evaluate(&request.selection, &request.metrics);
    for failed in result.result().failed() {
        warnings.push(format!("Failed: {}", failed.name));
    }
    debug!(
        "compliance: {} -> pass={}",
        result.result().product_display_name,
        result.overall_pass()
    );

    Ok(with_metadata(
        "Agency compliance tests (universal + product-specific)",
        request,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessmentRequest {
    pub selection: ComplianceSelection,
    pub metrics: DealMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketRiskSignals>,
}

/// Product and market risk ratings wrapped in the standard output envelope.
pub fn assess_risk(
    request: &RiskAssessmentRequest,
) -> UnderwritingResult<ComputationOutput<RiskRatingSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut summary = assess(&request.selection, &request.metrics);
    if let Some(market) = request.market.as_ref() {
        summary.ratings.extend(market.ratings());
        summary.overall_severity = crate::risk::overall_severity(&summary.ratings);
    }

    for rating in summary.at_least(RiskSeverity::High) {
        warnings.push(format!(
            "{} rated {}: {}",
            rating.category, rating.severity, rating.description
        ));
    }

    Ok(with_metadata(
        "Product-aware risk rating (worst severity governs)",
        request,
        warnings,
        start.elapsed().as_micros() as u64,
        summary,
    ))
}

// ---------------------------------------------------------------------------
// Shared tests
// ---------------------------------------------------------------------------

/// `numerator / denominator` at 2 dp, zero unless the denominator is positive.
pub(crate) fn coverage(numerator: Money, denominator: Money) -> Ratio {
    if denominator > Decimal::ZERO {
        (numerator / denominator).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

/// Share of `total` in percent at 1 dp, zero unless `total` is positive.
pub(crate) fn share_percent(part: Money, total: Money) -> Percent {
    if total > Decimal::ZERO {
        (part / total * dec!(100)).round_dp(1)
    } else {
        Decimal::ZERO
    }
}

pub fn dscr_minimum(actual: Ratio, minimum: Ratio) -> ComplianceTest {
    let pass = actual >= minimum;
    ComplianceTest {
        name: "DSCR Minimum".into(),
        pass,
        actual_value: actual,
        required_value: minimum,
        notes: (!pass).then(|| format!("DSCR {actual:.2}x below minimum {minimum:.2}x")),
    }
}

pub fn ltv_maximum(actual: Percent, maximum: Percent) -> ComplianceTest {
    let pass = actual <= maximum;
    ComplianceTest {
        name: "LTV Maximum".into(),
        pass,
        actual_value: actual,
        required_value: maximum,
        notes: (!pass).then(|| format!("LTV {actual}% exceeds maximum {maximum}%")),
    }
}

pub fn amortization_maximum(actual_years: u32, max_years: u32) -> ComplianceTest {
    let pass = actual_years <= max_years;
    ComplianceTest {
        name: "Amortization Maximum".into(),
        pass,
        actual_value: Decimal::from(actual_years),
        required_value: Decimal::from(max_years),
        notes: (!pass)
            .then(|| format!("Amortization {actual_years}yr exceeds maximum {max_years}yr")),
    }
}

/// Bed-weighted minimum DSCR at 2 dp. No beds falls back to the IL minimum.
pub fn blended_min_dscr(levels: &CareLevelDscr, beds: [u32; 3]) -> Ratio {
    let total: u32 = beds.iter().sum();
    if total == 0 {
        return levels.independent_living;
    }
    let total = Decimal::from(total);
    let weighted = Decimal::from(beds[0]) * levels.independent_living
        + Decimal::from(beds[1]) * levels.assisted_living
        + Decimal::from(beds[2]) * levels.high_acuity;
    (weighted / total).round_dp(2)
}

pub(crate) fn seniors_blended_dscr(
    actual: Ratio,
    levels: &CareLevelDscr,
    beds: [u32; 3],
    high_acuity_label: &str,
) -> ComplianceTest {
    let blended = blended_min_dscr(levels, beds);
    ComplianceTest {
        name: "Seniors Blended DSCR".into(),
        pass: actual >= blended,
        actual_value: actual,
        required_value: blended,
        notes: Some(format!(
            "Blended from {} IL + {} AL + {} {} beds",
            beds[0], beds[1], beds[2], high_acuity_label
        )),
    }
}

/// Skilled-nursing share of property income against a percentage cap.
pub(crate) fn snf_share_cap(basis: &str, snf_amount: Money, total: Money, cap: Percent) -> ComplianceTest {
    let share = share_percent(snf_amount, total);
    let pass = share <= cap;
    ComplianceTest {
        name: format!("SNF {basis} Cap (≤{}%)", cap.normalize()),
        pass,
        actual_value: share,
        required_value: cap,
        notes: (!pass).then(|| {
            format!("SNF {basis} is {share}% of total, above the {}% cap", cap.normalize())
        }),
    }
}

/// Rehab-period coverage. No debt service fails the test.
pub(crate) fn rehab_dscr(
    program: &str,
    rehab_noi: Money,
    annual_debt_service: Money,
    interest_only: bool,
    limits: &RehabDscr,
) -> ComplianceTest {
    let actual = coverage(rehab_noi, annual_debt_service);
    let minimum = if interest_only {
        limits.interest_only
    } else {
        limits.amortizing
    };
    let basis = if interest_only { "IO" } else { "Amortizing" };
    ComplianceTest {
        name: format!("{program} Rehab DSCR ({basis})"),
        pass: annual_debt_service > Decimal::ZERO && actual >= minimum,
        actual_value: actual,
        required_value: minimum,
        notes: Some(format!(
            "Rehab period: {} basis",
            if interest_only { "interest-only" } else { "amortizing" }
        )),
    }
}

/// Combined senior + supplemental DSCR and LTV tests, in that order.
pub(crate) fn supplemental_combined(
    metrics: &DealMetrics,
    senior_loan_amount: Money,
    senior_debt_service: Money,
    limits: &CombinedLimits,
) -> (ComplianceTest, ComplianceTest) {
    let combined_loan = senior_loan_amount + metrics.loan_amount;
    let combined_ltv = share_percent(combined_loan, metrics.purchase_price);
    let combined_debt_service = senior_debt_service + metrics.annual_debt_service;
    let combined_dscr = coverage(metrics.noi, combined_debt_service);

    let dscr_test = ComplianceTest {
        name: "Supplemental Combined DSCR".into(),
        pass: combined_dscr >= limits.min_dscr,
        actual_value: combined_dscr,
        required_value: limits.min_dscr,
        notes: Some(format!(
            "Senior DS ${} + Supp DS ${}",
            format_whole_dollars(senior_debt_service),
            format_whole_dollars(metrics.annual_debt_service)
        )),
    };
    let ltv_test = ComplianceTest {
        name: "Supplemental Combined LTV".into(),
        pass: combined_ltv <= limits.max_ltv_percent,
        actual_value: combined_ltv,
        required_value: limits.max_ltv_percent,
        notes: Some(format!(
            "Senior ${} + Supp ${} = ${}",
            format_whole_dollars(senior_loan_amount),
            format_whole_dollars(metrics.loan_amount),
            format_whole_dollars(combined_loan)
        )),
    };
    (dscr_test, ltv_test)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_metrics() -> DealMetrics {
        DealMetrics {
            actual_dscr: dec!(1.29),
            actual_ltv_percent: dec!(65),
            actual_amortization_years: 30,
            noi: dec!(693876.35),
            annual_debt_service: dec!(536250),
            loan_amount: dec!(9750000),
            purchase_price: dec!(15000000),
        }
    }

    #[test]
    fn test_universal_tests_notes_only_on_failure() {
        let pass = dscr_minimum(dec!(1.30), dec!(1.25));
        assert!(pass.pass);
        assert!(pass.notes.is_none());

        let fail = dscr_minimum(dec!(1.10), dec!(1.25));
        assert!(!fail.pass);
        assert_eq!(fail.notes.as_deref(), Some("DSCR 1.10x below minimum 1.25x"));

        assert!(ltv_maximum(dec!(80), dec!(80)).pass);
        assert!(!ltv_maximum(dec!(80.1), dec!(80)).pass);
        assert!(amortization_maximum(30, 30).pass);
        assert!(!amortization_maximum(35, 30).pass);
    }

    #[test]
    fn test_blended_min_dscr() {
        let levels = CareLevelDscr {
            independent_living: dec!(1.30),
            assisted_living: dec!(1.40),
            high_acuity: dec!(1.45),
        };
        // (50 x 1.30 + 30 x 1.40 + 20 x 1.45) / 100 = 1.36
        assert_eq!(blended_min_dscr(&levels, [50, 30, 20]), dec!(1.36));
        assert_eq!(blended_min_dscr(&levels, [0, 0, 0]), dec!(1.30));
        assert_eq!(blended_min_dscr(&levels, [0, 10, 0]), dec!(1.40));
    }

    #[test]
    fn test_rehab_dscr_zero_debt_service_fails() {
        let limits = RehabDscr {
            interest_only: dec!(1.00),
            amortizing: dec!(0.75),
        };
        let t = rehab_dscr("ROAR", dec!(500000), Decimal::ZERO, true, &limits);
        assert!(!t.pass);
        assert_eq!(t.actual_value, Decimal::ZERO);
        assert_eq!(t.name, "ROAR Rehab DSCR (IO)");
    }

    #[test]
    fn test_supplemental_combined_math() {
        let limits = CombinedLimits {
            max_ltv_percent: dec!(70),
            min_dscr: dec!(1.30),
        };
        let mut m = sample_metrics();
        m.loan_amount = dec!(1000000);
        m.annual_debt_service = dec!(70000);
        let (dscr, ltv) = supplemental_combined(&m, dec!(9000000), dec!(450000), &limits);
        // 693876.35 / 520000 = 1.334...
        assert_eq!(dscr.actual_value, dec!(1.33));
        assert!(dscr.pass);
        // 10M / 15M = 66.7%
        assert_eq!(ltv.actual_value, dec!(66.7));
        assert!(ltv.pass);
        assert_eq!(
            ltv.notes.as_deref(),
            Some("Senior $9,000,000 + Supp $1,000,000 = $10,000,000")
        );
    }

    #[test]
    fn test_selection_round_trips_through_json() {
        let json = r#"{"agency":"freddie","product":"SmallBalanceLoan","inputs":{"sbl_market_tier":"Top"}}"#;
        let selection: ComplianceSelection = serde_json::from_str(json).unwrap();
        assert!(matches!(
            selection,
            ComplianceSelection::Freddie {
                product: FreddieProduct::SmallBalanceLoan,
                inputs: Some(_)
            }
        ));
    }

    #[test]
    fn test_manufactured_housing_occupancy_cap() {
        let selection = ComplianceSelection::Fannie {
            product: FannieProduct::ManufacturedHousing,
            inputs: None,
        };
        assert!(selection.is_manufactured_housing());
        assert_eq!(selection.profile().occupancy_cap(), Some(dec!(95)));
    }

    #[test]
    fn test_assess_risk_adds_market_ratings() {
        let request = RiskAssessmentRequest {
            selection: ComplianceSelection::Fannie {
                product: FannieProduct::Conventional,
                inputs: None,
            },
            metrics: sample_metrics(),
            market: Some(MarketRiskSignals {
                subject_occupancy_percent: Some(dec!(70)),
                market_occupancy_percent: Some(dec!(95)),
                ..Default::default()
            }),
        };
        let out = assess_risk(&request).unwrap();
        assert_eq!(out.result.ratings.len(), 2);
        assert_eq!(out.result.overall_severity, RiskSeverity::Critical);
        assert!(out.warnings.iter().any(|w| w.contains("Occupancy Gap")));
    }
}
