use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{
    rehab_dscr, seniors_blended_dscr, share_percent, snf_share_cap, supplemental_combined,
    CareLevelDscr, CombinedLimits, ComplianceResult, ComplianceTest, DealMetrics, LeaseUpLimits,
    ProductProfile, RehabDscr,
};
use crate::risk::{
    rate_dscr_for_product, rate_mhc_rental_homes, rate_skilled_nursing_share,
    rate_student_enrollment, RiskRating, RiskRatingSummary, RiskSeverity,
};
use crate::types::{format_whole_dollars, Money, Percent, Ratio};

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreddieProduct {
    Conventional,
    SmallBalanceLoan,
    TargetedAffordable,
    SeniorsIL,
    SeniorsAL,
    SeniorsSN,
    StudentHousing,
    ManufacturedHousing,
    FloatingRate,
    ValueAdd,
    ModerateRehab,
    LeaseUp,
    Supplemental,
    TaxExemptLihtc,
    Section8,
    NoahPreservation,
}

const SENIORS_DSCR: CareLevelDscr = CareLevelDscr {
    independent_living: dec!(1.30),
    assisted_living: dec!(1.45),
    high_acuity: dec!(1.50),
};

/// Rehab-period DSCR the value-add risk rating is measured against.
const VALUE_ADD_REHAB_IO_DSCR: Ratio = dec!(1.10);

impl FreddieProduct {
    pub const ALL: [FreddieProduct; 16] = [
        FreddieProduct::Conventional,
        FreddieProduct::SmallBalanceLoan,
        FreddieProduct::TargetedAffordable,
        FreddieProduct::SeniorsIL,
        FreddieProduct::SeniorsAL,
        FreddieProduct::SeniorsSN,
        FreddieProduct::StudentHousing,
        FreddieProduct::ManufacturedHousing,
        FreddieProduct::FloatingRate,
        FreddieProduct::ValueAdd,
        FreddieProduct::ModerateRehab,
        FreddieProduct::LeaseUp,
        FreddieProduct::Supplemental,
        FreddieProduct::TaxExemptLihtc,
        FreddieProduct::Section8,
        FreddieProduct::NoahPreservation,
    ];

    pub fn profile(&self) -> ProductProfile {
        use FreddieProduct::*;
        let seniors = |display, dscr, notes| ProductProfile {
            care_level_dscr: Some(SENIORS_DSCR),
            max_snf_share_percent: Some(dec!(20)),
            notes,
            ..ProductProfile::base(display, dec!(75), dscr, 30)
        };
        match self {
            Conventional => ProductProfile {
                min_loan_amount: Some(dec!(5000000)),
                notes: "Standard fixed-rate; stabilized properties; $5M+ typical",
                ..ProductProfile::base("Conventional Loans", dec!(80), dec!(1.25), 30)
            },
            SmallBalanceLoan => ProductProfile {
                min_loan_amount: Some(dec!(1000000)),
                max_loan_amount: Some(dec!(7500000)),
                notes: "$1M to $7.5M; tiered by market size (Top/Standard/Small)",
                ..ProductProfile::base("Small Balance Loan (SBL)", dec!(80), dec!(1.20), 30)
            },
            TargetedAffordable => ProductProfile {
                notes: "Income/rent restricted properties; HAP contracts; LIHTC",
                ..ProductProfile::base("Targeted Affordable Housing", dec!(80), dec!(1.20), 30)
            },
            SeniorsIL => seniors(
                "Seniors Housing — Independent Living",
                dec!(1.30),
                "Purpose-built; experienced sponsor and operator required",
            ),
            SeniorsAL => seniors(
                "Seniors Housing — Assisted Living",
                dec!(1.45),
                "AL component DSCR 1.45x; regulatory compliance required",
            ),
            SeniorsSN => seniors(
                "Seniors Housing — Skilled Nursing",
                dec!(1.50),
                "SN component DSCR 1.50x; 20% SNF NOI cap for blended properties",
            ),
            StudentHousing => ProductProfile {
                notes: "40%+ student occupancy; dedicated properties need 10K+ enrollment",
                ..ProductProfile::base("Student Housing", dec!(80), dec!(1.30), 30)
            },
            ManufacturedHousing => ProductProfile {
                min_vacancy_percent: Some(dec!(5)),
                max_mhc_homes_percent: Some(dec!(25)),
                notes: "5+ pads; max 25% rental homes; pad-rent focused",
                ..ProductProfile::base("Manufactured Housing Communities", dec!(80), dec!(1.25), 30)
            },
            FloatingRate => ProductProfile {
                rate_cap_ltv_threshold: Some(dec!(60)),
                notes: "Rate cap required at LTV > 60%; SOFR-based",
                ..ProductProfile::base("Floating Rate Loans", dec!(80), dec!(1.25), 30)
            },
            ValueAdd => ProductProfile {
                rehab_dscr: Some(RehabDscr {
                    interest_only: dec!(1.10),
                    amortizing: dec!(1.15),
                }),
                notes: "$10K to $25K/unit rehab; interest-only during rehab at 1.10x",
                ..ProductProfile::base("Value-Add Loans", dec!(85), dec!(1.15), 30)
            },
            ModerateRehab => ProductProfile {
                notes: "$25K to $60K/unit rehab; stabilized DSCR at 1.20x",
                ..ProductProfile::base("Moderate Rehabilitation Loans", dec!(80), dec!(1.20), 30)
            },
            LeaseUp => ProductProfile {
                lease_up: Some(LeaseUpLimits {
                    min_occupancy_percent: dec!(65),
                    min_leased_percent: dec!(75),
                }),
                notes: "65% physical occupancy and 75% leased at closing",
                ..ProductProfile::base("Lease-Up Loans", dec!(75), dec!(1.30), 30)
            },
            Supplemental => ProductProfile {
                min_loan_amount: Some(dec!(1000000)),
                combined_limits: Some(CombinedLimits {
                    max_ltv_percent: dec!(80),
                    min_dscr: dec!(1.25),
                }),
                notes: "$1M minimum; combined DSCR 1.25x and combined LTV 80% tested",
                ..ProductProfile::base("Supplemental Mortgage Loans", dec!(80), dec!(1.25), 30)
            },
            TaxExemptLihtc => ProductProfile {
                notes: "90% LTV / 1.15x DSCR for tax-exempt bond credit enhanced loans",
                ..ProductProfile::base("Tax-Exempt Bond / LIHTC", dec!(90), dec!(1.15), 30)
            },
            Section8 => ProductProfile {
                notes: "80% LTV / 1.20x DSCR standard; 90% / 1.15x with LIHTC overlay",
                ..ProductProfile::base("Section 8 — Project-Based", dec!(80), dec!(1.20), 30)
            },
            NoahPreservation => ProductProfile {
                max_term_years: 15,
                notes: "15yr max term; nonprofit borrower only",
                ..ProductProfile::base("NOAH Preservation", dec!(80), dec!(1.20), 30)
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreddieComplianceInputs {
    /// "Top", "Standard" or "Small"; case-insensitive
    pub sbl_market_tier: Option<String>,
    pub il_beds: u32,
    pub al_beds: u32,
    pub sn_beds: u32,
    pub snf_noi: Option<Money>,
    /// SNF share of NOI, percent; derived from `snf_noi` when absent
    pub snf_noi_percent: Option<Percent>,
    pub rental_homes_percent: Option<Percent>,
    pub has_rate_cap: bool,
    pub is_rehab_period: bool,
    pub rehab_interest_only: Option<bool>,
    pub rehab_noi: Option<Money>,
    pub physical_occupancy_percent: Option<Percent>,
    pub leased_percent: Option<Percent>,
    pub senior_loan_amount: Option<Money>,
    pub senior_debt_service: Option<Money>,
    pub nearby_enrollment: Option<u32>,
}

// ---------------------------------------------------------------------------
// Product tests
// ---------------------------------------------------------------------------

/// `(max LTV, min DSCR)` for an SBL market tier. Unknown tiers take the
/// standard limits.
pub fn sbl_tier_limits(tier: &str) -> (Percent, Ratio) {
    match tier.trim().to_ascii_lowercase().as_str() {
        "top" => (dec!(78), dec!(1.20)),
        "small" => (dec!(75), dec!(1.25)),
        _ => (dec!(80), dec!(1.25)),
    }
}

pub fn sbl_market_tier(actual_dscr: Ratio, actual_ltv_percent: Percent, tier: &str) -> ComplianceTest {
    let (max_ltv, min_dscr) = sbl_tier_limits(tier);
    ComplianceTest {
        name: format!("SBL Market Tier ({tier})"),
        pass: actual_ltv_percent <= max_ltv && actual_dscr >= min_dscr,
        actual_value: actual_dscr,
        required_value: min_dscr,
        notes: Some(format!(
            "Tier {tier}: max LTV {max_ltv}% (actual {actual_ltv_percent}%), min DSCR {min_dscr}x"
        )),
    }
}

pub fn mhc_rental_homes_cap(rental_homes_percent: Percent, cap: Percent) -> ComplianceTest {
    let pass = rental_homes_percent <= cap;
    ComplianceTest {
        name: format!("MHC Rental Homes Cap (≤{}%)", cap.normalize()),
        pass,
        actual_value: rental_homes_percent,
        required_value: cap,
        notes: (!pass).then(|| {
            format!("Rental homes {rental_homes_percent}% exceeds {}% cap", cap.normalize())
        }),
    }
}

/// Passes unless LTV exceeds `threshold` with no rate cap in place.
pub fn floating_rate_cap(actual_ltv_percent: Percent, has_rate_cap: bool, threshold: Percent) -> ComplianceTest {
    let required = actual_ltv_percent > threshold;
    let threshold = threshold.normalize();
    let notes = match (required, has_rate_cap) {
        (true, true) => format!("Rate cap in place (required at LTV > {threshold}%)"),
        (true, false) => format!("Rate cap REQUIRED at LTV > {threshold}%; not in place"),
        (false, _) => format!("Rate cap not required (LTV ≤ {threshold}%)"),
    };
    ComplianceTest {
        name: "Floating Rate Cap".into(),
        pass: !required || has_rate_cap,
        actual_value: if has_rate_cap { Decimal::ONE } else { Decimal::ZERO },
        required_value: if required { Decimal::ONE } else { Decimal::ZERO },
        notes: Some(notes),
    }
}

pub fn lease_up_occupancy(physical_occupancy_percent: Percent, minimum: Percent) -> ComplianceTest {
    let pass = physical_occupancy_percent >= minimum;
    ComplianceTest {
        name: "Lease-Up Physical Occupancy".into(),
        pass,
        actual_value: physical_occupancy_percent,
        required_value: minimum,
        notes: (!pass).then(|| {
            format!(
                "Physical occupancy {physical_occupancy_percent}% below {}% minimum",
                minimum.normalize()
            )
        }),
    }
}

pub fn lease_up_leased(leased_percent: Percent, minimum: Percent) -> ComplianceTest {
    let pass = leased_percent >= minimum;
    ComplianceTest {
        name: "Lease-Up Leased Percentage".into(),
        pass,
        actual_value: leased_percent,
        required_value: minimum,
        notes: (!pass)
            .then(|| format!("Leased {leased_percent}% below {}% minimum", minimum.normalize())),
    }
}

// ---------------------------------------------------------------------------
// Evaluate / assess
// ---------------------------------------------------------------------------

pub fn evaluate(
    product: FreddieProduct,
    metrics: &DealMetrics,
    inputs: Option<&FreddieComplianceInputs>,
) -> ComplianceResult {
    let profile = product.profile();
    let mut result = ComplianceResult::universal(&profile, metrics);

    let Some(inputs) = inputs else {
        return result;
    };

    if product == FreddieProduct::SmallBalanceLoan {
        if let Some(tier) = inputs.sbl_market_tier.as_deref().filter(|t| !t.trim().is_empty()) {
            result.push(sbl_market_tier(
                metrics.actual_dscr,
                metrics.actual_ltv_percent,
                tier,
            ));
        }
    }

    if let Some(levels) = profile.care_level_dscr.as_ref() {
        result.push(seniors_blended_dscr(
            metrics.actual_dscr,
            levels,
            [inputs.il_beds, inputs.al_beds, inputs.sn_beds],
            "SN",
        ));
    }

    if let (Some(cap), Some(snf_noi)) = (profile.max_snf_share_percent, inputs.snf_noi) {
        if metrics.noi > Decimal::ZERO {
            result.push(snf_share_cap("NOI", snf_noi, metrics.noi, cap));
        }
    }

    if let (Some(cap), Some(pct)) = (profile.max_mhc_homes_percent, inputs.rental_homes_percent) {
        result.push(mhc_rental_homes_cap(pct, cap));
    }

    if let Some(threshold) = profile.rate_cap_ltv_threshold {
        result.push(floating_rate_cap(
            metrics.actual_ltv_percent,
            inputs.has_rate_cap,
            threshold,
        ));
    }

    if let Some(limits) = profile.rehab_dscr.as_ref() {
        if inputs.is_rehab_period && metrics.annual_debt_service > Decimal::ZERO {
            result.push(rehab_dscr(
                "Value-Add",
                inputs.rehab_noi.unwrap_or(metrics.noi),
                metrics.annual_debt_service,
                inputs.rehab_interest_only.unwrap_or(true),
                limits,
            ));
        }
    }

    if let Some(limits) = profile.lease_up {
        if let Some(pct) = inputs.physical_occupancy_percent {
            result.push(lease_up_occupancy(pct, limits.min_occupancy_percent));
        }
        if let Some(pct) = inputs.leased_percent {
            result.push(lease_up_leased(pct, limits.min_leased_percent));
        }
    }

    if let (Some(limits), Some(senior_loan), Some(senior_ds)) = (
        profile.combined_limits.as_ref(),
        inputs.senior_loan_amount,
        inputs.senior_debt_service,
    ) {
        let (dscr, ltv) = supplemental_combined(metrics, senior_loan, senior_ds, limits);
        result.push(dscr);
        result.push(ltv);
    }

    result
}

pub fn assess(
    product: FreddieProduct,
    metrics: &DealMetrics,
    inputs: Option<&FreddieComplianceInputs>,
) -> RiskRatingSummary {
    let profile = product.profile();
    let mut ratings = vec![RiskRating::new(
        "DSCR",
        rate_dscr_for_product(metrics.actual_dscr, profile.min_dscr),
        format!(
            "DSCR {:.2}x vs. {:.2}x minimum for {}",
            metrics.actual_dscr, profile.min_dscr, profile.display_name
        ),
    )];

    if let Some(inputs) = inputs {
        match product {
            FreddieProduct::SeniorsIL | FreddieProduct::SeniorsAL | FreddieProduct::SeniorsSN => {
                let share = inputs.snf_noi_percent.or_else(|| {
                    inputs
                        .snf_noi
                        .filter(|_| metrics.noi > Decimal::ZERO)
                        .map(|snf| share_percent(snf, metrics.noi))
                });
                if let Some(share) = share {
                    ratings.push(RiskRating::new(
                        "SNF NOI Concentration",
                        rate_skilled_nursing_share(share),
                        format!("Skilled Nursing NOI is {share:.1}% of total property NOI"),
                    ));
                }
            }
            FreddieProduct::StudentHousing => {
                if let Some(enrollment) = inputs.nearby_enrollment {
                    ratings.push(RiskRating::new(
                        "University Enrollment",
                        rate_student_enrollment(enrollment),
                        format!(
                            "Nearby university enrollment: {} students",
                            format_whole_dollars(Decimal::from(enrollment))
                        ),
                    ));
                }
            }
            FreddieProduct::ManufacturedHousing => {
                if let Some(pct) = inputs.rental_homes_percent {
                    ratings.push(RiskRating::new(
                        "MHC Rental Homes",
                        rate_mhc_rental_homes(pct),
                        format!("Rental homes: {pct:.1}% (max 25%)"),
                    ));
                }
            }
            FreddieProduct::FloatingRate => {
                let threshold = profile.rate_cap_ltv_threshold.unwrap_or(dec!(60));
                if !inputs.has_rate_cap && metrics.actual_ltv_percent > threshold {
                    ratings.push(RiskRating::new(
                        "Floating Rate Cap",
                        RiskSeverity::High,
                        format!(
                            "Rate cap required at LTV > {}% (actual LTV: {:.1}%); not in place",
                            threshold.normalize(),
                            metrics.actual_ltv_percent
                        ),
                    ));
                }
            }
            FreddieProduct::ValueAdd => {
                if inputs.is_rehab_period {
                    ratings.push(RiskRating::new(
                        "Value-Add Rehab DSCR",
                        rate_dscr_for_product(metrics.actual_dscr, VALUE_ADD_REHAB_IO_DSCR),
                        format!(
                            "Rehab-period DSCR {:.2}x vs. {:.2}x IO minimum",
                            metrics.actual_dscr, VALUE_ADD_REHAB_IO_DSCR
                        ),
                    ));
                }
            }
            _ => {}
        }
    }

    RiskRatingSummary::new(&format!("{product:?}"), profile.display_name, ratings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::tests::sample_metrics;

    #[test]
    fn test_profiles_match_limit_table() {
        let p = FreddieProduct::ValueAdd.profile();
        assert_eq!(p.max_ltv_percent, dec!(85));
        assert_eq!(p.min_dscr, dec!(1.15));
        assert_eq!(FreddieProduct::TaxExemptLihtc.profile().max_ltv_percent, dec!(90));
        assert_eq!(FreddieProduct::NoahPreservation.profile().max_term_years, 15);
        for product in FreddieProduct::ALL {
            assert_eq!(product.profile().max_amortization_years, 30, "{:?}", product);
        }
    }

    #[test]
    fn test_sbl_tiers() {
        assert_eq!(sbl_tier_limits("TOP"), (dec!(78), dec!(1.20)));
        assert_eq!(sbl_tier_limits("small"), (dec!(75), dec!(1.25)));
        assert_eq!(sbl_tier_limits("Standard"), (dec!(80), dec!(1.25)));
        assert_eq!(sbl_tier_limits("rural"), (dec!(80), dec!(1.25)));

        let t = sbl_market_tier(dec!(1.29), dec!(65), "Top");
        assert!(t.pass);
        assert_eq!(t.name, "SBL Market Tier (Top)");
        assert_eq!(
            t.notes.as_deref(),
            Some("Tier Top: max LTV 78% (actual 65%), min DSCR 1.20x")
        );

        // LTV over the tier cap fails even with strong coverage
        assert!(!sbl_market_tier(dec!(1.50), dec!(79), "Top").pass);
        assert!(!sbl_market_tier(dec!(1.22), dec!(70), "Small").pass);
    }

    #[test]
    fn test_sbl_blank_tier_skipped() {
        let inputs = FreddieComplianceInputs {
            sbl_market_tier: Some("  ".into()),
            ..Default::default()
        };
        let r = evaluate(FreddieProduct::SmallBalanceLoan, &sample_metrics(), Some(&inputs));
        assert!(r.product_tests.is_empty());
    }

    #[test]
    fn test_floating_rate_cap() {
        let t = floating_rate_cap(dec!(65), false, dec!(60));
        assert!(!t.pass);
        assert_eq!(t.actual_value, Decimal::ZERO);
        assert_eq!(t.required_value, Decimal::ONE);

        assert!(floating_rate_cap(dec!(65), true, dec!(60)).pass);

        let t = floating_rate_cap(dec!(60), false, dec!(60));
        assert!(t.pass);
        assert_eq!(t.required_value, Decimal::ZERO);
    }

    #[test]
    fn test_floating_rate_evaluated_with_default_inputs() {
        let inputs = FreddieComplianceInputs::default();
        let r = evaluate(FreddieProduct::FloatingRate, &sample_metrics(), Some(&inputs));
        assert_eq!(r.product_tests.len(), 1);
        assert!(!r.overall_pass);
    }

    #[test]
    fn test_seniors_tests_in_order() {
        let inputs = FreddieComplianceInputs {
            il_beds: 40,
            al_beds: 40,
            sn_beds: 20,
            snf_noi: Some(dec!(100000)),
            ..Default::default()
        };
        let mut m = sample_metrics();
        m.actual_dscr = dec!(1.45);
        let r = evaluate(FreddieProduct::SeniorsAL, &m, Some(&inputs));
        let names: Vec<&str> = r.product_tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Seniors Blended DSCR", "SNF NOI Cap (≤20%)"]);
        // 0.4 x 1.30 + 0.4 x 1.45 + 0.2 x 1.50 = 1.40
        assert_eq!(r.product_tests[0].required_value, dec!(1.40));
        assert_eq!(r.product_tests[1].actual_value, dec!(14.4));
        assert!(r.overall_pass);
    }

    #[test]
    fn test_lease_up_each_test_needs_its_own_input() {
        let inputs = FreddieComplianceInputs {
            physical_occupancy_percent: Some(dec!(60)),
            ..Default::default()
        };
        let mut m = sample_metrics();
        m.actual_dscr = dec!(1.35);
        let r = evaluate(FreddieProduct::LeaseUp, &m, Some(&inputs));
        assert_eq!(r.product_tests.len(), 1);
        let t = r.find("Lease-Up Physical Occupancy").unwrap();
        assert!(!t.pass);
        assert_eq!(t.notes.as_deref(), Some("Physical occupancy 60% below 65% minimum"));
    }

    #[test]
    fn test_value_add_rehab_amortizing() {
        let inputs = FreddieComplianceInputs {
            is_rehab_period: true,
            rehab_interest_only: Some(false),
            ..Default::default()
        };
        let r = evaluate(FreddieProduct::ValueAdd, &sample_metrics(), Some(&inputs));
        let t = r.find("Value-Add Rehab DSCR (Amortizing)").unwrap();
        assert_eq!(t.required_value, dec!(1.15));
        assert_eq!(t.actual_value, dec!(1.29));
        assert!(t.pass);
    }

    #[test]
    fn test_mhc_rental_homes() {
        let inputs = FreddieComplianceInputs {
            rental_homes_percent: Some(dec!(30)),
            ..Default::default()
        };
        let r = evaluate(FreddieProduct::ManufacturedHousing, &sample_metrics(), Some(&inputs));
        assert!(!r.find("MHC Rental Homes Cap (≤25%)").unwrap().pass);

        let s = assess(FreddieProduct::ManufacturedHousing, &sample_metrics(), Some(&inputs));
        assert_eq!(s.ratings[1].category, "MHC Rental Homes");
        assert_eq!(s.ratings[1].severity, RiskSeverity::High);
    }

    #[test]
    fn test_assess_floating_rate_without_cap() {
        let inputs = FreddieComplianceInputs::default();
        let s = assess(FreddieProduct::FloatingRate, &sample_metrics(), Some(&inputs));
        assert_eq!(s.overall_severity, RiskSeverity::High);
        assert!(s.ratings[1].description.contains("actual LTV: 65.0%"));

        let capped = FreddieComplianceInputs {
            has_rate_cap: true,
            ..Default::default()
        };
        let s = assess(FreddieProduct::FloatingRate, &sample_metrics(), Some(&capped));
        assert_eq!(s.ratings.len(), 1);
    }

    #[test]
    fn test_assess_without_inputs_rates_dscr_only() {
        let mut m = sample_metrics();
        m.actual_dscr = dec!(1.10);
        let s = assess(FreddieProduct::SeniorsSN, &m, None);
        assert_eq!(s.ratings.len(), 1);
        // 1.10 < 0.80 x 1.50
        assert_eq!(s.overall_severity, RiskSeverity::Critical);
        assert_eq!(s.product_display_name, "Seniors Housing — Skilled Nursing");
    }
}
