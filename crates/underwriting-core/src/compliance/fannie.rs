use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{
    coverage, rehab_dscr, seniors_blended_dscr, share_percent, snf_share_cap,
    supplemental_combined, CareLevelDscr, CombinedLimits, ComplianceResult, ComplianceTest,
    DealMetrics, ProductProfile, RehabDscr,
};
use crate::financing::debt::annual_debt_service;
use crate::risk::{
    rate_affordable_sub_debt, rate_coop_sponsor_concentration, rate_dscr_for_product,
    rate_mhc_tenant_occupied, rate_skilled_nursing_share, rate_student_enrollment, RiskRating,
    RiskRatingSummary,
};
use crate::types::{Money, Percent, Ratio};

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FannieProduct {
    Conventional,
    SmallLoan,
    AffordableHousing,
    SeniorsIL,
    SeniorsAL,
    SeniorsALZ,
    StudentHousing,
    ManufacturedHousing,
    Cooperative,
    Sarm,
    GreenRewards,
    Supplemental,
    NearStabilization,
    Roar,
}

const SENIORS_DSCR: CareLevelDscr = CareLevelDscr {
    independent_living: dec!(1.30),
    assisted_living: dec!(1.40),
    high_acuity: dec!(1.45),
};

impl FannieProduct {
    pub const ALL: [FannieProduct; 14] = [
        FannieProduct::Conventional,
        FannieProduct::SmallLoan,
        FannieProduct::AffordableHousing,
        FannieProduct::SeniorsIL,
        FannieProduct::SeniorsAL,
        FannieProduct::SeniorsALZ,
        FannieProduct::StudentHousing,
        FannieProduct::ManufacturedHousing,
        FannieProduct::Cooperative,
        FannieProduct::Sarm,
        FannieProduct::GreenRewards,
        FannieProduct::Supplemental,
        FannieProduct::NearStabilization,
        FannieProduct::Roar,
    ];

    pub fn is_seniors(&self) -> bool {
        matches!(
            self,
            FannieProduct::SeniorsIL | FannieProduct::SeniorsAL | FannieProduct::SeniorsALZ
        )
    }

    pub fn profile(&self) -> ProductProfile {
        use FannieProduct::*;
        match self {
            Conventional => ProductProfile {
                min_occupancy_percent: Some(dec!(90)),
                notes: "Stabilized occupancy (90%) for 90 days prior to funding",
                ..ProductProfile::base("Conventional Properties", dec!(80), dec!(1.25), 30)
            },
            SmallLoan => ProductProfile {
                max_loan_amount: Some(dec!(9000000)),
                notes: "Streamlined ESA; eligible for Conventional, MAH, MHC",
                ..ProductProfile::base("Small Mortgage Loan", dec!(80), dec!(1.25), 30)
            },
            AffordableHousing => ProductProfile {
                notes: "20%+ units at or below 50% AMI, 40%+ at or below 60% AMI, or 20%+ Section 8 HAP",
                ..ProductProfile::base("Affordable Housing Preservation", dec!(80), dec!(1.20), 35)
            },
            SeniorsIL => ProductProfile {
                care_level_dscr: Some(SENIORS_DSCR),
                max_snf_share_percent: Some(dec!(20)),
                notes: "Purpose-built; experienced sponsor and operator required",
                ..ProductProfile::base("Seniors Housing — Independent Living", dec!(75), dec!(1.30), 30)
            },
            SeniorsAL => ProductProfile {
                care_level_dscr: Some(SENIORS_DSCR),
                max_snf_share_percent: Some(dec!(20)),
                notes: "Management, operations and regulatory compliance reports required",
                ..ProductProfile::base("Seniors Housing — Assisted Living", dec!(75), dec!(1.40), 30)
            },
            SeniorsALZ => ProductProfile {
                care_level_dscr: Some(SENIORS_DSCR),
                max_snf_share_percent: Some(dec!(20)),
                notes: "Stand-alone memory care; highest DSCR requirement",
                ..ProductProfile::base(
                    "Seniors Housing — Alzheimer's/Dementia Care",
                    dec!(75),
                    dec!(1.45),
                    30,
                )
            },
            StudentHousing => ProductProfile {
                notes: "40%+ student occupancy; dedicated properties need 10K+ enrollment",
                ..ProductProfile::base("Student Housing", dec!(75), dec!(1.30), 30)
            },
            ManufacturedHousing => ProductProfile {
                min_vacancy_percent: Some(dec!(5)),
                max_mhc_homes_percent: Some(dec!(35)),
                notes: "50+ pad sites; tenant-occupied homes capped at 35%",
                ..ProductProfile::base("Manufactured Housing Communities", dec!(80), dec!(1.25), 30)
            },
            Cooperative => ProductProfile {
                coop_dscr: Some((dec!(1.00), dec!(1.55))),
                notes: "Dual DSCR: 1.00x actual operations and 1.55x market rental; fixed-rate only",
                ..ProductProfile::base("Cooperative Properties", dec!(55), dec!(1.00), 30)
            },
            Sarm => ProductProfile {
                min_loan_amount: Some(dec!(25000000)),
                stress_min_dscr: Some(dec!(1.05)),
                max_term_years: 10,
                notes: "1.05x DSCR at maximum note rate; borrower purchases rate cap",
                ..ProductProfile::base(
                    "Structured Adjustable Rate Mortgage (SARM)",
                    dec!(65),
                    dec!(1.05),
                    30,
                )
            },
            GreenRewards => ProductProfile {
                green_savings_credit: Some((dec!(0.75), dec!(0.25))),
                notes: "75% owner and 25% tenant projected savings credited to NCF",
                ..ProductProfile::base("Green Rewards", dec!(80), dec!(1.25), 30)
            },
            Supplemental => ProductProfile {
                combined_limits: Some(CombinedLimits {
                    max_ltv_percent: dec!(70),
                    min_dscr: dec!(1.30),
                }),
                notes: "Available 12 months after senior loan closing; combined DSCR and LTV tested",
                ..ProductProfile::base("Supplemental Mortgage Loans", dec!(70), dec!(1.30), 30)
            },
            NearStabilization => ProductProfile {
                min_loan_amount: Some(dec!(10000000)),
                min_occupancy_percent: Some(dec!(75)),
                notes: "75% physical occupancy at rate lock; 12-month interest-only",
                ..ProductProfile::base("Near-Stabilization Execution", dec!(75), dec!(1.25), 30)
            },
            Roar => ProductProfile {
                min_loan_amount: Some(dec!(5000000)),
                min_occupancy_percent: Some(dec!(50)),
                rehab_dscr: Some(RehabDscr {
                    interest_only: dec!(1.00),
                    amortizing: dec!(0.75),
                }),
                notes: "MAH only; 50% minimum occupancy during rehab; $120K/unit max rehab",
                ..ProductProfile::base(
                    "Reduced Occupancy Affordable Rehab (ROAR)",
                    dec!(90),
                    dec!(1.15),
                    35,
                )
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Product-specific inputs. Every field is optional; a test whose inputs
/// are missing is skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FannieComplianceInputs {
    pub il_beds: u32,
    pub al_beds: u32,
    pub alz_beds: u32,
    pub market_rental_noi: Option<Money>,
    pub sarm_margin_percent: Option<Percent>,
    pub sarm_cap_strike_percent: Option<Percent>,
    pub owner_projected_savings: Option<Money>,
    pub tenant_projected_savings: Option<Money>,
    pub snf_ncf: Option<Money>,
    /// SNF share of NCF, percent; derived from `snf_ncf` when absent
    pub snf_ncf_percent: Option<Percent>,
    pub is_rehab_period: bool,
    /// Rehab-period DSCR basis; interest-only unless set to false
    pub rehab_interest_only: Option<bool>,
    /// Rehab-period NOI; the deal NOI when absent
    pub rehab_noi: Option<Money>,
    pub senior_loan_amount: Option<Money>,
    pub senior_debt_service: Option<Money>,
    pub nearby_enrollment: Option<u32>,
    pub tenant_occupied_percent: Option<Percent>,
    pub sponsor_ownership_percent: Option<Percent>,
    pub sub_debt_combined_dscr: Option<Ratio>,
}

// ---------------------------------------------------------------------------
// Product tests
// ---------------------------------------------------------------------------

/// Actual-operations and market-rental coverage, reported separately.
pub fn cooperative_dual_dscr(
    actual_noi: Money,
    market_rental_noi: Money,
    annual_debt_service: Money,
    minimums: (Ratio, Ratio),
) -> (ComplianceTest, ComplianceTest) {
    let (actual_min, market_min) = minimums;
    let actual = coverage(actual_noi, annual_debt_service);
    let market = coverage(market_rental_noi, annual_debt_service);

    (
        ComplianceTest {
            name: "Cooperative Actual Operations DSCR".into(),
            pass: actual >= actual_min,
            actual_value: actual,
            required_value: actual_min,
            notes: (actual < actual_min)
                .then(|| format!("Actual operations DSCR below {actual_min:.2}x minimum")),
        },
        ComplianceTest {
            name: "Cooperative Market Rental DSCR".into(),
            pass: market >= market_min,
            actual_value: market,
            required_value: market_min,
            notes: (market < market_min)
                .then(|| format!("Market rental DSCR below {market_min:.2}x minimum")),
        },
    )
}

/// Coverage on an amortizing schedule at the maximum note rate
/// (`margin + cap strike`).
pub fn sarm_stress_dscr(
    noi: Money,
    loan_amount: Money,
    amortization_years: u32,
    margin_percent: Percent,
    cap_strike_percent: Percent,
    minimum: Ratio,
) -> ComplianceTest {
    let max_rate = margin_percent + cap_strike_percent;
    let stressed_service = annual_debt_service(loan_amount, max_rate, false, amortization_years);
    let stressed = coverage(noi, stressed_service);
    ComplianceTest {
        name: "SARM Stress DSCR (at Max Note Rate)".into(),
        pass: stressed >= minimum,
        actual_value: stressed,
        required_value: minimum,
        notes: Some(format!(
            "Tested at max rate {max_rate:.2}% (margin {margin_percent}% + cap {cap_strike_percent}%)"
        )),
    }
}

/// Green Rewards NCF credit: `(adjustment, adjusted_ncf)`, both 2 dp.
pub fn green_ncf_adjustment(
    base_ncf: Money,
    owner_projected_savings: Money,
    tenant_projected_savings: Money,
    credit: (Ratio, Ratio),
) -> (Money, Money) {
    let adjustment =
        (owner_projected_savings * credit.0 + tenant_projected_savings * credit.1).round_dp(2);
    (adjustment, (base_ncf + adjustment).round_dp(2))
}

// ---------------------------------------------------------------------------
// Evaluate / assess
// ---------------------------------------------------------------------------

/// Universal tests plus whichever product tests `inputs` make possible.
pub fn evaluate(
    product: FannieProduct,
    metrics: &DealMetrics,
    inputs: Option<&FannieComplianceInputs>,
) -> ComplianceResult {
    let profile = product.profile();
    let mut result = ComplianceResult::universal(&profile, metrics);

    let Some(inputs) = inputs else {
        return result;
    };

    if let Some(levels) = profile.care_level_dscr.as_ref() {
        result.push(seniors_blended_dscr(
            metrics.actual_dscr,
            levels,
            [inputs.il_beds, inputs.al_beds, inputs.alz_beds],
            "ALZ",
        ));
    }

    if let (Some(minimums), Some(market_noi)) = (profile.coop_dscr, inputs.market_rental_noi) {
        if metrics.annual_debt_service > Decimal::ZERO {
            let (actual, market) =
                cooperative_dual_dscr(metrics.noi, market_noi, metrics.annual_debt_service, minimums);
            result.push(actual);
            result.push(market);
        }
    }

    if let (Some(minimum), Some(margin), Some(cap)) = (
        profile.stress_min_dscr,
        inputs.sarm_margin_percent,
        inputs.sarm_cap_strike_percent,
    ) {
        result.push(sarm_stress_dscr(
            metrics.noi,
            metrics.loan_amount,
            metrics.actual_amortization_years,
            margin,
            cap,
            minimum,
        ));
    }

    if let Some(cap) = profile.max_snf_share_percent {
        if let Some(snf_ncf) = inputs.snf_ncf {
            if metrics.noi > Decimal::ZERO {
                result.push(snf_share_cap("NCF", snf_ncf, metrics.noi, cap));
            }
        }
    }

    if let Some(limits) = profile.rehab_dscr.as_ref() {
        if inputs.is_rehab_period && metrics.annual_debt_service > Decimal::ZERO {
            result.push(rehab_dscr(
                "ROAR",
                inputs.rehab_noi.unwrap_or(metrics.noi),
                metrics.annual_debt_service,
                inputs.rehab_interest_only.unwrap_or(true),
                limits,
            ));
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

    if let (Some(credit), Some(owner), Some(tenant)) = (
        profile.green_savings_credit,
        inputs.owner_projected_savings,
        inputs.tenant_projected_savings,
    ) {
        let (adjustment, adjusted) = green_ncf_adjustment(metrics.noi, owner, tenant, credit);
        result.green_ncf_adjustment = Some(adjustment);
        result.adjusted_ncf = Some(adjusted);
    }

    result
}

/// Product-aware DSCR rating plus product-specific risks.
pub fn assess(
    product: FannieProduct,
    metrics: &DealMetrics,
    inputs: Option<&FannieComplianceInputs>,
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
            FannieProduct::SeniorsIL | FannieProduct::SeniorsAL | FannieProduct::SeniorsALZ => {
                let share = inputs.snf_ncf_percent.or_else(|| {
                    inputs
                        .snf_ncf
                        .filter(|_| metrics.noi > Decimal::ZERO)
                        .map(|snf| share_percent(snf, metrics.noi))
                });
                if let Some(share) = share {
                    ratings.push(RiskRating::new(
                        "SNF NCF Concentration",
                        rate_skilled_nursing_share(share),
                        format!("Skilled Nursing NCF is {share:.1}% of total property NCF"),
                    ));
                }
            }
            FannieProduct::StudentHousing => {
                if let Some(enrollment) = inputs.nearby_enrollment {
                    ratings.push(RiskRating::new(
                        "University Enrollment",
                        rate_student_enrollment(enrollment),
                        format!(
                            "Nearby university enrollment: {} students",
                            crate::types::format_whole_dollars(Decimal::from(enrollment))
                        ),
                    ));
                }
            }
            FannieProduct::ManufacturedHousing => {
                if let Some(pct) = inputs.tenant_occupied_percent {
                    ratings.push(RiskRating::new(
                        "MHC Tenant-Occupied Homes",
                        rate_mhc_tenant_occupied(pct),
                        format!("Tenant-occupied homes: {pct:.1}% (max 35%)"),
                    ));
                }
            }
            FannieProduct::Cooperative => {
                if let Some(pct) = inputs.sponsor_ownership_percent {
                    ratings.push(RiskRating::new(
                        "Co-op Sponsor Concentration",
                        rate_coop_sponsor_concentration(pct),
                        format!("Single sponsor owns {pct:.1}% of units"),
                    ));
                }
            }
            FannieProduct::AffordableHousing => {
                if let Some(dscr) = inputs.sub_debt_combined_dscr {
                    ratings.push(RiskRating::new(
                        "Subordinate Debt DSCR",
                        rate_affordable_sub_debt(dscr),
                        format!("Hard sub combined DSCR: {dscr:.2}x (min 1.05x)"),
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
