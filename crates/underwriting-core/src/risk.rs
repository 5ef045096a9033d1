//! Risk rating classifiers.
//!
//! Each classifier maps one metric onto a four-tier ordinal severity. Band
//! edges are inclusive on the safer side unless a rule says otherwise.
//! A [`RiskRatingSummary`] rolls several ratings up to the worst one.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Percent, Ratio};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Ordinal severity. Ordering follows declaration: Low < Moderate < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskSeverity {
    Low,
    Moderate,
    High,
    Critical,
}

impl fmt::Display for RiskSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskSeverity::Low => "Low",
            RiskSeverity::Moderate => "Moderate",
            RiskSeverity::High => "High",
            RiskSeverity::Critical => "Critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRating {
    pub category: String,
    pub severity: RiskSeverity,
    pub description: String,
}

impl RiskRating {
    pub fn new(category: &str, severity: RiskSeverity, description: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            severity,
            description: description.into(),
        }
    }
}

/// Ratings for one deal plus the worst of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRatingSummary {
    /// Product identifier, e.g. `SeniorsAL`
    pub product: String,
    pub product_display_name: String,
    pub overall_severity: RiskSeverity,
    pub ratings: Vec<RiskRating>,
}

impl RiskRatingSummary {
    pub fn new(product: &str, product_display_name: &str, ratings: Vec<RiskRating>) -> Self {
        Self {
            product: product.to_string(),
            product_display_name: product_display_name.to_string(),
            overall_severity: overall_severity(&ratings),
            ratings,
        }
    }

    /// Ratings at or above `threshold`.
    pub fn at_least(&self, threshold: RiskSeverity) -> impl Iterator<Item = &RiskRating> {
        self.ratings.iter().filter(move |r| r.severity >= threshold)
    }
}

/// Worst severity in the list; `Low` for an empty list.
pub fn overall_severity(ratings: &[RiskRating]) -> RiskSeverity {
    ratings
        .iter()
        .map(|r| r.severity)
        .max()
        .unwrap_or(RiskSeverity::Low)
}

// ---------------------------------------------------------------------------
// Band helpers
// ---------------------------------------------------------------------------

/// Higher is worse; a value at or above a bound takes that band.
fn band_at_or_above(value: Decimal, moderate: Decimal, high: Decimal, critical: Decimal) -> RiskSeverity {
    if value >= critical {
        RiskSeverity::Critical
    } else if value >= high {
        RiskSeverity::High
    } else if value >= moderate {
        RiskSeverity::Moderate
    } else {
        RiskSeverity::Low
    }
}

/// Higher is worse; a value must exceed a bound to take that band.
fn band_above(value: Decimal, moderate: Decimal, high: Decimal, critical: Decimal) -> RiskSeverity {
    if value > critical {
        RiskSeverity::Critical
    } else if value > high {
        RiskSeverity::High
    } else if value > moderate {
        RiskSeverity::Moderate
    } else {
        RiskSeverity::Low
    }
}

/// Lower is worse; a value must fall below a bound to take that band.
fn band_below(value: Decimal, moderate: Decimal, high: Decimal, critical: Decimal) -> RiskSeverity {
    if value < critical {
        RiskSeverity::Critical
    } else if value < high {
        RiskSeverity::High
    } else if value < moderate {
        RiskSeverity::Moderate
    } else {
        RiskSeverity::Low
    }
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

/// Baseline DSCR used by the fixed-threshold mode.
pub const FIXED_DSCR_BASELINE: Ratio = dec!(1.25);

/// Fixed-threshold DSCR rating: >= 1.25 Low, 1.15-1.25 Moderate,
/// 1.00-1.15 High, < 1.00 Critical.
pub fn rate_dscr(dscr: Ratio) -> RiskSeverity {
    rate_dscr_for_product(dscr, FIXED_DSCR_BASELINE)
}

/// Product-aware DSCR rating, banded by shortfall below `product_min_dscr`:
/// under 8% Moderate, 8-20% High, beyond 20% Critical.
pub fn rate_dscr_for_product(dscr: Ratio, product_min_dscr: Ratio) -> RiskSeverity {
    band_below(
        dscr,
        product_min_dscr,
        product_min_dscr * dec!(0.92),
        product_min_dscr * dec!(0.80),
    )
}

/// Premium of subject rent over market rent. No market rent rates Low.
pub fn rate_rent_premium(subject_rent: Decimal, market_rent: Decimal) -> RiskSeverity {
    if market_rent.is_zero() {
        return RiskSeverity::Low;
    }
    let premium = (subject_rent - market_rent) / market_rent * dec!(100);
    band_at_or_above(premium, dec!(5), dec!(10), dec!(15))
}

/// Points by which subject occupancy trails the market.
pub fn rate_occupancy_gap(subject_occupancy: Percent, market_occupancy: Percent) -> RiskSeverity {
    band_at_or_above(market_occupancy - subject_occupancy, dec!(5), dec!(10), dec!(20))
}

/// Points by which the subject's tenant FICO trails the metro median.
pub fn rate_fico_gap(subject_fico: i32, metro_fico: i32) -> RiskSeverity {
    match metro_fico - subject_fico {
        gap if gap >= 75 => RiskSeverity::Critical,
        gap if gap >= 50 => RiskSeverity::High,
        gap if gap >= 25 => RiskSeverity::Moderate,
        _ => RiskSeverity::Low,
    }
}

/// Skilled-nursing share of property NOI/NCF.
pub fn rate_skilled_nursing_share(snf_percent: Percent) -> RiskSeverity {
    band_above(snf_percent, dec!(10), dec!(15), dec!(20))
}

pub fn rate_student_enrollment(enrollment: u32) -> RiskSeverity {
    match enrollment {
        e if e < 5_000 => RiskSeverity::Critical,
        e if e < 10_000 => RiskSeverity::High,
        e if e < 15_000 => RiskSeverity::Moderate,
        _ => RiskSeverity::Low,
    }
}

/// Tenant-occupied homes in a manufactured housing community.
pub fn rate_mhc_tenant_occupied(tenant_occupied_percent: Percent) -> RiskSeverity {
    band_above(tenant_occupied_percent, dec!(25), dec!(35), dec!(50))
}

/// Rental homes in a manufactured housing community, on the tighter 25% cap.
pub fn rate_mhc_rental_homes(rental_homes_percent: Percent) -> RiskSeverity {
    band_above(rental_homes_percent, dec!(15), dec!(25), dec!(35))
}

/// Share of co-op units held by a single sponsor. Above 80% is Critical.
pub fn rate_coop_sponsor_concentration(sponsor_ownership_percent: Percent) -> RiskSeverity {
    band_above(sponsor_ownership_percent, dec!(40), dec!(60), dec!(80))
}

/// Combined DSCR including hard subordinate debt.
pub fn rate_affordable_sub_debt(combined_dscr: Ratio) -> RiskSeverity {
    band_below(combined_dscr, dec!(1.10), dec!(1.05), dec!(1.00))
}

// ---------------------------------------------------------------------------
// Market signals
// ---------------------------------------------------------------------------

/// Optional market comparisons rated alongside product-specific risks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketRiskSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_rent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_rent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_occupancy_percent: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_occupancy_percent: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_fico: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro_fico: Option<i32>,
}

impl MarketRiskSignals {
    /// One rating per complete pair of signals.
    pub fn ratings(&self) -> Vec<RiskRating> {
        let mut ratings = Vec::new();

        if let (Some(subject), Some(market)) = (self.subject_rent, self.market_rent) {
            ratings.push(RiskRating::new(
                "Rent Premium",
                rate_rent_premium(subject, market),
                format!("Subject rent ${subject:.0} vs. market ${market:.0}"),
            ));
        }
        if let (Some(subject), Some(market)) =
            (self.subject_occupancy_percent, self.market_occupancy_percent)
        {
            ratings.push(RiskRating::new(
                "Occupancy Gap",
                rate_occupancy_gap(subject, market),
                format!("Subject occupancy {subject:.1}% vs. market {market:.1}%"),
            ));
        }
        if let (Some(subject), Some(metro)) = (self.subject_fico, self.metro_fico) {
            ratings.push(RiskRating::new(
                "FICO Gap",
                rate_fico_gap(subject, metro),
                format!("Tenant FICO {subject} vs. metro {metro}"),
            ));
        }

        ratings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(RiskSeverity::Low < RiskSeverity::Moderate);
        assert!(RiskSeverity::Moderate < RiskSeverity::High);
        assert!(RiskSeverity::High < RiskSeverity::Critical);
    }

    #[test]
    fn test_fixed_dscr_bands() {
        assert_eq!(rate_dscr(dec!(1.30)), RiskSeverity::Low);
        assert_eq!(rate_dscr(dec!(1.25)), RiskSeverity::Low);
        assert_eq!(rate_dscr(dec!(1.20)), RiskSeverity::Moderate);
        assert_eq!(rate_dscr(dec!(1.15)), RiskSeverity::Moderate);
        assert_eq!(rate_dscr(dec!(1.10)), RiskSeverity::High);
        assert_eq!(rate_dscr(dec!(1.00)), RiskSeverity::High);
        assert_eq!(rate_dscr(dec!(0.99)), RiskSeverity::Critical);
    }

    #[test]
    fn test_product_aware_dscr_bands() {
        // 1.40 minimum: 0.92 x 1.40 = 1.288, 0.80 x 1.40 = 1.12
        assert_eq!(rate_dscr_for_product(dec!(1.40), dec!(1.40)), RiskSeverity::Low);
        assert_eq!(rate_dscr_for_product(dec!(1.30), dec!(1.40)), RiskSeverity::Moderate);
        assert_eq!(rate_dscr_for_product(dec!(1.20), dec!(1.40)), RiskSeverity::High);
        assert_eq!(rate_dscr_for_product(dec!(1.10), dec!(1.40)), RiskSeverity::Critical);
    }

    #[test]
    fn test_rent_premium() {
        assert_eq!(rate_rent_premium(dec!(1000), Decimal::ZERO), RiskSeverity::Low);
        assert_eq!(rate_rent_premium(dec!(1040), dec!(1000)), RiskSeverity::Low);
        assert_eq!(rate_rent_premium(dec!(1050), dec!(1000)), RiskSeverity::Moderate);
        assert_eq!(rate_rent_premium(dec!(1120), dec!(1000)), RiskSeverity::High);
        assert_eq!(rate_rent_premium(dec!(1160), dec!(1000)), RiskSeverity::Critical);
        assert_eq!(rate_rent_premium(dec!(900), dec!(1000)), RiskSeverity::Low);
    }

    #[test]
    fn test_gap_ratings() {
        assert_eq!(rate_occupancy_gap(dec!(93), dec!(95)), RiskSeverity::Low);
        assert_eq!(rate_occupancy_gap(dec!(90), dec!(95)), RiskSeverity::Moderate);
        assert_eq!(rate_occupancy_gap(dec!(80), dec!(95)), RiskSeverity::High);
        assert_eq!(rate_occupancy_gap(dec!(70), dec!(95)), RiskSeverity::Critical);
        assert_eq!(rate_fico_gap(700, 710), RiskSeverity::Low);
        assert_eq!(rate_fico_gap(680, 705), RiskSeverity::Moderate);
        assert_eq!(rate_fico_gap(650, 700), RiskSeverity::High);
        assert_eq!(rate_fico_gap(600, 700), RiskSeverity::Critical);
    }

    #[test]
    fn test_share_bands_are_exclusive_at_bounds() {
        assert_eq!(rate_skilled_nursing_share(dec!(10)), RiskSeverity::Low);
        assert_eq!(rate_skilled_nursing_share(dec!(12)), RiskSeverity::Moderate);
        assert_eq!(rate_skilled_nursing_share(dec!(20)), RiskSeverity::High);
        assert_eq!(rate_skilled_nursing_share(dec!(21)), RiskSeverity::Critical);
        assert_eq!(rate_mhc_tenant_occupied(dec!(25)), RiskSeverity::Low);
        assert_eq!(rate_mhc_tenant_occupied(dec!(36)), RiskSeverity::High);
        assert_eq!(rate_mhc_tenant_occupied(dec!(51)), RiskSeverity::Critical);
        assert_eq!(rate_mhc_rental_homes(dec!(20)), RiskSeverity::Moderate);
        assert_eq!(rate_mhc_rental_homes(dec!(30)), RiskSeverity::High);
    }

    #[test]
    fn test_enrollment_and_sub_debt() {
        assert_eq!(rate_student_enrollment(20_000), RiskSeverity::Low);
        assert_eq!(rate_student_enrollment(12_000), RiskSeverity::Moderate);
        assert_eq!(rate_student_enrollment(7_500), RiskSeverity::High);
        assert_eq!(rate_student_enrollment(4_999), RiskSeverity::Critical);
        assert_eq!(rate_affordable_sub_debt(dec!(1.10)), RiskSeverity::Low);
        assert_eq!(rate_affordable_sub_debt(dec!(1.07)), RiskSeverity::Moderate);
        assert_eq!(rate_affordable_sub_debt(dec!(1.02)), RiskSeverity::High);
        assert_eq!(rate_affordable_sub_debt(dec!(0.95)), RiskSeverity::Critical);
    }

    #[test]
    fn test_coop_sponsor_bands() {
        assert_eq!(rate_coop_sponsor_concentration(dec!(40)), RiskSeverity::Low);
        assert_eq!(rate_coop_sponsor_concentration(dec!(50)), RiskSeverity::Moderate);
        assert_eq!(rate_coop_sponsor_concentration(dec!(70)), RiskSeverity::High);
        assert_eq!(rate_coop_sponsor_concentration(dec!(85)), RiskSeverity::Critical);
    }

    #[test]
    fn test_summary_takes_worst() {
        let summary = RiskRatingSummary::new(
            "Conventional",
            "Conventional Properties",
            vec![
                RiskRating::new("DSCR", RiskSeverity::Low, "ok"),
                RiskRating::new("Rent Premium", RiskSeverity::High, "rich"),
                RiskRating::new("Occupancy Gap", RiskSeverity::Moderate, "soft"),
            ],
        );
        assert_eq!(summary.overall_severity, RiskSeverity::High);
        assert_eq!(summary.at_least(RiskSeverity::Moderate).count(), 2);
        assert_eq!(overall_severity(&[]), RiskSeverity::Low);
    }

    #[test]
    fn test_market_signals_need_both_sides() {
        let signals = MarketRiskSignals {
            subject_rent: Some(dec!(1200)),
            market_rent: Some(dec!(1000)),
            subject_occupancy_percent: Some(dec!(90)),
            market_occupancy_percent: None,
            subject_fico: Some(640),
            metro_fico: Some(700),
        };
        let ratings = signals.ratings();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].category, "Rent Premium");
        assert_eq!(ratings[0].severity, RiskSeverity::Critical);
        assert_eq!(ratings[1].category, "FICO Gap");
        assert_eq!(ratings[1].severity, RiskSeverity::High);
    }
}
