use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, Money, Percent};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Share of gross income a household is expected to spend on rent.
pub const HOUSING_COST_RATIO: Decimal = dec!(0.30);

/// Reported when the rent is not affordable at any tier.
pub const MARKET_RATE_AMI_PERCENT: u32 = 999;
pub const MARKET_RATE_LABEL: &str = "Above 120% AMI — Market Rate";

/// HUD annual income limits for one AMI level, by household size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeLevel {
    #[serde(alias = "p1")]
    pub person1: Money,
    #[serde(alias = "p2")]
    pub person2: Money,
    #[serde(alias = "p3")]
    pub person3: Money,
    #[serde(alias = "p4")]
    pub person4: Money,
    #[serde(alias = "p5")]
    pub person5: Money,
    #[serde(alias = "p6")]
    pub person6: Money,
    #[serde(alias = "p7")]
    pub person7: Money,
    #[serde(alias = "p8")]
    pub person8: Money,
}

impl IncomeLevel {
    /// Limit for `size` persons; sizes outside 1-8 use the 4-person limit.
    pub fn for_household(&self, size: u32) -> Money {
        match size {
            1 => self.person1,
            2 => self.person2,
            3 => self.person3,
            5 => self.person5,
            6 => self.person6,
            7 => self.person7,
            8 => self.person8,
            _ => self.person4,
        }
    }
}

/// HUD income limits for an area. HUD publishes 30%, 50% and 80% AMI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeLimits {
    pub area_name: String,
    pub year: i32,
    pub median_family_income: Money,
    /// 30% AMI
    pub extremely_low: IncomeLevel,
    /// 50% AMI
    pub very_low: IncomeLevel,
    /// 80% AMI
    pub low: IncomeLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmiTier {
    pub ami_percent: u32,
    pub label: String,
    pub annual_income_limit: Money,
    pub max_affordable_rent: Money,
    pub is_affordable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordabilityInput {
    pub monthly_rent_per_unit: Money,
    pub income_limits: IncomeLimits,
    #[serde(default = "default_household_size")]
    pub household_size: u32,
}

fn default_household_size() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityResult {
    pub subject_monthly_rent: Money,
    pub household_size: u32,
    /// Lowest affordable tier, or 999 when only market rate
    pub affordable_at_ami_percent: u32,
    pub affordability_tier: String,
    pub median_family_income: Money,
    pub area_name: String,
    pub tiers: Vec<AmiTier>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Monthly rent at 30% of `annual_income`, whole dollars, midpoints away from zero.
pub fn max_affordable_rent(annual_income: Money) -> Money {
    (annual_income * HOUSING_COST_RATIO / dec!(12)).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn tier_label(ami_percent: u32) -> &'static str {
    match ami_percent {
        30 => "Extremely Low Income",
        50 => "Very Low Income",
        60 => "LIHTC Threshold",
        80 => "Low Income",
        100 => "Moderate Income",
        120 => "Workforce Housing",
        _ => "Market Rate",
    }
}

/// The six tiers, lowest first. 60%, 100% and 120% are scaled from the
/// published levels and rounded to whole dollars.
pub fn build_ami_tiers(limits: &IncomeLimits, household_size: u32, subject_rent: Money) -> Vec<AmiTier> {
    let extremely_low = limits.extremely_low.for_household(household_size);
    let very_low = limits.very_low.for_household(household_size);
    let low = limits.low.for_household(household_size);
    let lihtc = (very_low * dec!(1.2)).round_dp(0);
    let moderate = (low * dec!(1.25)).round_dp(0);
    let workforce = (moderate * dec!(1.2)).round_dp(0);

    [
        (30, extremely_low),
        (50, very_low),
        (60, lihtc),
        (80, low),
        (100, moderate),
        (120, workforce),
    ]
    .into_iter()
    .map(|(ami_percent, income)| {
        let max_rent = max_affordable_rent(income);
        AmiTier {
            ami_percent,
            label: tier_label(ami_percent).to_string(),
            annual_income_limit: income,
            max_affordable_rent: max_rent,
            is_affordable: subject_rent <= max_rent,
        }
    })
    .collect()
}

pub fn calculate_affordability(input: &AffordabilityInput) -> AffordabilityResult {
    let tiers = build_ami_tiers(&input.income_limits, input.household_size, input.monthly_rent_per_unit);
    let (ami_percent, tier) = match tiers.iter().find(|t| t.is_affordable) {
        Some(t) => (
            t.ami_percent,
            format!("Affordable at {}% AMI — {}", t.ami_percent, t.label),
        ),
        None => (MARKET_RATE_AMI_PERCENT, MARKET_RATE_LABEL.to_string()),
    };

    AffordabilityResult {
        subject_monthly_rent: input.monthly_rent_per_unit,
        household_size: input.household_size,
        affordable_at_ami_percent: ami_percent,
        affordability_tier: tier,
        median_family_income: input.income_limits.median_family_income,
        area_name: input.income_limits.area_name.clone(),
        tiers,
    }
}

/// Affordability wrapped in the standard output envelope.
pub fn analyze_affordability(input: &AffordabilityInput) -> UnderwritingResult<ComputationOutput<AffordabilityResult>> {
    let start = Instant::now();
    let result = calculate_affordability(input);

    let mut warnings: Vec<String> = Vec::new();
    if !(1..=8).contains(&input.household_size) {
        warnings.push(format!(
            "Household size {} outside 1-8; 4-person limits used",
            input.household_size
        ));
    }
    if result.tiers.iter().any(|t| t.annual_income_limit.is_zero()) {
        warnings.push("One or more income limits are zero".into());
    }

    Ok(with_metadata(
        "HUD AMI affordability (30% of income, derived 60/100/120% tiers)",
        input,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    ))
}

/// Share of units affordable at or below `ami_percent`, given per-unit rents.
pub fn share_affordable_at(rents: &[Money], tiers: &[AmiTier], ami_percent: u32) -> Percent {
    let Some(tier) = tiers.iter().find(|t| t.ami_percent == ami_percent) else {
        return Decimal::ZERO;
    };
    if rents.is_empty() {
        return Decimal::ZERO;
    }
    let affordable = rents.iter().filter(|r| **r <= tier.max_affordable_rent).count();
    Decimal::from(affordable as u64) / Decimal::from(rents.len() as u64) * dec!(100)
}
