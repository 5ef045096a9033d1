use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, Money, Percent};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Percentage adjustments applied to a comparable sale, positive when the
/// subject is superior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompAdjustments {
    pub time: Percent,
    pub size: Percent,
    pub age: Percent,
    pub location: Percent,
    pub amenities: Percent,
}

impl CompAdjustments {
    pub fn total(&self) -> Percent {
        self.time + self.size + self.age + self.location + self.amenities
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesComp {
    pub name: String,
    pub sale_price: Money,
    pub unit_count: u32,
    #[serde(default)]
    pub adjustments: CompAdjustments,
}

impl SalesComp {
    pub fn raw_price_per_unit(&self) -> Money {
        if self.unit_count == 0 {
            Decimal::ZERO
        } else {
            self.sale_price / Decimal::from(self.unit_count)
        }
    }

    pub fn adjusted_price_per_unit(&self) -> Money {
        let a = &self.adjustments;
        adjust_comp_price_per_unit(self.raw_price_per_unit(), a.time, a.size, a.age, a.location, a.amenities)
    }
}

/// Reconciled per-unit value across a comp set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompReconciliation {
    pub comps_used: u32,
    pub average_adjusted_price_per_unit: Money,
    pub low_adjusted_price_per_unit: Money,
    pub high_adjusted_price_per_unit: Money,
    /// Average adjusted price per unit times subject units
    pub indicated_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompsRequest {
    pub subject_units: u32,
    pub comps: Vec<SalesComp>,
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// `raw * (1 + sum(adjustments) / 100)`.
pub fn adjust_comp_price_per_unit(
    raw_price_per_unit: Money,
    time_adj_percent: Percent,
    size_adj_percent: Percent,
    age_adj_percent: Percent,
    location_adj_percent: Percent,
    amenities_adj_percent: Percent,
) -> Money {
    let total = time_adj_percent + size_adj_percent + age_adj_percent + location_adj_percent + amenities_adj_percent;
    raw_price_per_unit * (Decimal::ONE + total / dec!(100))
}

/// Comps without units are skipped. An empty set reconciles to zero.
pub fn reconcile_comps(comps: &[SalesComp], subject_units: u32) -> CompReconciliation {
    let adjusted: Vec<Money> = comps
        .iter()
        .filter(|c| c.unit_count > 0)
        .map(SalesComp::adjusted_price_per_unit)
        .collect();

    if adjusted.is_empty() {
        return CompReconciliation {
            comps_used: 0,
            average_adjusted_price_per_unit: Decimal::ZERO,
            low_adjusted_price_per_unit: Decimal::ZERO,
            high_adjusted_price_per_unit: Decimal::ZERO,
            indicated_value: Decimal::ZERO,
        };
    }

    let average = (adjusted.iter().copied().sum::<Decimal>() / Decimal::from(adjusted.len() as u64)).round_dp(2);
    let low = adjusted.iter().copied().min().unwrap_or(Decimal::ZERO);
    let high = adjusted.iter().copied().max().unwrap_or(Decimal::ZERO);

    CompReconciliation {
        comps_used: adjusted.len() as u32,
        average_adjusted_price_per_unit: average,
        low_adjusted_price_per_unit: low,
        high_adjusted_price_per_unit: high,
        indicated_value: average * Decimal::from(subject_units),
    }
}

/// Comp reconciliation wrapped in the standard output envelope.
pub fn analyze_comps(request: &CompsRequest) -> UnderwritingResult<ComputationOutput<CompReconciliation>> {
    let start = Instant::now();
    let result = reconcile_comps(&request.comps, request.subject_units);

    let mut warnings: Vec<String> = Vec::new();
    for comp in request.comps.iter().filter(|c| c.unit_count == 0) {
        warnings.push(format!("{} has no units and was skipped", comp.name));
    }
    for comp in request.comps.iter().filter(|c| c.adjustments.total().abs() > dec!(25)) {
        warnings.push(format!(
            "{} carries {}% of net adjustments",
            comp.name,
            comp.adjustments.total().normalize()
        ));
    }

    Ok(with_metadata(
        "Sales comparison (percentage adjustments to price per unit, simple average)",
        request,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_comp(name: &str, price: Money, units: u32, time: Percent) -> SalesComp {
        SalesComp {
            name: name.into(),
            sale_price: price,
            unit_count: units,
            adjustments: CompAdjustments { time, ..Default::default() },
        }
    }

    #[test]
    fn test_adjust_comp_price_per_unit() {
        let adjusted = adjust_comp_price_per_unit(dec!(150000), dec!(3), dec!(-2), dec!(5), dec!(0), dec!(-1));
        assert_eq!(adjusted, dec!(157500));
        assert_eq!(
            adjust_comp_price_per_unit(dec!(150000), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            dec!(150000)
        );
    }

    #[test]
    fn test_reconcile_comps() {
        let comps = vec![
            sample_comp("Oak Terrace", dec!(14000000), 100, dec!(0)),
            sample_comp("Birch Commons", dec!(8000000), 50, dec!(10)),
            sample_comp("Empty Lot", dec!(1000000), 0, dec!(0)),
        ];
        let r = reconcile_comps(&comps, 100);
        assert_eq!(r.comps_used, 2);
        assert_eq!(r.low_adjusted_price_per_unit, dec!(140000));
        assert_eq!(r.high_adjusted_price_per_unit, dec!(176000));
        assert_eq!(r.average_adjusted_price_per_unit, dec!(158000));
        assert_eq!(r.indicated_value, dec!(15800000));
    }

    #[test]
    fn test_analyze_comps_flags_heavy_adjustments() {
        let mut heavy = sample_comp("Cedar Flats", dec!(9000000), 60, dec!(20));
        heavy.adjustments.location = dec!(10);
        let out = analyze_comps(&CompsRequest { subject_units: 100, comps: vec![heavy] }).unwrap();
        assert_eq!(out.result.comps_used, 1);
        assert!(out.warnings.iter().any(|w| w.contains("Cedar Flats carries 30%")));
    }

    #[test]
    fn test_reconcile_empty_set() {
        let r = reconcile_comps(&[], 100);
        assert_eq!(r.comps_used, 0);
        assert_eq!(r.indicated_value, Decimal::ZERO);
    }
}
