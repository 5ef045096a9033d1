use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::asset_management::actuals::{
    annual_summary, trailing_twelve, validate_period, AnnualSummary, MonthlyActual, MAX_YEAR, MIN_YEAR,
};
use crate::asset_management::variance::{calculate_variance, VarianceReport, VarianceSeverity};
use crate::config::{ProtocolDefaults, VarianceAllocation};
use crate::error::UnderwritingError;
use crate::types::{format_whole_dollars, with_metadata, ComputationOutput, Money, Percent};
use crate::underwriting::CalculationResult;
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The span an asset report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportingPeriod {
    Monthly { year: i32, month: u32 },
    Quarterly { year: i32, quarter: u32 },
    Annual { year: i32 },
}

impl ReportingPeriod {
    pub fn monthly(year: i32, month: u32) -> UnderwritingResult<Self> {
        validate_period(year, month)?;
        Ok(ReportingPeriod::Monthly { year, month })
    }

    pub fn quarterly(year: i32, quarter: u32) -> UnderwritingResult<Self> {
        validate_year(year)?;
        if !(1..=4).contains(&quarter) {
            return Err(UnderwritingError::out_of_range("quarter", i64::from(quarter), 1, 4));
        }
        Ok(ReportingPeriod::Quarterly { year, quarter })
    }

    pub fn annual(year: i32) -> UnderwritingResult<Self> {
        validate_year(year)?;
        Ok(ReportingPeriod::Annual { year })
    }

    /// Re-check a period that arrived through deserialization.
    pub fn validate(&self) -> UnderwritingResult<()> {
        match *self {
            ReportingPeriod::Monthly { year, month } => Self::monthly(year, month).map(|_| ()),
            ReportingPeriod::Quarterly { year, quarter } => Self::quarterly(year, quarter).map(|_| ()),
            ReportingPeriod::Annual { year } => Self::annual(year).map(|_| ()),
        }
    }

    pub fn year(&self) -> i32 {
        match *self {
            ReportingPeriod::Monthly { year, .. }
            | ReportingPeriod::Quarterly { year, .. }
            | ReportingPeriod::Annual { year } => year,
        }
    }

    /// First and last month of the period, inclusive.
    fn month_span(&self) -> (u32, u32) {
        match *self {
            ReportingPeriod::Monthly { month, .. } => (month, month),
            ReportingPeriod::Quarterly { quarter, .. } => (quarter * 3 - 2, quarter * 3),
            ReportingPeriod::Annual { .. } => (1, 12),
        }
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year(), self.month_span().0, 1)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        let (_, last) = self.month_span();
        let (next_year, next_month) = if last == 12 {
            (self.year() + 1, 1)
        } else {
            (self.year(), last + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
    }

    /// "Jan 2025", "Q1 2025" or "2025".
    pub fn label(&self) -> String {
        match *self {
            ReportingPeriod::Monthly { year, month } => NaiveDate::from_ymd_opt(year, month, 1)
                .map(|d| d.format("%b %Y").to_string())
                .unwrap_or_else(|| format!("{month:02}/{year}")),
            ReportingPeriod::Quarterly { year, quarter } => format!("Q{quarter} {year}"),
            ReportingPeriod::Annual { year } => year.to_string(),
        }
    }

    pub fn contains(&self, actual: &MonthlyActual) -> bool {
        let (first, last) = self.month_span();
        actual.year == self.year() && (first..=last).contains(&actual.month)
    }
}

fn validate_year(year: i32) -> UnderwritingResult<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(UnderwritingError::out_of_range(
            "year",
            i64::from(year),
            i64::from(MIN_YEAR),
            i64::from(MAX_YEAR),
        ));
    }
    Ok(())
}

/// Headline figures frozen into a report. Actual figures are absent when no
/// actuals were recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub projected_noi: Money,
    pub actual_noi: Option<Money>,
    pub noi_variance_percent: Option<Percent>,
    pub projected_revenue: Money,
    pub actual_revenue: Option<Money>,
    pub projected_expenses: Money,
    pub actual_expenses: Option<Money>,
    pub average_occupancy: Percent,
}

/// A generated asset-management report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReport {
    pub deal_id: String,
    pub property_name: String,
    pub period: ReportingPeriod,
    pub period_label: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    /// Recorded months falling inside the period
    pub months_in_period: u32,
    pub metrics: MetricsSnapshot,
    pub performance_summary: String,
    pub variance_analysis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance: Option<VarianceReport>,
    pub annual_summary: AnnualSummary,
}

/// Request for [`build_asset_report_output`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReportRequest {
    pub property_name: String,
    pub period: ReportingPeriod,
    pub projection: CalculationResult,
    #[serde(default)]
    pub actuals: Vec<MonthlyActual>,
}

// ---------------------------------------------------------------------------
// Narratives
// ---------------------------------------------------------------------------

pub const INSUFFICIENT_DATA: &str =
    "Insufficient data to generate performance summary. Enter monthly actuals to enable analysis.";
pub const NO_VARIANCE_DATA: &str = "No variance data available.";
pub const ALL_WITHIN_THRESHOLDS: &str = "All line items are within acceptable variance thresholds.";

/// `$1,234` or `-$1,234`.
fn dollars(value: Money) -> String {
    let formatted = format_whole_dollars(value);
    match formatted.strip_prefix('-') {
        Some(digits) => format!("-${digits}"),
        None => format!("${formatted}"),
    }
}

pub fn performance_summary(
    property_name: &str,
    variance: Option<&VarianceReport>,
    summary: &AnnualSummary,
) -> String {
    let Some(v) = variance else {
        return INSUFFICIENT_DATA.to_string();
    };
    let direction = if v.noi_variance_percent >= Decimal::ZERO {
        "above"
    } else {
        "below"
    };
    format!(
        "{property_name} is performing {:.1}% {direction} underwriting projections with annualized NOI of {} vs. projected {}. \
         Revenue is tracking at {} against a projection of {}. \
         Average occupancy for the period is {:.1}%.",
        v.noi_variance_percent.abs(),
        dollars(v.actual_noi),
        dollars(v.projected_noi),
        dollars(v.actual_revenue),
        dollars(v.projected_revenue),
        summary.average_occupancy,
    )
}

pub fn variance_narrative(variance: Option<&VarianceReport>) -> String {
    let Some(v) = variance else {
        return NO_VARIANCE_DATA.to_string();
    };
    let critical: Vec<&str> = v
        .items_at(VarianceSeverity::Critical)
        .map(|i| i.name.as_str())
        .collect();
    if critical.is_empty() {
        return ALL_WITHIN_THRESHOLDS.to_string();
    }
    format!(
        "Critical variances detected in: {}. Overall NOI variance is {:.1}% ({}).",
        critical.join(", "),
        v.noi_variance_percent,
        dollars(v.noi_variance)
    )
}

// ---------------------------------------------------------------------------
// Report assembly
// ---------------------------------------------------------------------------

/// Build a report for `period`. Variance runs over the trailing twelve months
/// of `actuals`; occupancy comes from the calendar year of the period.
pub fn build_asset_report(
    projection: &CalculationResult,
    actuals: &[MonthlyActual],
    period: ReportingPeriod,
    property_name: &str,
    allocation: &VarianceAllocation,
) -> AssetReport {
    let t12 = trailing_twelve(actuals);
    let variance = if t12.is_empty() {
        None
    } else {
        Some(calculate_variance(projection, &t12, allocation))
    };
    let summary = annual_summary(actuals, period.year());

    let metrics = MetricsSnapshot {
        projected_noi: projection.net_operating_income,
        actual_noi: variance.as_ref().map(|v| v.actual_noi),
        noi_variance_percent: variance.as_ref().map(|v| v.noi_variance_percent),
        projected_revenue: projection.effective_gross_income,
        actual_revenue: variance.as_ref().map(|v| v.actual_revenue),
        projected_expenses: projection.operating_expenses,
        actual_expenses: variance.as_ref().map(|v| v.actual_expenses),
        average_occupancy: summary.average_occupancy,
    };

    debug!(
        "asset report {} {}: {} trailing months",
        projection.deal_id,
        period.label(),
        t12.len()
    );

    AssetReport {
        deal_id: projection.deal_id.clone(),
        property_name: property_name.to_string(),
        period,
        period_label: period.label(),
        period_start: period.start_date(),
        period_end: period.end_date(),
        months_in_period: actuals.iter().filter(|a| period.contains(a)).count() as u32,
        metrics,
        performance_summary: performance_summary(property_name, variance.as_ref(), &summary),
        variance_analysis: variance_narrative(variance.as_ref()),
        variance,
        annual_summary: summary,
    }
}

/// Asset report wrapped in the standard output envelope.
pub fn build_asset_report_output(
    request: &AssetReportRequest,
    defaults: &ProtocolDefaults,
) -> UnderwritingResult<ComputationOutput<AssetReport>> {
    let start = Instant::now();
    defaults.validate()?;
    request.period.validate()?;

    let report = build_asset_report(
        &request.projection,
        &request.actuals,
        request.period,
        &request.property_name,
        &defaults.variance_allocation,
    );

    let mut warnings: Vec<String> = Vec::new();
    if request.actuals.is_empty() {
        warnings.push("No monthly actuals supplied; narratives report insufficient data".into());
    } else if report.months_in_period == 0 {
        warnings.push(format!("No recorded months fall inside {}", report.period_label));
    }
    if request.property_name.trim().is_empty() {
        warnings.push("Property name is blank".into());
    }

    Ok(with_metadata(
        "Asset report (trailing-twelve variance, calendar-year occupancy, narrative summary)",
        request,
        warnings,
        start.elapsed().as_micros() as u64,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
