use clap::Args;
use serde_json::Value;

use underwriting_core::asset_management::disposition::{self, DispositionInput};
use underwriting_core::asset_management::reporting::{self, AssetReportRequest};
use underwriting_core::asset_management::variance::{self, VarianceRequest};
use underwriting_core::ProtocolDefaults;

use crate::input;

/// Arguments for projection-vs-actuals variance
#[derive(Args)]
pub struct VarianceArgs {
    /// Path to JSON variance request (projection + monthly actuals)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for asset report generation
#[derive(Args)]
pub struct ReportArgs {
    /// Path to JSON report request (property, period, projection, actuals)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the sell / hold / refinance review
#[derive(Args)]
pub struct DispositionArgs {
    /// Path to JSON disposition inputs
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_variance(
    args: VarianceArgs,
    defaults: &ProtocolDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: VarianceRequest = input::read_input(args.input.as_deref(), "variance analysis")?;
    let result = variance::analyze_variance(&request, defaults)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_report(
    args: ReportArgs,
    defaults: &ProtocolDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: AssetReportRequest = input::read_input(args.input.as_deref(), "asset reports")?;
    let result = reporting::build_asset_report_output(&request, defaults)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_disposition(args: DispositionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let disp_input: DispositionInput =
        input::read_input(args.input.as_deref(), "disposition analysis")?;
    let result = disposition::analyze_disposition(&disp_input)?;
    Ok(serde_json::to_value(result)?)
}
