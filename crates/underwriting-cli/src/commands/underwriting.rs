use clap::Args;
use serde_json::Value;

use underwriting_core::financing::sizing::{self, LoanSizingInput};
use underwriting_core::income::revenue::{self, RevenueInput};
use underwriting_core::sensitivity::{self, SensitivityInput};
use underwriting_core::underwriting::{self, CalculationInputs};
use underwriting_core::ProtocolDefaults;

use crate::input;

/// Arguments for a full underwriting run
#[derive(Args)]
pub struct UnderwriteArgs {
    /// Path to JSON deal inputs
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the rent-roll to NOI pipeline
#[derive(Args)]
pub struct RevenueArgs {
    /// Path to JSON rent-roll inputs
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for loan sizing
#[derive(Args)]
pub struct SizeLoanArgs {
    /// Path to JSON sizing inputs
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the stress scenarios
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON sensitivity inputs
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_underwrite(
    args: UnderwriteArgs,
    defaults: &ProtocolDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let deal: CalculationInputs = input::read_input(args.input.as_deref(), "underwriting")?;
    let result = underwriting::underwrite(&deal, defaults)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_revenue(
    args: RevenueArgs,
    defaults: &ProtocolDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let rev_input: RevenueInput = input::read_input(args.input.as_deref(), "revenue analysis")?;
    let result = revenue::analyze_revenue(&rev_input, defaults)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_size_loan(args: SizeLoanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sizing_input: LoanSizingInput = input::read_input(args.input.as_deref(), "loan sizing")?;
    let result = sizing::size_loan(&sizing_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_sensitivity(
    args: SensitivityArgs,
    defaults: &ProtocolDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let sens_input: SensitivityInput =
        input::read_input(args.input.as_deref(), "sensitivity analysis")?;
    let result = sensitivity::run_sensitivity(&sens_input, defaults)?;
    Ok(serde_json::to_value(result)?)
}
