use clap::Args;
use serde_json::Value;

use underwriting_core::market::affordability::{self, AffordabilityInput};
use underwriting_core::market::comps::{self, CompsRequest};

use crate::input;

/// Arguments for HUD AMI affordability
#[derive(Args)]
pub struct AffordabilityArgs {
    /// Path to JSON affordability inputs (rent, income limits, household size)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for sales comparable reconciliation
#[derive(Args)]
pub struct CompsArgs {
    /// Path to JSON comp set
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_affordability(args: AffordabilityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let aff_input: AffordabilityInput =
        input::read_input(args.input.as_deref(), "affordability analysis")?;
    let result = affordability::analyze_affordability(&aff_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_comps(args: CompsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: CompsRequest = input::read_input(args.input.as_deref(), "comparable sales")?;
    let result = comps::analyze_comps(&request)?;
    Ok(serde_json::to_value(result)?)
}
