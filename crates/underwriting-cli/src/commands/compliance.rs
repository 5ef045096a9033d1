use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use underwriting_core::compliance::fannie::FannieProduct;
use underwriting_core::compliance::freddie::FreddieProduct;
use underwriting_core::compliance::{self, ComplianceRequest, RiskAssessmentRequest};

use crate::input;

/// Arguments for agency compliance testing
#[derive(Args)]
pub struct ComplianceArgs {
    /// Path to JSON compliance request (selection + deal metrics)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for product and market risk ratings
#[derive(Args)]
pub struct RiskArgs {
    /// Path to JSON risk request (selection + deal metrics + optional market signals)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Agency {
    Fannie,
    Freddie,
}

/// Arguments for listing product profiles
#[derive(Args)]
pub struct ProductsArgs {
    /// Limit the listing to one agency
    #[arg(long)]
    pub agency: Option<Agency>,
}

pub fn run_compliance(args: ComplianceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ComplianceRequest = input::read_input(args.input.as_deref(), "compliance testing")?;
    let result = compliance::evaluate_compliance(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_risk(args: RiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: RiskAssessmentRequest = input::read_input(args.input.as_deref(), "risk assessment")?;
    let result = compliance::assess_risk(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_products(args: ProductsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut rows: Vec<Value> = Vec::new();

    if !matches!(args.agency, Some(Agency::Freddie)) {
        for product in FannieProduct::ALL {
            let p = product.profile();
            rows.push(json!({
                "agency": "fannie",
                "product": product,
                "display_name": p.display_name,
                "max_ltv_percent": p.max_ltv_percent,
                "min_dscr": p.min_dscr,
                "max_amortization_years": p.max_amortization_years,
            }));
        }
    }
    if !matches!(args.agency, Some(Agency::Fannie)) {
        for product in FreddieProduct::ALL {
            let p = product.profile();
            rows.push(json!({
                "agency": "freddie",
                "product": product,
                "display_name": p.display_name,
                "max_ltv_percent": p.max_ltv_percent,
                "min_dscr": p.min_dscr,
                "max_amortization_years": p.max_amortization_years,
            }));
        }
    }

    Ok(Value::Array(rows))
}
