mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::debug;
use std::process;

use commands::asset_management::{DispositionArgs, ReportArgs, VarianceArgs};
use commands::compliance::{ComplianceArgs, ProductsArgs, RiskArgs};
use commands::market::{AffordabilityArgs, CompsArgs};
use commands::underwriting::{RevenueArgs, SensitivityArgs, SizeLoanArgs, UnderwriteArgs};

/// Multifamily underwriting and agency compliance
#[derive(Parser)]
#[command(
    name = "uwx",
    version,
    about = "Multifamily underwriting and agency compliance calculations",
    long_about = "A CLI for underwriting multifamily acquisitions with decimal precision. \
                  Runs the revenue-to-NOI pipeline, debt sizing, hold-period returns, \
                  stress scenarios, Fannie Mae and Freddie Mac product compliance, \
                  asset-management variance and reporting, and market analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Protocol defaults override (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full deal underwriting: NOI, debt, returns, projection, compliance
    Underwrite(UnderwriteArgs),
    /// Rent roll to NOI
    Revenue(RevenueArgs),
    /// Size the maximum loan under LTV and DSCR constraints
    SizeLoan(SizeLoanArgs),
    /// Base, income, occupancy and exit cap stress scenarios
    Sensitivity(SensitivityArgs),
    /// Test a deal against a Fannie Mae or Freddie Mac product
    Compliance(ComplianceArgs),
    /// Rate product and market risks
    Risk(RiskArgs),
    /// List agency product profiles
    Products(ProductsArgs),
    /// Compare monthly actuals against the underwriting projection
    Variance(VarianceArgs),
    /// Monthly, quarterly or annual asset report
    Report(ReportArgs),
    /// Sell, hold and refinance comparison
    Disposition(DispositionArgs),
    /// HUD AMI affordability tiers for a rent
    Affordability(AffordabilityArgs),
    /// Reconcile adjusted sales comparables
    Comps(CompsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("uwx {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = run(cli.command, cli.config.as_deref());

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run(command: Commands, config: Option<&str>) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let defaults = input::config::load_defaults(config)?;
    debug!("running with defaults from {}", config.unwrap_or("built-ins"));

    match command {
        Commands::Underwrite(args) => commands::underwriting::run_underwrite(args, &defaults),
        Commands::Revenue(args) => commands::underwriting::run_revenue(args, &defaults),
        Commands::SizeLoan(args) => commands::underwriting::run_size_loan(args),
        Commands::Sensitivity(args) => commands::underwriting::run_sensitivity(args, &defaults),
        Commands::Compliance(args) => commands::compliance::run_compliance(args),
        Commands::Risk(args) => commands::compliance::run_risk(args),
        Commands::Products(args) => commands::compliance::run_products(args),
        Commands::Variance(args) => commands::asset_management::run_variance(args, &defaults),
        Commands::Report(args) => commands::asset_management::run_report(args, &defaults),
        Commands::Disposition(args) => commands::asset_management::run_disposition(args),
        Commands::Affordability(args) => commands::market::run_affordability(args),
        Commands::Comps(args) => commands::market::run_comps(args),
        Commands::Version => Ok(serde_json::Value::Null),
    }
}
