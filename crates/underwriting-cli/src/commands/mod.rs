pub mod asset_management;
pub mod compliance;
pub mod market;
pub mod underwriting;
