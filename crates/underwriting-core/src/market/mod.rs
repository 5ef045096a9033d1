//! Market-side supplements: sales-comparable adjustments and HUD AMI
//! affordability tiers.

pub mod affordability;
pub mod comps;
