pub mod debt;
pub mod sizing;
