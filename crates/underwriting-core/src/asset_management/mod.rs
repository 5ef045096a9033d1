//! Post-close asset management: recorded monthly actuals, variance against
//! the underwriting projection, periodic asset reports and disposition value.

pub mod actuals;
pub mod disposition;
pub mod reporting;
pub mod variance;
