pub mod compliance;
pub mod config;
pub mod error;
pub mod financing;
pub mod income;
pub mod projection;
pub mod risk;
pub mod sensitivity;
pub mod types;
pub mod underwriting;

#[cfg(feature = "asset_management")]
pub mod asset_management;

#[cfg(feature = "market")]
pub mod market;

pub use config::ProtocolDefaults;
pub use error::UnderwritingError;
pub use types::*;

/// Standard result type for all underwriting operations
pub type UnderwritingResult<T> = Result<T, UnderwritingError>;
