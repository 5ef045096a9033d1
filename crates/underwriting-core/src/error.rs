use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnderwritingError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Out of range: {field} = {value} (expected {min}..={max})")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl UnderwritingError {
    /// Shorthand for the discrete-range checks on months, quarters and years.
    pub fn out_of_range(field: &str, value: i64, min: i64, max: i64) -> Self {
        UnderwritingError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        }
    }
}

impl From<serde_json::Error> for UnderwritingError {
    fn from(e: serde_json::Error) -> Self {
        UnderwritingError::SerializationError(e.to_string())
    }
}
