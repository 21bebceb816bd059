use thiserror::Error;

#[derive(Error, Debug)]
pub enum PTAError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A lognormal parameter was given a non-positive arithmetic mean.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Elimination rate constant (or another PK quantity) is non-physical.
    #[error("Invalid PK parameter: {0}")]
    InvalidPKParameter(String),

    #[error("MIC {mic} mg/L is weighted by the MIC distribution but absent from the PTA row")]
    MismatchedMICSet { mic: f64 },

    #[error("Malformed MIC distribution: {0}")]
    MalformedDistribution(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Cannot parse {what} from '{input}'")]
    Parse { what: &'static str, input: String },

    #[error("Non-finite {quantity} encountered: {value}")]
    NonFinite { quantity: &'static str, value: f64 },

    #[error("Chart rendering error: {0}")]
    Plot(String),

    #[error("Random number generation error")]
    Random,
}

impl PTAError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        PTAError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type PTAResult<T> = Result<T, PTAError>;

/// Rejects NaN and infinities before they reach an export.
pub fn ensure_finite(quantity: &'static str, value: f64) -> PTAResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PTAError::NonFinite { quantity, value })
    }
}
