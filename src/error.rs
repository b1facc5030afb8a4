//! Error handling for the tally engine
//!
//! Every fallible operation in the crate returns [`TallyError`]. The variants
//! follow the failure taxonomy of the aggregation pipeline: only
//! [`TallyError::Parameter`] is fatal (it can only happen while building a
//! context at startup); everything else is local to a single submission or
//! request and never touches accumulator state.

use thiserror::Error;

/// Tally engine error
#[derive(Debug, Error)]
pub enum TallyError {
    /// Scheme parameters are unsafe or inconsistent
    #[error("invalid scheme parameters: {0}")]
    Parameter(String),

    /// Value cannot be represented under the configured scale and range
    #[error("value {value} is outside the representable range [-{max}, {max}]")]
    EncodingRange {
        /// Offending value
        value: f64,
        /// Largest magnitude a single submission may carry
        max: f64,
    },

    /// Ciphertext was produced under a different context, key, level or scale
    #[error("ciphertext is incompatible with the current context: {0}")]
    IncompatibleCiphertext(String),

    /// Ciphertext is structurally malformed or cannot be decrypted by this key
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Boundary encoding or decoding failed
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The accumulator reached the submission count its parameters were sized for
    #[error("noise budget exhausted after {count} submissions (limit {limit}); reset required")]
    NoiseBudgetExhausted {
        /// Submissions currently folded into the running sum
        count: u64,
        /// Configured `max_submissions`
        limit: u64,
    },
}

impl TallyError {
    /// Stable, machine-readable name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parameter(_) => "parameter",
            Self::EncodingRange { .. } => "encoding_range",
            Self::IncompatibleCiphertext(_) => "incompatible",
            Self::InvalidCiphertext(_) => "malformed",
            Self::Serialization(_) => "malformed",
            Self::NoiseBudgetExhausted { .. } => "capacity",
        }
    }
}

impl From<bincode::Error> for TallyError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for TallyError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Serialization(format!("base64: {}", err))
    }
}

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("json: {}", err))
    }
}

/// Result type for tally operations
pub type Result<T> = std::result::Result<T, TallyError>;

/// Create a `TallyError::Parameter` with format string support
macro_rules! param_err {
    ($($arg:tt)*) => {
        $crate::error::TallyError::Parameter(format!($($arg)*))
    };
}

/// Create a `TallyError::IncompatibleCiphertext` with format string support
macro_rules! incompatible {
    ($($arg:tt)*) => {
        $crate::error::TallyError::IncompatibleCiphertext(format!($($arg)*))
    };
}

/// Create a `TallyError::InvalidCiphertext` with format string support
macro_rules! invalid_ct {
    ($($arg:tt)*) => {
        $crate::error::TallyError::InvalidCiphertext(format!($($arg)*))
    };
}

pub(crate) use incompatible;
pub(crate) use invalid_ct;
pub(crate) use param_err;
