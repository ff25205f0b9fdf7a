//! # error
//!
//! Error types for the detection evaluation.

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::structures::cuboid::SweepUuid;

/// Detection evaluation error.
#[derive(Error, Debug)]
pub enum EvalError {
    /// The evaluation configuration is malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required column is absent from an input table.
    #[error("Missing column `{0}`.")]
    MissingColumn(String),

    /// A column cannot be interpreted with the expected type.
    #[error("Column `{column}` has an unexpected type: {source}")]
    ColumnType {
        /// Offending column name.
        column: String,
        /// Underlying cast error.
        source: PolarsError,
    },

    /// A required column contains null values.
    #[error("Column `{0}` contains null values.")]
    NullValue(String),

    /// A sweep failed integrity checks. The whole evaluation is aborted.
    #[error("Sweep ({log_id}, {timestamp_ns}) is invalid: {reason}")]
    InvalidSweep {
        /// Log identifier of the sweep.
        log_id: String,
        /// Nanosecond timestamp of the sweep.
        timestamp_ns: u64,
        /// Description of the violation.
        reason: String,
    },

    /// Data-frame error.
    #[error(transparent)]
    Polars(#[from] PolarsError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    /// Build an `InvalidSweep` error for the sweep `(log_id, timestamp_ns)`.
    pub fn invalid_sweep(sweep_uuid: &SweepUuid, reason: impl Into<String>) -> Self {
        EvalError::InvalidSweep {
            log_id: sweep_uuid.0.clone(),
            timestamp_ns: sweep_uuid.1,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EvalError>;
