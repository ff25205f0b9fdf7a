//! # detection
//!
//! 3D object detection evaluation.

/// Evaluation configuration.
pub mod cfg;
/// Detection evaluation constants.
pub mod constants;
/// Evaluation entry points.
pub mod eval;
/// Summary metrics.
pub mod summary;
/// Assignment, error, and average precision utilities.
pub mod utils;
