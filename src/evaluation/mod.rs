//! # evaluation
//!
//! Evaluation of perception tasks.

/// 3D object detection evaluation.
pub mod detection;
