//! # structures
//!
//! Records exchanged with the evaluation.

/// Cuboid, detection, and annotation records.
pub mod cuboid;
