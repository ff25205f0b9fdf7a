//! # geometry
//!
//! Geometric operations for detection evaluation.

/// Geometric algorithms for cuboids.
pub mod polytope;
/// Special Orthogonal Group 3.
pub mod so3;
