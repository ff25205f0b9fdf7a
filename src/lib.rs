//! # av2_detection_eval
//!
//! Argoverse 2 3D object detection evaluation.

#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod evaluation;
pub mod frame_utils;
pub mod geometry;
pub mod io;
pub mod structures;

pub use error::{EvalError, Result};
pub use evaluation::detection::cfg::DetectionCfg;
pub use evaluation::detection::eval::{evaluate, evaluate_frames, summarize_metrics};
pub use evaluation::detection::summary::{DetectionMetrics, Summary};
