//! # cuboid
//!
//! Cuboid records consumed and produced by the detection evaluation.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::geometry::so3::_yaw_to_quat;

/// Log id and nanosecond timestamp (unique sweep identifier).
pub type SweepUuid = (String, u64);

/// Oriented 3D bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    /// Center (x,y,z) in meters.
    pub xyz_m: [f32; 3],
    /// Extent (length, width, height) in meters.
    pub lwh_m: [f32; 3],
    /// Scalar-first unit quaternion.
    pub quat_wxyz: [f32; 4],
}

impl Cuboid {
    /// Construct a cuboid from its center, extent, and orientation.
    pub fn new(xyz_m: [f32; 3], lwh_m: [f32; 3], quat_wxyz: [f32; 4]) -> Self {
        Self {
            xyz_m,
            lwh_m,
            quat_wxyz,
        }
    }

    /// Construct a cuboid rotated by `yaw_rad` about the +z axis.
    pub fn from_yaw(xyz_m: [f32; 3], lwh_m: [f32; 3], yaw_rad: f32) -> Self {
        Self::new(xyz_m, lwh_m, _yaw_to_quat(yaw_rad))
    }

    /// Construct a cuboid from its ordered parameters.
    /// tx_m, ty_m, tz_m, length_m, width_m, height_m, qw, qx, qy, qz.
    pub fn from_params(params: &ArrayView1<f32>) -> Self {
        Self {
            xyz_m: [params[0], params[1], params[2]],
            lwh_m: [params[3], params[4], params[5]],
            quat_wxyz: [params[6], params[7], params[8], params[9]],
        }
    }

    /// Ordered parameters (see `from_params`).
    pub fn params(&self) -> [f32; 10] {
        let [tx, ty, tz] = self.xyz_m;
        let [l, w, h] = self.lwh_m;
        let [qw, qx, qy, qz] = self.quat_wxyz;
        [tx, ty, tz, l, w, h, qw, qx, qy, qz]
    }

    /// Check that the cuboid is geometrically well-formed.
    pub fn check(&self) -> Result<(), String> {
        if !self.params().iter().all(|x| x.is_finite()) {
            return Err(format!("non-finite cuboid parameters {:?}", self.params()));
        }
        if self.lwh_m.iter().any(|x| *x < 0.0) {
            return Err(format!("negative extent {:?}", self.lwh_m));
        }
        if self.quat_wxyz.iter().all(|x| *x == 0.0) {
            return Err("zero quaternion".to_string());
        }
        Ok(())
    }
}

/// A predicted cuboid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Log identifier.
    pub log_id: String,
    /// Sweep nanosecond timestamp.
    pub timestamp_ns: u64,
    /// Object category.
    pub category: String,
    /// Predicted geometry.
    pub cuboid: Cuboid,
    /// Detection confidence in [0, 1].
    pub score: f32,
    /// Upstream evaluation flag. Combined with the range and rank filters.
    pub is_evaluated: bool,
}

impl Detection {
    /// Construct an evaluated detection.
    pub fn new(
        sweep_uuid: &SweepUuid,
        category: impl Into<String>,
        cuboid: Cuboid,
        score: f32,
    ) -> Self {
        Self {
            log_id: sweep_uuid.0.clone(),
            timestamp_ns: sweep_uuid.1,
            category: category.into(),
            cuboid,
            score,
            is_evaluated: true,
        }
    }

    /// Sweep the detection belongs to.
    pub fn sweep_uuid(&self) -> SweepUuid {
        (self.log_id.clone(), self.timestamp_ns)
    }
}

/// An annotated (ground truth) cuboid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Log identifier.
    pub log_id: String,
    /// Sweep nanosecond timestamp.
    pub timestamp_ns: u64,
    /// Object category.
    pub category: String,
    /// Annotated geometry.
    pub cuboid: Cuboid,
    /// Track identifier. Passed through untouched.
    pub track_uuid: Option<String>,
    /// Number of lidar points interior to the cuboid, if known.
    pub num_interior_pts: Option<u64>,
    /// External region-of-interest / range filter result.
    pub is_evaluated: bool,
}

impl GroundTruth {
    /// Construct an evaluated ground truth annotation.
    pub fn new(sweep_uuid: &SweepUuid, category: impl Into<String>, cuboid: Cuboid) -> Self {
        Self {
            log_id: sweep_uuid.0.clone(),
            timestamp_ns: sweep_uuid.1,
            category: category.into(),
            cuboid,
            track_uuid: None,
            num_interior_pts: None,
            is_evaluated: true,
        }
    }

    /// Sweep the annotation belongs to.
    pub fn sweep_uuid(&self) -> SweepUuid {
        (self.log_id.clone(), self.timestamp_ns)
    }
}

/// True positive errors of a detection.
/// Non-true-positives carry the maximal (normalization) errors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TruePositiveErrors {
    /// Center distance (m).
    pub translation_m: f32,
    /// 1 - aligned IoU.
    pub scale: f32,
    /// Absolute heading difference (rad).
    pub orientation_rad: f32,
}

impl TruePositiveErrors {
    /// Errors as an ordered array (ATE, ASE, AOE).
    pub fn to_array(&self) -> [f32; 3] {
        [self.translation_m, self.scale, self.orientation_rad]
    }
}

/// A detection annotated with its assignment results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedDetection {
    /// Input detection.
    pub detection: Detection,
    /// Whether the detection participates in the evaluation.
    pub is_evaluated: bool,
    /// True positive flag for each affinity threshold.
    pub is_tp: Vec<bool>,
    /// Errors at the true positive threshold.
    pub errors: TruePositiveErrors,
}

/// A ground truth annotated with its assignment results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedGroundTruth {
    /// Input annotation.
    pub ground_truth: GroundTruth,
    /// Whether the annotation participates in the evaluation.
    pub is_evaluated: bool,
    /// Matched flag for each affinity threshold.
    pub is_matched: Vec<bool>,
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, ArrayView1};

    use crate::geometry::so3::_quat_to_yaw;

    use super::Cuboid;

    #[test]
    fn test_params_round_trip() {
        let cuboid = Cuboid::from_yaw([1.0, 2.0, 3.0], [4.0, 2.0, 1.5], PI / 3.0);
        let params = Array1::from_vec(cuboid.params().to_vec());
        assert_eq!(Cuboid::from_params(&params.view()), cuboid);
        let yaw_rad = _quat_to_yaw(&ArrayView1::from(&cuboid.quat_wxyz));
        assert_abs_diff_eq!(yaw_rad, PI / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_check() {
        let cuboid = Cuboid::from_yaw([0.0; 3], [1.0; 3], 0.0);
        assert!(cuboid.check().is_ok());
        assert!(Cuboid { lwh_m: [-1.0, 1.0, 1.0], ..cuboid }.check().is_err());
        assert!(Cuboid { xyz_m: [f32::NAN, 0.0, 0.0], ..cuboid }.check().is_err());
        assert!(Cuboid { quat_wxyz: [0.0; 4], ..cuboid }.check().is_err());
    }
}
