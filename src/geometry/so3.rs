//! # SO(3)
//!
//! Special Orthogonal Group 3 (SO(3)).

use std::f32::consts::{PI, TAU};

use ndarray::{par_azip, Array, ArrayView, Ix1, Ix2};

/// Convert a scalar-first quaternion to yaw.
/// In the Argoverse 2 coordinate system, this is counter-clockwise rotation about the +z axis.
/// Parallelized for batch processing.
pub fn quat_to_yaw(quat_wxyz: &ArrayView<f32, Ix2>) -> Array<f32, Ix1> {
    let num_quats = quat_wxyz.shape()[0];
    let mut yaws_rad = Array::<f32, Ix1>::zeros(num_quats);
    par_azip!((y in &mut yaws_rad, q in quat_wxyz.outer_iter()) {
        *y = _quat_to_yaw(&q);
    });
    yaws_rad
}

/// Convert a scalar-first quaternion to yaw.
/// In the Argoverse 2 coordinate system, this is counter-clockwise rotation about the +z axis.
pub fn _quat_to_yaw(quat_wxyz: &ArrayView<f32, Ix1>) -> f32 {
    let (qw, qx, qy, qz) = (quat_wxyz[0], quat_wxyz[1], quat_wxyz[2], quat_wxyz[3]);
    let siny_cosp = 2. * (qw * qz + qx * qy);
    let cosy_cosp = 1. - 2. * (qy * qy + qz * qz);
    siny_cosp.atan2(cosy_cosp)
}

/// Convert rotation about the z-axis to a scalar-first quaternion.
pub fn _yaw_to_quat(yaw_rad: f32) -> [f32; 4] {
    let qw = f32::cos(0.5 * yaw_rad);
    let qz = f32::sin(0.5 * yaw_rad);
    [qw, 0.0, 0.0, qz]
}

/// Smallest absolute angle between two headings.
/// The result always lies in [0, π].
pub fn angular_distance(yaw_a_rad: f32, yaw_b_rad: f32) -> f32 {
    let angle_rad = (yaw_a_rad - yaw_b_rad).abs() % TAU;
    if angle_rad > PI {
        TAU - angle_rad
    } else {
        angle_rad
    }
}
