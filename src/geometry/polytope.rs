//! # polytope
//!
//! Geometric algorithms for cuboid geometries.

use ndarray::{par_azip, Array, ArrayView, Ix1, Ix2};

/// Volume of a cuboid with extent `lwh_m`.
pub fn cuboid_volume(lwh_m: &[f32; 3]) -> f32 {
    lwh_m.iter().product()
}

/// Intersection over union of two cuboids after aligning them at a common pose.
/// Only the extents (length, width, height) contribute to the overlap.
pub fn iou_3d_axis_aligned(lwh_a_m: &[f32; 3], lwh_b_m: &[f32; 3]) -> f32 {
    let intersection: f32 = lwh_a_m
        .iter()
        .zip(lwh_b_m)
        .map(|(a, b)| a.min(*b))
        .product();
    let union = cuboid_volume(lwh_a_m) + cuboid_volume(lwh_b_m) - intersection;

    // Degenerate (zero-volume) boxes have no overlap.
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// Pairwise aligned IoU for (N,3) extents.
/// Parallelized for batch processing.
pub fn iou_3d_axis_aligned_batch(
    lwh_a_m: &ArrayView<f32, Ix2>,
    lwh_b_m: &ArrayView<f32, Ix2>,
) -> Array<f32, Ix1> {
    let num_cuboids = lwh_a_m.shape()[0];
    let mut ious = Array::<f32, Ix1>::zeros(num_cuboids);
    par_azip!((iou in &mut ious, a in lwh_a_m.outer_iter(), b in lwh_b_m.outer_iter()) {
        *iou = iou_3d_axis_aligned(&[a[0], a[1], a[2]], &[b[0], b[1], b[2]]);
    });
    ious
}
