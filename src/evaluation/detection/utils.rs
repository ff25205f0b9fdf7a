//! Detection evaluation utilities.
//!
//! Assignment of detections to ground truth annotations, true positive errors, and
//! average precision.

use std::collections::BTreeMap;

use itertools::Itertools;
use ndarray::{azip, par_azip, s, Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::{
    error::{EvalError, Result},
    geometry::{
        polytope::iou_3d_axis_aligned_batch,
        so3::{angular_distance, quat_to_yaw},
    },
    structures::cuboid::{
        AnnotatedDetection, AnnotatedGroundTruth, Cuboid, Detection, GroundTruth, SweepUuid,
        TruePositiveErrors,
    },
};

use super::{
    cfg::DetectionCfg,
    constants::{AffinityType, DistanceType, FilterMetricType, NUM_TP_ERRORS},
};

/// Compute pairwise Euclidean distance between two sets of points.
pub fn cdist(x1: &ArrayView2<f32>, x2: &ArrayView2<f32>) -> Array2<f32> {
    let n = x1.shape()[0];
    let m = x2.shape()[0];
    let mut dists = Array2::<f32>::zeros([n, m]);
    par_azip!((mut d_i in dists.rows_mut(), x_i in x1.rows()) {
        azip!((d_ij in &mut d_i, x_j in x2.rows()) {
            *d_ij = (&x_i - &x_j).mapv(|x| x * x).sum().sqrt();
        });
    });
    dists
}

/// Calculate the affinity matrix between detections and ground truth annotations.
/// Inputs are (N,3) and (M,3) cuboid centers. Larger affinity means a closer pair.
pub fn compute_affinity_matrix(
    dts: &ArrayView2<f32>,
    gts: &ArrayView2<f32>,
    metric: AffinityType,
) -> Array2<f32> {
    match metric {
        AffinityType::Center => {
            let dts_xy_m = dts.slice(s![.., ..2]);
            let gts_xy_m = gts.slice(s![.., ..2]);
            -cdist(&dts_xy_m, &gts_xy_m)
        }
    }
}

/// Distance between paired (K,10) detection and ground truth cuboids.
pub fn distance(dts: &ArrayView2<f32>, gts: &ArrayView2<f32>, metric: DistanceType) -> Array1<f32> {
    match metric {
        DistanceType::Translation => {
            let mut translation_errors = Array1::<f32>::zeros(dts.shape()[0]);
            par_azip!((e in &mut translation_errors, dt in dts.outer_iter(), gt in gts.outer_iter()) {
                *e = (&dt.slice(s![..3]) - &gt.slice(s![..3])).mapv(|x| x * x).sum().sqrt();
            });
            translation_errors
        }
        DistanceType::Scale => {
            let ious = iou_3d_axis_aligned_batch(&dts.slice(s![.., 3..6]), &gts.slice(s![.., 3..6]));
            1.0 - ious
        }
        DistanceType::Orientation => {
            let yaws_dts = quat_to_yaw(&dts.slice(s![.., 6..10]));
            let yaws_gts = quat_to_yaw(&gts.slice(s![.., 6..10]));
            let mut orientation_errors = Array1::<f32>::zeros(dts.shape()[0]);
            par_azip!((e in &mut orientation_errors, a in &yaws_dts, b in &yaws_gts) {
                *e = angular_distance(*a, *b);
            });
            orientation_errors
        }
    }
}

/// Stack cuboids into an (N,10) array of ordered parameters.
pub fn cuboids_to_ndarray<'a>(cuboids: impl IntoIterator<Item = &'a Cuboid>) -> Array2<f32> {
    let params = cuboids.into_iter().map(|c| c.params()).collect_vec();
    Array2::from_shape_fn((params.len(), 10), |(i, j)| params[i][j])
}

/// Result of assigning the detections of one category to its ground truth annotations.
#[derive(Clone, Debug)]
pub struct Assignment {
    /// (N,T) true positive flags for every affinity threshold.
    pub dts_is_tp: Array2<bool>,
    /// (M,T) matched flags for every affinity threshold.
    pub gts_is_matched: Array2<bool>,
    /// (N,3) true positive errors. Non-true-positives keep the normalization terms.
    pub dts_errors: Array2<f32>,
}

/// Attempt assignment of each detection to a ground truth label.
///
/// The detections (dts) and ground truth annotations (gts) are expected to be shape (N,10)
/// and (M,10) respectively, share a single category, and the detections must already be sorted
/// by descending score. Their _ordered_ columns are:
/// tx_m, ty_m, tz_m, length_m, width_m, height_m, qw, qx, qy, qz.
///
/// Every threshold is matched independently and greedily: in score order, each detection takes
/// the unmatched annotation with the largest affinity, and is a true positive when the center
/// distance is within the threshold. A ground truth is never matched twice at one threshold.
pub fn assign(dts: &ArrayView2<f32>, gts: &ArrayView2<f32>, cfg: &DetectionCfg) -> Assignment {
    let num_dts = dts.shape()[0];
    let num_gts = gts.shape()[0];
    let num_thresholds = cfg.affinity_thresholds_m.len();
    let tp_threshold_index = cfg.tp_threshold_index();
    let normalization_terms = cfg.normalization_terms();

    let affinity_matrix = compute_affinity_matrix(
        &dts.slice(s![.., ..3]),
        &gts.slice(s![.., ..3]),
        cfg.affinity_type,
    );

    let mut dts_is_tp = Array2::from_elem((num_dts, num_thresholds), false);
    let mut gts_is_matched = Array2::from_elem((num_gts, num_thresholds), false);
    let mut dts_errors =
        Array2::from_shape_fn((num_dts, NUM_TP_ERRORS), |(_, j)| normalization_terms[j]);

    let mut tp_pairs = Vec::new();
    for (t, threshold_m) in cfg.affinity_thresholds_m.iter().enumerate() {
        let mut is_matched = vec![false; num_gts];
        for (i, affinities) in affinity_matrix.outer_iter().enumerate() {
            // Ties resolve to the lowest annotation index.
            let best = affinities
                .iter()
                .enumerate()
                .filter(|(j, _)| !is_matched[*j])
                .fold(None, |best: Option<(usize, f32)>, (j, affinity)| match best {
                    Some((_, max_affinity)) if max_affinity >= *affinity => best,
                    _ => Some((j, *affinity)),
                });

            if let Some((j, affinity)) = best {
                if -affinity <= *threshold_m {
                    is_matched[j] = true;
                    dts_is_tp[[i, t]] = true;
                    gts_is_matched[[j, t]] = true;
                    if t == tp_threshold_index {
                        tp_pairs.push((i, j));
                    }
                }
            }
        }
    }

    if !tp_pairs.is_empty() {
        let (idx_dts, idx_gts): (Vec<_>, Vec<_>) = tp_pairs.into_iter().unzip();
        let dts_tp = dts.select(Axis(0), &idx_dts);
        let gts_tp = gts.select(Axis(0), &idx_gts);

        let translation_errors = distance(&dts_tp.view(), &gts_tp.view(), DistanceType::Translation);
        let scale_errors = distance(&dts_tp.view(), &gts_tp.view(), DistanceType::Scale);
        let orientation_errors =
            distance(&dts_tp.view(), &gts_tp.view(), DistanceType::Orientation);

        for (k, i) in idx_dts.into_iter().enumerate() {
            dts_errors[[i, 0]] = translation_errors[k];
            dts_errors[[i, 1]] = scale_errors[k];
            dts_errors[[i, 2]] = orientation_errors[k];
        }
    }

    Assignment {
        dts_is_tp,
        gts_is_matched,
        dts_errors,
    }
}

/// Compute the range of (N,3) centers under the configured filter metric.
fn compute_ranges_m(xyz_m: &ArrayView2<f32>, cfg: &DetectionCfg) -> Array1<f32> {
    match cfg.filter_metric {
        FilterMetricType::Euclidean => xyz_m.map_axis(Axis(1), |x| x.dot(&x).sqrt()),
    }
}

/// Compute the evaluated detections mask for a single category.
///
/// The (N,3) centers must be sorted by descending score. A detection is evaluated when it passed
/// the upstream filter, lies within `max_range_m`, and is among the first
/// `max_num_dts_per_category` such detections.
pub fn compute_evaluated_dts_mask(
    xyz_m: &ArrayView2<f32>,
    is_upstream_evaluated: &ArrayView1<bool>,
    cfg: &DetectionCfg,
) -> Array1<bool> {
    let ranges_m = compute_ranges_m(xyz_m, cfg);
    let mut num_evaluated = 0;
    let mut is_evaluated = Array1::from_elem(ranges_m.len(), false);
    azip!((e in &mut is_evaluated, r in &ranges_m, u in is_upstream_evaluated) {
        if *u && *r < cfg.max_range_m && num_evaluated < cfg.max_num_dts_per_category {
            num_evaluated += 1;
            *e = true;
        }
    });
    is_evaluated
}

/// Compute the evaluated ground truth mask.
///
/// An annotation is evaluated when the external filter kept it, it lies within `max_range_m`,
/// and it contains at least one lidar point (when the point count is known).
pub fn compute_evaluated_gts_mask(
    xyz_m: &ArrayView2<f32>,
    num_interior_pts: &[Option<u64>],
    is_externally_evaluated: &ArrayView1<bool>,
    cfg: &DetectionCfg,
) -> Array1<bool> {
    let ranges_m = compute_ranges_m(xyz_m, cfg);
    let mut is_evaluated = Array1::from_elem(ranges_m.len(), false);
    azip!((index i, e in &mut is_evaluated, r in &ranges_m, x in is_externally_evaluated) {
        let has_points = num_interior_pts[i].map_or(true, |n| n > 0);
        *e = *x && *r < cfg.max_range_m && has_points;
    });
    is_evaluated
}

/// Check the integrity of a sweep's records.
fn check_sweep(
    sweep_uuid: &SweepUuid,
    dts: &[Detection],
    gts: &[GroundTruth],
) -> Result<()> {
    for dt in dts {
        if dt.sweep_uuid() != *sweep_uuid {
            return Err(EvalError::invalid_sweep(
                sweep_uuid,
                format!("detection belongs to sweep {:?}", dt.sweep_uuid()),
            ));
        }
        dt.cuboid
            .check()
            .map_err(|reason| EvalError::invalid_sweep(sweep_uuid, reason))?;
        if !(0.0..=1.0).contains(&dt.score) {
            return Err(EvalError::invalid_sweep(
                sweep_uuid,
                format!("detection score {} outside [0, 1]", dt.score),
            ));
        }
    }
    for gt in gts {
        if gt.sweep_uuid() != *sweep_uuid {
            return Err(EvalError::invalid_sweep(
                sweep_uuid,
                format!("annotation belongs to sweep {:?}", gt.sweep_uuid()),
            ));
        }
        gt.cuboid
            .check()
            .map_err(|reason| EvalError::invalid_sweep(sweep_uuid, reason))?;
    }
    Ok(())
}

/// Accumulate the true / false positives (boolean flags) and true positive errors for each class.
///
/// All detections and annotations must belong to the same sweep. Outputs keep the input order.
pub fn accumulate(
    dts: &[Detection],
    gts: &[GroundTruth],
    cfg: &DetectionCfg,
) -> Result<(Vec<AnnotatedDetection>, Vec<AnnotatedGroundTruth>)> {
    let sweep_uuid = match (dts.first(), gts.first()) {
        (_, Some(gt)) => gt.sweep_uuid(),
        (Some(dt), None) => dt.sweep_uuid(),
        (None, None) => return Ok((vec![], vec![])),
    };
    check_sweep(&sweep_uuid, dts, gts)?;

    let num_thresholds = cfg.affinity_thresholds_m.len();
    let [ate, ase, aoe] = cfg.normalization_terms();
    let default_errors = TruePositiveErrors {
        translation_m: ate,
        scale: ase,
        orientation_rad: aoe,
    };

    let mut dts_annotated = dts
        .iter()
        .map(|dt| AnnotatedDetection {
            detection: dt.clone(),
            is_evaluated: false,
            is_tp: vec![false; num_thresholds],
            errors: default_errors,
        })
        .collect_vec();
    let mut gts_annotated = gts
        .iter()
        .map(|gt| AnnotatedGroundTruth {
            ground_truth: gt.clone(),
            is_evaluated: false,
            is_matched: vec![false; num_thresholds],
        })
        .collect_vec();

    // Sort the detections by score in _descending_ order. Ties keep their input order.
    let permutation = (0..dts.len())
        .sorted_by(|&a, &b| dts[b].score.total_cmp(&dts[a].score))
        .collect_vec();

    let category_to_dts = permutation
        .into_iter()
        .into_group_map_by(|&i| dts[i].category.as_str());
    let category_to_gts = (0..gts.len()).into_group_map_by(|&i| gts[i].category.as_str());

    let empty = Vec::new();
    for category in &cfg.categories {
        let idx_dts = category_to_dts.get(category.as_str()).unwrap_or(&empty);
        let idx_gts = category_to_gts.get(category.as_str()).unwrap_or(&empty);

        let category_dts = cuboids_to_ndarray(idx_dts.iter().map(|&i| &dts[i].cuboid));
        let category_gts = cuboids_to_ndarray(idx_gts.iter().map(|&i| &gts[i].cuboid));

        let is_upstream_dts: Array1<bool> = idx_dts.iter().map(|&i| dts[i].is_evaluated).collect();
        let is_external_gts: Array1<bool> = idx_gts.iter().map(|&i| gts[i].is_evaluated).collect();
        let num_interior_pts = idx_gts
            .iter()
            .map(|&i| gts[i].num_interior_pts)
            .collect_vec();

        let is_evaluated_dts = compute_evaluated_dts_mask(
            &category_dts.slice(s![.., ..3]),
            &is_upstream_dts.view(),
            cfg,
        );
        let is_evaluated_gts = compute_evaluated_gts_mask(
            &category_gts.slice(s![.., ..3]),
            &num_interior_pts,
            &is_external_gts.view(),
            cfg,
        );

        let evaluated_dts = select_evaluated(idx_dts, &is_evaluated_dts);
        let evaluated_gts = select_evaluated(idx_gts, &is_evaluated_gts);

        for (k, &i) in idx_dts.iter().enumerate() {
            dts_annotated[i].is_evaluated = is_evaluated_dts[k];
        }
        for (k, &i) in idx_gts.iter().enumerate() {
            gts_annotated[i].is_evaluated = is_evaluated_gts[k];
        }

        if evaluated_dts.is_empty() || evaluated_gts.is_empty() {
            continue;
        }

        let assignment = assign(
            &cuboids_to_ndarray(evaluated_dts.iter().map(|&i| &dts[i].cuboid)).view(),
            &cuboids_to_ndarray(evaluated_gts.iter().map(|&i| &gts[i].cuboid)).view(),
            cfg,
        );

        for (k, &i) in evaluated_dts.iter().enumerate() {
            let annotated = &mut dts_annotated[i];
            annotated.is_tp = assignment.dts_is_tp.row(k).to_vec();
            annotated.errors = TruePositiveErrors {
                translation_m: assignment.dts_errors[[k, 0]],
                scale: assignment.dts_errors[[k, 1]],
                orientation_rad: assignment.dts_errors[[k, 2]],
            };
        }
        for (k, &i) in evaluated_gts.iter().enumerate() {
            gts_annotated[i].is_matched = assignment.gts_is_matched.row(k).to_vec();
        }
    }
    Ok((dts_annotated, gts_annotated))
}

/// Keep the indices whose mask entry is set.
fn select_evaluated(indices: &[usize], mask: &Array1<bool>) -> Vec<usize> {
    indices
        .iter()
        .zip(mask)
        .filter_map(|(i, is_evaluated)| is_evaluated.then_some(*i))
        .collect()
}

/// Interpolate the precision at each sampled recall.
/// Each entry takes the maximum precision at its rank or any later rank.
pub fn interpolate_precision(precision: &ArrayView1<f64>) -> Array1<f64> {
    let mut precision_interpolated = precision.to_owned();
    let mut running_max = f64::NEG_INFINITY;
    for p in precision_interpolated.iter_mut().rev() {
        running_max = running_max.max(*p);
        *p = running_max;
    }
    precision_interpolated
}

/// Compute precision and recall, interpolated over N fixed recall points.
///
/// `tps` are the true positive flags of one category ordered by descending score. Returns the
/// average precision and the (N,) interpolated precision curve.
pub fn compute_average_precision(
    tps: &[bool],
    recall_interpolated: &ArrayView1<f64>,
    num_gts: usize,
) -> (f64, Array1<f64>) {
    let num_samples = recall_interpolated.len();
    if tps.is_empty() || num_gts == 0 || num_samples == 0 {
        return (0.0, Array1::zeros(num_samples));
    }

    let mut cum_tps = tps.iter().map(|x| *x as u64 as f64).collect::<Array1<f64>>();
    cum_tps.accumulate_axis_inplace(Axis(0), |prev, curr| *curr += prev);

    // Compute precision and recall at every rank.
    let precision = Array1::from_shape_fn(tps.len(), |k| cum_tps[k] / (k + 1) as f64);
    let recall = cum_tps.mapv(|x| x / num_gts as f64).to_vec();

    // Interpolate precision -- VOC-style.
    let precision = interpolate_precision(&precision.view());

    // Recall is non-decreasing, so the first rank reaching `r` carries the envelope for `r`.
    let precision_interpolated = recall_interpolated.mapv(|r| {
        let k = recall.partition_point(|x| *x < r);
        match k < recall.len() {
            true => precision[k],
            false => 0.0,
        }
    });
    let average_precision = precision_interpolated.mean().unwrap_or(0.0);
    (average_precision, precision_interpolated)
}

/// Group records by sweep, ordered by `(log_id, timestamp_ns)`.
pub fn group_by_sweep<T, F>(records: &[T], sweep_uuid: F) -> BTreeMap<SweepUuid, Vec<T>>
where
    T: Clone,
    F: Fn(&T) -> SweepUuid,
{
    let mut groups: BTreeMap<SweepUuid, Vec<T>> = BTreeMap::new();
    for record in records {
        groups
            .entry(sweep_uuid(record))
            .or_default()
            .push(record.clone());
    }
    groups
}
