//! Argoverse 3D object detection evaluation.
//!
//! Detections are matched to ground truth annotations sweep by sweep under a set of
//! bird's-eye-view center distance thresholds. Matching results are then summarized per
//! category:
//!
//! 1. Average Precision: VOC-style average precision, averaged over the affinity thresholds.
//! 2. True positive errors at the true positive threshold: translation (center distance), scale
//!    (1 - IoU of the pose-aligned cuboids), and orientation (smallest heading difference).
//!    Without true positives the errors take their normalization terms.
//! 3. Composite Detection Score: mAP scaled by the mean of the normalized error complements,
//!    `CDS = mAP * mean(1 - ATE / tp_threshold, 1 - ASE / 1, 1 - AOE / π)`.
//!
//! The measures are not clamped, so errors beyond their normalization terms push CDS below zero.

use itertools::Itertools;
use log::{debug, info, warn};
use polars::prelude::DataFrame;
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    error::{EvalError, Result},
    io::{
        annotated_detections_to_frame, annotated_ground_truths_to_frame, detections_from_frame,
        ground_truths_from_frame, summary_to_frame,
    },
    structures::cuboid::{AnnotatedDetection, AnnotatedGroundTruth, Detection, GroundTruth},
};

use super::{
    cfg::DetectionCfg,
    summary::{round_decimals, CategorySummary, DetectionMetrics, Summary},
    utils::{accumulate, compute_average_precision, group_by_sweep},
};

/// Evaluate a set of detections against the ground truth annotations.
///
/// Each sweep is processed independently and in parallel. Annotated outputs are ordered by
/// `(log_id, timestamp_ns)` and keep the input order within a sweep. Detections in sweeps without
/// annotations are not evaluated and are dropped from the outputs. An annotated sweep without
/// detections fails the evaluation unless `cfg.require_detections_for_every_sweep` is disabled.
pub fn evaluate(
    dts: &[Detection],
    gts: &[GroundTruth],
    cfg: &DetectionCfg,
) -> Result<(Vec<AnnotatedDetection>, Vec<AnnotatedGroundTruth>, Summary)> {
    cfg.validate()?;
    info!(
        "Evaluating {} detections against {} annotations ...",
        dts.len(),
        gts.len()
    );

    let uuid_to_dts = group_by_sweep(dts, Detection::sweep_uuid);
    let uuid_to_gts = group_by_sweep(gts, GroundTruth::sweep_uuid);

    let num_unmatched_sweep_dts: usize = uuid_to_dts
        .iter()
        .filter(|(uuid, _)| !uuid_to_gts.contains_key(*uuid))
        .map(|(_, sweep_dts)| sweep_dts.len())
        .sum();
    if num_unmatched_sweep_dts > 0 {
        warn!("{num_unmatched_sweep_dts} detections belong to sweeps without annotations and are ignored.");
    }

    let missing_dts_uuids = uuid_to_gts
        .keys()
        .filter(|uuid| !uuid_to_dts.contains_key(*uuid))
        .collect_vec();
    if let Some(uuid) = missing_dts_uuids.first() {
        if cfg.require_detections_for_every_sweep {
            return Err(EvalError::invalid_sweep(uuid, "no detections for annotated sweep"));
        }
        for (log_id, timestamp_ns) in &missing_dts_uuids {
            warn!("No detections for annotated sweep ({log_id}, {timestamp_ns}). Evaluating it as empty.");
        }
    }

    let sweeps = uuid_to_gts.iter().collect_vec();
    let outputs = sweeps
        .par_iter()
        .map(|(uuid, sweep_gts)| {
            let sweep_dts = uuid_to_dts.get(*uuid).map(Vec::as_slice).unwrap_or_default();
            accumulate(sweep_dts, sweep_gts, cfg)
        })
        .collect::<Result<Vec<_>>>()?;

    let (dts_list, gts_list): (Vec<_>, Vec<_>) = outputs.into_iter().unzip();
    let dts_annotated = dts_list.into_iter().flatten().collect_vec();
    let gts_annotated = gts_list.into_iter().flatten().collect_vec();

    let summary = summarize_metrics(&dts_annotated, &gts_annotated, cfg);
    info!("Evaluation complete.");
    Ok((dts_annotated, gts_annotated, summary))
}

/// Evaluate detection and annotation tables.
/// Returns the annotated detections, the annotated annotations, and the summary table.
pub fn evaluate_frames(
    dts: &DataFrame,
    gts: &DataFrame,
    cfg: &DetectionCfg,
) -> Result<(DataFrame, DataFrame, DataFrame)> {
    let (dts, gts, summary) =
        evaluate(&detections_from_frame(dts)?, &ground_truths_from_frame(gts)?, cfg)?;
    Ok((
        annotated_detections_to_frame(&dts, cfg)?,
        annotated_ground_truths_to_frame(&gts, cfg)?,
        summary_to_frame(&summary)?,
    ))
}

/// Calculate the 3D object detection metrics.
///
/// Categories are summarized in configuration order. The average row is the column-wise mean
/// over every category row, including categories without annotations. All values are rounded
/// to `cfg.num_decimals`.
pub fn summarize_metrics(
    dts: &[AnnotatedDetection],
    gts: &[AnnotatedGroundTruth],
    cfg: &DetectionCfg,
) -> Summary {
    let categories: Vec<CategorySummary> = cfg
        .categories
        .par_iter()
        .map(|category| summarize_category(category, dts, gts, cfg))
        .collect();

    let average = DetectionMetrics::mean(categories.iter().map(|c| &c.metrics));
    let num_decimals = cfg.num_decimals;
    Summary {
        affinity_thresholds_m: cfg.affinity_thresholds_m.clone(),
        categories: categories
            .into_iter()
            .map(|c| CategorySummary {
                metrics: c.metrics.round(num_decimals),
                average_precisions: c
                    .average_precisions
                    .iter()
                    .map(|ap| round_decimals(*ap, num_decimals))
                    .collect(),
                ..c
            })
            .collect(),
        average: average.round(num_decimals),
    }
}

/// Summarize a single category (unrounded).
fn summarize_category(
    category: &str,
    dts: &[AnnotatedDetection],
    gts: &[AnnotatedGroundTruth],
    cfg: &DetectionCfg,
) -> CategorySummary {
    let num_thresholds = cfg.affinity_thresholds_m.len();

    // Compute number of ground truth annotations.
    let num_gts = gts
        .iter()
        .filter(|gt| gt.is_evaluated && gt.ground_truth.category == category)
        .count();

    // Cannot evaluate without ground truth information.
    if num_gts == 0 {
        debug!("No evaluated annotations for `{category}`. Using default metrics.");
        return CategorySummary {
            category: category.to_string(),
            metrics: DetectionMetrics::from_array(cfg.metrics_defaults()),
            average_precisions: vec![0.0; num_thresholds],
            num_gts,
            num_tps: 0,
        };
    }

    // Only keep detections if they match the category and have NOT been filtered.
    let category_dts = dts
        .iter()
        .filter(|dt| dt.is_evaluated && dt.detection.category == category)
        .sorted_by(|a, b| b.detection.score.total_cmp(&a.detection.score))
        .collect_vec();

    let recall_interpolated = cfg.recall_interpolated();
    let average_precisions = (0..num_thresholds)
        .map(|t| {
            let true_positives = category_dts.iter().map(|dt| dt.is_tp[t]).collect_vec();
            let (average_precision, _) =
                compute_average_precision(&true_positives, &recall_interpolated.view(), num_gts);
            average_precision
        })
        .collect_vec();
    let mean_average_precision =
        average_precisions.iter().sum::<f64>() / num_thresholds as f64;

    // Select only the true positives at the true positive threshold.
    let tp_threshold_index = cfg.tp_threshold_index();
    let true_positives = category_dts
        .iter()
        .filter(|dt| dt.is_tp[tp_threshold_index])
        .collect_vec();

    let normalization_terms = cfg.normalization_terms().map(f64::from);
    let tp_errors = match true_positives.is_empty() {
        true => normalization_terms,
        false => {
            let mut sums = [0.0; 3];
            for dt in &true_positives {
                for (sum, error) in sums.iter_mut().zip(dt.errors.to_array()) {
                    *sum += error as f64;
                }
            }
            sums.map(|sum| sum / true_positives.len() as f64)
        }
    };

    // Convert errors to scores.
    let tp_scores = [0, 1, 2].map(|i| 1.0 - tp_errors[i] / normalization_terms[i]);

    // Compute Composite Detection Score (CDS).
    let cds = mean_average_precision * tp_scores.iter().sum::<f64>() / tp_scores.len() as f64;

    CategorySummary {
        category: category.to_string(),
        metrics: DetectionMetrics::from_array([
            mean_average_precision,
            tp_errors[0],
            tp_errors[1],
            tp_errors[2],
            cds,
        ]),
        average_precisions,
        num_gts,
        num_tps: true_positives.len(),
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_abs_diff_eq;

    use crate::{
        error::EvalError,
        evaluation::detection::cfg::DetectionCfg,
        structures::cuboid::{Cuboid, Detection, GroundTruth},
    };

    use super::evaluate;

    const VEHICLE: &str = "REGULAR_VEHICLE";
    const PEDESTRIAN: &str = "PEDESTRIAN";

    fn sweep(timestamp_ns: u64) -> (String, u64) {
        ("log".to_string(), timestamp_ns)
    }

    fn cuboid(x: f32, y: f32) -> Cuboid {
        Cuboid::from_yaw([x, y, 0.0], [4.0, 2.0, 1.5], 0.0)
    }

    fn cfg() -> DetectionCfg {
        DetectionCfg {
            affinity_thresholds_m: vec![1.0, 2.0, 4.0],
            ..DetectionCfg::with_categories([VEHICLE, PEDESTRIAN])
        }
    }

    #[test]
    fn test_scenario_single_match() {
        let dts = [Detection::new(&sweep(0), VEHICLE, cuboid(0.5, 0.0), 0.9)];
        let gts = [GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0))];
        let (dts, _, summary) = evaluate(&dts, &gts, &cfg()).unwrap();

        assert_eq!(dts[0].is_tp, vec![true, true, true]);
        let category = &summary.categories[0];
        assert_eq!(category.average_precisions, vec![1.0, 1.0, 1.0]);
        assert_eq!(category.num_tps, 1);

        let metrics = summary.get(VEHICLE).unwrap();
        assert_abs_diff_eq!(metrics.ap, 1.0);
        assert_abs_diff_eq!(metrics.ate, 0.5);
        assert_abs_diff_eq!(metrics.ase, 0.0);
        assert_abs_diff_eq!(metrics.aoe, 0.0);
        // 1.0 * mean(1 - 0.5 / 2.0, 1.0, 1.0), rounded to three decimals.
        assert_abs_diff_eq!(metrics.cds, 0.917);
    }

    #[test]
    fn test_scenario_no_detections() {
        // The sweep only holds a detection of another category.
        let dts = [Detection::new(&sweep(0), PEDESTRIAN, cuboid(20.0, 0.0), 0.9)];
        let gts = [GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0))];
        let (dts, gts, summary) = evaluate(&dts, &gts, &cfg()).unwrap();
        assert!(!dts[0].is_tp.iter().any(|x| *x));
        assert!(gts[0].is_evaluated);
        assert!(!gts[0].is_matched.iter().any(|x| *x));

        let metrics = summary.get(VEHICLE).unwrap();
        assert_eq!(summary.categories[0].average_precisions, vec![0.0; 3]);
        assert_eq!(metrics.ap, 0.0);
        assert_eq!(metrics.ate, 2.0);
        assert_eq!(metrics.ase, 1.0);
        assert_abs_diff_eq!(metrics.aoe, 3.142);
        assert_eq!(metrics.cds, 0.0);

        // Pedestrian has no annotations and keeps its default row.
        let average = summary.get("AVERAGE_METRICS").unwrap();
        assert_eq!(average.ap, 0.0);
        assert_eq!(average.ate, 2.0);
        assert_abs_diff_eq!(average.aoe, 3.142);
    }

    #[test]
    fn test_scenario_greedy_order() {
        let dts = [
            Detection::new(&sweep(0), VEHICLE, cuboid(3.0, 0.0), 0.9),
            Detection::new(&sweep(0), VEHICLE, cuboid(0.0, 0.5), 0.3),
        ];
        let gts = [GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0))];
        let (dts, _, summary) = evaluate(&dts, &gts, &cfg()).unwrap();

        // At 1 m and 2 m the far, high-scoring detection is rejected and the second one matches.
        assert_eq!(dts[0].is_tp, vec![false, false, true]);
        assert_eq!(dts[1].is_tp, vec![true, true, false]);

        // Ranked [FP, TP]: precision 1/2 at full recall.
        let category = &summary.categories[0];
        assert_eq!(category.average_precisions, vec![0.5, 0.5, 1.0]);
        assert_abs_diff_eq!(summary.get(VEHICLE).unwrap().ate, 0.5);
    }

    #[test]
    fn test_saturation_without_true_positives() {
        let dts = [Detection::new(&sweep(0), VEHICLE, cuboid(10.0, 0.0), 0.9)];
        let gts = [GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0))];
        let cfg = DetectionCfg {
            num_decimals: 6,
            ..cfg()
        };
        let (_, _, summary) = evaluate(&dts, &gts, &cfg).unwrap();
        let metrics = summary.get(VEHICLE).unwrap();
        assert_eq!(metrics.ap, 0.0);
        assert_eq!(metrics.ate, 2.0);
        assert_eq!(metrics.ase, 1.0);
        assert_abs_diff_eq!(metrics.aoe, (PI as f32) as f64, epsilon = 1e-6);
        assert_eq!(metrics.cds, 0.0);
    }

    #[test]
    fn test_average_row_includes_default_rows() {
        let dts = [Detection::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0), 0.9)];
        let gts = [GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0))];
        let (_, _, summary) = evaluate(&dts, &gts, &cfg()).unwrap();

        let vehicle = summary.get(VEHICLE).unwrap();
        let pedestrian = summary.get(PEDESTRIAN).unwrap();
        assert_eq!(vehicle.cds, 1.0);
        assert_eq!(pedestrian.cds, 0.0);

        let average = summary.get("AVERAGE_METRICS").unwrap();
        assert_abs_diff_eq!(average.ap, 0.5);
        assert_abs_diff_eq!(average.ate, 1.0);
        assert_abs_diff_eq!(average.ase, 0.5);
        assert_abs_diff_eq!(average.aoe, 1.571);
        assert_abs_diff_eq!(average.cds, 0.5);
    }

    #[test]
    fn test_multiple_sweeps() {
        let dts = [
            Detection::new(&sweep(1), VEHICLE, cuboid(0.0, 0.0), 0.9),
            Detection::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0), 0.8),
            Detection::new(&sweep(0), PEDESTRIAN, cuboid(5.0, 0.0), 0.7),
        ];
        let gts = [
            GroundTruth::new(&sweep(1), VEHICLE, cuboid(10.0, 0.0)),
            GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0)),
            GroundTruth::new(&sweep(0), PEDESTRIAN, cuboid(5.0, 0.0)),
        ];
        let (dts, gts, summary) = evaluate(&dts, &gts, &cfg()).unwrap();

        // Outputs are ordered by sweep.
        assert_eq!(dts[0].detection.timestamp_ns, 0);
        assert_eq!(dts[2].detection.timestamp_ns, 1);
        assert_eq!(gts[0].ground_truth.timestamp_ns, 0);
        assert!(!dts[2].is_tp[2]);

        // Ranked [FP (sweep 1), TP (sweep 0)] against two annotations.
        let vehicle = &summary.categories[0];
        assert_eq!(vehicle.num_gts, 2);
        assert_eq!(vehicle.average_precisions, vec![0.25, 0.25, 0.25]);
        assert_abs_diff_eq!(summary.get(PEDESTRIAN).unwrap().ap, 1.0);
    }

    #[test]
    fn test_detections_without_annotated_sweep_are_ignored() {
        let dts = [
            Detection::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0), 0.9),
            Detection::new(&sweep(7), VEHICLE, cuboid(0.0, 0.0), 0.9),
        ];
        let gts = [GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0))];
        let (dts, _, summary) = evaluate(&dts, &gts, &cfg()).unwrap();
        assert_eq!(dts.len(), 1);
        assert_eq!(summary.get(VEHICLE).unwrap().ap, 1.0);
    }

    #[test]
    fn test_annotated_sweep_without_detections_fails() {
        let dts = [Detection::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0), 0.9)];
        let gts = [
            GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0)),
            GroundTruth::new(&sweep(1), VEHICLE, cuboid(0.0, 0.0)),
        ];
        let cfg = DetectionCfg::with_categories([VEHICLE]);
        let err = evaluate(&dts, &gts, &cfg).unwrap_err();
        assert!(matches!(err, EvalError::InvalidSweep { timestamp_ns: 1, .. }));

        let err = evaluate(&[], &gts[..1], &cfg).unwrap_err();
        assert!(matches!(err, EvalError::InvalidSweep { timestamp_ns: 0, .. }));
    }

    #[test]
    fn test_annotated_sweep_without_detections_evaluated_as_empty() {
        let dts = [Detection::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0), 0.9)];
        let gts = [
            GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0)),
            GroundTruth::new(&sweep(1), VEHICLE, cuboid(0.0, 0.0)),
        ];
        let cfg = DetectionCfg {
            require_detections_for_every_sweep: false,
            ..cfg()
        };
        let (dts, gts, summary) = evaluate(&dts, &gts, &cfg).unwrap();
        assert_eq!(dts.len(), 1);
        assert_eq!(gts.len(), 2);
        assert!(!gts[1].is_matched[2]);

        // One of two annotations recalled: precision 1 up to recall 1/2.
        assert_eq!(summary.categories[0].average_precisions, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_invalid_sweep_aborts() {
        let dts = [
            Detection::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0), 0.9),
            Detection::new(&sweep(1), VEHICLE, cuboid(f32::NAN, 0.0), 0.9),
        ];
        let gts = [
            GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0)),
            GroundTruth::new(&sweep(1), VEHICLE, cuboid(0.0, 0.0)),
        ];
        let err = evaluate(&dts, &gts, &cfg()).unwrap_err();
        assert!(matches!(err, EvalError::InvalidSweep { timestamp_ns: 1, .. }));
    }

    #[test]
    fn test_invalid_configuration_aborts() {
        let cfg = DetectionCfg {
            affinity_thresholds_m: vec![],
            ..cfg()
        };
        let err = evaluate(&[], &[], &cfg).unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
    }

    #[test]
    fn test_unclamped_measures() {
        // Normalization terms smaller than the errors yield negative measures.
        let dts = [Detection::new(
            &sweep(0),
            VEHICLE,
            Cuboid::from_yaw([1.0, 0.0, 0.0], [4.0, 2.0, 1.5], 0.0),
            0.9,
        )];
        let gts = [GroundTruth::new(&sweep(0), VEHICLE, cuboid(0.0, 0.0))];
        let cfg = DetectionCfg {
            tp_normalization_terms: Some(vec![0.5, 1.0, std::f32::consts::PI]),
            ..cfg()
        };
        let (_, _, summary) = evaluate(&dts, &gts, &cfg).unwrap();
        // mean(1 - 1 / 0.5, 1, 1) = 1/3.
        assert_abs_diff_eq!(summary.get(VEHICLE).unwrap().cds, 0.333);
        assert_abs_diff_eq!(summary.get(VEHICLE).unwrap().ate, 1.0);

        let cfg = DetectionCfg {
            tp_normalization_terms: Some(vec![0.25, 1.0, std::f32::consts::PI]),
            ..cfg
        };
        let (_, _, summary) = evaluate(&dts, &gts, &cfg).unwrap();
        // mean(1 - 1 / 0.25, 1, 1) = -1/3.
        assert_abs_diff_eq!(summary.get(VEHICLE).unwrap().cds, -0.333);
    }
}
