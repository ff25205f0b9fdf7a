//! # io
//!
//! Reading and writing operations.

use std::fs::File;
use std::path::Path;

use itertools::Itertools;
use polars::prelude::DataFrame;
use polars::prelude::IpcReader;
use polars::prelude::IpcWriter;
use polars::prelude::NamedFrom;
use polars::prelude::SerReader;
use polars::prelude::SerWriter;
use polars::series::Series;
use strum::IntoEnumIterator;

use crate::constants::{
    CATEGORY_COLUMN, CUBOID_COLUMNS, IS_EVALUATED_COLUMN, NUM_INTERIOR_PTS_COLUMN, SCORE_COLUMN,
    SWEEP_UUID_COLUMNS, TRACK_UUID_COLUMN,
};
use crate::error::Result;
use crate::evaluation::detection::cfg::DetectionCfg;
use crate::evaluation::detection::constants::{MetricNames, TruePositiveErrorNames};
use crate::evaluation::detection::summary::Summary;
use crate::frame_utils::{
    convert_columns_to_nd, extract_bool_column_or, extract_f32_column,
    extract_optional_u64_column, extract_optional_utf8_column, extract_u64_column,
    extract_utf8_column,
};
use crate::structures::cuboid::{
    AnnotatedDetection, AnnotatedGroundTruth, Cuboid, Detection, GroundTruth,
};

/// Read a feather file and load into a `polars` dataframe.
pub fn read_feather(path: &Path, memory_mapped: bool) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(IpcReader::new(file).memory_mapped(memory_mapped).finish()?)
}

/// Write a `polars` dataframe to a feather file.
pub fn write_feather(path: &Path, frame: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;
    IpcWriter::new(&mut file).finish(frame)?;
    Ok(())
}

/// Name of the true positive column for an affinity threshold, e.g. `"2.0"`.
pub fn threshold_column_name(threshold_m: f32) -> String {
    format!("{threshold_m:?}")
}

/// Sweep identifiers, categories, and cuboids shared by detection and annotation tables.
#[allow(clippy::type_complexity)]
fn read_cuboid_records(
    frame: &DataFrame,
) -> Result<(Vec<String>, Vec<u64>, Vec<String>, Vec<Cuboid>)> {
    let [log_id_column, timestamp_column] = SWEEP_UUID_COLUMNS;
    let log_ids = extract_utf8_column(frame, log_id_column)?;
    let timestamps_ns = extract_u64_column(frame, timestamp_column)?;
    let categories = extract_utf8_column(frame, CATEGORY_COLUMN)?;
    let params = convert_columns_to_nd(frame, &CUBOID_COLUMNS)?;
    let cuboids = params
        .outer_iter()
        .map(|row| Cuboid::from_params(&row))
        .collect_vec();
    Ok((log_ids, timestamps_ns, categories, cuboids))
}

/// Read detections from a table.
///
/// Required columns: `log_id`, `timestamp_ns`, `category`, the ordered cuboid parameters, and
/// `score`. An optional `is_evaluated` column carries the upstream filter (defaults to true).
pub fn detections_from_frame(frame: &DataFrame) -> Result<Vec<Detection>> {
    let (log_ids, timestamps_ns, categories, cuboids) = read_cuboid_records(frame)?;
    let scores = extract_f32_column(frame, SCORE_COLUMN)?;
    let is_evaluated = extract_bool_column_or(frame, IS_EVALUATED_COLUMN, true)?;
    Ok(log_ids
        .into_iter()
        .zip(timestamps_ns)
        .zip(categories)
        .zip(cuboids)
        .zip(scores)
        .zip(is_evaluated)
        .map(
            |(((((log_id, timestamp_ns), category), cuboid), score), is_evaluated)| Detection {
                log_id,
                timestamp_ns,
                category,
                cuboid,
                score,
                is_evaluated,
            },
        )
        .collect())
}

/// Read ground truth annotations from a table.
///
/// Required columns: `log_id`, `timestamp_ns`, `category`, and the ordered cuboid parameters.
/// Optional columns: `is_evaluated` (defaults to true), `track_uuid`, and `num_interior_pts`.
pub fn ground_truths_from_frame(frame: &DataFrame) -> Result<Vec<GroundTruth>> {
    let (log_ids, timestamps_ns, categories, cuboids) = read_cuboid_records(frame)?;
    let is_evaluated = extract_bool_column_or(frame, IS_EVALUATED_COLUMN, true)?;
    let track_uuids = extract_optional_utf8_column(frame, TRACK_UUID_COLUMN)?;
    let num_interior_pts = extract_optional_u64_column(frame, NUM_INTERIOR_PTS_COLUMN)?;
    Ok(log_ids
        .into_iter()
        .zip(timestamps_ns)
        .zip(categories)
        .zip(cuboids)
        .zip(is_evaluated)
        .zip(track_uuids)
        .zip(num_interior_pts)
        .map(
            |(
                (((((log_id, timestamp_ns), category), cuboid), is_evaluated), track_uuid),
                num_interior_pts,
            )| GroundTruth {
                log_id,
                timestamp_ns,
                category,
                cuboid,
                track_uuid,
                num_interior_pts,
                is_evaluated,
            },
        )
        .collect())
}

/// Build the columns shared by detection and annotation tables.
fn cuboid_columns<'a>(
    log_ids: impl Iterator<Item = &'a str>,
    timestamps_ns: impl Iterator<Item = u64>,
    categories: impl Iterator<Item = &'a str>,
    cuboids: &[&Cuboid],
) -> Vec<Series> {
    let [log_id_column, timestamp_column] = SWEEP_UUID_COLUMNS;
    let mut columns = vec![
        Series::new(log_id_column, log_ids.collect_vec()),
        Series::new(timestamp_column, timestamps_ns.collect_vec()),
        Series::new(CATEGORY_COLUMN, categories.collect_vec()),
    ];
    let params = cuboids.iter().map(|c| c.params()).collect_vec();
    for (j, name) in CUBOID_COLUMNS.iter().enumerate() {
        columns.push(Series::new(name, params.iter().map(|p| p[j]).collect_vec()));
    }
    columns
}

/// Build one boolean column per affinity threshold.
fn threshold_columns(flags: &[&Vec<bool>], cfg: &DetectionCfg) -> Vec<Series> {
    cfg.affinity_thresholds_m
        .iter()
        .enumerate()
        .map(|(t, threshold_m)| {
            Series::new(
                &threshold_column_name(*threshold_m),
                flags.iter().map(|f| f[t]).collect_vec(),
            )
        })
        .collect()
}

/// Convert annotated detections to a table.
///
/// Columns: the input detection columns, one true positive flag per affinity threshold, the
/// true positive errors, and the evaluation flag.
pub fn annotated_detections_to_frame(
    dts: &[AnnotatedDetection],
    cfg: &DetectionCfg,
) -> Result<DataFrame> {
    let mut columns = cuboid_columns(
        dts.iter().map(|dt| dt.detection.log_id.as_str()),
        dts.iter().map(|dt| dt.detection.timestamp_ns),
        dts.iter().map(|dt| dt.detection.category.as_str()),
        &dts.iter().map(|dt| &dt.detection.cuboid).collect_vec(),
    );
    columns.push(Series::new(
        SCORE_COLUMN,
        dts.iter().map(|dt| dt.detection.score).collect_vec(),
    ));
    columns.extend(threshold_columns(
        &dts.iter().map(|dt| &dt.is_tp).collect_vec(),
        cfg,
    ));
    for (j, name) in TruePositiveErrorNames::iter().enumerate() {
        columns.push(Series::new(
            &name.to_string(),
            dts.iter().map(|dt| dt.errors.to_array()[j]).collect_vec(),
        ));
    }
    columns.push(Series::new(
        IS_EVALUATED_COLUMN,
        dts.iter().map(|dt| dt.is_evaluated).collect_vec(),
    ));
    Ok(DataFrame::new(columns)?)
}

/// Convert annotated ground truth annotations to a table.
///
/// Columns: the input annotation columns, one matched flag per affinity threshold, and the
/// evaluation flag.
pub fn annotated_ground_truths_to_frame(
    gts: &[AnnotatedGroundTruth],
    cfg: &DetectionCfg,
) -> Result<DataFrame> {
    let mut columns = cuboid_columns(
        gts.iter().map(|gt| gt.ground_truth.log_id.as_str()),
        gts.iter().map(|gt| gt.ground_truth.timestamp_ns),
        gts.iter().map(|gt| gt.ground_truth.category.as_str()),
        &gts.iter().map(|gt| &gt.ground_truth.cuboid).collect_vec(),
    );
    columns.push(Series::new(
        TRACK_UUID_COLUMN,
        gts.iter()
            .map(|gt| gt.ground_truth.track_uuid.as_deref())
            .collect_vec(),
    ));
    columns.push(Series::new(
        NUM_INTERIOR_PTS_COLUMN,
        gts.iter()
            .map(|gt| gt.ground_truth.num_interior_pts)
            .collect_vec(),
    ));
    columns.extend(threshold_columns(
        &gts.iter().map(|gt| &gt.is_matched).collect_vec(),
        cfg,
    ));
    columns.push(Series::new(
        IS_EVALUATED_COLUMN,
        gts.iter().map(|gt| gt.is_evaluated).collect_vec(),
    ));
    Ok(DataFrame::new(columns)?)
}

/// Convert the summary to a table.
/// One row per category followed by `AVERAGE_METRICS`; columns `category`, AP, ATE, ASE, AOE, CDS.
pub fn summary_to_frame(summary: &Summary) -> Result<DataFrame> {
    let rows = summary.rows().collect_vec();
    let mut columns = vec![Series::new(
        CATEGORY_COLUMN,
        rows.iter().map(|(name, _)| *name).collect_vec(),
    )];
    for (j, name) in MetricNames::iter().enumerate() {
        columns.push(Series::new(
            &name.to_string(),
            rows.iter()
                .map(|(_, metrics)| metrics.to_array()[j])
                .collect_vec(),
        ));
    }
    Ok(DataFrame::new(columns)?)
}
