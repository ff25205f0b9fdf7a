//! # evaluate_detections
//!
//! Evaluates 3D object detections against ground truth annotations.
//!
//! Usage: `evaluate_detections <dts.feather> <gts.feather> [cfg.json] [out_dir]`

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use av2_detection_eval::{
    evaluation::detection::{cfg::DetectionCfg, eval::evaluate},
    io::{
        annotated_detections_to_frame, annotated_ground_truths_to_frame, detections_from_frame,
        ground_truths_from_frame, read_feather, summary_to_frame, write_feather,
    },
};

#[macro_use]
extern crate log;

/// Memory maps the input tables. Requires .feather files to be uncompressed.
const MEMORY_MAPPED: bool = false;

/// Output file names.
const DTS_FILE_NAME: &str = "dts_annotated.feather";
const GTS_FILE_NAME: &str = "gts_annotated.feather";
const SUMMARY_FILE_NAME: &str = "summary.feather";

/// Script entrypoint.
pub fn main() -> Result<()> {
    env_logger::init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 || args.len() > 4 {
        bail!("Usage: evaluate_detections <dts.feather> <gts.feather> [cfg.json] [out_dir]");
    }
    let dts_path = PathBuf::from(&args[0]);
    let gts_path = PathBuf::from(&args[1]);

    let cfg = match args.get(2) {
        Some(cfg_path) => DetectionCfg::from_json_file(Path::new(cfg_path))
            .with_context(|| format!("Cannot load configuration `{cfg_path}`."))?,
        None => DetectionCfg::default(),
    };

    let dts = read_feather(&dts_path, MEMORY_MAPPED)
        .with_context(|| format!("Cannot read detections {dts_path:?}."))?;
    let gts = read_feather(&gts_path, MEMORY_MAPPED)
        .with_context(|| format!("Cannot read annotations {gts_path:?}."))?;

    let dts = detections_from_frame(&dts)?;
    let gts = ground_truths_from_frame(&gts)?;
    let (dts, gts, summary) = evaluate(&dts, &gts, &cfg)?;
    println!("{summary}");

    if let Some(out_dir) = args.get(3).map(PathBuf::from) {
        fs::create_dir_all(&out_dir)?;
        write_feather(
            &out_dir.join(DTS_FILE_NAME),
            &mut annotated_detections_to_frame(&dts, &cfg)?,
        )?;
        write_feather(
            &out_dir.join(GTS_FILE_NAME),
            &mut annotated_ground_truths_to_frame(&gts, &cfg)?,
        )?;
        write_feather(
            &out_dir.join(SUMMARY_FILE_NAME),
            &mut summary_to_frame(&summary)?,
        )?;
        info!("Results written to {out_dir:?}.");
    }
    Ok(())
}
