//! Summary metrics of the detection evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::constants::AVERAGE_METRICS_ROW;

use super::constants::MetricNames;

/// Summary metrics of a single row: AP, ATE, ASE, AOE, CDS.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetrics {
    /// Mean average precision over the affinity thresholds.
    pub ap: f64,
    /// Average translation error (m).
    pub ate: f64,
    /// Average scale error.
    pub ase: f64,
    /// Average orientation error (rad).
    pub aoe: f64,
    /// Composite detection score.
    pub cds: f64,
}

impl DetectionMetrics {
    /// Build metrics from an ordered array (see `MetricNames`).
    pub fn from_array(values: [f64; 5]) -> Self {
        let [ap, ate, ase, aoe, cds] = values;
        Self {
            ap,
            ate,
            ase,
            aoe,
            cds,
        }
    }

    /// Metrics as an ordered array (see `MetricNames`).
    pub fn to_array(&self) -> [f64; 5] {
        [self.ap, self.ate, self.ase, self.aoe, self.cds]
    }

    /// Column-wise arithmetic mean. Empty input yields zeros.
    pub fn mean<'a>(rows: impl IntoIterator<Item = &'a DetectionMetrics>) -> Self {
        let mut sums = [0.0; 5];
        let mut count = 0;
        for row in rows {
            for (sum, value) in sums.iter_mut().zip(row.to_array()) {
                *sum += value;
            }
            count += 1;
        }
        if count == 0 {
            return Self::default();
        }
        Self::from_array(sums.map(|sum| sum / count as f64))
    }

    /// Round every metric to `num_decimals`, ties to even.
    pub fn round(&self, num_decimals: u32) -> Self {
        Self::from_array(self.to_array().map(|x| round_decimals(x, num_decimals)))
    }
}

/// Round `x` to `num_decimals`, ties to even.
pub fn round_decimals(x: f64, num_decimals: u32) -> f64 {
    let scale = 10_f64.powi(num_decimals as i32);
    (x * scale).round_ties_even() / scale
}

/// Per-category results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// Category name.
    pub category: String,
    /// Summary metrics. Default values when the category has no evaluated annotations.
    pub metrics: DetectionMetrics,
    /// Average precision at each affinity threshold.
    pub average_precisions: Vec<f64>,
    /// Number of evaluated ground truth annotations.
    pub num_gts: usize,
    /// Number of true positives at the true positive threshold.
    pub num_tps: usize,
}

/// Summary table: one row per category followed by the average row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Affinity thresholds the per-threshold average precisions refer to.
    pub affinity_thresholds_m: Vec<f32>,
    /// Category rows in configuration order.
    pub categories: Vec<CategorySummary>,
    /// Column-wise mean over all category rows.
    pub average: DetectionMetrics,
}

impl Summary {
    /// Metrics for `category`, or the average row for `AVERAGE_METRICS`.
    pub fn get(&self, category: &str) -> Option<&DetectionMetrics> {
        if category == AVERAGE_METRICS_ROW {
            return Some(&self.average);
        }
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| &c.metrics)
    }

    /// Rows of the summary table, average row last.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &DetectionMetrics)> {
        self.categories
            .iter()
            .map(|c| (c.category.as_str(), &c.metrics))
            .chain(std::iter::once((AVERAGE_METRICS_ROW, &self.average)))
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or_default();
        write!(f, "{:width$}", "")?;
        for name in MetricNames::iter() {
            write!(f, " {:>8}", name.to_string())?;
        }
        writeln!(f)?;
        for (name, metrics) in self.rows() {
            write!(f, "{name:width$}")?;
            for value in metrics.to_array() {
                write!(f, " {value:>8.3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
