//! Detection evaluation configuration.

use std::{collections::HashSet, fs, path::Path};

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::error::{EvalError, Result};

use super::constants::{
    AffinityType, CompetitionCategories, FilterMetricType, MAX_SCALE_ERROR, MAX_YAW_RAD_ERROR,
    MIN_AP, MIN_CDS, NUM_DECIMALS, NUM_TP_ERRORS,
};

/// Detection evaluation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionCfg {
    /// Affinity thresholds in meters (ascending).
    pub affinity_thresholds_m: Vec<f32>,
    /// Affinity type.
    pub affinity_type: AffinityType,
    /// Categories to evaluate. Summary rows follow this order.
    pub categories: Vec<String>,
    /// Filter metric type.
    pub filter_metric: FilterMetricType,
    /// Maximum number of evaluated detections per category and sweep.
    pub max_num_dts_per_category: usize,
    /// Maximum range in meters.
    pub max_range_m: f32,
    /// Number of recall samples.
    pub num_recall_samples: usize,
    /// True positive threshold in meters.
    /// Must be one of `affinity_thresholds_m`; defaults to the middle threshold.
    pub tp_threshold_m: Option<f32>,
    /// Normalization terms for translation, scale, and orientation errors.
    /// Defaults to `[tp_threshold_m, 1, π]`.
    pub tp_normalization_terms: Option<Vec<f32>>,
    /// Number of decimals in the summary.
    pub num_decimals: u32,
    /// Fail when a ground truth sweep has no detections.
    /// When disabled, such sweeps are evaluated as empty and reported with a warning.
    pub require_detections_for_every_sweep: bool,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            affinity_thresholds_m: vec![0.5, 1.0, 2.0, 4.0],
            affinity_type: AffinityType::Center,
            categories: CompetitionCategories::iter()
                .map(|category| category.to_string())
                .collect(),
            filter_metric: FilterMetricType::Euclidean,
            max_num_dts_per_category: 100,
            max_range_m: 150.0,
            num_recall_samples: 100,
            tp_threshold_m: None,
            tp_normalization_terms: None,
            num_decimals: NUM_DECIMALS,
            require_detections_for_every_sweep: true,
        }
    }
}

impl DetectionCfg {
    /// Build a configuration for `categories` with default parameters.
    pub fn with_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Load and validate a JSON configuration. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: DetectionCfg = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Check the configuration before any sweep is processed.
    pub fn validate(&self) -> Result<()> {
        let thresholds = &self.affinity_thresholds_m;
        if thresholds.is_empty() {
            return Err(EvalError::Configuration(
                "affinity thresholds must not be empty".to_string(),
            ));
        }
        if let Some(t) = thresholds.iter().find(|t| !t.is_finite() || **t <= 0.0) {
            return Err(EvalError::Configuration(format!(
                "affinity thresholds must be positive and finite, found {t}"
            )));
        }
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EvalError::Configuration(format!(
                "affinity thresholds must be strictly increasing, found {thresholds:?}"
            )));
        }
        if self.categories.is_empty() {
            return Err(EvalError::Configuration(
                "category list must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(category) = self.categories.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(EvalError::Configuration(format!(
                "duplicate category `{category}`"
            )));
        }
        if self.num_recall_samples == 0 {
            return Err(EvalError::Configuration(
                "number of recall samples must be positive".to_string(),
            ));
        }
        if self.max_num_dts_per_category == 0 {
            return Err(EvalError::Configuration(
                "maximum number of detections per category must be positive".to_string(),
            ));
        }
        if self.max_range_m.is_nan() || self.max_range_m <= 0.0 {
            return Err(EvalError::Configuration(format!(
                "maximum range must be positive, found {}",
                self.max_range_m
            )));
        }
        if let Some(tp_threshold_m) = self.tp_threshold_m {
            if !thresholds.contains(&tp_threshold_m) {
                return Err(EvalError::Configuration(format!(
                    "true positive threshold {tp_threshold_m} is not an affinity threshold"
                )));
            }
        }
        if let Some(terms) = &self.tp_normalization_terms {
            if terms.len() != NUM_TP_ERRORS {
                return Err(EvalError::Configuration(format!(
                    "expected {NUM_TP_ERRORS} normalization terms, found {}",
                    terms.len()
                )));
            }
            if terms.iter().any(|t| !t.is_finite() || *t <= 0.0) {
                return Err(EvalError::Configuration(format!(
                    "normalization terms must be positive and finite, found {terms:?}"
                )));
            }
        }
        Ok(())
    }

    /// Index of the true positive threshold within `affinity_thresholds_m`.
    pub fn tp_threshold_index(&self) -> usize {
        self.tp_threshold_m
            .and_then(|t| self.affinity_thresholds_m.iter().position(|x| *x == t))
            .unwrap_or(self.affinity_thresholds_m.len() / 2)
    }

    /// True positive threshold in meters.
    pub fn tp_threshold(&self) -> f32 {
        self.affinity_thresholds_m[self.tp_threshold_index()]
    }

    /// Normalization terms for translation, scale, and orientation errors.
    pub fn normalization_terms(&self) -> [f32; NUM_TP_ERRORS] {
        match &self.tp_normalization_terms {
            Some(terms) if terms.len() == NUM_TP_ERRORS => [terms[0], terms[1], terms[2]],
            _ => [self.tp_threshold(), MAX_SCALE_ERROR, MAX_YAW_RAD_ERROR],
        }
    }

    /// Return the evaluation summary default values.
    /// AP, ATE, ASE, AOE, CDS.
    pub fn metrics_defaults(&self) -> [f64; 5] {
        let [ate, ase, aoe] = self.normalization_terms();
        [
            MIN_AP as f64,
            ate as f64,
            ase as f64,
            aoe as f64,
            MIN_CDS as f64,
        ]
    }

    /// Recall values sampled evenly in the [0, 1] interval. The end point is exact.
    pub fn recall_interpolated(&self) -> Array1<f64> {
        let n = self.num_recall_samples;
        if n < 2 {
            return Array1::zeros(n);
        }
        let step = 1.0 / (n - 1) as f64;
        let mut recall_interpolated = Array1::from_shape_fn(n, |i| i as f64 * step);
        recall_interpolated[n - 1] = 1.0;
        recall_interpolated
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use crate::error::EvalError;

    use super::DetectionCfg;

    #[test]
    fn test_defaults() {
        let cfg = DetectionCfg::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.categories.len(), 26);
        assert_eq!(cfg.categories[0], "ARTICULATED_BUS");
        assert!(cfg.categories.contains(&"WHEELCHAIR".to_string()));
        assert_eq!(cfg.tp_threshold(), 2.0);
        assert_eq!(cfg.normalization_terms(), [2.0, 1.0, PI]);
        assert_eq!(cfg.metrics_defaults(), [0.0, 2.0, 1.0, PI as f64, 0.0]);
        assert!(cfg.require_detections_for_every_sweep);
    }

    #[test]
    fn test_middle_threshold() {
        let cfg = DetectionCfg {
            affinity_thresholds_m: vec![1.0, 2.0, 4.0],
            ..Default::default()
        };
        assert_eq!(cfg.tp_threshold_index(), 1);
        assert_eq!(cfg.tp_threshold(), 2.0);
    }

    #[test]
    fn test_explicit_tp_threshold() {
        let cfg = DetectionCfg {
            tp_threshold_m: Some(4.0),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tp_threshold_index(), 3);
        assert_eq!(cfg.normalization_terms()[0], 4.0);
    }

    #[test]
    fn test_recall_interpolated() {
        let cfg = DetectionCfg {
            num_recall_samples: 11,
            ..Default::default()
        };
        let recall = cfg.recall_interpolated();
        assert_eq!(recall.len(), 11);
        assert_eq!(recall[0], 0.0);
        assert_eq!(recall[10], 1.0);
        assert_abs_diff_eq!(recall[3], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_configurations() {
        let invalid = [
            DetectionCfg {
                affinity_thresholds_m: vec![],
                ..Default::default()
            },
            DetectionCfg {
                affinity_thresholds_m: vec![0.0, 1.0],
                ..Default::default()
            },
            DetectionCfg {
                affinity_thresholds_m: vec![2.0, 1.0],
                ..Default::default()
            },
            DetectionCfg::with_categories(Vec::<String>::new()),
            DetectionCfg::with_categories(["CAR", "CAR"]),
            DetectionCfg {
                num_recall_samples: 0,
                ..Default::default()
            },
            DetectionCfg {
                tp_threshold_m: Some(3.0),
                ..Default::default()
            },
            DetectionCfg {
                tp_normalization_terms: Some(vec![2.0, 1.0]),
                ..Default::default()
            },
            DetectionCfg {
                tp_normalization_terms: Some(vec![2.0, 0.0, 1.0]),
                ..Default::default()
            },
        ];
        for cfg in invalid {
            assert!(matches!(cfg.validate(), Err(EvalError::Configuration(_))));
        }
    }

    #[test]
    fn test_from_json() {
        let cfg =
            DetectionCfg::from_json(r#"{"categories": ["REGULAR_VEHICLE"], "max_range_m": 50.0}"#)
                .unwrap();
        assert_eq!(cfg.categories, vec!["REGULAR_VEHICLE".to_string()]);
        assert_eq!(cfg.max_range_m, 50.0);
        assert_eq!(cfg.affinity_thresholds_m, vec![0.5, 1.0, 2.0, 4.0]);

        let cfg = DetectionCfg::from_json(
            r#"{"tp_normalization_terms": [1.0, 0.5, 2.0], "require_detections_for_every_sweep": false}"#,
        )
        .unwrap();
        assert_eq!(cfg.normalization_terms(), [1.0, 0.5, 2.0]);
        assert!(!cfg.require_detections_for_every_sweep);

        let err = DetectionCfg::from_json(r#"{"affinity_thresholds_m": []}"#).unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
    }
}
