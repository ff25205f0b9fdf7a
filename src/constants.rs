//! # constants
//!
//! Common constants used throughout the library.

/// Sweep identifier columns.
pub const SWEEP_UUID_COLUMNS: [&str; 2] = ["log_id", "timestamp_ns"];

/// Category column.
pub const CATEGORY_COLUMN: &str = "category";

/// Ordered cuboid parameter columns.
/// Center (m), extent (m), and scalar-first orientation.
pub const CUBOID_COLUMNS: [&str; 10] = [
    "tx_m", "ty_m", "tz_m", "length_m", "width_m", "height_m", "qw", "qx", "qy", "qz",
];

/// Detection confidence column.
pub const SCORE_COLUMN: &str = "score";

/// Evaluation flag column.
pub const IS_EVALUATED_COLUMN: &str = "is_evaluated";

/// Annotation track identifier column.
pub const TRACK_UUID_COLUMN: &str = "track_uuid";

/// Number of lidar points interior to an annotation.
pub const NUM_INTERIOR_PTS_COLUMN: &str = "num_interior_pts";

/// Row label of the averaged metrics in the summary table.
pub const AVERAGE_METRICS_ROW: &str = "AVERAGE_METRICS";
