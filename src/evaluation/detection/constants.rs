//! Constants used in the detection evaluation.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Max scale error.
pub const MAX_SCALE_ERROR: f32 = 1.0;
/// Max yaw error in radians.
pub const MAX_YAW_RAD_ERROR: f32 = std::f32::consts::PI;

/// Minimum average precision.
pub const MIN_AP: f32 = 0.0;
/// Minimum composite detection score.
pub const MIN_CDS: f32 = 0.0;

/// Number of decimals the summary metrics are rounded to.
pub const NUM_DECIMALS: u32 = 3;

/// Number of true positive error kinds (translation, scale, orientation).
pub const NUM_TP_ERRORS: usize = 3;

/// Detection competition categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetitionCategories {
    ArticulatedBus,
    Bicycle,
    Bicyclist,
    Bollard,
    BoxTruck,
    Bus,
    ConstructionBarrel,
    ConstructionCone,
    Dog,
    LargeVehicle,
    MessageBoardTrailer,
    MobilePedestrianCrossingSign,
    Motorcycle,
    Motorcyclist,
    Pedestrian,
    RegularVehicle,
    SchoolBus,
    Sign,
    StopSign,
    Stroller,
    Truck,
    TruckCab,
    VehicularTrailer,
    #[strum(serialize = "WHEELCHAIR")]
    WheelChair,
    WheeledDevice,
    WheeledRider,
}

/// Summary metric columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum MetricNames {
    /// Average precision.
    AP,
    /// Average translation error.
    ATE,
    /// Average scale error.
    ASE,
    /// Average orientation error.
    AOE,
    /// Composite detection score.
    CDS,
}

/// True positive error columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum TruePositiveErrorNames {
    /// Average translation error.
    ATE,
    /// Average scale error.
    ASE,
    /// Average orientation error.
    AOE,
}

/// Affinity types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Serialize, Deserialize)]
pub enum AffinityType {
    /// Bird's-eye-view Euclidean distance between cuboid centers.
    Center,
}

/// Filter metric types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Serialize, Deserialize)]
pub enum FilterMetricType {
    /// 3D Euclidean distance-based filtering.
    Euclidean,
}

/// True positive distance types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceType {
    /// 3D Euclidean distance between centers.
    Translation,
    /// 1 - IoU of the pose-aligned cuboids.
    Scale,
    /// Smallest heading difference.
    Orientation,
}
