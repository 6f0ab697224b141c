pub mod boundaries;
pub mod geometry;
pub mod stats;

pub use boundaries::BoundaryIndex;
pub use geometry::{haversine_distance, point_in_polygon, BoundingBox};
pub use stats::UnitStats;
