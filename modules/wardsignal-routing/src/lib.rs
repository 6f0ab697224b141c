pub mod format;
pub mod gateway;
pub mod nearest;
pub mod osrm;

pub use format::{format_distance, format_duration};
pub use gateway::{RouteEstimate, RouteSource, RoutingGateway};
pub use nearest::{find_nearest_report, NearestReport};
pub use osrm::OsrmRouter;
