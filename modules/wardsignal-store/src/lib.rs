mod row;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use store::PgReportStore;
