pub mod config;
pub mod error;
pub mod memory_store;
pub mod retry;
pub mod traits;
pub mod types;

#[cfg(feature = "test-support")]
pub mod testing;

pub use config::Config;
pub use error::{MergeRejected, Provider, TriageError};
pub use memory_store::MemoryReportStore;
pub use retry::RetryPolicy;
pub use traits::*;
pub use types::*;
