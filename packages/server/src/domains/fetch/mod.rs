//! Fetch job pipeline: queue records and the executor that drains them.

pub mod executor;
pub mod job;
pub mod store;

pub use executor::{FetchConfig, FetchExecutor};
pub use job::{FetchJob, JobStats, JobStatus};
pub use store::{FetchJobStore, PgFetchJobStore};
