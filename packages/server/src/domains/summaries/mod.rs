//! Cached post summaries.

pub mod store;

pub use store::{PgSummaryStore, Summary, SummaryStore};
