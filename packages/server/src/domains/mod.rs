//! Domain modules.

pub mod channels;
pub mod fetch;
pub mod posts;
pub mod summaries;
