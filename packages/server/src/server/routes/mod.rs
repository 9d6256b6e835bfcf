pub mod channels;
pub mod health;
pub mod posts;
pub mod summaries;
