// Telegram Channel Intel - API Core
//
// This crate ingests public Telegram channel history into Postgres and serves
// it over a small HTTP API. Ingestion runs as a job pipeline: channels are
// registered, fetch jobs are queued per channel, and a scheduler drains the
// queue against the remote history source.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
