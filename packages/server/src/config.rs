//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Optional: without it the process still
    /// serves `/healthz`, but data routes return 503 and the fetch pipeline
    /// is disabled.
    pub database_url: Option<String>,
    pub port: u16,

    /// Minutes between discovery ticks (one fetch job per active channel).
    pub cron_fetch_minutes: u64,
    /// Seconds between queue drain ticks.
    pub drain_interval_secs: u64,
    /// Jobs claimed per drain tick.
    pub drain_batch_size: i64,
    /// A `running` job older than this is considered abandoned and re-queued.
    pub stale_job_minutes: i64,

    /// Optional HTTP(S)/SOCKS proxy for reaching t.me.
    pub tg_proxy_url: Option<String>,

    pub ai_summary_endpoint: Option<String>,
    pub ai_summary_model_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            port: parse_var("PORT", 8080)?,
            cron_fetch_minutes: parse_var("CRON_FETCH_MINUTES", 5)?,
            drain_interval_secs: parse_var("DRAIN_INTERVAL_SECS", 15)?,
            drain_batch_size: parse_var("DRAIN_BATCH_SIZE", 3)?,
            stale_job_minutes: parse_var("STALE_JOB_MINUTES", 30)?,
            tg_proxy_url: env::var("TG_PROXY_URL").ok().filter(|v| !v.is_empty()),
            ai_summary_endpoint: env::var("AI_SUMMARY_ENDPOINT").ok().filter(|v| !v.is_empty()),
            ai_summary_model_id: env::var("AI_SUMMARY_MODEL_ID").ok().filter(|v| !v.is_empty()),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .with_context(|| format!("Invalid value for {name}: {raw}")),
        _ => Ok(default),
    }
}
