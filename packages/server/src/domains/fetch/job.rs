use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fetch_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FetchJob {
    pub id: i64,
    pub channel_id: i64,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub stats: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Outcome counters recorded on a successful job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobStats {
    pub inserted: i64,
    pub duration_s: f64,
}

impl JobStats {
    pub fn new(inserted: i64, duration_s: f64) -> Self {
        Self {
            inserted,
            duration_s: (duration_s * 1000.0).round() / 1000.0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn stats_round_duration_to_millis() {
        let stats = JobStats::new(7, 1.23456);
        assert_eq!(stats.duration_s, 1.235);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["inserted"], 7);
    }
}
