//! `ServerKernel` - the dependency bundle handed to the HTTP layer and the
//! scheduler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::domains::channels::{ChannelDirectory, PgChannelDirectory};
use crate::domains::fetch::{FetchJobStore, PgFetchJobStore};
use crate::domains::posts::{PgPostStore, PostStore};
use crate::domains::summaries::{PgSummaryStore, SummaryStore};

use super::traits::{BaseHistorySource, BaseSummarizer};

/// Storage-backed dependencies. Absent when no database is configured: the
/// process still serves, data routes answer 503 and the pipeline is off.
pub struct Stores {
    pub channels: Arc<dyn ChannelDirectory>,
    pub jobs: Arc<dyn FetchJobStore>,
    pub posts: Arc<dyn PostStore>,
    pub summaries: Arc<dyn SummaryStore>,
}

pub struct ServerKernel {
    pub db: Option<PgPool>,
    stores: Option<Stores>,
    pub history_source: Arc<dyn BaseHistorySource>,
    pub summarizer: Arc<dyn BaseSummarizer>,
}

impl ServerKernel {
    pub fn new(
        db: Option<PgPool>,
        stores: Option<Stores>,
        history_source: Arc<dyn BaseHistorySource>,
        summarizer: Arc<dyn BaseSummarizer>,
    ) -> Self {
        Self {
            db,
            stores,
            history_source,
            summarizer,
        }
    }

    /// Wire up the Postgres-backed stores over one shared pool.
    pub fn with_pool(
        pool: PgPool,
        history_source: Arc<dyn BaseHistorySource>,
        summarizer: Arc<dyn BaseSummarizer>,
    ) -> Self {
        let stores = Stores {
            channels: Arc::new(PgChannelDirectory::new(pool.clone())),
            jobs: Arc::new(PgFetchJobStore::new(pool.clone())),
            posts: Arc::new(PgPostStore::new(pool.clone())),
            summaries: Arc::new(PgSummaryStore::new(pool.clone())),
        };
        Self {
            db: Some(pool),
            stores: Some(stores),
            history_source,
            summarizer,
        }
    }

    pub fn stores(&self) -> Option<&Stores> {
        self.stores.as_ref()
    }
}
