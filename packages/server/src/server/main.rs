// Main entry point for the API server

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server_core::config::Config;
use server_core::domains::fetch::{FetchConfig, FetchExecutor};
use server_core::kernel::{
    BaseHistorySource, BaseSummarizer, FetchScheduler, HttpSummarizer, SchedulerConfig,
    ServerKernel, TelegramWebSource,
};
use server_core::server::build_app;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting channel intel API");

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = match &config.database_url {
        Some(url) => match PgPoolOptions::new().max_connections(10).connect(url).await {
            Ok(pool) => {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run migrations")?;
                Some(pool)
            }
            Err(err) => {
                tracing::error!(error = %err, "Database unavailable - fetch pipeline disabled");
                None
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set - fetch pipeline disabled");
            None
        }
    };

    let history_source: Arc<dyn BaseHistorySource> = Arc::new(
        TelegramWebSource::new(config.tg_proxy_url.as_deref())
            .context("Failed to create Telegram client")?,
    );
    let summarizer: Arc<dyn BaseSummarizer> = Arc::new(HttpSummarizer::new(
        config.ai_summary_endpoint.clone(),
        config.ai_summary_model_id.clone(),
    )?);

    let kernel = Arc::new(match pool {
        Some(pool) => ServerKernel::with_pool(pool, history_source, summarizer),
        None => ServerKernel::new(None, None, history_source, summarizer),
    });

    let mut scheduler = None;
    if let Some(stores) = kernel.stores() {
        let executor = Arc::new(FetchExecutor::new(
            stores.channels.clone(),
            stores.jobs.clone(),
            stores.posts.clone(),
            kernel.history_source.clone(),
            FetchConfig::default(),
        ));
        let mut fetch_scheduler = FetchScheduler::new(
            stores.channels.clone(),
            stores.jobs.clone(),
            executor,
            SchedulerConfig {
                discovery_interval: std::time::Duration::from_secs(config.cron_fetch_minutes * 60),
                drain_interval: std::time::Duration::from_secs(config.drain_interval_secs),
                drain_batch_size: config.drain_batch_size,
                stale_after_minutes: config.stale_job_minutes,
            },
        );
        fetch_scheduler
            .start()
            .await
            .context("Failed to start fetch scheduler")?;
        scheduler = Some(fetch_scheduler);
    }

    let app = build_app(kernel);
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    axum::serve(listener, app).await.context("Server error")?;

    if let Some(mut scheduler) = scheduler {
        scheduler.shutdown().await?;
    }
    Ok(())
}
