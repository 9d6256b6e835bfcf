//! Health check endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::kernel::ServerKernel;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: DatabaseHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn health_handler(
    State(kernel): State<Arc<ServerKernel>>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match &kernel.db {
        Some(pool) => {
            let probe = sqlx::query("SELECT 1").execute(pool);
            match tokio::time::timeout(Duration::from_secs(5), probe).await {
                Ok(Ok(_)) => DatabaseHealth {
                    status: "ok".to_string(),
                    error: None,
                },
                Ok(Err(err)) => DatabaseHealth {
                    status: "error".to_string(),
                    error: Some(err.to_string()),
                },
                Err(_) => DatabaseHealth {
                    status: "timeout".to_string(),
                    error: Some("health probe timed out".to_string()),
                },
            }
        }
        None => DatabaseHealth {
            status: "not_configured".to_string(),
            error: None,
        },
    };

    let healthy = database.status == "ok" || database.status == "not_configured";
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let status = if healthy { "ok" } else { "degraded" };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            database,
        }),
    )
}
