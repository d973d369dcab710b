//! Corkboard audit retention sweeper.
//!
//! Periodically deletes membership audit entries past their retention window.
//! Runs on its own schedule against the shared database; the sweep is
//! idempotent, so overlapping or restarted sweepers are harmless.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use corkboard_application::{AuditService, PermissionService};
use corkboard_core::AppError;
use corkboard_infrastructure::{
    PostgresAuditRepository, PostgresCustomRoleRepository, PostgresMembershipRepository,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct SweeperConfig {
    database_url: String,
    /// Global retention window in days; `None` means entries never expire
    /// unless a board sets its own window.
    global_max_age_days: Option<u32>,
    interval_seconds: u64,
}

impl SweeperConfig {
    fn load() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let global_max_age_days = match env::var("AUDIT_RETENTION_DAYS") {
            Ok(value) => Some(value.parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid AUDIT_RETENTION_DAYS: {error}"))
            })?),
            Err(_) => None,
        };

        let interval_seconds = env::var("SWEEP_INTERVAL_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(3_600);

        Ok(Self {
            database_url,
            global_max_age_days,
            interval_seconds,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SweeperConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    let permission_service = PermissionService::new(
        Arc::new(PostgresMembershipRepository::new(pool.clone())),
        Arc::new(PostgresCustomRoleRepository::new(pool.clone())),
    );
    let audit_service = AuditService::new(
        permission_service,
        Arc::new(PostgresAuditRepository::new(pool)),
    );

    info!(
        global_max_age_days = ?config.global_max_age_days,
        interval_seconds = config.interval_seconds,
        "corkboard-sweeper started"
    );

    loop {
        if let Err(error) = audit_service.sweep_expired(config.global_max_age_days).await {
            warn!(error = %error, "audit retention sweep failed");
        }

        tokio::time::sleep(Duration::from_secs(config.interval_seconds)).await;
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
