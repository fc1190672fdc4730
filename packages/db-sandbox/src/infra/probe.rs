use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, RuntimeErr};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ProbePolicy;
use crate::error::SandboxError;

/// Lightweight liveness check.
#[async_trait]
pub trait Liveness: Send + Sync {
    async fn ping(&self) -> Result<(), DbErr>;
}

/// The driver operations the sandbox needs from a connection.
#[async_trait]
pub trait SqlExecutor: Liveness {
    /// Run one statement over the text protocol, discarding any result.
    async fn execute_sql(&self, sql: &str) -> Result<(), DbErr>;
}

#[async_trait]
impl Liveness for DatabaseConnection {
    async fn ping(&self) -> Result<(), DbErr> {
        DatabaseConnection::ping(self).await
    }
}

#[async_trait]
impl SqlExecutor for DatabaseConnection {
    async fn execute_sql(&self, sql: &str) -> Result<(), DbErr> {
        self.execute_unprepared(sql).await.map(|_| ())
    }
}

/// Opens a dedicated connection per check.
///
/// A pool reports an unreachable server as an acquire timeout; a single
/// connection attempt surfaces the driver's own error (refused, access
/// denied, TLS) instead.
pub struct DirectProbe {
    options: MySqlConnectOptions,
}

impl DirectProbe {
    pub fn new(options: MySqlConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Liveness for DirectProbe {
    async fn ping(&self) -> Result<(), DbErr> {
        let mut conn = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(driver_err)?;
        let pinged = conn.ping().await.map_err(driver_err);
        if let Err(e) = conn.close().await {
            debug!(error = %e, "db-sandbox: failed to close probe connection");
        }
        pinged
    }
}

fn driver_err(e: sqlx::Error) -> DbErr {
    DbErr::Conn(RuntimeErr::Internal(e.to_string()))
}

/// Poll `conn` until it answers a liveness check or the policy is exhausted.
///
/// Attempts start one `interval` apart: a failed attempt that took less than
/// the interval is followed by a sleep for the remainder, so an unreachable
/// server costs about `max_attempts * interval` in total.
pub async fn wait_until_available<E>(conn: &E, policy: &ProbePolicy) -> Result<(), SandboxError>
where
    E: Liveness + ?Sized,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(policy.attempt_timeout, conn.ping()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "liveness check timed out after {}ms",
                policy.attempt_timeout.as_millis()
            )),
        };

        match outcome {
            Ok(()) => {
                if attempt > 1 {
                    info!(
                        "connection_retry=success attempts={} interval_ms={}",
                        attempt,
                        policy.interval.as_millis()
                    );
                } else {
                    debug!("connection_retry=not_needed");
                }
                return Ok(());
            }
            Err(e) => {
                if attempt < policy.max_attempts {
                    warn!(
                        "connection_retry=failed attempt={} max_attempts={} interval_ms={} err={}",
                        attempt,
                        policy.max_attempts,
                        policy.interval.as_millis(),
                        e
                    );
                    tokio::time::sleep(policy.interval.saturating_sub(started.elapsed())).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(SandboxError::Unavailable {
        attempts: policy.max_attempts,
        detail: last_error.unwrap_or_else(|| "no attempt was made".to_string()),
    })
}
