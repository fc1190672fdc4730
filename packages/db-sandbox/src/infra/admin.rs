use std::time::Duration;

use sea_orm::{DatabaseConnection, SqlxMySqlConnector};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tracing::{debug, info};

use crate::config::{SandboxConfig, ADMIN_DATABASE};
use crate::infra::provision::ProvisionedIdentity;

/// Acquire timeout for pooled connections. Pools are only opened once the
/// server has answered a liveness check, so this only guards against a
/// server that goes away mid-test.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Scoped sessions are handed to test code that may run queries concurrently.
const SESSION_MAX_CONNECTIONS: u32 = 5;

/// Which side of the sandbox a connection belongs to, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnRole {
    Admin,
    Teardown,
    Session,
}

/// Sanitize database URL by masking the password.
pub fn sanitize_db_url(url: &str) -> String {
    if let Some((auth_part, host_part)) = url.rsplit_once('@') {
        if let Some(colon_pos) = auth_part.rfind(':') {
            let scheme_user = &auth_part[..colon_pos];
            // `mysql://host` has no credentials, only the scheme separator
            if !scheme_user.is_empty() && !auth_part[colon_pos..].starts_with("://") {
                return format!("{}:***@{}", scheme_user, host_part);
            }
        }
    }
    url.to_string()
}

fn connection_url(config: &SandboxConfig, user: &str, password: &str, database: &str) -> String {
    format!(
        "mysql://{user}:{password}@{}/{database}",
        config.addr()
    )
}

fn log_connection(config: &SandboxConfig, role: ConnRole, user: &str, password: &str, database: &str) {
    let dsn = sanitize_db_url(&connection_url(config, user, password, database));
    if config.verbose() {
        info!(
            role = ?role,
            addr = %config.addr(),
            user = %user,
            database = %database,
            dsn = %dsn,
            "db-sandbox: connecting"
        );
    } else {
        debug!(role = ?role, addr = %config.addr(), user = %user, database = %database, "db-sandbox: connecting");
    }
}

fn lazy_connection(options: MySqlConnectOptions, max_connections: u32) -> DatabaseConnection {
    let pool = MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_lazy_with(options);
    SqlxMySqlConnector::from_sqlx_mysql_pool(pool)
}

/// Privileged connection, for provisioning (`ConnRole::Admin`) or for a
/// later teardown (`ConnRole::Teardown`). Each use opens its own.
pub fn open_admin(config: &SandboxConfig, role: ConnRole) -> DatabaseConnection {
    log_connection(
        config,
        role,
        config.root_user(),
        config.root_password(),
        ADMIN_DATABASE,
    );
    lazy_connection(config.admin_options(), 1)
}

/// Connection authenticated as the sandbox user, scoped to its database.
pub fn open_scoped(config: &SandboxConfig, identity: &ProvisionedIdentity) -> DatabaseConnection {
    log_connection(
        config,
        ConnRole::Session,
        &identity.user,
        &identity.password,
        &identity.database,
    );
    lazy_connection(config.scoped_options(identity), SESSION_MAX_CONNECTIONS)
}
