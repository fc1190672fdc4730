//! Sandbox lifecycle: provision, hand off the scoped connection, tear down.
//!
//! ```text
//! resolve config -> probe -> open admin -> provision (user, db, grant)
//!   -> register teardown -> open scoped -> initial statements -> ready
//! ```
//!
//! Any failure ends setup with an error. Once provisioning has succeeded the
//! teardown is registered and runs on every later exit path: explicitly via
//! [`SandboxDb::close`], or on drop.

use sea_orm::{DatabaseConnection, DbErr};
use sqlx::mysql::MySqlConnectOptions;
use tracing::{debug, error, info, warn};

use crate::builder::SandboxBuilder;
use crate::config::SandboxConfig;
use crate::error::{SandboxError, TeardownStep};
use crate::infra::admin::{open_admin, open_scoped, ConnRole, ACQUIRE_TIMEOUT};
use crate::infra::probe::{wait_until_available, DirectProbe, Liveness, SqlExecutor};
use crate::infra::provision::{self, ProvisionedIdentity};

/// Entry point.
pub struct Sandbox;

impl Sandbox {
    /// Start configuring a new sandbox.
    pub fn builder() -> SandboxBuilder {
        SandboxBuilder::new()
    }
}

pub(crate) async fn setup(config: SandboxConfig) -> Result<SandboxDb, SandboxError> {
    wait_until_available(&DirectProbe::new(config.admin_options()), config.probe()).await?;

    let admin = open_admin(&config, ConnRole::Admin);
    let provisioned = provision::provision(&admin).await;
    // the admin connection is not kept for the test's lifetime
    close_quietly(admin, ConnRole::Admin).await;
    let identity = provisioned?;

    let mut teardown = TeardownGuard::new(config.clone(), identity.clone());

    let conn = open_scoped(&config, &identity);
    if let Err(e) = run_initial_statements(&conn, config.initial_queries(), &identity).await {
        close_quietly(conn, ConnRole::Session).await;
        return Err(abandon(&mut teardown, e).await);
    }

    info!(
        sandbox_db = %identity.database,
        sandbox_user = %identity.user,
        preserve = config.preserve(),
        "db-sandbox: ready"
    );

    Ok(SandboxDb {
        conn,
        identity,
        config,
        teardown,
    })
}

/// Tear down a sandbox whose handoff failed and hand back `cause`.
///
/// A teardown failure on this path is logged; the caller sees the error
/// that ended setup.
async fn abandon(teardown: &mut TeardownGuard, cause: SandboxError) -> SandboxError {
    if let Err(teardown_err) = teardown.run().await {
        error!(error = %teardown_err, "db-sandbox: teardown after failed setup also failed");
    }
    cause
}

/// Execute `queries` in order as `identity`, stopping at the first failure.
pub async fn run_initial_statements<E>(
    conn: &E,
    queries: &[String],
    identity: &ProvisionedIdentity,
) -> Result<(), SandboxError>
where
    E: SqlExecutor + ?Sized,
{
    for (index, query) in queries.iter().enumerate() {
        debug!(index, "db-sandbox: initial statement");
        conn.execute_sql(query)
            .await
            .map_err(|source| SandboxError::InitialStatement {
                index,
                statement: query.clone(),
                user: identity.user.clone(),
                database: identity.database.clone(),
                source,
            })?;
    }
    Ok(())
}

async fn close_quietly(conn: DatabaseConnection, role: ConnRole) {
    if let Err(e) = conn.close().await {
        warn!(role = ?role, error = %e, "db-sandbox: failed to close database connection");
    }
}

/// A provisioned sandbox and its open scoped connection.
///
/// Call [`SandboxDb::close`] at the end of the test to observe teardown
/// errors as a `Result`. Dropping the handle instead runs the same teardown
/// on a helper thread and panics if it fails.
pub struct SandboxDb {
    // dropped before `teardown`
    conn: DatabaseConnection,
    identity: ProvisionedIdentity,
    config: SandboxConfig,
    teardown: TeardownGuard,
}

impl SandboxDb {
    /// Connection authenticated as the sandbox user.
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn database(&self) -> &str {
        &self.identity.database
    }

    pub fn user(&self) -> &str {
        &self.identity.user
    }

    pub fn password(&self) -> &str {
        &self.identity.password
    }

    pub fn identity(&self) -> &ProvisionedIdentity {
        &self.identity
    }

    /// Connection parameters for the sandbox user, for opening extra
    /// connections with the driver directly.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        self.config.scoped_options(&self.identity)
    }

    /// Close the scoped connection, then tear down (or keep, when
    /// preservation was requested) the database and user.
    ///
    /// A failure to close the connection is only logged.
    pub async fn close(self) -> Result<(), SandboxError> {
        let SandboxDb {
            conn, mut teardown, ..
        } = self;
        close_quietly(conn, ConnRole::Session).await;
        teardown.run().await
    }
}

impl std::fmt::Debug for SandboxDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxDb")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Registered teardown of one sandbox. Runs at most once.
pub struct TeardownGuard {
    plan: Option<TeardownPlan>,
}

struct TeardownPlan {
    config: SandboxConfig,
    identity: ProvisionedIdentity,
}

impl TeardownPlan {
    async fn execute(self) -> Result<(), SandboxError> {
        if self.config.preserve() {
            info!(
                "db-sandbox: database '{}' and user '{}' are preserved",
                self.identity.database, self.identity.user
            );
            return Ok(());
        }

        let reachable = tokio::time::timeout(
            ACQUIRE_TIMEOUT,
            DirectProbe::new(self.config.admin_options()).ping(),
        )
        .await
        .unwrap_or_else(|_| Err(DbErr::Custom("liveness check timed out".to_string())));
        if let Err(e) = reachable {
            return Err(provision::teardown_failed(TeardownStep::Connect, &self.identity, e));
        }

        // the provisioning connection is gone by now; open a new one
        let admin = open_admin(&self.config, ConnRole::Teardown);
        let result = provision::teardown(&admin, &self.identity).await;
        close_quietly(admin, ConnRole::Teardown).await;

        if result.is_ok() {
            debug!(sandbox_db = %self.identity.database, sandbox_user = %self.identity.user, "db-sandbox: torn down");
        }
        result
    }
}

impl TeardownGuard {
    fn new(config: SandboxConfig, identity: ProvisionedIdentity) -> Self {
        Self {
            plan: Some(TeardownPlan { config, identity }),
        }
    }

    /// True until the teardown has run.
    pub fn is_pending(&self) -> bool {
        self.plan.is_some()
    }

    /// Run the teardown now. Later calls, and the drop, do nothing.
    pub async fn run(&mut self) -> Result<(), SandboxError> {
        match self.plan.take() {
            Some(plan) => plan.execute().await,
            None => Ok(()),
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(plan) = self.plan.take() else {
            return;
        };
        if let Err(e) = run_detached(plan) {
            if std::thread::panicking() {
                // keep the original failure visible
                error!(error = %e, "db-sandbox: teardown failed while unwinding");
            } else {
                panic!("{e}");
            }
        }
    }
}

/// Run a teardown to completion from synchronous code.
///
/// Uses its own thread and single-threaded runtime, so it works whether or
/// not the caller is inside a tokio runtime.
fn run_detached(plan: TeardownPlan) -> Result<(), SandboxError> {
    let identity = plan.identity.clone();
    let failed = move |detail: String| SandboxError::Teardown {
        step: TeardownStep::Connect,
        user: identity.user.clone(),
        database: identity.database.clone(),
        detail,
    };
    let failed_in_thread = failed.clone();

    let handle = std::thread::Builder::new()
        .name("db-sandbox-teardown".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| failed_in_thread(format!("failed to start runtime: {e}")))?;
            runtime.block_on(plan.execute())
        })
        .map_err(|e| failed(format!("failed to spawn teardown thread: {e}")))?;

    handle
        .join()
        .unwrap_or_else(|_| Err(failed("teardown thread panicked".to_string())))
}
