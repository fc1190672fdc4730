//! Privileged statements that create and remove a sandbox.
//!
//! Provisioning does not roll back: if a later step fails, objects created
//! by earlier steps stay on the server and are named in the error.

use std::fmt;

use sea_orm::DbErr;
use tracing::debug;

use crate::error::{ProvisionStep, SandboxError, TeardownStep};
use crate::infra::ident::{random_database_name, random_suffix};
use crate::infra::probe::{Liveness, SqlExecutor};

pub const FLUSH_PRIVILEGES: &str = "FLUSH PRIVILEGES";

/// Generated user, password and database of one sandbox.
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisionedIdentity {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ProvisionedIdentity {
    /// Draw fresh identifiers for a new sandbox.
    pub fn generate() -> Result<Self, SandboxError> {
        Ok(Self {
            user: random_suffix()?,
            password: random_suffix()?,
            database: random_database_name()?,
        })
    }
}

impl fmt::Debug for ProvisionedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedIdentity")
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

// Identifiers come from `ident`, whose alphabet needs no escaping.

pub fn create_user_sql(user: &str, password: &str) -> String {
    format!("CREATE USER '{user}'@'%' IDENTIFIED BY '{password}'")
}

pub fn create_database_sql(database: &str) -> String {
    format!("CREATE DATABASE `{database}`")
}

pub fn grant_sql(database: &str, user: &str) -> String {
    format!("GRANT ALL ON `{database}`.* TO '{user}'@'%'")
}

pub fn drop_user_sql(user: &str) -> String {
    format!("DROP USER '{user}'@'%'")
}

pub fn drop_database_sql(database: &str) -> String {
    format!("DROP DATABASE `{database}`")
}

/// Create a user, a database, and a grant of the database to the user.
pub async fn provision<E>(admin: &E) -> Result<ProvisionedIdentity, SandboxError>
where
    E: SqlExecutor + ?Sized,
{
    let identity = ProvisionedIdentity::generate()?;
    provision_identity(admin, &identity).await?;
    Ok(identity)
}

pub(crate) async fn provision_identity<E>(
    admin: &E,
    identity: &ProvisionedIdentity,
) -> Result<(), SandboxError>
where
    E: SqlExecutor + ?Sized,
{
    let ProvisionedIdentity {
        user,
        password,
        database,
    } = identity;

    let steps = [
        (ProvisionStep::CreateUser, create_user_sql(user, password)),
        (ProvisionStep::CreateDatabase, create_database_sql(database)),
        (ProvisionStep::Grant, grant_sql(database, user)),
        (ProvisionStep::FlushPrivileges, FLUSH_PRIVILEGES.to_string()),
    ];

    for (step, sql) in steps {
        debug!(step = %step, sandbox_user = %user, sandbox_db = %database, "provision");
        admin
            .execute_sql(&sql)
            .await
            .map_err(|source| SandboxError::Provision {
                step,
                leftovers: leftovers_before(step, identity),
                source,
            })?;
    }
    Ok(())
}

/// Objects that exist on the server when `failed` fails.
fn leftovers_before(failed: ProvisionStep, identity: &ProvisionedIdentity) -> String {
    match failed {
        ProvisionStep::CreateUser => "nothing".to_string(),
        ProvisionStep::CreateDatabase => format!("user '{}'@'%'", identity.user),
        ProvisionStep::Grant | ProvisionStep::FlushPrivileges => format!(
            "user '{}'@'%', database `{}`",
            identity.user, identity.database
        ),
    }
}

/// Drop the user, then the database.
///
/// Both objects must exist: dropping something already gone is reported as
/// a failure so that outside interference does not go unnoticed. An admin
/// connection that cannot reach the server fails at `connect`, before any
/// statement is sent.
pub async fn teardown<E>(admin: &E, identity: &ProvisionedIdentity) -> Result<(), SandboxError>
where
    E: SqlExecutor + ?Sized,
{
    Liveness::ping(admin)
        .await
        .map_err(|e| teardown_failed(TeardownStep::Connect, identity, e))?;

    let steps = [
        (TeardownStep::DropUser, drop_user_sql(&identity.user)),
        (TeardownStep::DropDatabase, drop_database_sql(&identity.database)),
    ];

    for (step, sql) in steps {
        debug!(step = %step, sandbox_user = %identity.user, sandbox_db = %identity.database, "teardown");
        admin
            .execute_sql(&sql)
            .await
            .map_err(|e| teardown_failed(step, identity, e))?;
    }
    Ok(())
}

pub(crate) fn teardown_failed(
    step: TeardownStep,
    identity: &ProvisionedIdentity,
    e: DbErr,
) -> SandboxError {
    SandboxError::Teardown {
        step,
        user: identity.user.clone(),
        database: identity.database.clone(),
        detail: e.to_string(),
    }
}
