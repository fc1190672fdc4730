#![allow(dead_code)]

use db_sandbox::{Sandbox, SandboxBuilder};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, SqlxMySqlConnector, Statement};

// Logging is auto-installed for every test binary that includes this module
#[ctor::ctor]
fn init_logging() {
    sandbox_test_support::logging::init();
}

/// Builder pointed at a port nothing listens on.
pub fn unreachable_builder() -> SandboxBuilder {
    Sandbox::builder().env_lookup(|name| (name == "MYSQL_PORT").then(|| "1".to_string()))
}

/// Privileged connection for checking server state from outside a sandbox.
pub async fn admin_conn() -> DatabaseConnection {
    let config = Sandbox::builder()
        .resolve()
        .expect("admin configuration should resolve");
    let pool = sqlx::MySqlPool::connect_with(config.admin_options())
        .await
        .expect("admin connection should open");
    SqlxMySqlConnector::from_sqlx_mysql_pool(pool)
}

pub async fn database_exists(admin: &DatabaseConnection, name: &str) -> bool {
    let row = admin
        .query_one(Statement::from_sql_and_values(
            DbBackend::MySql,
            "SELECT COUNT(*) AS n FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
            [name.into()],
        ))
        .await
        .expect("schema lookup should succeed")
        .expect("COUNT(*) always returns a row");
    row.try_get::<i64>("", "n").expect("n should be an integer") > 0
}

pub async fn user_exists(admin: &DatabaseConnection, user: &str) -> bool {
    let row = admin
        .query_one(Statement::from_sql_and_values(
            DbBackend::MySql,
            "SELECT COUNT(*) AS n FROM mysql.user WHERE User = ? AND Host = '%'",
            [user.into()],
        ))
        .await
        .expect("user lookup should succeed")
        .expect("COUNT(*) always returns a row");
    row.try_get::<i64>("", "n").expect("n should be an integer") > 0
}

pub async fn select_items(conn: &DatabaseConnection, table: &str) -> Vec<String> {
    conn.query_all(Statement::from_string(
        DbBackend::MySql,
        format!("SELECT item FROM {table} ORDER BY id"),
    ))
    .await
    .expect("select should succeed")
    .iter()
    .map(|row| row.try_get::<String>("", "item").expect("item column"))
    .collect()
}
