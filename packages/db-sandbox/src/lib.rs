//! Disposable MySQL databases for tests.
//!
//! Each sandbox is a freshly created database plus a user that can only
//! reach that database. Setup runs caller-supplied statements as that user
//! and hands back the connection; teardown drops both again unless the
//! caller asked to keep them.
//!
//! ```no_run
//! use db_sandbox::Sandbox;
//! use sea_orm::ConnectionTrait;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Sandbox::builder()
//!     .initial_query("CREATE TABLE todos (id INT AUTO_INCREMENT PRIMARY KEY, item VARCHAR(255) NOT NULL)")
//!     .setup()
//!     .await?;
//! db.conn()
//!     .execute_unprepared("INSERT INTO todos (item) VALUES ('Buy milk')")
//!     .await?;
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod infra;
pub mod sandbox;

pub use builder::SandboxBuilder;
pub use config::{EnvNames, ProbePolicy, SandboxConfig};
pub use error::{ProvisionStep, SandboxError, TeardownStep};
pub use infra::ident::DATABASE_PREFIX;
pub use infra::probe::{Liveness, SqlExecutor};
pub use infra::provision::ProvisionedIdentity;
pub use sandbox::{Sandbox, SandboxDb, TeardownGuard};

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    sandbox_test_support::logging::init();
}
