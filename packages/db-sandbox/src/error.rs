use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

/// Provisioning steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    CreateUser,
    CreateDatabase,
    Grant,
    FlushPrivileges,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionStep::CreateUser => "CREATE USER",
            ProvisionStep::CreateDatabase => "CREATE DATABASE",
            ProvisionStep::Grant => "GRANT",
            ProvisionStep::FlushPrivileges => "FLUSH PRIVILEGES",
        };
        f.write_str(s)
    }
}

/// Teardown steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    Connect,
    DropUser,
    DropDatabase,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeardownStep::Connect => "connect",
            TeardownStep::DropUser => "DROP USER",
            TeardownStep::DropDatabase => "DROP DATABASE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("db-sandbox: configuration error: {message}")]
    Config { message: String },

    #[error("db-sandbox: entropy source unavailable: {detail}")]
    Entropy { detail: String },

    #[error("db-sandbox: failed to connect to the database after {attempts} attempts: {detail}")]
    Unavailable { attempts: u32, detail: String },

    #[error("db-sandbox: provisioning failed at {step} (left behind: {leftovers}): {source}")]
    Provision {
        step: ProvisionStep,
        leftovers: String,
        #[source]
        source: DbErr,
    },

    #[error(
        "db-sandbox: initial statement #{index} failed (database '{database}', user '{user}'): {statement}: {source}"
    )]
    InitialStatement {
        index: usize,
        statement: String,
        user: String,
        database: String,
        #[source]
        source: DbErr,
    },

    #[error(
        "db-sandbox: failed to teardown at {step} (database '{database}', user '{user}'): {detail}"
    )]
    Teardown {
        step: TeardownStep,
        user: String,
        database: String,
        detail: String,
    },
}

impl SandboxError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
