//! Sandbox options.
//!
//! Scalar options are last-writer-wins, statement options append, and
//! connection mutators accumulate in registration order. Address,
//! credentials and database of the final connection parameters are owned by
//! the sandbox and always applied after the mutators.

use std::sync::Arc;

use sqlx::mysql::MySqlConnectOptions;

use crate::config::env::{
    get_env, is_truthy, process_env, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_ROOT_PASSWORD,
    DEFAULT_ROOT_USER,
};
use crate::config::{ConnectMutator, EnvLookup, EnvNames, ProbePolicy, SandboxConfig};
use crate::error::SandboxError;
use crate::sandbox::{self, SandboxDb};

/// Builder for one sandbox. Obtain it with [`crate::Sandbox::builder`].
///
/// # Example
/// ```no_run
/// use db_sandbox::Sandbox;
///
/// # async fn example() -> Result<(), db_sandbox::SandboxError> {
/// let db = Sandbox::builder()
///     .root_credentials("root", "root")
///     .initial_query("CREATE TABLE todos (id INT AUTO_INCREMENT PRIMARY KEY, item VARCHAR(255) NOT NULL)")
///     .setup()
///     .await?;
/// // ... use db.conn() ...
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SandboxBuilder {
    env_names: EnvNames,
    env: EnvLookup,
    root_credentials: Option<(String, String)>,
    preserve: bool,
    verbose: bool,
    mutators: Vec<ConnectMutator>,
    initial_queries: Vec<String>,
    probe: ProbePolicy,
}

impl SandboxBuilder {
    pub fn new() -> Self {
        Self {
            env_names: EnvNames::default(),
            env: process_env(),
            root_credentials: None,
            preserve: false,
            verbose: false,
            mutators: Vec::new(),
            initial_queries: Vec::new(),
            probe: ProbePolicy::default(),
        }
    }

    /// Administrative user and password. Takes precedence over the environment.
    pub fn root_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.root_credentials = Some((user.into(), password.into()));
        self
    }

    /// Keep the database and user after the test for inspection.
    pub fn preserve(mut self) -> Self {
        self.preserve = true;
        self
    }

    /// Log connection details at `info` level during setup.
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Mutate the driver's connection parameters (timeouts, charset, TLS,
    /// unix socket, ...).
    ///
    /// Host, port, username, password and database are overwritten after
    /// every mutator has run; changes to them are discarded.
    pub fn modify_connect_options<F>(mut self, f: F) -> Self
    where
        F: Fn(MySqlConnectOptions) -> MySqlConnectOptions + Send + Sync + 'static,
    {
        self.mutators.push(Arc::new(f));
        self
    }

    /// Append one statement to run as the sandbox user after provisioning.
    pub fn initial_query(mut self, query: impl Into<String>) -> Self {
        self.initial_queries.push(query.into());
        self
    }

    /// Append several statements, in order.
    pub fn initial_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_queries
            .extend(queries.into_iter().map(Into::into));
        self
    }

    /// Read the admin host from `name` instead of `MYSQL_HOST`.
    pub fn host_env(mut self, name: impl Into<String>) -> Self {
        self.env_names.host = name.into();
        self
    }

    /// Read the admin port from `name` instead of `MYSQL_PORT`.
    pub fn port_env(mut self, name: impl Into<String>) -> Self {
        self.env_names.port = name.into();
        self
    }

    /// Read the admin user from `name` instead of `MYSQL_ROOT_USER`.
    pub fn root_user_env(mut self, name: impl Into<String>) -> Self {
        self.env_names.root_user = name.into();
        self
    }

    /// Read the admin password from `name` instead of `MYSQL_ROOT_PASSWORD`.
    pub fn root_password_env(mut self, name: impl Into<String>) -> Self {
        self.env_names.root_password = name.into();
        self
    }

    /// Read the preserve flag from `name` instead of `PRESERVE_TEST_DB`.
    pub fn preserve_env(mut self, name: impl Into<String>) -> Self {
        self.env_names.preserve = name.into();
        self
    }

    pub fn probe_policy(mut self, probe: ProbePolicy) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the process environment as the source of overrides.
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    pub fn env_names(&self) -> &EnvNames {
        &self.env_names
    }

    /// Merge defaults, environment and options into the effective configuration.
    pub fn resolve(self) -> Result<SandboxConfig, SandboxError> {
        let names = &self.env_names;

        let host = get_env(&self.env, &names.host).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get_env(&self.env, &names.port) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                SandboxError::config(format!("invalid port '{raw}' in {}: {e}", names.port))
            })?,
            None => DEFAULT_PORT,
        };

        let (root_user, root_password) = match self.root_credentials {
            Some(creds) => creds,
            None => (
                get_env(&self.env, &names.root_user)
                    .unwrap_or_else(|| DEFAULT_ROOT_USER.to_string()),
                get_env(&self.env, &names.root_password)
                    .unwrap_or_else(|| DEFAULT_ROOT_PASSWORD.to_string()),
            ),
        };

        let preserve = self.preserve
            || get_env(&self.env, &names.preserve).is_some_and(|v| is_truthy(&v));

        if self.probe.max_attempts == 0 {
            return Err(SandboxError::config("probe policy needs at least one attempt"));
        }

        Ok(SandboxConfig {
            host,
            port,
            root_user,
            root_password,
            preserve,
            verbose: self.verbose,
            initial_queries: self.initial_queries,
            probe: self.probe,
            mutators: self.mutators,
        })
    }

    /// Resolve, then provision a sandbox and hand back its scoped connection.
    pub async fn setup(self) -> Result<SandboxDb, SandboxError> {
        let config = self.resolve()?;
        sandbox::setup(config).await
    }
}

impl Default for SandboxBuilder {
    fn default() -> Self {
        Self::new()
    }
}
