use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::MySqlConnectOptions;

use crate::infra::provision::ProvisionedIdentity;

/// Database the admin connection is pinned to. Always present and readable,
/// and every admin statement uses fully-qualified names.
pub const ADMIN_DATABASE: &str = "information_schema";

/// Caller-supplied mutation of the driver's connection parameters.
pub type ConnectMutator = Arc<dyn Fn(MySqlConnectOptions) -> MySqlConnectOptions + Send + Sync>;

/// Bounded liveness probing of the admin connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    pub max_attempts: u32,
    /// Spacing between the start of consecutive attempts.
    pub interval: Duration,
    /// Upper bound for a single attempt, including the driver's own
    /// connect retries.
    pub attempt_timeout: Duration,
}

impl ProbePolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    /// Worst-case wall-clock time spent probing an unreachable server.
    /// Saturates at [`Duration::MAX`].
    pub fn budget(&self) -> Duration {
        self.interval
            .max(self.attempt_timeout)
            .saturating_mul(self.max_attempts)
    }
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            interval: Self::DEFAULT_INTERVAL,
            attempt_timeout: Self::DEFAULT_INTERVAL,
        }
    }
}

/// Effective, immutable configuration of one sandbox.
///
/// Produced by [`crate::SandboxBuilder::resolve`]; every later stage reads it
/// and none mutates it.
#[derive(Clone)]
pub struct SandboxConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) root_user: String,
    pub(crate) root_password: String,
    pub(crate) preserve: bool,
    pub(crate) verbose: bool,
    pub(crate) initial_queries: Vec<String>,
    pub(crate) probe: ProbePolicy,
    pub(crate) mutators: Vec<ConnectMutator>,
}

impl SandboxConfig {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn root_user(&self) -> &str {
        &self.root_user
    }

    pub fn root_password(&self) -> &str {
        &self.root_password
    }

    pub fn preserve(&self) -> bool {
        self.preserve
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn initial_queries(&self) -> &[String] {
        &self.initial_queries
    }

    pub fn probe(&self) -> &ProbePolicy {
        &self.probe
    }

    /// `host:port`, for diagnostics.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Caller mutations in registration order, on a fresh parameter object.
    fn base_options(&self) -> MySqlConnectOptions {
        self.mutators
            .iter()
            .fold(MySqlConnectOptions::new(), |opts, mutate| mutate(opts))
    }

    /// Parameters for the privileged connection.
    ///
    /// Address, credentials and database are applied after the caller's
    /// mutations, so they always win.
    pub fn admin_options(&self) -> MySqlConnectOptions {
        self.base_options()
            .host(&self.host)
            .port(self.port)
            .username(&self.root_user)
            .password(&self.root_password)
            .database(ADMIN_DATABASE)
    }

    /// Parameters for a connection authenticated as `identity` and scoped to
    /// its database.
    pub fn scoped_options(&self, identity: &ProvisionedIdentity) -> MySqlConnectOptions {
        self.base_options()
            .host(&self.host)
            .port(self.port)
            .username(&identity.user)
            .password(&identity.password)
            .database(&identity.database)
    }
}

impl fmt::Debug for SandboxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("root_user", &self.root_user)
            .field("root_password", &"***")
            .field("preserve", &self.preserve)
            .field("verbose", &self.verbose)
            .field("initial_queries", &self.initial_queries)
            .field("probe", &self.probe)
            .field("mutators", &self.mutators.len())
            .finish()
    }
}
