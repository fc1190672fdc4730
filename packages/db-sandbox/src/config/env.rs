use std::sync::Arc;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_ROOT_USER: &str = "root";
pub const DEFAULT_ROOT_PASSWORD: &str = "root";

/// Environment lookup used during resolution. Returns `None` for unset variables.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Names of the environment variables consulted when a sandbox is resolved.
///
/// Passed explicitly into resolution, so two sandboxes in the same process
/// can read different variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvNames {
    pub host: String,
    pub port: String,
    pub root_user: String,
    pub root_password: String,
    /// Boolean-like; see [`is_truthy`].
    pub preserve: String,
}

impl Default for EnvNames {
    fn default() -> Self {
        Self {
            host: "MYSQL_HOST".to_string(),
            port: "MYSQL_PORT".to_string(),
            root_user: "MYSQL_ROOT_USER".to_string(),
            root_password: "MYSQL_ROOT_PASSWORD".to_string(),
            preserve: "PRESERVE_TEST_DB".to_string(),
        }
    }
}

/// Reads the real process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|name| std::env::var(name).ok())
}

/// Look up `name`, treating empty values as unset.
pub fn get_env(lookup: &EnvLookup, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

/// Interpret a boolean-like environment value.
///
/// Anything other than `0`, `false`, `no` or `off` (case-insensitive, trimmed)
/// counts as set.
pub fn is_truthy(value: &str) -> bool {
    let v = value.trim();
    !(v.is_empty()
        || v == "0"
        || v.eq_ignore_ascii_case("false")
        || v.eq_ignore_ascii_case("no")
        || v.eq_ignore_ascii_case("off"))
}
