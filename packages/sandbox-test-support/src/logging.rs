//! Test logging for the sandbox crates.
//!
//! Setup reports probe retries at `warn`, connection targets at `debug`
//! (`info` with `verbose()`), and preserved or failed teardowns through
//! `tracing`. Each test binary installs this once from a `ctor`, so those
//! lines end up in the captured output of the test that produced them.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

/// Consulted in order; the first non-empty one wins.
const FILTER_VARS: [&str; 2] = ["TEST_LOG", "RUST_LOG"];

/// Quiet unless something goes wrong, e.g. the server is slow to answer.
const DEFAULT_FILTER: &str = "warn";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install the test subscriber. Idempotent and race-safe.
///
/// ```bash
/// # show provisioning and teardown steps
/// TEST_LOG=db_sandbox=debug cargo test -p db-sandbox
/// ```
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::new(directive(|name| std::env::var(name).ok()));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok(); // a harness may have installed its own subscriber first
    });
}

fn directive(get: impl Fn(&str) -> Option<String>) -> String {
    FILTER_VARS
        .iter()
        .find_map(|name| get(name).filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}
