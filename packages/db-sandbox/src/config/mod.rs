//! Configuration of a sandbox: environment variable names and defaults, and
//! the effective configuration every later stage consumes.

pub mod env;
pub mod sandbox;

pub use env::{EnvLookup, EnvNames};
pub use sandbox::{ConnectMutator, ProbePolicy, SandboxConfig, ADMIN_DATABASE};
