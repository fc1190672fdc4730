//! Infrastructure layer - identifiers, connections, probing and the
//! privileged statements that create and remove a sandbox.

pub mod admin;
pub mod ident;
pub mod probe;
pub mod provision;
