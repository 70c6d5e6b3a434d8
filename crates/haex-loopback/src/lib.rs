//! A local stand-in for the HaexVault host.
//!
//! [`LoopbackHost`] answers SDK requests against a SQLite database while
//! enforcing the host side of the protocol: table namespacing, idempotent
//! migration registration, name-ordered application and a configurable
//! failure policy.

pub mod guard;
pub mod host;
pub mod ledger;

mod convert;

pub use guard::{NamespaceGuard, referenced_tables};
pub use host::{LoopbackHost, error_code};
pub use ledger::AppliedMigration;
