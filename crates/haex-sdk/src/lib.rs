//! Client SDK for HaexVault extensions.
//!
//! Every operation is a typed [`HostRequest`] sent through an injected
//! [`RequestGateway`]; the host owns storage, validation and migration state.

pub mod client;
pub mod database;
pub mod gateway;
pub mod migrations;
pub mod protocol;

pub use client::HaexClient;
pub use database::{Database, ExecuteResult, QueryResult};
pub use gateway::RequestGateway;
pub use haex_common::{Error, ExtensionInfo, FailurePolicy, HostError, Result, SqlValue};
pub use migrations::{
    FailedMigration, Migration, MigrationRegistrar, MigrationRegistration, MigrationResult,
    load_migrations_dir,
};
pub use protocol::{HostRequest, HostResponse, SqlStatement};

/// Build a `Vec<SqlValue>` of bound parameters.
///
/// ```
/// use haex_sdk::{SqlValue, sql_params};
///
/// let params = sql_params![1, "two", None::<i64>];
/// assert_eq!(params[1], SqlValue::Text("two".into()));
/// ```
#[macro_export]
macro_rules! sql_params {
    () => {
        ::std::vec::Vec::<$crate::SqlValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::SqlValue::from($value)),+]
    };
}
