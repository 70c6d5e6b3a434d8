use haex_common::{Error, ExtensionInfo, Result, SqlValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::database::{ExecuteResult, QueryResult};
use crate::migrations::{MigrationRegistration, MigrationResult};

/// Maximum accepted serialized frame size in bytes.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Method identifiers the host recognizes.
pub mod method {
    pub const QUERY: &str = "haextension.db.query";
    pub const EXECUTE: &str = "haextension.db.execute";
    pub const TRANSACTION: &str = "haextension.db.transaction";
    pub const REGISTER_MIGRATIONS: &str = "haextension.db.register_migrations";
    pub const GET_EXTENSION_INFO: &str = "haextension.context.get";
}

/// One SQL statement with its bound parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Every request an extension can send to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum HostRequest {
    #[serde(rename = "haextension.db.query")]
    Query(SqlStatement),
    #[serde(rename = "haextension.db.execute")]
    Execute(SqlStatement),
    #[serde(rename = "haextension.db.transaction")]
    Transaction(Vec<SqlStatement>),
    #[serde(rename = "haextension.db.register_migrations")]
    RegisterMigrations(MigrationRegistration),
    #[serde(rename = "haextension.context.get")]
    GetExtensionInfo,
}

impl HostRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Query(_) => method::QUERY,
            Self::Execute(_) => method::EXECUTE,
            Self::Transaction(_) => method::TRANSACTION,
            Self::RegisterMigrations(_) => method::REGISTER_MIGRATIONS,
            Self::GetExtensionInfo => method::GET_EXTENSION_INFO,
        }
    }

    pub fn parse_json(frame: &str) -> Result<Self> {
        parse_frame(frame)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

/// Every answer the host can give to a [`HostRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum HostResponse {
    Rows(QueryResult),
    Executed(ExecuteResult),
    Transaction(Vec<ExecuteResult>),
    Migrations(MigrationResult),
    ExtensionInfo(ExtensionInfo),
}

impl HostResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Executed(_) => "executed",
            Self::Transaction(_) => "transaction",
            Self::Migrations(_) => "migrations",
            Self::ExtensionInfo(_) => "extension_info",
        }
    }

    pub fn parse_json(frame: &str) -> Result<Self> {
        parse_frame(frame)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    pub fn into_rows(self) -> Result<QueryResult> {
        match self {
            Self::Rows(rows) => Ok(rows),
            other => Err(unexpected("rows", &other)),
        }
    }

    pub fn into_executed(self) -> Result<ExecuteResult> {
        match self {
            Self::Executed(result) => Ok(result),
            other => Err(unexpected("executed", &other)),
        }
    }

    pub fn into_transaction(self) -> Result<Vec<ExecuteResult>> {
        match self {
            Self::Transaction(results) => Ok(results),
            other => Err(unexpected("transaction", &other)),
        }
    }

    pub fn into_migrations(self) -> Result<MigrationResult> {
        match self {
            Self::Migrations(result) => Ok(result),
            other => Err(unexpected("migrations", &other)),
        }
    }

    pub fn into_extension_info(self) -> Result<ExtensionInfo> {
        match self {
            Self::ExtensionInfo(info) => Ok(info),
            other => Err(unexpected("extension_info", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &HostResponse) -> Error {
    Error::Protocol(format!(
        "expected {expected} response, host answered with {}",
        got.kind()
    ))
}

fn parse_frame<T: DeserializeOwned>(frame: &str) -> Result<T> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(Error::Protocol(format!(
            "frame exceeds max size: {} > {}",
            frame.len(),
            MAX_FRAME_BYTES
        )));
    }

    serde_json::from_str(frame).map_err(|e| Error::Protocol(format!("invalid frame json: {e}")))
}
