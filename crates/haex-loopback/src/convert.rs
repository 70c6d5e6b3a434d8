use haex_common::{HostError, SqlValue};
use rusqlite::ErrorCode;
use rusqlite::types::Value;

use crate::host::error_code;

pub(crate) fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Blob(v) => Value::Blob(v.clone()),
    }
}

pub(crate) fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(v),
        Value::Real(v) => SqlValue::Real(v),
        Value::Text(v) => SqlValue::Text(v),
        Value::Blob(v) => SqlValue::Blob(v),
    }
}

/// Map a SQLite failure to a host error. Authorizer denials are namespace
/// violations, everything else is a plain SQL error.
pub(crate) fn sql_error(err: rusqlite::Error) -> HostError {
    if err.sqlite_error_code() == Some(ErrorCode::AuthorizationForStatementDenied) {
        return HostError::new(
            error_code::NAMESPACE_VIOLATION,
            format!("statement touches objects outside the extension namespace: {err}"),
        );
    }
    HostError::new(error_code::SQL_ERROR, err.to_string())
}
