use std::sync::Arc;

use haex_common::{Error, Result, SqlValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::gateway::{RequestGateway, dispatch};
use crate::protocol::{HostRequest, SqlStatement};

/// Rows returned by a query, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row.
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Deserialize every row as an object keyed by column name.
    pub fn rows_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), value.to_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::from_value(serde_json::Value::Object(object)).map_err(Error::from)
            })
            .collect()
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub rows_affected: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
}

/// SQL helpers that forward to the host.
///
/// Values always travel as bound `?` parameters. Table names and WHERE
/// clauses are inserted verbatim and must come from trusted code.
#[derive(Clone)]
pub struct Database {
    gateway: Arc<dyn RequestGateway>,
}

impl Database {
    pub fn new(gateway: Arc<dyn RequestGateway>) -> Self {
        Self { gateway }
    }

    pub async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult> {
        let request = HostRequest::Query(SqlStatement::with_params(sql, params));
        dispatch(self.gateway.as_ref(), request).await?.into_rows()
    }

    pub async fn query_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Vec<T>> {
        self.query(sql, params).await?.rows_as()
    }

    pub async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<ExecuteResult> {
        let request = HostRequest::Execute(SqlStatement::with_params(sql, params));
        dispatch(self.gateway.as_ref(), request).await?.into_executed()
    }

    /// Run the statements atomically on the host.
    pub async fn transaction(&self, statements: Vec<SqlStatement>) -> Result<Vec<ExecuteResult>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let request = HostRequest::Transaction(statements);
        dispatch(self.gateway.as_ref(), request)
            .await?
            .into_transaction()
    }

    /// Insert one row and return the id the host assigned to it.
    pub async fn insert<K, V>(
        &self,
        table: &str,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Option<i64>>
    where
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let statement = build_insert(table, data)?;
        Ok(self
            .execute(&statement.sql, statement.params)
            .await?
            .last_insert_id)
    }

    /// Update matching rows and return how many changed.
    pub async fn update<K, V>(
        &self,
        table: &str,
        data: impl IntoIterator<Item = (K, V)>,
        where_clause: &str,
        where_params: Vec<SqlValue>,
    ) -> Result<u64>
    where
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let statement = build_update(table, data, where_clause, where_params)?;
        Ok(self
            .execute(&statement.sql, statement.params)
            .await?
            .rows_affected)
    }

    pub async fn delete(
        &self,
        table: &str,
        where_clause: &str,
        where_params: Vec<SqlValue>,
    ) -> Result<u64> {
        require_identifier("table", table)?;
        if where_clause.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "delete requires a WHERE clause".into(),
            ));
        }
        let sql = format!("DELETE FROM {table} WHERE {where_clause}");
        Ok(self.execute(&sql, where_params).await?.rows_affected)
    }

    pub async fn count(
        &self,
        table: &str,
        where_clause: Option<&str>,
        where_params: Vec<SqlValue>,
    ) -> Result<u64> {
        require_identifier("table", table)?;
        let sql = match where_clause.map(str::trim).filter(|w| !w.is_empty()) {
            Some(clause) => format!("SELECT COUNT(*) AS count FROM {table} WHERE {clause}"),
            None => format!("SELECT COUNT(*) AS count FROM {table}"),
        };

        let result = self.query(&sql, where_params).await?;
        result
            .scalar()
            .and_then(SqlValue::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::Protocol(format!("count query on {table} returned no integer")))
    }

    /// Create a table from a column definition list, if it does not exist.
    pub async fn create_table(&self, table: &str, columns: &str) -> Result<()> {
        require_identifier("table", table)?;
        if columns.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "create_table requires column definitions".into(),
            ));
        }
        let sql = format!("CREATE TABLE IF NOT EXISTS {table} ({columns})");
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    pub async fn drop_table(&self, table: &str) -> Result<()> {
        require_identifier("table", table)?;
        let sql = format!("DROP TABLE IF EXISTS {table}");
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }
}

fn require_identifier(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{kind} name cannot be empty")));
    }
    Ok(())
}

fn split_columns<K, V>(data: impl IntoIterator<Item = (K, V)>) -> Result<(Vec<String>, Vec<SqlValue>)>
where
    K: Into<String>,
    V: Into<SqlValue>,
{
    let (columns, values): (Vec<String>, Vec<SqlValue>) = data
        .into_iter()
        .map(|(column, value)| (column.into(), value.into()))
        .unzip();

    if columns.is_empty() {
        return Err(Error::InvalidArgument("no columns given".into()));
    }
    for column in &columns {
        require_identifier("column", column)?;
    }
    Ok((columns, values))
}

pub(crate) fn build_insert<K, V>(
    table: &str,
    data: impl IntoIterator<Item = (K, V)>,
) -> Result<SqlStatement>
where
    K: Into<String>,
    V: Into<SqlValue>,
{
    require_identifier("table", table)?;
    let (columns, values) = split_columns(data)?;
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    );
    Ok(SqlStatement::with_params(sql, values))
}

pub(crate) fn build_update<K, V>(
    table: &str,
    data: impl IntoIterator<Item = (K, V)>,
    where_clause: &str,
    where_params: Vec<SqlValue>,
) -> Result<SqlStatement>
where
    K: Into<String>,
    V: Into<SqlValue>,
{
    require_identifier("table", table)?;
    if where_clause.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "update requires a WHERE clause".into(),
        ));
    }
    let (columns, mut params) = split_columns(data)?;
    let assignments = columns
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    params.extend(where_params);
    Ok(SqlStatement::with_params(
        format!("UPDATE {table} SET {assignments} WHERE {where_clause}"),
        params,
    ))
}
