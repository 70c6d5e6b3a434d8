//! Table namespace enforcement.
//!
//! Extensions may only touch tables whose names start with their own prefix
//! (`{public_key}__{name}__`). Two layers check this:
//!
//! - [`NamespaceGuard::check`] scans statement text before anything runs, so
//!   a whole migration set can be rejected up front. It also sees what SQLite
//!   never reports to an authorizer, such as `RENAME TO` targets, foreign key
//!   parents and statements inside trigger bodies. Common table expression
//!   names count as table references here and must be prefixed too.
//! - [`NamespaceGuard::confine`] installs a SQLite authorizer while extension
//!   SQL is prepared. SQLite reports every table, index, trigger and view a
//!   statement resolves to, so spellings the text scan misses are still denied.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use haex_common::{ExtensionInfo, HostError};
use regex::Regex;
use rusqlite::Connection;
use rusqlite::hooks::{AuthAction, AuthContext, Authorization};

use crate::host::error_code;

static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)'(?:[^']|'')*'|--[^\n]*|/\*.*?\*/").expect("valid sql noise regex")
});

static TABLE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?ix)
        \b(?:
            (?:DELETE | INSERT | UPDATE (?:\s+ OF \s+ [\w\s,]+?)?) \s+ ON
          | INDEX \s+ (?:IF \s+ NOT \s+ EXISTS \s+)? \S+ \s+ ON
          | RENAME \s+ TO
          | TABLE | VIEW | INTO | FROM | JOIN | UPDATE | REFERENCES
        )
        \b \s*
        (?:IF \s+ (?:NOT \s+)? EXISTS \b \s*)?
        (?P<name>
            "[^"]+" | `[^`]+` | \[[^\]]+\]
          | [A-Za-z_][\w$]* (?:\.[A-Za-z_][\w$]*)?
        )"#,
    )
    .expect("valid table reference regex")
});

/// Words that can follow a matched keyword without naming a table,
/// e.g. `ON UPDATE CASCADE` or `AFTER UPDATE ON`.
const NON_TABLE_WORDS: &[&str] = &[
    "AS", "CASCADE", "DEFAULT", "NO", "NULL", "OF", "ON", "RESTRICT", "SELECT", "SET", "VALUES",
    "WHERE",
];

/// Every table name referenced by `sql`, sorted and deduplicated.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    let cleaned = NOISE_RE.replace_all(sql, " ");
    let mut tables = BTreeSet::new();

    for caps in TABLE_REF_RE.captures_iter(&cleaned) {
        let raw = &caps["name"];
        let quoted = raw.starts_with(['"', '`', '[']);
        if !quoted
            && NON_TABLE_WORDS
                .iter()
                .any(|word| word.eq_ignore_ascii_case(raw))
        {
            continue;
        }
        tables.insert(normalize(raw));
    }

    tables.into_iter().collect()
}

fn normalize(raw: &str) -> String {
    let unquoted = raw.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'));
    match unquoted.split_once('.') {
        Some((schema, table))
            if schema.eq_ignore_ascii_case("main") || schema.eq_ignore_ascii_case("temp") =>
        {
            table.to_string()
        }
        _ => unquoted.to_string(),
    }
}

/// Checks statements against one extension's table namespace.
#[derive(Debug, Clone)]
pub struct NamespaceGuard {
    info: ExtensionInfo,
}

impl NamespaceGuard {
    pub fn new(info: ExtensionInfo) -> Self {
        Self { info }
    }

    pub fn prefix(&self) -> String {
        self.info.table_prefix()
    }

    /// Reject `sql` if it references any table outside the namespace.
    pub fn check(&self, sql: &str) -> Result<(), HostError> {
        let foreign: Vec<String> = referenced_tables(sql)
            .into_iter()
            .filter(|table| !self.info.owns_table(table))
            .collect();

        if foreign.is_empty() {
            return Ok(());
        }

        Err(HostError::new(
            error_code::NAMESPACE_VIOLATION,
            format!(
                "statement references table(s) outside namespace {}: {}",
                self.prefix(),
                foreign.join(", ")
            ),
        ))
    }

    /// Deny every object outside the namespace for statements prepared on
    /// `conn` until the returned scope is dropped.
    ///
    /// Transaction control is denied too, so host statements such as
    /// `COMMIT` or `RELEASE` must run after the scope ends.
    pub(crate) fn confine<'c>(&self, conn: &'c Connection) -> Confined<'c> {
        let info = self.info.clone();
        conn.authorizer(Some(move |ctx: AuthContext<'_>| authorize(&info, &ctx.action)));
        Confined { conn }
    }
}

/// Authorizer scope returned by [`NamespaceGuard::confine`].
pub(crate) struct Confined<'c> {
    conn: &'c Connection,
}

impl Drop for Confined<'_> {
    fn drop(&mut self) {
        self.conn
            .authorizer(None::<fn(AuthContext<'_>) -> Authorization>);
    }
}

fn authorize(info: &ExtensionInfo, action: &AuthAction<'_>) -> Authorization {
    let allowed = match action {
        AuthAction::Select | AuthAction::Function { .. } | AuthAction::Recursive => true,
        AuthAction::Read { table_name, .. }
        | AuthAction::Insert { table_name, .. }
        | AuthAction::Update { table_name, .. }
        | AuthAction::Delete { table_name, .. }
        | AuthAction::CreateTable { table_name, .. }
        | AuthAction::CreateTempTable { table_name, .. }
        | AuthAction::DropTable { table_name, .. }
        | AuthAction::DropTempTable { table_name, .. }
        | AuthAction::AlterTable { table_name, .. }
        | AuthAction::Analyze { table_name, .. }
        | AuthAction::CreateIndex { table_name, .. }
        | AuthAction::CreateTempIndex { table_name, .. }
        | AuthAction::DropIndex { table_name, .. }
        | AuthAction::DropTempIndex { table_name, .. }
        | AuthAction::CreateTrigger { table_name, .. }
        | AuthAction::CreateTempTrigger { table_name, .. }
        | AuthAction::DropTrigger { table_name, .. }
        | AuthAction::DropTempTrigger { table_name, .. } => may_touch(info, table_name),
        AuthAction::CreateView { view_name, .. }
        | AuthAction::CreateTempView { view_name, .. }
        | AuthAction::DropView { view_name, .. }
        | AuthAction::DropTempView { view_name, .. } => info.owns_table(view_name),
        AuthAction::Reindex { .. } => true,
        // pragmas, attach/detach, transaction control, virtual tables
        _ => false,
    };

    if allowed {
        Authorization::Allow
    } else {
        Authorization::Deny
    }
}

/// SQLite writes its own schema tables (`sqlite_master`, `sqlite_sequence`)
/// on behalf of DDL and AUTOINCREMENT, and refuses direct writes to them.
fn may_touch(info: &ExtensionInfo, table: &str) -> bool {
    info.owns_table(table)
        || table
            .get(..7)
            .is_some_and(|head| head.eq_ignore_ascii_case("sqlite_"))
}
