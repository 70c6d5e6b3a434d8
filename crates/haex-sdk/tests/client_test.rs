use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use haex_sdk::{
    Error, ExecuteResult, ExtensionInfo, HaexClient, HostError, HostRequest, HostResponse,
    Migration, MigrationResult, QueryResult, RequestGateway, Result, SqlStatement, SqlValue,
    sql_params,
};
use serde::Deserialize;

/// Records every request and answers from a scripted queue.
#[derive(Default)]
struct ScriptedGateway {
    requests: Mutex<Vec<HostRequest>>,
    responses: Mutex<VecDeque<Result<HostResponse>>>,
}

impl ScriptedGateway {
    fn answering(responses: Vec<Result<HostResponse>>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
        }
    }

    fn requests(&self) -> Vec<HostRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl RequestGateway for ScriptedGateway {
    async fn request(&self, request: HostRequest) -> Result<HostResponse> {
        self.requests.lock().expect("requests lock").push(request);
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(Error::Gateway("no scripted response".into())))
    }
}

fn client_with(gateway: &std::sync::Arc<ScriptedGateway>) -> HaexClient {
    HaexClient::new(gateway.clone())
}

#[tokio::test]
async fn insert_sends_parameterized_execute_and_returns_last_id() {
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![Ok(
        HostResponse::Executed(ExecuteResult {
            rows_affected: 1,
            last_insert_id: Some(42),
        }),
    )]));
    let client = client_with(&gateway);

    let id = client
        .database()
        .insert("t", [("a", 1), ("b", 2)])
        .await
        .expect("insert should succeed");

    assert_eq!(id, Some(42));
    assert_eq!(
        gateway.requests(),
        vec![HostRequest::Execute(SqlStatement::with_params(
            "INSERT INTO t (a, b) VALUES (?, ?)",
            vec![SqlValue::Integer(1), SqlValue::Integer(2)]
        ))]
    );
}

#[tokio::test]
async fn count_reads_scalar_from_query() {
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![Ok(HostResponse::Rows(
        QueryResult {
            columns: vec!["count".into()],
            rows: vec![vec![SqlValue::Integer(3)]],
        },
    ))]));
    let client = client_with(&gateway);

    let count = client
        .database()
        .count("notes", Some("done = ?"), sql_params![false])
        .await
        .expect("count should succeed");

    assert_eq!(count, 3);
    assert_eq!(
        gateway.requests(),
        vec![HostRequest::Query(SqlStatement::with_params(
            "SELECT COUNT(*) AS count FROM notes WHERE done = ?",
            vec![SqlValue::Integer(0)]
        ))]
    );
}

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    id: i64,
    title: String,
}

#[tokio::test]
async fn query_as_deserializes_rows() {
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![Ok(HostResponse::Rows(
        QueryResult {
            columns: vec!["id".into(), "title".into()],
            rows: vec![vec![SqlValue::Integer(1), SqlValue::from("first")]],
        },
    ))]));
    let client = client_with(&gateway);

    let rows: Vec<Row> = client
        .database()
        .query_as("SELECT id, title FROM notes", sql_params![])
        .await
        .expect("query should succeed");

    assert_eq!(
        rows,
        vec![Row {
            id: 1,
            title: "first".into()
        }]
    );
}

#[tokio::test]
async fn empty_transaction_does_not_reach_the_host() {
    let gateway = std::sync::Arc::new(ScriptedGateway::default());
    let client = client_with(&gateway);

    let results = client
        .database()
        .transaction(vec![])
        .await
        .expect("empty transaction should succeed");

    assert!(results.is_empty());
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn create_and_drop_table_forward_execute_statements() {
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![
        Ok(HostResponse::Executed(ExecuteResult::default())),
        Ok(HostResponse::Executed(ExecuteResult::default())),
    ]));
    let client = client_with(&gateway);
    let db = client.database();

    db.create_table("notes", "id INTEGER PRIMARY KEY, title TEXT")
        .await
        .expect("create should succeed");
    db.drop_table("notes").await.expect("drop should succeed");

    let sql: Vec<String> = gateway
        .requests()
        .into_iter()
        .map(|request| match request {
            HostRequest::Execute(statement) => statement.sql,
            other => panic!("unexpected request: {other:?}"),
        })
        .collect();
    assert_eq!(
        sql,
        vec![
            "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, title TEXT)".to_string(),
            "DROP TABLE IF EXISTS notes".to_string(),
        ]
    );
}

#[tokio::test]
async fn register_migrations_forwards_full_set_and_sorts_applied_names() {
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![Ok(
        HostResponse::Migrations(MigrationResult {
            applied_count: 2,
            already_applied_count: 0,
            applied_migrations: vec!["0002_x".into(), "0001_x".into()],
            failed: vec![],
        }),
    )]));
    let client = client_with(&gateway);

    let result = client
        .register_migrations(
            "1.0.0",
            vec![
                Migration::new("0002_x", "SELECT 2"),
                Migration::new("0001_x", "SELECT 1"),
            ],
        )
        .await
        .expect("registration should succeed");

    assert_eq!(result.applied_migrations, vec!["0001_x", "0002_x"]);
    match &gateway.requests()[0] {
        HostRequest::RegisterMigrations(registration) => {
            assert_eq!(registration.extension_version, "1.0.0");
            assert_eq!(registration.migrations.len(), 2);
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[tokio::test]
async fn register_migrations_rejects_blank_version_without_calling_host() {
    let gateway = std::sync::Arc::new(ScriptedGateway::default());
    let client = client_with(&gateway);

    let err = client
        .register_migrations("", vec![Migration::new("0001", "SELECT 1")])
        .await
        .expect_err("blank version must fail");

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn gateway_and_host_failures_pass_through_unchanged() {
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![
        Err(Error::Gateway("channel closed".into())),
        Err(Error::Host(HostError::new(
            "NAMESPACE_VIOLATION",
            "table haex_settings is not owned by the extension",
        ))),
    ]));
    let client = client_with(&gateway);

    let transport = client
        .register_migrations("1.0.0", vec![])
        .await
        .expect_err("gateway failure must surface");
    assert!(matches!(transport, Error::Gateway(msg) if msg == "channel closed"));

    let rejected = client
        .register_migrations("1.0.0", vec![Migration::new("0001", "DROP TABLE haex_settings")])
        .await
        .expect_err("host rejection must surface");
    assert_eq!(rejected.host_code(), Some("NAMESPACE_VIOLATION"));

    // No retries: exactly one request per call.
    assert_eq!(gateway.requests().len(), 2);
}

#[tokio::test]
async fn mismatched_response_is_a_protocol_error() {
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![Ok(HostResponse::Rows(
        QueryResult::default(),
    ))]));
    let client = client_with(&gateway);

    let err = client
        .register_migrations("1.0.0", vec![])
        .await
        .expect_err("wrong response kind must fail");
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn extension_info_round_trip() {
    let info = ExtensionInfo::new("b4f1c2", "notes", "1.0.0");
    let gateway = std::sync::Arc::new(ScriptedGateway::answering(vec![Ok(
        HostResponse::ExtensionInfo(info.clone()),
    )]));
    let client = client_with(&gateway);

    let fetched = client.extension_info().await.expect("info should load");
    assert_eq!(fetched, info);
    assert_eq!(gateway.requests(), vec![HostRequest::GetExtensionInfo]);
}
