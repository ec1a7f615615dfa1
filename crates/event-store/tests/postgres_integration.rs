//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and require a local
//! Docker daemon. Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    EventLog, EventQuery, NewEvent, PostgresEventLog, SequenceId, Snapshot,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!("../../../migrations/001_create_event_log.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh log with its own pool and cleared tables
async fn get_test_log() -> PostgresEventLog {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events, snapshots RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventLog::new(pool)
}

fn test_event(partition_key: &str, event_type: &str) -> NewEvent {
    NewEvent::builder()
        .partition_key(partition_key)
        .event_type(event_type)
        .payload_raw(serde_json::json!({"test": true}))
        .created_by("tests")
        .build()
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn append_assigns_sequence_ids() {
    let log = get_test_log().await;

    let e1 = log.append(test_event("offer-1", "OfferCreated")).await.unwrap();
    let e2 = log.append(test_event("offer-1", "OfferPublished")).await.unwrap();

    assert!(e1.sequence_id < e2.sequence_id);
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn query_by_partition_in_order() {
    let log = get_test_log().await;

    log.append(test_event("offer-1", "Event1")).await.unwrap();
    log.append(test_event("offer-2", "Event2")).await.unwrap();
    log.append(test_event("offer-1", "Event3")).await.unwrap();

    let events = log
        .query(EventQuery::for_partition("offer-1"))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].sequence_id < events[1].sequence_id);
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn query_after_cursor_is_strict() {
    let log = get_test_log().await;

    let e1 = log.append(test_event("offer-1", "Event1")).await.unwrap();
    let e2 = log.append(test_event("offer-1", "Event2")).await.unwrap();

    let events = log
        .query(EventQuery::for_partition("offer-1").after_sequence_id(e1.sequence_id))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].sequence_id, e2.sequence_id);
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn query_by_event_type() {
    let log = get_test_log().await;

    log.append(test_event("offer-1", "OfferPublished")).await.unwrap();
    log.append(test_event("offer-2", "OfferPublished")).await.unwrap();
    log.append(test_event("offer-3", "OfferCreated")).await.unwrap();

    let events = log
        .query(EventQuery::for_event_type("OfferPublished"))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn tags_roundtrip() {
    let log = get_test_log().await;

    let event = NewEvent::builder()
        .partition_key("offer-1")
        .event_type("OfferCreated")
        .payload_raw(serde_json::json!({}))
        .tag("source", "integration")
        .build();

    log.append(event).await.unwrap();

    let events = log
        .query(EventQuery::for_partition("offer-1"))
        .await
        .unwrap();
    assert_eq!(
        events[0].tags.get("source"),
        Some(&"integration".to_string())
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn snapshot_roundtrip_and_supersede() {
    let log = get_test_log().await;

    log.save_snapshot(Snapshot::new(
        "offer-1",
        SequenceId::new(3),
        serde_json::json!({"n": 1}),
    ))
    .await
    .unwrap();
    log.save_snapshot(Snapshot::new(
        "offer-1",
        SequenceId::new(7),
        serde_json::json!({"n": 2}),
    ))
    .await
    .unwrap();

    let active = log.get_snapshot("offer-1").await.unwrap().unwrap();
    assert_eq!(active.last_applied_event_id, SequenceId::new(7));
    assert_eq!(active.content, serde_json::json!({"n": 2}));
}
