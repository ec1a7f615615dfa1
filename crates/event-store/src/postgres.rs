use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    DomainEvent, EventId, EventQuery, NewEvent, Result, SequenceId, Snapshot, SnapshotStatus,
    store::EventLog,
};

/// PostgreSQL-backed event log implementation.
///
/// Sequence ids come from a `BIGSERIAL` column, so assignment is strictly
/// increasing across the table and therefore per partition.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: PgRow) -> Result<DomainEvent> {
        let tags_json: serde_json::Value = row.try_get("tags")?;
        let tags: HashMap<String, String> = serde_json::from_value(tags_json)?;

        Ok(DomainEvent {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sequence_id: SequenceId::new(row.try_get("sequence_id")?),
            partition_key: row.try_get("partition_key")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_by: row.try_get("created_by")?,
            created_time: row.try_get("created_time")?,
            tags,
        })
    }

    fn row_to_snapshot(row: PgRow) -> Result<Snapshot> {
        let status: String = row.try_get("status")?;
        let status = if status == "Active" {
            SnapshotStatus::Active
        } else {
            SnapshotStatus::Superseded
        };

        Ok(Snapshot {
            snapshot_id: row.try_get("id")?,
            resource_id: row.try_get("resource_id")?,
            last_applied_event_id: SequenceId::new(row.try_get("last_applied_event_id")?),
            content: row.try_get("content")?,
            status,
            created_time: row.try_get("created_time")?,
            deleted_time: row.try_get("deleted_time")?,
        })
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn append(&self, event: NewEvent) -> Result<DomainEvent> {
        let event_id = EventId::new();
        let created_time = Utc::now();
        let tags_json = serde_json::to_value(&event.tags)?;

        let row = sqlx::query(
            r#"
            INSERT INTO events (id, partition_key, event_type, payload, created_by, created_time, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING sequence_id
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(&event.partition_key)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.created_by)
        .bind(created_time)
        .bind(tags_json)
        .fetch_one(&self.pool)
        .await?;

        let sequence_id = SequenceId::new(row.try_get("sequence_id")?);
        metrics::counter!("event_log_appends_total").increment(1);
        tracing::debug!(
            partition_key = %event.partition_key,
            event_type = %event.event_type,
            %sequence_id,
            "event appended"
        );

        Ok(DomainEvent {
            event_id,
            sequence_id,
            partition_key: event.partition_key,
            event_type: event.event_type,
            payload: event.payload,
            created_by: event.created_by,
            created_time,
            tags: event.tags,
        })
    }

    async fn query(&self, query: EventQuery) -> Result<Vec<DomainEvent>> {
        let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "SELECT id, sequence_id, partition_key, event_type, payload, created_by, created_time, tags \
             FROM events WHERE 1=1",
        );

        if let Some(ref key) = query.partition_key {
            builder.push(" AND partition_key = ");
            builder.push_bind(key.clone());
        }
        if let Some(ref types) = query.event_types {
            builder.push(" AND event_type = ANY(");
            builder.push_bind(types.clone());
            builder.push(")");
        }
        if let Some(cursor) = query.after_sequence_id {
            builder.push(" AND sequence_id > ");
            builder.push_bind(cursor.as_i64());
        }
        builder.push(" ORDER BY sequence_id ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn latest_sequence_id(&self, partition_key: &str) -> Result<Option<SequenceId>> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence_id) FROM events WHERE partition_key = $1")
                .bind(partition_key)
                .fetch_one(&self.pool)
                .await?;

        Ok(max.map(SequenceId::new))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE snapshots SET status = 'Superseded' WHERE resource_id = $1 AND status = 'Active'",
        )
        .bind(&snapshot.resource_id)
        .execute(&mut *tx)
        .await?;

        let status = match snapshot.status {
            SnapshotStatus::Active => "Active",
            SnapshotStatus::Superseded => "Superseded",
        };

        sqlx::query(
            r#"
            INSERT INTO snapshots (id, resource_id, last_applied_event_id, content, status, created_time, deleted_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(snapshot.snapshot_id)
        .bind(&snapshot.resource_id)
        .bind(snapshot.last_applied_event_id.as_i64())
        .bind(&snapshot.content)
        .bind(status)
        .bind(snapshot.created_time)
        .bind(snapshot.deleted_time)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_snapshot(&self, resource_id: &str) -> Result<Option<Snapshot>> {
        let row = sqlx::query(
            r#"
            SELECT id, resource_id, last_applied_event_id, content, status, created_time, deleted_time
            FROM snapshots
            WHERE resource_id = $1 AND status = 'Active'
            ORDER BY last_applied_event_id DESC
            LIMIT 1
            "#,
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_snapshot).transpose()
    }
}
