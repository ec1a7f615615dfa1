//! Provisioning job persistence.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use catalog::{OfferId, PlanId, PlanMode};
use common::SubscriptionId;
use event_store::SequenceId;
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ProvisionError, Result};
use crate::job::{ProvisionStatus, ProvisioningJob, StepStatus};

/// Store for provisioning job rows.
///
/// Updates are compare-and-swap on `row_version`: a mismatch means
/// another worker got there first and yields `JobConflict`, discarding
/// the losing transition.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts the job unless one already exists for the same
    /// subscription and event type. Returns true when inserted.
    async fn create_if_absent(&self, job: ProvisioningJob) -> Result<bool>;

    /// Fetches a job by subscription and queueing event type.
    async fn get(
        &self,
        subscription_id: SubscriptionId,
        event_type: &str,
    ) -> Result<Option<ProvisioningJob>>;

    /// Persists the job if `row_version` still matches, bumping the
    /// version. Returns the stored row.
    async fn update(&self, job: &ProvisioningJob) -> Result<ProvisioningJob>;

    /// Lists jobs waiting for activation.
    async fn list_queued(&self) -> Result<Vec<ProvisioningJob>>;

    /// Lists jobs currently owned by the orchestrator.
    async fn list_active(&self) -> Result<Vec<ProvisioningJob>>;
}

/// In-memory job store for testing and embedding.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<(SubscriptionId, String), ProvisioningJob>>>,
}

impl InMemoryJobStore {
    /// Creates a new empty job store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_if_absent(&self, job: ProvisioningJob) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        let key = (job.subscription_id, job.event_type.clone());
        if jobs.contains_key(&key) {
            return Ok(false);
        }
        jobs.insert(key, job);
        Ok(true)
    }

    async fn get(
        &self,
        subscription_id: SubscriptionId,
        event_type: &str,
    ) -> Result<Option<ProvisioningJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&(subscription_id, event_type.to_string())).cloned())
    }

    async fn update(&self, job: &ProvisioningJob) -> Result<ProvisioningJob> {
        let mut jobs = self.jobs.write().await;
        let key = (job.subscription_id, job.event_type.clone());
        let existing = jobs
            .get_mut(&key)
            .ok_or(ProvisionError::JobNotFound(job.subscription_id))?;

        if existing.row_version != job.row_version {
            return Err(ProvisionError::JobConflict(job.subscription_id));
        }

        let mut stored = job.clone();
        stored.row_version += 1;
        *existing = stored.clone();
        Ok(stored)
    }

    async fn list_queued(&self) -> Result<Vec<ProvisioningJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| j.status == ProvisionStatus::Queued)
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<ProvisioningJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.values().filter(|j| j.is_active).cloned().collect())
    }
}

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Creates a new PostgreSQL job store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: PgRow) -> Result<ProvisioningJob> {
        let status: String = row.try_get("status")?;
        let step_status: String = row.try_get("provisioning_step_status")?;
        let mode: String = row.try_get("mode")?;

        Ok(ProvisioningJob {
            subscription_id: SubscriptionId::from_uuid(row.try_get::<Uuid, _>("subscription_id")?),
            offer_id: OfferId::new(row.try_get::<String, _>("offer_id")?),
            plan_id: PlanId::new(row.try_get::<String, _>("plan_id")?),
            plan_created_by_event_id: SequenceId::new(row.try_get("plan_created_by_event_id")?),
            mode: PlanMode::from_str(&mode)
                .map_err(|e| ProvisionError::Configuration(e.to_string()))?,
            application_name: row.try_get("application_name")?,
            event_type: row.try_get("event_type")?,
            status: ProvisionStatus::from_str(&status)
                .map_err(|e| ProvisionError::Configuration(e.to_string()))?,
            is_active: row.try_get("is_active")?,
            provisioning_step_index: row.try_get("provisioning_step_index")?,
            provisioning_step_status: StepStatus::from_str(&step_status)
                .map_err(|e| ProvisionError::Configuration(e.to_string()))?,
            parameters_secret_name: row.try_get("parameters_secret_name")?,
            provisioning_steps_secret_name: row.try_get("provisioning_steps_secret_name")?,
            last_error_message: row.try_get("last_error_message")?,
            retry_count: row.try_get("retry_count")?,
            created_by_event_id: SequenceId::new(row.try_get("created_by_event_id")?),
            row_version: row.try_get("row_version")?,
            created_time: row.try_get("created_time")?,
            last_updated_time: row.try_get("last_updated_time")?,
            completed_time: row.try_get("completed_time")?,
        })
    }
}

const JOB_COLUMNS: &str = "subscription_id, offer_id, plan_id, plan_created_by_event_id, mode, \
    application_name, event_type, status, is_active, provisioning_step_index, \
    provisioning_step_status, parameters_secret_name, provisioning_steps_secret_name, \
    last_error_message, retry_count, created_by_event_id, row_version, created_time, \
    last_updated_time, completed_time";

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn create_if_absent(&self, job: ProvisioningJob) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO provisioning_jobs (subscription_id, offer_id, plan_id,
                plan_created_by_event_id, mode, application_name, event_type, status, is_active,
                provisioning_step_index, provisioning_step_status, parameters_secret_name,
                provisioning_steps_secret_name, last_error_message, retry_count,
                created_by_event_id, row_version, created_time, last_updated_time, completed_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT (subscription_id, event_type) DO NOTHING
            "#,
        )
        .bind(job.subscription_id.as_uuid())
        .bind(job.offer_id.as_str())
        .bind(job.plan_id.as_str())
        .bind(job.plan_created_by_event_id.as_i64())
        .bind(job.mode.as_str())
        .bind(&job.application_name)
        .bind(&job.event_type)
        .bind(job.status.as_str())
        .bind(job.is_active)
        .bind(job.provisioning_step_index)
        .bind(job.provisioning_step_status.as_str())
        .bind(&job.parameters_secret_name)
        .bind(&job.provisioning_steps_secret_name)
        .bind(&job.last_error_message)
        .bind(job.retry_count)
        .bind(job.created_by_event_id.as_i64())
        .bind(job.row_version)
        .bind(job.created_time)
        .bind(job.last_updated_time)
        .bind(job.completed_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(
        &self,
        subscription_id: SubscriptionId,
        event_type: &str,
    ) -> Result<Option<ProvisioningJob>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM provisioning_jobs WHERE subscription_id = $1 AND event_type = $2",
            JOB_COLUMNS
        ))
        .bind(subscription_id.as_uuid())
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_job).transpose()
    }

    async fn update(&self, job: &ProvisioningJob) -> Result<ProvisioningJob> {
        let result = sqlx::query(
            r#"
            UPDATE provisioning_jobs
            SET status = $1, is_active = $2, provisioning_step_index = $3,
                provisioning_step_status = $4, parameters_secret_name = $5,
                last_error_message = $6, retry_count = $7, row_version = row_version + 1,
                last_updated_time = $8, completed_time = $9
            WHERE subscription_id = $10 AND event_type = $11 AND row_version = $12
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.is_active)
        .bind(job.provisioning_step_index)
        .bind(job.provisioning_step_status.as_str())
        .bind(&job.parameters_secret_name)
        .bind(&job.last_error_message)
        .bind(job.retry_count)
        .bind(job.last_updated_time)
        .bind(job.completed_time)
        .bind(job.subscription_id.as_uuid())
        .bind(&job.event_type)
        .bind(job.row_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ProvisionError::JobConflict(job.subscription_id));
        }

        let mut stored = job.clone();
        stored.row_version += 1;
        Ok(stored)
    }

    async fn list_queued(&self) -> Result<Vec<ProvisioningJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM provisioning_jobs WHERE status = 'Queued' ORDER BY created_time ASC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_job).collect()
    }

    async fn list_active(&self) -> Result<Vec<ProvisioningJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM provisioning_jobs WHERE is_active ORDER BY created_time ASC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_job).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_job(subscription_id: SubscriptionId) -> ProvisioningJob {
        let now = Utc::now();
        ProvisioningJob {
            subscription_id,
            offer_id: OfferId::new("offer-1"),
            plan_id: PlanId::new("basic"),
            plan_created_by_event_id: SequenceId::new(4),
            mode: PlanMode::SaaS,
            application_name: None,
            event_type: "SubscriptionCreated".to_string(),
            status: ProvisionStatus::Queued,
            is_active: false,
            provisioning_step_index: crate::job::BOOTSTRAP_STEP_INDEX,
            provisioning_step_status: StepStatus::NotStarted,
            parameters_secret_name: "prm-test".to_string(),
            provisioning_steps_secret_name: "stp-test".to_string(),
            last_error_message: None,
            retry_count: 0,
            created_by_event_id: SequenceId::new(7),
            row_version: 0,
            created_time: now,
            last_updated_time: now,
            completed_time: None,
        }
    }

    #[tokio::test]
    async fn create_if_absent_dedupes() {
        let store = InMemoryJobStore::new();
        let subscription_id = SubscriptionId::new();

        assert!(store.create_if_absent(test_job(subscription_id)).await.unwrap());
        assert!(!store.create_if_absent(test_job(subscription_id)).await.unwrap());
        assert_eq!(store.job_count().await, 1);
    }

    #[tokio::test]
    async fn update_bumps_row_version() {
        let store = InMemoryJobStore::new();
        let subscription_id = SubscriptionId::new();
        store.create_if_absent(test_job(subscription_id)).await.unwrap();

        let mut job = store
            .get(subscription_id, "SubscriptionCreated")
            .await
            .unwrap()
            .unwrap();
        job.status = ProvisionStatus::Running;
        let stored = store.update(&job).await.unwrap();

        assert_eq!(stored.row_version, 1);
        let fetched = store
            .get(subscription_id, "SubscriptionCreated")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.status, ProvisionStatus::Running);
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = InMemoryJobStore::new();
        let subscription_id = SubscriptionId::new();
        store.create_if_absent(test_job(subscription_id)).await.unwrap();

        let job = store
            .get(subscription_id, "SubscriptionCreated")
            .await
            .unwrap()
            .unwrap();

        // First worker wins
        let mut first = job.clone();
        first.status = ProvisionStatus::Running;
        store.update(&first).await.unwrap();

        // Second worker holds a stale row_version
        let mut second = job;
        second.status = ProvisionStatus::Aborted;
        let result = store.update(&second).await;
        assert!(matches!(result, Err(ProvisionError::JobConflict(_))));
    }

    #[tokio::test]
    async fn list_queued_and_active() {
        let store = InMemoryJobStore::new();
        let first = SubscriptionId::new();
        let second = SubscriptionId::new();
        store.create_if_absent(test_job(first)).await.unwrap();
        store.create_if_absent(test_job(second)).await.unwrap();

        assert_eq!(store.list_queued().await.unwrap().len(), 2);
        assert!(store.list_active().await.unwrap().is_empty());

        let mut job = store
            .get(first, "SubscriptionCreated")
            .await
            .unwrap()
            .unwrap();
        job.status = ProvisionStatus::Running;
        job.is_active = true;
        store.update(&job).await.unwrap();

        assert_eq!(store.list_queued().await.unwrap().len(), 1);
        assert_eq!(store.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_job_fails() {
        let store = InMemoryJobStore::new();
        let job = test_job(SubscriptionId::new());
        let result = store.update(&job).await;
        assert!(matches!(result, Err(ProvisionError::JobNotFound(_))));
    }
}
