//! Plan projection maintained by the provision event listener.
//!
//! One row per published plan revision. Jobs pin the revision that
//! governs them via `created_by_event_id`, so republishing an offer never
//! changes the workflow of subscriptions already in flight.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use catalog::{OfferId, OfferParameter, Plan, PlanId, PlanMode};
use event_store::SequenceId;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio::sync::RwLock;

use crate::error::{ProvisionError, Result};

/// A published plan revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    /// The offer the plan belongs to.
    pub offer_id: OfferId,

    /// The plan identifier.
    pub plan_id: PlanId,

    /// Publish event that produced this revision.
    pub created_by_event_id: SequenceId,

    /// Hosting mode.
    pub mode: PlanMode,

    /// Downstream application registered on subscribe, for PaaS plans.
    pub application_name: Option<String>,

    /// The full plan definition at publish time.
    pub plan: Plan,

    /// Offer-level and plan-level parameter definitions, merged.
    pub parameters: Vec<OfferParameter>,

    /// Ordered step names run on subscribe.
    pub on_subscribe: Vec<String>,

    /// Secret holding the offer's step configuration list at publish
    /// time.
    pub provisioning_steps_secret_name: String,
}

/// Store for published plan revisions.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Inserts or replaces a plan revision.
    async fn upsert(&self, record: PlanRecord) -> Result<()>;

    /// Fetches a plan revision by its pinned key.
    async fn find(
        &self,
        offer_id: &OfferId,
        plan_id: &PlanId,
        created_by_event_id: SequenceId,
    ) -> Result<Option<PlanRecord>>;
}

/// In-memory plan store for testing and embedding.
#[derive(Clone, Default)]
pub struct InMemoryPlanStore {
    plans: Arc<RwLock<HashMap<(String, String, i64), PlanRecord>>>,
}

impl InMemoryPlanStore {
    /// Creates a new empty plan store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored plan revisions.
    pub async fn plan_count(&self) -> usize {
        self.plans.read().await.len()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn upsert(&self, record: PlanRecord) -> Result<()> {
        let key = (
            record.offer_id.to_string(),
            record.plan_id.to_string(),
            record.created_by_event_id.as_i64(),
        );
        self.plans.write().await.insert(key, record);
        Ok(())
    }

    async fn find(
        &self,
        offer_id: &OfferId,
        plan_id: &PlanId,
        created_by_event_id: SequenceId,
    ) -> Result<Option<PlanRecord>> {
        let key = (
            offer_id.to_string(),
            plan_id.to_string(),
            created_by_event_id.as_i64(),
        );
        Ok(self.plans.read().await.get(&key).cloned())
    }
}

/// PostgreSQL-backed plan store.
#[derive(Clone)]
pub struct PostgresPlanStore {
    pool: PgPool,
}

impl PostgresPlanStore {
    /// Creates a new PostgreSQL plan store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: PgRow) -> Result<PlanRecord> {
        let mode: String = row.try_get("mode")?;
        let plan_json: serde_json::Value = row.try_get("properties")?;
        let parameters_json: serde_json::Value = row.try_get("parameters")?;
        let on_subscribe_json: serde_json::Value = row.try_get("on_subscribe")?;

        Ok(PlanRecord {
            offer_id: OfferId::new(row.try_get::<String, _>("offer_id")?),
            plan_id: PlanId::new(row.try_get::<String, _>("plan_id")?),
            created_by_event_id: SequenceId::new(row.try_get("created_by_event_id")?),
            mode: PlanMode::from_str(&mode)
                .map_err(|e| ProvisionError::Configuration(e.to_string()))?,
            application_name: row.try_get("application_name")?,
            plan: serde_json::from_value(plan_json)?,
            parameters: serde_json::from_value(parameters_json)?,
            on_subscribe: serde_json::from_value(on_subscribe_json)?,
            provisioning_steps_secret_name: row.try_get("provisioning_steps_secret_name")?,
        })
    }
}

#[async_trait]
impl PlanStore for PostgresPlanStore {
    async fn upsert(&self, record: PlanRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plans (offer_id, plan_id, created_by_event_id, mode, application_name,
                properties, parameters, on_subscribe, provisioning_steps_secret_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (offer_id, plan_id, created_by_event_id) DO UPDATE
            SET mode = EXCLUDED.mode,
                application_name = EXCLUDED.application_name,
                properties = EXCLUDED.properties,
                parameters = EXCLUDED.parameters,
                on_subscribe = EXCLUDED.on_subscribe,
                provisioning_steps_secret_name = EXCLUDED.provisioning_steps_secret_name
            "#,
        )
        .bind(record.offer_id.as_str())
        .bind(record.plan_id.as_str())
        .bind(record.created_by_event_id.as_i64())
        .bind(record.mode.as_str())
        .bind(&record.application_name)
        .bind(serde_json::to_value(&record.plan)?)
        .bind(serde_json::to_value(&record.parameters)?)
        .bind(serde_json::to_value(&record.on_subscribe)?)
        .bind(&record.provisioning_steps_secret_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(
        &self,
        offer_id: &OfferId,
        plan_id: &PlanId,
        created_by_event_id: SequenceId,
    ) -> Result<Option<PlanRecord>> {
        let row = sqlx::query(
            r#"
            SELECT offer_id, plan_id, created_by_event_id, mode, application_name, properties,
                   parameters, on_subscribe, provisioning_steps_secret_name
            FROM plans
            WHERE offer_id = $1 AND plan_id = $2 AND created_by_event_id = $3
            "#,
        )
        .bind(offer_id.as_str())
        .bind(plan_id.as_str())
        .bind(created_by_event_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }
}
