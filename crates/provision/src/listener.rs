//! Event listener feeding the provisioning service.
//!
//! The notification queue only wakes this listener up; it re-polls the
//! event log with its own cursors. Offer-published events are projected
//! into plan rows pinned to the publish sequence id; subscription-created
//! events get the system parameters appended and queue exactly one
//! provisioning job.

use std::sync::Arc;

use catalog::{
    OfferId, SUBSCRIPTION_CREATED_EVENT, SubscriptionCreatedData, SubscriptionParameter,
    offer::OFFER_PUBLISHED_EVENT, reconstruct, upsert_parameter,
};
use chrono::Utc;
use event_store::{DomainEvent, EventLog, EventQuery, SequenceId};
use secret_store::SecretStore;
use tokio::sync::RwLock;

use crate::error::{ProvisionError, Result};
use crate::job::{BOOTSTRAP_STEP_INDEX, ProvisionStatus, ProvisioningJob, StepStatus};
use crate::job_store::JobStore;
use crate::plan_store::{PlanRecord, PlanStore};

/// System parameter holding the subscription id.
pub const SUBSCRIPTION_ID_PARAM: &str = "SubscriptionId";

/// System parameter holding the buyer-chosen subscription name.
pub const SUBSCRIPTION_NAME_PARAM: &str = "SubscriptionName";

/// System parameter holding the subscribing user's identity.
pub const OWNER_ID_PARAM: &str = "OwnerId";

/// System parameter holding the downstream application name.
pub const APPLICATION_NAME_PARAM: &str = "ApplicationName";

/// Projects catalog events into the provisioning service's stores.
pub struct ProvisionEventListener<L, S, P, J>
where
    L: EventLog,
    S: SecretStore,
    P: PlanStore,
    J: JobStore,
{
    log: L,
    secrets: S,
    plans: P,
    jobs: J,
    offer_cursor: Arc<RwLock<SequenceId>>,
    subscription_cursor: Arc<RwLock<SequenceId>>,
}

impl<L, S, P, J> ProvisionEventListener<L, S, P, J>
where
    L: EventLog,
    S: SecretStore,
    P: PlanStore,
    J: JobStore,
{
    /// Creates a listener starting from the given persisted cursors.
    pub fn new(
        log: L,
        secrets: S,
        plans: P,
        jobs: J,
        offer_cursor: SequenceId,
        subscription_cursor: SequenceId,
    ) -> Self {
        Self {
            log,
            secrets,
            plans,
            jobs,
            offer_cursor: Arc::new(RwLock::new(offer_cursor)),
            subscription_cursor: Arc::new(RwLock::new(subscription_cursor)),
        }
    }

    /// Returns the cursor after the last processed offer event.
    pub async fn offer_cursor(&self) -> SequenceId {
        *self.offer_cursor.read().await
    }

    /// Returns the cursor after the last processed subscription event.
    pub async fn subscription_cursor(&self) -> SequenceId {
        *self.subscription_cursor.read().await
    }

    /// Handles one wake-up: drains both event streams.
    pub async fn run_once(&self) -> Result<()> {
        self.process_offer_events().await?;
        self.process_subscription_events().await?;
        Ok(())
    }

    /// Projects offer-published events into plan rows. Returns the number
    /// of events processed.
    #[tracing::instrument(skip(self))]
    pub async fn process_offer_events(&self) -> Result<usize> {
        let cursor = *self.offer_cursor.read().await;
        let events = self
            .log
            .query(EventQuery::for_event_type(OFFER_PUBLISHED_EVENT).after_sequence_id(cursor))
            .await?;

        let mut processed = 0;
        for event in events {
            self.project_published_offer(&event).await?;
            *self.offer_cursor.write().await = event.sequence_id;
            processed += 1;
        }
        Ok(processed)
    }

    /// Queues provisioning jobs for subscription-created events. Returns
    /// the number of events processed.
    #[tracing::instrument(skip(self))]
    pub async fn process_subscription_events(&self) -> Result<usize> {
        let cursor = *self.subscription_cursor.read().await;
        let events = self
            .log
            .query(
                EventQuery::for_event_type(SUBSCRIPTION_CREATED_EVENT).after_sequence_id(cursor),
            )
            .await?;

        let mut processed = 0;
        for event in events {
            self.queue_provisioning_job(&event).await?;
            *self.subscription_cursor.write().await = event.sequence_id;
            processed += 1;
        }
        Ok(processed)
    }

    async fn project_published_offer(&self, event: &DomainEvent) -> Result<()> {
        let offer_id = OfferId::new(event.partition_key.clone());

        // Replay the offer as of the publish event so later edits do not
        // leak into this revision.
        let history = self
            .log
            .query(EventQuery::for_partition(&event.partition_key))
            .await?;
        let history: Vec<DomainEvent> = history
            .into_iter()
            .filter(|e| e.sequence_id <= event.sequence_id)
            .collect();

        let Some(offer) = reconstruct(&offer_id, None, &history)? else {
            tracing::warn!(%offer_id, "published offer no longer exists, skipping");
            return Ok(());
        };

        let steps_secret_name = offer
            .provisioning_steps_secret_name()
            .ok_or_else(|| {
                ProvisionError::Configuration(format!(
                    "offer {} has no provisioning step secret",
                    offer_id
                ))
            })?
            .to_string();

        for plan in offer.plans() {
            let mut parameters = offer.parameters().to_vec();
            parameters.extend(plan.parameters.iter().cloned());

            let record = PlanRecord {
                offer_id: offer_id.clone(),
                plan_id: plan.plan_id.clone(),
                created_by_event_id: event.sequence_id,
                mode: plan.mode,
                application_name: plan.application_name.clone(),
                plan: plan.clone(),
                parameters,
                on_subscribe: plan.on_subscribe.clone(),
                provisioning_steps_secret_name: steps_secret_name.clone(),
            };
            self.plans.upsert(record).await?;
        }

        metrics::counter!("provision_plans_projected_total").increment(offer.plans().len() as u64);
        tracing::info!(
            %offer_id,
            sequence_id = %event.sequence_id,
            plan_count = offer.plans().len(),
            "published offer projected"
        );
        Ok(())
    }

    async fn queue_provisioning_job(&self, event: &DomainEvent) -> Result<()> {
        let data: SubscriptionCreatedData = serde_json::from_value(event.payload.clone())?;

        let plan = self
            .plans
            .find(
                &data.offer_id,
                &data.plan_id,
                data.plan_published_by_event_id,
            )
            .await?
            .ok_or_else(|| ProvisionError::PlanNotFound {
                offer_id: data.offer_id.to_string(),
                plan_id: data.plan_id.to_string(),
                created_by_event_id: data.plan_published_by_event_id.as_i64(),
                subscription_id: data.subscription_id,
            })?;

        // Fold the subscription identity into the parameter blob so steps
        // can bind it like any other workflow parameter.
        let content = self.secrets.get(&data.parameters_secret_name).await?;
        let mut parameters: Vec<SubscriptionParameter> = serde_json::from_str(&content)?;
        upsert_parameter(
            &mut parameters,
            SubscriptionParameter::system(SUBSCRIPTION_ID_PARAM, data.subscription_id.to_string()),
        );
        upsert_parameter(
            &mut parameters,
            SubscriptionParameter::system(SUBSCRIPTION_NAME_PARAM, data.subscription_name.clone()),
        );
        upsert_parameter(
            &mut parameters,
            SubscriptionParameter::system(OWNER_ID_PARAM, data.owner_id.clone()),
        );
        if let Some(ref application_name) = plan.application_name {
            upsert_parameter(
                &mut parameters,
                SubscriptionParameter::system(APPLICATION_NAME_PARAM, application_name.clone()),
            );
        }
        self.secrets
            .set(
                &data.parameters_secret_name,
                &serde_json::to_string(&parameters)?,
            )
            .await?;

        let now = Utc::now();
        let job = ProvisioningJob {
            subscription_id: data.subscription_id,
            offer_id: data.offer_id,
            plan_id: data.plan_id,
            plan_created_by_event_id: data.plan_published_by_event_id,
            mode: plan.mode,
            application_name: plan.application_name.clone(),
            event_type: event.event_type.clone(),
            status: ProvisionStatus::Queued,
            is_active: false,
            provisioning_step_index: BOOTSTRAP_STEP_INDEX,
            provisioning_step_status: StepStatus::NotStarted,
            parameters_secret_name: data.parameters_secret_name,
            provisioning_steps_secret_name: plan.provisioning_steps_secret_name,
            last_error_message: None,
            retry_count: 0,
            created_by_event_id: event.sequence_id,
            row_version: 0,
            created_time: now,
            last_updated_time: now,
            completed_time: None,
        };

        if self.jobs.create_if_absent(job).await? {
            metrics::counter!("provision_jobs_queued_total").increment(1);
            tracing::info!(
                subscription_id = %event.partition_key,
                "provisioning job queued"
            );
        }
        Ok(())
    }
}
