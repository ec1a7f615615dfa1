//! Offer publishing service.
//!
//! The command side of the offer aggregate: validates against the current
//! replayed state, appends events to the log, keeps the provisioning step
//! blob in the secret store and writes snapshots. The step blob is
//! re-persisted under a freshly generated name on every step mutation so
//! that references recorded in earlier events stay valid.

use event_store::{
    EventLog, EventLogExt, EventQuery, NewEvent, NotificationQueue, SequenceId, Snapshot,
};
use secret_store::{PROVISIONING_STEPS_SECRET_PREFIX, SecretStore, generate_secret_name};

use crate::error::{CatalogError, Result};

use super::{
    Offer, OfferEvent, OfferId, OfferParameter, OfferProperties, OfferPropertiesPatch, Plan,
    PlanId, ProvisioningStep,
    events::OFFER_PUBLISHED_EVENT,
    reconstructor::{materialize_steps, reconstruct},
};

/// Service for authoring and publishing offers.
pub struct OfferService<L, S, N>
where
    L: EventLog,
    S: SecretStore,
    N: NotificationQueue,
{
    log: L,
    secrets: S,
    notifier: N,
}

impl<L, S, N> OfferService<L, S, N>
where
    L: EventLog,
    S: SecretStore,
    N: NotificationQueue,
{
    /// Creates a new offer service.
    pub fn new(log: L, secrets: S, notifier: N) -> Self {
        Self {
            log,
            secrets,
            notifier,
        }
    }

    /// Creates a new draft offer.
    #[tracing::instrument(skip(self, properties))]
    pub async fn create_offer(
        &self,
        offer_id: OfferId,
        properties: OfferProperties,
        created_by: &str,
    ) -> Result<Offer> {
        if self.log.partition_exists(offer_id.as_str()).await? {
            return Err(CatalogError::OfferAlreadyExists {
                offer_id: offer_id.to_string(),
            });
        }

        let secret_name = generate_secret_name(PROVISIONING_STEPS_SECRET_PREFIX);
        self.secrets.set(&secret_name, "[]").await?;

        let event = OfferEvent::offer_created(offer_id.clone(), properties, secret_name);
        self.append_event(&offer_id, &event, created_by).await?;

        self.load_existing(&offer_id).await
    }

    /// Partially updates an offer's display metadata.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_offer(
        &self,
        offer_id: &OfferId,
        patch: OfferPropertiesPatch,
        created_by: &str,
    ) -> Result<Offer> {
        let offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "update offer")?;

        let event = OfferEvent::offer_updated(patch);
        self.append_event(offer_id, &event, created_by).await?;

        self.load_existing(offer_id).await
    }

    /// Publishes the offer and writes a snapshot.
    ///
    /// Returns the sequence id of the publish event; provisioning jobs pin
    /// the plan revision that governs them to this id.
    #[tracing::instrument(skip(self))]
    pub async fn publish_offer(
        &self,
        offer_id: &OfferId,
        comments: Option<String>,
        created_by: &str,
    ) -> Result<SequenceId> {
        let mut offer = self.load_existing(offer_id).await?;
        if !offer.status().can_publish() {
            return Err(CatalogError::InvalidStatusTransition {
                status: offer.status(),
                action: "publish",
            });
        }

        let event = OfferEvent::offer_published(comments);
        let stored = self.append_event(offer_id, &event, created_by).await?;

        offer.apply(event);
        offer.set_last_applied_event_id(stored.sequence_id);

        let snapshot = Snapshot::from_state(offer_id.as_str(), stored.sequence_id, &offer)?;
        self.log.save_snapshot(snapshot).await?;

        self.notifier.publish(OFFER_PUBLISHED_EVENT).await?;
        metrics::counter!("catalog_offers_published_total").increment(1);
        tracing::info!(%offer_id, sequence_id = %stored.sequence_id, "offer published");

        Ok(stored.sequence_id)
    }

    /// Deletes the offer.
    #[tracing::instrument(skip(self))]
    pub async fn delete_offer(&self, offer_id: &OfferId, created_by: &str) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        if !offer.status().can_delete() {
            return Err(CatalogError::InvalidStatusTransition {
                status: offer.status(),
                action: "delete",
            });
        }

        let event = OfferEvent::offer_deleted();
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Adds a plan to the offer.
    #[tracing::instrument(skip(self, plan), fields(plan_id = %plan.plan_id))]
    pub async fn create_plan(&self, offer_id: &OfferId, plan: Plan, created_by: &str) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "create plan")?;
        if offer.get_plan(&plan.plan_id).is_some() {
            return Err(CatalogError::PlanAlreadyExists {
                offer_id: offer_id.to_string(),
                plan_id: plan.plan_id.to_string(),
            });
        }

        let event = OfferEvent::plan_created(plan);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Replaces a plan by key.
    #[tracing::instrument(skip(self, plan), fields(plan_id = %plan.plan_id))]
    pub async fn update_plan(&self, offer_id: &OfferId, plan: Plan, created_by: &str) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "update plan")?;
        if offer.get_plan(&plan.plan_id).is_none() {
            return Err(CatalogError::PlanNotFound {
                offer_id: offer_id.to_string(),
                plan_id: plan.plan_id.to_string(),
            });
        }

        let event = OfferEvent::plan_updated(plan);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Removes a plan from the offer.
    #[tracing::instrument(skip(self))]
    pub async fn delete_plan(
        &self,
        offer_id: &OfferId,
        plan_id: &PlanId,
        created_by: &str,
    ) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "delete plan")?;
        if offer.get_plan(plan_id).is_none() {
            return Err(CatalogError::PlanNotFound {
                offer_id: offer_id.to_string(),
                plan_id: plan_id.to_string(),
            });
        }

        let event = OfferEvent::plan_deleted(plan_id.clone());
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Adds a parameter definition to the offer.
    #[tracing::instrument(skip(self, parameter), fields(name = %parameter.name))]
    pub async fn create_parameter(
        &self,
        offer_id: &OfferId,
        parameter: OfferParameter,
        created_by: &str,
    ) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "create parameter")?;
        if offer.get_parameter(&parameter.name).is_some() {
            return Err(CatalogError::ParameterAlreadyExists {
                name: parameter.name,
            });
        }

        let event = OfferEvent::parameter_created(parameter);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Replaces a parameter definition by name.
    #[tracing::instrument(skip(self, parameter), fields(name = %parameter.name))]
    pub async fn update_parameter(
        &self,
        offer_id: &OfferId,
        parameter: OfferParameter,
        created_by: &str,
    ) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "update parameter")?;
        if offer.get_parameter(&parameter.name).is_none() {
            return Err(CatalogError::ParameterNotFound {
                name: parameter.name,
            });
        }

        let event = OfferEvent::parameter_updated(parameter);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Removes a parameter definition from the offer.
    #[tracing::instrument(skip(self))]
    pub async fn delete_parameter(
        &self,
        offer_id: &OfferId,
        name: &str,
        created_by: &str,
    ) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "delete parameter")?;
        if offer.get_parameter(name).is_none() {
            return Err(CatalogError::ParameterNotFound {
                name: name.to_string(),
            });
        }

        let event = OfferEvent::parameter_deleted(name);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Adds a provisioning step.
    ///
    /// The full post-mutation step list is written to the secret store
    /// under a freshly generated name recorded in the event.
    #[tracing::instrument(skip(self, step), fields(step_name = %step.name))]
    pub async fn create_provisioning_step(
        &self,
        offer_id: &OfferId,
        step: ProvisioningStep,
        created_by: &str,
    ) -> Result<()> {
        let mut offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "create provisioning step")?;
        materialize_steps(&mut offer, &self.secrets).await?;

        if offer.get_provisioning_step(&step.name).is_some() {
            return Err(CatalogError::StepAlreadyExists { name: step.name });
        }

        let step_name = step.name.clone();
        let mut steps = offer.provisioning_steps().to_vec();
        steps.push(step);

        let secret_name = self.persist_steps(&steps).await?;
        let event = OfferEvent::step_created(step_name, secret_name);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Replaces a provisioning step by name.
    #[tracing::instrument(skip(self, step), fields(step_name = %step.name))]
    pub async fn update_provisioning_step(
        &self,
        offer_id: &OfferId,
        step: ProvisioningStep,
        created_by: &str,
    ) -> Result<()> {
        let mut offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "update provisioning step")?;
        materialize_steps(&mut offer, &self.secrets).await?;

        let mut steps = offer.provisioning_steps().to_vec();
        let existing = steps
            .iter_mut()
            .find(|s| s.name == step.name)
            .ok_or_else(|| CatalogError::StepNotFound {
                name: step.name.clone(),
            })?;
        let step_name = step.name.clone();
        *existing = step;

        let secret_name = self.persist_steps(&steps).await?;
        let event = OfferEvent::step_updated(step_name, secret_name);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Removes a provisioning step.
    #[tracing::instrument(skip(self))]
    pub async fn delete_provisioning_step(
        &self,
        offer_id: &OfferId,
        step_name: &str,
        created_by: &str,
    ) -> Result<()> {
        let mut offer = self.load_existing(offer_id).await?;
        self.ensure_modifiable(&offer, "delete provisioning step")?;
        materialize_steps(&mut offer, &self.secrets).await?;

        if offer.get_provisioning_step(step_name).is_none() {
            return Err(CatalogError::StepNotFound {
                name: step_name.to_string(),
            });
        }

        let mut steps = offer.provisioning_steps().to_vec();
        steps.retain(|s| s.name != step_name);

        let secret_name = self.persist_steps(&steps).await?;
        let event = OfferEvent::step_deleted(step_name, secret_name);
        self.append_event(offer_id, &event, created_by).await?;
        Ok(())
    }

    /// Loads the current offer with its step list materialized.
    ///
    /// Returns None when the offer does not exist or has been deleted.
    #[tracing::instrument(skip(self))]
    pub async fn get_offer(&self, offer_id: &OfferId) -> Result<Option<Offer>> {
        let (snapshot, events) = self.log.load_resource(offer_id.as_str()).await?;
        if snapshot.is_none() && events.is_empty() {
            return Ok(None);
        }

        match reconstruct(offer_id, snapshot.as_ref(), &events)? {
            Some(mut offer) => {
                materialize_steps(&mut offer, &self.secrets).await?;
                Ok(Some(offer))
            }
            None => Ok(None),
        }
    }

    /// Writes a snapshot of the offer's current state.
    #[tracing::instrument(skip(self))]
    pub async fn create_snapshot(&self, offer_id: &OfferId) -> Result<()> {
        let offer = self.load_existing(offer_id).await?;
        let snapshot =
            Snapshot::from_state(offer_id.as_str(), offer.last_applied_event_id(), &offer)?;
        self.log.save_snapshot(snapshot).await?;
        Ok(())
    }

    /// Returns the sequence id of the latest publish event, if any.
    pub async fn latest_published_version(&self, offer_id: &OfferId) -> Result<Option<SequenceId>> {
        let events = self
            .log
            .query(
                EventQuery::for_partition(offer_id.as_str()).event_type(OFFER_PUBLISHED_EVENT),
            )
            .await?;
        Ok(events.last().map(|e| e.sequence_id))
    }

    // Loads the offer without materializing steps, failing when absent.
    async fn load_existing(&self, offer_id: &OfferId) -> Result<Offer> {
        let (snapshot, events) = self.log.load_resource(offer_id.as_str()).await?;
        if snapshot.is_none() && events.is_empty() {
            return Err(CatalogError::OfferNotFound {
                offer_id: offer_id.to_string(),
            });
        }

        reconstruct(offer_id, snapshot.as_ref(), &events)?.ok_or_else(|| {
            CatalogError::OfferNotFound {
                offer_id: offer_id.to_string(),
            }
        })
    }

    fn ensure_modifiable(&self, offer: &Offer, action: &'static str) -> Result<()> {
        if !offer.status().can_modify() {
            return Err(CatalogError::InvalidStatusTransition {
                status: offer.status(),
                action,
            });
        }
        Ok(())
    }

    async fn persist_steps(&self, steps: &[ProvisioningStep]) -> Result<String> {
        let secret_name = generate_secret_name(PROVISIONING_STEPS_SECRET_PREFIX);
        self.secrets
            .set(&secret_name, &serde_json::to_string(steps)?)
            .await?;
        Ok(secret_name)
    }

    async fn append_event(
        &self,
        offer_id: &OfferId,
        event: &OfferEvent,
        created_by: &str,
    ) -> Result<event_store::DomainEvent> {
        let new_event = NewEvent::builder()
            .partition_key(offer_id.as_str())
            .event_type(event.event_type())
            .payload(event)?
            .created_by(created_by)
            .build();

        let stored = self.log.append(new_event).await?;
        metrics::counter!("catalog_events_appended_total").increment(1);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::{PlanMode, StepConfig, WebhookAuthType, WebhookStepConfig};
    use event_store::{InMemoryEventLog, InMemoryNotificationQueue};
    use secret_store::InMemorySecretStore;

    type TestService = OfferService<InMemoryEventLog, InMemorySecretStore, InMemoryNotificationQueue>;

    fn setup() -> (TestService, InMemorySecretStore, InMemoryNotificationQueue) {
        let secrets = InMemorySecretStore::new();
        let notifier = InMemoryNotificationQueue::new();
        let service = OfferService::new(InMemoryEventLog::new(), secrets.clone(), notifier.clone());
        (service, secrets, notifier)
    }

    fn test_plan(plan_id: &str) -> Plan {
        Plan {
            plan_id: PlanId::new(plan_id),
            display_name: plan_id.to_string(),
            description: String::new(),
            mode: PlanMode::SaaS,
            application_name: None,
            on_subscribe: vec![],
            parameters: vec![],
        }
    }

    fn webhook_step(name: &str) -> ProvisioningStep {
        ProvisioningStep {
            name: name.to_string(),
            is_synchronized: true,
            timeout_in_seconds: 60,
            input_parameter_names: vec![],
            output_parameter_names: vec![],
            config: StepConfig::Webhook(WebhookStepConfig {
                url: "https://example.com/hook".to_string(),
                auth_type: WebhookAuthType::None,
                auth_key: None,
                auth_value: None,
            }),
        }
    }

    #[tokio::test]
    async fn create_and_get_offer() {
        let (service, _, _) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();

        let offer = service.get_offer(&offer_id).await.unwrap().unwrap();
        assert_eq!(offer.status(), crate::offer::OfferStatus::Draft);
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let (service, _, _) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();
        let result = service
            .create_offer(offer_id, OfferProperties::default(), "tests")
            .await;
        assert!(matches!(
            result,
            Err(CatalogError::OfferAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn publish_notifies_and_snapshots() {
        let (service, _, notifier) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();
        service
            .create_plan(&offer_id, test_plan("basic"), "tests")
            .await
            .unwrap();

        let version = service.publish_offer(&offer_id, None, "tests").await.unwrap();
        assert!(version.as_i64() > 0);
        assert_eq!(notifier.messages().await, vec![OFFER_PUBLISHED_EVENT]);
        assert_eq!(
            service.latest_published_version(&offer_id).await.unwrap(),
            Some(version)
        );
    }

    #[tokio::test]
    async fn step_mutations_move_the_blob_to_fresh_secrets() {
        let (service, secrets, _) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();
        let initial = service
            .get_offer(&offer_id)
            .await
            .unwrap()
            .unwrap()
            .provisioning_steps_secret_name()
            .unwrap()
            .to_string();

        service
            .create_provisioning_step(&offer_id, webhook_step("deploy"), "tests")
            .await
            .unwrap();

        let offer = service.get_offer(&offer_id).await.unwrap().unwrap();
        let current = offer.provisioning_steps_secret_name().unwrap().to_string();
        assert_ne!(initial, current);
        assert_eq!(offer.provisioning_steps().len(), 1);

        // The blob referenced by the create event is still readable
        assert!(secrets.contains(&initial).await);
    }

    #[tokio::test]
    async fn duplicate_step_name_fails() {
        let (service, _, _) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();
        service
            .create_provisioning_step(&offer_id, webhook_step("deploy"), "tests")
            .await
            .unwrap();

        let result = service
            .create_provisioning_step(&offer_id, webhook_step("deploy"), "tests")
            .await;
        assert!(matches!(result, Err(CatalogError::StepAlreadyExists { .. })));
    }

    #[tokio::test]
    async fn delete_step_rewrites_list() {
        let (service, _, _) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();
        service
            .create_provisioning_step(&offer_id, webhook_step("first"), "tests")
            .await
            .unwrap();
        service
            .create_provisioning_step(&offer_id, webhook_step("second"), "tests")
            .await
            .unwrap();
        service
            .delete_provisioning_step(&offer_id, "first", "tests")
            .await
            .unwrap();

        let offer = service.get_offer(&offer_id).await.unwrap().unwrap();
        let names: Vec<_> = offer
            .provisioning_steps()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["second"]);
    }

    #[tokio::test]
    async fn deleted_offer_is_absent() {
        let (service, _, _) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();
        service.delete_offer(&offer_id, "tests").await.unwrap();

        assert!(service.get_offer(&offer_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_plan_fails() {
        let (service, _, _) = setup();
        let offer_id = OfferId::new("offer-1");

        service
            .create_offer(offer_id.clone(), OfferProperties::default(), "tests")
            .await
            .unwrap();

        let result = service
            .update_plan(&offer_id, test_plan("missing"), "tests")
            .await;
        assert!(matches!(result, Err(CatalogError::PlanNotFound { .. })));
    }

    #[tokio::test]
    async fn get_missing_offer_returns_none() {
        let (service, _, _) = setup();
        let result = service.get_offer(&OfferId::new("nope")).await.unwrap();
        assert!(result.is_none());
    }
}
