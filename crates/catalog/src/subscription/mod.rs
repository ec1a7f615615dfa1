//! Subscription side of the catalog.
//!
//! A subscription is recorded as a single subscription-created event that
//! pins the plan revision governing it and references the buyer-supplied
//! parameter blob in the secret store. The provisioning service consumes
//! the event to queue a job.

use common::SubscriptionId;
use event_store::{EventLog, NewEvent, NotificationQueue, SequenceId};
use secret_store::{PARAMETERS_SECRET_PREFIX, SecretStore, generate_secret_name};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::offer::{OfferId, OfferService, OfferStatus, ParameterValueType, PlanId};

/// Event type name of the subscription-created event.
pub const SUBSCRIPTION_CREATED_EVENT: &str = "SubscriptionCreated";

/// A runtime workflow parameter accumulated for a subscription.
///
/// Buyer-supplied parameters carry `is_system_parameter = false`; values
/// produced by provisioning steps are system parameters. Later writers
/// overwrite earlier values by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionParameter {
    /// Unique parameter name.
    pub name: String,

    /// Parameter value, serialized as a string.
    pub value: String,

    /// Value type.
    pub value_type: ParameterValueType,

    /// True when produced by a step rather than supplied by the buyer.
    pub is_system_parameter: bool,
}

impl SubscriptionParameter {
    /// Creates a buyer-supplied string parameter.
    pub fn user(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_type: ParameterValueType::String,
            is_system_parameter: false,
        }
    }

    /// Creates a step-produced string parameter.
    pub fn system(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_type: ParameterValueType::String,
            is_system_parameter: true,
        }
    }
}

/// Looks up a parameter value by name.
pub fn find_parameter<'a>(parameters: &'a [SubscriptionParameter], name: &str) -> Option<&'a str> {
    parameters
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.value.as_str())
}

/// Returns true if a parameter with the given name is present.
pub fn has_parameter(parameters: &[SubscriptionParameter], name: &str) -> bool {
    parameters.iter().any(|p| p.name == name)
}

/// Adds or overwrites a parameter by name.
pub fn upsert_parameter(parameters: &mut Vec<SubscriptionParameter>, parameter: SubscriptionParameter) {
    if let Some(existing) = parameters.iter_mut().find(|p| p.name == parameter.name) {
        *existing = parameter;
    } else {
        parameters.push(parameter);
    }
}

/// Payload of the subscription-created event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCreatedData {
    /// The new subscription.
    pub subscription_id: SubscriptionId,

    /// Buyer-chosen subscription name.
    pub subscription_name: String,

    /// Identity of the subscribing user.
    pub owner_id: String,

    /// The subscribed offer.
    pub offer_id: OfferId,

    /// The subscribed plan.
    pub plan_id: PlanId,

    /// Publish event that produced the plan revision governing this
    /// subscription.
    pub plan_published_by_event_id: SequenceId,

    /// Secret holding the buyer-supplied parameters.
    pub parameters_secret_name: String,
}

/// Command to create a subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub subscription_id: SubscriptionId,
    pub subscription_name: String,
    pub owner_id: String,
    pub offer_id: OfferId,
    pub plan_id: PlanId,
    pub parameters: Vec<SubscriptionParameter>,
}

/// Service for creating subscriptions against published offers.
pub struct SubscriptionService<L, S, N>
where
    L: EventLog,
    S: SecretStore,
    N: NotificationQueue,
{
    log: L,
    secrets: S,
    notifier: N,
}

impl<L, S, N> SubscriptionService<L, S, N>
where
    L: EventLog + Clone,
    S: SecretStore + Clone,
    N: NotificationQueue + Clone,
{
    /// Creates a new subscription service.
    pub fn new(log: L, secrets: S, notifier: N) -> Self {
        Self {
            log,
            secrets,
            notifier,
        }
    }

    /// Creates a subscription: validates the offer and plan, persists the
    /// buyer parameters and appends the subscription-created event.
    #[tracing::instrument(skip(self, cmd), fields(subscription_id = %cmd.subscription_id))]
    pub async fn create_subscription(
        &self,
        cmd: CreateSubscription,
    ) -> Result<SubscriptionCreatedData> {
        let offers = OfferService::new(
            self.log.clone(),
            self.secrets.clone(),
            self.notifier.clone(),
        );

        let offer = offers
            .get_offer(&cmd.offer_id)
            .await?
            .ok_or_else(|| CatalogError::OfferNotFound {
                offer_id: cmd.offer_id.to_string(),
            })?;

        if offer.status() != OfferStatus::Published {
            return Err(CatalogError::InvalidStatusTransition {
                status: offer.status(),
                action: "subscribe",
            });
        }

        if offer.get_plan(&cmd.plan_id).is_none() {
            return Err(CatalogError::PlanNotFound {
                offer_id: cmd.offer_id.to_string(),
                plan_id: cmd.plan_id.to_string(),
            });
        }

        let plan_published_by_event_id = offers
            .latest_published_version(&cmd.offer_id)
            .await?
            .ok_or_else(|| CatalogError::OfferNotFound {
                offer_id: cmd.offer_id.to_string(),
            })?;

        let parameters_secret_name = generate_secret_name(PARAMETERS_SECRET_PREFIX);
        self.secrets
            .set(
                &parameters_secret_name,
                &serde_json::to_string(&cmd.parameters)?,
            )
            .await?;

        let data = SubscriptionCreatedData {
            subscription_id: cmd.subscription_id,
            subscription_name: cmd.subscription_name,
            owner_id: cmd.owner_id,
            offer_id: cmd.offer_id,
            plan_id: cmd.plan_id,
            plan_published_by_event_id,
            parameters_secret_name,
        };

        let event = NewEvent::builder()
            .partition_key(data.subscription_id.to_string())
            .event_type(SUBSCRIPTION_CREATED_EVENT)
            .payload(&data)?
            .created_by(data.owner_id.as_str())
            .build();
        self.log.append(event).await?;

        self.notifier.publish(SUBSCRIPTION_CREATED_EVENT).await?;
        metrics::counter!("catalog_subscriptions_created_total").increment(1);
        tracing::info!(
            subscription_id = %data.subscription_id,
            offer_id = %data.offer_id,
            plan_id = %data.plan_id,
            "subscription created"
        );

        Ok(data)
    }
}
