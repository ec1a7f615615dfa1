//! Offer aggregate implementation.

use event_store::SequenceId;
use serde::{Deserialize, Serialize};

use super::{
    OfferEvent, OfferId, OfferParameter, OfferProperties, OfferStatus, Plan, PlanId,
    ProvisioningStep,
    events::{
        OfferCreatedData, ParameterCreatedData, ParameterUpdatedData, PlanCreatedData,
        PlanUpdatedData,
    },
};

/// The offer aggregate, derived by replaying its event partition.
///
/// The aggregate is never persisted as a source of truth; it only exists
/// as replay output, optionally cached in a snapshot. The provisioning
/// step list lives in the secret store and is resolved lazily; the
/// aggregate carries only the secret name until materialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Unique offer identifier.
    id: Option<OfferId>,

    /// Current lifecycle status.
    status: OfferStatus,

    /// Display metadata.
    properties: OfferProperties,

    /// Plans, ordered by creation, replaced in place by key.
    plans: Vec<Plan>,

    /// Offer-level parameter definitions.
    parameters: Vec<OfferParameter>,

    /// Provisioning steps, present only after materialization.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    provisioning_steps: Vec<ProvisioningStep>,

    /// Secret holding the current step list blob.
    provisioning_steps_secret_name: Option<String>,

    /// Sequence id of the last applied event.
    #[serde(default)]
    last_applied_event_id: SequenceId,
}

// Query methods
impl Offer {
    /// Returns the offer ID.
    pub fn id(&self) -> Option<&OfferId> {
        self.id.as_ref()
    }

    /// Returns the current status.
    pub fn status(&self) -> OfferStatus {
        self.status
    }

    /// Returns the display metadata.
    pub fn properties(&self) -> &OfferProperties {
        &self.properties
    }

    /// Returns all plans in order.
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Returns a plan by ID.
    pub fn get_plan(&self, plan_id: &PlanId) -> Option<&Plan> {
        self.plans.iter().find(|p| &p.plan_id == plan_id)
    }

    /// Returns the offer-level parameter definitions.
    pub fn parameters(&self) -> &[OfferParameter] {
        &self.parameters
    }

    /// Returns a parameter definition by name.
    pub fn get_parameter(&self, name: &str) -> Option<&OfferParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Returns the materialized provisioning steps.
    ///
    /// Empty until `materialize_steps` has resolved the secret blob.
    pub fn provisioning_steps(&self) -> &[ProvisioningStep] {
        &self.provisioning_steps
    }

    /// Returns a materialized step by name.
    pub fn get_provisioning_step(&self, name: &str) -> Option<&ProvisioningStep> {
        self.provisioning_steps.iter().find(|s| s.name == name)
    }

    /// Returns the secret name of the current step list blob.
    pub fn provisioning_steps_secret_name(&self) -> Option<&str> {
        self.provisioning_steps_secret_name.as_deref()
    }

    /// Returns the sequence id of the last applied event.
    pub fn last_applied_event_id(&self) -> SequenceId {
        self.last_applied_event_id
    }

    /// Replaces the materialized step list.
    pub(crate) fn set_provisioning_steps(&mut self, steps: Vec<ProvisioningStep>) {
        self.provisioning_steps = steps;
    }

    /// Records the cursor of the last applied event.
    pub(crate) fn set_last_applied_event_id(&mut self, sequence_id: SequenceId) {
        self.last_applied_event_id = sequence_id;
    }
}

// Event application
impl Offer {
    /// Applies an event, updating the aggregate state.
    ///
    /// Pure and deterministic: given the same state and event it always
    /// produces the same new state.
    pub fn apply(&mut self, event: OfferEvent) {
        match event {
            OfferEvent::OfferCreated(data) => self.apply_offer_created(data),
            OfferEvent::OfferUpdated(data) => data.properties.merge_into(&mut self.properties),
            OfferEvent::OfferPublished(_) => {
                self.status = OfferStatus::Published;
            }
            OfferEvent::OfferDeleted(_) => {
                self.status = OfferStatus::Deleted;
            }
            OfferEvent::PlanCreated(data) => self.apply_plan_created(data),
            OfferEvent::PlanUpdated(data) => self.apply_plan_updated(data),
            OfferEvent::PlanDeleted(data) => {
                self.plans.retain(|p| p.plan_id != data.plan_id);
            }
            OfferEvent::ParameterCreated(data) => self.apply_parameter_created(data),
            OfferEvent::ParameterUpdated(data) => self.apply_parameter_updated(data),
            OfferEvent::ParameterDeleted(data) => {
                self.parameters.retain(|p| p.name != data.parameter_name);
            }
            OfferEvent::StepCreated(data) => {
                self.provisioning_steps_secret_name = Some(data.provisioning_steps_secret_name);
            }
            OfferEvent::StepUpdated(data) => {
                self.provisioning_steps_secret_name = Some(data.provisioning_steps_secret_name);
            }
            OfferEvent::StepDeleted(data) => {
                self.provisioning_steps_secret_name = Some(data.provisioning_steps_secret_name);
            }
        }
    }

    fn apply_offer_created(&mut self, data: OfferCreatedData) {
        self.id = Some(data.offer_id);
        self.status = OfferStatus::Draft;
        self.properties = data.properties;
        self.provisioning_steps_secret_name = Some(data.provisioning_steps_secret_name);
    }

    fn apply_plan_created(&mut self, data: PlanCreatedData) {
        self.plans.push(data.plan);
    }

    fn apply_plan_updated(&mut self, data: PlanUpdatedData) {
        // Replace in place so the ordered-by-key list keeps its order
        if let Some(existing) = self.plans.iter_mut().find(|p| p.plan_id == data.plan_id) {
            *existing = data.plan;
        } else {
            self.plans.push(data.plan);
        }
    }

    fn apply_parameter_created(&mut self, data: ParameterCreatedData) {
        self.parameters.push(data.parameter);
    }

    fn apply_parameter_updated(&mut self, data: ParameterUpdatedData) {
        if let Some(existing) = self
            .parameters
            .iter_mut()
            .find(|p| p.name == data.parameter_name)
        {
            *existing = data.parameter;
        } else {
            self.parameters.push(data.parameter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::{OfferPropertiesPatch, PlanMode};

    fn test_plan(plan_id: &str) -> Plan {
        Plan {
            plan_id: PlanId::new(plan_id),
            display_name: format!("Plan {}", plan_id),
            description: String::new(),
            mode: PlanMode::SaaS,
            application_name: None,
            on_subscribe: vec![],
            parameters: vec![],
        }
    }

    fn created_offer() -> Offer {
        let mut offer = Offer::default();
        offer.apply(OfferEvent::offer_created(
            OfferId::new("offer-1"),
            OfferProperties {
                display_name: "Test".to_string(),
                ..Default::default()
            },
            "stp-initial",
        ));
        offer
    }

    #[test]
    fn test_create_initializes_draft() {
        let offer = created_offer();
        assert_eq!(offer.id().map(OfferId::as_str), Some("offer-1"));
        assert_eq!(offer.status(), OfferStatus::Draft);
        assert_eq!(offer.provisioning_steps_secret_name(), Some("stp-initial"));
    }

    #[test]
    fn test_update_merges_partially() {
        let mut offer = created_offer();
        offer.apply(OfferEvent::offer_updated(OfferPropertiesPatch {
            description: Some("New description".to_string()),
            ..Default::default()
        }));

        assert_eq!(offer.properties().display_name, "Test");
        assert_eq!(offer.properties().description, "New description");
    }

    #[test]
    fn test_publish_and_delete_transitions() {
        let mut offer = created_offer();
        offer.apply(OfferEvent::offer_published(None));
        assert_eq!(offer.status(), OfferStatus::Published);

        offer.apply(OfferEvent::offer_deleted());
        assert_eq!(offer.status(), OfferStatus::Deleted);
    }

    #[test]
    fn test_plan_replace_by_key_keeps_order() {
        let mut offer = created_offer();
        offer.apply(OfferEvent::plan_created(test_plan("basic")));
        offer.apply(OfferEvent::plan_created(test_plan("premium")));

        let mut replacement = test_plan("basic");
        replacement.display_name = "Basic v2".to_string();
        offer.apply(OfferEvent::plan_updated(replacement));

        let ids: Vec<_> = offer.plans().iter().map(|p| p.plan_id.as_str()).collect();
        assert_eq!(ids, vec!["basic", "premium"]);
        assert_eq!(offer.plans()[0].display_name, "Basic v2");
    }

    #[test]
    fn test_plan_delete_removes_by_key() {
        let mut offer = created_offer();
        offer.apply(OfferEvent::plan_created(test_plan("basic")));
        offer.apply(OfferEvent::plan_created(test_plan("premium")));
        offer.apply(OfferEvent::plan_deleted(PlanId::new("basic")));

        assert_eq!(offer.plans().len(), 1);
        assert!(offer.get_plan(&PlanId::new("basic")).is_none());
    }

    #[test]
    fn test_step_events_move_secret_ref() {
        let mut offer = created_offer();
        offer.apply(OfferEvent::step_created("deploy", "stp-second"));
        assert_eq!(offer.provisioning_steps_secret_name(), Some("stp-second"));

        offer.apply(OfferEvent::step_deleted("deploy", "stp-third"));
        assert_eq!(offer.provisioning_steps_secret_name(), Some("stp-third"));
    }

    #[test]
    fn test_parameter_crud() {
        let mut offer = created_offer();
        let param = OfferParameter {
            name: "region".to_string(),
            display_name: "Region".to_string(),
            description: String::new(),
            value_type: crate::offer::ParameterValueType::String,
            is_required: true,
            default_value: None,
        };
        offer.apply(OfferEvent::parameter_created(param.clone()));
        assert!(offer.get_parameter("region").is_some());

        let mut updated = param.clone();
        updated.is_required = false;
        offer.apply(OfferEvent::parameter_updated(updated));
        assert!(!offer.get_parameter("region").unwrap().is_required);

        offer.apply(OfferEvent::parameter_deleted("region"));
        assert!(offer.get_parameter("region").is_none());
    }
}
