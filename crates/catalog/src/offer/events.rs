//! Offer domain events.
//!
//! The closed event registry for the offer aggregate. Step events do not
//! embed the step list; they carry the secret name of the full
//! post-mutation list, so past events keep referencing the blob they were
//! written against.

use serde::{Deserialize, Serialize};

use super::{OfferId, OfferParameter, OfferProperties, OfferPropertiesPatch, Plan, PlanId};

/// Event type name of `OfferEvent::OfferCreated`.
pub const OFFER_CREATED_EVENT: &str = "OfferCreated";

/// Event type name of `OfferEvent::OfferPublished`.
pub const OFFER_PUBLISHED_EVENT: &str = "OfferPublished";

/// Events that can occur on an offer aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OfferEvent {
    /// Offer was created.
    OfferCreated(OfferCreatedData),

    /// Offer display metadata was partially updated.
    OfferUpdated(OfferUpdatedData),

    /// Offer was published.
    OfferPublished(OfferPublishedData),

    /// Offer was deleted.
    OfferDeleted(OfferDeletedData),

    /// Plan was added to the offer.
    PlanCreated(PlanCreatedData),

    /// Plan was replaced by key.
    PlanUpdated(PlanUpdatedData),

    /// Plan was removed from the offer.
    PlanDeleted(PlanDeletedData),

    /// Parameter definition was added to the offer.
    ParameterCreated(ParameterCreatedData),

    /// Parameter definition was replaced by name.
    ParameterUpdated(ParameterUpdatedData),

    /// Parameter definition was removed from the offer.
    ParameterDeleted(ParameterDeletedData),

    /// Provisioning step was added; the list blob moved to a new secret.
    StepCreated(StepCreatedData),

    /// Provisioning step was replaced by name; the list blob moved.
    StepUpdated(StepUpdatedData),

    /// Provisioning step was removed; the list blob moved.
    StepDeleted(StepDeletedData),
}

impl OfferEvent {
    /// Returns the event type name used in the log envelope.
    pub fn event_type(&self) -> &'static str {
        match self {
            OfferEvent::OfferCreated(_) => OFFER_CREATED_EVENT,
            OfferEvent::OfferUpdated(_) => "OfferUpdated",
            OfferEvent::OfferPublished(_) => OFFER_PUBLISHED_EVENT,
            OfferEvent::OfferDeleted(_) => "OfferDeleted",
            OfferEvent::PlanCreated(_) => "PlanCreated",
            OfferEvent::PlanUpdated(_) => "PlanUpdated",
            OfferEvent::PlanDeleted(_) => "PlanDeleted",
            OfferEvent::ParameterCreated(_) => "ParameterCreated",
            OfferEvent::ParameterUpdated(_) => "ParameterUpdated",
            OfferEvent::ParameterDeleted(_) => "ParameterDeleted",
            OfferEvent::StepCreated(_) => "StepCreated",
            OfferEvent::StepUpdated(_) => "StepUpdated",
            OfferEvent::StepDeleted(_) => "StepDeleted",
        }
    }

    /// Returns true if the event type name belongs to the closed registry.
    pub fn is_known_type(event_type: &str) -> bool {
        matches!(
            event_type,
            "OfferCreated"
                | "OfferUpdated"
                | "OfferPublished"
                | "OfferDeleted"
                | "PlanCreated"
                | "PlanUpdated"
                | "PlanDeleted"
                | "ParameterCreated"
                | "ParameterUpdated"
                | "ParameterDeleted"
                | "StepCreated"
                | "StepUpdated"
                | "StepDeleted"
        )
    }
}

/// Data for OfferCreated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferCreatedData {
    /// The offer being created.
    pub offer_id: OfferId,

    /// Initial display metadata.
    pub properties: OfferProperties,

    /// Secret holding the (initially empty) provisioning step list.
    pub provisioning_steps_secret_name: String,
}

/// Data for OfferUpdated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferUpdatedData {
    /// Partial property update; empty fields leave the aggregate
    /// untouched.
    pub properties: OfferPropertiesPatch,
}

/// Data for OfferPublished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferPublishedData {
    /// Free-form publish comment.
    pub comments: Option<String>,
}

/// Data for OfferDeleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDeletedData {}

/// Data for PlanCreated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCreatedData {
    /// The plan being added.
    pub plan: Plan,
}

/// Data for PlanUpdated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanUpdatedData {
    /// Key of the plan being replaced.
    pub plan_id: PlanId,

    /// The replacement plan.
    pub plan: Plan,
}

/// Data for PlanDeleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDeletedData {
    /// Key of the plan being removed.
    pub plan_id: PlanId,
}

/// Data for ParameterCreated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterCreatedData {
    /// The parameter definition being added.
    pub parameter: OfferParameter,
}

/// Data for ParameterUpdated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterUpdatedData {
    /// Name of the parameter being replaced.
    pub parameter_name: String,

    /// The replacement definition.
    pub parameter: OfferParameter,
}

/// Data for ParameterDeleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDeletedData {
    /// Name of the parameter being removed.
    pub parameter_name: String,
}

/// Data for StepCreated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCreatedData {
    /// Name of the step that was added.
    pub step_name: String,

    /// Secret holding the full post-mutation step list.
    pub provisioning_steps_secret_name: String,
}

/// Data for StepUpdated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUpdatedData {
    /// Name of the step that was replaced.
    pub step_name: String,

    /// Secret holding the full post-mutation step list.
    pub provisioning_steps_secret_name: String,
}

/// Data for StepDeleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDeletedData {
    /// Name of the step that was removed.
    pub step_name: String,

    /// Secret holding the full post-mutation step list.
    pub provisioning_steps_secret_name: String,
}

// Convenience constructors for events
impl OfferEvent {
    /// Creates an OfferCreated event.
    pub fn offer_created(
        offer_id: OfferId,
        properties: OfferProperties,
        provisioning_steps_secret_name: impl Into<String>,
    ) -> Self {
        OfferEvent::OfferCreated(OfferCreatedData {
            offer_id,
            properties,
            provisioning_steps_secret_name: provisioning_steps_secret_name.into(),
        })
    }

    /// Creates an OfferUpdated event.
    pub fn offer_updated(properties: OfferPropertiesPatch) -> Self {
        OfferEvent::OfferUpdated(OfferUpdatedData { properties })
    }

    /// Creates an OfferPublished event.
    pub fn offer_published(comments: Option<String>) -> Self {
        OfferEvent::OfferPublished(OfferPublishedData { comments })
    }

    /// Creates an OfferDeleted event.
    pub fn offer_deleted() -> Self {
        OfferEvent::OfferDeleted(OfferDeletedData {})
    }

    /// Creates a PlanCreated event.
    pub fn plan_created(plan: Plan) -> Self {
        OfferEvent::PlanCreated(PlanCreatedData { plan })
    }

    /// Creates a PlanUpdated event.
    pub fn plan_updated(plan: Plan) -> Self {
        OfferEvent::PlanUpdated(PlanUpdatedData {
            plan_id: plan.plan_id.clone(),
            plan,
        })
    }

    /// Creates a PlanDeleted event.
    pub fn plan_deleted(plan_id: PlanId) -> Self {
        OfferEvent::PlanDeleted(PlanDeletedData { plan_id })
    }

    /// Creates a ParameterCreated event.
    pub fn parameter_created(parameter: OfferParameter) -> Self {
        OfferEvent::ParameterCreated(ParameterCreatedData { parameter })
    }

    /// Creates a ParameterUpdated event.
    pub fn parameter_updated(parameter: OfferParameter) -> Self {
        OfferEvent::ParameterUpdated(ParameterUpdatedData {
            parameter_name: parameter.name.clone(),
            parameter,
        })
    }

    /// Creates a ParameterDeleted event.
    pub fn parameter_deleted(parameter_name: impl Into<String>) -> Self {
        OfferEvent::ParameterDeleted(ParameterDeletedData {
            parameter_name: parameter_name.into(),
        })
    }

    /// Creates a StepCreated event.
    pub fn step_created(
        step_name: impl Into<String>,
        provisioning_steps_secret_name: impl Into<String>,
    ) -> Self {
        OfferEvent::StepCreated(StepCreatedData {
            step_name: step_name.into(),
            provisioning_steps_secret_name: provisioning_steps_secret_name.into(),
        })
    }

    /// Creates a StepUpdated event.
    pub fn step_updated(
        step_name: impl Into<String>,
        provisioning_steps_secret_name: impl Into<String>,
    ) -> Self {
        OfferEvent::StepUpdated(StepUpdatedData {
            step_name: step_name.into(),
            provisioning_steps_secret_name: provisioning_steps_secret_name.into(),
        })
    }

    /// Creates a StepDeleted event.
    pub fn step_deleted(
        step_name: impl Into<String>,
        provisioning_steps_secret_name: impl Into<String>,
    ) -> Self {
        OfferEvent::StepDeleted(StepDeletedData {
            step_name: step_name.into(),
            provisioning_steps_secret_name: provisioning_steps_secret_name.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = OfferEvent::offer_created(
            OfferId::new("offer-1"),
            OfferProperties::default(),
            "stp-abc",
        );
        assert_eq!(event.event_type(), "OfferCreated");

        let event = OfferEvent::offer_published(None);
        assert_eq!(event.event_type(), "OfferPublished");

        let event = OfferEvent::step_created("deploy", "stp-def");
        assert_eq!(event.event_type(), "StepCreated");
    }

    #[test]
    fn test_known_type_registry_is_closed() {
        assert!(OfferEvent::is_known_type("OfferCreated"));
        assert!(OfferEvent::is_known_type("StepDeleted"));
        assert!(!OfferEvent::is_known_type("OfferArchived"));
        assert!(!OfferEvent::is_known_type(""));
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = OfferEvent::offer_created(
            OfferId::new("offer-1"),
            OfferProperties {
                display_name: "Test Offer".to_string(),
                ..Default::default()
            },
            "stp-abc",
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("OfferCreated"));

        let deserialized: OfferEvent = serde_json::from_str(&json).unwrap();
        if let OfferEvent::OfferCreated(data) = deserialized {
            assert_eq!(data.offer_id.as_str(), "offer-1");
            assert_eq!(data.properties.display_name, "Test Offer");
            assert_eq!(data.provisioning_steps_secret_name, "stp-abc");
        } else {
            panic!("Expected OfferCreated event");
        }
    }

    #[test]
    fn test_unknown_tag_fails_to_deserialize() {
        let json = serde_json::json!({"type": "OfferArchived", "data": {}});
        let result: std::result::Result<OfferEvent, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
