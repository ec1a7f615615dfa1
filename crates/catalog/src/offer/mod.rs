//! Offer aggregate and related types.

mod aggregate;
mod events;
mod reconstructor;
mod service;
mod status;
mod steps;
mod types;

pub use aggregate::Offer;
pub use events::{
    OFFER_CREATED_EVENT, OFFER_PUBLISHED_EVENT, OfferCreatedData, OfferDeletedData, OfferEvent,
    OfferPublishedData, OfferUpdatedData, ParameterCreatedData, ParameterDeletedData,
    ParameterUpdatedData, PlanCreatedData, PlanDeletedData, PlanUpdatedData, StepCreatedData,
    StepDeletedData, StepUpdatedData,
};
pub use reconstructor::{materialize_steps, reconstruct};
pub use service::OfferService;
pub use status::OfferStatus;
pub use steps::{
    ArmTemplateStepConfig, InputArgument, ProvisioningStep, ScriptStepConfig, StepConfig,
    WebhookAuthType, WebhookStepConfig,
};
pub use types::{
    OfferId, OfferParameter, OfferProperties, OfferPropertiesPatch, ParameterValueType, Plan,
    PlanId, PlanMode,
};
