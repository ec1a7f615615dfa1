//! Catalog layer for the marketplace provisioning system.
//!
//! This crate provides the event-sourced offer aggregate:
//! - the closed offer event registry and its payload structs
//! - the state reconstructor that folds a snapshot plus an ordered event
//!   slice into the current offer
//! - the publishing service that appends events, keeps the provisioning
//!   step list in the secret store and writes snapshots
//! - the subscription side: subscription parameters and the
//!   subscription-created event that queues provisioning

pub mod error;
pub mod offer;
pub mod subscription;

pub use error::{CatalogError, Result};
pub use offer::{
    ArmTemplateStepConfig, InputArgument, Offer, OfferEvent, OfferId, OfferParameter,
    OfferProperties, OfferPropertiesPatch, OfferService, OfferStatus, ParameterValueType, Plan,
    PlanId, PlanMode, ProvisioningStep, ScriptStepConfig, StepConfig, WebhookAuthType,
    WebhookStepConfig, materialize_steps, reconstruct,
};
pub use subscription::{
    CreateSubscription, SUBSCRIPTION_CREATED_EVENT, SubscriptionCreatedData, SubscriptionParameter,
    SubscriptionService, find_parameter, has_parameter, upsert_parameter,
};
