//! Catalog error types.
//!
//! Variants split into two families: data-integrity conditions that are
//! fatal server-side bugs (`MissingSnapshot`, `UnknownEventType`) and
//! user-facing conditions an API boundary can map to not-found/conflict
//! responses.

use event_store::EventStoreError;
use secret_store::SecretStoreError;
use thiserror::Error;

use crate::offer::OfferStatus;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Replay without a snapshot did not start with a create event.
    #[error("The snapshot of offer {offer_id} is missing")]
    MissingSnapshot { offer_id: String },

    /// An event type outside the closed registry was encountered.
    #[error("Unknown event type {event_type}")]
    UnknownEventType { event_type: String },

    /// Offer does not exist.
    #[error("Offer {offer_id} does not exist")]
    OfferNotFound { offer_id: String },

    /// Offer already exists.
    #[error("Offer {offer_id} already exists")]
    OfferAlreadyExists { offer_id: String },

    /// Offer is not in the expected status for the requested operation.
    #[error("Invalid status transition: cannot {action} from {status} status")]
    InvalidStatusTransition {
        status: OfferStatus,
        action: &'static str,
    },

    /// Plan does not exist in the offer.
    #[error("Plan {plan_id} does not exist in offer {offer_id}")]
    PlanNotFound { offer_id: String, plan_id: String },

    /// Plan already exists in the offer.
    #[error("Plan {plan_id} already exists in offer {offer_id}")]
    PlanAlreadyExists { offer_id: String, plan_id: String },

    /// Parameter does not exist in the offer.
    #[error("Parameter {name} does not exist")]
    ParameterNotFound { name: String },

    /// Parameter already exists in the offer.
    #[error("Parameter {name} already exists")]
    ParameterAlreadyExists { name: String },

    /// Provisioning step does not exist in the offer.
    #[error("Provisioning step {name} does not exist")]
    StepNotFound { name: String },

    /// Provisioning step already exists in the offer.
    #[error("Provisioning step {name} already exists")]
    StepAlreadyExists { name: String },

    /// Event log error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Secret store error.
    #[error("Secret store error: {0}")]
    SecretStore(#[from] SecretStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
