//! Provisioning error types.
//!
//! Fatal data-integrity conditions (`MissingParameter`, `InvalidStepIndex`,
//! `StepNotFound`, `PlanNotFound`) indicate programmer or data bugs; the
//! orchestrator logs them and leaves the job for the next retry. The
//! remaining variants wrap collaborator failures.

use catalog::CatalogError;
use common::SubscriptionId;
use event_store::EventStoreError;
use secret_store::SecretStoreError;
use thiserror::Error;

/// Errors that can occur during provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A required workflow parameter is absent from the cumulative list.
    #[error("Missing required parameter {name}")]
    MissingParameter { name: String },

    /// The job's step index points past the plan's step list.
    #[error("Provisioning step index {index} is invalid for {step_count} steps")]
    InvalidStepIndex { index: i32, step_count: usize },

    /// The plan names a step absent from the persisted step list.
    #[error("Provisioning step {name} does not exist")]
    StepNotFound { name: String },

    /// No plan row matches the job's pinned plan revision.
    #[error(
        "Can not find plan {plan_id} in offer {offer_id} created by event {created_by_event_id} for subscription {subscription_id}"
    )]
    PlanNotFound {
        offer_id: String,
        plan_id: String,
        created_by_event_id: i64,
        subscription_id: SubscriptionId,
    },

    /// No job row exists for the subscription.
    #[error("Provisioning job for subscription {0} does not exist")]
    JobNotFound(SubscriptionId),

    /// Another worker updated the job row first.
    #[error("Provisioning job for subscription {0} was updated concurrently")]
    JobConflict(SubscriptionId),

    /// A step definition cannot be executed as configured.
    #[error("Provisioning step {name} is misconfigured: {message}")]
    InvalidStepConfig { name: String, message: String },

    /// Required configuration is absent.
    #[error("Missing configuration: {0}")]
    Configuration(String),

    /// A webhook endpoint returned a non-success response.
    #[error("Webhook call failed with status {status}: {body}")]
    WebhookFailed { status: u16, body: String },

    /// A template deployment request was rejected.
    #[error("Deployment request failed with status {status}: {body}")]
    DeploymentFailed { status: u16, body: String },

    /// Subscription activation was rejected downstream.
    #[error("Subscription activation failed with status {status}: {body}")]
    ActivationFailed { status: u16, body: String },

    /// The remote shell session failed.
    #[error("Remote shell error: {0}")]
    Shell(String),

    /// Key pair generation failed.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog error.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Event log error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Secret store error.
    #[error("Secret store error: {0}")]
    SecretStore(#[from] SecretStoreError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;
