//! Provisioning service for the marketplace provisioning system.
//!
//! When a subscription is created, the event listener queues a
//! provisioning job pinned to the published plan revision. An external
//! scheduler then drives the job through the orchestrator: one invocation
//! is one state transition, so any number of stateless workers can share
//! the load. Steps run through pluggable sync/async executors (webhook,
//! template deployment, remote script).

pub mod activate;
pub mod config;
pub mod error;
pub mod job;
pub mod job_store;
pub mod jumpbox;
pub mod keys;
pub mod listener;
pub mod orchestrator;
pub mod plan_store;
pub mod shell;
pub mod steps;

pub use activate::{HttpSubscriptionActivator, InMemoryActivator, SubscriptionActivator};
pub use config::ProvisionConfig;
pub use error::{ProvisionError, Result};
pub use job::{ProvisionStatus, ProvisioningJob, StepStatus};
pub use job_store::{InMemoryJobStore, JobStore, PostgresJobStore};
pub use keys::{SshKeyPair, generate_ssh_key_pair};
pub use listener::ProvisionEventListener;
pub use orchestrator::ProvisioningOrchestrator;
pub use plan_store::{InMemoryPlanStore, PlanRecord, PlanStore, PostgresPlanStore};
pub use shell::{InMemoryRemoteShell, InMemoryRemoteShellFactory, RemoteShell, RemoteShellFactory};
pub use steps::{
    AsyncStepClient, StepClient, StepClientFactory, StepExecutionResult, SyncStepClient,
};
