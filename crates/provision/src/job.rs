//! Provisioning job model and its two state machines.

use catalog::{OfferId, PlanId, PlanMode};
use chrono::{DateTime, Utc};
use common::SubscriptionId;
use event_store::SequenceId;
use serde::{Deserialize, Serialize};

/// Step index value denoting the implicit bootstrap step.
pub const BOOTSTRAP_STEP_INDEX: i32 = -1;

/// The state of a provisioning job.
///
/// State transitions:
/// ```text
/// Queued ──► Running ──┬──► Completed
///    │                 └──► Aborted
///    └──► Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProvisionStatus {
    /// Job was created and waits for activation.
    #[default]
    Queued,

    /// Steps are being executed.
    Running,

    /// All steps finished and the subscription was activated
    /// (terminal state).
    Completed,

    /// The job was abandoned (terminal state).
    Aborted,
}

impl ProvisionStatus {
    /// Returns true if the job can be activated.
    pub fn can_activate(&self) -> bool {
        matches!(self, ProvisionStatus::Queued)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisionStatus::Completed | ProvisionStatus::Aborted)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStatus::Queued => "Queued",
            ProvisionStatus::Running => "Running",
            ProvisionStatus::Completed => "Completed",
            ProvisionStatus::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for ProvisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProvisionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(ProvisionStatus::Queued),
            "Running" => Ok(ProvisionStatus::Running),
            "Completed" => Ok(ProvisionStatus::Completed),
            "Aborted" => Ok(ProvisionStatus::Aborted),
            other => Err(format!("unknown provision status: {}", other)),
        }
    }
}

/// The state of the job's current step, meaningful while the job is
/// Running.
///
/// Asynchronous steps walk the full chain; synchronous steps jump from
/// NotStarted to the JobCompleted handling in a single transition:
/// ```text
/// NotStarted ──► Running ──► ExecutionCompleted ──► JobCompleted
///                   │
///                   └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StepStatus {
    /// The step has not been started.
    #[default]
    NotStarted,

    /// The remote operation is in flight.
    Running,

    /// The remote operation finished; outputs not yet collected.
    ExecutionCompleted,

    /// The step is fully done, outputs persisted.
    JobCompleted,

    /// The remote operation reported failure.
    Failed,
}

impl StepStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "NotStarted",
            StepStatus::Running => "Running",
            StepStatus::ExecutionCompleted => "ExecutionCompleted",
            StepStatus::JobCompleted => "JobCompleted",
            StepStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NotStarted" => Ok(StepStatus::NotStarted),
            "Running" => Ok(StepStatus::Running),
            "ExecutionCompleted" => Ok(StepStatus::ExecutionCompleted),
            "JobCompleted" => Ok(StepStatus::JobCompleted),
            "Failed" => Ok(StepStatus::Failed),
            other => Err(format!("unknown step status: {}", other)),
        }
    }
}

/// The single mutable row tracking a subscription's provisioning
/// workflow.
///
/// Created by the event listener when a subscription-created event is
/// observed; mutated only by the orchestrator. `row_version` backs the
/// compare-and-swap update that keeps concurrent workers from clobbering
/// each other's transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningJob {
    /// The subscription being provisioned.
    pub subscription_id: SubscriptionId,

    /// The subscribed offer.
    pub offer_id: OfferId,

    /// The subscribed plan.
    pub plan_id: PlanId,

    /// Publish event pinning the plan revision that governs this job.
    pub plan_created_by_event_id: SequenceId,

    /// Hosting mode of the plan.
    pub mode: PlanMode,

    /// Downstream application registered during PaaS bootstrap.
    pub application_name: Option<String>,

    /// Subscription lifecycle event that queued this job.
    pub event_type: String,

    /// Job state.
    pub status: ProvisionStatus,

    /// True while the orchestrator owns the job.
    pub is_active: bool,

    /// Index into the plan's step list; -1 is the implicit bootstrap
    /// step.
    pub provisioning_step_index: i32,

    /// State of the current step.
    pub provisioning_step_status: StepStatus,

    /// Secret holding the cumulative workflow parameters.
    pub parameters_secret_name: String,

    /// Secret holding the plan's step configuration list.
    pub provisioning_steps_secret_name: String,

    /// Last error observed by the orchestrator, for diagnosis.
    pub last_error_message: Option<String>,

    /// Number of failed transitions retried so far.
    pub retry_count: i64,

    /// The subscription event that created this job.
    pub created_by_event_id: SequenceId,

    /// Optimistic concurrency version, bumped on every update.
    pub row_version: i64,

    /// When the job was created.
    pub created_time: DateTime<Utc>,

    /// When the job was last updated.
    pub last_updated_time: DateTime<Utc>,

    /// When the job reached Completed.
    pub completed_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_queued() {
        assert_eq!(ProvisionStatus::default(), ProvisionStatus::Queued);
        assert_eq!(StepStatus::default(), StepStatus::NotStarted);
    }

    #[test]
    fn test_only_queued_can_activate() {
        assert!(ProvisionStatus::Queued.can_activate());
        assert!(!ProvisionStatus::Running.can_activate());
        assert!(!ProvisionStatus::Completed.can_activate());
        assert!(!ProvisionStatus::Aborted.can_activate());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ProvisionStatus::Queued.is_terminal());
        assert!(!ProvisionStatus::Running.is_terminal());
        assert!(ProvisionStatus::Completed.is_terminal());
        assert!(ProvisionStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ProvisionStatus::Queued,
            ProvisionStatus::Running,
            ProvisionStatus::Completed,
            ProvisionStatus::Aborted,
        ] {
            let parsed: ProvisionStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("Paused".parse::<ProvisionStatus>().is_err());
    }

    #[test]
    fn test_step_status_roundtrip() {
        for status in [
            StepStatus::NotStarted,
            StepStatus::Running,
            StepStatus::ExecutionCompleted,
            StepStatus::JobCompleted,
            StepStatus::Failed,
        ] {
            let parsed: StepStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("Done".parse::<StepStatus>().is_err());
    }
}
