//! Provisioning orchestrator.
//!
//! Drives one job through one state transition per invocation. An
//! external scheduler re-invokes `process_active_step` until the job
//! leaves `is_active`; a failed invocation records the error and leaves
//! the job for the next trigger, so retries are at-least-once by
//! re-delivery rather than internal backoff.

use catalog::{
    ArmTemplateStepConfig, ProvisioningStep, StepConfig, SubscriptionParameter, WebhookAuthType,
    WebhookStepConfig, has_parameter, upsert_parameter,
};
use chrono::Utc;
use common::SubscriptionId;
use secret_store::SecretStore;

use crate::activate::SubscriptionActivator;
use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::job::{ProvisionStatus, ProvisioningJob, StepStatus};
use crate::job_store::JobStore;
use crate::jumpbox;
use crate::keys::generate_ssh_key_pair;
use crate::listener::{
    APPLICATION_NAME_PARAM, OWNER_ID_PARAM, SUBSCRIPTION_ID_PARAM, SUBSCRIPTION_NAME_PARAM,
};
use crate::plan_store::PlanStore;
use crate::steps::{StepClient, StepClientFactory, StepExecutionResult};

/// Name of the synthesized PaaS registration step.
const REGISTER_APPLICATION_STEP_NAME: &str = "RegisterApplicationSubscription";

/// Name of the synthesized IaaS jump-host step.
const JUMPBOX_STEP_NAME: &str = "JumpboxProvisioning";

enum BootstrapAction {
    Step(ProvisioningStep),
    Skip,
}

/// The provisioning state machine.
pub struct ProvisioningOrchestrator<J, P, S, A>
where
    J: JobStore,
    P: PlanStore,
    S: SecretStore,
    A: SubscriptionActivator,
{
    jobs: J,
    plans: P,
    secrets: S,
    activator: A,
    step_clients: StepClientFactory,
    config: ProvisionConfig,
}

impl<J, P, S, A> ProvisioningOrchestrator<J, P, S, A>
where
    J: JobStore,
    P: PlanStore,
    S: SecretStore,
    A: SubscriptionActivator,
{
    /// Creates a new orchestrator.
    pub fn new(
        jobs: J,
        plans: P,
        secrets: S,
        activator: A,
        step_clients: StepClientFactory,
        config: ProvisionConfig,
    ) -> Self {
        Self {
            jobs,
            plans,
            secrets,
            activator,
            step_clients,
            config,
        }
    }

    /// Activates a queued job.
    ///
    /// When the pinned plan revision cannot be resolved the job is
    /// aborted and never becomes Running; otherwise it moves to Running
    /// and becomes active. Returns the subscription id on activation.
    #[tracing::instrument(skip(self, job), fields(subscription_id = %job.subscription_id))]
    pub async fn activate_queued_job(
        &self,
        job: &ProvisioningJob,
    ) -> Result<Option<SubscriptionId>> {
        let mut job = job.clone();

        let plan = self
            .plans
            .find(&job.offer_id, &job.plan_id, job.plan_created_by_event_id)
            .await?;

        if plan.is_none() {
            let error = format!(
                "Can not find plan {} in offer {} created by event {} for subscription {}",
                job.plan_id,
                job.offer_id,
                job.plan_created_by_event_id,
                job.subscription_id
            );
            tracing::error!(%error);
            metrics::counter!("provision_jobs_aborted_total").increment(1);
            job.status = ProvisionStatus::Aborted;
            job.last_error_message = Some(error);
            job.last_updated_time = Utc::now();
            self.jobs.update(&job).await?;
            return Ok(None);
        }

        job.status = ProvisionStatus::Running;
        job.is_active = true;
        job.last_updated_time = Utc::now();
        self.jobs.update(&job).await?;

        metrics::counter!("provision_jobs_activated_total").increment(1);
        tracing::info!(subscription_id = %job.subscription_id, "provisioning job activated");
        Ok(Some(job.subscription_id))
    }

    /// Performs one state transition of an active job.
    ///
    /// Any error is caught here: it is logged, recorded on the row and
    /// the job is otherwise left in its pre-transition state so the next
    /// trigger retries the same transition. Returns the stored job.
    #[tracing::instrument(skip(self, job), fields(
        subscription_id = %job.subscription_id,
        step_index = job.provisioning_step_index,
        step_status = %job.provisioning_step_status,
    ))]
    pub async fn process_active_step(&self, job: &ProvisioningJob) -> Result<ProvisioningJob> {
        let mut working = job.clone();

        match self.try_process(&mut working).await {
            Ok(()) => {
                working.last_updated_time = Utc::now();
                self.jobs.update(&working).await
            }
            Err(e) => {
                tracing::error!(error = %e, "provisioning step transition failed");
                metrics::counter!("provision_step_failures_total").increment(1);

                let mut failed = job.clone();
                failed.last_error_message = Some(e.to_string());
                failed.retry_count += 1;
                failed.last_updated_time = Utc::now();
                self.jobs.update(&failed).await
            }
        }
    }

    async fn try_process(&self, job: &mut ProvisioningJob) -> Result<()> {
        let mut parameters = self.load_parameters(job).await?;
        let step_configs = self.load_step_configs(job).await?;
        let step_names = self.load_step_names(job).await?;

        let step = if job.provisioning_step_index < 0 {
            match self.bootstrap_step(job, &mut parameters)? {
                BootstrapAction::Step(step) => step,
                BootstrapAction::Skip => {
                    // No bootstrap work needed; move on to the plan's
                    // own steps.
                    job.provisioning_step_index = 0;
                    job.provisioning_step_status = StepStatus::NotStarted;
                    return Ok(());
                }
            }
        } else if job.provisioning_step_index as usize >= step_names.len() {
            return Err(ProvisionError::InvalidStepIndex {
                index: job.provisioning_step_index,
                step_count: step_names.len(),
            });
        } else {
            let name = &step_names[job.provisioning_step_index as usize];
            step_configs
                .iter()
                .find(|s| &s.name == name)
                .cloned()
                .ok_or_else(|| ProvisionError::StepNotFound { name: name.clone() })?
        };

        match self.step_clients.client_for(&step)? {
            StepClient::Sync(client) => {
                let new_parameters = client.run(parameters).await?;
                self.save_parameters(job, &new_parameters).await?;
                metrics::counter!("provision_steps_executed_total").increment(1);
                self.complete_current_step(job, &step_names).await?;
            }
            StepClient::Async(client) => match job.provisioning_step_status {
                StepStatus::NotStarted => {
                    let new_parameters = client.start(parameters).await?;
                    self.save_parameters(job, &new_parameters).await?;
                    job.provisioning_step_status = StepStatus::Running;
                }
                StepStatus::Running => {
                    match client.check_execution_status(&parameters).await? {
                        StepExecutionResult::Completed => {
                            job.provisioning_step_status = StepStatus::ExecutionCompleted;
                        }
                        StepExecutionResult::Running => {}
                        StepExecutionResult::Failed => {
                            // A failed remote operation has no retry
                            // path; abort the job rather than stall it.
                            job.provisioning_step_status = StepStatus::Failed;
                            job.status = ProvisionStatus::Aborted;
                            job.is_active = false;
                            job.last_error_message =
                                Some(format!("Provisioning step {} failed", step.name));
                            metrics::counter!("provision_jobs_aborted_total").increment(1);
                            tracing::error!(step_name = %step.name, "provisioning step failed, job aborted");
                        }
                    }
                }
                StepStatus::ExecutionCompleted => {
                    let new_parameters = client.finish(parameters).await?;
                    self.save_parameters(job, &new_parameters).await?;
                    metrics::counter!("provision_steps_executed_total").increment(1);
                    job.provisioning_step_status = StepStatus::JobCompleted;
                }
                StepStatus::JobCompleted => {
                    self.complete_current_step(job, &step_names).await?;
                }
                StepStatus::Failed => {}
            },
        }

        Ok(())
    }

    // Advances past the finished step, or completes the whole job after
    // the last one.
    async fn complete_current_step(
        &self,
        job: &mut ProvisioningJob,
        step_names: &[String],
    ) -> Result<()> {
        if job.provisioning_step_index + 1 < step_names.len() as i32 {
            job.provisioning_step_index += 1;
            job.provisioning_step_status = StepStatus::NotStarted;
            return Ok(());
        }

        self.activator.activate(job.subscription_id).await?;
        job.status = ProvisionStatus::Completed;
        job.is_active = false;
        job.completed_time = Some(Utc::now());

        metrics::counter!("provision_jobs_completed_total").increment(1);
        tracing::info!(subscription_id = %job.subscription_id, "provisioning job completed");
        Ok(())
    }

    // Resolves the implicit bootstrap step at index -1.
    fn bootstrap_step(
        &self,
        job: &ProvisioningJob,
        parameters: &mut Vec<SubscriptionParameter>,
    ) -> Result<BootstrapAction> {
        if job.mode == catalog::PlanMode::PaaS && job.application_name.is_some() {
            return Ok(BootstrapAction::Step(self.registration_step()?));
        }

        if job.mode == catalog::PlanMode::IaaS && !jumpbox::has_connection_info(parameters) {
            if !has_parameter(parameters, jumpbox::JUMPBOX_SSH_PUBLIC_KEY_PARAM) {
                let pair = generate_ssh_key_pair()?;
                upsert_parameter(
                    parameters,
                    SubscriptionParameter::system(
                        jumpbox::JUMPBOX_SSH_PUBLIC_KEY_PARAM,
                        pair.public_key,
                    ),
                );
                upsert_parameter(
                    parameters,
                    SubscriptionParameter::system(
                        jumpbox::JUMPBOX_SSH_PRIVATE_KEY_PARAM,
                        pair.private_key,
                    ),
                );
            }
            return Ok(BootstrapAction::Step(self.jumpbox_step()?));
        }

        Ok(BootstrapAction::Skip)
    }

    // Synthesizes the webhook registering the subscription with the
    // downstream application.
    fn registration_step(&self) -> Result<ProvisioningStep> {
        let base_url = self.config.gallery_base_url.as_deref().ok_or_else(|| {
            ProvisionError::Configuration(
                "gallery service base URL is required for PaaS provisioning".to_string(),
            )
        })?;

        Ok(ProvisioningStep {
            name: REGISTER_APPLICATION_STEP_NAME.to_string(),
            is_synchronized: true,
            timeout_in_seconds: 300,
            input_parameter_names: vec![
                SUBSCRIPTION_ID_PARAM.to_string(),
                SUBSCRIPTION_NAME_PARAM.to_string(),
                OWNER_ID_PARAM.to_string(),
                APPLICATION_NAME_PARAM.to_string(),
            ],
            output_parameter_names: vec![
                "BaseUrl".to_string(),
                "PrimaryKey".to_string(),
                "SecondaryKey".to_string(),
            ],
            config: StepConfig::Webhook(WebhookStepConfig {
                url: format!("{}/subscriptions/create", base_url.trim_end_matches('/')),
                auth_type: WebhookAuthType::ApiKey,
                auth_key: Some("x-api-key".to_string()),
                auth_value: self.config.gallery_api_key.clone(),
            }),
        })
    }

    // Synthesizes the template deployment creating the jump host.
    fn jumpbox_step(&self) -> Result<ProvisioningStep> {
        let template_url = self.config.jumpbox_template_url.as_deref().ok_or_else(|| {
            ProvisionError::Configuration(
                "jump-host template URL is required for IaaS provisioning".to_string(),
            )
        })?;

        Ok(ProvisioningStep {
            name: JUMPBOX_STEP_NAME.to_string(),
            is_synchronized: false,
            timeout_in_seconds: 1800,
            input_parameter_names: vec![
                jumpbox::JUMPBOX_LOCATION_PARAM.to_string(),
                jumpbox::JUMPBOX_VM_NAME_PARAM.to_string(),
                jumpbox::JUMPBOX_SSH_PUBLIC_KEY_PARAM.to_string(),
            ],
            output_parameter_names: vec![],
            config: StepConfig::ArmTemplate(ArmTemplateStepConfig {
                template_url: template_url.to_string(),
                is_run_in_complete_mode: false,
                azure_subscription_id_parameter_name: jumpbox::JUMPBOX_SUBSCRIPTION_ID_PARAM
                    .to_string(),
                resource_group_parameter_name: jumpbox::JUMPBOX_RESOURCE_GROUP_PARAM.to_string(),
                access_token_parameter_name: jumpbox::JUMPBOX_ACCESS_TOKEN_PARAM.to_string(),
                location_parameter_name: jumpbox::JUMPBOX_LOCATION_PARAM.to_string(),
            }),
        })
    }

    async fn load_parameters(&self, job: &ProvisioningJob) -> Result<Vec<SubscriptionParameter>> {
        let content = self.secrets.get(&job.parameters_secret_name).await?;
        Ok(serde_json::from_str(&content)?)
    }

    // Parameters are persisted before the job row; start/finish
    // implementations must be idempotent across a crash between the two
    // writes.
    async fn save_parameters(
        &self,
        job: &ProvisioningJob,
        parameters: &[SubscriptionParameter],
    ) -> Result<()> {
        self.secrets
            .set(
                &job.parameters_secret_name,
                &serde_json::to_string(parameters)?,
            )
            .await?;
        Ok(())
    }

    async fn load_step_configs(&self, job: &ProvisioningJob) -> Result<Vec<ProvisioningStep>> {
        let content = self
            .secrets
            .get(&job.provisioning_steps_secret_name)
            .await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn load_step_names(&self, job: &ProvisioningJob) -> Result<Vec<String>> {
        let plan = self
            .plans
            .find(&job.offer_id, &job.plan_id, job.plan_created_by_event_id)
            .await?
            .ok_or_else(|| ProvisionError::PlanNotFound {
                offer_id: job.offer_id.to_string(),
                plan_id: job.plan_id.to_string(),
                created_by_event_id: job.plan_created_by_event_id.as_i64(),
                subscription_id: job.subscription_id,
            })?;

        if job.event_type == catalog::SUBSCRIPTION_CREATED_EVENT {
            Ok(plan.on_subscribe)
        } else {
            Err(ProvisionError::Configuration(format!(
                "no step list defined for event type {}",
                job.event_type
            )))
        }
    }
}
