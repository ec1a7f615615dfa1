//! Step executor contracts and the per-kind client factory.

mod arm;
mod script;
mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use catalog::{ProvisioningStep, StepConfig, SubscriptionParameter, find_parameter};

use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::shell::RemoteShellFactory;

pub use arm::{ARM_DEPLOYMENT_NAME_PARAM, ArmTemplateStepClient};
pub use script::{SCRIPT_WORKING_DIR_PARAM, ScriptStepClient};
pub use webhook::WebhookStepClient;

/// Outcome of polling an asynchronous step's remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepExecutionResult {
    /// The remote operation is still in flight.
    Running,

    /// The remote operation finished successfully.
    Completed,

    /// The remote operation failed.
    Failed,
}

/// A step that runs to completion within one call.
#[async_trait]
pub trait SyncStepClient: Send + Sync {
    /// Executes the step and returns the updated parameter list.
    async fn run(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>>;
}

/// A step driven through start/poll/finish across invocations.
#[async_trait]
pub trait AsyncStepClient: Send + Sync {
    /// Kicks off the remote operation.
    async fn start(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>>;

    /// Polls the remote operation.
    async fn check_execution_status(
        &self,
        parameters: &[SubscriptionParameter],
    ) -> Result<StepExecutionResult>;

    /// Collects outputs and cleans up after the remote operation.
    async fn finish(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>>;
}

/// A step client in either capability shape.
pub enum StepClient {
    Sync(Box<dyn SyncStepClient>),
    Async(Box<dyn AsyncStepClient>),
}

/// Builds step clients for step definitions.
///
/// Owns the shared HTTP client and the remote-shell factory; constructed
/// once in the orchestrator's scope rather than cached globally.
pub struct StepClientFactory {
    http: reqwest::Client,
    shells: Arc<dyn RemoteShellFactory>,
    management_base_url: String,
}

impl StepClientFactory {
    /// Creates a new factory from the service configuration.
    pub fn new(config: &ProvisionConfig, shells: Arc<dyn RemoteShellFactory>) -> Self {
        Self {
            http: reqwest::Client::new(),
            shells,
            management_base_url: config.arm_management_base_url.clone(),
        }
    }

    /// Returns the client matching the step's kind and `is_synchronized`
    /// flag.
    pub fn client_for(&self, step: &ProvisioningStep) -> Result<StepClient> {
        match (&step.config, step.is_synchronized) {
            (StepConfig::Webhook(config), true) => {
                Ok(StepClient::Sync(Box::new(WebhookStepClient::new(
                    config.clone(),
                    step.input_parameter_names.clone(),
                    step.output_parameter_names.clone(),
                    step.timeout_in_seconds,
                    self.http.clone(),
                ))))
            }
            (StepConfig::Webhook(config), false) => {
                Ok(StepClient::Async(Box::new(WebhookStepClient::new(
                    config.clone(),
                    step.input_parameter_names.clone(),
                    step.output_parameter_names.clone(),
                    step.timeout_in_seconds,
                    self.http.clone(),
                ))))
            }
            (StepConfig::ArmTemplate(_), true) => Err(ProvisionError::InvalidStepConfig {
                name: step.name.clone(),
                message: "template deployments cannot run synchronously".to_string(),
            }),
            (StepConfig::ArmTemplate(config), false) => {
                Ok(StepClient::Async(Box::new(ArmTemplateStepClient::new(
                    config.clone(),
                    step.input_parameter_names.clone(),
                    step.output_parameter_names.clone(),
                    self.http.clone(),
                    self.management_base_url.clone(),
                ))))
            }
            (StepConfig::Script(config), true) => Ok(StepClient::Sync(Box::new(
                ScriptStepClient::new(config.clone(), self.shells.clone()),
            ))),
            (StepConfig::Script(config), false) => Ok(StepClient::Async(Box::new(
                ScriptStepClient::new(config.clone(), self.shells.clone()),
            ))),
        }
    }
}

/// Looks up a required parameter, failing with `MissingParameter` when it
/// is absent.
pub(crate) fn required_parameter<'a>(
    parameters: &'a [SubscriptionParameter],
    name: &str,
) -> Result<&'a str> {
    find_parameter(parameters, name).ok_or_else(|| ProvisionError::MissingParameter {
        name: name.to_string(),
    })
}

/// Looks up an optional parameter, defaulting to the empty string.
pub(crate) fn optional_parameter<'a>(
    parameters: &'a [SubscriptionParameter],
    name: &str,
) -> &'a str {
    find_parameter(parameters, name).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::InMemoryRemoteShellFactory;
    use catalog::{ArmTemplateStepConfig, ScriptStepConfig, WebhookAuthType, WebhookStepConfig};

    fn factory() -> StepClientFactory {
        StepClientFactory::new(
            &ProvisionConfig::default(),
            Arc::new(InMemoryRemoteShellFactory::new()),
        )
    }

    fn step(name: &str, is_synchronized: bool, config: StepConfig) -> ProvisioningStep {
        ProvisioningStep {
            name: name.to_string(),
            is_synchronized,
            timeout_in_seconds: 60,
            input_parameter_names: vec![],
            output_parameter_names: vec![],
            config,
        }
    }

    fn webhook_config() -> StepConfig {
        StepConfig::Webhook(WebhookStepConfig {
            url: "https://example.com/hook".to_string(),
            auth_type: WebhookAuthType::None,
            auth_key: None,
            auth_value: None,
        })
    }

    fn arm_config() -> StepConfig {
        StepConfig::ArmTemplate(ArmTemplateStepConfig {
            template_url: "https://templates.example.com/main.json".to_string(),
            is_run_in_complete_mode: false,
            azure_subscription_id_parameter_name: "sub".to_string(),
            resource_group_parameter_name: "rg".to_string(),
            access_token_parameter_name: "token".to_string(),
            location_parameter_name: "location".to_string(),
        })
    }

    fn script_config() -> StepConfig {
        StepConfig::Script(ScriptStepConfig {
            script_package_url: "https://packages.example.com/setup.zip".to_string(),
            entry_script_file_name: "setup.sh".to_string(),
            input_arguments: vec![],
        })
    }

    #[test]
    fn dispatch_follows_is_synchronized() {
        let factory = factory();

        assert!(matches!(
            factory.client_for(&step("w", true, webhook_config())).unwrap(),
            StepClient::Sync(_)
        ));
        assert!(matches!(
            factory.client_for(&step("w", false, webhook_config())).unwrap(),
            StepClient::Async(_)
        ));
        assert!(matches!(
            factory.client_for(&step("s", true, script_config())).unwrap(),
            StepClient::Sync(_)
        ));
        assert!(matches!(
            factory.client_for(&step("a", false, arm_config())).unwrap(),
            StepClient::Async(_)
        ));
    }

    #[test]
    fn synchronous_deployment_is_rejected() {
        let factory = factory();
        let result = factory.client_for(&step("a", true, arm_config()));
        assert!(matches!(
            result,
            Err(ProvisionError::InvalidStepConfig { .. })
        ));
    }

    #[test]
    fn required_parameter_lookup() {
        let params = vec![SubscriptionParameter::user("region", "westus")];
        assert_eq!(required_parameter(&params, "region").unwrap(), "westus");
        assert!(matches!(
            required_parameter(&params, "missing"),
            Err(ProvisionError::MissingParameter { .. })
        ));
        assert_eq!(optional_parameter(&params, "missing"), "");
    }
}
