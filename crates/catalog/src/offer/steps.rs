//! Provisioning step definitions.
//!
//! A step is one unit of infrastructure setup work in a plan's ordered
//! workflow. The per-kind configuration is a single tagged variant type;
//! there is no subclass hierarchy and no runtime type tag in the
//! serialized form beyond the `kind` field.

use serde::{Deserialize, Serialize};

/// Authentication scheme for webhook steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookAuthType {
    /// Send the auth value in a named request header.
    ApiKey,

    /// Send the auth value as a bearer token.
    BearerToken,

    /// Append the auth value as a query parameter.
    QueryParameter,

    /// No authentication.
    None,
}

/// Configuration of a webhook step: one authenticated HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookStepConfig {
    /// Endpoint receiving the POST.
    pub url: String,

    /// Authentication scheme.
    pub auth_type: WebhookAuthType,

    /// Header or query parameter name, depending on `auth_type`.
    pub auth_key: Option<String>,

    /// Secret auth value.
    pub auth_value: Option<String>,
}

/// Configuration of an infrastructure template deployment step.
///
/// The parameter names for subscription, resource group, access token and
/// region are declared per step rather than hard-coded, so templates can
/// bind whichever workflow parameters they need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmTemplateStepConfig {
    /// URL of the deployment template.
    pub template_url: String,

    /// Deploy in complete mode instead of incremental.
    pub is_run_in_complete_mode: bool,

    /// Name of the parameter holding the target cloud subscription id.
    pub azure_subscription_id_parameter_name: String,

    /// Name of the parameter holding the target resource group.
    pub resource_group_parameter_name: String,

    /// Name of the parameter holding the deployment access token.
    pub access_token_parameter_name: String,

    /// Name of the parameter holding the target region.
    pub location_parameter_name: String,
}

/// Mapping from a workflow parameter to a CLI flag of the entry script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputArgument {
    /// Name of the workflow parameter supplying the value.
    pub parameter_name: String,

    /// CLI option the value is passed as (without the leading dash).
    pub option: String,
}

/// Configuration of a remote script step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStepConfig {
    /// URL of the script package archive.
    pub script_package_url: String,

    /// Entry script file inside the package.
    pub entry_script_file_name: String,

    /// Parameter → CLI flag bindings for the entry script.
    pub input_arguments: Vec<InputArgument>,
}

/// Per-kind step configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StepConfig {
    /// Authenticated HTTP call.
    Webhook(WebhookStepConfig),

    /// Infrastructure template deployment.
    ArmTemplate(ArmTemplateStepConfig),

    /// Script executed on a remote host.
    Script(ScriptStepConfig),
}

impl StepConfig {
    /// Returns the step kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            StepConfig::Webhook(_) => "Webhook",
            StepConfig::ArmTemplate(_) => "ArmTemplate",
            StepConfig::Script(_) => "Script",
        }
    }
}

/// One unit of provisioning work in a plan's ordered workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningStep {
    /// Unique step name within a plan.
    pub name: String,

    /// Whether the step completes within a single call (`run`) or is
    /// driven through start/poll/finish across invocations.
    pub is_synchronized: bool,

    /// Bound on the remote operation's own execution time.
    pub timeout_in_seconds: u32,

    /// Workflow parameters the step reads.
    pub input_parameter_names: Vec<String>,

    /// Workflow parameters the step produces.
    pub output_parameter_names: Vec<String>,

    /// Per-kind configuration.
    pub config: StepConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook_step() -> ProvisioningStep {
        ProvisioningStep {
            name: "notify-crm".to_string(),
            is_synchronized: true,
            timeout_in_seconds: 60,
            input_parameter_names: vec!["SubscriptionId".to_string()],
            output_parameter_names: vec!["CrmTicketId".to_string()],
            config: StepConfig::Webhook(WebhookStepConfig {
                url: "https://crm.example.com/hooks/subscribe".to_string(),
                auth_type: WebhookAuthType::ApiKey,
                auth_key: Some("x-api-key".to_string()),
                auth_value: Some("secret".to_string()),
            }),
        }
    }

    #[test]
    fn step_config_kind() {
        assert_eq!(webhook_step().config.kind(), "Webhook");
    }

    #[test]
    fn step_serialization_roundtrip() {
        let step = webhook_step();
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"kind\":\"Webhook\""));

        let deserialized: ProvisioningStep = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, step);
    }

    #[test]
    fn script_config_roundtrip() {
        let step = ProvisioningStep {
            name: "install-agent".to_string(),
            is_synchronized: false,
            timeout_in_seconds: 1800,
            input_parameter_names: vec![],
            output_parameter_names: vec![],
            config: StepConfig::Script(ScriptStepConfig {
                script_package_url: "https://packages.example.com/agent.zip".to_string(),
                entry_script_file_name: "install.sh".to_string(),
                input_arguments: vec![InputArgument {
                    parameter_name: "SubscriptionId".to_string(),
                    option: "subscription".to_string(),
                }],
            }),
        };

        let json = serde_json::to_value(&step).unwrap();
        let deserialized: ProvisioningStep = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, step);
    }
}
