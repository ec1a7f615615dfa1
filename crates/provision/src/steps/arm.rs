//! Template deployment step client.
//!
//! Drives an infrastructure template deployment through the management
//! API: `start` submits the deployment, `check_execution_status` polls
//! its provisioning state and `finish` folds the deployment outputs into
//! the workflow parameters.

use std::collections::HashMap;

use async_trait::async_trait;
use catalog::{ArmTemplateStepConfig, SubscriptionParameter, upsert_parameter};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ProvisionError, Result};

use super::{AsyncStepClient, StepExecutionResult, required_parameter};

/// System parameter recording the generated deployment name.
pub const ARM_DEPLOYMENT_NAME_PARAM: &str = "arm-deployment-name";

const DEPLOYMENTS_API_VERSION: &str = "2019-05-01";

#[derive(Debug, Deserialize)]
struct DeploymentResponse {
    properties: DeploymentResponseProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentResponseProperties {
    provisioning_state: String,
    #[serde(default)]
    outputs: Option<HashMap<String, DeploymentOutput>>,
}

#[derive(Debug, Deserialize)]
struct DeploymentOutput {
    value: serde_json::Value,
}

/// Deploys a template and polls it to completion.
pub struct ArmTemplateStepClient {
    config: ArmTemplateStepConfig,
    input_parameter_names: Vec<String>,
    output_parameter_names: Vec<String>,
    http: reqwest::Client,
    management_base_url: String,
}

impl ArmTemplateStepClient {
    /// Creates a new template deployment client.
    pub fn new(
        config: ArmTemplateStepConfig,
        input_parameter_names: Vec<String>,
        output_parameter_names: Vec<String>,
        http: reqwest::Client,
        management_base_url: String,
    ) -> Self {
        Self {
            config,
            input_parameter_names,
            output_parameter_names,
            http,
            management_base_url,
        }
    }

    fn deployment_url(
        &self,
        parameters: &[SubscriptionParameter],
        deployment_name: &str,
    ) -> Result<String> {
        let subscription_id = required_parameter(
            parameters,
            &self.config.azure_subscription_id_parameter_name,
        )?;
        let resource_group =
            required_parameter(parameters, &self.config.resource_group_parameter_name)?;

        Ok(format!(
            "{}/subscriptions/{}/resourcegroups/{}/providers/Microsoft.Resources/deployments/{}?api-version={}",
            self.management_base_url.trim_end_matches('/'),
            subscription_id,
            resource_group,
            deployment_name,
            DEPLOYMENTS_API_VERSION
        ))
    }

    async fn get_deployment(
        &self,
        parameters: &[SubscriptionParameter],
    ) -> Result<DeploymentResponse> {
        let deployment_name = required_parameter(parameters, ARM_DEPLOYMENT_NAME_PARAM)?;
        let access_token =
            required_parameter(parameters, &self.config.access_token_parameter_name)?;
        let url = self.deployment_url(parameters, deployment_name)?;

        let response = self.http.get(&url).bearer_auth(access_token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::DeploymentFailed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AsyncStepClient for ArmTemplateStepClient {
    #[tracing::instrument(skip(self, parameters), fields(template_url = %self.config.template_url))]
    async fn start(
        &self,
        mut parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        let access_token =
            required_parameter(&parameters, &self.config.access_token_parameter_name)?;
        // The region is a declared binding even though the template link
        // carries the location; fail fast if it is absent.
        required_parameter(&parameters, &self.config.location_parameter_name)?;

        let mut template_parameters = serde_json::Map::new();
        for name in &self.input_parameter_names {
            let value = required_parameter(&parameters, name)?;
            template_parameters.insert(name.clone(), serde_json::json!({"value": value}));
        }

        let deployment_name = Uuid::new_v4().to_string();
        let url = self.deployment_url(&parameters, &deployment_name)?;

        let mode = if self.config.is_run_in_complete_mode {
            "Complete"
        } else {
            "Incremental"
        };
        let body = serde_json::json!({
            "properties": {
                "mode": mode,
                "templateLink": {"uri": self.config.template_url},
                "parameters": template_parameters,
            }
        });

        let access_token = access_token.to_string();
        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::DeploymentFailed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        upsert_parameter(
            &mut parameters,
            SubscriptionParameter::system(ARM_DEPLOYMENT_NAME_PARAM, deployment_name),
        );
        Ok(parameters)
    }

    async fn check_execution_status(
        &self,
        parameters: &[SubscriptionParameter],
    ) -> Result<StepExecutionResult> {
        let deployment = self.get_deployment(parameters).await?;

        Ok(match deployment.properties.provisioning_state.as_str() {
            "Succeeded" => StepExecutionResult::Completed,
            "Failed" | "Canceled" => StepExecutionResult::Failed,
            _ => StepExecutionResult::Running,
        })
    }

    async fn finish(
        &self,
        mut parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        let deployment = self.get_deployment(&parameters).await?;

        if let Some(outputs) = deployment.properties.outputs {
            for (name, output) in outputs {
                if !self.output_parameter_names.is_empty()
                    && !self.output_parameter_names.contains(&name)
                {
                    continue;
                }
                let value = match output.value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                upsert_parameter(&mut parameters, SubscriptionParameter::system(name, value));
            }
        }

        Ok(parameters)
    }
}
