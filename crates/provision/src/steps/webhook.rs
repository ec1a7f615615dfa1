//! Webhook step client: one authenticated HTTP call.

use std::collections::HashMap;

use async_trait::async_trait;
use catalog::{SubscriptionParameter, WebhookAuthType, WebhookStepConfig, upsert_parameter};

use crate::error::{ProvisionError, Result};

use super::{AsyncStepClient, StepExecutionResult, SyncStepClient, required_parameter};

/// Posts the bound input parameters as JSON and collects declared output
/// parameters from the response body.
pub struct WebhookStepClient {
    config: WebhookStepConfig,
    input_parameter_names: Vec<String>,
    output_parameter_names: Vec<String>,
    timeout: std::time::Duration,
    http: reqwest::Client,
}

impl WebhookStepClient {
    /// Creates a new webhook step client.
    ///
    /// The call itself is the step's remote operation, so the step's
    /// declared timeout bounds the request.
    pub fn new(
        config: WebhookStepConfig,
        input_parameter_names: Vec<String>,
        output_parameter_names: Vec<String>,
        timeout_in_seconds: u32,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            input_parameter_names,
            output_parameter_names,
            timeout: std::time::Duration::from_secs(timeout_in_seconds.into()),
            http,
        }
    }

    fn auth_key(&self) -> Result<&str> {
        self.config
            .auth_key
            .as_deref()
            .ok_or_else(|| ProvisionError::InvalidStepConfig {
                name: self.config.url.clone(),
                message: "auth key is required for the configured auth type".to_string(),
            })
    }

    async fn execute(
        &self,
        mut parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        let mut body = serde_json::Map::new();
        for name in &self.input_parameter_names {
            let value = required_parameter(&parameters, name)?;
            body.insert(name.clone(), serde_json::Value::String(value.to_string()));
        }

        let auth_value = self.config.auth_value.as_deref().unwrap_or("");
        let mut request = self.http.post(&self.config.url).timeout(self.timeout);
        match self.config.auth_type {
            WebhookAuthType::ApiKey => {
                request = request.header(self.auth_key()?, auth_value);
            }
            WebhookAuthType::BearerToken => {
                request = request.bearer_auth(auth_value);
            }
            WebhookAuthType::QueryParameter => {
                request = request.query(&[(self.auth_key()?, auth_value)]);
            }
            WebhookAuthType::None => {}
        }

        let response = request.json(&serde_json::Value::Object(body)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::WebhookFailed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let output: HashMap<String, serde_json::Value> = response.json().await?;
        for (name, value) in output {
            if self.output_parameter_names.contains(&name) {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                upsert_parameter(&mut parameters, SubscriptionParameter::system(name, value));
            }
        }

        Ok(parameters)
    }
}

#[async_trait]
impl SyncStepClient for WebhookStepClient {
    #[tracing::instrument(skip(self, parameters), fields(url = %self.config.url))]
    async fn run(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        self.execute(parameters).await
    }
}

// A webhook marked asynchronous performs its single call in `start`;
// there is nothing to poll or finish.
#[async_trait]
impl AsyncStepClient for WebhookStepClient {
    async fn start(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        self.execute(parameters).await
    }

    async fn check_execution_status(
        &self,
        _parameters: &[SubscriptionParameter],
    ) -> Result<StepExecutionResult> {
        Ok(StepExecutionResult::Completed)
    }

    async fn finish(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        Ok(parameters)
    }
}
