//! Downstream subscription activation boundary.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::SubscriptionId;

use crate::error::{ProvisionError, Result};

/// Activates a subscription downstream once its workflow completes.
#[async_trait]
pub trait SubscriptionActivator: Send + Sync {
    /// Marks the subscription active.
    async fn activate(&self, subscription_id: SubscriptionId) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryActivatorState {
    activated: Vec<SubscriptionId>,
    fail_on_activate: bool,
}

/// In-memory activator for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActivator {
    state: Arc<RwLock<InMemoryActivatorState>>,
}

impl InMemoryActivator {
    /// Creates a new in-memory activator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the activator to fail on the next call.
    pub fn set_fail_on_activate(&self, fail: bool) {
        self.state.write().unwrap().fail_on_activate = fail;
    }

    /// Returns the number of activations performed.
    pub fn activation_count(&self) -> usize {
        self.state.read().unwrap().activated.len()
    }

    /// Returns true if the subscription was activated.
    pub fn is_activated(&self, subscription_id: SubscriptionId) -> bool {
        self.state
            .read()
            .unwrap()
            .activated
            .contains(&subscription_id)
    }
}

#[async_trait]
impl SubscriptionActivator for InMemoryActivator {
    async fn activate(&self, subscription_id: SubscriptionId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_activate {
            return Err(ProvisionError::ActivationFailed {
                status: 503,
                body: "activation unavailable".to_string(),
            });
        }
        state.activated.push(subscription_id);
        Ok(())
    }
}

/// HTTP activator posting to the marketplace service.
pub struct HttpSubscriptionActivator {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSubscriptionActivator {
    /// Creates a new HTTP activator against the given service base URL.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl SubscriptionActivator for HttpSubscriptionActivator {
    #[tracing::instrument(skip(self))]
    async fn activate(&self, subscription_id: SubscriptionId) -> Result<()> {
        let url = format!(
            "{}/subscriptions/{}/activate",
            self.base_url.trim_end_matches('/'),
            subscription_id
        );

        let mut request = self.http.post(&url);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::ActivationFailed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}
