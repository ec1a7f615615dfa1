use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Result, SecretStore, SecretStoreError};

/// In-memory secret store implementation for testing and embedding.
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    secrets: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySecretStore {
    /// Creates a new empty in-memory secret store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored secrets.
    pub async fn secret_count(&self) -> usize {
        self.secrets.read().await.len()
    }

    /// Returns true if a secret exists with the given name.
    pub async fn contains(&self, name: &str) -> bool {
        self.secrets.read().await.contains_key(name)
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, name: &str) -> Result<String> {
        let secrets = self.secrets.read().await;
        secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound(name.to_string()))
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        let mut secrets = self.secrets.write().await;
        secrets.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut secrets = self.secrets.write().await;
        secrets.remove(name);
        Ok(())
    }
}
