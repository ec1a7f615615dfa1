//! Remote shell boundary for script steps.
//!
//! The real transport (an SSH session to the jump host) lives outside
//! this crate; step clients only see these traits. The in-memory
//! implementation records every command and serves scripted file reads,
//! which is enough to drive the script step's whole lifecycle in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// An open shell session on a remote host.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Runs a command and returns its stdout.
    async fn run_command(&self, command: &str) -> Result<String>;
}

/// Opens shell sessions from jump-host connection parameters.
#[async_trait]
pub trait RemoteShellFactory: Send + Sync {
    /// Connects to the host with the given credentials.
    async fn connect(
        &self,
        host: &str,
        user_name: &str,
        private_key: &str,
        pass_phrase: &str,
    ) -> Result<Arc<dyn RemoteShell>>;
}

#[derive(Default)]
struct ShellState {
    commands: Vec<String>,
    files: HashMap<String, String>,
}

/// In-memory shell for testing script steps.
#[derive(Clone, Default)]
pub struct InMemoryRemoteShell {
    state: Arc<RwLock<ShellState>>,
}

impl InMemoryRemoteShell {
    /// Creates a new in-memory shell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every command run so far, in order.
    pub async fn commands(&self) -> Vec<String> {
        self.state.read().await.commands.clone()
    }

    /// Scripts the content returned for `cat <path>`.
    pub async fn set_file(&self, path: &str, content: &str) {
        self.state
            .write()
            .await
            .files
            .insert(path.to_string(), content.to_string());
    }
}

#[async_trait]
impl RemoteShell for InMemoryRemoteShell {
    async fn run_command(&self, command: &str) -> Result<String> {
        let mut state = self.state.write().await;
        state.commands.push(command.to_string());

        if let Some(path) = command.strip_prefix("cat ") {
            return Ok(state.files.get(path.trim()).cloned().unwrap_or_default());
        }
        Ok(String::new())
    }
}

/// In-memory shell factory handing out one shared shell.
#[derive(Clone, Default)]
pub struct InMemoryRemoteShellFactory {
    shell: InMemoryRemoteShell,
    connections: Arc<RwLock<Vec<(String, String)>>>,
}

impl InMemoryRemoteShellFactory {
    /// Creates a new factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared shell backing every connection.
    pub fn shell(&self) -> InMemoryRemoteShell {
        self.shell.clone()
    }

    /// Returns the (host, user) pairs connected so far.
    pub async fn connections(&self) -> Vec<(String, String)> {
        self.connections.read().await.clone()
    }
}

#[async_trait]
impl RemoteShellFactory for InMemoryRemoteShellFactory {
    async fn connect(
        &self,
        host: &str,
        user_name: &str,
        _private_key: &str,
        _pass_phrase: &str,
    ) -> Result<Arc<dyn RemoteShell>> {
        self.connections
            .write()
            .await
            .push((host.to_string(), user_name.to_string()));
        Ok(Arc::new(self.shell.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_records_commands_and_serves_files() {
        let shell = InMemoryRemoteShell::new();
        shell.set_file("work/result.txt", "completed").await;

        let out = shell.run_command("mkdir -p work").await.unwrap();
        assert!(out.is_empty());

        let out = shell.run_command("cat work/result.txt").await.unwrap();
        assert_eq!(out, "completed");

        let commands = shell.commands().await;
        assert_eq!(commands.len(), 2);
    }

    #[tokio::test]
    async fn factory_shares_one_shell() {
        let factory = InMemoryRemoteShellFactory::new();
        let shell = factory
            .connect("10.0.0.4", "azureuser", "key", "")
            .await
            .unwrap();
        shell.run_command("echo hello").await.unwrap();

        assert_eq!(factory.shell().commands().await.len(), 1);
        assert_eq!(
            factory.connections().await,
            vec![("10.0.0.4".to_string(), "azureuser".to_string())]
        );
    }
}
