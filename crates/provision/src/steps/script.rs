//! Remote script step client.
//!
//! Runs a packaged script on the jump host through a remote shell
//! session: the package is downloaded and unpacked into a per-run working
//! directory, the entry script runs with its declared argument bindings,
//! and stdout/stderr land in log files inside the working directory. The
//! asynchronous variant backgrounds the script and polls a result file
//! for completion.

use std::sync::Arc;

use async_trait::async_trait;
use catalog::{ScriptStepConfig, SubscriptionParameter, upsert_parameter};
use uuid::Uuid;

use crate::error::Result;
use crate::jumpbox::{
    JUMPBOX_SSH_PASS_PHRASE_PARAM, JUMPBOX_SSH_PRIVATE_KEY_PARAM, JUMPBOX_USER_NAME_PARAM,
    JUMPBOX_VM_IP_PARAM,
};
use crate::shell::{RemoteShell, RemoteShellFactory};

use super::{AsyncStepClient, StepExecutionResult, SyncStepClient, optional_parameter, required_parameter};

/// System parameter recording the per-run working directory.
pub const SCRIPT_WORKING_DIR_PARAM: &str = "script-working-dir";

const LOG_FILE_NAME: &str = "log.txt";
const ERROR_LOG_FILE_NAME: &str = "error.txt";
const STATUS_FILE_NAME: &str = "result.txt";
const COMPLETED_STATUS_CONTENT: &str = "completed";
const FAILED_STATUS_CONTENT: &str = "failed";

/// Executes the entry script of a remote package.
pub struct ScriptStepClient {
    config: ScriptStepConfig,
    shells: Arc<dyn RemoteShellFactory>,
}

impl ScriptStepClient {
    /// Creates a new script step client.
    pub fn new(config: ScriptStepConfig, shells: Arc<dyn RemoteShellFactory>) -> Self {
        Self { config, shells }
    }

    async fn connect(&self, parameters: &[SubscriptionParameter]) -> Result<Arc<dyn RemoteShell>> {
        let host = required_parameter(parameters, JUMPBOX_VM_IP_PARAM)?;
        let user_name = required_parameter(parameters, JUMPBOX_USER_NAME_PARAM)?;
        let private_key = required_parameter(parameters, JUMPBOX_SSH_PRIVATE_KEY_PARAM)?;
        let pass_phrase = optional_parameter(parameters, JUMPBOX_SSH_PASS_PHRASE_PARAM);

        self.shells
            .connect(host, user_name, private_key, pass_phrase)
            .await
    }

    fn entry_command(
        &self,
        working_dir: &str,
        parameters: &[SubscriptionParameter],
        background: bool,
    ) -> Result<String> {
        let mut command = format!(
            "cd {}; chmod u+r+x ./{}; ./{}",
            working_dir, self.config.entry_script_file_name, self.config.entry_script_file_name
        );

        for argument in &self.config.input_arguments {
            let value = required_parameter(parameters, &argument.parameter_name)?;
            command.push_str(&format!(" -{} \"{}\"", argument.option, value));
        }

        command.push_str(&format!(
            " 1>{} 2>{}",
            LOG_FILE_NAME, ERROR_LOG_FILE_NAME
        ));
        if background {
            command.push_str(" &");
        }
        Ok(command)
    }

    async fn prepare_working_dir(
        &self,
        shell: &Arc<dyn RemoteShell>,
        working_dir: &str,
    ) -> Result<()> {
        shell
            .run_command(&format!("mkdir -p {}", working_dir))
            .await?;
        let package_name = format!("{}.zip", Uuid::new_v4().simple());
        shell
            .run_command(&format!(
                "cd {}; wget \"{}\" -O {}",
                working_dir, self.config.script_package_url, package_name
            ))
            .await?;
        shell
            .run_command(&format!("cd {}; unzip -o {}", working_dir, package_name))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SyncStepClient for ScriptStepClient {
    /// Runs the entry script to completion within this call and removes
    /// the working directory afterwards.
    #[tracing::instrument(skip(self, parameters), fields(package = %self.config.script_package_url))]
    async fn run(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        let shell = self.connect(&parameters).await?;
        let working_dir = Uuid::new_v4().simple().to_string();

        self.prepare_working_dir(&shell, &working_dir).await?;
        let command = self.entry_command(&working_dir, &parameters, false)?;
        shell.run_command(&command).await?;
        shell
            .run_command(&format!("rm -rf {}", working_dir))
            .await?;

        Ok(parameters)
    }
}

#[async_trait]
impl AsyncStepClient for ScriptStepClient {
    #[tracing::instrument(skip(self, parameters), fields(package = %self.config.script_package_url))]
    async fn start(
        &self,
        mut parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        let shell = self.connect(&parameters).await?;
        let working_dir = Uuid::new_v4().simple().to_string();

        self.prepare_working_dir(&shell, &working_dir).await?;
        let command = self.entry_command(&working_dir, &parameters, true)?;
        shell.run_command(&command).await?;

        upsert_parameter(
            &mut parameters,
            SubscriptionParameter::system(SCRIPT_WORKING_DIR_PARAM, working_dir),
        );
        Ok(parameters)
    }

    async fn check_execution_status(
        &self,
        parameters: &[SubscriptionParameter],
    ) -> Result<StepExecutionResult> {
        let shell = self.connect(parameters).await?;
        let working_dir = required_parameter(parameters, SCRIPT_WORKING_DIR_PARAM)?;

        let content = shell
            .run_command(&format!("cat {}/{}", working_dir, STATUS_FILE_NAME))
            .await?;

        let content = content.trim().to_ascii_lowercase();
        if content.starts_with(COMPLETED_STATUS_CONTENT) {
            Ok(StepExecutionResult::Completed)
        } else if content.starts_with(FAILED_STATUS_CONTENT) {
            Ok(StepExecutionResult::Failed)
        } else {
            Ok(StepExecutionResult::Running)
        }
    }

    async fn finish(
        &self,
        parameters: Vec<SubscriptionParameter>,
    ) -> Result<Vec<SubscriptionParameter>> {
        let shell = self.connect(&parameters).await?;
        let working_dir = required_parameter(&parameters, SCRIPT_WORKING_DIR_PARAM)?;
        shell
            .run_command(&format!("rm -rf {}", working_dir))
            .await?;
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::InMemoryRemoteShellFactory;
    use catalog::{InputArgument, find_parameter};

    fn config() -> ScriptStepConfig {
        ScriptStepConfig {
            script_package_url: "https://packages.example.com/setup.zip".to_string(),
            entry_script_file_name: "setup.sh".to_string(),
            input_arguments: vec![InputArgument {
                parameter_name: "SubscriptionId".to_string(),
                option: "subscription".to_string(),
            }],
        }
    }

    fn connection_params() -> Vec<SubscriptionParameter> {
        vec![
            SubscriptionParameter::system(JUMPBOX_VM_IP_PARAM, "10.0.0.4"),
            SubscriptionParameter::system(JUMPBOX_USER_NAME_PARAM, "azureuser"),
            SubscriptionParameter::system(JUMPBOX_SSH_PRIVATE_KEY_PARAM, "key-pem"),
            SubscriptionParameter::system("SubscriptionId", "sub-123"),
        ]
    }

    #[tokio::test]
    async fn start_downloads_unpacks_and_backgrounds_the_script() {
        let shells = InMemoryRemoteShellFactory::new();
        let client = ScriptStepClient::new(config(), Arc::new(shells.clone()));

        let result = client.start(connection_params()).await.unwrap();

        let working_dir = find_parameter(&result, SCRIPT_WORKING_DIR_PARAM)
            .unwrap()
            .to_string();
        let commands = shells.shell().commands().await;
        assert_eq!(commands.len(), 4);
        assert_eq!(commands[0], format!("mkdir -p {}", working_dir));
        assert!(commands[1].contains("wget \"https://packages.example.com/setup.zip\""));
        assert!(commands[2].contains("unzip -o"));
        assert!(commands[3].contains("./setup.sh -subscription \"sub-123\""));
        assert!(commands[3].contains("1>log.txt 2>error.txt &"));

        assert_eq!(
            shells.connections().await,
            vec![("10.0.0.4".to_string(), "azureuser".to_string())]
        );
    }

    #[tokio::test]
    async fn missing_connection_info_is_fatal() {
        let shells = InMemoryRemoteShellFactory::new();
        let client = ScriptStepClient::new(config(), Arc::new(shells));

        let result = client
            .start(vec![SubscriptionParameter::system("SubscriptionId", "x")])
            .await;
        assert!(matches!(
            result,
            Err(crate::error::ProvisionError::MissingParameter { .. })
        ));
    }

    #[tokio::test]
    async fn check_reads_the_status_file() {
        let shells = InMemoryRemoteShellFactory::new();
        let client = ScriptStepClient::new(config(), Arc::new(shells.clone()));

        let mut params = connection_params();
        upsert_parameter(
            &mut params,
            SubscriptionParameter::system(SCRIPT_WORKING_DIR_PARAM, "work-1"),
        );

        // Nothing written yet
        assert_eq!(
            client.check_execution_status(&params).await.unwrap(),
            StepExecutionResult::Running
        );

        shells.shell().set_file("work-1/result.txt", "Completed").await;
        assert_eq!(
            client.check_execution_status(&params).await.unwrap(),
            StepExecutionResult::Completed
        );

        shells.shell().set_file("work-1/result.txt", "failed: exit 2").await;
        assert_eq!(
            client.check_execution_status(&params).await.unwrap(),
            StepExecutionResult::Failed
        );
    }

    #[tokio::test]
    async fn finish_removes_the_working_directory() {
        let shells = InMemoryRemoteShellFactory::new();
        let client = ScriptStepClient::new(config(), Arc::new(shells.clone()));

        let mut params = connection_params();
        upsert_parameter(
            &mut params,
            SubscriptionParameter::system(SCRIPT_WORKING_DIR_PARAM, "work-1"),
        );

        client.finish(params).await.unwrap();
        let commands = shells.shell().commands().await;
        assert_eq!(commands, vec!["rm -rf work-1".to_string()]);
    }

    #[tokio::test]
    async fn sync_run_waits_and_cleans_up() {
        let shells = InMemoryRemoteShellFactory::new();
        let client = ScriptStepClient::new(config(), Arc::new(shells.clone()));

        let result = client.run(connection_params()).await.unwrap();
        assert!(find_parameter(&result, SCRIPT_WORKING_DIR_PARAM).is_none());

        let commands = shells.shell().commands().await;
        assert_eq!(commands.len(), 5);
        assert!(!commands[3].ends_with("&"));
        assert!(commands[4].starts_with("rm -rf "));
    }
}
