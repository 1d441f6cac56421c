//! Driver for the terraform CLI

use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{AccError, AccResult};
use crate::state::State;

/// File each step's configuration is written to
pub const CONFIG_FILE_NAME: &str = "main.tf";

/// terraform invocations against one working directory
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: PathBuf,
    working_dir: PathBuf,
}

impl Terraform {
    pub fn new(binary: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Replace the configuration in the working directory
    pub fn write_config(&self, config: &str) -> AccResult<()> {
        std::fs::write(self.working_dir.join(CONFIG_FILE_NAME), config)?;
        Ok(())
    }

    async fn output(&self, args: &[&str]) -> AccResult<Output> {
        debug!("terraform {} (in {})", args.join(" "), self.working_dir.display());

        Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_dir)
            .env("TF_IN_AUTOMATION", "1")
            .output()
            .await
            .map_err(|e| AccError::Terraform {
                command: args.join(" "),
                code: None,
                stderr: format!("failed to run {}: {}", self.binary.display(), e),
            })
    }

    async fn run(&self, args: &[&str]) -> AccResult<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(AccError::Terraform {
                command: args.join(" "),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn init(&self) -> AccResult<()> {
        self.run(&["init", "-input=false", "-no-color"]).await?;
        Ok(())
    }

    pub async fn apply(&self) -> AccResult<()> {
        info!("terraform apply in {}", self.working_dir.display());
        self.run(&["apply", "-auto-approve", "-input=false", "-no-color"]).await?;
        Ok(())
    }

    /// Whether a plan right after apply shows no changes
    pub async fn plan_is_empty(&self) -> AccResult<bool> {
        let args = ["plan", "-detailed-exitcode", "-input=false", "-no-color"];
        let output = self.output(&args).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(2) => Ok(false),
            code => Err(AccError::Terraform {
                command: args.join(" "),
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    pub async fn show(&self) -> AccResult<State> {
        let json = self.run(&["show", "-json", "-no-color"]).await?;
        State::from_show_json(&json)
    }

    pub async fn import(&self, address: &str, id: &str) -> AccResult<()> {
        info!("terraform import {} {}", address, id);
        self.run(&["import", "-input=false", "-no-color", address, id]).await?;
        Ok(())
    }

    pub async fn destroy(&self) -> AccResult<()> {
        info!("terraform destroy in {}", self.working_dir.display());
        self.run(&["destroy", "-auto-approve", "-input=false", "-no-color"]).await?;
        Ok(())
    }
}
