//! Acceptance test configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use azurerm_provider::ClientConfig;

use crate::error::{AccError, AccResult};

/// Environment variable pointing at an optional TOML config file
pub const CONFIG_FILE_ENV: &str = "ARM_ACC_CONFIG";

/// Settings shared by every acceptance test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccConfig {
    /// Region test resources are created in
    pub location: String,

    pub subscription_id: String,

    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Management endpoint used by the existence checks
    pub endpoint: String,

    /// terraform binary to drive
    pub terraform_path: PathBuf,
}

impl Default for AccConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            location: String::new(),
            subscription_id: String::new(),
            access_token: None,
            endpoint: client.endpoint,
            terraform_path: PathBuf::from("terraform"),
        }
    }
}

impl AccConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> AccResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Config file named by `ARM_ACC_CONFIG` (if any) overridden by the environment
    pub fn from_env() -> AccResult<Self> {
        let base = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.is_empty() => Self::load(Path::new(&path))?,
            _ => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(location) = get("ARM_TEST_LOCATION") {
            self.location = location;
        }
        if let Some(subscription_id) = get("ARM_SUBSCRIPTION_ID") {
            self.subscription_id = subscription_id;
        }
        if let Some(token) = get("ARM_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(endpoint) = get("ARM_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(path) = get("TF_ACC_TERRAFORM_PATH") {
            self.terraform_path = PathBuf::from(path);
        }
        self
    }

    /// Fail when any variable the tests need is missing
    pub fn pre_check(&self) -> AccResult<()> {
        let mut missing = Vec::new();
        if self.subscription_id.is_empty() {
            missing.push("ARM_SUBSCRIPTION_ID");
        }
        if self.access_token.as_deref().unwrap_or_default().is_empty() {
            missing.push("ARM_ACCESS_TOKEN");
        }
        if self.location.is_empty() {
            missing.push("ARM_TEST_LOCATION");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccError::PreCheck(missing.join(", ")))
        }
    }

    /// Client settings for the API lookups done by checks
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            subscription_id: self.subscription_id.clone(),
            access_token: self.access_token.clone(),
            ..Default::default()
        }
    }
}
