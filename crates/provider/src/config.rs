//! Provider client configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use azurerm_common::{Error, Result, DEFAULT_ARM_ENDPOINT, VERSION};

/// Management API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Resource Manager endpoint
    pub endpoint: String,

    /// Subscription all requests are scoped to
    pub subscription_id: String,

    /// Bearer token for the management API (e.g. from `az account get-access-token`)
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// How long to wait for long-running operations
    pub operation_timeout_secs: u64,

    /// Delay between polls of a long-running operation
    pub poll_interval_secs: u64,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            subscription_id: String::new(),
            access_token: None,
            timeout_secs: 60,
            operation_timeout_secs: 45 * 60,
            poll_interval_secs: 10,
            user_agent: format!("terraform-provider-azurerm-rs/{}", VERSION),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Defaults overridden by `ARM_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(endpoint) = get("ARM_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(subscription_id) = get("ARM_SUBSCRIPTION_ID") {
            self.subscription_id = subscription_id;
        }
        if let Some(token) = get("ARM_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        self
    }

    /// Check the settings every request depends on
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::InvalidConfig("endpoint must be set".to_string()));
        }
        if self.subscription_id.is_empty() {
            return Err(Error::InvalidConfig(
                "subscription_id must be set (ARM_SUBSCRIPTION_ID)".to_string(),
            ));
        }
        if self.access_token.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::InvalidConfig(
                "access_token must be set (ARM_ACCESS_TOKEN)".to_string(),
            ));
        }
        Ok(())
    }
}
