//! AzureRM Provider Implementation
//!
//! Dispatches resource operations by type name. Values cross this boundary
//! in Terraform's msgpack encoding.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use azurerm_common::Error;

use crate::client::ArmClient;
use crate::config::ClientConfig;
use crate::resources::virtual_machine::{LinuxVirtualMachineResource, WindowsVirtualMachineResource};
use crate::resources::Resource;
use crate::schema::Schema;
use crate::state::{
    decode_dynamic_value, encode_dynamic_value, make_state, string_value, DynamicValue, ResourceData,
};
use crate::validation::Validation;

/// Resource types served by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceType {
    LinuxVirtualMachine,
    WindowsVirtualMachine,
}

impl ResourceType {
    const ALL: [ResourceType; 2] = [ResourceType::LinuxVirtualMachine, ResourceType::WindowsVirtualMachine];

    fn type_name(self) -> &'static str {
        match self {
            ResourceType::LinuxVirtualMachine => LinuxVirtualMachineResource::type_name(),
            ResourceType::WindowsVirtualMachine => WindowsVirtualMachineResource::type_name(),
        }
    }

    fn from_name(type_name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.type_name() == type_name)
            .ok_or_else(|| anyhow!("Unknown resource type: {}", type_name))
    }

    fn schema(self) -> Schema {
        match self {
            ResourceType::LinuxVirtualMachine => LinuxVirtualMachineResource::schema(),
            ResourceType::WindowsVirtualMachine => WindowsVirtualMachineResource::schema(),
        }
    }

    fn validate(self, config: &DynamicValue) -> Validation {
        match self {
            ResourceType::LinuxVirtualMachine => LinuxVirtualMachineResource::validate(config),
            ResourceType::WindowsVirtualMachine => WindowsVirtualMachineResource::validate(config),
        }
    }

    async fn create(self, client: &ArmClient, config: &DynamicValue) -> Result<ResourceData> {
        match self {
            ResourceType::LinuxVirtualMachine => LinuxVirtualMachineResource::create(client, config).await,
            ResourceType::WindowsVirtualMachine => WindowsVirtualMachineResource::create(client, config).await,
        }
    }

    async fn read(self, client: &ArmClient, state: &DynamicValue) -> Result<ResourceData> {
        match self {
            ResourceType::LinuxVirtualMachine => LinuxVirtualMachineResource::read(client, state).await,
            ResourceType::WindowsVirtualMachine => WindowsVirtualMachineResource::read(client, state).await,
        }
    }

    async fn update(self, client: &ArmClient, state: &DynamicValue, config: &DynamicValue) -> Result<ResourceData> {
        match self {
            ResourceType::LinuxVirtualMachine => LinuxVirtualMachineResource::update(client, state, config).await,
            ResourceType::WindowsVirtualMachine => WindowsVirtualMachineResource::update(client, state, config).await,
        }
    }

    async fn delete(self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        match self {
            ResourceType::LinuxVirtualMachine => LinuxVirtualMachineResource::delete(client, state).await,
            ResourceType::WindowsVirtualMachine => WindowsVirtualMachineResource::delete(client, state).await,
        }
    }
}

/// Whether any error in the chain is a missing remote resource
fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<Error>().is_some_and(Error::is_not_found))
}

/// AzureRM provider
#[derive(Default)]
pub struct AzureRmProvider {
    client: Arc<RwLock<Option<ArmClient>>>,
}

impl AzureRmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the management client; must succeed before any resource call
    pub async fn configure(&self, config: ClientConfig) -> Result<()> {
        info!("Configuring provider for endpoint {}", config.endpoint);
        let client = ArmClient::new(config)?;
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn get_client(&self) -> Result<ArmClient> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("provider has not been configured"))
    }

    /// Schemas of every resource type the provider serves
    pub fn resource_schemas() -> BTreeMap<&'static str, Schema> {
        ResourceType::ALL.into_iter().map(|t| (t.type_name(), t.schema())).collect()
    }

    pub fn validate_resource_config(type_name: &str, config: &DynamicValue) -> Validation {
        debug!("ValidateResourceConfig called for {}", type_name);

        match ResourceType::from_name(type_name) {
            Ok(resource_type) => resource_type.validate(config),
            Err(e) => Validation::error(Error::InvalidConfig(e.to_string())),
        }
    }

    /// Refresh state; `None` means the resource no longer exists
    pub async fn read_resource(&self, type_name: &str, current_state: &[u8]) -> Result<Option<Vec<u8>>> {
        info!("ReadResource called for {}", type_name);

        let resource_type = ResourceType::from_name(type_name)?;
        let client = self.get_client().await?;
        let current_state = decode_dynamic_value(current_state)?;

        match resource_type.read(&client, &current_state).await {
            Ok(data) => Ok(Some(encode_dynamic_value(&data.into_state())?)),
            Err(e) if is_not_found(&e) => {
                warn!("{} no longer exists: {}", type_name, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Create, update or delete depending on which of the states is null
    pub async fn apply_resource_change(&self, type_name: &str, prior_state: &[u8], planned_state: &[u8]) -> Result<Vec<u8>> {
        info!("ApplyResourceChange called for {}", type_name);

        let resource_type = ResourceType::from_name(type_name)?;
        let client = self.get_client().await?;
        let prior = decode_dynamic_value(prior_state)?;
        let mut planned = decode_dynamic_value(planned_state)?;

        if !planned.is_null() {
            let schema = resource_type.schema();
            schema.block.apply_defaults(&mut planned);

            let validation = schema.block.validate(&planned);
            if !validation.is_ok() {
                bail!("invalid {} configuration: {}", type_name, validation.messages().join("; "));
            }
        }

        let new_state = match (prior.is_null(), planned.is_null()) {
            // Create
            (true, false) => resource_type.create(&client, &planned).await?,
            // Delete
            (false, true) => {
                resource_type.delete(&client, &prior).await?;
                ResourceData::default()
            }
            // Update
            (false, false) => resource_type.update(&client, &prior, &planned).await?,
            // No change
            (true, true) => ResourceData::default(),
        };

        encode_dynamic_value(&new_state.into_state())
    }

    /// Read an existing resource by its ARM ID
    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> Result<Vec<u8>> {
        info!("ImportResourceState called for {} with ID {}", type_name, id);

        let resource_type = ResourceType::from_name(type_name)?;
        let client = self.get_client().await?;
        let initial_state = make_state(vec![("id", string_value(id))]);

        let state = resource_type.read(&client, &initial_state).await?;
        encode_dynamic_value(&state.into_state())
    }
}
