//! Resource Implementations
//!
//! Implements the CRUD operations for each resource type.

pub mod virtual_machine;

use anyhow::Result;

use crate::client::ArmClient;
use crate::schema::Schema;
use crate::state::{DynamicValue, ResourceData};
use crate::validation::Validation;

/// Trait for resource operations
#[async_trait::async_trait]
pub trait Resource {
    /// Resource type name
    fn type_name() -> &'static str;

    /// Attribute schema of the resource
    fn schema() -> Schema;

    /// Validate a configuration against the schema
    fn validate(config: &DynamicValue) -> Validation {
        Self::schema().block.validate(config)
    }

    /// Create a new resource
    async fn create(client: &ArmClient, config: &DynamicValue) -> Result<ResourceData>;

    /// Read an existing resource
    async fn read(client: &ArmClient, state: &DynamicValue) -> Result<ResourceData>;

    /// Update an existing resource
    async fn update(client: &ArmClient, state: &DynamicValue, config: &DynamicValue) -> Result<ResourceData>;

    /// Delete a resource
    async fn delete(client: &ArmClient, state: &DynamicValue) -> Result<()>;
}
