//! AzureRM Terraform Provider
//!
//! Maps Terraform attribute bags onto Azure Resource Manager payloads for
//! the compute resources, and talks to the management API.

pub mod client;
pub mod compute;
pub mod config;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod state;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use client::ArmClient;
pub use config::ClientConfig;
pub use provider::AzureRmProvider;
pub use state::{DynamicValue, ResourceData};
