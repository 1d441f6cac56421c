//! AzureRM Common Library
//!
//! Shared error type and resource ID parsing for the provider and its
//! acceptance tests.

pub mod error;
pub mod resource_id;

pub use error::{Error, Result};
pub use resource_id::ResourceId;

/// Provider version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Azure Resource Manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";
