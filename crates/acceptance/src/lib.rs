//! AzureRM Acceptance Test Framework
//!
//! Drives the terraform CLI against real Azure subscriptions:
//! - Applies each step's configuration in a temporary working directory
//! - Reads the resulting state with `terraform show -json`
//! - Checks resources exist through the management API
//! - Verifies `terraform import` reproduces the applied state
//! - Destroys everything and checks nothing was left behind
//!
//! Tests only run when `TF_ACC` is set.

pub mod checks;
pub mod config;
pub mod error;
pub mod random;
pub mod runner;
pub mod site_recovery;
pub mod state;
pub mod terraform;

#[cfg(test)]
mod test_support;

pub use checks::{check_resource_attr, check_resource_group_destroy, compose, StateCheck};
pub use config::AccConfig;
pub use error::{AccError, AccResult};
pub use random::acc_rand_time_int;
pub use runner::{parallel_test, TestCase, TestStep};
pub use state::State;

/// Initialize logging to stderr, `RUST_LOG` overriding the `info` default
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
