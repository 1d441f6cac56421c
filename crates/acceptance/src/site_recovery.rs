//! Site Recovery configurations and existence checks

use async_trait::async_trait;

use azurerm_provider::ArmClient;

use crate::checks::{resource_name, StateCheck};
use crate::error::{AccError, AccResult};
use crate::state::State;

pub const RESOURCE_GROUP_ADDRESS: &str = "azurerm_resource_group.test";
pub const VAULT_ADDRESS: &str = "azurerm_recovery_services_vault.test";
pub const FABRIC_ADDRESS: &str = "azurerm_site_recovery_fabric.test";
pub const REPLICATION_POLICY_ADDRESS: &str = "azurerm_site_recovery_replication_policy.test";

/// Provider block, resource group and vault shared by the configurations
fn vault_template(ri: i64, location: &str) -> String {
    format!(
        r#"
provider "azurerm" {{
  features {{}}
}}

resource "azurerm_resource_group" "test" {{
  name     = "acctestRG-{ri}"
  location = "{location}"
}}

resource "azurerm_recovery_services_vault" "test" {{
  name                = "acctest-vault-{ri}"
  location            = "${{azurerm_resource_group.test.location}}"
  resource_group_name = "${{azurerm_resource_group.test.name}}"
  sku                 = "Standard"
}}
"#
    )
}

pub fn site_recovery_fabric_basic(ri: i64, location: &str) -> String {
    format!(
        r#"{template}
resource "azurerm_site_recovery_fabric" "test" {{
  resource_group_name = "${{azurerm_resource_group.test.name}}"
  recovery_vault_name = "${{azurerm_recovery_services_vault.test.name}}"
  name                = "acctest-fabric-{ri}"
  location            = "${{azurerm_resource_group.test.location}}"
}}
"#,
        template = vault_template(ri, location),
    )
}

pub fn site_recovery_replication_policy_basic(ri: i64, location: &str) -> String {
    format!(
        r#"{template}
resource "azurerm_site_recovery_replication_policy" "test" {{
  resource_group_name                                  = "${{azurerm_resource_group.test.name}}"
  recovery_vault_name                                  = "${{azurerm_recovery_services_vault.test.name}}"
  name                                                 = "acctest-policy-{ri}"
  recovery_point_retention_in_minutes                  = "${{24 * 60}}"
  application_consistent_snapshot_frequency_in_minutes = "${{4 * 60}}"
}}
"#,
        template = vault_template(ri, location),
    )
}

/// Names of the resource group, vault and vault child a check looks up
#[derive(Debug, Clone)]
pub struct VaultChild {
    pub resource_group: String,
    pub vault: String,
    pub resource: String,
}

impl VaultChild {
    fn names(&self, state: &State) -> AccResult<(String, String, String)> {
        Ok((
            resource_name(state, &self.resource_group)?,
            resource_name(state, &self.vault)?,
            resource_name(state, &self.resource)?,
        ))
    }
}

/// The replication fabric in state exists in the API
pub struct SiteRecoveryFabricExists(VaultChild);

pub fn check_site_recovery_fabric_exists(resource_group: &str, vault: &str, resource: &str) -> SiteRecoveryFabricExists {
    SiteRecoveryFabricExists(VaultChild {
        resource_group: resource_group.to_string(),
        vault: vault.to_string(),
        resource: resource.to_string(),
    })
}

#[async_trait]
impl StateCheck for SiteRecoveryFabricExists {
    async fn check(&self, state: &State, client: &ArmClient) -> AccResult<()> {
        let (resource_group, vault, fabric) = self.0.names(state)?;

        let response = client
            .replication_fabrics(&resource_group, &vault)
            .get(&fabric)
            .await
            .map_err(|e| AccError::CheckFailed(format!("Bad: Get on fabricClient: {}", e)))?;

        if response.is_not_found() {
            return Err(AccError::CheckFailed(format!("Bad: fabric: {:?} does not exist", fabric)));
        }
        Ok(())
    }
}

/// The replication policy in state exists in the API
pub struct SiteRecoveryReplicationPolicyExists(VaultChild);

pub fn check_site_recovery_replication_policy_exists(
    resource_group: &str,
    vault: &str,
    resource: &str,
) -> SiteRecoveryReplicationPolicyExists {
    SiteRecoveryReplicationPolicyExists(VaultChild {
        resource_group: resource_group.to_string(),
        vault: vault.to_string(),
        resource: resource.to_string(),
    })
}

#[async_trait]
impl StateCheck for SiteRecoveryReplicationPolicyExists {
    async fn check(&self, state: &State, client: &ArmClient) -> AccResult<()> {
        let (resource_group, vault, policy) = self.0.names(state)?;

        let response = client
            .replication_policies(&resource_group, &vault)
            .get(&policy)
            .await
            .map_err(|e| AccError::CheckFailed(format!("Bad: Get on replicationPoliciesClient: {}", e)))?;

        if response.is_not_found() {
            return Err(AccError::CheckFailed(format!(
                "Bad: replication policy: {:?} does not exist",
                policy
            )));
        }
        Ok(())
    }
}
