//! State checks run after each step and after destroy

use async_trait::async_trait;
use tracing::debug;

use azurerm_provider::ArmClient;

use crate::error::{AccError, AccResult};
use crate::state::{ResourceState, State};

/// A check against the state of a step, with API access for lookups
#[async_trait]
pub trait StateCheck: Send + Sync {
    async fn check(&self, state: &State, client: &ArmClient) -> AccResult<()>;
}

/// Runs checks in order and stops at the first failure
pub struct ComposeCheck(Vec<Box<dyn StateCheck>>);

pub fn compose(checks: Vec<Box<dyn StateCheck>>) -> ComposeCheck {
    ComposeCheck(checks)
}

#[async_trait]
impl StateCheck for ComposeCheck {
    async fn check(&self, state: &State, client: &ArmClient) -> AccResult<()> {
        let total = self.0.len();
        for (i, check) in self.0.iter().enumerate() {
            check.check(state, client).await.map_err(|e| {
                AccError::CheckFailed(format!("Check {}/{} error: {}", i + 1, total, e))
            })?;
        }
        Ok(())
    }
}

/// Look up a resource by address, `Not found: <address>` when absent
pub fn resource<'a>(state: &'a State, address: &str) -> AccResult<&'a ResourceState> {
    state
        .root_module()
        .resources
        .get(address)
        .ok_or_else(|| AccError::CheckFailed(format!("Not found: {}", address)))
}

/// The `name` attribute of a resource in state
pub fn resource_name(state: &State, address: &str) -> AccResult<String> {
    Ok(resource(state, address)?
        .primary
        .attributes
        .get("name")
        .cloned()
        .unwrap_or_default())
}

/// Asserts a flattened attribute value
pub struct ResourceAttrCheck {
    address: String,
    key: String,
    value: String,
}

pub fn check_resource_attr(address: &str, key: &str, value: impl Into<String>) -> ResourceAttrCheck {
    ResourceAttrCheck {
        address: address.to_string(),
        key: key.to_string(),
        value: value.into(),
    }
}

#[async_trait]
impl StateCheck for ResourceAttrCheck {
    async fn check(&self, state: &State, _client: &ArmClient) -> AccResult<()> {
        let rs = resource(state, &self.address)?;
        match rs.primary.attributes.get(&self.key) {
            Some(actual) if *actual == self.value => Ok(()),
            Some(actual) => Err(AccError::CheckFailed(format!(
                "{}: Attribute '{}' expected {:?}, got {:?}",
                self.address, self.key, self.value, actual
            ))),
            None => Err(AccError::CheckFailed(format!(
                "{}: Attribute '{}' not found",
                self.address, self.key
            ))),
        }
    }
}

/// Every resource group left in state must be gone from the API
pub struct ResourceGroupDestroyed;

pub fn check_resource_group_destroy() -> ResourceGroupDestroyed {
    ResourceGroupDestroyed
}

#[async_trait]
impl StateCheck for ResourceGroupDestroyed {
    async fn check(&self, state: &State, client: &ArmClient) -> AccResult<()> {
        for (address, rs) in state.resources_of_type("azurerm_resource_group") {
            let name = rs.primary.attributes.get("name").cloned().unwrap_or_default();
            debug!("Checking {} ({}) was destroyed", address, name);

            let response = client.resource_groups().get(&name).await?;
            if !response.is_not_found() {
                return Err(AccError::CheckFailed(format!(
                    "Resource Group still exists: {:?}",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use azurerm_provider::ClientConfig;

    use crate::test_support;

    const SHOW: &str = r#"{"values":{"root_module":{"resources":[
        {"address":"azurerm_resource_group.test","type":"azurerm_resource_group",
         "values":{"id":"/subscriptions/sub/resourceGroups/acctestRG-1","name":"acctestRG-1","location":"westeurope"}}
    ]}}}"#;

    fn client() -> ArmClient {
        ArmClient::new(ClientConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            subscription_id: "sub".to_string(),
            access_token: Some("token".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    struct Counting(Arc<AtomicUsize>, bool);

    #[async_trait]
    impl StateCheck for Counting {
        async fn check(&self, _state: &State, _client: &ArmClient) -> AccResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if self.1 {
                Ok(())
            } else {
                Err(AccError::CheckFailed("boom".to_string()))
            }
        }
    }

    #[test]
    fn test_missing_resource() {
        let state = State::from_show_json(SHOW).unwrap();
        let err = resource(&state, "azurerm_recovery_services_vault.test").unwrap_err();
        assert_eq!(err.to_string(), "Not found: azurerm_recovery_services_vault.test");
        assert_eq!(resource_name(&state, "azurerm_resource_group.test").unwrap(), "acctestRG-1");
    }

    #[tokio::test]
    async fn test_resource_attr() {
        let state = State::from_show_json(SHOW).unwrap();
        let client = client();

        check_resource_attr("azurerm_resource_group.test", "location", "westeurope")
            .check(&state, &client)
            .await
            .unwrap();

        let err = check_resource_attr("azurerm_resource_group.test", "location", "eastus")
            .check(&state, &client)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected \"eastus\""));
    }

    #[tokio::test]
    async fn test_compose_stops_at_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let check = compose(vec![
            Box::new(Counting(calls.clone(), true)),
            Box::new(Counting(calls.clone(), false)),
            Box::new(Counting(calls.clone(), true)),
        ]);

        let err = check.check(&State::default(), &client()).await.unwrap_err();
        assert_eq!(err.to_string(), "Check 2/3 error: boom");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_destroy_check_with_no_groups_makes_no_calls() {
        check_resource_group_destroy()
            .check(&State::default(), &client())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_destroy_check_fails_while_group_exists() {
        let (endpoint, server) =
            test_support::serve(vec![(200, r#"{"name":"acctestRG-1","location":"westeurope"}"#)]).await;
        let client = ArmClient::new(test_support::config(&endpoint)).unwrap();
        let state = State::from_show_json(SHOW).unwrap();

        let err = check_resource_group_destroy().check(&state, &client).await.unwrap_err();
        assert_eq!(err.to_string(), r#"Resource Group still exists: "acctestRG-1""#);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /subscriptions/sub/resourceGroups/acctestRG-1?"));
    }

    #[tokio::test]
    async fn test_destroy_check_passes_once_group_is_gone() {
        let (endpoint, _server) = test_support::serve(vec![(404, "")]).await;
        let client = ArmClient::new(test_support::config(&endpoint)).unwrap();
        let state = State::from_show_json(SHOW).unwrap();

        check_resource_group_destroy().check(&state, &client).await.unwrap();
    }
}
