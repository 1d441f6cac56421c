//! Client for the Azure Resource Manager REST API
//!
//! A thin wrapper over `reqwest`: it attaches credentials and the
//! api-version, decodes JSON bodies and maps ARM error payloads. A 404 is
//! not an error at this level; callers decide what a missing resource means.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use azurerm_common::{Error, Result};

use crate::compute::models::{self, VirtualMachine};
use crate::compute::VirtualMachineId;
use crate::config::ClientConfig;

const RESOURCES_API_VERSION: &str = "2019-05-01";
const SITE_RECOVERY_API_VERSION: &str = "2018-01-10";

/// Response of a management API call
#[derive(Debug, Clone)]
pub struct ArmResponse<T> {
    pub status: StatusCode,
    pub value: Option<T>,
}

impl<T> ArmResponse<T> {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// The body, or `NotFound` when the resource does not exist
    pub fn into_value(self, kind: &str, id: &str) -> Result<T> {
        self.value.ok_or_else(|| Error::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }
}

/// Generic ARM resource envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmResource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Turn an error response body into a readable message
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ArmErrorBody>(body) {
        Ok(parsed) if !parsed.error.code.is_empty() => {
            format!("{}: {}", parsed.error.code, parsed.error.message)
        }
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ if body.trim().is_empty() => status.to_string(),
        _ => body.trim().to_string(),
    }
}

/// Authenticated management API client
#[derive(Debug, Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ArmClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscription_id(&self) -> &str {
        &self.config.subscription_id
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            path,
            api_version
        )
    }

    async fn send<B, T>(&self, method: Method, path: &str, api_version: &str, body: Option<&B>) -> Result<ArmResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, api_version);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!("{} {} -> {}", method, path, status);

        if status == StatusCode::NOT_FOUND {
            return Ok(ArmResponse { status, value: None });
        }

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        let value = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };

        Ok(ArmResponse { status, value })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<ArmResponse<T>> {
        self.send::<(), T>(Method::GET, path, api_version, None).await
    }

    pub async fn put<B, T>(&self, path: &str, api_version: &str, body: &B) -> Result<ArmResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, api_version, Some(body)).await
    }

    pub async fn delete(&self, path: &str, api_version: &str) -> Result<StatusCode> {
        let response = self
            .send::<(), serde_json::Value>(Method::DELETE, path, api_version, None)
            .await?;
        Ok(response.status)
    }

    fn resource_group_path(&self, resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.config.subscription_id, resource_group
        )
    }

    pub fn resource_groups(&self) -> ResourceGroupsClient<'_> {
        ResourceGroupsClient { arm: self }
    }

    pub fn virtual_machines(&self) -> VirtualMachinesClient<'_> {
        VirtualMachinesClient { arm: self }
    }

    pub fn replication_fabrics(&self, resource_group: &str, vault_name: &str) -> ReplicationFabricsClient<'_> {
        ReplicationFabricsClient {
            arm: self,
            vault_path: self.vault_path(resource_group, vault_name),
        }
    }

    pub fn replication_policies(&self, resource_group: &str, vault_name: &str) -> ReplicationPoliciesClient<'_> {
        ReplicationPoliciesClient {
            arm: self,
            vault_path: self.vault_path(resource_group, vault_name),
        }
    }

    fn vault_path(&self, resource_group: &str, vault_name: &str) -> String {
        format!(
            "{}/providers/Microsoft.RecoveryServices/vaults/{}",
            self.resource_group_path(resource_group),
            vault_name
        )
    }
}

pub struct ResourceGroupsClient<'a> {
    arm: &'a ArmClient,
}

impl ResourceGroupsClient<'_> {
    pub async fn get(&self, name: &str) -> Result<ArmResponse<ArmResource>> {
        let path = self.arm.resource_group_path(name);
        self.arm.get(&path, RESOURCES_API_VERSION).await
    }
}

pub struct VirtualMachinesClient<'a> {
    arm: &'a ArmClient,
}

impl VirtualMachinesClient<'_> {
    fn path(&self, id: &VirtualMachineId) -> String {
        id.id(self.arm.subscription_id())
    }

    pub async fn get(&self, id: &VirtualMachineId) -> Result<ArmResponse<VirtualMachine>> {
        self.arm.get(&self.path(id), models::API_VERSION).await
    }

    pub async fn create_or_update(&self, id: &VirtualMachineId, vm: &VirtualMachine) -> Result<ArmResponse<VirtualMachine>> {
        self.arm.put(&self.path(id), models::API_VERSION, vm).await
    }

    pub async fn delete(&self, id: &VirtualMachineId) -> Result<StatusCode> {
        self.arm.delete(&self.path(id), models::API_VERSION).await
    }
}

pub struct ReplicationFabricsClient<'a> {
    arm: &'a ArmClient,
    vault_path: String,
}

impl ReplicationFabricsClient<'_> {
    pub async fn get(&self, name: &str) -> Result<ArmResponse<ArmResource>> {
        let path = format!("{}/replicationFabrics/{}", self.vault_path, name);
        self.arm.get(&path, SITE_RECOVERY_API_VERSION).await
    }
}

pub struct ReplicationPoliciesClient<'a> {
    arm: &'a ArmClient,
    vault_path: String,
}

impl ReplicationPoliciesClient<'_> {
    pub async fn get(&self, name: &str) -> Result<ArmResponse<ArmResource>> {
        let path = format!("{}/replicationPolicies/{}", self.vault_path, name);
        self.arm.get(&path, SITE_RECOVERY_API_VERSION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn client() -> ArmClient {
        ArmClient::new(ClientConfig {
            endpoint: "https://management.example.test/".to_string(),
            subscription_id: "sub".to_string(),
            access_token: Some("token".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_rejects_incomplete_config() {
        assert!(ArmClient::new(ClientConfig::default()).is_err());
    }

    #[test]
    fn test_url_building() {
        let arm = client();
        assert_eq!(
            arm.url("/subscriptions/sub/resourceGroups/rg", RESOURCES_API_VERSION),
            "https://management.example.test/subscriptions/sub/resourceGroups/rg?api-version=2019-05-01"
        );
        assert_eq!(
            arm.vault_path("rg", "vault1"),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RecoveryServices/vaults/vault1"
        );
        assert_eq!(
            arm.virtual_machines().path(&VirtualMachineId::new("rg", "vm1")),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1"
        );
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"code":"ResourceGroupNotFound","message":"Resource group 'rg' could not be found."}}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "ResourceGroupNotFound: Resource group 'rg' could not be found."
        );
        assert_eq!(error_message(StatusCode::CONFLICT, ""), "409 Conflict");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down\n"), "upstream down");
    }

    #[test]
    fn test_not_found_response() {
        let response: ArmResponse<ArmResource> = ArmResponse {
            status: StatusCode::NOT_FOUND,
            value: None,
        };
        assert!(response.is_not_found());
        let err = response.into_value("Replication Fabric", "fabric1").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_arm_resource_parses_without_properties() {
        let resource: ArmResource = serde_json::from_str(
            r#"{"id":"/subscriptions/sub/resourceGroups/rg","name":"rg","type":"Microsoft.Resources/resourceGroups","location":"westeurope"}"#,
        )
        .unwrap();
        assert_eq!(resource.resource_type, "Microsoft.Resources/resourceGroups");
        assert!(resource.properties.is_null());
    }

    #[tokio::test]
    async fn test_get_missing_resource_is_none() {
        let (endpoint, server) = test_support::serve(vec![(404, "")]).await;
        let arm = ArmClient::new(test_support::config(&endpoint)).unwrap();

        let response = arm.resource_groups().get("rg").await.unwrap();
        assert!(response.is_not_found());
        assert!(response.value.is_none());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /subscriptions/sub/resourceGroups/rg?api-version=2019-05-01 "));
        assert!(requests[0].to_lowercase().contains("authorization: bearer token"));
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let (endpoint, _server) =
            test_support::serve(vec![(500, r#"{"error":{"code":"Boom","message":"x"}}"#)]).await;
        let arm = ArmClient::new(test_support::config(&endpoint)).unwrap();

        match arm.resource_groups().get("rg").await.unwrap_err() {
            Error::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Boom: x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_get_decodes_body() {
        let (endpoint, _server) = test_support::serve(vec![(
            200,
            r#"{"id":"/subscriptions/sub/resourceGroups/rg","name":"rg","location":"westeurope"}"#,
        )])
        .await;
        let arm = ArmClient::new(test_support::config(&endpoint)).unwrap();

        let response = arm.resource_groups().get("rg").await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        let group = response.value.unwrap();
        assert_eq!(group.name, "rg");
        assert_eq!(group.location.as_deref(), Some("westeurope"));
    }
}
