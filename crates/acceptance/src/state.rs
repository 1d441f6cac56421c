//! Terraform state as seen by checks
//!
//! Built from `terraform show -json`. Attribute values are flattened into
//! string keys the way the plugin SDK addresses them: `list.#` for list
//! lengths, `map.%` for map sizes and `block.0.attr` for nested values.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::AccResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceState {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceState {
    pub resource_type: String,
    pub primary: InstanceState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleState {
    /// Keyed by address, e.g. `azurerm_resource_group.test`
    pub resources: BTreeMap<String, ResourceState>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    root_module: ModuleState,
}

#[derive(Deserialize)]
struct ShowOutput {
    #[serde(default)]
    values: Option<ShowValues>,
}

#[derive(Deserialize)]
struct ShowValues {
    #[serde(default)]
    root_module: ShowModule,
}

#[derive(Default, Deserialize)]
struct ShowModule {
    #[serde(default)]
    resources: Vec<ShowResource>,
}

#[derive(Deserialize)]
struct ShowResource {
    address: String,
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    values: BTreeMap<String, Value>,
}

impl State {
    /// Parse the output of `terraform show -json`
    pub fn from_show_json(json: &str) -> AccResult<Self> {
        let output: ShowOutput = serde_json::from_str(json)?;

        let mut root_module = ModuleState::default();
        for resource in output.values.map(|v| v.root_module.resources).unwrap_or_default() {
            let mut attributes = BTreeMap::new();
            for (key, value) in &resource.values {
                flatten_value(&mut attributes, key, value, false);
            }

            let id = attributes.get("id").cloned().unwrap_or_default();
            root_module.resources.insert(
                resource.address,
                ResourceState {
                    resource_type: resource.resource_type,
                    primary: InstanceState { id, attributes },
                },
            );
        }

        Ok(Self { root_module })
    }

    pub fn root_module(&self) -> &ModuleState {
        &self.root_module
    }

    pub fn is_empty(&self) -> bool {
        self.root_module.resources.is_empty()
    }

    /// Resources of one type, in address order
    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = (&'a str, &'a ResourceState)> + 'a {
        self.root_module
            .resources
            .iter()
            .filter(move |(_, rs)| rs.resource_type == resource_type)
            .map(|(address, rs)| (address.as_str(), rs))
    }
}

/// Objects inside lists are nested blocks and carry no `%` count
fn flatten_value(out: &mut BTreeMap<String, String>, key: &str, value: &Value, in_list: bool) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(key.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(key.to_string(), n.to_string());
        }
        Value::String(s) => {
            out.insert(key.to_string(), s.clone());
        }
        Value::Array(items) => {
            out.insert(format!("{}.#", key), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_value(out, &format!("{}.{}", key, i), item, true);
            }
        }
        Value::Object(map) => {
            if !in_list {
                let size = map.values().filter(|v| !v.is_null()).count();
                out.insert(format!("{}.%", key), size.to_string());
            }
            for (k, v) in map {
                flatten_value(out, &format!("{}.{}", key, k), v, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW: &str = r#"{
      "format_version": "1.0",
      "terraform_version": "1.5.7",
      "values": {
        "root_module": {
          "resources": [
            {
              "address": "azurerm_resource_group.test",
              "mode": "managed",
              "type": "azurerm_resource_group",
              "name": "test",
              "values": {
                "id": "/subscriptions/sub/resourceGroups/acctestRG-1",
                "location": "westeurope",
                "name": "acctestRG-1",
                "tags": {"env": "test"},
                "timeouts": null
              }
            },
            {
              "address": "azurerm_site_recovery_replication_policy.test",
              "mode": "managed",
              "type": "azurerm_site_recovery_replication_policy",
              "name": "test",
              "values": {
                "id": "/subscriptions/sub/resourceGroups/acctestRG-1/providers/Microsoft.RecoveryServices/vaults/acctest-vault-1/replicationPolicies/acctest-policy-1",
                "name": "acctest-policy-1",
                "recovery_point_retention_in_minutes": 1440,
                "enabled": true,
                "settings": [{"mode": "fast", "extra": null}]
              }
            }
          ]
        }
      }
    }"#;

    #[test]
    fn test_parse_show_output() {
        let state = State::from_show_json(SHOW).unwrap();
        let resources = &state.root_module().resources;
        assert_eq!(resources.len(), 2);

        let rg = &resources["azurerm_resource_group.test"];
        assert_eq!(rg.resource_type, "azurerm_resource_group");
        assert_eq!(rg.primary.id, "/subscriptions/sub/resourceGroups/acctestRG-1");
        assert_eq!(rg.primary.attributes["name"], "acctestRG-1");
        assert_eq!(rg.primary.attributes["tags.%"], "1");
        assert_eq!(rg.primary.attributes["tags.env"], "test");
        assert!(!rg.primary.attributes.contains_key("timeouts"));
    }

    #[test]
    fn test_scalars_and_blocks_flatten_like_the_sdk() {
        let state = State::from_show_json(SHOW).unwrap();
        let attrs = &state.root_module().resources["azurerm_site_recovery_replication_policy.test"]
            .primary
            .attributes;

        assert_eq!(attrs["recovery_point_retention_in_minutes"], "1440");
        assert_eq!(attrs["enabled"], "true");
        assert_eq!(attrs["settings.#"], "1");
        assert_eq!(attrs["settings.0.mode"], "fast");
        assert!(!attrs.contains_key("settings.0.%"));
        assert!(!attrs.contains_key("settings.0.extra"));
    }

    #[test]
    fn test_empty_state() {
        let state = State::from_show_json(r#"{"format_version":"1.0"}"#).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_resources_of_type() {
        let state = State::from_show_json(SHOW).unwrap();
        let groups: Vec<&str> = state
            .resources_of_type("azurerm_resource_group")
            .map(|(address, _)| address)
            .collect();
        assert_eq!(groups, vec!["azurerm_resource_group.test"]);
    }
}
