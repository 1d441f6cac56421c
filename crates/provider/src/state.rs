//! Terraform State Management
//!
//! Handles the dynamically typed attribute bag Terraform hands to the
//! provider, and its msgpack encoding.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Dynamic value that can be encoded/decoded from Terraform state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral numbers; Terraform sends whole floats for `number` attributes.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    /// Insert into a map value, turning `Null` into an empty map first.
    pub fn set(&mut self, key: impl Into<String>, value: DynamicValue) {
        if self.is_null() {
            *self = DynamicValue::Map(HashMap::new());
        }
        if let DynamicValue::Map(m) = self {
            m.insert(key.into(), value);
        }
    }
}

impl Default for DynamicValue {
    fn default() -> Self {
        DynamicValue::Null
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        int_value(n)
    }
}

/// Decode a Terraform DynamicValue from msgpack bytes.
///
/// JSON is accepted as well since older protocol paths (state upgrade)
/// hand over raw JSON state.
pub fn decode_dynamic_value(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }

    match rmp_serde::from_slice::<DynamicValue>(data) {
        Ok(value) => Ok(value),
        Err(msgpack_err) => serde_json::from_slice(data)
            .with_context(|| format!("value is neither msgpack ({}) nor JSON", msgpack_err)),
    }
}

/// Encode a value to Terraform msgpack bytes
pub fn encode_dynamic_value(value: &DynamicValue) -> Result<Vec<u8>> {
    let bytes = rmp_serde::to_vec(value).context("failed to encode dynamic value")?;
    Ok(bytes)
}

/// Helper to extract a string attribute from a DynamicValue
pub fn get_string_attr(value: &DynamicValue, key: &str) -> String {
    value.get(key)
        .and_then(|v| v.as_string())
        .unwrap_or("")
        .to_string()
}

/// Helper to extract an optional string attribute from a DynamicValue
pub fn get_optional_string_attr(value: &DynamicValue, key: &str) -> Option<String> {
    value.get(key)
        .and_then(|v| match v {
            DynamicValue::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
}

/// Helper to extract an integer attribute from a DynamicValue
pub fn get_int_attr(value: &DynamicValue, key: &str, default: i64) -> i64 {
    value.get(key)
        .and_then(|v| v.as_i64())
        .unwrap_or(default)
}

/// Helper to extract a bool attribute from a DynamicValue
pub fn get_bool_attr(value: &DynamicValue, key: &str, default: bool) -> bool {
    value.get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

/// Helper to extract a list attribute; absent or null lists are empty
pub fn get_list_attr<'a>(value: &'a DynamicValue, key: &str) -> &'a [DynamicValue] {
    value.get(key)
        .and_then(|v| v.as_list())
        .unwrap_or(&[])
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Create a string DynamicValue
pub fn string_value(s: impl Into<String>) -> DynamicValue {
    DynamicValue::String(s.into())
}

/// Create a number DynamicValue from i64
pub fn int_value(n: i64) -> DynamicValue {
    DynamicValue::Number(serde_json::Number::from(n))
}

/// Create a bool DynamicValue
pub fn bool_value(b: bool) -> DynamicValue {
    DynamicValue::Bool(b)
}

/// Create a list DynamicValue
pub fn list_value(items: Vec<DynamicValue>) -> DynamicValue {
    DynamicValue::List(items)
}

/// Create a null DynamicValue
pub fn null_value() -> DynamicValue {
    DynamicValue::Null
}

/// Per-instance resource data handed to resource implementations.
///
/// Wraps the attribute bag together with the values Terraform keeps
/// outside of it: the instance ID and the provisioner connection info.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    state: DynamicValue,
    conn_info: HashMap<String, String>,
}

impl ResourceData {
    pub fn new(state: DynamicValue) -> Self {
        let id = get_string_attr(&state, "id");
        Self {
            id,
            state,
            conn_info: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
        let id = string_value(self.id.clone());
        self.state.set("id", id);
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.state.get(key)
    }

    pub fn set(&mut self, key: &str, value: DynamicValue) {
        self.state.set(key, value);
    }

    pub fn state(&self) -> &DynamicValue {
        &self.state
    }

    /// Record how provisioners should reach this instance.
    ///
    /// Connection info stays with the in-process result; `into_state` does
    /// not carry it, so it is never sent back across the msgpack boundary.
    pub fn set_conn_info(&mut self, info: HashMap<String, String>) {
        self.conn_info = info;
    }

    /// Connection info for provisioners; not part of the state sent back
    pub fn conn_info(&self) -> &HashMap<String, String> {
        &self.conn_info
    }

    /// The attribute bag alone, without connection info
    pub fn into_state(self) -> DynamicValue {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DynamicValue {
        make_state(vec![
            ("name", string_value("acctestvm")),
            ("disk_size_gb", int_value(30)),
            ("write_accelerator_enabled", bool_value(true)),
            ("network_interface_ids", list_value(vec![string_value("nic1")])),
        ])
    }

    #[test]
    fn test_msgpack_round_trip() {
        let value = sample();
        let bytes = encode_dynamic_value(&value).unwrap();
        let decoded = decode_dynamic_value(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_decode_accepts_json() {
        let decoded = decode_dynamic_value(br#"{"name":"acctestvm","disk_size_gb":30}"#).unwrap();
        assert_eq!(get_string_attr(&decoded, "name"), "acctestvm");
        assert_eq!(get_int_attr(&decoded, "disk_size_gb", 0), 30);
    }

    #[test]
    fn test_decode_empty_is_null() {
        assert!(decode_dynamic_value(&[]).unwrap().is_null());
    }

    #[test]
    fn test_attribute_helpers_fall_back_to_defaults() {
        let value = sample();
        assert_eq!(get_string_attr(&value, "missing"), "");
        assert_eq!(get_optional_string_attr(&value, "missing"), None);
        assert_eq!(get_int_attr(&value, "missing", 7), 7);
        assert!(!get_bool_attr(&value, "missing", false));
        assert!(get_list_attr(&value, "missing").is_empty());
        assert_eq!(get_list_attr(&value, "network_interface_ids").len(), 1);
    }

    #[test]
    fn test_whole_floats_read_as_ints() {
        let value = make_state(vec![(
            "disk_size_gb",
            DynamicValue::Number(serde_json::Number::from_f64(64.0).unwrap()),
        )]);
        assert_eq!(get_int_attr(&value, "disk_size_gb", 0), 64);
    }

    #[test]
    fn test_resource_data_tracks_id() {
        let mut data = ResourceData::new(null_value());
        assert_eq!(data.id(), "");
        data.set_id("/subscriptions/sub/resourceGroups/rg");
        assert_eq!(get_string_attr(data.state(), "id"), "/subscriptions/sub/resourceGroups/rg");
    }

    #[test]
    fn test_conn_info_is_not_part_of_state() {
        let mut data = ResourceData::new(make_state(vec![("name", string_value("vm1"))]));
        data.set_conn_info(HashMap::from([("type".to_string(), "ssh".to_string())]));
        assert_eq!(data.conn_info().len(), 1);

        let state = data.into_state();
        assert_eq!(state, make_state(vec![("name", string_value("vm1"))]));
        assert!(state.get("type").is_none());
    }
}
