//! Virtual machine schema and field mapping
//!
//! Shared by the Linux and Windows virtual machine resources: ID parsing,
//! the `os_disk` block, network interface references and the connection
//! info handed to provisioners.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use azurerm_common::{Error, ResourceId, Result};

use super::models::{
    CachingTypes, DiffDiskOptions, DiffDiskSettings, DiskCreateOptionTypes,
    DiskEncryptionSetParameters, ManagedDiskParameters, NetworkInterfaceReference,
    OperatingSystemTypes, OsDisk, StorageAccountTypes, VirtualMachineProperties,
};
use crate::schema::{Attribute, Block, ValueType};
use crate::state::{
    bool_value, get_bool_attr, get_int_attr, get_list_attr, get_optional_string_attr,
    get_string_attr, int_value, list_value, make_state, string_value, DynamicValue, ResourceData,
};
use crate::validation::{int_between, string_in_slice, validate_resource_id, ValidateFunc, Validation};

/// Address handed to provisioners until public IP lookup exists
pub const PLACEHOLDER_HOST: &str = "1.2.3.4";

/// Storage SKUs an OS disk may use; Ultra SSDs are data-disk only
const OS_DISK_STORAGE_ACCOUNT_TYPES: &[&str] = &["Premium_LRS", "Standard_LRS", "StandardSSD_LRS"];

/// Largest OS disk size accepted by the API, in GB
pub const MAX_OS_DISK_SIZE_GB: i64 = 1023;

/// Resource group and name of a virtual machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachineId {
    pub resource_group: String,
    pub name: String,
}

impl VirtualMachineId {
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    /// Parse a `.../resourceGroups/<rg>/.../virtualMachines/<name>` ID
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input).map_err(|e| Error::ParseId {
            kind: "Virtual Machine",
            input: input.to_string(),
            source: Box::new(e),
        })?;

        let name = id.pop_segment("virtualMachines")?;
        id.validate_no_empty_segments(input)?;

        Ok(Self {
            resource_group: id.resource_group,
            name,
        })
    }

    /// Full ARM ID within `subscription_id`
    pub fn id(&self, subscription_id: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
            subscription_id, self.resource_group, self.name
        )
    }
}

impl fmt::Display for VirtualMachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}

/// Schema validator for attributes holding a virtual machine ID
pub fn validate_virtual_machine_id(value: &DynamicValue, key: &str) -> Validation {
    let Some(v) = value.as_string() else {
        return Validation::error(Error::attribute(
            key,
            format!("expected type of {:?} to be string", key),
        ));
    };

    match VirtualMachineId::parse(v) {
        Ok(_) => Validation::ok(),
        Err(e) => Validation::error(Error::attribute(
            key,
            format!("Can not parse {:?} as a resource id: {}", key, e),
        )),
    }
}

pub fn expand_virtual_machine_network_interface_ids(input: &[DynamicValue]) -> Vec<NetworkInterfaceReference> {
    input
        .iter()
        .filter_map(|v| v.as_string())
        .map(|id| NetworkInterfaceReference {
            id: Some(id.to_string()),
            properties: None,
        })
        .collect()
}

pub fn flatten_virtual_machine_network_interface_ids(
    input: Option<&[NetworkInterfaceReference]>,
) -> Vec<DynamicValue> {
    let Some(input) = input else {
        return vec![];
    };

    input
        .iter()
        .filter_map(|nic| nic.id.as_deref())
        .map(string_value)
        .collect()
}

/// The `os_disk` block: a required single-item list
pub fn virtual_machine_os_disk_schema() -> Attribute {
    // TODO: more of these should force a new resource once the API rejects in-place changes for them
    Attribute::required(ValueType::List).max_items(1).block(
        Block::new()
            .attribute(
                "caching",
                Attribute::required(ValueType::String)
                    .validate(string_in_slice(CachingTypes::ALL, false)),
            )
            .attribute(
                // the API rejects changes to osDisk.managedDisk.storageAccountType
                "storage_account_type",
                Attribute::required(ValueType::String)
                    .force_new()
                    .validate(string_in_slice(OS_DISK_STORAGE_ACCOUNT_TYPES, false)),
            )
            .attribute(
                "diff_disk_settings",
                Attribute::optional(ValueType::List)
                    .force_new()
                    .max_items(1)
                    .block(Block::new().attribute(
                        "option",
                        Attribute::required(ValueType::String)
                            .force_new()
                            .validate(string_in_slice(DiffDiskOptions::ALL, false)),
                    )),
            )
            .attribute(
                "disk_encryption_set_id",
                Attribute::optional(ValueType::String).validate(validate_resource_id()),
            )
            .attribute(
                "disk_size_gb",
                Attribute::optional(ValueType::Int)
                    .computed()
                    .validate(int_between(0, MAX_OS_DISK_SIZE_GB)),
            )
            .attribute(
                "name",
                Attribute::optional(ValueType::String).computed().force_new(),
            )
            .attribute(
                "write_accelerator_enabled",
                Attribute::optional(ValueType::Bool).default_value(false),
            ),
    )
}

fn parse_enum<T>(raw: &DynamicValue, key: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let value = get_string_attr(raw, key);
    value
        .parse()
        .map_err(|e: Error| Error::attribute(format!("os_disk.0.{}", key), e.to_string()))
}

/// Build the API `OsDisk` from the `os_disk` block
pub fn expand_virtual_machine_os_disk(input: &[DynamicValue], os_type: OperatingSystemTypes) -> Result<OsDisk> {
    let raw = input
        .first()
        .filter(|raw| raw.as_map().is_some())
        .ok_or_else(|| Error::attribute("os_disk", "exactly one os_disk block is required"))?;

    let caching: CachingTypes = parse_enum(raw, "caching")?;
    let storage_account_type: StorageAccountTypes = parse_enum(raw, "storage_account_type")?;

    let mut managed_disk = ManagedDiskParameters {
        storage_account_type: Some(storage_account_type),
        ..Default::default()
    };

    if let Some(id) = get_optional_string_attr(raw, "disk_encryption_set_id") {
        managed_disk.disk_encryption_set = Some(DiskEncryptionSetParameters { id: Some(id) });
    }

    let mut disk = OsDisk {
        caching: Some(caching),
        managed_disk: Some(managed_disk),
        write_accelerator_enabled: Some(get_bool_attr(raw, "write_accelerator_enabled", false)),
        // not exposed: OS disks are always created from the source image
        create_option: Some(DiskCreateOptionTypes::FromImage),
        os_type: Some(os_type),
        ..Default::default()
    };

    let disk_size_gb = get_int_attr(raw, "disk_size_gb", 0);
    if disk_size_gb > 0 {
        let size = i32::try_from(disk_size_gb)
            .map_err(|_| Error::attribute("os_disk.0.disk_size_gb", format!("{} is out of range", disk_size_gb)))?;
        disk.disk_size_gb = Some(size);
    }

    if let Some(diff_disk) = get_list_attr(raw, "diff_disk_settings").first() {
        let option: DiffDiskOptions = get_string_attr(diff_disk, "option")
            .parse()
            .map_err(|e: Error| Error::attribute("os_disk.0.diff_disk_settings.0.option", e.to_string()))?;
        disk.diff_disk_settings = Some(DiffDiskSettings { option });
    }

    if let Some(name) = get_optional_string_attr(raw, "name") {
        disk.name = Some(name);
    }

    Ok(disk)
}

/// Map the API `OsDisk` back to the `os_disk` block; absent fields flatten to zero values
pub fn flatten_virtual_machine_os_disk(input: Option<&OsDisk>) -> Vec<DynamicValue> {
    let Some(input) = input else {
        return vec![];
    };

    let diff_disk_settings = input
        .diff_disk_settings
        .iter()
        .map(|settings| make_state(vec![("option", string_value(settings.option.as_str()))]))
        .collect();

    let disk_size_gb = match input.disk_size_gb {
        Some(size) if size != 0 => i64::from(size),
        _ => 0,
    };

    let mut storage_account_type = "";
    let mut disk_encryption_set_id = String::new();
    if let Some(managed_disk) = &input.managed_disk {
        storage_account_type = managed_disk
            .storage_account_type
            .map(|t| t.as_str())
            .unwrap_or_default();

        if let Some(id) = managed_disk.disk_encryption_set.as_ref().and_then(|s| s.id.as_ref()) {
            disk_encryption_set_id = id.clone();
        }
    }

    vec![make_state(vec![
        ("caching", string_value(input.caching.map(|c| c.as_str()).unwrap_or_default())),
        ("disk_size_gb", int_value(disk_size_gb)),
        ("diff_disk_settings", list_value(diff_disk_settings)),
        ("disk_encryption_set_id", string_value(disk_encryption_set_id)),
        ("name", string_value(input.name.clone().unwrap_or_default())),
        ("storage_account_type", string_value(storage_account_type)),
        ("write_accelerator_enabled", bool_value(input.write_accelerator_enabled.unwrap_or(false))),
    ])]
}

/// Tell provisioners how to reach the machine
pub fn set_virtual_machine_connection_information(d: &mut ResourceData, input: Option<&VirtualMachineProperties>) {
    let Some(input) = input else {
        return;
    };

    let is_windows = input
        .os_profile
        .as_ref()
        .and_then(|profile| profile.windows_configuration.as_ref())
        .is_some();
    let provisioner_type = if is_windows { "winrm" } else { "ssh" };

    // TODO: look up the public IP of the primary network interface
    d.set_conn_info(HashMap::from([
        ("type".to_string(), provisioner_type.to_string()),
        ("host".to_string(), PLACEHOLDER_HOST.to_string()),
    ]));
}

/// Validator usable in schemas that reference virtual machines
pub fn virtual_machine_id_validator() -> ValidateFunc {
    ValidateFunc::new(validate_virtual_machine_id)
}
