//! Linux and Windows Virtual Machine resources

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use azurerm_common::Error;

use super::Resource;
use crate::client::ArmClient;
use crate::compute::models::{
    HardwareProfile, ImageReference, LinuxConfiguration, NetworkProfile, OperatingSystemTypes,
    OsProfile, StorageProfile, VirtualMachine, VirtualMachineProperties, WindowsConfiguration,
};
use crate::compute::{
    expand_virtual_machine_network_interface_ids, expand_virtual_machine_os_disk,
    flatten_virtual_machine_network_interface_ids, flatten_virtual_machine_os_disk,
    set_virtual_machine_connection_information, virtual_machine_os_disk_schema, VirtualMachineId,
};
use crate::schema::{Attribute, Block, Elem, Schema, ValueType};
use crate::state::{
    get_list_attr, get_optional_string_attr, get_string_attr, list_value, make_state,
    string_value, DynamicValue, ResourceData,
};
use crate::validation::validate_resource_id;

fn virtual_machine_schema(os_type: OperatingSystemTypes) -> Schema {
    let admin_password = match os_type {
        OperatingSystemTypes::Windows => Attribute::required(ValueType::String).force_new(),
        OperatingSystemTypes::Linux => Attribute::optional(ValueType::String).force_new(),
    };

    Schema {
        version: 0,
        block: Block::new()
            .attribute("id", Attribute::optional(ValueType::String).computed())
            .attribute("name", Attribute::required(ValueType::String).force_new())
            .attribute("resource_group_name", Attribute::required(ValueType::String).force_new())
            .attribute("location", Attribute::required(ValueType::String).force_new())
            .attribute("size", Attribute::required(ValueType::String))
            .attribute("admin_username", Attribute::required(ValueType::String).force_new())
            .attribute("admin_password", admin_password)
            .attribute(
                "computer_name",
                Attribute::optional(ValueType::String).computed().force_new(),
            )
            .attribute(
                "network_interface_ids",
                Attribute::required(ValueType::List).elem(Elem::Value(ValueType::String)),
            )
            .attribute("os_disk", virtual_machine_os_disk_schema())
            .attribute(
                "source_image_id",
                Attribute::optional(ValueType::String)
                    .force_new()
                    .validate(validate_resource_id()),
            )
            .attribute(
                "source_image_reference",
                Attribute::optional(ValueType::List).force_new().max_items(1).block(
                    Block::new()
                        .attribute("publisher", Attribute::required(ValueType::String).force_new())
                        .attribute("offer", Attribute::required(ValueType::String).force_new())
                        .attribute("sku", Attribute::required(ValueType::String).force_new())
                        .attribute("version", Attribute::required(ValueType::String).force_new()),
                ),
            ),
    }
}

fn expand_image_reference(config: &DynamicValue) -> Result<ImageReference> {
    if let Some(id) = get_optional_string_attr(config, "source_image_id") {
        return Ok(ImageReference {
            id: Some(id),
            ..Default::default()
        });
    }

    let Some(raw) = get_list_attr(config, "source_image_reference").first() else {
        bail!("one of `source_image_id` or `source_image_reference` must be set");
    };

    Ok(ImageReference {
        publisher: get_optional_string_attr(raw, "publisher"),
        offer: get_optional_string_attr(raw, "offer"),
        sku: get_optional_string_attr(raw, "sku"),
        version: get_optional_string_attr(raw, "version"),
        id: None,
    })
}

fn flatten_image_reference(input: Option<&ImageReference>) -> (String, Vec<DynamicValue>) {
    let Some(image) = input else {
        return (String::new(), vec![]);
    };

    if let Some(id) = &image.id {
        return (id.clone(), vec![]);
    }

    let reference = make_state(vec![
        ("publisher", string_value(image.publisher.clone().unwrap_or_default())),
        ("offer", string_value(image.offer.clone().unwrap_or_default())),
        ("sku", string_value(image.sku.clone().unwrap_or_default())),
        ("version", string_value(image.version.clone().unwrap_or_default())),
    ]);
    (String::new(), vec![reference])
}

/// Build the API payload for a virtual machine configuration
pub fn expand_virtual_machine(config: &DynamicValue, os_type: OperatingSystemTypes) -> Result<VirtualMachine> {
    let name = get_string_attr(config, "name");
    let computer_name = get_optional_string_attr(config, "computer_name").unwrap_or_else(|| name.clone());

    let mut os_profile = OsProfile {
        computer_name: Some(computer_name),
        admin_username: get_optional_string_attr(config, "admin_username"),
        admin_password: get_optional_string_attr(config, "admin_password"),
        ..Default::default()
    };

    match os_type {
        OperatingSystemTypes::Windows => {
            os_profile.windows_configuration = Some(WindowsConfiguration {
                provision_vm_agent: Some(true),
                enable_automatic_updates: Some(true),
                time_zone: None,
            });
        }
        OperatingSystemTypes::Linux => {
            let has_password = os_profile.admin_password.is_some();
            os_profile.linux_configuration = Some(LinuxConfiguration {
                disable_password_authentication: Some(!has_password),
                provision_vm_agent: Some(true),
            });
        }
    }

    let os_disk = expand_virtual_machine_os_disk(get_list_attr(config, "os_disk"), os_type)?;

    Ok(VirtualMachine {
        location: get_optional_string_attr(config, "location"),
        properties: Some(VirtualMachineProperties {
            hardware_profile: Some(HardwareProfile {
                vm_size: get_optional_string_attr(config, "size"),
            }),
            storage_profile: Some(StorageProfile {
                image_reference: Some(expand_image_reference(config)?),
                os_disk: Some(os_disk),
            }),
            os_profile: Some(os_profile),
            network_profile: Some(NetworkProfile {
                network_interfaces: Some(expand_virtual_machine_network_interface_ids(
                    get_list_attr(config, "network_interface_ids"),
                )),
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Map an API virtual machine into resource data.
///
/// `prior` supplies the attributes the API never returns (the admin password).
pub fn flatten_virtual_machine(
    id: &VirtualMachineId,
    subscription_id: &str,
    vm: &VirtualMachine,
    prior: &DynamicValue,
) -> ResourceData {
    let mut d = ResourceData::new(prior.clone());
    d.set_id(vm.id.clone().unwrap_or_else(|| id.id(subscription_id)));
    d.set("name", string_value(id.name.clone()));
    d.set("resource_group_name", string_value(id.resource_group.clone()));
    d.set("location", string_value(vm.location.clone().unwrap_or_default()));

    let props = vm.properties.as_ref();

    let size = props
        .and_then(|p| p.hardware_profile.as_ref())
        .and_then(|h| h.vm_size.clone())
        .unwrap_or_default();
    d.set("size", string_value(size));

    let os_profile = props.and_then(|p| p.os_profile.as_ref());
    d.set(
        "admin_username",
        string_value(os_profile.and_then(|p| p.admin_username.clone()).unwrap_or_default()),
    );
    d.set(
        "computer_name",
        string_value(os_profile.and_then(|p| p.computer_name.clone()).unwrap_or_default()),
    );

    let network_interfaces = props
        .and_then(|p| p.network_profile.as_ref())
        .and_then(|n| n.network_interfaces.as_deref());
    d.set(
        "network_interface_ids",
        list_value(flatten_virtual_machine_network_interface_ids(network_interfaces)),
    );

    let storage_profile = props.and_then(|p| p.storage_profile.as_ref());
    d.set(
        "os_disk",
        list_value(flatten_virtual_machine_os_disk(storage_profile.and_then(|s| s.os_disk.as_ref()))),
    );

    let (source_image_id, source_image_reference) =
        flatten_image_reference(storage_profile.and_then(|s| s.image_reference.as_ref()));
    d.set("source_image_id", string_value(source_image_id));
    d.set("source_image_reference", list_value(source_image_reference));

    set_virtual_machine_connection_information(&mut d, props);
    d
}

fn id_from_config(config: &DynamicValue) -> VirtualMachineId {
    VirtualMachineId::new(
        get_string_attr(config, "resource_group_name"),
        get_string_attr(config, "name"),
    )
}

fn id_from_state(state: &DynamicValue) -> Result<VirtualMachineId> {
    let raw = get_string_attr(state, "id");
    VirtualMachineId::parse(&raw).with_context(|| format!("invalid virtual machine ID in state: {:?}", raw))
}

const TERMINAL_PROVISIONING_STATES: &[&str] = &["Succeeded", "Failed", "Canceled"];

/// Poll until the machine reaches a terminal provisioning state
async fn wait_for_provisioning(client: &ArmClient, id: &VirtualMachineId) -> Result<VirtualMachine> {
    let config = client.config();
    let deadline = Instant::now() + Duration::from_secs(config.operation_timeout_secs);

    loop {
        let vm = client
            .virtual_machines()
            .get(id)
            .await?
            .into_value("Virtual Machine", &id.to_string())?;

        let state = vm
            .properties
            .as_ref()
            .and_then(|p| p.provisioning_state.clone())
            .unwrap_or_default();
        debug!("Virtual Machine {} provisioning state: {:?}", id, state);

        match state.as_str() {
            "Succeeded" => return Ok(vm),
            s if TERMINAL_PROVISIONING_STATES.contains(&s) => {
                bail!("Virtual Machine {} finished provisioning in state {:?}", id, s)
            }
            _ => {}
        }

        if Instant::now() >= deadline {
            bail!(Error::Timeout {
                seconds: config.operation_timeout_secs
            });
        }
        sleep(Duration::from_secs(config.poll_interval_secs)).await;
    }
}

/// Poll until the machine is gone
async fn wait_for_deletion(client: &ArmClient, id: &VirtualMachineId) -> Result<()> {
    let config = client.config();
    let deadline = Instant::now() + Duration::from_secs(config.operation_timeout_secs);

    while !client.virtual_machines().get(id).await?.is_not_found() {
        if Instant::now() >= deadline {
            bail!(Error::Timeout {
                seconds: config.operation_timeout_secs
            });
        }
        sleep(Duration::from_secs(config.poll_interval_secs)).await;
    }
    Ok(())
}

async fn create_or_update(
    client: &ArmClient,
    config: &DynamicValue,
    os_type: OperatingSystemTypes,
) -> Result<ResourceData> {
    let id = id_from_config(config);
    let payload = expand_virtual_machine(config, os_type)?;

    client
        .virtual_machines()
        .create_or_update(&id, &payload)
        .await
        .with_context(|| format!("creating/updating Virtual Machine {}", id))?;

    let vm = wait_for_provisioning(client, &id).await?;
    info!("Virtual Machine {} provisioned", id);
    Ok(flatten_virtual_machine(&id, client.subscription_id(), &vm, config))
}

async fn read(client: &ArmClient, state: &DynamicValue) -> Result<ResourceData> {
    let id = id_from_state(state)?;
    let response = client.virtual_machines().get(&id).await?;

    if response.is_not_found() {
        warn!("Virtual Machine {} was not found - removing from state", id);
    }

    let vm = response.into_value("Virtual Machine", &id.to_string())?;
    Ok(flatten_virtual_machine(&id, client.subscription_id(), &vm, state))
}

async fn delete(client: &ArmClient, state: &DynamicValue) -> Result<()> {
    let id = id_from_state(state)?;
    client
        .virtual_machines()
        .delete(&id)
        .await
        .with_context(|| format!("deleting Virtual Machine {}", id))?;
    wait_for_deletion(client, &id).await
}

pub struct LinuxVirtualMachineResource;

#[async_trait::async_trait]
impl Resource for LinuxVirtualMachineResource {
    fn type_name() -> &'static str {
        "azurerm_linux_virtual_machine"
    }

    fn schema() -> Schema {
        virtual_machine_schema(OperatingSystemTypes::Linux)
    }

    async fn create(client: &ArmClient, config: &DynamicValue) -> Result<ResourceData> {
        create_or_update(client, config, OperatingSystemTypes::Linux).await
    }

    async fn read(client: &ArmClient, state: &DynamicValue) -> Result<ResourceData> {
        read(client, state).await
    }

    async fn update(client: &ArmClient, _state: &DynamicValue, config: &DynamicValue) -> Result<ResourceData> {
        create_or_update(client, config, OperatingSystemTypes::Linux).await
    }

    async fn delete(client: &ArmClient, state: &DynamicValue) -> Result<()> {
        delete(client, state).await
    }
}

pub struct WindowsVirtualMachineResource;

#[async_trait::async_trait]
impl Resource for WindowsVirtualMachineResource {
    fn type_name() -> &'static str {
        "azurerm_windows_virtual_machine"
    }

    fn schema() -> Schema {
        virtual_machine_schema(OperatingSystemTypes::Windows)
    }

    async fn create(client: &ArmClient, config: &DynamicValue) -> Result<ResourceData> {
        create_or_update(client, config, OperatingSystemTypes::Windows).await
    }

    async fn read(client: &ArmClient, state: &DynamicValue) -> Result<ResourceData> {
        read(client, state).await
    }

    async fn update(client: &ArmClient, _state: &DynamicValue, config: &DynamicValue) -> Result<ResourceData> {
        create_or_update(client, config, OperatingSystemTypes::Windows).await
    }

    async fn delete(client: &ArmClient, state: &DynamicValue) -> Result<()> {
        delete(client, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use crate::config::ClientConfig;
    use crate::state::{bool_value, int_value};
    use crate::test_support;

    const VM_ID: &str = "/subscriptions/sub/resourceGroups/acctestRG-1/providers/Microsoft.Compute/virtualMachines/acctestvm-1";
    const VM_CREATING: &str = r#"{"id":"/subscriptions/sub/resourceGroups/acctestRG-1/providers/Microsoft.Compute/virtualMachines/acctestvm-1","name":"acctestvm-1","location":"westeurope","properties":{"provisioningState":"Creating","hardwareProfile":{"vmSize":"Standard_F2"}}}"#;
    const VM_SUCCEEDED: &str = r#"{"id":"/subscriptions/sub/resourceGroups/acctestRG-1/providers/Microsoft.Compute/virtualMachines/acctestvm-1","name":"acctestvm-1","location":"westeurope","properties":{"provisioningState":"Succeeded","hardwareProfile":{"vmSize":"Standard_F2"}}}"#;
    const VM_FAILED: &str = r#"{"id":"/subscriptions/sub/resourceGroups/acctestRG-1/providers/Microsoft.Compute/virtualMachines/acctestvm-1","name":"acctestvm-1","properties":{"provisioningState":"Failed"}}"#;
    const VM_CANCELED: &str = r#"{"id":"/subscriptions/sub/resourceGroups/acctestRG-1/providers/Microsoft.Compute/virtualMachines/acctestvm-1","name":"acctestvm-1","properties":{"provisioningState":"Canceled"}}"#;

    const NIC_ID: &str = "/subscriptions/sub/resourceGroups/acctestRG-1/providers/Microsoft.Network/networkInterfaces/acctestnic-1";

    fn config() -> DynamicValue {
        make_state(vec![
            ("name", string_value("acctestvm-1")),
            ("resource_group_name", string_value("acctestRG-1")),
            ("location", string_value("westeurope")),
            ("size", string_value("Standard_F2")),
            ("admin_username", string_value("adminuser")),
            ("network_interface_ids", list_value(vec![string_value(NIC_ID)])),
            (
                "os_disk",
                list_value(vec![make_state(vec![
                    ("caching", string_value("ReadWrite")),
                    ("storage_account_type", string_value("Standard_LRS")),
                    ("write_accelerator_enabled", bool_value(false)),
                ])]),
            ),
            (
                "source_image_reference",
                list_value(vec![make_state(vec![
                    ("publisher", string_value("Canonical")),
                    ("offer", string_value("UbuntuServer")),
                    ("sku", string_value("16.04-LTS")),
                    ("version", string_value("latest")),
                ])]),
            ),
        ])
    }

    #[test]
    fn test_schema_accepts_linux_config() {
        let result = LinuxVirtualMachineResource::validate(&config());
        assert!(result.is_ok(), "{:?}", result.messages());
    }

    #[test]
    fn test_windows_schema_requires_password() {
        let result = WindowsVirtualMachineResource::validate(&config());
        assert_eq!(result.errors.len(), 1);
        assert!(result.messages()[0].contains("admin_password"));
    }

    #[test]
    fn test_expand_linux_virtual_machine() {
        let vm = expand_virtual_machine(&config(), OperatingSystemTypes::Linux).unwrap();
        let props = vm.properties.unwrap();

        let os_profile = props.os_profile.unwrap();
        assert_eq!(os_profile.computer_name.as_deref(), Some("acctestvm-1"));
        assert!(os_profile.windows_configuration.is_none());
        assert_eq!(
            os_profile.linux_configuration.unwrap().disable_password_authentication,
            Some(true)
        );

        let storage = props.storage_profile.unwrap();
        assert_eq!(storage.os_disk.unwrap().os_type, Some(OperatingSystemTypes::Linux));
        assert_eq!(storage.image_reference.unwrap().offer.as_deref(), Some("UbuntuServer"));

        let nics = props.network_profile.unwrap().network_interfaces.unwrap();
        assert_eq!(nics[0].id.as_deref(), Some(NIC_ID));
    }

    #[test]
    fn test_expand_requires_an_image() {
        let mut config = config();
        config.set("source_image_reference", list_value(vec![]));
        assert!(expand_virtual_machine(&config, OperatingSystemTypes::Linux).is_err());

        config.set(
            "source_image_id",
            string_value("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/images/img1"),
        );
        let vm = expand_virtual_machine(&config, OperatingSystemTypes::Linux).unwrap();
        let image = vm.properties.unwrap().storage_profile.unwrap().image_reference.unwrap();
        assert!(image.id.is_some());
        assert!(image.publisher.is_none());
    }

    #[test]
    fn test_flatten_round_trips_through_the_api_model() {
        let config = config();
        let id = id_from_config(&config);
        let mut vm = expand_virtual_machine(&config, OperatingSystemTypes::Windows).unwrap();
        vm.id = Some(id.id("sub"));

        let d = flatten_virtual_machine(&id, "sub", &vm, &config);
        assert_eq!(d.id(), id.id("sub"));
        assert_eq!(get_string_attr(d.state(), "size"), "Standard_F2");
        assert_eq!(get_string_attr(d.state(), "computer_name"), "acctestvm-1");
        assert_eq!(get_list_attr(d.state(), "network_interface_ids"), &[string_value(NIC_ID)]);
        assert_eq!(get_list_attr(d.state(), "source_image_reference").len(), 1);

        let os_disk = &get_list_attr(d.state(), "os_disk")[0];
        assert_eq!(os_disk.get("disk_size_gb"), Some(&int_value(0)));
        assert_eq!(get_string_attr(os_disk, "caching"), "ReadWrite");

        assert_eq!(d.conn_info().get("type").map(String::as_str), Some("winrm"));
    }

    #[test]
    fn test_id_from_state() {
        let state = make_state(vec![(
            "id",
            string_value("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1"),
        )]);
        assert_eq!(id_from_state(&state).unwrap(), VirtualMachineId::new("rg", "vm1"));
        assert!(id_from_state(&make_state(vec![])).is_err());
    }

    fn vm_state() -> DynamicValue {
        make_state(vec![("id", string_value(VM_ID))])
    }

    #[tokio::test]
    async fn test_create_polls_until_succeeded() {
        let (endpoint, server) =
            test_support::serve(vec![(201, VM_CREATING), (200, VM_CREATING), (200, VM_SUCCEEDED)]).await;
        let client = ArmClient::new(test_support::config(&endpoint)).unwrap();

        let d = LinuxVirtualMachineResource::create(&client, &config()).await.unwrap();
        assert_eq!(d.id(), VM_ID);
        assert_eq!(get_string_attr(d.state(), "size"), "Standard_F2");

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("PUT "));
        assert!(requests[2].starts_with("GET "));
    }

    #[test_case(VM_FAILED, "Failed" ; "failed")]
    #[test_case(VM_CANCELED, "Canceled" ; "canceled")]
    #[tokio::test]
    async fn test_terminal_provisioning_state_is_an_error(body: &'static str, state: &str) {
        let (endpoint, _server) = test_support::serve(vec![(200, body)]).await;
        let client = ArmClient::new(test_support::config(&endpoint)).unwrap();

        let err = wait_for_provisioning(&client, &VirtualMachineId::new("acctestRG-1", "acctestvm-1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains(&format!("finished provisioning in state {:?}", state)), "{err}");
    }

    #[tokio::test]
    async fn test_provisioning_times_out() {
        let (endpoint, _server) = test_support::serve(vec![(200, VM_CREATING)]).await;
        let client = ArmClient::new(ClientConfig {
            operation_timeout_secs: 0,
            ..test_support::config(&endpoint)
        })
        .unwrap();

        let err = wait_for_provisioning(&client, &VirtualMachineId::new("acctestRG-1", "acctestvm-1"))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Timeout { seconds: 0 })), "{err}");
    }

    #[tokio::test]
    async fn test_delete_polls_until_gone() {
        let (endpoint, server) = test_support::serve(vec![(202, ""), (200, VM_SUCCEEDED), (404, "")]).await;
        let client = ArmClient::new(test_support::config(&endpoint)).unwrap();

        LinuxVirtualMachineResource::delete(&client, &vm_state()).await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("DELETE "));
        assert!(requests[1].starts_with("GET "));
        assert!(requests[2].starts_with("GET "));
    }

    #[tokio::test]
    async fn test_read_missing_machine_is_not_found() {
        let (endpoint, _server) = test_support::serve(vec![(404, "")]).await;
        let client = ArmClient::new(test_support::config(&endpoint)).unwrap();

        let err = WindowsVirtualMachineResource::read(&client, &vm_state()).await.unwrap_err();
        assert!(err.downcast_ref::<Error>().is_some_and(Error::is_not_found), "{err}");
    }
}
