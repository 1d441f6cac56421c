//! Compute resources

pub mod models;
pub mod virtual_machine;

pub use virtual_machine::{
    expand_virtual_machine_network_interface_ids, expand_virtual_machine_os_disk,
    flatten_virtual_machine_network_interface_ids, flatten_virtual_machine_os_disk,
    set_virtual_machine_connection_information, validate_virtual_machine_id,
    virtual_machine_os_disk_schema, VirtualMachineId,
};
