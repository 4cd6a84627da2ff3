pub mod certificates;
pub mod hypervisor;
pub mod juju;
pub mod keystone;
