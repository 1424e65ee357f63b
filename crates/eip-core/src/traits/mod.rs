//! Remote service boundary
//!
//! - [`ComputeService`]: List and maintain compute instances
//! - [`AddressService`]: Manage elastic addresses and bandwidth package membership

pub mod address;
pub mod compute;

pub use address::{Address, AddressService, AddressStatus, AllocatedAddress};
pub use compute::{AddressFilter, ComputeService, Instance, InstanceQuery, InstanceStatus};
