// # Address Service Trait
//
// Defines the interface for the elastic address pool and the shared
// bandwidth package its addresses are metered through.
//
// ## Address Lifecycle
//
// ```text
// allocate ──► Allocated ──► GroupMember ──► Available ──► Bound
//                                               │
//                                               └─► removed from group ──► Released
// ```
//
// "Available" becomes visible asynchronously after allocation, so a listing
// immediately after provisioning may not include the new address yet.

use crate::config::AllocationParams;
use crate::pagination::{Page, PageRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Address status as reported by the address service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressStatus {
    /// Unbound and ready to associate
    Available,
    /// Bound to an instance
    InUse,
    /// Association in progress
    Associating,
    /// Disassociation in progress
    Unassociating,
    /// Any status this crate does not model explicitly
    Other(String),
}

impl AddressStatus {
    /// Parse the service's status string
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Available" => AddressStatus::Available,
            "InUse" => AddressStatus::InUse,
            "Associating" => AddressStatus::Associating,
            "Unassociating" => AddressStatus::Unassociating,
            other => AddressStatus::Other(other.to_string()),
        }
    }

    /// The service's spelling of this status
    pub fn as_str(&self) -> &str {
        match self {
            AddressStatus::Available => "Available",
            AddressStatus::InUse => "InUse",
            AddressStatus::Associating => "Associating",
            AddressStatus::Unassociating => "Unassociating",
            AddressStatus::Other(raw) => raw,
        }
    }
}

/// An elastic address as seen by one listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Allocation identifier, used by every mutating call
    pub allocation_id: String,
    /// The public IP literal
    pub ip: IpAddr,
    /// Current status
    pub status: AddressStatus,
    /// Bandwidth package this address is a member of
    pub bandwidth_package_id: Option<String>,
}

/// Result of allocating a new address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedAddress {
    /// Allocation identifier of the new address
    pub allocation_id: String,
    /// IP literal, when the service returns it with the allocation
    pub ip: Option<IpAddr>,
}

/// Trait for address service implementations
///
/// Each method performs exactly one remote call. Retries, page walking and
/// continuation on failure are owned by the reconciler.
///
/// # Trust Level: Untrusted
///
/// ## Forbidden Capabilities
/// - ❌ Retry or sleep (owned by `RetryPolicy`)
/// - ❌ Walk pages (owned by `pagination::collect_pages`)
/// - ❌ Cache the pool between calls (the reconciler re-queries on purpose)
/// - ❌ Decide how many addresses to allocate or which ones to release
#[async_trait]
pub trait AddressService: Send + Sync {
    /// List one page of addresses in `status`
    async fn describe_addresses(
        &self,
        status: &AddressStatus,
        page: PageRequest,
    ) -> Result<Page<Address>, crate::Error>;

    /// Allocate one new address
    async fn allocate_address(
        &self,
        params: &AllocationParams,
    ) -> Result<AllocatedAddress, crate::Error>;

    /// Bind an address to an instance
    async fn associate_address(
        &self,
        allocation_id: &str,
        instance_id: &str,
    ) -> Result<(), crate::Error>;

    /// Permanently deallocate an address
    async fn release_address(&self, allocation_id: &str) -> Result<(), crate::Error>;

    /// Register an address as a member of a bandwidth package
    async fn add_to_bandwidth_package(
        &self,
        allocation_id: &str,
        bandwidth_package_id: &str,
    ) -> Result<(), crate::Error>;

    /// Remove an address from a bandwidth package
    async fn remove_from_bandwidth_package(
        &self,
        allocation_id: &str,
        bandwidth_package_id: &str,
    ) -> Result<(), crate::Error>;

    /// Get the service name (for logging/debugging)
    fn service_name(&self) -> &'static str;
}
