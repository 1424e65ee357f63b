// # Compute Service Trait
//
// Defines the interface for reading and maintaining the compute instance
// fleet.
//
// ## Implementations
//
// - Alibaba Cloud ECS: `eip-provider-aliyun` crate
//
// ## Usage
//
// ```rust,ignore
// use eip_core::{ComputeService, InstanceQuery, PageRequest, TagSelector};
//
// let query = InstanceQuery::tagged(TagSelector::new("role", "edge"));
// let page = compute.describe_instances(&query, PageRequest::first(50)).await?;
// for instance in page.items {
//     println!("{} public={}", instance.id, instance.has_public_address());
// }
// ```

use crate::config::TagSelector;
use crate::pagination::{Page, PageRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Instance lifecycle status as reported by the compute service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Pending,
    Running,
    Starting,
    Stopping,
    Stopped,
    /// Any status this crate does not model explicitly
    Other(String),
}

impl InstanceStatus {
    /// Parse the service's status string
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Pending" => InstanceStatus::Pending,
            "Running" => InstanceStatus::Running,
            "Starting" => InstanceStatus::Starting,
            "Stopping" => InstanceStatus::Stopping,
            "Stopped" => InstanceStatus::Stopped,
            other => InstanceStatus::Other(other.to_string()),
        }
    }

    /// The service's spelling of this status
    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Pending => "Pending",
            InstanceStatus::Running => "Running",
            InstanceStatus::Starting => "Starting",
            InstanceStatus::Stopping => "Stopping",
            InstanceStatus::Stopped => "Stopped",
            InstanceStatus::Other(raw) => raw,
        }
    }
}

/// A compute instance as seen by one listing call
///
/// Owned entirely by the compute service; every pass re-reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Lifecycle status
    pub status: InstanceStatus,
    /// Tags as key/value pairs
    pub tags: Vec<(String, String)>,
    /// Primary private address, if the instance has one
    pub private_ip: Option<IpAddr>,
    /// Public addresses attached directly to the instance
    pub public_ips: Vec<IpAddr>,
    /// Elastic address currently bound to the instance
    pub eip: Option<IpAddr>,
}

impl Instance {
    /// Whether the instance is reachable from the public network
    ///
    /// True for a directly-attached public address or a bound EIP. Both
    /// exclude the instance from reconciliation.
    pub fn has_public_address(&self) -> bool {
        !self.public_ips.is_empty() || self.eip.is_some()
    }
}

/// Which tagged instances a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFilter {
    /// Every tagged instance
    Any,
    /// Only instances without a public address or EIP
    WithoutPublicAddress,
}

/// Query for one instance listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceQuery {
    /// Tag every returned instance must carry
    pub selector: TagSelector,
    /// Restrict to running instances
    pub running_only: bool,
    /// Public-address filter, applied by the core after each page
    pub filter: AddressFilter,
}

impl InstanceQuery {
    /// Every instance carrying the tag, in any state
    pub fn tagged(selector: TagSelector) -> Self {
        Self {
            selector,
            running_only: false,
            filter: AddressFilter::Any,
        }
    }

    /// Restrict to running instances
    pub fn running_only(mut self, running_only: bool) -> Self {
        self.running_only = running_only;
        self
    }

    /// Restrict to instances without any public address
    pub fn without_public_address(mut self) -> Self {
        self.filter = AddressFilter::WithoutPublicAddress;
        self
    }

    /// Whether `instance` passes the address filter
    pub fn admits(&self, instance: &Instance) -> bool {
        match self.filter {
            AddressFilter::Any => true,
            AddressFilter::WithoutPublicAddress => !instance.has_public_address(),
        }
    }
}

/// Trait for compute service implementations
///
/// Each method performs exactly one remote call and reports its outcome.
///
/// # Trust Level: Untrusted
///
/// ## Forbidden Capabilities
/// - ❌ Retry or sleep (owned by the core's `RetryPolicy`)
/// - ❌ Walk pages (owned by `pagination::collect_pages`)
/// - ❌ Cache results between calls (every read must hit the service)
/// - ❌ Apply the public-address filter (owned by `InstanceQuery::admits`)
///
/// A listing page reports the service's total count and effective page
/// size so the core can compute the page count itself.
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// List one page of instances carrying the query's tag
    ///
    /// `query.running_only` must be honoured by the service;
    /// `query.filter` is applied by the caller.
    ///
    /// # Returns
    ///
    /// - `Ok(Page<Instance>)`: The requested page with total count
    /// - `Err(Error)`: If the listing call failed
    async fn describe_instances(
        &self,
        query: &InstanceQuery,
        page: PageRequest,
    ) -> Result<Page<Instance>, crate::Error>;

    /// Change an instance's display name
    async fn modify_instance_name(&self, instance_id: &str, name: &str)
    -> Result<(), crate::Error>;

    /// Change an instance's compute-size class
    ///
    /// The service typically requires the instance to be stopped.
    async fn modify_instance_spec(
        &self,
        instance_id: &str,
        instance_type: &str,
    ) -> Result<(), crate::Error>;

    /// Start a stopped instance
    async fn start_instance(&self, instance_id: &str) -> Result<(), crate::Error>;

    /// Stop a running instance
    async fn stop_instance(&self, instance_id: &str) -> Result<(), crate::Error>;

    /// Get the service name (for logging/debugging)
    fn service_name(&self) -> &'static str;
}
