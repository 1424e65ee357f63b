//! Configuration types for the EIP reconciler
//!
//! A [`ReconcileConfig`] is built once at startup, validated, and handed to
//! the [`Reconciler`](crate::Reconciler) by value. Nothing reads process
//! state after that point.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key/value tag identifying the fleet in scope for one pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSelector {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl TagSelector {
    /// Create a new tag selector
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Validate the selector
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.key.trim().is_empty() {
            return Err(crate::Error::config("Tag selector key cannot be empty"));
        }
        if self.value.trim().is_empty() {
            return Err(crate::Error::config("Tag selector value cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Display for TagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Billing model for a newly allocated address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InternetChargeType {
    /// Billed by transferred traffic
    #[default]
    PayByTraffic,
    /// Billed by peak bandwidth
    PayByBandwidth,
}

impl InternetChargeType {
    /// The service's spelling of this charge type
    pub fn as_str(&self) -> &'static str {
        match self {
            InternetChargeType::PayByTraffic => "PayByTraffic",
            InternetChargeType::PayByBandwidth => "PayByBandwidth",
        }
    }

    /// Parse the service's spelling (case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "paybytraffic" => Some(InternetChargeType::PayByTraffic),
            "paybybandwidth" => Some(InternetChargeType::PayByBandwidth),
            _ => None,
        }
    }
}

/// Parameters for allocating one new address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationParams {
    /// ISP line class, e.g. `BGP`
    #[serde(default = "default_isp")]
    pub isp: String,

    /// Billing model
    #[serde(default)]
    pub internet_charge_type: InternetChargeType,

    /// Peak bandwidth in Mbps; the service default when unset
    #[serde(default)]
    pub bandwidth_mbps: Option<u32>,
}

impl Default for AllocationParams {
    fn default() -> Self {
        Self {
            isp: default_isp(),
            internet_charge_type: InternetChargeType::default(),
            bandwidth_mbps: None,
        }
    }
}

/// Fleet discovery settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Items requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Only consider running instances
    #[serde(default = "default_running_only")]
    pub running_only: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            running_only: default_running_only(),
        }
    }
}

/// Main reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Fleet in scope
    pub selector: TagSelector,

    /// Pre-existing shared bandwidth package new addresses join
    pub bandwidth_package_id: String,

    /// Parameters for provisioning
    #[serde(default)]
    pub allocation: AllocationParams,

    /// Listing settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Retry policy for binding an address to an instance
    #[serde(default = "RetryPolicy::bind_default")]
    pub bind_retry: RetryPolicy,
}

impl ReconcileConfig {
    /// Create a configuration with default allocation, discovery and retry settings
    pub fn new(selector: TagSelector, bandwidth_package_id: impl Into<String>) -> Self {
        Self {
            selector,
            bandwidth_package_id: bandwidth_package_id.into(),
            allocation: AllocationParams::default(),
            discovery: DiscoveryConfig::default(),
            bind_retry: RetryPolicy::bind_default(),
        }
    }

    /// Set the bind retry policy
    pub fn with_bind_retry(mut self, policy: RetryPolicy) -> Self {
        self.bind_retry = policy;
        self
    }

    /// Set the discovery settings
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    /// Set the allocation parameters
    pub fn with_allocation(mut self, allocation: AllocationParams) -> Self {
        self.allocation = allocation;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.selector.validate()?;

        if self.bandwidth_package_id.trim().is_empty() {
            return Err(crate::Error::config("Bandwidth package id cannot be empty"));
        }

        if self.allocation.isp.trim().is_empty() {
            return Err(crate::Error::config("Allocation ISP cannot be empty"));
        }

        if self.allocation.bandwidth_mbps == Some(0) {
            return Err(crate::Error::config("Allocation bandwidth must be > 0"));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.discovery.page_size) {
            return Err(crate::Error::config(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.discovery.page_size
            )));
        }

        self.bind_retry.validate()?;

        Ok(())
    }
}

/// Largest page size the listing APIs accept
pub const MAX_PAGE_SIZE: u32 = 100;

fn default_isp() -> String {
    "BGP".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_running_only() -> bool {
    true
}
