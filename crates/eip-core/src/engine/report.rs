//! Pass report
//!
//! Summary of one reconciliation pass. Per-item failures never abort the
//! pass, so this is where they surface.

use crate::config::TagSelector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Which step an item failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Allocate,
    JoinBandwidthPackage,
    LeaveBandwidthPackage,
    Release,
    StopInstance,
    ModifyInstanceSpec,
    StartInstance,
    RenameInstance,
}

/// A per-item failure that was logged and skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Allocation or instance id, or a placeholder when the item never got one
    pub id: String,
    /// Failed step
    pub step: Step,
    /// Rendered error
    pub error: String,
}

impl ItemFailure {
    pub(crate) fn new(id: impl Into<String>, step: Step, error: &crate::Error) -> Self {
        Self {
            id: id.into(),
            step,
            error: error.to_string(),
        }
    }
}

/// A successful binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub instance_id: String,
    pub allocation_id: String,
    pub ip: IpAddr,
    /// Attempts the bind took
    pub attempts: u32,
}

/// A binding that failed on every attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindFailure {
    pub instance_id: String,
    pub allocation_id: String,
    pub attempts: u32,
    pub error: String,
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Fleet the pass ran against
    pub selector: TagSelector,

    /// Tagged instances without any public address
    pub unbound_instances: usize,

    /// Available addresses before provisioning
    pub available_before: usize,

    /// `max(unbound - available, 0)`
    pub deficit: usize,

    /// Addresses allocated and registered this pass
    pub provisioned: Vec<String>,
    pub provision_failures: Vec<ItemFailure>,

    /// Available addresses the binder worked from
    pub available_for_binding: usize,

    pub bindings: Vec<Binding>,
    pub bind_failures: Vec<BindFailure>,

    /// Instances left without an address because supply ran out
    pub unpaired_instances: Vec<String>,

    /// Surplus addresses released at the end of the pass
    pub reclaimed: Vec<String>,
    pub reclaim_failures: Vec<ItemFailure>,

    /// Listing pages that failed anywhere in the pass
    pub failed_pages: u32,
}

impl PassReport {
    pub(crate) fn begin(selector: TagSelector) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            selector,
            unbound_instances: 0,
            available_before: 0,
            deficit: 0,
            provisioned: Vec::new(),
            provision_failures: Vec::new(),
            available_for_binding: 0,
            bindings: Vec::new(),
            bind_failures: Vec::new(),
            unpaired_instances: Vec::new(),
            reclaimed: Vec::new(),
            reclaim_failures: Vec::new(),
            failed_pages: 0,
        }
    }

    /// True when nothing failed and every unbound instance got an address
    pub fn is_clean(&self) -> bool {
        self.provision_failures.is_empty()
            && self.bind_failures.is_empty()
            && self.unpaired_instances.is_empty()
            && self.reclaim_failures.is_empty()
            && self.failed_pages == 0
    }

    /// Wall-clock duration of the pass
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.signed_duration_since(self.started_at)
    }
}
