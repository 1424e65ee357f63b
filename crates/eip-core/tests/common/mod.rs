//! Test doubles and common utilities for contract tests
//!
//! `FakeCloud` is an in-memory account implementing both service traits.
//! It records every call, answers listings page by page, and lets a test
//! inject failures per call.

#![allow(dead_code)]

use eip_core::config::{AllocationParams, ReconcileConfig, TagSelector};
use eip_core::error::{Error, Result};
use eip_core::pagination::{Page, PageRequest};
use eip_core::retry::RetryPolicy;
use eip_core::traits::{
    Address, AddressService, AddressStatus, AllocatedAddress, ComputeService, Instance,
    InstanceQuery, InstanceStatus,
};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TAG_KEY: &str = "rnode";
pub const TAG_VALUE: &str = "true";
pub const PACKAGE: &str = "cbwp-test";

/// One recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeInstances { page: u32, size: u32 },
    DescribeAddresses { page: u32, size: u32 },
    Allocate,
    Associate { allocation_id: String, instance_id: String },
    Release { allocation_id: String },
    AddToPackage { allocation_id: String, package_id: String },
    RemoveFromPackage { allocation_id: String, package_id: String },
    ModifyName { instance_id: String, name: String },
    ModifySpec { instance_id: String, instance_type: String },
    Start { instance_id: String },
    Stop { instance_id: String },
}

#[derive(Debug, Clone)]
struct FakeAddress {
    allocation_id: String,
    ip: IpAddr,
    bound_to: Option<String>,
    package: Option<String>,
    /// Listings this address stays invisible for
    hidden_listings: u32,
    /// Listings that still report this address as available after binding
    stale_listings: u32,
}

#[derive(Default)]
struct State {
    instances: Vec<Instance>,
    addresses: Vec<FakeAddress>,
    calls: Vec<Call>,
    next_allocation: u32,

    // Fault injection
    associate_failures: HashMap<String, u32>,
    allocate_failures: u32,
    add_to_package_failures: HashSet<String>,
    remove_failures: HashSet<String>,
    release_failures: HashSet<String>,
    instance_page_faults: HashSet<u32>,
    address_page_faults: HashSet<u32>,
    stop_failures: HashSet<String>,
    spec_failures: HashMap<String, u32>,
    start_failures: HashMap<String, u32>,
    rename_failures: HashSet<String>,
    hide_new_allocations_for: u32,
    association_lag: u32,
}

/// In-memory cloud account
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` running tagged instances without any public address
    pub fn with_unbound_instances(self, n: usize) -> Self {
        for _ in 0..n {
            self.add_instance(tagged_instance(self.instance_count(), None));
        }
        self
    }

    /// Add `n` available addresses that are members of [`PACKAGE`]
    pub fn with_available_addresses(self, n: usize) -> Self {
        for _ in 0..n {
            self.add_address(Some(PACKAGE));
        }
        self
    }

    pub fn add_instance(&self, instance: Instance) {
        self.state.lock().unwrap().instances.push(instance);
    }

    /// Add an available address and return its allocation id
    pub fn add_address(&self, package: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        let n = state.addresses.len();
        let allocation_id = format!("eip-pre-{}", n);
        state.addresses.push(FakeAddress {
            allocation_id: allocation_id.clone(),
            ip: IpAddr::from([47, 96, 0, n as u8]),
            bound_to: None,
            package: package.map(str::to_string),
            hidden_listings: 0,
            stale_listings: 0,
        });
        allocation_id
    }

    pub fn instance_count(&self) -> usize {
        self.state.lock().unwrap().instances.len()
    }

    // Fault injection

    /// Fail the next `times` binds of `allocation_id`
    pub fn fail_associate(&self, allocation_id: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .associate_failures
            .insert(allocation_id.to_string(), times);
    }

    /// Fail the next `times` allocations
    pub fn fail_allocations(&self, times: u32) {
        self.state.lock().unwrap().allocate_failures = times;
    }

    pub fn fail_add_to_package(&self, allocation_id: &str) {
        self.state
            .lock()
            .unwrap()
            .add_to_package_failures
            .insert(allocation_id.to_string());
    }

    pub fn fail_remove(&self, allocation_id: &str) {
        self.state
            .lock()
            .unwrap()
            .remove_failures
            .insert(allocation_id.to_string());
    }

    pub fn fail_release(&self, allocation_id: &str) {
        self.state
            .lock()
            .unwrap()
            .release_failures
            .insert(allocation_id.to_string());
    }

    pub fn fail_instance_page(&self, page: u32) {
        self.state.lock().unwrap().instance_page_faults.insert(page);
    }

    pub fn fail_address_page(&self, page: u32) {
        self.state.lock().unwrap().address_page_faults.insert(page);
    }

    pub fn fail_stop(&self, instance_id: &str) {
        self.state
            .lock()
            .unwrap()
            .stop_failures
            .insert(instance_id.to_string());
    }

    pub fn fail_spec(&self, instance_id: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .spec_failures
            .insert(instance_id.to_string(), times);
    }

    pub fn fail_start(&self, instance_id: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .start_failures
            .insert(instance_id.to_string(), times);
    }

    pub fn fail_rename(&self, instance_id: &str) {
        self.state
            .lock()
            .unwrap()
            .rename_failures
            .insert(instance_id.to_string());
    }

    /// New allocations stay out of the next `listings` address listings
    pub fn hide_new_allocations_for(&self, listings: u32) {
        self.state.lock().unwrap().hide_new_allocations_for = listings;
    }

    /// Bound addresses keep showing as available for the next `listings`
    /// address listings
    pub fn lag_associations(&self, listings: u32) {
        self.state.lock().unwrap().association_lag = listings;
    }

    // Inspection

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn allocate_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Allocate))
            .count()
    }

    /// Every associate call in order, including failed attempts
    pub fn associate_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Associate {
                    allocation_id,
                    instance_id,
                } => Some((allocation_id, instance_id)),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Release { allocation_id } => Some(allocation_id),
                _ => None,
            })
            .collect()
    }

    pub fn removed_from_package(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RemoveFromPackage {
                    allocation_id,
                    package_id,
                } => Some((allocation_id, package_id)),
                _ => None,
            })
            .collect()
    }

    /// Instance id -> allocation id for every bound address
    pub fn bindings(&self) -> HashMap<String, String> {
        self.state
            .lock()
            .unwrap()
            .addresses
            .iter()
            .filter_map(|a| {
                a.bound_to
                    .as_ref()
                    .map(|i| (i.clone(), a.allocation_id.clone()))
            })
            .collect()
    }

    /// Unbound addresses still held by the account
    pub fn unbound_addresses(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .addresses
            .iter()
            .filter(|a| a.bound_to.is_none())
            .map(|a| a.allocation_id.clone())
            .collect()
    }

    /// Unbound addresses that are still members of a bandwidth package
    pub fn idle_package_members(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .addresses
            .iter()
            .filter(|a| a.bound_to.is_none() && a.package.is_some())
            .map(|a| a.allocation_id.clone())
            .collect()
    }

    pub fn instance(&self, id: &str) -> Option<Instance> {
        self.state
            .lock()
            .unwrap()
            .instances
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait::async_trait]
impl ComputeService for FakeCloud {
    async fn describe_instances(
        &self,
        query: &InstanceQuery,
        page: PageRequest,
    ) -> Result<Page<Instance>> {
        self.record(Call::DescribeInstances {
            page: page.number,
            size: page.size,
        });
        let state = self.state.lock().unwrap();
        if state.instance_page_faults.contains(&page.number) {
            return Err(Error::http(format!("instance page {} timed out", page.number)));
        }

        let tag = (query.selector.key.clone(), query.selector.value.clone());
        let matching: Vec<Instance> = state
            .instances
            .iter()
            .filter(|i| i.tags.contains(&tag))
            .filter(|i| !query.running_only || i.status == InstanceStatus::Running)
            .cloned()
            .collect();

        Ok(slice_page(matching, page))
    }

    async fn modify_instance_name(&self, instance_id: &str, name: &str) -> Result<()> {
        self.record(Call::ModifyName {
            instance_id: instance_id.to_string(),
            name: name.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.rename_failures.contains(instance_id) {
            return Err(Error::api("InvalidInstanceName.Malformed", "bad name", "req-1", 400));
        }
        let instance = find_instance(&mut state, instance_id)?;
        instance.name = name.to_string();
        Ok(())
    }

    async fn modify_instance_spec(&self, instance_id: &str, instance_type: &str) -> Result<()> {
        self.record(Call::ModifySpec {
            instance_id: instance_id.to_string(),
            instance_type: instance_type.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if take_failure(&mut state.spec_failures, instance_id) {
            return Err(Error::api(
                "IncorrectInstanceStatus",
                "instance is still stopping",
                "req-2",
                403,
            ));
        }
        find_instance(&mut state, instance_id)?;
        Ok(())
    }

    async fn start_instance(&self, instance_id: &str) -> Result<()> {
        self.record(Call::Start {
            instance_id: instance_id.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if take_failure(&mut state.start_failures, instance_id) {
            return Err(Error::api(
                "IncorrectInstanceStatus",
                "spec change in progress",
                "req-3",
                403,
            ));
        }
        find_instance(&mut state, instance_id)?.status = InstanceStatus::Running;
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        self.record(Call::Stop {
            instance_id: instance_id.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.stop_failures.contains(instance_id) {
            return Err(Error::http("connection reset"));
        }
        let instance = find_instance(&mut state, instance_id)?;
        if instance.status == InstanceStatus::Stopped {
            return Err(Error::api(
                "IncorrectInstanceStatus",
                "instance is already stopped",
                "req-7",
                403,
            ));
        }
        instance.status = InstanceStatus::Stopped;
        Ok(())
    }

    fn service_name(&self) -> &'static str {
        "fake-compute"
    }
}

#[async_trait::async_trait]
impl AddressService for FakeCloud {
    async fn describe_addresses(
        &self,
        status: &AddressStatus,
        page: PageRequest,
    ) -> Result<Page<Address>> {
        self.record(Call::DescribeAddresses {
            page: page.number,
            size: page.size,
        });
        let mut state = self.state.lock().unwrap();
        if state.address_page_faults.contains(&page.number) {
            return Err(Error::http(format!("address page {} timed out", page.number)));
        }

        let matching: Vec<Address> = state
            .addresses
            .iter()
            .filter(|a| a.hidden_listings == 0)
            .map(|a| Address {
                allocation_id: a.allocation_id.clone(),
                ip: a.ip,
                status: if a.bound_to.is_some() && a.stale_listings == 0 {
                    AddressStatus::InUse
                } else {
                    AddressStatus::Available
                },
                bandwidth_package_id: a.package.clone(),
            })
            .filter(|a| &a.status == status)
            .collect();

        if page.number == 1 {
            for address in state.addresses.iter_mut() {
                address.hidden_listings = address.hidden_listings.saturating_sub(1);
                address.stale_listings = address.stale_listings.saturating_sub(1);
            }
        }

        Ok(slice_page(matching, page))
    }

    async fn allocate_address(&self, _params: &AllocationParams) -> Result<AllocatedAddress> {
        self.record(Call::Allocate);
        let mut state = self.state.lock().unwrap();
        if state.allocate_failures > 0 {
            state.allocate_failures -= 1;
            return Err(Error::api(
                "QuotaExceeded.Eip",
                "address quota exceeded",
                "req-4",
                400,
            ));
        }

        state.next_allocation += 1;
        let n = state.next_allocation;
        let allocation_id = format!("eip-new-{}", n);
        let ip = IpAddr::from([47, 100, 0, n as u8]);
        let hidden_listings = state.hide_new_allocations_for;
        state.addresses.push(FakeAddress {
            allocation_id: allocation_id.clone(),
            ip,
            bound_to: None,
            package: None,
            hidden_listings,
            stale_listings: 0,
        });

        Ok(AllocatedAddress {
            allocation_id,
            ip: Some(ip),
        })
    }

    async fn associate_address(&self, allocation_id: &str, instance_id: &str) -> Result<()> {
        self.record(Call::Associate {
            allocation_id: allocation_id.to_string(),
            instance_id: instance_id.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if take_failure(&mut state.associate_failures, allocation_id) {
            return Err(Error::api(
                "IncorrectEipStatus",
                "address is not ready",
                "req-5",
                403,
            ));
        }

        let lag = state.association_lag;
        let address = find_address(&mut state, allocation_id)?;
        if address.bound_to.is_some() {
            return Err(Error::api(
                "InvalidAssociation.Duplicated",
                "address already bound",
                "req-6",
                400,
            ));
        }
        address.bound_to = Some(instance_id.to_string());
        address.stale_listings = lag;
        let ip = address.ip;
        find_instance(&mut state, instance_id)?.eip = Some(ip);
        Ok(())
    }

    async fn release_address(&self, allocation_id: &str) -> Result<()> {
        self.record(Call::Release {
            allocation_id: allocation_id.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.release_failures.contains(allocation_id) {
            return Err(Error::http("release timed out"));
        }
        let before = state.addresses.len();
        state.addresses.retain(|a| a.allocation_id != allocation_id);
        if state.addresses.len() == before {
            return Err(Error::not_found(allocation_id.to_string()));
        }
        Ok(())
    }

    async fn add_to_bandwidth_package(
        &self,
        allocation_id: &str,
        bandwidth_package_id: &str,
    ) -> Result<()> {
        self.record(Call::AddToPackage {
            allocation_id: allocation_id.to_string(),
            package_id: bandwidth_package_id.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.add_to_package_failures.contains(allocation_id) {
            return Err(Error::http("package registration timed out"));
        }
        find_address(&mut state, allocation_id)?.package = Some(bandwidth_package_id.to_string());
        Ok(())
    }

    async fn remove_from_bandwidth_package(
        &self,
        allocation_id: &str,
        bandwidth_package_id: &str,
    ) -> Result<()> {
        self.record(Call::RemoveFromPackage {
            allocation_id: allocation_id.to_string(),
            package_id: bandwidth_package_id.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.remove_failures.contains(allocation_id) {
            return Err(Error::http("package removal timed out"));
        }
        let address = find_address(&mut state, allocation_id)?;
        if address.package.as_deref() != Some(bandwidth_package_id) {
            return Err(Error::not_found(format!(
                "{} is not in {}",
                allocation_id, bandwidth_package_id
            )));
        }
        address.package = None;
        Ok(())
    }

    fn service_name(&self) -> &'static str {
        "fake-vpc"
    }
}

fn slice_page<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total_count = items.len() as u64;
    let size = page.size.max(1) as usize;
    let start = (page.number.saturating_sub(1) as usize) * size;
    let items = items.into_iter().skip(start).take(size).collect();

    Page {
        items,
        total_count,
        page_number: page.number,
        page_size: page.size,
    }
}

fn take_failure(failures: &mut HashMap<String, u32>, id: &str) -> bool {
    match failures.get_mut(id) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

fn find_instance<'a>(state: &'a mut State, id: &str) -> Result<&'a mut Instance> {
    state
        .instances
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| Error::not_found(format!("instance {}", id)))
}

fn find_address<'a>(state: &'a mut State, id: &str) -> Result<&'a mut FakeAddress> {
    state
        .addresses
        .iter_mut()
        .find(|a| a.allocation_id == id)
        .ok_or_else(|| Error::not_found(format!("address {}", id)))
}

/// A running instance tagged with the default selector
pub fn tagged_instance(n: usize, eip: Option<IpAddr>) -> Instance {
    Instance {
        id: format!("i-{:03}", n),
        name: format!("launch-{}", n),
        status: InstanceStatus::Running,
        tags: vec![(TAG_KEY.to_string(), TAG_VALUE.to_string())],
        private_ip: Some(IpAddr::from([172, 16, 0, n as u8])),
        public_ips: Vec::new(),
        eip,
    }
}

pub fn selector() -> TagSelector {
    TagSelector::new(TAG_KEY, TAG_VALUE)
}

/// Default configuration with a zero-delay bind policy
pub fn config() -> ReconcileConfig {
    ReconcileConfig::new(selector(), PACKAGE)
        .with_bind_retry(RetryPolicy::fixed(5, Duration::ZERO))
}
