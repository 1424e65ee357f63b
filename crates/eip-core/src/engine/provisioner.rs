//! Capacity provisioner
//!
//! Allocates addresses one at a time and registers each one into the shared
//! bandwidth package. Every allocation is independent: a failure is
//! recorded and the remaining allocations still run.

use crate::config::AllocationParams;
use crate::engine::report::{ItemFailure, Step};
use crate::traits::AddressService;
use tracing::{info, warn};

/// Outcome of one provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// Allocation ids allocated and registered into the package
    pub provisioned: Vec<String>,
    /// Allocations or registrations that failed
    pub failures: Vec<ItemFailure>,
}

/// Allocate `count` addresses and add each to `bandwidth_package_id`
///
/// An address that was allocated but could not join the package is still
/// allocated; it is reported as a failure and left for the reclaimer.
pub async fn provision(
    addresses: &dyn AddressService,
    count: usize,
    params: &AllocationParams,
    bandwidth_package_id: &str,
) -> ProvisionOutcome {
    let mut outcome = ProvisionOutcome::default();

    if count == 0 {
        return outcome;
    }

    info!(
        "Provisioning {} address(es) (ISP {}, {}) into {}",
        count,
        params.isp,
        params.internet_charge_type.as_str(),
        bandwidth_package_id
    );

    for n in 1..=count {
        let allocated = match addresses.allocate_address(params).await {
            Ok(allocated) => allocated,
            Err(e) => {
                warn!("Allocation {}/{} failed: {}", n, count, e);
                outcome
                    .failures
                    .push(ItemFailure::new(format!("allocation #{}", n), Step::Allocate, &e));
                continue;
            }
        };

        if let Err(e) = addresses
            .add_to_bandwidth_package(&allocated.allocation_id, bandwidth_package_id)
            .await
        {
            warn!(
                "Address {} could not join bandwidth package {}: {}",
                allocated.allocation_id, bandwidth_package_id, e
            );
            outcome.failures.push(ItemFailure::new(
                allocated.allocation_id,
                Step::JoinBandwidthPackage,
                &e,
            ));
            continue;
        }

        info!(
            "Provisioned {}/{}: {} ({})",
            n,
            count,
            allocated.allocation_id,
            allocated
                .ip
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "ip pending".to_string())
        );
        outcome.provisioned.push(allocated.allocation_id);
    }

    outcome
}
