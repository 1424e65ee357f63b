//! Surplus reclaimer
//!
//! Everything still available after binding is surplus: it leaves the
//! bandwidth package and is released. Both steps are best-effort per
//! address.

use crate::engine::pool::available_addresses;
use crate::engine::report::{ItemFailure, Step};
use crate::traits::AddressService;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of one reclaim run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimOutcome {
    /// Allocation ids that were released
    pub released: Vec<String>,
    /// Removal or release steps that failed
    pub failures: Vec<ItemFailure>,
    /// Listing pages that failed during the re-query
    pub failed_pages: u32,
}

/// Re-query the pool and release every available address
///
/// An address reported as a member of a bandwidth package is removed from
/// that package first; one reported without membership goes straight to
/// release. Release is attempted even if the removal failed.
///
/// Addresses in `just_bound` are never touched: a listing may still report
/// an address as available right after it was associated.
pub async fn reclaim_surplus(
    addresses: &dyn AddressService,
    bandwidth_package_id: &str,
    page_size: u32,
    just_bound: &HashSet<&str>,
) -> ReclaimOutcome {
    let mut surplus = available_addresses(addresses, page_size).await;
    surplus.items.retain(|address| {
        let bound = just_bound.contains(address.allocation_id.as_str());
        if bound {
            debug!(
                "Address {} is listed as available but was bound this pass, keeping it",
                address.allocation_id
            );
        }
        !bound
    });
    let mut outcome = ReclaimOutcome {
        failed_pages: surplus.failed_pages,
        ..ReclaimOutcome::default()
    };

    if surplus.items.is_empty() {
        info!("No surplus addresses to reclaim");
        return outcome;
    }

    info!("Reclaiming {} surplus address(es)", surplus.items.len());

    for address in &surplus.items {
        info!("Releasing surplus address {} ({})", address.ip, address.allocation_id);

        match address.bandwidth_package_id.as_deref() {
            Some(package_id) => {
                if package_id != bandwidth_package_id {
                    warn!(
                        "Address {} belongs to bandwidth package {}, not {}; removing it from {}",
                        address.allocation_id, package_id, bandwidth_package_id, package_id
                    );
                }

                if let Err(e) = addresses
                    .remove_from_bandwidth_package(&address.allocation_id, package_id)
                    .await
                {
                    warn!(
                        "Could not remove {} from bandwidth package {}: {}",
                        address.allocation_id, package_id, e
                    );
                    outcome.failures.push(ItemFailure::new(
                        address.allocation_id.clone(),
                        Step::LeaveBandwidthPackage,
                        &e,
                    ));
                }
            }
            None => debug!(
                "Address {} is not in a bandwidth package",
                address.allocation_id
            ),
        }

        match addresses.release_address(&address.allocation_id).await {
            Ok(()) => outcome.released.push(address.allocation_id.clone()),
            Err(e) => {
                warn!("Could not release {}: {}", address.allocation_id, e);
                outcome.failures.push(ItemFailure::new(
                    address.allocation_id.clone(),
                    Step::Release,
                    &e,
                ));
            }
        }
    }

    outcome
}
