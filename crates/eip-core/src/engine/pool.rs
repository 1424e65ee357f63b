//! Address pool query
//!
//! Always a fresh listing; the pool is never cached between steps.

use crate::pagination::{Collected, PageRequest, collect_pages};
use crate::traits::{Address, AddressService, AddressStatus};
use tracing::info;

/// List every address currently in the `Available` state
pub async fn available_addresses(
    addresses: &dyn AddressService,
    page_size: u32,
) -> Collected<Address> {
    let status = &AddressStatus::Available;

    let collected = collect_pages(
        "available addresses",
        PageRequest::first(page_size),
        move |page| async move { addresses.describe_addresses(status, page).await },
    )
    .await;

    info!("Address pool has {} available address(es)", collected.items.len());

    collected
}
