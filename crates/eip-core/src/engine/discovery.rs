//! Fleet discovery
//!
//! Lists every instance carrying the tag, page by page, and applies the
//! public-address filter to each page as it arrives.

use crate::pagination::{Collected, PageRequest, collect_pages};
use crate::traits::{ComputeService, Instance, InstanceQuery};
use tracing::info;

/// List all instances matching `query`
///
/// Order follows the service's listing order. Failed pages are logged and
/// contribute nothing, so the result may undercount.
pub async fn discover_instances(
    compute: &dyn ComputeService,
    query: &InstanceQuery,
    page_size: u32,
) -> Collected<Instance> {
    let label = format!("instances tagged {}", query.selector);

    let collected = collect_pages(
        &label,
        PageRequest::first(page_size),
        move |page| async move {
            let mut page = compute.describe_instances(query, page).await?;
            page.items.retain(|instance| query.admits(instance));
            Ok::<_, crate::Error>(page)
        },
    )
    .await;

    info!(
        "Discovered {} instance(s) tagged {} (filter: {:?}, running only: {})",
        collected.items.len(),
        query.selector,
        query.filter,
        query.running_only
    );

    collected
}
