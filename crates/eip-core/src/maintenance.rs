//! Fleet maintenance routines
//!
//! Sequential per-instance commands over the tagged fleet. They reuse
//! discovery and the retry policy but are otherwise independent of the
//! reconciliation pass.

use crate::config::TagSelector;
use crate::engine::discovery::discover_instances;
use crate::engine::report::{ItemFailure, Step};
use crate::retry::RetryPolicy;
use crate::traits::{ComputeService, InstanceQuery, InstanceStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of one maintenance routine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Instance ids the routine completed for
    pub succeeded: Vec<String>,
    /// Instances the routine gave up on
    pub failed: Vec<ItemFailure>,
    /// Listing pages that failed
    pub failed_pages: u32,
}

impl MaintenanceReport {
    /// True when every discovered instance succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.failed_pages == 0
    }
}

/// Stop, re-size and start every tagged instance
///
/// Instances already stopped go straight to the spec change; the service
/// rejects a stop for them. A failed stop skips the instance. The spec
/// change and the start run
/// under `status_wait`, since the previous step completes asynchronously
/// and the service rejects the call until it has.
pub async fn resize_fleet(
    compute: &dyn ComputeService,
    selector: &TagSelector,
    instance_type: &str,
    page_size: u32,
    status_wait: &RetryPolicy,
) -> MaintenanceReport {
    let query = InstanceQuery::tagged(selector.clone());
    let fleet = discover_instances(compute, &query, page_size).await;
    let mut report = MaintenanceReport {
        failed_pages: fleet.failed_pages,
        ..MaintenanceReport::default()
    };

    info!(
        "Resizing {} instance(s) tagged {} to {}",
        fleet.items.len(),
        selector,
        instance_type
    );

    for instance in &fleet.items {
        let id = instance.id.as_str();

        if instance.status == InstanceStatus::Stopped {
            debug!("{} is already stopped", id);
        } else if let Err(e) = compute.stop_instance(id).await {
            warn!("Could not stop {}, skipping: {}", id, e);
            report
                .failed
                .push(ItemFailure::new(id, Step::StopInstance, &e));
            continue;
        }

        let modify = status_wait
            .run(&format!("modify spec of {}", id), move |_| async move {
                compute.modify_instance_spec(id, instance_type).await
            })
            .await;
        if let Err(e) = modify {
            warn!("Could not change {} to {}: {}", id, instance_type, e);
            report
                .failed
                .push(ItemFailure::new(id, Step::ModifyInstanceSpec, &e));
            continue;
        }

        let start = status_wait
            .run(&format!("start {}", id), move |_| async move {
                compute.start_instance(id).await
            })
            .await;
        match start {
            Ok(()) => {
                info!("Resized {} ({}) to {}", id, instance.name, instance_type);
                report.succeeded.push(id.to_string());
            }
            Err(e) => {
                warn!("Could not start {} after resize: {}", id, e);
                report
                    .failed
                    .push(ItemFailure::new(id, Step::StartInstance, &e));
            }
        }
    }

    report
}

/// Rename every tagged instance to `<prefix><n>`, counting from `start_index`
///
/// Numbers follow listing order and are consumed even when a rename
/// fails, so a rerun yields the same name for the same position.
pub async fn rename_fleet(
    compute: &dyn ComputeService,
    selector: &TagSelector,
    prefix: &str,
    start_index: u32,
    page_size: u32,
) -> MaintenanceReport {
    let query = InstanceQuery::tagged(selector.clone());
    let fleet = discover_instances(compute, &query, page_size).await;
    let mut report = MaintenanceReport {
        failed_pages: fleet.failed_pages,
        ..MaintenanceReport::default()
    };

    for (index, instance) in (start_index..).zip(fleet.items.iter()) {
        let name = format!("{}{}", prefix, index);

        match compute.modify_instance_name(&instance.id, &name).await {
            Ok(()) => {
                info!(
                    "Renamed {} to {} (private {}, eip {})",
                    instance.id,
                    name,
                    display_ip(instance.private_ip),
                    display_ip(instance.eip)
                );
                report.succeeded.push(instance.id.clone());
            }
            Err(e) => {
                warn!("Could not rename {} to {}: {}", instance.id, name, e);
                report.failed.push(ItemFailure::new(
                    instance.id.clone(),
                    Step::RenameInstance,
                    &e,
                ));
            }
        }
    }

    report
}

fn display_ip(ip: Option<std::net::IpAddr>) -> String {
    ip.map(|ip| ip.to_string()).unwrap_or_else(|| "-".to_string())
}
