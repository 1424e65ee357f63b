//! Reconciliation engine
//!
//! The Reconciler brings a tagged fleet to one elastic address per instance
//! in a single pass:
//! - Discovers tagged instances that have no public address
//! - Queries the available address pool
//! - Provisions the deficit into the shared bandwidth package
//! - Binds addresses to instances by position
//! - Reclaims whatever is still available afterwards
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐          ┌────────────────┐
//! │ ComputeService │          │ AddressService │
//! └────────────────┘          └────────────────┘
//!         │                           │
//!         ▼                           ▼
//! ┌────────────────┐          ┌────────────────┐
//! │   discovery    │          │      pool      │
//! └────────────────┘          └────────────────┘
//!         │                           │
//!         └─────────────┬─────────────┘
//!                       ▼
//!              ┌────────────────┐
//!              │   Reconciler   │── deficit > 0 ──▶ provisioner
//!              └────────────────┘
//!                       │
//!         ┌─────────────┴─────────────┐
//!         ▼                           ▼
//! ┌────────────────┐          ┌────────────────┐
//! │     binder     │          │   reclaimer    │
//! │ (retry policy) │          │ (leave, free)  │
//! └────────────────┘          └────────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Discover unbound instances for the tag selector
//! 2. Query available addresses
//! 3. `deficit = max(unbound - available, 0)`
//! 4. If `deficit > 0`, provision it and re-query the pool
//! 5. Pair `instance[i]` with `address[i]` and bind each pair
//! 6. Reclaim every address still available, except those bound in step 5
//!
//! Every step runs to completion. Per-item failures are logged, recorded in
//! the [`PassReport`] and skipped.

pub mod binder;
pub mod discovery;
pub mod pool;
pub mod provisioner;
pub mod reclaimer;
pub mod report;

pub use report::{BindFailure, Binding, ItemFailure, PassReport, Step};

use crate::config::ReconcileConfig;
use crate::error::{Error, Result};
use crate::traits::{AddressService, ComputeService, InstanceQuery};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single-pass EIP reconciler
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run_pass()`] once
/// 3. Inspect the returned [`PassReport`]
///
/// Running the pass again starts from scratch; nothing is carried over.
/// Two passes must not run concurrently against the same selector.
pub struct Reconciler {
    /// Instance listing
    compute: Arc<dyn ComputeService>,

    /// Address lifecycle and bandwidth package membership
    addresses: Arc<dyn AddressService>,

    /// Immutable pass configuration
    config: ReconcileConfig,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `compute`: Compute service implementation
    /// - `addresses`: Address service implementation
    /// - `config`: Reconciliation configuration
    ///
    /// # Returns
    ///
    /// `Err(Error::Config)` if the configuration is invalid
    pub fn new(
        compute: Arc<dyn ComputeService>,
        addresses: Arc<dyn AddressService>,
        config: ReconcileConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            compute,
            addresses,
            config,
        })
    }

    /// The configuration this reconciler runs with
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run one reconciliation pass
    ///
    /// Never fails as a whole: remote errors are confined to the item or
    /// page they hit and show up in the report.
    pub async fn run_pass(&self) -> PassReport {
        let config = &self.config;
        let page_size = config.discovery.page_size;
        let mut report = PassReport::begin(config.selector.clone());

        info!(
            "Starting reconciliation pass for {} via {} / {}",
            config.selector,
            self.compute.service_name(),
            self.addresses.service_name()
        );

        // 1. Demand
        let query = InstanceQuery::tagged(config.selector.clone())
            .running_only(config.discovery.running_only)
            .without_public_address();
        let instances = discovery::discover_instances(self.compute.as_ref(), &query, page_size).await;
        report.failed_pages += instances.failed_pages;
        report.unbound_instances = instances.items.len();

        // 2. Supply
        let mut available = pool::available_addresses(self.addresses.as_ref(), page_size).await;
        report.failed_pages += available.failed_pages;
        report.available_before = available.items.len();

        // 3. Deficit
        report.deficit = report
            .unbound_instances
            .saturating_sub(report.available_before);
        info!(
            "{} unbound instance(s), {} available address(es), deficit {}",
            report.unbound_instances, report.available_before, report.deficit
        );

        // 4. Provision and re-query
        if report.deficit > 0 {
            let outcome = provisioner::provision(
                self.addresses.as_ref(),
                report.deficit,
                &config.allocation,
                &config.bandwidth_package_id,
            )
            .await;
            report.provisioned = outcome.provisioned;
            report.provision_failures = outcome.failures;

            available = pool::available_addresses(self.addresses.as_ref(), page_size).await;
            report.failed_pages += available.failed_pages;

            if available.items.len() < report.unbound_instances {
                warn!(
                    "Only {} address(es) visible after provisioning for {} instance(s)",
                    available.items.len(),
                    report.unbound_instances
                );
            }
        }
        report.available_for_binding = available.items.len();

        // 5. Pair and bind
        let pairing = binder::pair(&instances.items, &available.items);
        debug!(
            "Bind retry schedule: {:?}",
            config.bind_retry.schedule()
        );
        if !pairing.spare.is_empty() {
            info!(
                "{} address(es) left over after pairing, reclaiming after binding",
                pairing.spare.len()
            );
        }
        for (instance, address) in &pairing.pairs {
            match binder::bind(
                self.addresses.as_ref(),
                &config.bind_retry,
                &address.allocation_id,
                &instance.id,
            )
            .await
            {
                Ok(attempts) => report.bindings.push(Binding {
                    instance_id: instance.id.clone(),
                    allocation_id: address.allocation_id.clone(),
                    ip: address.ip,
                    attempts,
                }),
                Err(e) => report.bind_failures.push(BindFailure {
                    instance_id: instance.id.clone(),
                    allocation_id: address.allocation_id.clone(),
                    attempts: exhausted_attempts(&e, config.bind_retry.max_attempts),
                    error: e.to_string(),
                }),
            }
        }
        report.unpaired_instances = pairing.unpaired.iter().map(|i| i.id.clone()).collect();
        for id in &report.unpaired_instances {
            warn!("No address left for instance {}", id);
        }

        // 6. Reclaim
        let just_bound: HashSet<&str> = report
            .bindings
            .iter()
            .map(|b| b.allocation_id.as_str())
            .collect();
        let reclaimed = reclaimer::reclaim_surplus(
            self.addresses.as_ref(),
            &config.bandwidth_package_id,
            page_size,
            &just_bound,
        )
        .await;
        report.failed_pages += reclaimed.failed_pages;
        report.reclaimed = reclaimed.released;
        report.reclaim_failures = reclaimed.failures;

        report.finished_at = Utc::now();

        info!(
            "Pass finished in {}ms: {} bound, {} bind failure(s), {} provisioned, {} reclaimed{}",
            report.elapsed().num_milliseconds(),
            report.bindings.len(),
            report.bind_failures.len(),
            report.provisioned.len(),
            report.reclaimed.len(),
            if report.is_clean() { "" } else { " (partial failure)" }
        );

        report
    }
}

fn exhausted_attempts(error: &Error, configured: u32) -> u32 {
    match error {
        Error::RetriesExhausted { attempts, .. } => *attempts,
        _ => configured,
    }
}
