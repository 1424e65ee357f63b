// # eip-core
//
// Core library for the single-pass EIP reconciler.
//
// ## Architecture Overview
//
// This library brings a tagged fleet of compute instances to exactly one
// elastic public address each:
// - **ComputeService**: Trait for listing and commanding instances
// - **AddressService**: Trait for the address lifecycle and bandwidth package membership
// - **Reconciler**: Orchestrates discover → provision → bind → reclaim
// - **RetryPolicy**: Bounded retry, owned by the core and reused per operation
// - **collect_pages**: Ceiling-division pagination over any listing
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Providers make single remote calls; policy lives here
// 2. **No Local Truth**: Every read re-queries the remote service
// 3. **Best-Effort Items**: Per-item failures are recorded, never fatal to the pass
// 4. **Library-First**: The binary is a thin layer over this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod pagination;
pub mod retry;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    AllocationParams, DiscoveryConfig, InternetChargeType, ReconcileConfig, TagSelector,
};
pub use engine::{PassReport, Reconciler};
pub use error::{Error, Result};
pub use maintenance::{MaintenanceReport, rename_fleet, resize_fleet};
pub use pagination::{Page, PageRequest};
pub use retry::RetryPolicy;
pub use traits::{AddressService, ComputeService};
