// # eip-reconcile - One-shot EIP reconciliation
//
// This binary is a THIN integration layer:
// - DO NOT add reconciliation, pagination or retry logic here
// - All of that lives in eip-core
// - Configuration is via environment variables ONLY
//
// It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the Alibaba Cloud provider
// 4. Running exactly one task and mapping its outcome to an exit code
//
// ## Configuration
//
// ### Credentials (required)
// - `REGION_ID`, `ACCESS_KEY_ID`, `ACCESS_KEY_SECRET`
//
// ### Task
// - `EIPR_TASK`: associate (default), resize, rename
// - `EIPR_TAG_KEY`, `EIPR_TAG_VALUE`: Fleet selector (required)
//
// ### Associate
// - `EIPR_BANDWIDTH_PACKAGE_ID`: Shared bandwidth package (required)
// - `EIPR_ISP`, `EIPR_CHARGE_TYPE`, `EIPR_BANDWIDTH_MBPS`: Allocation parameters
// - `EIPR_RUNNING_ONLY`: Only reconcile running instances (default true)
// - `EIPR_BIND_MAX_ATTEMPTS`, `EIPR_BIND_RETRY_DELAY_MS`: Bind retry policy
// - `EIPR_BIND_MAX_DELAY_MS`: Switches to doubling delays capped at this value
//
// ### Resize / Rename
// - `EIPR_RESIZE_INSTANCE_TYPE`: Target instance type (resize)
// - `EIPR_RENAME_PREFIX`, `EIPR_RENAME_START`: Name scheme (rename)
//
// ### General
// - `EIPR_PAGE_SIZE`: Listing page size, 1..=100 (default 50)
// - `EIPR_MODE`: dry-run or live (default live)
// - `EIPR_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `EIPR_ECS_ENDPOINT`, `EIPR_VPC_ENDPOINT`: Endpoint overrides
//
// ## Example
//
// ```bash
// export REGION_ID=cn-hangzhou
// export ACCESS_KEY_ID=...
// export ACCESS_KEY_SECRET=...
// export EIPR_TAG_KEY=rnode
// export EIPR_TAG_VALUE=true
// export EIPR_BANDWIDTH_PACKAGE_ID=cbwp-xxxxxxxx
//
// eip-reconcile
// ```

mod settings;

use anyhow::Result;
use eip_core::{MaintenanceReport, PassReport, Reconciler, RetryPolicy};
use eip_provider_aliyun::AliyunProvider;
use settings::{Settings, Task};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different outcomes
///
/// - 0: Task finished without any failure
/// - 1: Configuration error, nothing was called
/// - 2: Runtime setup error
/// - 3: Task finished with partial failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReconcileExitCode {
    Clean = 0,
    ConfigError = 1,
    RuntimeError = 2,
    PartialFailure = 3,
}

impl From<ReconcileExitCode> for ExitCode {
    fn from(code: ReconcileExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ReconcileExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ReconcileExitCode::RuntimeError.into();
    }

    let provider = match AliyunProvider::new(settings.aliyun.clone(), settings.dry_run) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("Provider configuration error: {}", e);
            return ReconcileExitCode::ConfigError.into();
        }
    };

    info!(
        "Starting eip-reconcile: task {} in {} [mode: {}]",
        settings.task.name(),
        settings.aliyun.region_id,
        if provider.is_dry_run() { "DRY-RUN" } else { "LIVE" }
    );

    // Strictly sequential; one thread is all a pass needs
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ReconcileExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(run_task(provider, settings.task));

    match result {
        Ok(true) => ReconcileExitCode::Clean.into(),
        Ok(false) => {
            warn!("Finished with partial failure");
            ReconcileExitCode::PartialFailure.into()
        }
        Err(e) => {
            error!("Task could not run: {:#}", e);
            ReconcileExitCode::ConfigError.into()
        }
    }
}

/// Run the configured task; `Ok(true)` when it finished cleanly
async fn run_task(provider: Arc<AliyunProvider>, task: Task) -> Result<bool> {
    match task {
        Task::Associate(config) => {
            let reconciler = Reconciler::new(provider.clone(), provider, config)?;
            let report = reconciler.run_pass().await;
            log_pass_report(&report);
            Ok(report.is_clean())
        }
        Task::Resize {
            selector,
            instance_type,
            page_size,
        } => {
            let report = eip_core::resize_fleet(
                provider.as_ref(),
                &selector,
                &instance_type,
                page_size,
                &RetryPolicy::status_wait_default(),
            )
            .await;
            log_maintenance_report("resize", &report);
            Ok(report.is_clean())
        }
        Task::Rename {
            selector,
            prefix,
            start_index,
            page_size,
        } => {
            let report =
                eip_core::rename_fleet(provider.as_ref(), &selector, &prefix, start_index, page_size)
                    .await;
            log_maintenance_report("rename", &report);
            Ok(report.is_clean())
        }
    }
}

fn log_pass_report(report: &PassReport) {
    match serde_json::to_string(report) {
        Ok(line) => info!(target: "eip_reconcile::report", "{}", line),
        Err(e) => error!("Failed to serialize pass report: {}", e),
    }
}

fn log_maintenance_report(task: &str, report: &MaintenanceReport) {
    info!(
        "{} finished: {} succeeded, {} failed",
        task,
        report.succeeded.len(),
        report.failed.len()
    );
    match serde_json::to_string(report) {
        Ok(line) => info!(target: "eip_reconcile::report", "{}", line),
        Err(e) => error!("Failed to serialize {} report: {}", task, e),
    }
}
