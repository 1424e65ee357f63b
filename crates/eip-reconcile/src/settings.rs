//! Environment configuration
//!
//! Every variable is read exactly once, here, through a lookup function so
//! parsing can be tested without touching the process environment.

use anyhow::{Context, Result, bail};
use eip_core::config::MAX_PAGE_SIZE;
use eip_core::{
    AllocationParams, DiscoveryConfig, InternetChargeType, ReconcileConfig, RetryPolicy,
    TagSelector,
};
use eip_provider_aliyun::AliyunConfig;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// The one task a run performs
#[derive(Debug, Clone)]
pub enum Task {
    /// Reconcile EIPs for the tagged fleet
    Associate(ReconcileConfig),
    /// Stop, re-size and start every tagged instance
    Resize {
        selector: TagSelector,
        instance_type: String,
        page_size: u32,
    },
    /// Rename every tagged instance to `<prefix><n>`
    Rename {
        selector: TagSelector,
        prefix: String,
        start_index: u32,
        page_size: u32,
    },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Associate(_) => "associate",
            Task::Resize { .. } => "resize",
            Task::Rename { .. } => "rename",
        }
    }
}

/// Validated process configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub aliyun: AliyunConfig,
    pub dry_run: bool,
    pub log_level: Level,
    pub task: Task,
}

impl Settings {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).with_context(|| format!("{} is required. Set it via: export {}=...", name, name))
        };

        let mut aliyun = AliyunConfig::new(
            require("REGION_ID")?,
            require("ACCESS_KEY_ID")?,
            require("ACCESS_KEY_SECRET")?,
        );
        aliyun.ecs_endpoint = get("EIPR_ECS_ENDPOINT");
        aliyun.vpc_endpoint = get("EIPR_VPC_ENDPOINT");

        let dry_run = match get("EIPR_MODE").map(|m| m.to_lowercase()) {
            None => false,
            Some(mode) if mode == "dry-run" => true,
            Some(mode) if mode == "live" => false,
            Some(mode) => bail!("EIPR_MODE '{}' is not valid. Valid modes: dry-run, live", mode),
        };

        let log_level = parse_log_level(get("EIPR_LOG_LEVEL").as_deref().unwrap_or("info"))?;

        let page_size: u32 =
            parse_in_range(get("EIPR_PAGE_SIZE"), "EIPR_PAGE_SIZE", 1..=MAX_PAGE_SIZE, 50)?;

        let task_name = get("EIPR_TASK").unwrap_or_else(|| "associate".to_string());
        let task = match task_name.to_lowercase().as_str() {
            "associate" => {
                let selector = TagSelector::new(require("EIPR_TAG_KEY")?, require("EIPR_TAG_VALUE")?);

                let internet_charge_type = match get("EIPR_CHARGE_TYPE") {
                    None => InternetChargeType::default(),
                    Some(raw) => InternetChargeType::parse(&raw).with_context(|| {
                        format!(
                            "EIPR_CHARGE_TYPE '{}' is not valid. Valid types: PayByTraffic, PayByBandwidth",
                            raw
                        )
                    })?,
                };
                let allocation = AllocationParams {
                    isp: get("EIPR_ISP").unwrap_or_else(|| AllocationParams::default().isp),
                    internet_charge_type,
                    bandwidth_mbps: get("EIPR_BANDWIDTH_MBPS")
                        .map(|raw| parse_number::<u32>(&raw, "EIPR_BANDWIDTH_MBPS"))
                        .transpose()?,
                };

                let running_only = match get("EIPR_RUNNING_ONLY") {
                    None => true,
                    Some(raw) => parse_bool(&raw, "EIPR_RUNNING_ONLY")?,
                };

                let max_attempts: u32 =
                    parse_in_range(get("EIPR_BIND_MAX_ATTEMPTS"), "EIPR_BIND_MAX_ATTEMPTS", 1..=20, 5)?;
                let delay_ms: u64 = parse_in_range(
                    get("EIPR_BIND_RETRY_DELAY_MS"),
                    "EIPR_BIND_RETRY_DELAY_MS",
                    0..=60_000,
                    1_000,
                )?;
                let bind_retry = match get("EIPR_BIND_MAX_DELAY_MS") {
                    None => RetryPolicy::fixed(max_attempts, Duration::from_millis(delay_ms)),
                    Some(raw) => {
                        let max_delay_ms: u64 =
                            parse_in_range(Some(raw), "EIPR_BIND_MAX_DELAY_MS", 0..=300_000, 0)?;
                        RetryPolicy::exponential(
                            max_attempts,
                            Duration::from_millis(delay_ms),
                            Duration::from_millis(max_delay_ms),
                        )
                    }
                };

                let config = ReconcileConfig::new(selector, require("EIPR_BANDWIDTH_PACKAGE_ID")?)
                    .with_allocation(allocation)
                    .with_discovery(DiscoveryConfig {
                        page_size,
                        running_only,
                    })
                    .with_bind_retry(bind_retry);
                config.validate()?;

                Task::Associate(config)
            }
            "resize" => Task::Resize {
                selector: TagSelector::new(require("EIPR_TAG_KEY")?, require("EIPR_TAG_VALUE")?),
                instance_type: require("EIPR_RESIZE_INSTANCE_TYPE")?,
                page_size,
            },
            "rename" => Task::Rename {
                selector: TagSelector::new(require("EIPR_TAG_KEY")?, require("EIPR_TAG_VALUE")?),
                prefix: get("EIPR_RENAME_PREFIX").unwrap_or_else(|| "rnode".to_string()),
                start_index: parse_number(&require("EIPR_RENAME_START")?, "EIPR_RENAME_START")?,
                page_size,
            },
            other => bail!(
                "EIPR_TASK '{}' is not supported. Supported tasks: associate, resize, rename",
                other
            ),
        };

        Ok(Self {
            aliyun,
            dry_run,
            log_level,
            task,
        })
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "EIPR_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

fn parse_bool(raw: &str, name: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => bail!("{} must be true or false. Got: {}", name, raw),
    }
}

fn parse_number<T>(raw: &str, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} must be a number. Got: {}", name, raw))
}

fn parse_in_range<T>(
    raw: Option<String>,
    name: &str,
    range: std::ops::RangeInclusive<T>,
    default: T,
) -> Result<T>
where
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = raw else {
        return Ok(default);
    };

    let value: T = parse_number(&raw, name)?;
    if !range.contains(&value) {
        bail!(
            "{} must be between {} and {}. Got: {}",
            name,
            range.start(),
            range.end(),
            value
        );
    }
    Ok(value)
}
