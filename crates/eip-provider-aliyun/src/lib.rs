// # Alibaba Cloud Provider
//
// ECS and VPC OpenAPI implementation of the EIP reconciler's service traits.
//
// ## Implementation Status
//
// - ✅ One signed HTTP request per trait call
// - ✅ ACS3-HMAC-SHA256 signing, RPC-style parameters in the query string
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Status and error-code mapping (401/403, 404, 429, Throttling.*, 5xx)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (owned by RetryPolicy in eip-core)
// - ❌ NO page walking (owned by eip-core pagination)
// - ❌ NO caching (every pass re-queries on purpose)
//
// ## Trust Level: Untrusted
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Sleep or retry
// - ❌ Decide how many addresses to allocate or which to release
//
// ## Security Requirements
//
// - Access key secret NEVER appears in logs or Debug output
// - Credentials come from the environment only
// - Construction fails fast on empty credentials
//
// ## API Reference
//
// - ECS 2014-05-26: DescribeInstances, ModifyInstanceAttribute,
//   ModifyInstanceSpec, StartInstance, StopInstance
// - VPC 2016-04-28: DescribeEipAddresses, AllocateEipAddress,
//   AssociateEipAddress, ReleaseEipAddress, AddCommonBandwidthPackageIp,
//   RemoveCommonBandwidthPackageIp

mod models;
mod signer;

use async_trait::async_trait;
use eip_core::config::AllocationParams;
use eip_core::pagination::{Page, PageRequest};
use eip_core::traits::{
    Address, AddressService, AddressStatus, AllocatedAddress, ComputeService, Instance,
    InstanceQuery,
};
use eip_core::{Error, Result};
use models::{
    AllocateEipAddressResponse, ApiErrorBody, DescribeEipAddressesResponse,
    DescribeInstancesResponse,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_ECS_ENDPOINT: &str = "https://ecs.aliyuncs.com";
const DEFAULT_VPC_ENDPOINT: &str = "https://vpc.aliyuncs.com";
const ECS_VERSION: &str = "2014-05-26";
const VPC_VERSION: &str = "2016-04-28";

const PROVIDER: &str = "aliyun";

/// Credentials and endpoints for one region
#[derive(Clone)]
pub struct AliyunConfig {
    /// Region every call is scoped to, e.g. `cn-hangzhou`
    pub region_id: String,
    pub access_key_id: String,
    /// ⚠️ NEVER log this value
    pub access_key_secret: String,
    /// ECS endpoint override (scheme included)
    pub ecs_endpoint: Option<String>,
    /// VPC endpoint override (scheme included)
    pub vpc_endpoint: Option<String>,
}

impl AliyunConfig {
    pub fn new(
        region_id: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            ecs_endpoint: None,
            vpc_endpoint: None,
        }
    }

    /// Validate that no credential is empty
    pub fn validate(&self) -> Result<()> {
        if self.region_id.trim().is_empty() {
            return Err(Error::config("Region id cannot be empty"));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(Error::config("Access key id cannot be empty"));
        }
        if self.access_key_secret.is_empty() {
            return Err(Error::config("Access key secret cannot be empty"));
        }
        Ok(())
    }
}

// Custom Debug implementation that hides the secret
impl std::fmt::Debug for AliyunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunConfig")
            .field("region_id", &self.region_id)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("ecs_endpoint", &self.ecs_endpoint)
            .field("vpc_endpoint", &self.vpc_endpoint)
            .finish()
    }
}

/// One OpenAPI product: base URL, signed host and API version
#[derive(Debug, Clone)]
struct Endpoint {
    base: String,
    host: String,
    version: &'static str,
}

impl Endpoint {
    fn parse(raw: &str, version: &'static str) -> Result<Self> {
        let url = reqwest::Url::parse(raw)
            .map_err(|e| Error::config(format!("Invalid endpoint {}: {}", raw, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::config(format!("Endpoint {} has no host", raw)))?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            base: raw.trim_end_matches('/').to_string(),
            host,
            version,
        })
    }
}

/// Alibaba Cloud ECS + VPC provider
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Retries, pagination and continuation are
/// owned by eip-core.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform every describe call
/// - Log each mutating call with its parameters
/// - **NOT** send any mutating request
///
/// Allocations in dry-run mode return synthetic `dry-run-eip-<n>` ids.
pub struct AliyunProvider {
    config: AliyunConfig,
    ecs: Endpoint,
    vpc: Endpoint,
    client: reqwest::Client,
    dry_run: bool,
    dry_run_allocations: AtomicU32,
}

impl std::fmt::Debug for AliyunProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunProvider")
            .field("config", &self.config)
            .field("ecs", &self.ecs.base)
            .field("vpc", &self.vpc.base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl AliyunProvider {
    /// Create a new provider
    ///
    /// # Returns
    ///
    /// `Err(Error::Config)` for empty credentials or a malformed endpoint
    pub fn new(config: AliyunConfig, dry_run: bool) -> Result<Self> {
        config.validate()?;

        let ecs = Endpoint::parse(
            config.ecs_endpoint.as_deref().unwrap_or(DEFAULT_ECS_ENDPOINT),
            ECS_VERSION,
        )?;
        let vpc = Endpoint::parse(
            config.vpc_endpoint.as_deref().unwrap_or(DEFAULT_VPC_ENDPOINT),
            VPC_VERSION,
        )?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Aliyun provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            config,
            ecs,
            vpc,
            client,
            dry_run,
            dry_run_allocations: AtomicU32::new(0),
        })
    }

    /// Whether mutating calls are suppressed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send one signed RPC call and decode the response body
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut query: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        query.insert("RegionId".to_string(), self.config.region_id.clone());

        let request = signer::RequestToSign {
            method: "POST",
            host: &endpoint.host,
            action,
            version: endpoint.version,
            query: &query,
            date: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            nonce: uuid::Uuid::new_v4().to_string(),
        };
        let headers = signer::sign(
            &request,
            &self.config.access_key_id,
            &self.config.access_key_secret,
        )?;

        let url = format!("{}/?{}", endpoint.base, signer::canonical_query(&query));
        tracing::debug!("{} {} (page params: {:?})", action, endpoint.host, page_params(&query));

        let mut builder = self.client.post(&url);
        for (name, value) in &headers {
            // reqwest derives Host from the URL
            if *name != "host" {
                builder = builder.header(*name, value);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{} response unreadable: {}", action, e)))?;

        if !status.is_success() {
            return Err(map_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::provider(PROVIDER, format!("Failed to parse {} response: {}", action, e))
        })
    }

    /// A call whose response body carries nothing but a request id
    async fn mutate(
        &self,
        endpoint: &Endpoint,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<()> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would call {} with {:?}", action, params);
            return Ok(());
        }

        self.call::<serde_json::Value>(endpoint, action, params)
            .await
            .map(|_| ())
    }
}

fn page_params(query: &BTreeMap<String, String>) -> (Option<&String>, Option<&String>) {
    (query.get("PageNumber"), query.get("PageSize"))
}

/// Map a non-2xx response to a typed error
///
/// The service answers 403 both for credential problems and for state
/// conflicts like `IncorrectInstanceStatus`; only the former become
/// `Authentication`.
fn map_error(status: u16, body: &str) -> Error {
    let api: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();

    if status == 429 || api.code.starts_with("Throttling") {
        return Error::rate_limited(format!("{}: {}", api.code, api.message));
    }

    match status {
        401 => Error::auth(format!("{}: {}", api.code, api.message)),
        403 if api.code.is_empty() || is_auth_code(&api.code) => {
            Error::auth(format!("{}: {}", api.code, api.message))
        }
        404 => Error::not_found(format!("{}: {}", api.code, api.message)),
        _ if !api.code.is_empty() => Error::api(api.code, api.message, api.request_id, status),
        _ => Error::provider(PROVIDER, format!("HTTP {}: {}", status, body)),
    }
}

fn is_auth_code(code: &str) -> bool {
    code.starts_with("InvalidAccessKeyId")
        || code.starts_with("SignatureDoesNotMatch")
        || code.starts_with("IncompleteSignature")
        || code.starts_with("InvalidSecurityToken")
        || code.starts_with("Forbidden")
}

#[async_trait]
impl ComputeService for AliyunProvider {
    async fn describe_instances(
        &self,
        query: &InstanceQuery,
        page: PageRequest,
    ) -> Result<Page<Instance>> {
        let mut params = vec![
            ("Tag.1.Key", query.selector.key.clone()),
            ("Tag.1.Value", query.selector.value.clone()),
            ("PageNumber", page.number.to_string()),
            ("PageSize", page.size.to_string()),
        ];
        if query.running_only {
            params.push(("Status", "Running".to_string()));
        }

        let response: DescribeInstancesResponse =
            self.call(&self.ecs, "DescribeInstances", &params).await?;

        Ok(Page {
            items: response
                .instances
                .instance
                .into_iter()
                .map(Instance::from)
                .collect(),
            total_count: response.total_count,
            page_number: response.page_number,
            page_size: response.page_size,
        })
    }

    async fn modify_instance_name(&self, instance_id: &str, name: &str) -> Result<()> {
        self.mutate(
            &self.ecs,
            "ModifyInstanceAttribute",
            &[
                ("InstanceId", instance_id.to_string()),
                ("InstanceName", name.to_string()),
            ],
        )
        .await
    }

    async fn modify_instance_spec(&self, instance_id: &str, instance_type: &str) -> Result<()> {
        self.mutate(
            &self.ecs,
            "ModifyInstanceSpec",
            &[
                ("InstanceId", instance_id.to_string()),
                ("InstanceType", instance_type.to_string()),
            ],
        )
        .await
    }

    async fn start_instance(&self, instance_id: &str) -> Result<()> {
        self.mutate(
            &self.ecs,
            "StartInstance",
            &[("InstanceId", instance_id.to_string())],
        )
        .await
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        self.mutate(
            &self.ecs,
            "StopInstance",
            &[("InstanceId", instance_id.to_string())],
        )
        .await
    }

    fn service_name(&self) -> &'static str {
        "aliyun-ecs"
    }
}

#[async_trait]
impl AddressService for AliyunProvider {
    async fn describe_addresses(
        &self,
        status: &AddressStatus,
        page: PageRequest,
    ) -> Result<Page<Address>> {
        let params = [
            ("Status", status.as_str().to_string()),
            ("PageNumber", page.number.to_string()),
            ("PageSize", page.size.to_string()),
        ];

        let response: DescribeEipAddressesResponse =
            self.call(&self.vpc, "DescribeEipAddresses", &params).await?;

        let items = response
            .eip_addresses
            .eip_address
            .into_iter()
            .filter_map(|model| match Address::try_from(model) {
                Ok(address) => Some(address),
                Err(e) => {
                    tracing::warn!("Skipping address record: {}", e);
                    None
                }
            })
            .collect();

        Ok(Page {
            items,
            total_count: response.total_count,
            page_number: response.page_number,
            page_size: response.page_size,
        })
    }

    async fn allocate_address(&self, params: &AllocationParams) -> Result<AllocatedAddress> {
        let mut query = vec![
            ("ISP", params.isp.clone()),
            (
                "InternetChargeType",
                params.internet_charge_type.as_str().to_string(),
            ),
        ];
        if let Some(mbps) = params.bandwidth_mbps {
            query.push(("Bandwidth", mbps.to_string()));
        }

        if self.dry_run {
            let n = self.dry_run_allocations.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::info!("[DRY-RUN] Would call AllocateEipAddress with {:?}", query);
            return Ok(AllocatedAddress {
                allocation_id: format!("dry-run-eip-{}", n),
                ip: None,
            });
        }

        let response: AllocateEipAddressResponse =
            self.call(&self.vpc, "AllocateEipAddress", &query).await?;

        Ok(AllocatedAddress {
            allocation_id: response.allocation_id,
            ip: response.eip_address.parse().ok(),
        })
    }

    async fn associate_address(&self, allocation_id: &str, instance_id: &str) -> Result<()> {
        self.mutate(
            &self.vpc,
            "AssociateEipAddress",
            &[
                ("AllocationId", allocation_id.to_string()),
                ("InstanceId", instance_id.to_string()),
            ],
        )
        .await
    }

    async fn release_address(&self, allocation_id: &str) -> Result<()> {
        self.mutate(
            &self.vpc,
            "ReleaseEipAddress",
            &[("AllocationId", allocation_id.to_string())],
        )
        .await
    }

    async fn add_to_bandwidth_package(
        &self,
        allocation_id: &str,
        bandwidth_package_id: &str,
    ) -> Result<()> {
        self.mutate(
            &self.vpc,
            "AddCommonBandwidthPackageIp",
            &[
                ("BandwidthPackageId", bandwidth_package_id.to_string()),
                ("IpInstanceId", allocation_id.to_string()),
            ],
        )
        .await
    }

    async fn remove_from_bandwidth_package(
        &self,
        allocation_id: &str,
        bandwidth_package_id: &str,
    ) -> Result<()> {
        self.mutate(
            &self.vpc,
            "RemoveCommonBandwidthPackageIp",
            &[
                ("BandwidthPackageId", bandwidth_package_id.to_string()),
                ("IpInstanceId", allocation_id.to_string()),
            ],
        )
        .await
    }

    fn service_name(&self) -> &'static str {
        "aliyun-vpc"
    }
}
