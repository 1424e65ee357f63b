//! Response bodies of the ECS and VPC OpenAPI
//!
//! Only the fields the reconciler reads are modelled. Missing collections
//! default to empty; the service omits them when there is nothing to list.

use eip_core::traits::{Address, AddressStatus, Instance, InstanceStatus};
use eip_core::{Error, Result};
use serde::Deserialize;
use std::net::IpAddr;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DescribeInstancesResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub instances: InstanceSet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InstanceSet {
    #[serde(default)]
    pub instance: Vec<InstanceModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InstanceModel {
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub public_ip_address: IpList,
    #[serde(default)]
    pub eip_address: EipAttribute,
    #[serde(default)]
    pub vpc_attributes: VpcAttributes,
    #[serde(default)]
    pub tags: TagSet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct IpList {
    #[serde(default)]
    pub ip_address: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EipAttribute {
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub allocation_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct VpcAttributes {
    #[serde(default)]
    pub private_ip_address: IpList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TagSet {
    #[serde(default)]
    pub tag: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TagModel {
    pub tag_key: String,
    #[serde(default)]
    pub tag_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DescribeEipAddressesResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub eip_addresses: EipSet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EipSet {
    #[serde(default)]
    pub eip_address: Vec<EipModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EipModel {
    pub allocation_id: String,
    pub ip_address: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub bandwidth_package_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AllocateEipAddressResponse {
    pub allocation_id: String,
    #[serde(default)]
    pub eip_address: String,
}

fn parse_ips(raw: &[String]) -> Vec<IpAddr> {
    raw.iter().filter_map(|ip| ip.parse().ok()).collect()
}

fn non_empty(raw: String) -> Option<String> {
    if raw.is_empty() { None } else { Some(raw) }
}

impl From<InstanceModel> for Instance {
    fn from(model: InstanceModel) -> Self {
        Instance {
            id: model.instance_id,
            name: model.instance_name,
            status: InstanceStatus::parse(&model.status),
            tags: model
                .tags
                .tag
                .into_iter()
                .map(|t| (t.tag_key, t.tag_value))
                .collect(),
            private_ip: parse_ips(&model.vpc_attributes.private_ip_address.ip_address)
                .into_iter()
                .next(),
            public_ips: parse_ips(&model.public_ip_address.ip_address),
            eip: model.eip_address.ip_address.parse().ok(),
        }
    }
}

impl TryFrom<EipModel> for Address {
    type Error = Error;

    fn try_from(model: EipModel) -> Result<Self> {
        let ip = model.ip_address.parse().map_err(|_| {
            Error::provider(
                "aliyun",
                format!(
                    "Address {} has an unparseable IP {:?}",
                    model.allocation_id, model.ip_address
                ),
            )
        })?;

        Ok(Address {
            allocation_id: model.allocation_id,
            ip,
            status: AddressStatus::parse(&model.status),
            bandwidth_package_id: non_empty(model.bandwidth_package_id),
        })
    }
}
