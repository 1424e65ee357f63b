//! Binder
//!
//! Pairs unbound instances with available addresses by position and binds
//! each pair under the configured retry policy.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::traits::{Address, AddressService, Instance};
use tracing::{error, info, warn};

/// Positional pairing of instances with addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing<'a> {
    /// `(instances[i], addresses[i])` for every `i` both lists cover
    pub pairs: Vec<(&'a Instance, &'a Address)>,
    /// Instances past the end of the address list
    pub unpaired: &'a [Instance],
    /// Addresses past the end of the instance list
    pub spare: &'a [Address],
}

/// Zip two ordered lists, truncating to the shorter one
///
/// No address appears in more than one pair. Instances left over when
/// addresses run out are returned in `unpaired`.
pub fn pair<'a>(instances: &'a [Instance], addresses: &'a [Address]) -> Pairing<'a> {
    let n = instances.len().min(addresses.len());
    Pairing {
        pairs: instances.iter().zip(addresses.iter()).collect(),
        unpaired: &instances[n..],
        spare: &addresses[n..],
    }
}

/// Bind `allocation_id` to `instance_id`, retrying per `policy`
///
/// A freshly bound and an already bound address are not distinguished.
///
/// # Returns
///
/// - `Ok(attempts)`: Bound, after this many attempts
/// - `Err(Error::RetriesExhausted)`: Every attempt failed
pub async fn bind(
    addresses: &dyn AddressService,
    policy: &RetryPolicy,
    allocation_id: &str,
    instance_id: &str,
) -> Result<u32> {
    let operation = format!("bind {} -> {}", allocation_id, instance_id);

    let result = policy
        .run(&operation, move |attempt| async move {
            addresses
                .associate_address(allocation_id, instance_id)
                .await
                .map(|()| attempt)
        })
        .await;

    match &result {
        Ok(attempts) => info!(
            "Bound {} to {} (attempt {})",
            allocation_id, instance_id, attempts
        ),
        // A transient cause is likely to bind on the next pass
        Err(Error::RetriesExhausted { attempts, last, .. }) if last.is_transient() => warn!(
            "Giving up binding {} to {} after {} attempt(s), service still busy: {}",
            allocation_id, instance_id, attempts, last
        ),
        Err(Error::RetriesExhausted { attempts, last, .. }) => error!(
            "Giving up binding {} to {} after {} attempt(s): {}",
            allocation_id, instance_id, attempts, last
        ),
        Err(e) => error!("Binding {} to {} failed: {}", allocation_id, instance_id, e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{AddressStatus, InstanceStatus};
    use std::net::IpAddr;

    fn instances(n: usize) -> Vec<Instance> {
        (0..n)
            .map(|i| Instance {
                id: format!("i-{}", i),
                name: format!("node{}", i),
                status: InstanceStatus::Running,
                tags: Vec::new(),
                private_ip: None,
                public_ips: Vec::new(),
                eip: None,
            })
            .collect()
    }

    fn addresses(n: usize) -> Vec<Address> {
        (0..n)
            .map(|i| Address {
                allocation_id: format!("eip-{}", i),
                ip: IpAddr::from([47, 0, 0, i as u8]),
                status: AddressStatus::Available,
                bandwidth_package_id: Some("cbwp-1".to_string()),
            })
            .collect()
    }

    #[test]
    fn test_pairs_by_position() {
        let instances = instances(3);
        let addresses = addresses(3);
        let pairing = pair(&instances, &addresses);

        let ids: Vec<_> = pairing
            .pairs
            .iter()
            .map(|(i, a)| (i.id.as_str(), a.allocation_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("i-0", "eip-0"), ("i-1", "eip-1"), ("i-2", "eip-2")]);
        assert!(pairing.unpaired.is_empty());
        assert!(pairing.spare.is_empty());
    }

    #[test]
    fn test_fewer_addresses_than_instances_truncates() {
        let instances = instances(5);
        let addresses = addresses(2);
        let pairing = pair(&instances, &addresses);

        assert_eq!(pairing.pairs.len(), 2);
        let unpaired: Vec<_> = pairing.unpaired.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(unpaired, vec!["i-2", "i-3", "i-4"]);
    }

    #[test]
    fn test_more_addresses_than_instances_leaves_spare() {
        let instances = instances(1);
        let addresses = addresses(4);
        let pairing = pair(&instances, &addresses);

        assert_eq!(pairing.pairs.len(), 1);
        assert_eq!(pairing.spare.len(), 3);
        assert!(pairing.unpaired.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        let pairing = pair(&[], &[]);
        assert!(pairing.pairs.is_empty());
    }
}
