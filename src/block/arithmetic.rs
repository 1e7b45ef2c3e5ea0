//! Prefix arithmetic and equal-width partitioning.

use ipnet::IpNet;
use log::debug;

use super::deferred::CidrPartitioner;
use super::family::{AddressFamily, IdentifyAddressFamily};
use super::AddressBlock;
use crate::error::{PlanError, PlanResult};

/// Check that `prefix` is a valid prefix length for `family`
pub fn validate_prefix(prefix: u8, family: AddressFamily) -> PlanResult<u8> {
    if prefix > family.width() {
        return Err(PlanError::InvalidPrefixLength {
            prefix,
            family,
            max: family.width(),
        });
    }
    Ok(prefix)
}

/// Smallest prefix length `p >= parent_prefix` with `2^(p - parent_prefix) >= count`.
///
/// This is the widest child block that still lets `count` equal children fit
/// inside the parent.
///
/// # Examples
/// ```
/// use ipam_planner::block::{biggest_child_prefix, AddressFamily};
///
/// assert_eq!(biggest_child_prefix(16, 2, AddressFamily::Ipv4).unwrap(), 17);
/// assert_eq!(biggest_child_prefix(16, 3, AddressFamily::Ipv4).unwrap(), 18);
/// assert_eq!(biggest_child_prefix(16, 1, AddressFamily::Ipv4).unwrap(), 16);
/// assert!(biggest_child_prefix(31, 3, AddressFamily::Ipv4).is_err());
/// ```
pub fn biggest_child_prefix(parent_prefix: u8, count: usize, family: AddressFamily) -> PlanResult<u8> {
    validate_prefix(parent_prefix, family)?;
    if count == 0 {
        return Err(PlanError::EmptyPartition);
    }

    let exhausted = || PlanError::AddressSpaceExhausted {
        parent_prefix,
        count,
        family,
    };

    // ceil(log2(count)); a count past usize's largest power of two cannot fit anywhere
    let bits = count.checked_next_power_of_two().ok_or_else(exhausted)?.trailing_zeros();
    let child_prefix = u32::from(parent_prefix) + bits;
    if child_prefix > u32::from(family.width()) {
        return Err(exhausted());
    }
    Ok(child_prefix as u8)
}

/// Work out the child prefix for splitting `parent` into `count` blocks.
///
/// An explicit prefix must be valid for the family and no wider than the
/// computed feasible prefix. Without one, the parent's prefix must be known.
pub fn resolve_child_prefix(parent: &AddressBlock, count: usize, explicit: Option<u8>) -> PlanResult<u8> {
    let family = parent.family();
    if let Some(requested) = explicit {
        validate_prefix(requested, family)?;
    }

    match (parent.prefix_len(), explicit) {
        (Some(parent_prefix), Some(requested)) => {
            let minimum = biggest_child_prefix(parent_prefix, count, family)?;
            if requested < minimum {
                return Err(PlanError::PrefixTooWide { requested, minimum });
            }
            Ok(requested)
        }
        (Some(parent_prefix), None) => biggest_child_prefix(parent_prefix, count, family),
        // Unknown parent width: only the collaborator can check containment after resolution
        (None, Some(requested)) => {
            if count == 0 {
                return Err(PlanError::EmptyPartition);
            }
            Ok(requested)
        }
        (None, None) => Err(PlanError::MissingNetmask {
            source_ref: parent.to_string(),
        }),
    }
}

/// Split a resolved network into `count` equal children of `child_prefix`.
///
/// Children are contiguous, start at the parent's network address and come
/// back in ascending address order.
pub fn partition_direct(parent: &IpNet, count: usize, child_prefix: u8) -> PlanResult<Vec<IpNet>> {
    let family = parent.address_family();
    validate_prefix(child_prefix, family)?;
    let minimum = biggest_child_prefix(parent.prefix_len(), count, family)?;
    if child_prefix < minimum {
        return Err(PlanError::PrefixTooWide {
            requested: child_prefix,
            minimum,
        });
    }

    let subnets = parent.trunc().subnets(child_prefix).map_err(|_| PlanError::InvalidPrefixLength {
        prefix: child_prefix,
        family,
        max: family.width(),
    })?;
    Ok(subnets.take(count).collect())
}

/// Partition `parent` into `count` equal blocks.
///
/// Resolved parents are split with bit arithmetic. Deferred parents are
/// handed to `partitioner`, which returns one symbolic child per index. Both
/// paths apply the same prefix validation, so they agree on count, width and
/// ordering once the deferred side is resolved.
pub fn partition(
    parent: &AddressBlock,
    count: usize,
    explicit_child_prefix: Option<u8>,
    partitioner: &dyn CidrPartitioner,
) -> PlanResult<Vec<AddressBlock>> {
    let child_prefix = resolve_child_prefix(parent, count, explicit_child_prefix)?;
    debug!("Partitioning {} into {} blocks of /{}", parent, count, child_prefix);

    match parent {
        AddressBlock::Resolved(net) => Ok(partition_direct(net, count, child_prefix)?
            .into_iter()
            .map(AddressBlock::Resolved)
            .collect()),
        AddressBlock::Deferred(deferred) => {
            let split = partitioner.partition_equally(deferred, count, child_prefix);
            Ok((0..count)
                .map(|index| AddressBlock::Deferred(partitioner.select_nth(&split, index)))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::SymbolicPartitioner;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix(0, AddressFamily::Ipv4).is_ok());
        assert!(validate_prefix(32, AddressFamily::Ipv4).is_ok());
        assert!(matches!(
            validate_prefix(33, AddressFamily::Ipv4),
            Err(PlanError::InvalidPrefixLength { prefix: 33, max: 32, .. })
        ));
        assert!(validate_prefix(128, AddressFamily::Ipv6).is_ok());
        assert!(validate_prefix(129, AddressFamily::Ipv6).is_err());
    }

    #[test]
    fn test_biggest_child_prefix_exhaustive_v4() {
        for parent_prefix in 0u8..=31 {
            for count in 1usize..=70 {
                let expected = (parent_prefix..=32).find(|p| (1u64 << (p - parent_prefix)) >= count as u64);
                let result = biggest_child_prefix(parent_prefix, count, AddressFamily::Ipv4);
                match expected {
                    Some(p) => assert_eq!(result.unwrap(), p, "parent /{} count {}", parent_prefix, count),
                    None => assert!(
                        matches!(result, Err(PlanError::AddressSpaceExhausted { .. })),
                        "parent /{} count {} should be exhausted",
                        parent_prefix,
                        count
                    ),
                }
            }
        }
    }

    #[test]
    fn test_biggest_child_prefix_zero_children() {
        assert_eq!(
            biggest_child_prefix(16, 0, AddressFamily::Ipv4),
            Err(PlanError::EmptyPartition)
        );
    }

    #[test]
    fn test_biggest_child_prefix_v6() {
        assert_eq!(biggest_child_prefix(56, 6, AddressFamily::Ipv6).unwrap(), 59);
        assert!(biggest_child_prefix(127, 3, AddressFamily::Ipv6).is_err());
    }

    #[test]
    fn test_partition_direct_properties() {
        let parent = net("10.0.0.0/16");
        let children = partition_direct(&parent, 5, 19).unwrap();

        assert_eq!(children.len(), 5);
        for child in &children {
            assert_eq!(child.prefix_len(), 19);
            assert!(parent.contains(child));
        }
        for pair in children.windows(2) {
            assert!(pair[0].addr() < pair[1].addr());
            assert!(!pair[0].contains(&pair[1]) && !pair[1].contains(&pair[0]));
        }
        assert_eq!(children[0], net("10.0.0.0/19"));
        assert_eq!(children[4], net("10.0.128.0/19"));
    }

    #[test]
    fn test_partition_full_set_recombines_to_parent() {
        let parent = net("172.16.0.0/12");
        let children = partition_direct(&parent, 8, 15).unwrap();
        assert_eq!(IpNet::aggregate(&children), vec![parent]);

        let v6 = net("2001:db8::/48");
        let children = partition_direct(&v6, 16, 52).unwrap();
        assert_eq!(IpNet::aggregate(&children), vec![v6]);
    }

    #[test]
    fn test_partition_direct_rejects_wide_child() {
        let parent = net("10.0.0.0/16");
        assert_eq!(
            partition_direct(&parent, 4, 17),
            Err(PlanError::PrefixTooWide { requested: 17, minimum: 18 })
        );
    }

    #[test]
    fn test_partition_explicit_prefix_too_wide() {
        let parent = AddressBlock::parse_literal("10.0.0.0/24").unwrap();
        let err = partition(&parent, 3, Some(25), &SymbolicPartitioner).unwrap_err();
        assert_eq!(err, PlanError::PrefixTooWide { requested: 25, minimum: 26 });
    }

    #[test]
    fn test_partition_explicit_prefix_narrower_than_needed() {
        let parent = AddressBlock::parse_literal("10.0.0.0/24").unwrap();
        let children = partition(&parent, 3, Some(28), &SymbolicPartitioner).unwrap();
        let rendered: Vec<String> = children.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec!["10.0.0.0/28", "10.0.0.16/28", "10.0.0.32/28"]);
    }

    #[test]
    fn test_partition_deferred_parent() {
        let parent = AddressBlock::deferred("vpc.cidr", AddressFamily::Ipv4, Some(16));
        let children = partition(&parent, 3, None, &SymbolicPartitioner).unwrap();

        assert_eq!(children.len(), 3);
        for child in &children {
            assert!(!child.is_resolved());
            assert_eq!(child.prefix_len(), Some(18));
        }
        assert_eq!(children[1].to_string(), "${select(1, cidr(vpc.cidr, 3, /18))}");
    }

    #[test]
    fn test_partition_unknown_width_needs_netmask() {
        let parent = AddressBlock::deferred("pool", AddressFamily::Ipv4, None);
        assert!(matches!(
            partition(&parent, 2, None, &SymbolicPartitioner),
            Err(PlanError::MissingNetmask { .. })
        ));
        assert_eq!(partition(&parent, 2, Some(20), &SymbolicPartitioner).unwrap().len(), 2);
    }
}
