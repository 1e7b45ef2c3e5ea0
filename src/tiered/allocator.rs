//! Tier and zone partitioning.
//!
//! The source block is split once per tier, then each tier block is split
//! once per zone present in that tier:
//!
//! ```text
//! 10.0.0.0/16
//! |-- public   10.0.0.0/17     -> az1 10.0.0.0/18,   az2 10.0.64.0/18
//! \-- private  10.0.128.0/17   -> az1 10.0.128.0/18, az2 10.0.192.0/18
//! ```
//!
//! Tiers and zones are ordered by first appearance in the request list, so
//! the same requests always produce the same plan.

use std::collections::HashSet;

use log::{debug, info};
use serde::Serialize;

use super::request::{RequestedSubnet, SubnetSource};
use crate::block::{biggest_child_prefix, partition, validate_prefix, AddressBlock, CidrPartitioner};
use crate::error::{PlanError, PlanResult};

/// Block assigned to one zone of a tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneAssignment {
    pub zone: String,
    pub block: AddressBlock,
}

/// A tier's share of the source block and its zone split
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierAssignment {
    pub tier: String,
    pub block: AddressBlock,
    pub zone_prefix_length: u8,
    pub zones: Vec<ZoneAssignment>,
}

/// Output of a tiered allocation: one block per requested (tier, zone)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierPlan {
    pub source: AddressBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_prefix_length: Option<u8>,
    pub tiers: Vec<TierAssignment>,
}

impl TierPlan {
    /// Block assigned to `(tier, zone)`
    pub fn get(&self, tier: &str, zone: &str) -> Option<&AddressBlock> {
        self.tiers
            .iter()
            .find(|t| t.tier == tier)?
            .zones
            .iter()
            .find(|z| z.zone == zone)
            .map(|z| &z.block)
    }

    /// Block assigned to a whole tier
    pub fn tier_block(&self, tier: &str) -> Option<&AddressBlock> {
        self.tiers.iter().find(|t| t.tier == tier).map(|t| &t.block)
    }

    /// Every `(tier, zone, block)` in tier order, then zone order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &AddressBlock)> {
        self.tiers.iter().flat_map(|t| {
            t.zones
                .iter()
                .map(move |z| (t.tier.as_str(), z.zone.as_str(), &z.block))
        })
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(|t| t.zones.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits a source block into per-tier, per-zone subnets.
///
/// Requests are collected first (`request`), then resolved in a single
/// `allocate` call once the full set is known.
#[derive(Debug, Clone)]
pub struct TieredAllocator {
    source: SubnetSource,
    tier_prefix_length: Option<u8>,
    requested: Vec<RequestedSubnet>,
}

impl TieredAllocator {
    pub fn new(source: impl Into<SubnetSource>) -> Self {
        TieredAllocator {
            source: source.into(),
            tier_prefix_length: None,
            requested: Vec::new(),
        }
    }

    /// Fix the tier block size instead of deriving it from the tier count
    pub fn with_tier_prefix_length(mut self, prefix_length: u8) -> Self {
        self.tier_prefix_length = Some(prefix_length);
        self
    }

    pub fn request(&mut self, subnet: RequestedSubnet) -> &mut Self {
        self.requested.push(subnet);
        self
    }

    pub fn requested_subnets(&self) -> &[RequestedSubnet] {
        &self.requested
    }

    /// Resolve every request into a block. Any validation failure aborts the
    /// whole allocation.
    pub fn allocate(&self, partitioner: &dyn CidrPartitioner) -> PlanResult<TierPlan> {
        let source = self.source.block();
        let (tiers, zones) = self.distinct_tiers_and_zones()?;
        if tiers.is_empty() {
            return Ok(TierPlan {
                source,
                tier_prefix_length: self.tier_prefix_length,
                tiers: Vec::new(),
            });
        }

        let tier_prefix = self.tier_prefix(&source, tiers.len())?;
        debug!("Splitting {} into {} tiers of /{}", source, tiers.len(), tier_prefix);
        let tier_blocks = partition(&source, tiers.len(), Some(tier_prefix), partitioner)?;

        let mut assignments = Vec::with_capacity(tiers.len());
        for (tier, tier_block) in tiers.iter().zip(tier_blocks) {
            let subnets: Vec<&RequestedSubnet> = self.requested.iter().filter(|s| &s.tier == tier).collect();
            let tier_zones: Vec<&String> = zones
                .iter()
                .filter(|zone| subnets.iter().any(|s| &s.zone == *zone))
                .collect();

            let explicit = consistent_prefix(tier, &subnets)?;
            let zone_prefix = zone_prefix(tier, tier_prefix, tier_zones.len(), explicit, &source)?;
            debug!("Splitting tier {} ({}) into {} zones of /{}", tier, tier_block, tier_zones.len(), zone_prefix);

            let zone_blocks = partition(&tier_block, tier_zones.len(), Some(zone_prefix), partitioner)?;
            let zone_assignments = tier_zones
                .into_iter()
                .zip(zone_blocks)
                .map(|(zone, block)| ZoneAssignment {
                    zone: zone.clone(),
                    block,
                })
                .collect();

            assignments.push(TierAssignment {
                tier: tier.clone(),
                block: tier_block,
                zone_prefix_length: zone_prefix,
                zones: zone_assignments,
            });
        }

        let plan = TierPlan {
            source,
            tier_prefix_length: Some(tier_prefix),
            tiers: assignments,
        };
        info!("Allocated {} subnets across {} tiers from {}", plan.len(), plan.tiers.len(), plan.source);
        Ok(plan)
    }

    /// Distinct tier and zone names in first-seen order; every pair must be unique
    fn distinct_tiers_and_zones(&self) -> PlanResult<(Vec<String>, Vec<String>)> {
        let mut tiers: Vec<String> = Vec::new();
        let mut zones: Vec<String> = Vec::new();
        let mut pairs = HashSet::new();

        for subnet in &self.requested {
            if !pairs.insert((subnet.tier.as_str(), subnet.zone.as_str())) {
                return Err(PlanError::DuplicateSubnetRequest {
                    tier: subnet.tier.clone(),
                    zone: subnet.zone.clone(),
                });
            }
            if !tiers.contains(&subnet.tier) {
                tiers.push(subnet.tier.clone());
            }
            if !zones.contains(&subnet.zone) {
                zones.push(subnet.zone.clone());
            }
        }
        Ok((tiers, zones))
    }

    fn tier_prefix(&self, source: &AddressBlock, tier_count: usize) -> PlanResult<u8> {
        let family = source.family();
        if let Some(requested) = self.tier_prefix_length {
            validate_prefix(requested, family)?;
        }

        match (source.prefix_len(), self.tier_prefix_length) {
            (None, None) => Err(PlanError::MissingNetmask {
                source_ref: source.to_string(),
            }),
            (None, Some(requested)) => Ok(requested),
            (Some(parent), requested) => {
                let minimum = biggest_child_prefix(parent, tier_count, family)?;
                match requested {
                    Some(requested) if requested < minimum => Err(PlanError::TierMaskTooNarrow {
                        requested,
                        minimum,
                        tiers: tier_count,
                    }),
                    Some(requested) => Ok(requested),
                    None => Ok(minimum),
                }
            }
        }
    }
}

/// The explicit prefix shared by all subnets of a tier, if any
fn consistent_prefix(tier: &str, subnets: &[&RequestedSubnet]) -> PlanResult<Option<u8>> {
    let render = |prefix: Option<u8>| prefix.map_or_else(|| "unset".to_string(), |p| format!("/{}", p));

    let first = subnets.first().and_then(|s| s.prefix_length);
    for subnet in subnets {
        if subnet.prefix_length != first {
            return Err(PlanError::InconsistentSubnetSize {
                tier: tier.to_string(),
                first: render(first),
                second: render(subnet.prefix_length),
            });
        }
    }
    Ok(first)
}

fn zone_prefix(
    tier: &str,
    tier_prefix: u8,
    zone_count: usize,
    explicit: Option<u8>,
    source: &AddressBlock,
) -> PlanResult<u8> {
    let family = source.family();
    let minimum = biggest_child_prefix(tier_prefix, zone_count, family)?;
    match explicit {
        Some(requested) => {
            validate_prefix(requested, family)?;
            if requested < minimum {
                return Err(PlanError::SubnetMaskTooNarrow {
                    tier: tier.to_string(),
                    requested,
                    minimum,
                    zones: zone_count,
                });
            }
            Ok(requested)
        }
        None => Ok(minimum),
    }
}
