//! Deferred partitioning and collaborator-side resolution.
//!
//! The provisioning layer owns the real partition primitive for blocks that
//! are not known yet. [`CidrPartitioner`] is the seam: the planner asks for an
//! equal split and then selects one child per index. [`Resolver`] plays the
//! collaborator's part after deployment, turning deferred expressions back
//! into concrete networks.

use std::collections::HashMap;

use ipnet::IpNet;

use super::arithmetic::partition_direct;
use super::family::IdentifyAddressFamily;
use super::{AddressBlock, AddressFamily, BlockExpr, DeferredBlock};
use crate::error::{PlanError, PlanResult};

/// Handle for an equal-width split requested from the provisioning layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredPartition {
    pub parent: BlockExpr,
    pub parent_prefix: Option<u8>,
    pub family: AddressFamily,
    pub count: usize,
    pub child_prefix: u8,
}

/// External partition primitive for blocks that are not resolved yet
pub trait CidrPartitioner {
    /// Split `parent` into `count` blocks of `child_prefix`, ascending by address
    fn partition_equally(&self, parent: &DeferredBlock, count: usize, child_prefix: u8) -> DeferredPartition;

    /// Deterministically pick the `index`-th block of a split
    fn select_nth(&self, partition: &DeferredPartition, index: usize) -> DeferredBlock;
}

/// Partitioner that records splits as symbolic expressions
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolicPartitioner;

impl CidrPartitioner for SymbolicPartitioner {
    fn partition_equally(&self, parent: &DeferredBlock, count: usize, child_prefix: u8) -> DeferredPartition {
        DeferredPartition {
            parent: parent.expr.clone(),
            parent_prefix: parent.prefix_len,
            family: parent.family,
            count,
            child_prefix,
        }
    }

    fn select_nth(&self, partition: &DeferredPartition, index: usize) -> DeferredBlock {
        DeferredBlock {
            family: partition.family,
            prefix_len: Some(partition.child_prefix),
            expr: BlockExpr::Select {
                parent: Box::new(partition.parent.clone()),
                parent_prefix: partition.parent_prefix,
                count: partition.count,
                child_prefix: partition.child_prefix,
                index,
            },
        }
    }
}

/// Concrete values for deferred tokens, as produced by the provisioning layer
#[derive(Debug, Default, Clone)]
pub struct Resolver {
    bindings: HashMap<String, IpNet>,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver::default()
    }

    /// Bind `token` to a concrete network. Host bits are cleared.
    pub fn bind(&mut self, token: impl Into<String>, net: IpNet) -> &mut Self {
        self.bindings.insert(token.into(), net.trunc());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Evaluate a block to a concrete network.
    ///
    /// Selections are evaluated with the same direct arithmetic the planner
    /// uses for resolved blocks, so a deferred plan resolves to exactly what
    /// a direct plan over the same source would have produced.
    pub fn resolve(&self, block: &AddressBlock) -> PlanResult<IpNet> {
        match block {
            AddressBlock::Resolved(net) => Ok(*net),
            AddressBlock::Deferred(deferred) => {
                let net = self.evaluate(&deferred.expr)?;
                if !net.is_address_family(deferred.family) {
                    return Err(PlanError::FamilyMismatch {
                        value: net.to_string(),
                        family_expected: deferred.family,
                        family_found: net.address_family(),
                    });
                }
                check_width(&net, deferred.prefix_len, &deferred.expr)?;
                Ok(net)
            }
        }
    }

    fn evaluate(&self, expr: &BlockExpr) -> PlanResult<IpNet> {
        match expr {
            BlockExpr::Token(token) => self
                .bindings
                .get(token)
                .copied()
                .ok_or_else(|| PlanError::UnresolvedToken(token.clone())),
            BlockExpr::Select {
                parent,
                parent_prefix,
                count,
                child_prefix,
                index,
            } => {
                let parent_net = self.evaluate(parent)?;
                check_width(&parent_net, *parent_prefix, parent)?;
                let children = partition_direct(&parent_net, *count, *child_prefix)?;
                children
                    .get(*index)
                    .copied()
                    .ok_or_else(|| PlanError::AddressSpaceExhausted {
                        parent_prefix: parent_net.prefix_len(),
                        count: index + 1,
                        family: parent_net.address_family(),
                    })
            }
        }
    }
}

/// A resolved value must have the width the plan was computed for
fn check_width(net: &IpNet, expected: Option<u8>, expr: &impl std::fmt::Display) -> PlanResult<()> {
    match expected {
        Some(prefix) if prefix != net.prefix_len() => Err(PlanError::InvalidCidr {
            literal: net.to_string(),
            reason: format!("bound /{}, expected /{} for {}", net.prefix_len(), prefix, expr),
        }),
        _ => Ok(()),
    }
}
