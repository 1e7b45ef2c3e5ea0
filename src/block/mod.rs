//! Address block model and arithmetic.
//!
//! An [`AddressBlock`] is either a resolved network (address plus prefix
//! length, host bits cleared) or a deferred placeholder whose concrete value
//! is supplied later by the provisioning layer. Both forms flow through the
//! pool tree and the tiered allocator uniformly; arithmetic on a deferred
//! block composes a new deferred expression instead of computing a value.

pub mod arithmetic;
pub mod deferred;
pub mod family;

use std::fmt;

use ipnet::IpNet;
use serde::{Serialize, Serializer};

use crate::error::{PlanError, PlanResult};

pub use arithmetic::{biggest_child_prefix, partition, partition_direct, resolve_child_prefix, validate_prefix};
pub use deferred::{CidrPartitioner, DeferredPartition, Resolver, SymbolicPartitioner};
pub use family::{AddressFamily, IdentifyAddressFamily};

/// Symbolic expression describing how a deferred block will be produced
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockExpr {
    /// Opaque value owned by the provisioning layer (e.g. a pool allocation output)
    Token(String),
    /// The `index`-th block of an equal split of `parent` into `count` children
    Select {
        parent: Box<BlockExpr>,
        /// Width the parent had when the split was planned
        parent_prefix: Option<u8>,
        count: usize,
        child_prefix: u8,
        index: usize,
    },
}

impl fmt::Display for BlockExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockExpr::Token(token) => write!(f, "{}", token),
            BlockExpr::Select { parent, count, child_prefix, index, .. } => {
                write!(f, "select({}, cidr({}, {}, /{}))", index, parent, count, child_prefix)
            }
        }
    }
}

/// A block whose concrete value is not known during planning
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeferredBlock {
    pub family: AddressFamily,
    /// Known prefix length, if the request that produced the block fixed one
    pub prefix_len: Option<u8>,
    pub expr: BlockExpr,
}

impl DeferredBlock {
    /// Placeholder for a value the provisioning layer will hand back under `token`
    pub fn token(token: impl Into<String>, family: AddressFamily, prefix_len: Option<u8>) -> Self {
        DeferredBlock {
            family,
            prefix_len,
            expr: BlockExpr::Token(token.into()),
        }
    }
}

impl fmt::Display for DeferredBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}}}", self.expr)
    }
}

/// Network address block, resolved or pending external resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressBlock {
    Resolved(IpNet),
    Deferred(DeferredBlock),
}

impl AddressBlock {
    /// Parse a literal CIDR, rejecting host bits past the prefix.
    ///
    /// `10.0.0.0/16` is accepted, `10.0.0.1/16` is not: a block is always
    /// identified by its network address.
    pub fn parse_literal(literal: &str) -> PlanResult<Self> {
        let net: IpNet = literal.trim().parse().map_err(|e: ipnet::AddrParseError| PlanError::InvalidCidr {
            literal: literal.to_string(),
            reason: e.to_string(),
        })?;
        if net.trunc() != net {
            return Err(PlanError::InvalidCidr {
                literal: literal.to_string(),
                reason: format!("host bits set, network address is {}", net.trunc()),
            });
        }
        Ok(AddressBlock::Resolved(net))
    }

    pub fn deferred(token: impl Into<String>, family: AddressFamily, prefix_len: Option<u8>) -> Self {
        AddressBlock::Deferred(DeferredBlock::token(token, family, prefix_len))
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            AddressBlock::Resolved(net) => net.address_family(),
            AddressBlock::Deferred(deferred) => deferred.family,
        }
    }

    /// Prefix length, when known
    pub fn prefix_len(&self) -> Option<u8> {
        match self {
            AddressBlock::Resolved(net) => Some(net.prefix_len()),
            AddressBlock::Deferred(deferred) => deferred.prefix_len,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AddressBlock::Resolved(_))
    }

    pub fn as_resolved(&self) -> Option<&IpNet> {
        match self {
            AddressBlock::Resolved(net) => Some(net),
            AddressBlock::Deferred(_) => None,
        }
    }
}

impl From<IpNet> for AddressBlock {
    fn from(net: IpNet) -> Self {
        AddressBlock::Resolved(net.trunc())
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressBlock::Resolved(net) => write!(f, "{}", net),
            AddressBlock::Deferred(deferred) => write!(f, "{}", deferred),
        }
    }
}

impl Serialize for AddressBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
