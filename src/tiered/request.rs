//! Inputs to the tiered allocator.

use serde::{Deserialize, Serialize};

use crate::block::{AddressBlock, AddressFamily};
use crate::ipam::Pool;

/// One subnet wanted for a (tier, zone) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedSubnet {
    pub tier: String,
    pub zone: String,
    /// Explicit subnet size; every subnet of a tier must agree on it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<u8>,
}

impl RequestedSubnet {
    pub fn new(tier: impl Into<String>, zone: impl Into<String>) -> Self {
        RequestedSubnet {
            tier: tier.into(),
            zone: zone.into(),
            prefix_length: None,
        }
    }

    pub fn with_prefix_length(mut self, prefix_length: u8) -> Self {
        self.prefix_length = Some(prefix_length);
        self
    }
}

/// Where the tiered allocator takes its address space from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubnetSource {
    /// A block, resolved or deferred
    Block(AddressBlock),
    /// Whatever block the provisioning layer assigns out of a pool.
    /// Its size is unknown, so the tier prefix length must be given.
    Pool { handle: String, family: AddressFamily },
}

impl SubnetSource {
    pub fn from_pool(pool: &Pool) -> Self {
        SubnetSource::Pool {
            handle: pool.handle().to_string(),
            family: pool.family(),
        }
    }

    /// The source as a block; pool references become a deferred block of unknown width
    pub fn block(&self) -> AddressBlock {
        match self {
            SubnetSource::Block(block) => block.clone(),
            SubnetSource::Pool { handle, family } => AddressBlock::deferred(format!("{}.allocation", handle), *family, None),
        }
    }
}

impl From<AddressBlock> for SubnetSource {
    fn from(block: AddressBlock) -> Self {
        SubnetSource::Block(block)
    }
}
