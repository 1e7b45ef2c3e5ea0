//! Allocations carved out of pools.

use std::fmt;

use serde::Serialize;

use super::pool::PoolId;
use crate::block::AddressBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationId(pub(crate) usize);

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipam-alloc-{:04}", self.0)
    }
}

/// Why an allocation exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationKind {
    /// Provisions address space into the pool (pool CIDR request)
    Provision,
    /// Carves address space out of the pool for a consumer
    Allocate,
}

/// Size requested for an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedSize {
    Explicit(u8),
    /// Whatever the pool or the provisioning layer picks
    Default,
}

impl Serialize for RequestedSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RequestedSize::Explicit(prefix) => serializer.collect_str(&format_args!("/{}", prefix)),
            RequestedSize::Default => serializer.serialize_str("default"),
        }
    }
}

/// Request to add address space to a pool
#[derive(Debug, Clone, Default)]
pub struct CidrRequest {
    /// Literal or deferred block to provision
    pub cidr: Option<AddressBlock>,
    /// Size to provision when no block is given
    pub netmask_length: Option<u8>,
    /// Register a literal directly on the pool instead of through an allocation
    pub inline: bool,
}

impl CidrRequest {
    /// Inline registration of a literal block
    pub fn inline(cidr: AddressBlock) -> Self {
        CidrRequest {
            cidr: Some(cidr),
            netmask_length: None,
            inline: true,
        }
    }

    /// Provision a block of `netmask_length` from the parent pool
    pub fn netmask(netmask_length: u8) -> Self {
        CidrRequest {
            cidr: None,
            netmask_length: Some(netmask_length),
            inline: false,
        }
    }

    /// The literal this request names, if it names a resolved block
    pub fn literal(&self) -> Option<&AddressBlock> {
        self.cidr.as_ref().filter(|c| c.is_resolved())
    }
}

/// Options for carving a block out of a pool
#[derive(Debug, Clone, Default)]
pub struct AllocateOptions {
    pub cidr: Option<AddressBlock>,
    pub netmask_length: Option<u8>,
    /// Identity of the resource the block is for
    pub resource: Option<String>,
    pub description: Option<String>,
}

/// How a registration request was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CidrRegistration {
    Inline(AddressBlock),
    Deferred(AllocationId),
}

/// A block requested against a pool
#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    #[serde(serialize_with = "super::serialize_display")]
    pub(crate) id: AllocationId,
    pub(crate) handle: String,
    #[serde(serialize_with = "super::serialize_display")]
    pub(crate) pool: PoolId,
    pub(crate) kind: AllocationKind,
    pub(crate) requested: RequestedSize,
    pub(crate) block: AddressBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
}

impl Allocation {
    pub fn id(&self) -> AllocationId {
        self.id
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }

    pub fn kind(&self) -> AllocationKind {
        self.kind
    }

    pub fn requested(&self) -> RequestedSize {
        self.requested
    }

    /// Resolved block, or the placeholder the provisioning layer fills in
    pub fn block(&self) -> &AddressBlock {
        &self.block
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }
}
