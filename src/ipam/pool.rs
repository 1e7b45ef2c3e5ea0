//! Address pools.
//!
//! A pool is a node in the pool tree. Public and private pools share one
//! type; the differences between them (who may nest, which options apply)
//! are plain functions over the pool's capability tags.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::allocation::AllocationId;
use super::scope::{ScopeId, ScopeVisibility};
use crate::block::{AddressBlock, AddressFamily};
use crate::error::{PlanError, PlanResult};

/// Pool identifier within one [`Ipam`](super::Ipam)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub(crate) usize);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipam-pool-{:04}", self.0)
    }
}

/// Topological region a pool's addresses are usable in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locale {
    /// Known at planning time, e.g. `us-east-1`
    Concrete(String),
    /// Supplied by the provisioning layer later
    Deferred(String),
}

impl Locale {
    pub fn is_concrete(&self) -> bool {
        matches!(self, Locale::Concrete(_))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Concrete(region) => write!(f, "{}", region),
            Locale::Deferred(token) => write!(f, "${{{}}}", token),
        }
    }
}

impl Serialize for Locale {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a public pool's addresses come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublicIpSource {
    #[default]
    None,
    /// Addresses owned by the cloud provider
    ProviderOwned,
    /// Bring-your-own addresses
    Byoip,
}

/// Tag key/value a resource must carry to allocate from a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRestriction {
    pub key: String,
    pub value: String,
}

/// Options for creating a pool
#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    /// IPv4 when unset. Child pools take the parent's family and reject a different one
    pub family: Option<AddressFamily>,
    /// Child pools inherit the parent's locale when this is unset
    pub locale: Option<Locale>,
    pub public_ip_source: PublicIpSource,
    pub advertise_service: Option<String>,
    /// Prefix used for allocations that do not ask for a size
    pub default_netmask_length: Option<u8>,
}

/// A node in the pool tree
#[derive(Debug, Clone, Serialize)]
pub struct Pool {
    #[serde(serialize_with = "super::serialize_display")]
    pub(crate) id: PoolId,
    pub(crate) name: Option<String>,
    pub(crate) handle: String,
    pub(crate) description: Option<String>,
    pub(crate) family: AddressFamily,
    pub(crate) visibility: ScopeVisibility,
    #[serde(serialize_with = "super::serialize_display")]
    pub(crate) scope: ScopeId,
    #[serde(serialize_with = "super::serialize_display_opt")]
    pub(crate) parent: Option<PoolId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) locale: Option<Locale>,
    pub(crate) public_ip_source: PublicIpSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) advertise_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) default_netmask_length: Option<u8>,
    pub(crate) provisioned_cidrs: Vec<AddressBlock>,
    pub(crate) tag_restrictions: Vec<TagRestriction>,
    #[serde(serialize_with = "super::serialize_display_seq")]
    pub(crate) children: Vec<PoolId>,
    #[serde(serialize_with = "super::serialize_display_seq")]
    pub(crate) allocations: Vec<AllocationId>,
}

impl Pool {
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Display name, falling back to the pool id
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Opaque handle downstream resources reference the pool by
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn visibility(&self) -> ScopeVisibility {
        self.visibility
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn parent(&self) -> Option<PoolId> {
        self.parent
    }

    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    pub fn public_ip_source(&self) -> PublicIpSource {
        self.public_ip_source
    }

    pub fn advertise_service(&self) -> Option<&str> {
        self.advertise_service.as_deref()
    }

    pub fn default_netmask_length(&self) -> Option<u8> {
        self.default_netmask_length
    }

    pub fn provisioned_cidrs(&self) -> &[AddressBlock] {
        &self.provisioned_cidrs
    }

    pub fn tag_restrictions(&self) -> &[TagRestriction] {
        &self.tag_restrictions
    }

    pub fn children(&self) -> &[PoolId] {
        &self.children
    }

    pub fn allocations(&self) -> &[AllocationId] {
        &self.allocations
    }

    /// Add a tag restriction; keys are unique per pool
    pub(crate) fn add_tag_restriction(&mut self, key: impl Into<String>, value: impl Into<String>) -> PlanResult<()> {
        let key = key.into();
        if self.tag_restrictions.iter().any(|t| t.key == key) {
            return Err(PlanError::DuplicateTagRestrictionKey {
                key,
                pool: self.name(),
            });
        }
        self.tag_restrictions.push(TagRestriction {
            key,
            value: value.into(),
        });
        Ok(())
    }

    pub fn supports_nesting(&self) -> bool {
        nesting_supported(self.advertise_service.as_deref(), self.public_ip_source)
    }
}

/// Pools advertised through a service with BYOIP space cannot be subdivided
pub fn nesting_supported(advertise_service: Option<&str>, source: PublicIpSource) -> bool {
    let advertised = advertise_service.map_or(false, |s| !s.is_empty());
    !(advertised && source == PublicIpSource::Byoip)
}

/// Decide a child pool's locale.
///
/// Two concrete locales must match; anything deferred passes and is left
/// for the provisioning layer. A child without a locale inherits the parent's.
pub fn effective_child_locale(parent: Option<&Locale>, child: Option<&Locale>) -> PlanResult<Option<Locale>> {
    match (parent, child) {
        (Some(Locale::Concrete(p)), Some(Locale::Concrete(c))) if p != c => Err(PlanError::LocaleMismatch {
            parent: p.clone(),
            child: c.clone(),
        }),
        (_, Some(child)) => Ok(Some(child.clone())),
        (parent, None) => Ok(parent.cloned()),
    }
}
