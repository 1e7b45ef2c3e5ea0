//! IP address management: scopes, pools and allocations.
//!
//! [`Ipam`] is the top-level container. It owns every scope, pool and
//! allocation created during a planning pass in flat arenas; the tree
//! structure is expressed with ids (a pool knows its parent and children by
//! [`PoolId`]), so no node ever holds a pointer to another.
//!
//! ## Lifecycle
//!
//! 1. `Ipam::new` creates the container with its default private and public scopes
//! 2. scopes and top-level pools are added with `add_scope` / `add_pool`
//! 3. pools are nested with `add_child_pool` and filled with `add_cidr_to_pool`
//! 4. consumers carve blocks with `allocate_cidr_from_pool`
//!
//! Nothing is ever removed during a pass.

pub mod allocation;
pub mod pool;
pub mod scope;

use std::collections::HashSet;
use std::fmt::Display;

use log::{debug, info, warn};
use serde::Serializer;

use crate::block::{validate_prefix, AddressBlock, AddressFamily, Resolver};
use crate::error::{PlanError, PlanResult};

pub use allocation::{
    AllocateOptions, Allocation, AllocationId, AllocationKind, CidrRegistration, CidrRequest, RequestedSize,
};
pub use pool::{effective_child_locale, nesting_supported, Locale, Pool, PoolId, PoolOptions, PublicIpSource, TagRestriction};
pub use scope::{Scope, ScopeId, ScopeOptions, ScopeVisibility};

/// Maximum number of scopes per IPAM, default scopes included
pub const SCOPE_QUOTA: usize = 5;

/// Link between the IPAM and an external resource discovery
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DiscoveryAssociation {
    pub id: String,
    /// Address of the discovery this association points at
    pub discovery: String,
}

/// Top-level address management container
#[derive(Debug, Clone)]
pub struct Ipam {
    name: String,
    handle: String,
    operating_regions: Vec<String>,
    discoveries: Vec<DiscoveryAssociation>,
    scopes: Vec<Scope>,
    pools: Vec<Pool>,
    allocations: Vec<Allocation>,
    private_scope: ScopeId,
    public_scope: ScopeId,
}

impl Ipam {
    /// Create an IPAM with its default private and public scopes
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let handle = format!("ipam/{}", name);
        let mut ipam = Ipam {
            name,
            handle,
            operating_regions: Vec::new(),
            discoveries: Vec::new(),
            scopes: Vec::new(),
            pools: Vec::new(),
            allocations: Vec::new(),
            private_scope: ScopeId(1),
            public_scope: ScopeId(2),
        };
        ipam.private_scope = ipam.push_scope(Some("private".to_string()), None, ScopeVisibility::Private, true);
        ipam.public_scope = ipam.push_scope(Some("public".to_string()), None, ScopeVisibility::Public, true);
        ipam
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn private_scope(&self) -> ScopeId {
        self.private_scope
    }

    pub fn public_scope(&self) -> ScopeId {
        self.public_scope
    }

    pub fn operating_regions(&self) -> &[String] {
        &self.operating_regions
    }

    pub fn discoveries(&self) -> &[DiscoveryAssociation] {
        &self.discoveries
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn scope(&self, id: ScopeId) -> PlanResult<&Scope> {
        self.scopes
            .get(id.0.wrapping_sub(1))
            .ok_or_else(|| PlanError::UnknownScope(id.to_string()))
    }

    pub fn pool(&self, id: PoolId) -> PlanResult<&Pool> {
        self.pools
            .get(id.0.wrapping_sub(1))
            .ok_or_else(|| PlanError::UnknownPool(id.to_string()))
    }

    fn pool_mut(&mut self, id: PoolId) -> PlanResult<&mut Pool> {
        self.pools
            .get_mut(id.0.wrapping_sub(1))
            .ok_or_else(|| PlanError::UnknownPool(id.to_string()))
    }

    pub fn allocation(&self, id: AllocationId) -> Option<&Allocation> {
        self.allocations.get(id.0.wrapping_sub(1))
    }

    /// Look a pool up by its configured name
    pub fn find_pool(&self, name: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.name.as_deref() == Some(name))
    }

    /// Look a scope up by its configured name
    pub fn find_scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.name.as_deref() == Some(name))
    }

    /// Register an operating region; each region may appear once
    pub fn add_region(&mut self, region: impl Into<String>) -> PlanResult<()> {
        let region = region.into();
        if self.operating_regions.contains(&region) {
            return Err(PlanError::DuplicateRegion { region });
        }
        debug!("Adding operating region {} to {}", region, self.handle);
        self.operating_regions.push(region);
        Ok(())
    }

    /// Associate a resource discovery.
    ///
    /// Associations are keyed by the discovery's address, so repeating the
    /// call for the same discovery returns the existing association.
    pub fn associate_discovery(&mut self, discovery: &str) -> &DiscoveryAssociation {
        let key = discovery.trim();
        if let Some(index) = self.discoveries.iter().position(|d| d.discovery == key) {
            debug!("Discovery {} is already associated with {}", key, self.handle);
            return &self.discoveries[index];
        }

        let association = DiscoveryAssociation {
            id: format!("{}/discovery-association/{}", self.handle, key),
            discovery: key.to_string(),
        };
        info!("Associated discovery {} with {}", key, self.handle);
        self.discoveries.push(association);
        &self.discoveries[self.discoveries.len() - 1]
    }

    /// Create a scope, subject to [`SCOPE_QUOTA`]
    pub fn add_scope(&mut self, options: ScopeOptions) -> PlanResult<ScopeId> {
        if self.scopes.len() >= SCOPE_QUOTA {
            return Err(PlanError::ScopeQuotaExceeded {
                ipam: self.handle.clone(),
                quota: SCOPE_QUOTA,
            });
        }
        let id = self.push_scope(options.name, options.description, options.visibility, false);
        info!("Created {} scope {}", options.visibility, id);
        Ok(id)
    }

    fn push_scope(
        &mut self,
        name: Option<String>,
        description: Option<String>,
        visibility: ScopeVisibility,
        is_default: bool,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() + 1);
        self.scopes.push(Scope {
            id,
            name,
            handle: format!("{}/{}", self.handle, id),
            description,
            visibility,
            is_default,
            pools: Vec::new(),
        });
        id
    }

    /// Create a top-level pool in `scope`
    pub fn add_pool(&mut self, scope: ScopeId, options: PoolOptions) -> PlanResult<PoolId> {
        let visibility = self.scope(scope)?.visibility;
        let family = options.family.unwrap_or_default();
        let id = self.push_pool(scope, visibility, family, None, options.locale.clone(), options)?;
        if let Some(scope) = self.scopes.get_mut(scope.0 - 1) {
            scope.pools.push(id);
        }
        Ok(id)
    }

    /// Create a child pool under `parent`.
    ///
    /// The child shares the parent's family and scope. Concrete locales must
    /// match; a child without a locale inherits the parent's.
    pub fn add_child_pool(&mut self, parent: PoolId, options: PoolOptions) -> PlanResult<PoolId> {
        let parent_pool = self.pool(parent)?;
        if !parent_pool.supports_nesting() {
            return Err(PlanError::NestingUnsupported {
                pool: parent_pool.name(),
                service: parent_pool.advertise_service.clone().unwrap_or_default(),
            });
        }
        if let Some(family) = options.family {
            if family != parent_pool.family {
                return Err(PlanError::FamilyMismatch {
                    value: options.name.clone().unwrap_or_else(|| "child pool".to_string()),
                    family_expected: parent_pool.family,
                    family_found: family,
                });
            }
        }
        let locale = effective_child_locale(parent_pool.locale.as_ref(), options.locale.as_ref())?;
        let (scope, visibility, family) = (parent_pool.scope, parent_pool.visibility, parent_pool.family);

        let id = self.push_pool(scope, visibility, family, Some(parent), locale, options)?;
        self.pool_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn push_pool(
        &mut self,
        scope: ScopeId,
        visibility: ScopeVisibility,
        family: AddressFamily,
        parent: Option<PoolId>,
        locale: Option<Locale>,
        options: PoolOptions,
    ) -> PlanResult<PoolId> {
        if let Some(netmask) = options.default_netmask_length {
            validate_prefix(netmask, family)?;
        }

        let mut public_ip_source = options.public_ip_source;
        let mut advertise_service = options.advertise_service;
        if !visibility.allows_public_options() && (public_ip_source != PublicIpSource::None || advertise_service.is_some()) {
            warn!(
                "Pool {} is in a private scope; ignoring public IP source and advertise service",
                options.name.as_deref().unwrap_or("<unnamed>")
            );
            public_ip_source = PublicIpSource::None;
            advertise_service = None;
        }

        if let Some(Locale::Concrete(region)) = &locale {
            if !self.operating_regions.is_empty() && !self.operating_regions.contains(region) {
                warn!("Pool locale {} is not one of the operating regions {:?}", region, self.operating_regions);
            }
        }

        let id = PoolId(self.pools.len() + 1);
        let pool = Pool {
            id,
            name: options.name,
            handle: format!("{}/{}", self.handle, id),
            description: options.description,
            family,
            visibility,
            scope,
            parent,
            locale,
            public_ip_source,
            advertise_service,
            default_netmask_length: options.default_netmask_length,
            provisioned_cidrs: Vec::new(),
            tag_restrictions: Vec::new(),
            children: Vec::new(),
            allocations: Vec::new(),
        };
        match parent {
            Some(parent) => info!("Created {} pool {} under {}", family, pool.name(), parent),
            None => info!("Created {} pool {} in {}", family, pool.name(), scope),
        }
        self.pools.push(pool);
        Ok(id)
    }

    /// Add address space to a pool.
    ///
    /// An inline request naming a literal block registers it directly on the
    /// pool after a duplicate check. Everything else becomes a provisioning
    /// allocation resolved by the provisioning layer. An inline request that
    /// cannot produce a literal falls back to that path with a warning; the
    /// resulting block is not checked against earlier inline registrations
    /// until [`Ipam::revalidate_pool_cidrs`] runs on resolved values.
    pub fn add_cidr_to_pool(&mut self, pool: PoolId, request: CidrRequest) -> PlanResult<CidrRegistration> {
        let (family, pool_name) = {
            let p = self.pool(pool)?;
            (p.family, p.name())
        };
        if let Some(cidr) = &request.cidr {
            check_family(family, cidr)?;
        }
        if let Some(netmask) = request.netmask_length {
            validate_prefix(netmask, family)?;
        }

        if let Some(literal) = request.literal() {
            self.check_duplicate(pool, literal)?;
        }

        if request.inline {
            if let Some(literal) = request.literal().cloned() {
                info!("Registered {} inline on pool {}", literal, pool_name);
                self.pool_mut(pool)?.provisioned_cidrs.push(literal.clone());
                return Ok(CidrRegistration::Inline(literal));
            }
            warn!(
                "Pool {} cannot register {} inline because it is not a literal CIDR; \
                 falling back to a deferred allocation that is not checked against inline CIDRs",
                pool_name,
                request
                    .cidr
                    .as_ref()
                    .map(|c| c.to_string())
                    .or_else(|| request.netmask_length.map(|n| format!("/{}", n)))
                    .unwrap_or_else(|| "a default-sized block".to_string())
            );
        }

        let id = self.push_allocation(
            pool,
            AllocationKind::Provision,
            request.cidr,
            request.netmask_length,
            None,
            None,
        )?;
        Ok(CidrRegistration::Deferred(id))
    }

    /// Carve a block out of a pool for a consumer.
    ///
    /// The pool's provisioned CIDRs are left untouched.
    pub fn allocate_cidr_from_pool(&mut self, pool: PoolId, options: AllocateOptions) -> PlanResult<AllocationId> {
        let family = self.pool(pool)?.family;
        if let Some(cidr) = &options.cidr {
            check_family(family, cidr)?;
        }
        if let Some(netmask) = options.netmask_length {
            validate_prefix(netmask, family)?;
        }

        if let Some(net) = options.cidr.as_ref().and_then(|c| c.as_resolved()) {
            let provisioned = &self.pool(pool)?.provisioned_cidrs;
            let all_resolved = provisioned.iter().all(|c| c.is_resolved());
            let contained = provisioned.iter().filter_map(|c| c.as_resolved()).any(|p| p.contains(net));
            if all_resolved && !provisioned.is_empty() && !contained {
                warn!("Allocation {} lies outside every CIDR provisioned on pool {}", net, pool);
            }
        }

        self.push_allocation(
            pool,
            AllocationKind::Allocate,
            options.cidr,
            options.netmask_length,
            options.resource,
            options.description,
        )
    }

    fn push_allocation(
        &mut self,
        pool: PoolId,
        kind: AllocationKind,
        cidr: Option<AddressBlock>,
        netmask_length: Option<u8>,
        resource: Option<String>,
        description: Option<String>,
    ) -> PlanResult<AllocationId> {
        let source = self.pool(pool)?;
        let requested = match (&cidr, netmask_length) {
            (Some(block), Some(netmask)) => {
                if let Some(prefix) = block.prefix_len().filter(|p| *p != netmask) {
                    return Err(PlanError::InvalidCidr {
                        literal: block.to_string(),
                        reason: format!("netmask /{} disagrees with the block's /{}", netmask, prefix),
                    });
                }
                RequestedSize::Explicit(netmask)
            }
            (Some(block), None) => block.prefix_len().map_or(RequestedSize::Default, RequestedSize::Explicit),
            (None, Some(netmask)) => RequestedSize::Explicit(netmask),
            (None, None) => source
                .default_netmask_length
                .map_or(RequestedSize::Default, RequestedSize::Explicit),
        };

        let id = AllocationId(self.allocations.len() + 1);
        let handle = format!("{}/{}", source.handle, id);
        let block = cidr.unwrap_or_else(|| {
            let prefix = match requested {
                RequestedSize::Explicit(prefix) => Some(prefix),
                RequestedSize::Default => None,
            };
            AddressBlock::deferred(format!("{}.cidr", handle), source.family, prefix)
        });

        debug!("Allocation {} ({:?}) from pool {} resolves to {}", id, kind, pool, block);
        self.allocations.push(Allocation {
            id,
            handle,
            pool,
            kind,
            requested,
            block,
            resource,
            description,
        });
        self.pool_mut(pool)?.allocations.push(id);
        Ok(id)
    }

    /// Add a tag restriction to a pool
    pub fn add_tag_restriction(&mut self, pool: PoolId, key: &str, value: &str) -> PlanResult<()> {
        self.pool_mut(pool)?.add_tag_restriction(key, value)
    }

    /// Every block provisioned into a pool: inline CIDRs and provisioning allocations
    pub fn pool_cidrs(&self, pool: PoolId) -> PlanResult<Vec<&AddressBlock>> {
        let pool = self.pool(pool)?;
        let provisions = pool
            .allocations
            .iter()
            .filter_map(|id| self.allocation(*id))
            .filter(|a| a.kind == AllocationKind::Provision)
            .map(|a| &a.block);
        Ok(pool.provisioned_cidrs.iter().chain(provisions).collect())
    }

    fn check_duplicate(&self, pool: PoolId, literal: &AddressBlock) -> PlanResult<()> {
        // Deferred blocks never compare equal to a literal here
        if self.pool_cidrs(pool)?.into_iter().any(|c| c.is_resolved() && c == literal) {
            return Err(PlanError::DuplicateCidr {
                cidr: literal.to_string(),
                pool: self.pool(pool)?.name(),
            });
        }
        Ok(())
    }

    /// Re-check every pool for duplicate CIDRs once deferred values are known.
    ///
    /// This is the provisioning layer's half of the contract: duplicates
    /// involving deferred blocks cannot be seen during planning.
    pub fn revalidate_pool_cidrs(&self, resolver: &Resolver) -> PlanResult<()> {
        for pool in &self.pools {
            let mut seen = HashSet::new();
            for block in self.pool_cidrs(pool.id)? {
                let net = resolver.resolve(block)?;
                if !seen.insert(net) {
                    return Err(PlanError::DuplicateCidr {
                        cidr: net.to_string(),
                        pool: pool.name(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_family(family: AddressFamily, block: &AddressBlock) -> PlanResult<()> {
    if block.family() != family {
        return Err(PlanError::FamilyMismatch {
            value: block.to_string(),
            family_expected: family,
            family_found: block.family(),
        });
    }
    Ok(())
}

pub(crate) fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

pub(crate) fn serialize_display_opt<T: Display, S: Serializer>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::ptr_arg)]
pub(crate) fn serialize_display_seq<T: Display, S: Serializer>(
    values: &Vec<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(s: &str) -> AddressBlock {
        AddressBlock::parse_literal(s).unwrap()
    }

    fn concrete(s: &str) -> Option<Locale> {
        Some(Locale::Concrete(s.to_string()))
    }

    fn root_pool(ipam: &mut Ipam, locale: Option<Locale>) -> PoolId {
        let scope = ipam.private_scope();
        ipam.add_pool(
            scope,
            PoolOptions {
                name: Some("root".to_string()),
                locale,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_default_scopes() {
        let ipam = Ipam::new("main");
        assert_eq!(ipam.scope_count(), 2);
        assert_eq!(ipam.scope(ipam.private_scope()).unwrap().visibility(), ScopeVisibility::Private);
        assert_eq!(ipam.scope(ipam.public_scope()).unwrap().visibility(), ScopeVisibility::Public);
        assert!(ipam.scopes().iter().all(|s| s.is_default()));
    }

    #[test]
    fn test_scope_quota() {
        let mut ipam = Ipam::new("main");
        for _ in 0..(SCOPE_QUOTA - 2) {
            ipam.add_scope(ScopeOptions::default()).unwrap();
        }
        assert_eq!(ipam.scope_count(), SCOPE_QUOTA);
        assert!(matches!(
            ipam.add_scope(ScopeOptions::default()),
            Err(PlanError::ScopeQuotaExceeded { quota: SCOPE_QUOTA, .. })
        ));
    }

    #[test]
    fn test_duplicate_region() {
        let mut ipam = Ipam::new("main");
        ipam.add_region("us-east-1").unwrap();
        ipam.add_region("us-west-2").unwrap();
        assert_eq!(
            ipam.add_region("us-east-1"),
            Err(PlanError::DuplicateRegion {
                region: "us-east-1".to_string()
            })
        );
        assert_eq!(ipam.operating_regions(), &["us-east-1".to_string(), "us-west-2".to_string()]);
    }

    #[test]
    fn test_associate_discovery_is_idempotent() {
        let mut ipam = Ipam::new("main");
        let first = ipam.associate_discovery("ipam-res-disco-0123").clone();
        let second = ipam.associate_discovery("ipam-res-disco-0123").clone();
        assert_eq!(first, second);
        assert_eq!(ipam.discoveries().len(), 1);

        ipam.associate_discovery("ipam-res-disco-4567");
        assert_eq!(ipam.discoveries().len(), 2);
    }

    #[test]
    fn test_inline_duplicate_cidr() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);

        let registration = ipam.add_cidr_to_pool(pool, CidrRequest::inline(literal("10.0.0.0/8"))).unwrap();
        assert_eq!(registration, CidrRegistration::Inline(literal("10.0.0.0/8")));

        let err = ipam.add_cidr_to_pool(pool, CidrRequest::inline(literal("10.0.0.0/8"))).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateCidr { .. }));
        assert_eq!(ipam.pool(pool).unwrap().provisioned_cidrs().len(), 1);
    }

    #[test]
    fn test_inline_fallback_creates_allocation() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);

        let request = CidrRequest {
            cidr: None,
            netmask_length: Some(16),
            inline: true,
        };
        let registration = ipam.add_cidr_to_pool(pool, request).unwrap();
        let CidrRegistration::Deferred(id) = registration else {
            panic!("expected a deferred registration");
        };

        let allocation = ipam.allocation(id).unwrap();
        assert_eq!(allocation.kind(), AllocationKind::Provision);
        assert_eq!(allocation.requested(), RequestedSize::Explicit(16));
        assert!(!allocation.block().is_resolved());
        assert!(ipam.pool(pool).unwrap().provisioned_cidrs().is_empty());
    }

    #[test]
    fn test_non_inline_literal_is_provisioned_by_allocation() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);

        let request = CidrRequest {
            cidr: Some(literal("10.0.0.0/16")),
            netmask_length: None,
            inline: false,
        };
        let CidrRegistration::Deferred(id) = ipam.add_cidr_to_pool(pool, request.clone()).unwrap() else {
            panic!("expected a deferred registration");
        };
        assert_eq!(ipam.allocation(id).unwrap().block(), &literal("10.0.0.0/16"));

        assert!(matches!(
            ipam.add_cidr_to_pool(pool, CidrRequest::inline(literal("10.0.0.0/16"))),
            Err(PlanError::DuplicateCidr { .. })
        ));
    }

    #[test]
    fn test_cidr_family_mismatch() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);
        let err = ipam.add_cidr_to_pool(pool, CidrRequest::inline(literal("2001:db8::/32"))).unwrap_err();
        assert!(matches!(err, PlanError::FamilyMismatch { .. }));
    }

    #[test]
    fn test_child_locale_mismatch() {
        let mut ipam = Ipam::new("main");
        let root = root_pool(&mut ipam, concrete("us-west-2"));
        let err = ipam
            .add_child_pool(
                root,
                PoolOptions {
                    locale: concrete("us-east-1"),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::LocaleMismatch { .. }));
        assert!(ipam.pool(root).unwrap().children().is_empty());
    }

    #[test]
    fn test_child_inherits_locale_family_and_scope() {
        let mut ipam = Ipam::new("main");
        let scope = ipam.private_scope();
        let root = ipam
            .add_pool(
                scope,
                PoolOptions {
                    family: Some(AddressFamily::Ipv6),
                    locale: concrete("us-west-2"),
                    ..Default::default()
                },
            )
            .unwrap();
        let child = ipam.add_child_pool(root, PoolOptions::default()).unwrap();

        let child = ipam.pool(child).unwrap();
        assert_eq!(child.locale(), concrete("us-west-2").as_ref());
        assert_eq!(child.family(), AddressFamily::Ipv6);
        assert_eq!(child.scope(), scope);
        assert_eq!(child.parent(), Some(root));
        assert_eq!(ipam.pool(root).unwrap().children(), &[child.id()]);
        assert_eq!(ipam.scope(scope).unwrap().pools(), &[root]);
    }

    #[test]
    fn test_child_family_mismatch() {
        let mut ipam = Ipam::new("main");
        let root = root_pool(&mut ipam, None);
        let err = ipam
            .add_child_pool(
                root,
                PoolOptions {
                    family: Some(AddressFamily::Ipv6),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::FamilyMismatch { .. }));
    }

    #[test]
    fn test_byoip_advertised_pool_cannot_nest() {
        let mut ipam = Ipam::new("main");
        let scope = ipam.public_scope();
        let pool = ipam
            .add_pool(
                scope,
                PoolOptions {
                    name: Some("byoip".to_string()),
                    public_ip_source: PublicIpSource::Byoip,
                    advertise_service: Some("ec2".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = ipam.add_child_pool(pool, PoolOptions::default()).unwrap_err();
        assert_eq!(
            err,
            PlanError::NestingUnsupported {
                pool: "byoip".to_string(),
                service: "ec2".to_string(),
            }
        );
    }

    #[test]
    fn test_private_pool_drops_public_options() {
        let mut ipam = Ipam::new("main");
        let scope = ipam.private_scope();
        let pool = ipam
            .add_pool(
                scope,
                PoolOptions {
                    public_ip_source: PublicIpSource::Byoip,
                    advertise_service: Some("ec2".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let pool_ref = ipam.pool(pool).unwrap();
        assert_eq!(pool_ref.public_ip_source(), PublicIpSource::None);
        assert!(pool_ref.supports_nesting());
        assert!(ipam.add_child_pool(pool, PoolOptions::default()).is_ok());
    }

    #[test]
    fn test_allocate_does_not_touch_provisioned_cidrs() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);
        ipam.add_cidr_to_pool(pool, CidrRequest::inline(literal("10.0.0.0/8"))).unwrap();

        let id = ipam
            .allocate_cidr_from_pool(
                pool,
                AllocateOptions {
                    netmask_length: Some(20),
                    resource: Some("vpc-main".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let allocation = ipam.allocation(id).unwrap();
        assert_eq!(allocation.kind(), AllocationKind::Allocate);
        assert_eq!(allocation.resource(), Some("vpc-main"));
        assert_eq!(allocation.block().prefix_len(), Some(20));
        assert_eq!(ipam.pool(pool).unwrap().provisioned_cidrs(), &[literal("10.0.0.0/8")]);
        assert_eq!(ipam.pool(pool).unwrap().allocations(), &[id]);
    }

    #[test]
    fn test_allocate_uses_pool_default_netmask() {
        let mut ipam = Ipam::new("main");
        let scope = ipam.private_scope();
        let pool = ipam
            .add_pool(
                scope,
                PoolOptions {
                    default_netmask_length: Some(24),
                    ..Default::default()
                },
            )
            .unwrap();
        let id = ipam.allocate_cidr_from_pool(pool, AllocateOptions::default()).unwrap();
        assert_eq!(ipam.allocation(id).unwrap().requested(), RequestedSize::Explicit(24));

        let bare = root_pool(&mut ipam, None);
        let id = ipam.allocate_cidr_from_pool(bare, AllocateOptions::default()).unwrap();
        assert_eq!(ipam.allocation(id).unwrap().requested(), RequestedSize::Default);
        assert_eq!(ipam.allocation(id).unwrap().block().prefix_len(), None);
    }

    #[test]
    fn test_allocate_invalid_netmask() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);
        let err = ipam
            .allocate_cidr_from_pool(
                pool,
                AllocateOptions {
                    netmask_length: Some(40),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidPrefixLength { prefix: 40, .. }));
    }

    #[test]
    fn test_duplicate_tag_restriction() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);
        ipam.add_tag_restriction(pool, "team", "network").unwrap();
        assert!(matches!(
            ipam.add_tag_restriction(pool, "team", "platform"),
            Err(PlanError::DuplicateTagRestrictionKey { .. })
        ));
        assert_eq!(ipam.pool(pool).unwrap().tag_restrictions().len(), 1);
    }

    #[test]
    fn test_revalidate_catches_deferred_duplicate() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);
        ipam.add_cidr_to_pool(pool, CidrRequest::inline(literal("10.0.0.0/16"))).unwrap();
        let CidrRegistration::Deferred(id) = ipam.add_cidr_to_pool(pool, CidrRequest::netmask(16)).unwrap() else {
            panic!("expected a deferred registration");
        };

        let token = ipam.allocation(id).unwrap().handle().to_string() + ".cidr";
        let mut resolver = Resolver::new();
        resolver.bind(token.clone(), "10.0.0.0/16".parse().unwrap());
        assert!(matches!(
            ipam.revalidate_pool_cidrs(&resolver),
            Err(PlanError::DuplicateCidr { .. })
        ));

        let mut resolver = Resolver::new();
        resolver.bind(token, "10.1.0.0/16".parse().unwrap());
        assert!(ipam.revalidate_pool_cidrs(&resolver).is_ok());
    }

    #[test]
    fn test_revalidate_rejects_binding_of_other_width() {
        let mut ipam = Ipam::new("main");
        let pool = root_pool(&mut ipam, None);
        let CidrRegistration::Deferred(id) = ipam.add_cidr_to_pool(pool, CidrRequest::netmask(16)).unwrap() else {
            panic!("expected a deferred registration");
        };

        let mut resolver = Resolver::new();
        resolver.bind(ipam.allocation(id).unwrap().handle().to_string() + ".cidr", "10.0.0.0/8".parse().unwrap());
        assert!(matches!(
            ipam.revalidate_pool_cidrs(&resolver),
            Err(PlanError::InvalidCidr { .. })
        ));
    }

    #[test]
    fn test_unknown_pool() {
        let mut ipam = Ipam::new("main");
        assert!(matches!(
            ipam.add_child_pool(PoolId(42), PoolOptions::default()),
            Err(PlanError::UnknownPool(_))
        ));
    }
}
