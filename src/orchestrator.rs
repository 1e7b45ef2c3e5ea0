//! Planning pass orchestrator.
//!
//! A pass builds the IPAM tree from the plan file, then splits every network
//! into tiered subnets. The outcome is a serializable [`PlanReport`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use ipnet::IpNet;
use log::{info, warn};
use serde::Serialize;

use crate::block::{AddressFamily, Resolver, SymbolicPartitioner};
use crate::config::{IpamConfig, NetworkConfig, PlanConfig, PoolConfig, DEFAULT_SCOPE};
use crate::error::{PlanError, PlanResult};
use crate::ipam::{
    Allocation, AllocateOptions, CidrRequest, DiscoveryAssociation, Ipam, Pool, PoolId, PoolOptions, Scope, ScopeId,
    ScopeOptions,
};
use crate::tiered::{SubnetSource, TierPlan, TieredAllocator};
use crate::utils::{parse_block, parse_locale};

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Outcome of a planning pass
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<IpamReport>,
    pub networks: Vec<NetworkReport>,
}

#[derive(Debug, Serialize)]
pub struct IpamReport {
    pub name: String,
    pub operating_regions: Vec<String>,
    pub discoveries: Vec<DiscoveryAssociation>,
    pub scopes: Vec<Scope>,
    pub pools: Vec<Pool>,
    pub allocations: Vec<Allocation>,
}

impl From<&Ipam> for IpamReport {
    fn from(ipam: &Ipam) -> Self {
        IpamReport {
            name: ipam.name().to_string(),
            operating_regions: ipam.operating_regions().to_vec(),
            discoveries: ipam.discoveries().to_vec(),
            scopes: ipam.scopes().to_vec(),
            pools: ipam.pools().to_vec(),
            allocations: ipam.allocations().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkReport {
    pub name: String,
    pub plan: TierPlan,
    /// Concrete subnets, when every deferred value of the plan is bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<Vec<ResolvedSubnet>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSubnet {
    pub tier: String,
    pub zone: String,
    pub cidr: IpNet,
}

/// Run a planning pass over `config`.
///
/// `resolver` carries concrete values for deferred tokens. When it has any
/// bindings, pool CIDRs are re-checked for duplicates and network subnets are
/// resolved where possible.
pub fn build_plan(config: &PlanConfig, resolver: &Resolver) -> Result<PlanReport> {
    let mut ipam = Ipam::new(config.general.ipam_name.clone());
    let mut pools = HashMap::new();
    if let Some(ipam_config) = &config.ipam {
        pools = build_ipam(&mut ipam, ipam_config)
            .wrap_err_with(|| format!("Failed to build IPAM '{}'", config.general.ipam_name))?;
    }

    let mut networks = Vec::with_capacity(config.networks.len());
    for network in &config.networks {
        let plan = plan_network(&ipam, &pools, network)
            .wrap_err_with(|| format!("Failed to plan network '{}'", network.name))?;
        let resolved = if resolver.is_empty() {
            None
        } else {
            resolve_network(&plan, resolver, &network.name)?
        };
        networks.push(NetworkReport {
            name: network.name.clone(),
            plan,
            resolved,
        });
    }

    if !resolver.is_empty() {
        match ipam.revalidate_pool_cidrs(resolver) {
            Ok(()) => info!("Pool CIDRs revalidated against resolved values"),
            Err(PlanError::UnresolvedToken(token)) => {
                warn!("Skipping pool CIDR revalidation, no value bound for '{}'", token)
            }
            Err(e) => return Err(e).wrap_err("Resolved pool CIDRs conflict"),
        }
    }

    Ok(PlanReport {
        generated_at: Utc::now(),
        ipam: config.ipam.as_ref().map(|_| IpamReport::from(&ipam)),
        networks,
    })
}

/// Build the IPAM tree described by `config`, returning pool ids by name
pub fn build_ipam(ipam: &mut Ipam, config: &IpamConfig) -> PlanResult<HashMap<String, PoolId>> {
    for region in &config.operating_regions {
        ipam.add_region(region.clone())?;
    }
    for discovery in &config.discoveries {
        ipam.associate_discovery(discovery);
    }

    let mut scopes: HashMap<String, ScopeId> = HashMap::new();
    scopes.insert("private".to_string(), ipam.private_scope());
    scopes.insert("public".to_string(), ipam.public_scope());
    for scope in &config.scopes {
        let id = ipam.add_scope(ScopeOptions {
            name: Some(scope.name.clone()),
            description: scope.description.clone(),
            visibility: scope.visibility,
        })?;
        scopes.insert(scope.name.clone(), id);
    }

    let mut pools = HashMap::new();
    for pool in &config.pools {
        let scope_name = pool.scope.as_deref().unwrap_or(DEFAULT_SCOPE);
        let scope = *scopes
            .get(scope_name)
            .ok_or_else(|| PlanError::UnknownScope(scope_name.to_string()))?;
        let id = ipam.add_pool(scope, pool_options(pool))?;
        populate_pool(ipam, id, pool, &mut pools)?;
    }

    for allocation in &config.allocations {
        let pool = *pools
            .get(&allocation.pool)
            .ok_or_else(|| PlanError::UnknownPool(allocation.pool.clone()))?;
        let family = ipam.pool(pool)?.family();
        let cidr = allocation
            .cidr
            .as_deref()
            .map(|value| parse_block(value, family, allocation.netmask_length))
            .transpose()?;
        ipam.allocate_cidr_from_pool(
            pool,
            AllocateOptions {
                cidr,
                netmask_length: allocation.netmask_length,
                resource: allocation.resource.clone(),
                description: allocation.description.clone(),
            },
        )?;
    }

    info!(
        "Built IPAM {} with {} scopes, {} pools and {} allocations",
        ipam.name(),
        ipam.scope_count(),
        ipam.pools().len(),
        ipam.allocations().len()
    );
    Ok(pools)
}

fn pool_options(pool: &PoolConfig) -> PoolOptions {
    PoolOptions {
        name: Some(pool.name.clone()),
        description: pool.description.clone(),
        family: pool.family,
        locale: pool.locale.as_deref().map(parse_locale),
        public_ip_source: pool.public_ip_source,
        advertise_service: pool.advertise_service.clone(),
        default_netmask_length: pool.default_netmask_length,
    }
}

/// Register a pool's CIDRs and tag restrictions, then build its children
fn populate_pool(
    ipam: &mut Ipam,
    id: PoolId,
    config: &PoolConfig,
    pools: &mut HashMap<String, PoolId>,
) -> PlanResult<()> {
    pools.insert(config.name.clone(), id);

    let family = ipam.pool(id)?.family();
    for restriction in &config.tag_restrictions {
        ipam.add_tag_restriction(id, &restriction.key, &restriction.value)?;
    }
    for cidr in &config.cidrs {
        let block = cidr
            .cidr
            .as_deref()
            .map(|value| parse_block(value, family, cidr.netmask_length))
            .transpose()?;
        ipam.add_cidr_to_pool(
            id,
            CidrRequest {
                cidr: block,
                netmask_length: cidr.netmask_length,
                inline: cidr.inline,
            },
        )?;
    }

    for child in &config.children {
        let child_id = ipam.add_child_pool(id, pool_options(child))?;
        populate_pool(ipam, child_id, child, pools)?;
    }
    Ok(())
}

/// Split one network into tiered subnets
pub fn plan_network(ipam: &Ipam, pools: &HashMap<String, PoolId>, network: &NetworkConfig) -> PlanResult<TierPlan> {
    let source = match (&network.cidr, &network.pool) {
        (Some(cidr), _) => {
            let family = network.family.unwrap_or(AddressFamily::Ipv4);
            SubnetSource::Block(parse_block(cidr, family, network.netmask_length)?)
        }
        (None, Some(pool)) => {
            let id = pools.get(pool).ok_or_else(|| PlanError::UnknownPool(pool.clone()))?;
            SubnetSource::from_pool(ipam.pool(*id)?)
        }
        (None, None) => {
            return Err(PlanError::MissingNetmask {
                source_ref: network.name.clone(),
            })
        }
    };

    let mut allocator = TieredAllocator::new(source);
    if let Some(prefix) = network.tier_prefix_length {
        allocator = allocator.with_tier_prefix_length(prefix);
    }
    for subnet in &network.subnets {
        allocator.request(subnet.clone());
    }
    allocator.allocate(&SymbolicPartitioner)
}

/// Resolve every subnet of a plan; `None` when some token is unbound
fn resolve_network(plan: &TierPlan, resolver: &Resolver, name: &str) -> Result<Option<Vec<ResolvedSubnet>>> {
    let mut resolved = Vec::with_capacity(plan.len());
    for (tier, zone, block) in plan.iter() {
        match resolver.resolve(block) {
            Ok(cidr) => resolved.push(ResolvedSubnet {
                tier: tier.to_string(),
                zone: zone.to_string(),
                cidr,
            }),
            Err(PlanError::UnresolvedToken(token)) => {
                warn!("Network {} stays deferred, no value bound for '{}'", name, token);
                return Ok(None);
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("Failed to resolve {}/{} of network '{}'", tier, zone, name))
            }
        }
    }
    Ok(Some(resolved))
}

/// Render a report in the requested format
pub fn render_report(report: &PlanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(report).wrap_err("Failed to serialize report as YAML"),
        OutputFormat::Json => serde_json::to_string_pretty(report).wrap_err("Failed to serialize report as JSON"),
    }
}

/// Write a report to `path`, creating parent directories as needed
pub fn write_report(report: &PlanReport, path: &Path, format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create output directory '{}'", parent.display()))?;
    }
    let rendered = render_report(report, format)?;
    fs::write(path, rendered).wrap_err_with(|| format!("Failed to write report '{}'", path.display()))?;
    info!("Wrote plan report to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(yaml: &str) -> PlanConfig {
        let config: PlanConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        config
    }

    const PLAN: &str = r#"
ipam:
  operating_regions: [us-west-2]
  pools:
    - name: root
      locale: us-west-2
      cidrs:
        - cidr: 10.0.0.0/8
      children:
        - name: dev
          cidrs:
            - netmask_length: 12
  allocations:
    - pool: dev
      netmask_length: 16
      resource: vpc-dev
networks:
  - name: vpc-dev
    cidr: 10.0.0.0/16
    subnets:
      - { tier: public, zone: az1 }
      - { tier: public, zone: az2 }
      - { tier: private, zone: az1 }
      - { tier: private, zone: az2 }
"#;

    #[test]
    fn test_build_plan() {
        let report = build_plan(&plan(PLAN), &Resolver::new()).unwrap();

        let ipam = report.ipam.as_ref().unwrap();
        assert_eq!(ipam.pools.len(), 2);
        assert_eq!(ipam.pools[1].locale().unwrap().to_string(), "us-west-2");
        assert_eq!(ipam.allocations.len(), 2);
        assert_eq!(ipam.allocations[1].resource(), Some("vpc-dev"));

        let network = &report.networks[0];
        assert_eq!(network.plan.get("private", "az2").unwrap().to_string(), "10.0.192.0/18");
        assert!(network.resolved.is_none());
    }

    #[test]
    fn test_build_plan_is_deterministic() {
        let config = plan(PLAN);
        let first = build_plan(&config, &Resolver::new()).unwrap();
        let second = build_plan(&config, &Resolver::new()).unwrap();
        assert_eq!(first.networks[0].plan, second.networks[0].plan);
    }

    #[test]
    fn test_deferred_network_resolves() {
        let config = plan(
            r#"
networks:
  - name: vpc
    cidr: "${vpc.cidr}"
    netmask_length: 16
    subnets:
      - { tier: public, zone: az1 }
      - { tier: private, zone: az1 }
"#,
        );
        let mut resolver = Resolver::new();
        resolver.bind("vpc.cidr", "10.42.0.0/16".parse().unwrap());

        let report = build_plan(&config, &resolver).unwrap();
        let resolved = report.networks[0].resolved.as_ref().unwrap();
        assert_eq!(resolved[0].cidr.to_string(), "10.42.0.0/17");
        assert_eq!(resolved[1].cidr.to_string(), "10.42.128.0/17");
    }

    #[test]
    fn test_pool_sourced_network() {
        let config = plan(
            r#"
ipam:
  pools: [{ name: root }]
networks:
  - name: vpc
    pool: root
    tier_prefix_length: 18
    subnets:
      - { tier: app, zone: az1 }
"#,
        );
        let report = build_plan(&config, &Resolver::new()).unwrap();
        let block = report.networks[0].plan.get("app", "az1").unwrap();
        assert!(!block.is_resolved());
        assert_eq!(block.prefix_len(), Some(18));
    }

    #[test]
    fn test_pool_sourced_network_without_tier_mask() {
        let config = plan(
            r#"
ipam:
  pools: [{ name: root }]
networks:
  - name: vpc
    pool: root
    subnets:
      - { tier: app, zone: az1 }
"#,
        );
        let err = build_plan(&config, &Resolver::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::MissingNetmask { .. })
        ));
    }

    #[test]
    fn test_locale_mismatch_aborts_pass() {
        let config = plan(
            r#"
ipam:
  pools:
    - name: root
      locale: us-west-2
      children:
        - name: east
          locale: us-east-1
"#,
        );
        let err = build_plan(&config, &Resolver::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::LocaleMismatch { .. })
        ));
    }

    #[test]
    fn test_render_formats() {
        let report = build_plan(&plan(PLAN), &Resolver::new()).unwrap();
        let yaml = render_report(&report, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("10.0.64.0/18"));
        let json = render_report(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["networks"][0]["plan"]["tiers"][0]["tier"], "public");
        assert_eq!(value["ipam"]["pools"][0]["id"], "ipam-pool-0001");
    }
}
