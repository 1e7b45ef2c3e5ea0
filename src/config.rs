//! Plan file configuration.
//!
//! A plan file describes one IPAM (regions, scopes, a pool tree and
//! allocations) and any number of networks to split into tiered subnets.
//! Values the provisioning layer supplies later are written as `${token}`.

use serde::{Deserialize, Serialize};

use crate::block::AddressFamily;
use crate::ipam::{PublicIpSource, ScopeVisibility};
use crate::tiered::RequestedSubnet;
use crate::utils::validation::{validate_log_level, validate_unique_names};

/// Scope new pools land in when none is named
pub const DEFAULT_SCOPE: &str = "private";

/// Complete plan file
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam: Option<IpamConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkConfig>,
}

impl PlanConfig {
    /// Validate the configuration
    ///
    /// Only checks the file's shape: names, references and mutually
    /// exclusive fields. Address arithmetic is left to the planning pass.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = &self.general.log_level {
            validate_log_level(level).map_err(ValidationError::InvalidGeneral)?;
        }
        if self.general.ipam_name.trim().is_empty() {
            return Err(ValidationError::InvalidGeneral("ipam_name cannot be empty".to_string()));
        }

        let pool_names: Vec<&str> = match &self.ipam {
            Some(ipam) => {
                ipam.validate()?;
                ipam.all_pools().iter().map(|p| p.name.as_str()).collect()
            }
            None => Vec::new(),
        };

        validate_unique_names("network", self.networks.iter().map(|n| n.name.as_str()))
            .map_err(ValidationError::InvalidNetwork)?;
        for network in &self.networks {
            network.validate(&pool_names)?;
        }
        Ok(())
    }
}

/// General settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_ipam_name")]
    pub ipam_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

fn default_ipam_name() -> String {
    "main".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            ipam_name: default_ipam_name(),
            log_level: None,
        }
    }
}

/// IPAM definition
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IpamConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operating_regions: Vec<String>,
    /// Resource discovery addresses to associate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discoveries: Vec<String>,
    /// Extra scopes beyond the default `private` and `public` ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<ScopeConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<PoolConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<AllocationConfig>,
}

impl IpamConfig {
    /// Every pool in the tree, parents before children
    pub fn all_pools(&self) -> Vec<&PoolConfig> {
        fn walk<'a>(pools: &'a [PoolConfig], out: &mut Vec<&'a PoolConfig>) {
            for pool in pools {
                out.push(pool);
                walk(&pool.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.pools, &mut out);
        out
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let invalid = ValidationError::InvalidIpam;

        let scope_names: Vec<&str> = self.scopes.iter().map(|s| s.name.as_str()).collect();
        validate_unique_names("scope", scope_names.iter().copied()).map_err(invalid)?;
        if let Some(name) = scope_names.iter().find(|n| **n == "private" || **n == "public") {
            return Err(invalid(format!("Scope name '{}' is reserved for a default scope", name)));
        }

        let pools = self.all_pools();
        validate_unique_names("pool", pools.iter().map(|p| p.name.as_str())).map_err(invalid)?;

        for pool in &self.pools {
            let scope = pool.scope.as_deref().unwrap_or(DEFAULT_SCOPE);
            if scope != "private" && scope != "public" && !scope_names.contains(&scope) {
                return Err(invalid(format!("Pool '{}' references unknown scope '{}'", pool.name, scope)));
            }
        }
        for pool in &pools {
            for child in &pool.children {
                if child.scope.is_some() {
                    return Err(invalid(format!(
                        "Child pool '{}' cannot set a scope, it uses the scope of '{}'",
                        child.name, pool.name
                    )));
                }
            }
        }

        for allocation in &self.allocations {
            if !pools.iter().any(|p| p.name == allocation.pool) {
                return Err(invalid(format!("Allocation references unknown pool '{}'", allocation.pool)));
            }
        }
        Ok(())
    }
}

/// Additional scope
#[derive(Debug, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub name: String,
    #[serde(default)]
    pub visibility: ScopeVisibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Pool definition; `children` nest recursively
#[derive(Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    /// Scope name for top-level pools, `private` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<AddressFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Region name or `${token}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub public_ip_source: PublicIpSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_netmask_length: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cidrs: Vec<CidrConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_restrictions: Vec<TagRestrictionConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PoolConfig>,
}

/// Address space to add to a pool
#[derive(Debug, Serialize, Deserialize)]
pub struct CidrConfig {
    /// Literal CIDR or `${token}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask_length: Option<u8>,
    /// Register the literal on the pool directly
    #[serde(default = "default_inline")]
    pub inline: bool,
}

fn default_inline() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagRestrictionConfig {
    pub key: String,
    pub value: String,
}

/// Block carved out of a pool for a consumer
#[derive(Debug, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub pool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask_length: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Network to split into tiered subnets
#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    /// Source block, literal or `${token}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    /// Source pool name, as an alternative to `cidr`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    /// Known width of a deferred `cidr`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask_length: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<AddressFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_prefix_length: Option<u8>,
    pub subnets: Vec<RequestedSubnet>,
}

impl NetworkConfig {
    fn validate(&self, pool_names: &[&str]) -> Result<(), ValidationError> {
        match (&self.cidr, &self.pool) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidNetwork(format!(
                    "Network '{}' sets both cidr and pool",
                    self.name
                )))
            }
            (None, None) => {
                return Err(ValidationError::InvalidNetwork(format!(
                    "Network '{}' needs either cidr or pool",
                    self.name
                )))
            }
            (None, Some(pool)) if !pool_names.contains(&pool.as_str()) => {
                return Err(ValidationError::InvalidNetwork(format!(
                    "Network '{}' references unknown pool '{}'",
                    self.name, pool
                )))
            }
            _ => {}
        }

        if self.subnets.is_empty() {
            return Err(ValidationError::InvalidNetwork(format!(
                "Network '{}' does not request any subnets",
                self.name
            )));
        }
        for subnet in &self.subnets {
            if subnet.tier.trim().is_empty() || subnet.zone.trim().is_empty() {
                return Err(ValidationError::InvalidNetwork(format!(
                    "Network '{}' has a subnet without a tier or zone name",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid IPAM configuration: {0}")]
    InvalidIpam(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
}
