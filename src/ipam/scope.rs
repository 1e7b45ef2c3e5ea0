//! IPAM scopes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::pool::PoolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipam-scope-{:04}", self.0)
    }
}

/// Address space a scope's pools draw from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeVisibility {
    #[default]
    Private,
    Public,
}

impl ScopeVisibility {
    /// Public-address options (IP source, advertising) only apply to public pools
    pub fn allows_public_options(self) -> bool {
        self == ScopeVisibility::Public
    }
}

impl fmt::Display for ScopeVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeVisibility::Private => write!(f, "private"),
            ScopeVisibility::Public => write!(f, "public"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScopeOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub visibility: ScopeVisibility,
}

/// Top-level grouping of pools inside an IPAM
#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    #[serde(serialize_with = "super::serialize_display")]
    pub(crate) id: ScopeId,
    pub(crate) name: Option<String>,
    pub(crate) handle: String,
    pub(crate) description: Option<String>,
    pub(crate) visibility: ScopeVisibility,
    /// Created together with the IPAM rather than requested
    pub(crate) is_default: bool,
    #[serde(serialize_with = "super::serialize_display_seq")]
    pub(crate) pools: Vec<PoolId>,
}

impl Scope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn visibility(&self) -> ScopeVisibility {
        self.visibility
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Top-level pools, in creation order
    pub fn pools(&self) -> &[PoolId] {
        &self.pools
    }
}
