//! Planning errors.
//!
//! Every failure raised by the allocation engine is terminal for the
//! planning pass: nothing here is transient, so callers should surface
//! the error rather than retry.

use crate::block::AddressFamily;

/// Errors that can occur while building or resolving an address plan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Prefix length /{prefix} is invalid for {family} (maximum /{max})")]
    InvalidPrefixLength {
        prefix: u8,
        family: AddressFamily,
        max: u8,
    },

    #[error("Cannot fit {count} children into a /{parent_prefix} {family} block")]
    AddressSpaceExhausted {
        parent_prefix: u8,
        count: usize,
        family: AddressFamily,
    },

    #[error("Requested child prefix /{requested} is wider than the narrowest feasible /{minimum}")]
    PrefixTooWide { requested: u8, minimum: u8 },

    #[error("Cannot partition a block into zero children")]
    EmptyPartition,

    #[error("Invalid CIDR '{literal}': {reason}")]
    InvalidCidr { literal: String, reason: String },

    #[error("CIDR {cidr} is already provisioned in pool {pool}")]
    DuplicateCidr { cidr: String, pool: String },

    #[error("{family_found} value {value} does not belong in a {family_expected} pool")]
    FamilyMismatch {
        value: String,
        family_expected: AddressFamily,
        family_found: AddressFamily,
    },

    #[error("Child pool locale '{child}' does not match parent locale '{parent}'")]
    LocaleMismatch { parent: String, child: String },

    #[error("Pool {pool} advertises through '{service}' with BYOIP addresses and cannot have child pools")]
    NestingUnsupported { pool: String, service: String },

    #[error("Tag restriction key '{key}' already exists on pool {pool}")]
    DuplicateTagRestrictionKey { key: String, pool: String },

    #[error("Scope quota of {quota} reached for {ipam}")]
    ScopeQuotaExceeded { ipam: String, quota: usize },

    #[error("Operating region '{region}' is already registered")]
    DuplicateRegion { region: String },

    #[error("A netmask length is required when allocating from {source_ref}")]
    MissingNetmask { source_ref: String },

    #[error("Tier mask /{requested} cannot fit {tiers} tiers (needs at least /{minimum})")]
    TierMaskTooNarrow {
        requested: u8,
        minimum: u8,
        tiers: usize,
    },

    #[error("Subnets in tier '{tier}' request different sizes ({first} and {second})")]
    InconsistentSubnetSize {
        tier: String,
        first: String,
        second: String,
    },

    #[error("Subnet mask /{requested} in tier '{tier}' cannot fit {zones} zones (needs at least /{minimum})")]
    SubnetMaskTooNarrow {
        tier: String,
        requested: u8,
        minimum: u8,
        zones: usize,
    },

    #[error("Subnet for tier '{tier}' and zone '{zone}' is requested more than once")]
    DuplicateSubnetRequest { tier: String, zone: String },

    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    #[error("Unknown scope: {0}")]
    UnknownScope(String),

    #[error("No concrete value bound for deferred token '{0}'")]
    UnresolvedToken(String),
}

/// Convenience alias used across the engine
pub type PlanResult<T> = Result<T, PlanError>;
