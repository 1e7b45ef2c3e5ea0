//! Tiered subnet allocation.
//!
//! Subdivides one address block into per-tier, per-zone subnets. Each
//! requested subnet names a tier (e.g. `public`, `private`), a zone (an
//! availability domain) and optionally an explicit size.

pub mod allocator;
pub mod request;

pub use allocator::{TierAssignment, TierPlan, TieredAllocator, ZoneAssignment};
pub use request::{RequestedSubnet, SubnetSource};
