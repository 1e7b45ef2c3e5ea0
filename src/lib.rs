//! # ipam-planner - Address space planning for cloud networks
//!
//! This library builds a hierarchical IP address management (IPAM) model
//! and splits network blocks into tiered, per-zone subnets. It plans; it
//! does not provision. Values the provisioning layer assigns later (pool
//! allocations, stack regions) are carried through the plan as deferred
//! expressions and can be resolved once they are known.
//!
//! ## Overview
//!
//! - **IPAM model**: scopes, nested pools, provisioned CIDRs and allocations
//!   with the locale, nesting and duplicate rules of a managed IPAM service
//! - **Tiered subnets**: one block per requested (tier, zone) pair, sized as
//!   large as the address space allows and stable across runs
//! - **Deferred values**: `${token}` values flow through both engines and
//!   resolve to exactly what a direct plan would have produced
//!
//! ## Architecture
//!
//! - `block`: address blocks, prefix arithmetic and the deferred partition seam
//! - `ipam`: scopes, pools and allocations
//! - `tiered`: the tiered subnet allocator
//! - `config`: plan file structures and validation
//! - `config_loader`: plan file loading
//! - `orchestrator`: a whole planning pass and its report
//! - `utils`: token parsing and validation helpers
//! - `error`: planning errors
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ipam_planner::block::Resolver;
//! use ipam_planner::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("plan.yaml"))?;
//! let report = orchestrator::build_plan(&config, &Resolver::new())?;
//! orchestrator::write_report(&report, Path::new("plan.out.yaml"), orchestrator::OutputFormat::Yaml)?;
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Plan Format
//!
//! ```yaml
//! general:
//!   ipam_name: main
//!   log_level: info
//!
//! ipam:
//!   operating_regions: [us-west-2]
//!   pools:
//!     - name: root
//!       locale: us-west-2
//!       cidrs:
//!         - cidr: 10.0.0.0/8
//!
//! networks:
//!   - name: vpc
//!     cidr: 10.0.0.0/16
//!     subnets:
//!       - { tier: public, zone: az1 }
//!       - { tier: private, zone: az1 }
//! ```
//!
//! ## Error Handling
//!
//! The engines return [`error::PlanError`]. Loading and orchestration use
//! `color_eyre` so that failures carry the plan file and network they came from.

pub mod block;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod ipam;
pub mod orchestrator;
pub mod tiered;
pub mod utils;
