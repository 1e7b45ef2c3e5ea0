//! Deferred value parsing.
//!
//! Plan files mark values the provisioning layer supplies later as
//! `${token}`. Anything else is taken literally.

use std::sync::LazyLock;

use ipnet::IpNet;
use regex::Regex;

use crate::block::{AddressBlock, AddressFamily};
use crate::error::PlanResult;
use crate::ipam::Locale;

/// Match: "${token}" with an optional blank around the token
static DEFERRED_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{\s*([A-Za-z0-9_.:/\-]+)\s*\}$").expect("Invalid deferred token regex")
});

/// The token inside a `${token}` value, if `value` is deferred
pub fn deferred_token(value: &str) -> Option<&str> {
    DEFERRED_TOKEN
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parse a CIDR value from a plan file.
///
/// Deferred values take `family` and `prefix_len` from the surrounding
/// request, since the token itself carries neither.
pub fn parse_block(value: &str, family: AddressFamily, prefix_len: Option<u8>) -> PlanResult<AddressBlock> {
    match deferred_token(value) {
        Some(token) => Ok(AddressBlock::deferred(token, family, prefix_len)),
        None => AddressBlock::parse_literal(value),
    }
}

pub fn parse_locale(value: &str) -> Locale {
    match deferred_token(value) {
        Some(token) => Locale::Deferred(token.to_string()),
        None => Locale::Concrete(value.trim().to_string()),
    }
}

/// Parse a `token=cidr` binding as given on the command line
pub fn parse_binding(value: &str) -> Result<(String, IpNet), String> {
    let (token, cidr) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected token=cidr, got '{}'", value))?;
    let token = deferred_token(token).unwrap_or(token).trim();
    if token.is_empty() {
        return Err(format!("Missing token in '{}'", value));
    }
    let net: IpNet = cidr
        .trim()
        .parse()
        .map_err(|e| format!("Invalid CIDR '{}': {}", cidr, e))?;
    Ok((token.to_string(), net))
}
