//! Address family definitions.

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// Address family of a pool or block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Number of address bits, which is also the longest valid prefix
    pub fn width(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

pub trait IdentifyAddressFamily {
    /// Return the address family for this value.
    fn address_family(&self) -> AddressFamily;

    fn is_address_family(&self, family: AddressFamily) -> bool {
        family == self.address_family()
    }
}

impl IdentifyAddressFamily for IpAddr {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl IdentifyAddressFamily for IpNet {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpNet::V4(_) => AddressFamily::Ipv4,
            IpNet::V6(_) => AddressFamily::Ipv6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_width() {
        assert_eq!(AddressFamily::Ipv4.width(), 32);
        assert_eq!(AddressFamily::Ipv6.width(), 128);
        assert_eq!(AddressFamily::default(), AddressFamily::Ipv4);
    }

    #[test]
    fn test_identify_net_family() {
        let v4: IpNet = "10.0.0.0/8".parse().unwrap();
        let v6: IpNet = "2001:db8::/32".parse().unwrap();
        assert!(v4.is_address_family(AddressFamily::Ipv4));
        assert!(v6.is_address_family(AddressFamily::Ipv6));
        assert!(!v6.is_address_family(AddressFamily::Ipv4));
    }
}
