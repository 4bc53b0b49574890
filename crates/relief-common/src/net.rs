//! IP address patterns
//!
//! Allow-lists and deny-lists are written as comma-separated tokens where each
//! token is a single address (`203.0.113.7`, `2001:db8::1`) or a CIDR block
//! (`10.0.0.0/8`, `2001:db8::/32`). A single address is a host prefix
//! (/32 or /128).
//!
//! IPv4-mapped IPv6 addresses (`::ffff:192.0.2.1`) are matched as their IPv4
//! form so that dual-stack listeners see the same verdict.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpPatternError {
    #[error("'{0}' is not an IP address")]
    InvalidAddress(String),

    #[error("'{0}' has an invalid prefix length")]
    InvalidPrefix(String),

    #[error("empty pattern")]
    Empty,
}

/// A network block: base address plus prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpNetwork {
    network: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    /// Build a network, clearing any host bits in `addr`
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, IpPatternError> {
        let addr = canonical(addr);
        let max = max_prefix(&addr);
        if prefix > max {
            return Err(IpPatternError::InvalidPrefix(format!("{}/{}", addr, prefix)));
        }
        let network = match addr {
            IpAddr::V4(v4) => IpAddr::V4(Ipv4Addr::from(u32::from(v4) & v4_mask(prefix))),
            IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(u128::from(v6) & v6_mask(prefix))),
        };
        Ok(Self { network, prefix })
    }

    pub fn host(addr: IpAddr) -> Self {
        let addr = canonical(addr);
        Self {
            prefix: max_prefix(&addr),
            network: addr,
        }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn is_host(&self) -> bool {
        self.prefix == max_prefix(&self.network)
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, canonical(ip)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = v4_mask(self.prefix);
                u32::from(ip) & mask == u32::from(net)
            },
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = v6_mask(self.prefix);
                u128::from(ip) & mask == u128::from(net)
            },
            _ => false,
        }
    }
}

impl FromStr for IpNetwork {
    type Err = IpPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Err(IpPatternError::Empty);
        }
        match token.split_once('/') {
            Some((addr, prefix)) => {
                let addr: IpAddr = addr
                    .trim()
                    .parse()
                    .map_err(|_| IpPatternError::InvalidAddress(token.to_string()))?;
                let prefix: u8 = prefix
                    .trim()
                    .parse()
                    .map_err(|_| IpPatternError::InvalidPrefix(token.to_string()))?;
                IpNetwork::new(addr, prefix)
            },
            None => token
                .parse()
                .map(IpNetwork::host)
                .map_err(|_| IpPatternError::InvalidAddress(token.to_string())),
        }
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "{}", self.network)
        } else {
            write!(f, "{}/{}", self.network, self.prefix)
        }
    }
}

/// A set of addresses and networks with fast exact-host lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpPatternSet {
    hosts: HashSet<IpAddr>,
    networks: Vec<IpNetwork>,
}

impl IpPatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list, returning the set and the rejected tokens
    ///
    /// Blank tokens are ignored rather than rejected.
    pub fn parse_list(raw: &str) -> (Self, Vec<IpPatternError>) {
        let mut set = Self::new();
        let mut rejected = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<IpNetwork>() {
                Ok(pattern) => set.insert(pattern),
                Err(e) => rejected.push(e),
            }
        }
        (set, rejected)
    }

    pub fn insert(&mut self, pattern: IpNetwork) {
        if pattern.is_host() {
            self.hosts.insert(pattern.network());
        } else if !self.networks.contains(&pattern) {
            self.networks.push(pattern);
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = canonical(ip);
        self.hosts.contains(&ip) || self.networks.iter().any(|n| n.contains(ip))
    }

    pub fn len(&self) -> usize {
        self.hosts.len() + self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<IpNetwork> for IpPatternSet {
    fn from_iter<I: IntoIterator<Item = IpNetwork>>(iter: I) -> Self {
        let mut set = Self::new();
        for pattern in iter {
            set.insert(pattern);
        }
        set
    }
}

/// Parse a single untrusted address token (header value, list entry)
pub fn parse_ip(candidate: &str) -> Option<IpAddr> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    candidate.parse::<IpAddr>().ok().map(canonical)
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn v4_mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}

fn v6_mask(prefix: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0)
}
