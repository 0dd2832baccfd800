//! Flow Key - direction-agnostic flow identity

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// One side of a transport conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub addr: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SocketAddr brackets IPv6 addresses for us
        write!(f, "{}", SocketAddr::new(self.addr, self.port))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

/// Canonical, unordered endpoint pair.
///
/// `a` is always the smaller endpoint, so A→B and B→A hash to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    a: Endpoint,
    b: Endpoint,
}

impl FlowKey {
    pub fn new(x: Endpoint, y: Endpoint) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    /// Canonical first endpoint; bytes it sends count as `src_bytes`
    pub fn first(&self) -> Endpoint {
        self.a
    }

    pub fn second(&self) -> Endpoint {
        self.b
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

impl Serialize for FlowKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid flow key '{0}': expected addr:port-addr:port")]
pub struct FlowKeyParseError(pub String);

/// Split the `addr:port-addr:port` form agents send
fn parse_endpoints(s: &str) -> Result<(Endpoint, Endpoint), FlowKeyParseError> {
    let err = || FlowKeyParseError(s.to_string());

    // IPv6 endpoints are bracketed and contain no '-', so the first '-' splits
    let (left, right) = s.trim().split_once('-').ok_or_else(err)?;
    let left = SocketAddr::from_str(left.trim()).map_err(|_| err())?;
    let right = SocketAddr::from_str(right.trim()).map_err(|_| err())?;

    Ok((left.into(), right.into()))
}

impl FromStr for FlowKey {
    type Err = FlowKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = parse_endpoints(s)?;
        Ok(FlowKey::new(x, y))
    }
}
