//! Endpoint specs - `[proto@]host:port`
//!
//! `host:port` and `udp@host:port` are datagram endpoints, `tcp@host:port`
//! is a stream endpoint. Host names are resolved once, when the spec is
//! parsed; IPv4 results are preferred.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Transport family of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// One datagram per unit, no framing
    Datagram,
    /// Persistent connection, length-prefixed frames
    Stream,
}

impl Protocol {
    /// Spec prefix (`udp` / `tcp`)
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Datagram => "udp",
            Protocol::Stream => "tcp",
        }
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "udp" => Some(Self::Datagram),
            "tcp" => Some(Self::Stream),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A resolved local or remote endpoint.
///
/// Two endpoints are equal when protocol and resolved address match, which is
/// what reload uses to decide whether a destination is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub addr: SocketAddr,
}

/// Where the relay receives traffic.
pub type ListenSpec = Endpoint;

/// Where the relay replicates traffic to.
pub type DestinationSpec = Endpoint;

impl Endpoint {
    pub fn new(protocol: Protocol, addr: SocketAddr) -> Self {
        Self { protocol, addr }
    }

    pub fn datagram(addr: SocketAddr) -> Self {
        Self::new(Protocol::Datagram, addr)
    }

    pub fn stream(addr: SocketAddr) -> Self {
        Self::new(Protocol::Stream, addr)
    }

    /// Parse and resolve `[proto@]host:port`.
    ///
    /// # Errors
    /// - Unknown protocol prefix
    /// - Missing or invalid port
    /// - Host resolution failure
    pub fn parse(spec: &str) -> Result<Self, ContractError> {
        let (protocol, host_port) = split_spec(spec)?;
        let addr = resolve(host_port)?;
        Ok(Self { protocol, addr })
    }

    pub fn is_stream(&self) -> bool {
        self.protocol == Protocol::Stream
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.protocol, self.addr)
    }
}

impl FromStr for Endpoint {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split the protocol prefix off a spec without resolving the host.
fn split_spec(spec: &str) -> Result<(Protocol, &str), ContractError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ContractError::invalid_endpoint(spec, "empty spec"));
    }

    let (protocol, host_port) = match spec.split_once('@') {
        Some((scheme, rest)) => {
            let protocol = Protocol::from_scheme(scheme).ok_or_else(|| {
                ContractError::invalid_endpoint(
                    spec,
                    format!("unknown protocol '{scheme}', expected udp or tcp"),
                )
            })?;
            (protocol, rest)
        }
        None => (Protocol::Datagram, spec),
    };

    let (host, port) = host_port
        .rsplit_once(':')
        .ok_or_else(|| ContractError::invalid_endpoint(spec, "must specify host:port"))?;

    if host.is_empty() {
        return Err(ContractError::invalid_endpoint(spec, "missing host"));
    }
    port.parse::<u16>()
        .map_err(|e| ContractError::invalid_endpoint(spec, format!("invalid port '{port}': {e}")))?;

    Ok((protocol, host_port))
}

fn resolve(host_port: &str) -> Result<SocketAddr, ContractError> {
    let candidates: Vec<SocketAddr> = host_port
        .to_socket_addrs()
        .map_err(|e| ContractError::resolve(host_port, e.to_string()))?
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| ContractError::resolve(host_port, "no addresses found"))
}
