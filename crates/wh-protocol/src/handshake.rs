//! Readiness handshake
//!
//! Once the worker has bound its HTTP listener it prints a single line on
//! stdout:
//!
//! ```text
//! [workerhost: Listening on IP - 127.0.0.1 Port - 8080]
//! ```
//!
//! The address may be any IPv4 or IPv6 literal. IPv6 hosts are bracketed
//! when the endpoint is rendered as a URL.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::ProtocolError;

/// Fixed text every handshake line starts with
pub const HANDSHAKE_PREFIX: &str = "[workerhost: Listening on IP - ";

/// Separator between the address and port segments
const PORT_SEPARATOR: &str = " Port - ";

/// Terminates the handshake line
const HANDSHAKE_TERMINATOR: char = ']';

/// Address of a ready worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: SocketAddr,
}

impl Endpoint {
    /// Create an endpoint for a socket address
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// URL scheme used to reach the worker
    pub fn scheme(&self) -> &'static str {
        "http"
    }

    /// Socket address of the worker
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// IP address of the worker
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Port the worker listens on
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Full URL, e.g. `http://127.0.0.1:8080` or `http://[::1]:8080`
    pub fn url(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SocketAddr already brackets IPv6 hosts
        write!(f, "{}://{}", self.scheme(), self.addr)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

/// Check whether a stdout line is a handshake announcement
pub fn is_handshake(line: &str) -> bool {
    line.starts_with(HANDSHAKE_PREFIX)
}

/// Parse a handshake line into the worker's endpoint
pub fn parse_handshake(line: &str) -> Result<Endpoint, ProtocolError> {
    let invalid = || ProtocolError::InvalidHandshake(line.to_string());

    let rest = line.trim_end().strip_prefix(HANDSHAKE_PREFIX).ok_or_else(invalid)?;
    let end = rest.rfind(HANDSHAKE_TERMINATOR).ok_or_else(invalid)?;
    let (address, port) = rest[..end].split_once(PORT_SEPARATOR).ok_or_else(invalid)?;

    // Tolerate an already-bracketed IPv6 literal
    let address = address.trim();
    let address = address
        .strip_prefix('[')
        .and_then(|a| a.strip_suffix(']'))
        .unwrap_or(address);

    let ip: IpAddr = address
        .parse()
        .map_err(|_| ProtocolError::InvalidAddress(address.to_string()))?;
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidPort(port.to_string()))?;

    Ok(Endpoint::new(SocketAddr::new(ip, port)))
}

/// Render the handshake line a worker bound to `addr` prints
pub fn format_handshake(addr: SocketAddr) -> String {
    format!(
        "{}{}{}{}{}",
        HANDSHAKE_PREFIX,
        addr.ip(),
        PORT_SEPARATOR,
        addr.port(),
        HANDSHAKE_TERMINATOR
    )
}
