use std::{
    ffi::CStr,
    fmt::Display,
    net::{Ipv4Addr, SocketAddr},
};

use socket2::SockAddr;

use crate::{
    error::{address::AddrError, socks::SocksError},
    pending::{HostName, HOSTNAME_CAPACITY},
};

/// Handed out in place of every intercepted lookup result.
pub const SENTINEL: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 1);
pub const SENTINEL_HOST: &CStr = c"0.0.0.1";

/// Whether `addr` is the sentinel, either plain or IPv4-mapped.
pub fn is_sentinel(addr: &SocketAddr) -> bool {
    match addr {
        SocketAddr::V4(addr) => *addr.ip() == SENTINEL,
        SocketAddr::V6(addr) => addr.ip().to_ipv4_mapped() == Some(SENTINEL),
    }
}

/// Decodes an IPv4 or IPv6 socket address, rejecting every other family.
pub fn inet_addr(addr: &SockAddr) -> Result<SocketAddr, AddrError> {
    addr.as_socket()
        .ok_or(AddrError::UnsupportedFamily(u16::from(addr.family())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationAddress<'a> {
    Domain(&'a [u8], u16),
    Ip(SocketAddr),
}

impl<'a> DestinationAddress<'a> {
    /// Picks what the proxy should be asked to reach for a connect to `addr`.
    ///
    /// The sentinel stands for the pending hostname; anything else is sent
    /// as the literal address regardless of what is pending.
    pub fn for_target(addr: SocketAddr, host: &'a HostName) -> Result<Self, SocksError> {
        if !is_sentinel(&addr) {
            return Ok(DestinationAddress::Ip(addr));
        }
        if host.is_truncated() || host.original_len() > HOSTNAME_CAPACITY {
            return Err(SocksError::HostnameTooLong(host.original_len()));
        }
        if host.is_empty() {
            return Err(SocksError::MissingHostname);
        }
        Ok(DestinationAddress::Domain(host.as_bytes(), addr.port()))
    }
    pub fn port(&self) -> u16 {
        match self {
            DestinationAddress::Domain(_, port) => *port,
            DestinationAddress::Ip(addr) => addr.port(),
        }
    }
}

impl Display for DestinationAddress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationAddress::Domain(domain, port) => {
                write!(f, "{}:{}", String::from_utf8_lossy(domain), port)
            }
            DestinationAddress::Ip(addr) => write!(f, "{}", addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv6Addr, SocketAddrV6};

    use super::*;

    #[test]
    fn sentinel_matches_plain_and_mapped() {
        assert!(is_sentinel(&"0.0.0.1:443".parse().unwrap()));
        let mapped = SocketAddrV6::new(SENTINEL.to_ipv6_mapped(), 80, 0, 0);
        assert!(is_sentinel(&SocketAddr::V6(mapped)));
        assert!(!is_sentinel(&"0.0.0.2:443".parse().unwrap()));
        let v6 = SocketAddrV6::new(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1), 80, 0, 0);
        assert!(!is_sentinel(&SocketAddr::V6(v6)));
    }

    #[test]
    fn sentinel_resolves_to_pending_domain() {
        let host = HostName::new(b"example.test");
        let addr = DestinationAddress::for_target("0.0.0.1:443".parse().unwrap(), &host).unwrap();
        assert_eq!(addr, DestinationAddress::Domain(b"example.test", 443));
        assert_eq!(addr.to_string(), "example.test:443");
    }

    #[test]
    fn literal_address_ignores_pending_host() {
        let host = HostName::new(b"example.test");
        let target: SocketAddr = "192.0.2.7:8080".parse().unwrap();
        let addr = DestinationAddress::for_target(target, &host).unwrap();
        assert_eq!(addr, DestinationAddress::Ip(target));
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn sentinel_without_hostname_is_refused() {
        let host = HostName::default();
        let err = DestinationAddress::for_target("0.0.0.1:80".parse().unwrap(), &host);
        assert!(matches!(err, Err(SocksError::MissingHostname)));
    }

    #[test]
    fn truncated_hostname_is_refused() {
        let long = vec![b'a'; HOSTNAME_CAPACITY + 10];
        let host = HostName::new(&long);
        let err = DestinationAddress::for_target("0.0.0.1:80".parse().unwrap(), &host);
        assert!(matches!(err, Err(SocksError::HostnameTooLong(n)) if n == HOSTNAME_CAPACITY + 10));
    }

    #[test]
    #[cfg(unix)]
    fn unix_address_is_unsupported() {
        let addr = SockAddr::unix("/tmp/socks-intercept.sock").unwrap();
        assert!(matches!(
            inet_addr(&addr),
            Err(AddrError::UnsupportedFamily(f)) if f == libc::AF_UNIX as u16
        ));
    }
}
