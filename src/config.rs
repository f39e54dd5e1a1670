use std::{
    env,
    ffi::OsStr,
    fmt::Display,
    io,
    net::{SocketAddr, ToSocketAddrs},
    str::FromStr,
};

use log::debug;
use socket2::SockAddr;

use crate::error::config::ConfigError;

/// Environment variable holding the proxy as `host:port`.
pub const PROXY_ENV: &str = "SOCKS5_PROXY";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 13491;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ProxyConfig {
    /// Reads [`PROXY_ENV`], falling back to the default when unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        ProxyConfig::from_var(env::var_os(PROXY_ENV).as_deref())
    }

    pub fn from_var(value: Option<&OsStr>) -> Result<Self, ConfigError> {
        match value {
            Some(value) if !value.is_empty() => value.to_string_lossy().parse(),
            _ => Ok(ProxyConfig::default()),
        }
    }
}

impl FromStr for ProxyConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(s.to_string()))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(ConfigError::EmptyHost(s.to_string()));
        }
        Ok(ProxyConfig {
            host: host.to_string(),
            port,
        })
    }
}

impl Display for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Host lookup used to locate the proxy itself.
///
/// Inside an interposed process this must be the real resolver, otherwise the
/// proxy's own name would be swapped for the sentinel.
pub trait LookupHost {
    fn lookup_host(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Lookup through the standard library, for use outside an interposed process.
pub struct SystemLookup;

impl LookupHost for SystemLookup {
    fn lookup_host(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

/// The resolved address of the local SOCKS5 proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyEndpoint {
    addr: SocketAddr,
}

impl ProxyEndpoint {
    pub fn new(addr: SocketAddr) -> Self {
        ProxyEndpoint { addr }
    }

    /// Resolves `config`, keeping the first IPv4 address.
    pub fn resolve(config: &ProxyConfig, lookup: &impl LookupHost) -> Result<Self, ConfigError> {
        let addrs = lookup
            .lookup_host(&config.host, config.port)
            .map_err(|e| ConfigError::Lookup(config.to_string(), e))?;
        let addr = addrs
            .into_iter()
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ConfigError::Unresolvable(config.to_string()))?;
        debug!("proxy {} resolved to {}", config, addr);
        Ok(ProxyEndpoint { addr })
    }
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
    /// The proxy address in the family of `destination`.
    ///
    /// An AF_INET6 socket cannot connect to an AF_INET address, so an IPv4
    /// proxy is reached through its IPv4-mapped form from IPv6 sockets.
    pub fn sock_addr_for(&self, destination: &SockAddr) -> SockAddr {
        match self.addr {
            SocketAddr::V4(addr) if destination.is_ipv6() => SockAddr::from(SocketAddr::new(
                addr.ip().to_ipv6_mapped().into(),
                addr.port(),
            )),
            addr => SockAddr::from(addr),
        }
    }
}

impl Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr)
    }
}
