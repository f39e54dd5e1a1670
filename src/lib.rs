pub mod address;
pub mod buffer;
pub mod config;
mod connect;
pub mod error;
pub mod launch;
pub mod pending;
pub mod resolve;
pub mod socks5;
#[cfg(unix)]
pub mod sys;

use std::io::{self, Read, Write};

pub use address::{DestinationAddress, SENTINEL, SENTINEL_HOST};
pub use connect::Route;
pub use config::{LookupHost, ProxyConfig, ProxyEndpoint, SystemLookup};
pub use error::InterceptError;
pub use pending::{HostName, PendingHost};
pub use resolve::Resolver;
use socket2::{SockAddr, Type};

/// The caller's socket as seen from underneath an intercepted `connect`.
///
/// Reads and writes go straight to the descriptor. `connect_direct` must reach
/// the real connect primitive, never the interposed one.
pub trait ProxySocket: Read + Write {
    fn socket_type(&self) -> io::Result<Type>;
    fn nonblocking(&self) -> io::Result<bool>;
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
    fn connect_direct(&mut self, addr: &SockAddr) -> io::Result<()>;
}

impl<T: ProxySocket + ?Sized> ProxySocket for &mut T {
    fn socket_type(&self) -> io::Result<Type> {
        (**self).socket_type()
    }
    fn nonblocking(&self) -> io::Result<bool> {
        (**self).nonblocking()
    }
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }
    fn connect_direct(&mut self, addr: &SockAddr) -> io::Result<()> {
        (**self).connect_direct(addr)
    }
}

/// Interception context: the proxy to redirect to and the hostname captured
/// by the most recent resolution call.
///
/// There is a single pending slot, so a lookup followed by a connect must not
/// interleave with another lookup. The slot is locked, which keeps concurrent
/// use memory safe, but the last writer still wins.
pub struct Interceptor {
    endpoint: ProxyEndpoint,
    pending: PendingHost,
}

impl Interceptor {
    pub fn new(endpoint: ProxyEndpoint) -> Self {
        Interceptor {
            endpoint,
            pending: PendingHost::new(),
        }
    }
    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }
    pub fn pending(&self) -> &PendingHost {
        &self.pending
    }
}
