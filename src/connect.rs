use log::{debug, warn};
use socket2::{SockAddr, Type};

use crate::{error::InterceptError, socks5::Socks5Client, Interceptor, ProxySocket};

/// What an intercepted connect ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Proxied,
}

impl Interceptor {
    /// Connects `socket` to `destination`, through the proxy for TCP streams
    /// and directly for everything else.
    pub fn connect<S: ProxySocket>(
        &self,
        socket: &mut S,
        destination: &SockAddr,
    ) -> Result<Route, InterceptError> {
        if !(destination.is_ipv4() || destination.is_ipv6()) {
            socket.connect_direct(destination)?;
            return Ok(Route::Direct);
        }
        if socket.socket_type()? != Type::STREAM {
            debug!("non-stream socket, connecting directly");
            socket.connect_direct(destination)?;
            return Ok(Route::Direct);
        }
        Socks5Client::new(&self.endpoint)
            .handshake(socket, destination, &self.pending)
            .inspect_err(|e| warn!("proxied connect through {} failed: {}", self.endpoint, e))?;
        Ok(Route::Proxied)
    }
}
