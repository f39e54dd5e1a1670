use std::{
    io,
    ops::{Deref, DerefMut},
};

use log::{debug, warn};
use socket2::SockAddr;

use super::{
    AuthMethod, AuthRequest, AuthResponse, Command, CommandRequest, CommandResponse, Replay,
    Version,
};
use crate::{
    address::{inet_addr, DestinationAddress},
    buffer::HandshakeBuffer,
    config::ProxyEndpoint,
    error::{socks::SocksError, InterceptError},
    pending::PendingHost,
    ProxySocket,
};

/// Runs the client side of a SOCKS5 CONNECT over a caller-owned socket.
pub struct Socks5Client<'a> {
    endpoint: &'a ProxyEndpoint,
    auth_methods: [AuthMethod; 1],
    buf: HandshakeBuffer,
}

impl<'a> Socks5Client<'a> {
    pub fn new(endpoint: &'a ProxyEndpoint) -> Self {
        Socks5Client {
            endpoint,
            auth_methods: [AuthMethod::NoAuth],
            buf: HandshakeBuffer::new(),
        }
    }

    /// Connects `socket` to the proxy and asks it to reach `destination`.
    ///
    /// The socket is held in blocking mode for the whole exchange and put back
    /// into its original mode on every return path. A sentinel destination is
    /// replaced by the hostname pending in `pending`.
    pub fn handshake<S: ProxySocket>(
        &mut self,
        socket: &mut S,
        destination: &SockAddr,
        pending: &PendingHost,
    ) -> Result<(), InterceptError> {
        let mut socket = BlockingGuard::new(socket)?;
        socket.connect_direct(&self.endpoint.sock_addr_for(destination))?;

        AuthRequest::new(Version::V5, &self.auth_methods).write(&mut self.buf)?;
        self.buf.flush_to(&mut *socket)?;
        let response = AuthResponse::read(&mut *socket, &mut self.buf)?;
        if response.method != AuthMethod::NoAuth {
            return Err(SocksError::MethodNotAccepted(response.method).into());
        }

        let target = inet_addr(destination).map_err(SocksError::from)?;
        let host = pending.current();
        let addr = DestinationAddress::for_target(target, &host)?;
        CommandRequest::new(Version::V5, Command::Connect, addr).write(&mut self.buf)?;
        self.buf.flush_to(&mut *socket)?;

        let response = CommandResponse::read(&mut *socket, &mut self.buf)?;
        if response.replay != Replay::Succeeded {
            return Err(SocksError::Rejected(response.replay).into());
        }
        debug!("connected to {} through {}", addr, self.endpoint);
        Ok(())
    }
}

/// Forces a socket into blocking mode until dropped.
struct BlockingGuard<'a, S: ProxySocket> {
    socket: &'a mut S,
    restore: bool,
}

impl<'a, S: ProxySocket> BlockingGuard<'a, S> {
    fn new(socket: &'a mut S) -> io::Result<Self> {
        let restore = socket.nonblocking()?;
        if restore {
            socket.set_nonblocking(false)?;
        }
        Ok(BlockingGuard { socket, restore })
    }
}

impl<S: ProxySocket> Deref for BlockingGuard<'_, S> {
    type Target = S;
    fn deref(&self) -> &S {
        &*self.socket
    }
}

impl<S: ProxySocket> DerefMut for BlockingGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.socket
    }
}

impl<S: ProxySocket> Drop for BlockingGuard<'_, S> {
    fn drop(&mut self) {
        if self.restore {
            if let Err(e) = self.socket.set_nonblocking(true) {
                warn!("unable to restore non-blocking mode: {}", e);
            }
        }
    }
}
