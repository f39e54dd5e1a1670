pub(crate) mod client;

use std::{fmt::Display, io::Read, net::SocketAddr};

pub use client::Socks5Client;

use crate::{address::DestinationAddress, buffer::HandshakeBuffer, error::socks::SocksError};

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Version {
    V5 = 5,
}

impl Version {
    pub fn from_u8(v: u8) -> Result<Self, SocksError> {
        match v {
            5 => Ok(Version::V5),
            v => Err(SocksError::InvalidVersion(v)),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub enum AuthMethod {
    #[default]
    NoAuth,
    GssApi,
    UsernamePassword,
    NoAcceptableMethod,
    Other(u8),
}

impl From<&AuthMethod> for u8 {
    fn from(v: &AuthMethod) -> Self {
        match *v {
            AuthMethod::NoAuth => 0,
            AuthMethod::GssApi => 1,
            AuthMethod::UsernamePassword => 2,
            AuthMethod::NoAcceptableMethod => 0xff,
            AuthMethod::Other(v) => v,
        }
    }
}

impl From<u8> for AuthMethod {
    fn from(v: u8) -> Self {
        match v {
            0 => AuthMethod::NoAuth,
            1 => AuthMethod::GssApi,
            2 => AuthMethod::UsernamePassword,
            0xff => AuthMethod::NoAcceptableMethod,
            v => AuthMethod::Other(v),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Command {
    Connect = 1,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Replay {
    Succeeded,
    GeneralSocksServerFailure,
    ConnectionNotAllowedByRuleset,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
    Other(u8),
}

impl From<&Replay> for u8 {
    fn from(v: &Replay) -> Self {
        match *v {
            Replay::Succeeded => 0,
            Replay::GeneralSocksServerFailure => 1,
            Replay::ConnectionNotAllowedByRuleset => 2,
            Replay::NetworkUnreachable => 3,
            Replay::HostUnreachable => 4,
            Replay::ConnectionRefused => 5,
            Replay::TtlExpired => 6,
            Replay::CommandNotSupported => 7,
            Replay::AddressTypeNotSupported => 8,
            Replay::Other(v) => v,
        }
    }
}

impl From<u8> for Replay {
    fn from(v: u8) -> Self {
        match v {
            0 => Replay::Succeeded,
            1 => Replay::GeneralSocksServerFailure,
            2 => Replay::ConnectionNotAllowedByRuleset,
            3 => Replay::NetworkUnreachable,
            4 => Replay::HostUnreachable,
            5 => Replay::ConnectionRefused,
            6 => Replay::TtlExpired,
            7 => Replay::CommandNotSupported,
            8 => Replay::AddressTypeNotSupported,
            _ => Replay::Other(v),
        }
    }
}

impl Display for Replay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Replay::Succeeded => write!(f, "succeeded"),
            Replay::GeneralSocksServerFailure => write!(f, "general failure"),
            Replay::ConnectionNotAllowedByRuleset => write!(f, "not allowed by ruleset"),
            Replay::NetworkUnreachable => write!(f, "network unreachable"),
            Replay::HostUnreachable => write!(f, "host unreachable"),
            Replay::ConnectionRefused => write!(f, "connection refused"),
            Replay::TtlExpired => write!(f, "TTL expired"),
            Replay::CommandNotSupported => write!(f, "command not supported"),
            Replay::AddressTypeNotSupported => write!(f, "address type not supported"),
            Replay::Other(v) => write!(f, "unknown status {:#04x}", v),
        }
    }
}

const ATYP_IPV4: u8 = 1;
const ATYP_DOMAIN: u8 = 3;
const ATYP_IPV6: u8 = 4;

pub(crate) struct AuthRequest<'a> {
    version: Version,
    methods: &'a [AuthMethod],
}

impl<'a> AuthRequest<'a> {
    pub fn new(version: Version, methods: &'a [AuthMethod]) -> Self {
        AuthRequest { version, methods }
    }
    /// Replaces the contents of `buf` with the greeting.
    pub fn write(&self, buf: &mut HandshakeBuffer) -> Result<(), SocksError> {
        buf.clear();
        buf.put_u8(self.version as u8)?;
        buf.put_u8(self.methods.len() as u8)?;
        for method in self.methods {
            buf.put_u8(method.into())?;
        }
        Ok(())
    }
}

pub(crate) struct AuthResponse {
    pub method: AuthMethod,
}

impl AuthResponse {
    pub fn read(reader: impl Read, buf: &mut HandshakeBuffer) -> Result<Self, SocksError> {
        let reply = buf.read_exact_from(reader, 2)?;
        Version::from_u8(reply[0])?;
        Ok(AuthResponse {
            method: AuthMethod::from(reply[1]),
        })
    }
}

pub(crate) struct CommandRequest<'a> {
    version: Version,
    command: Command,
    addr: DestinationAddress<'a>,
}

impl<'a> CommandRequest<'a> {
    pub fn new(version: Version, command: Command, addr: DestinationAddress<'a>) -> Self {
        CommandRequest {
            version,
            command,
            addr,
        }
    }
    /// Replaces the contents of `buf` with the request.
    pub fn write(&self, buf: &mut HandshakeBuffer) -> Result<(), SocksError> {
        buf.clear();
        buf.put(&[self.version as u8, self.command as u8, 0])?;
        Address::from(&self.addr).write(buf)
    }
}

pub(crate) struct CommandResponse {
    pub replay: Replay,
}

impl CommandResponse {
    /// Reads the reply header. On success the bound address that follows is
    /// consumed too, leaving the stream positioned at the first relayed byte.
    /// A failed reply is read up to its header only; the stream is abandoned.
    pub fn read(mut reader: impl Read, buf: &mut HandshakeBuffer) -> Result<Self, SocksError> {
        let header = buf.read_exact_from(&mut reader, 4)?;
        let (version, status, atyp) = (header[0], header[1], header[3]);
        Version::from_u8(version)?;
        let replay = Replay::from(status);
        if replay != Replay::Succeeded {
            return Ok(CommandResponse { replay });
        }
        let remaining = match atyp {
            ATYP_IPV4 => 4 + 2,
            ATYP_IPV6 => 16 + 2,
            ATYP_DOMAIN => buf.read_exact_from(&mut reader, 1)?[0] as usize + 2,
            _ => return Err(SocksError::InvalidAddress),
        };
        buf.read_exact_from(&mut reader, remaining)?;
        Ok(CommandResponse { replay })
    }
}

pub(crate) struct Address<'a> {
    pub addr: DestinationAddress<'a>,
}

impl<'a> From<&DestinationAddress<'a>> for Address<'a> {
    fn from(addr: &DestinationAddress<'a>) -> Self {
        Address { addr: *addr }
    }
}

impl Address<'_> {
    pub fn write(&self, buf: &mut HandshakeBuffer) -> Result<(), SocksError> {
        match self.addr {
            DestinationAddress::Domain(domain, port) => {
                let len = u8::try_from(domain.len())
                    .map_err(|_| SocksError::HostnameTooLong(domain.len()))?;
                // type, length, name and port must all fit before anything is written
                if 1 + 1 + domain.len() + 2 > buf.remaining() {
                    return Err(SocksError::HostnameTooLong(domain.len()));
                }
                buf.put(&[ATYP_DOMAIN, len])?;
                buf.put(domain)?;
                buf.put_u16(port)
            }
            DestinationAddress::Ip(SocketAddr::V4(addr)) => {
                buf.put_u8(ATYP_IPV4)?;
                buf.put(&addr.ip().octets())?;
                buf.put_u16(addr.port())
            }
            DestinationAddress::Ip(SocketAddr::V6(addr)) => {
                buf.put_u8(ATYP_IPV6)?;
                buf.put(&addr.ip().octets())?;
                buf.put_u16(addr.port())
            }
        }
    }
}
