use thiserror::Error;

use super::address;
use crate::socks5::{AuthMethod, Replay};

#[derive(Error, Debug)]
pub enum SocksError {
    #[error("Invalid Version: {0:#04x}")]
    InvalidVersion(u8),
    #[error("Method not accepted by proxy: {0:?}")]
    MethodNotAccepted(AuthMethod),
    #[error("Proxy replied: {0}")]
    Rejected(Replay),
    #[error("Hostname of {0} bytes does not fit a request")]
    HostnameTooLong(usize),
    #[error("No hostname pending for sentinel destination")]
    MissingHostname,
    #[error("Handshake buffer overflow: {needed} bytes needed, {remaining} left")]
    BufferOverflow { needed: usize, remaining: usize },
    #[error("Reply truncated after {0} bytes")]
    TruncatedReply(usize),
    #[error("Invalid Address")]
    InvalidAddress,
    #[error("IOError: {0}")]
    IOError(#[from] std::io::Error),
    #[error("AddressError: {0}")]
    AddressError(#[from] address::AddrError),
}
