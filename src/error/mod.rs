use std::io;

use thiserror::Error;
pub(crate) mod address;
pub(crate) mod config;
pub(crate) mod socks;

pub use address::AddrError;
pub use config::ConfigError;
pub use socks::SocksError;

#[derive(Error, Debug)]
pub enum InterceptError {
    #[error("AddressError: {0}")]
    Address(#[from] address::AddrError),
    #[error("ConfigError: {0}")]
    Config(#[from] config::ConfigError),
    #[error("SocksError: {0}")]
    Socks(#[from] socks::SocksError),
    #[error("IOError: {0}")]
    IO(#[from] io::Error),
}

impl InterceptError {
    /// The errno a native `connect` would have reported for this failure.
    pub fn errno(&self) -> i32 {
        match self {
            InterceptError::IO(e) | InterceptError::Socks(SocksError::IOError(e)) => {
                e.raw_os_error().unwrap_or(libc::ECONNREFUSED)
            }
            InterceptError::Address(AddrError::UnsupportedFamily(_))
            | InterceptError::Socks(SocksError::AddressError(AddrError::UnsupportedFamily(_))) => {
                libc::EAFNOSUPPORT
            }
            InterceptError::Config(_) => libc::EHOSTUNREACH,
            _ => libc::ECONNREFUSED,
        }
    }
}

impl From<InterceptError> for io::Error {
    fn from(e: InterceptError) -> Self {
        match e {
            InterceptError::IO(e) | InterceptError::Socks(SocksError::IOError(e)) => e,
            e => io::Error::from_raw_os_error(e.errno()),
        }
    }
}
