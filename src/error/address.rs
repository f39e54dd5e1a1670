use thiserror::Error;
#[derive(Error, Debug)]
pub enum AddrError {
    #[error("InvalidAddress")]
    InvalidAddress,
    #[error("Unsupported address family: {0}")]
    UnsupportedFamily(u16),
}
