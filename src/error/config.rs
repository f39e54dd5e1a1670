use thiserror::Error;
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing port in proxy address {0:?}")]
    MissingPort(String),
    #[error("Invalid port in proxy address {0:?}")]
    InvalidPort(String),
    #[error("Empty host in proxy address {0:?}")]
    EmptyHost(String),
    #[error("Unable to resolve proxy {0}: {1}")]
    Lookup(String, std::io::Error),
    #[error("Proxy {0} has no IPv4 address")]
    Unresolvable(String),
}
