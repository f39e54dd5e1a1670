use std::{
    env,
    ffi::{OsStr, OsString},
    io,
    net::TcpStream,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use log::debug;

use crate::{
    config::{LookupHost, ProxyConfig, ProxyEndpoint, PROXY_ENV},
    error::InterceptError,
};

pub const PRELOAD_ENV: &str = "LD_PRELOAD";
pub const LIBRARY_NAME: &str = "libsocks_intercept_preload.so";

/// Starts programs with the interception library preloaded.
pub struct Launcher {
    proxy: ProxyConfig,
    library: PathBuf,
}

impl Launcher {
    pub fn new(proxy: ProxyConfig, library: PathBuf) -> Self {
        Launcher { proxy, library }
    }

    /// The library installed next to the running executable.
    pub fn default_library() -> io::Result<PathBuf> {
        Ok(env::current_exe()?.with_file_name(LIBRARY_NAME))
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.proxy
    }

    /// Fails unless the proxy accepts a TCP connection within `timeout`.
    pub fn check_proxy(
        &self,
        lookup: &impl LookupHost,
        timeout: Duration,
    ) -> Result<ProxyEndpoint, InterceptError> {
        let endpoint = ProxyEndpoint::resolve(&self.proxy, lookup)?;
        TcpStream::connect_timeout(&endpoint.addr(), timeout)?;
        debug!("proxy {} is accepting connections", endpoint);
        Ok(endpoint)
    }

    /// Builds the command for `program`, with the library ahead of anything
    /// already in `LD_PRELOAD`.
    pub fn command<S: AsRef<OsStr>>(&self, program: S, args: impl IntoIterator<Item = S>) -> Command {
        let mut command = Command::new(program);
        command
            .args(args)
            .env(PRELOAD_ENV, preload_value(&self.library, env::var_os(PRELOAD_ENV)))
            .env(PROXY_ENV, self.proxy.to_string());
        command
    }
}

fn preload_value(library: &Path, existing: Option<OsString>) -> OsString {
    let mut value = library.as_os_str().to_owned();
    if let Some(existing) = existing.filter(|e| !e.is_empty()) {
        value.push(":");
        value.push(existing);
    }
    value
}
