use std::{error::Error, ffi::OsString, path::PathBuf, time::Duration};

use clap::Parser;
use log::info;
use socks_intercept::{launch::Launcher, ProxyConfig, SystemLookup};

/// Run a program with its TCP connections redirected through a SOCKS5 proxy.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// SOCKS5 proxy as HOST:PORT [default: $SOCKS5_PROXY, then localhost:13491]
    #[arg(short, long)]
    proxy: Option<ProxyConfig>,
    /// Interception library [default: libsocks_intercept_preload.so beside this binary]
    #[arg(short, long)]
    library: Option<PathBuf>,
    /// How long to wait for the proxy to accept a connection
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Program to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<OsString>,
}

#[cfg(not(unix))]
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    Cli::parse();
    Err(format!("unsupported OS: {}", std::env::consts::OS).into())
}

#[cfg(unix)]
fn main() -> Result<(), Box<dyn Error>> {
    use std::os::unix::process::CommandExt;

    env_logger::init();
    let cli = Cli::parse();

    let proxy = match cli.proxy {
        Some(proxy) => proxy,
        None => ProxyConfig::from_env()?,
    };
    let library = match cli.library {
        Some(library) => library,
        None => Launcher::default_library()?,
    };
    let library = library
        .canonicalize()
        .map_err(|e| format!("interception library {}: {}", library.display(), e))?;

    let launcher = Launcher::new(proxy, library);
    let endpoint = launcher
        .check_proxy(&SystemLookup, Duration::from_millis(cli.timeout_ms))
        .map_err(|e| format!("could not connect to SOCKS5 proxy at {}: {}", launcher.proxy(), e))?;
    info!("redirecting through {}", endpoint);

    let (program, args) = cli.command.split_first().ok_or("no command given")?;
    let err = launcher.command(program, args).exec();
    Err(format!("unable to run {}: {}", program.to_string_lossy(), err).into())
}
