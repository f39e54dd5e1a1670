//! C ABI definitions of `getaddrinfo`, `gethostbyname` and `connect` that
//! shadow libc's when the library is loaded with `LD_PRELOAD`.
#![cfg(unix)]

use std::{
    ffi::{c_char, c_int, CStr},
    process, ptr,
    sync::OnceLock,
};

use env_logger::Env;
use libc::{addrinfo, hostent, sockaddr, socklen_t};
use log::{debug, error};
use socket2::Type;

use socks_intercept::{
    sys::{sock_addr, LibcResolver, Originals, RawSocket},
    Interceptor, ProxyConfig, ProxyEndpoint, ProxySocket, Resolver,
};

/// Log filter for the preloaded library, in `env_logger` syntax.
pub const LOG_ENV: &str = "SOCKS_INTERCEPT_LOG";

static ORIGINALS: OnceLock<Originals> = OnceLock::new();
static INTERCEPTOR: OnceLock<Option<Interceptor>> = OnceLock::new();

fn originals() -> &'static Originals {
    ORIGINALS.get_or_init(|| {
        let _ = env_logger::Builder::from_env(Env::new().filter_or(LOG_ENV, "warn")).try_init();
        Originals::load().unwrap_or_else(|e| {
            error!("unable to locate libc socket functions: {}", e);
            process::abort()
        })
    })
}

fn interceptor() -> Option<&'static Interceptor> {
    INTERCEPTOR
        .get_or_init(|| {
            let endpoint = ProxyConfig::from_env()
                .and_then(|config| ProxyEndpoint::resolve(&config, &LibcResolver::new(originals())));
            match endpoint {
                Ok(endpoint) => {
                    debug!("redirecting TCP connections through {}", endpoint);
                    Some(Interceptor::new(endpoint))
                }
                Err(e) => {
                    error!("proxy endpoint unavailable, TCP connections will fail: {}", e);
                    None
                }
            }
        })
        .as_ref()
}

unsafe fn opt_cstr<'a>(s: *const c_char) -> Option<&'a CStr> {
    (!s.is_null()).then(|| CStr::from_ptr(s))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn set_errno(errno: c_int) {
    *libc::__errno_location() = errno;
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
unsafe fn set_errno(errno: c_int) {
    *libc::__error() = errno;
}

/// # Safety
///
/// Same contract as getaddrinfo(3).
#[no_mangle]
pub unsafe extern "C" fn getaddrinfo(
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    res: *mut *mut addrinfo,
) -> c_int {
    let resolver = LibcResolver::new(originals());
    let (node, service, hints) = (opt_cstr(node), opt_cstr(service), hints.as_ref());
    let result = match interceptor() {
        Some(interceptor) => interceptor.resolve_full(&resolver, node, service, hints),
        None => resolver.addr_info(node, service, hints),
    };
    match result {
        Ok(list) => {
            *res = list;
            0
        }
        Err(code) => code,
    }
}

/// # Safety
///
/// Same contract as gethostbyname(3).
#[no_mangle]
pub unsafe extern "C" fn gethostbyname(name: *const c_char) -> *mut hostent {
    let originals = originals();
    let Some(name) = opt_cstr(name) else {
        return (originals.gethostbyname)(ptr::null());
    };
    let resolver = LibcResolver::new(originals);
    match interceptor() {
        Some(interceptor) => interceptor.resolve_by_name(&resolver, name),
        None => resolver.host_by_name(name),
    }
}

/// # Safety
///
/// Same contract as connect(2).
#[no_mangle]
pub unsafe extern "C" fn connect(fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
    let originals = originals();
    // Unix sockets and friends never touch the proxy state, so nothing is
    // initialised for them (NSS modules connect over AF_UNIX during lookups).
    let Some(destination) = sock_addr(addr, len).filter(|a| a.is_ipv4() || a.is_ipv6()) else {
        return (originals.connect)(fd, addr, len);
    };
    let mut socket = RawSocket::borrow_raw(fd, originals);
    let Some(interceptor) = interceptor() else {
        if matches!(socket.socket_type(), Ok(ty) if ty == Type::STREAM) {
            set_errno(libc::EHOSTUNREACH);
            return -1;
        }
        return (originals.connect)(fd, addr, len);
    };
    match interceptor.connect(&mut socket, &destination) {
        Ok(route) => {
            debug!("fd {} connected {:?}", fd, route);
            0
        }
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}
