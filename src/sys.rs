//! The real resolver and connect primitives, reached without going through
//! any interposed definition.

use std::{
    ffi::{c_char, c_int, c_void, CStr, CString},
    io::{self, Read, Write},
    mem::{self, ManuallyDrop},
    net::SocketAddr,
    os::fd::{AsRawFd, FromRawFd, RawFd},
    ptr,
};

use libc::{addrinfo, hostent, sockaddr, sockaddr_storage, socklen_t};
use socket2::{SockAddr, Socket, Type};

use crate::{config::LookupHost, resolve::Resolver, ProxySocket};

pub type ConnectFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;
pub type GetAddrInfoFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const addrinfo,
    *mut *mut addrinfo,
) -> c_int;
pub type GetHostByNameFn = unsafe extern "C" fn(*const c_char) -> *mut hostent;

/// The next definitions of the interposed symbols, looked up with `RTLD_NEXT`.
pub struct Originals {
    pub connect: ConnectFn,
    pub getaddrinfo: GetAddrInfoFn,
    pub gethostbyname: GetHostByNameFn,
}

impl Originals {
    pub fn load() -> io::Result<Self> {
        // SAFETY: each symbol is the libc function with the matching signature.
        unsafe {
            Ok(Originals {
                connect: mem::transmute::<*mut c_void, ConnectFn>(next_symbol(c"connect")?),
                getaddrinfo: mem::transmute::<*mut c_void, GetAddrInfoFn>(next_symbol(
                    c"getaddrinfo",
                )?),
                gethostbyname: mem::transmute::<*mut c_void, GetHostByNameFn>(next_symbol(
                    c"gethostbyname",
                )?),
            })
        }
    }

    pub fn connect(&self, fd: RawFd, addr: &SockAddr) -> io::Result<()> {
        // SAFETY: `addr` points at `addr.len()` initialised bytes.
        match unsafe { (self.connect)(fd, addr.as_ptr(), addr.len()) } {
            -1 => Err(io::Error::last_os_error()),
            _ => Ok(()),
        }
    }
}

fn next_symbol(name: &CStr) -> io::Result<*mut c_void> {
    // SAFETY: `name` is NUL-terminated.
    let symbol = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) };
    if symbol.is_null() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no next definition of {:?}", name),
        ));
    }
    Ok(symbol)
}

/// Copies a C socket address into a [`SockAddr`].
///
/// # Safety
///
/// `addr` must be null or point at `len` readable bytes.
pub unsafe fn sock_addr(addr: *const sockaddr, len: socklen_t) -> Option<SockAddr> {
    if addr.is_null() || len as usize > mem::size_of::<sockaddr_storage>() {
        return None;
    }
    SockAddr::try_init(|storage, storage_len| {
        ptr::copy_nonoverlapping(addr.cast::<u8>(), storage.cast::<u8>(), len as usize);
        *storage_len = len;
        Ok(())
    })
    .ok()
    .map(|((), addr)| addr)
}

/// A descriptor owned by the intercepted caller. Never closed here.
pub struct RawSocket<'a> {
    socket: ManuallyDrop<Socket>,
    originals: &'a Originals,
}

impl<'a> RawSocket<'a> {
    /// # Safety
    ///
    /// `fd` must be an open socket for as long as the returned value lives.
    pub unsafe fn borrow_raw(fd: RawFd, originals: &'a Originals) -> Self {
        RawSocket {
            socket: ManuallyDrop::new(Socket::from_raw_fd(fd)),
            originals,
        }
    }
}

impl Read for RawSocket<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut socket: &Socket = &self.socket;
        socket.read(buf)
    }
}

impl Write for RawSocket<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut socket: &Socket = &self.socket;
        socket.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ProxySocket for RawSocket<'_> {
    fn socket_type(&self) -> io::Result<Type> {
        self.socket.r#type()
    }
    fn nonblocking(&self) -> io::Result<bool> {
        // SAFETY: F_GETFL on an open descriptor.
        match unsafe { libc::fcntl(self.socket.as_raw_fd(), libc::F_GETFL) } {
            -1 => Err(io::Error::last_os_error()),
            flags => Ok(flags & libc::O_NONBLOCK != 0),
        }
    }
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.socket.set_nonblocking(nonblocking)
    }
    fn connect_direct(&mut self, addr: &SockAddr) -> io::Result<()> {
        self.originals.connect(self.socket.as_raw_fd(), addr)
    }
}

/// `gethostbyname`/`getaddrinfo` from the next object in the lookup order.
pub struct LibcResolver<'a> {
    originals: &'a Originals,
}

impl<'a> LibcResolver<'a> {
    pub fn new(originals: &'a Originals) -> Self {
        LibcResolver { originals }
    }
}

fn opt_ptr(s: Option<&CStr>) -> *const c_char {
    s.map_or(ptr::null(), CStr::as_ptr)
}

impl Resolver for LibcResolver<'_> {
    type Host = *mut hostent;
    type AddrInfo = Result<*mut addrinfo, c_int>;
    type Hints = addrinfo;

    fn host_by_name(&self, name: &CStr) -> Self::Host {
        // SAFETY: `name` is NUL-terminated.
        unsafe { (self.originals.gethostbyname)(name.as_ptr()) }
    }

    fn addr_info(
        &self,
        node: Option<&CStr>,
        service: Option<&CStr>,
        hints: Option<&addrinfo>,
    ) -> Self::AddrInfo {
        let mut res = ptr::null_mut();
        // SAFETY: every pointer is either null or valid for the call.
        let ret = unsafe {
            (self.originals.getaddrinfo)(
                opt_ptr(node),
                opt_ptr(service),
                hints.map_or(ptr::null(), |h| h as *const addrinfo),
                &mut res,
            )
        };
        match ret {
            0 => Ok(res),
            code => Err(code),
        }
    }
}

impl LookupHost for LibcResolver<'_> {
    fn lookup_host(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        let node = CString::new(host)?;
        let service = CString::new(port.to_string())?;
        // SAFETY: all-zero is a valid, empty `addrinfo`.
        let mut hints: addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = libc::AF_INET;
        hints.ai_socktype = libc::SOCK_STREAM;

        let list = self
            .addr_info(Some(&node), Some(&service), Some(&hints))
            .map_err(gai_error)?;
        let mut addrs = Vec::new();
        let mut cursor = list;
        while !cursor.is_null() {
            // SAFETY: nodes of a list returned by getaddrinfo, not yet freed.
            let info = unsafe { &*cursor };
            if let Some(addr) = unsafe { sock_addr(info.ai_addr, info.ai_addrlen) } {
                addrs.extend(addr.as_socket());
            }
            cursor = info.ai_next;
        }
        // SAFETY: `list` came from getaddrinfo and is freed once.
        unsafe { libc::freeaddrinfo(list) };
        Ok(addrs)
    }
}

fn gai_error(code: c_int) -> io::Error {
    if code == libc::EAI_SYSTEM {
        return io::Error::last_os_error();
    }
    // SAFETY: gai_strerror returns a static NUL-terminated string.
    let message = unsafe { CStr::from_ptr(libc::gai_strerror(code)) };
    io::Error::new(io::ErrorKind::Other, message.to_string_lossy().into_owned())
}
