#![cfg(unix)]

use std::{
    ffi::CStr,
    io::{self, Read, Write},
    net::{Ipv4Addr, SocketAddr, UdpSocket},
    os::fd::AsRawFd,
};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use socks_intercept::{
    Interceptor, ProxyConfig, ProxyEndpoint, ProxySocket, Resolver, Route, SENTINEL,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

/// A caller socket whose connects go straight to the OS.
struct CallerSocket(Socket);

impl CallerSocket {
    fn new(domain: Domain, ty: Type) -> Self {
        let protocol = if ty == Type::STREAM {
            Protocol::TCP
        } else {
            Protocol::UDP
        };
        CallerSocket(Socket::new(domain, ty, Some(protocol)).unwrap())
    }
}

impl Read for CallerSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for CallerSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl ProxySocket for CallerSocket {
    fn socket_type(&self) -> io::Result<Type> {
        self.0.r#type()
    }
    fn nonblocking(&self) -> io::Result<bool> {
        match unsafe { libc::fcntl(self.0.as_raw_fd(), libc::F_GETFL) } {
            -1 => Err(io::Error::last_os_error()),
            flags => Ok(flags & libc::O_NONBLOCK != 0),
        }
    }
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.0.set_nonblocking(nonblocking)
    }
    fn connect_direct(&mut self, addr: &SockAddr) -> io::Result<()> {
        self.0.connect(addr)
    }
}

/// Resolves numeric names only, the way the sentinel is always resolved.
struct NumericResolver;

impl Resolver for NumericResolver {
    type Host = Option<Ipv4Addr>;
    type AddrInfo = Vec<SocketAddr>;
    type Hints = ();

    fn host_by_name(&self, name: &CStr) -> Self::Host {
        name.to_str().ok()?.parse().ok()
    }
    fn addr_info(
        &self,
        node: Option<&CStr>,
        service: Option<&CStr>,
        _hints: Option<&()>,
    ) -> Self::AddrInfo {
        let ip = node.and_then(|node| self.host_by_name(node));
        let port = service.and_then(|s| s.to_str().ok()?.parse().ok());
        match (ip, port) {
            (Some(ip), Some(port)) => vec![SocketAddr::from((ip, port))],
            _ => Vec::new(),
        }
    }
}

/// Serves a single SOCKS5 client and returns what it sent after the greeting.
async fn serve_one(listener: TcpListener, method: u8, status: u8) -> Vec<u8> {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut greeting = [0u8; 3];
    stream.read_exact(&mut greeting).await.unwrap();
    assert_eq!(greeting, [0x05, 0x01, 0x00]);
    stream.write_all(&[0x05, method]).await.unwrap();
    if method != 0x00 {
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        return rest;
    }

    let mut request = vec![0u8; 4];
    stream.read_exact(&mut request).await.unwrap();
    let remaining = match request[3] {
        0x01 => 4 + 2,
        0x04 => 16 + 2,
        0x03 => {
            let len = stream.read_u8().await.unwrap();
            request.push(len);
            len as usize + 2
        }
        atyp => panic!("unexpected address type {}", atyp),
    };
    let mut addr = vec![0u8; remaining];
    stream.read_exact(&mut addr).await.unwrap();
    request.extend_from_slice(&addr);

    stream
        .write_all(&[0x05, status, 0x00, 0x01, 127, 0, 0, 1, 0x04, 0x38])
        .await
        .unwrap();
    if status == 0x00 {
        stream.write_all(b"relayed").await.unwrap();
    }
    request
}

async fn proxy() -> (TcpListener, ProxyEndpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = ProxyEndpoint::new(listener.local_addr().unwrap());
    (listener, endpoint)
}

#[tokio::test(flavor = "multi_thread")]
async fn hostname_travels_to_proxy() {
    assert_eq!(ProxyConfig::default().to_string(), "localhost:13491");
    let (listener, endpoint) = proxy().await;
    let server = tokio::spawn(serve_one(listener, 0x00, 0x00));

    let relayed = tokio::task::spawn_blocking(move || {
        let interceptor = Interceptor::new(endpoint);
        let resolved = interceptor.resolve_by_name(&NumericResolver, c"example.test");
        assert_eq!(resolved, Some(SENTINEL));

        let mut socket = CallerSocket::new(Domain::IPV4, Type::STREAM);
        let target = SockAddr::from(SocketAddr::from((SENTINEL, 443)));
        assert_eq!(interceptor.connect(&mut socket, &target).unwrap(), Route::Proxied);
        let mut relayed = [0u8; 7];
        socket.read_exact(&mut relayed).unwrap();
        relayed
    })
    .await
    .unwrap();

    let mut expected = vec![0x05, 0x01, 0x00, 0x03, 0x0c];
    expected.extend_from_slice(b"example.test");
    expected.extend_from_slice(&[0x01, 0xbb]);
    assert_eq!(server.await.unwrap(), expected);
    assert_eq!(&relayed, b"relayed");
}

#[tokio::test(flavor = "multi_thread")]
async fn ipv6_socket_reaches_proxy_for_mapped_sentinel() {
    let (listener, endpoint) = proxy().await;
    let server = tokio::spawn(serve_one(listener, 0x00, 0x00));

    let relayed = tokio::task::spawn_blocking(move || {
        let interceptor = Interceptor::new(endpoint);
        interceptor.resolve_by_name(&NumericResolver, c"example.test");

        let mut socket = CallerSocket::new(Domain::IPV6, Type::STREAM);
        let target = SockAddr::from(SocketAddr::from((SENTINEL.to_ipv6_mapped(), 443)));
        assert_eq!(interceptor.connect(&mut socket, &target).unwrap(), Route::Proxied);
        let mut relayed = [0u8; 7];
        socket.read_exact(&mut relayed).unwrap();
        relayed
    })
    .await
    .unwrap();

    let mut expected = vec![0x05, 0x01, 0x00, 0x03, 0x0c];
    expected.extend_from_slice(b"example.test");
    expected.extend_from_slice(&[0x01, 0xbb]);
    assert_eq!(server.await.unwrap(), expected);
    assert_eq!(&relayed, b"relayed");
}

#[tokio::test(flavor = "multi_thread")]
async fn full_lookup_then_literal_ipv4() {
    let (listener, endpoint) = proxy().await;
    let server = tokio::spawn(serve_one(listener, 0x00, 0x00));

    tokio::task::spawn_blocking(move || {
        let interceptor = Interceptor::new(endpoint);
        let addrs = interceptor.resolve_full(
            &NumericResolver,
            Some(c"ignored.test"),
            Some(c"8080"),
            None,
        );
        assert_eq!(addrs, vec![SocketAddr::from((SENTINEL, 8080))]);

        let mut socket = CallerSocket::new(Domain::IPV4, Type::STREAM);
        let target = SockAddr::from("192.0.2.44:8080".parse::<SocketAddr>().unwrap());
        interceptor.connect(&mut socket, &target).unwrap();
    })
    .await
    .unwrap();

    assert_eq!(
        server.await.unwrap(),
        vec![0x05, 0x01, 0x00, 0x01, 192, 0, 2, 44, 0x1f, 0x90]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_method_stops_before_request() {
    let (listener, endpoint) = proxy().await;
    let server = tokio::spawn(serve_one(listener, 0xff, 0x00));

    let errno = tokio::task::spawn_blocking(move || {
        let interceptor = Interceptor::new(endpoint);
        interceptor.resolve_by_name(&NumericResolver, c"example.test");
        let mut socket = CallerSocket::new(Domain::IPV4, Type::STREAM);
        let target = SockAddr::from(SocketAddr::from((SENTINEL, 443)));
        interceptor.connect(&mut socket, &target).unwrap_err().errno()
    })
    .await
    .unwrap();

    assert_eq!(errno, libc::ECONNREFUSED);
    assert!(server.await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn proxy_failure_status_is_refused() {
    let (listener, endpoint) = proxy().await;
    let server = tokio::spawn(serve_one(listener, 0x00, 0x04));

    let err = tokio::task::spawn_blocking(move || {
        let interceptor = Interceptor::new(endpoint);
        let mut socket = CallerSocket::new(Domain::IPV6, Type::STREAM);
        let target = SockAddr::from("[2001:db8::9]:22".parse::<SocketAddr>().unwrap());
        io::Error::from(interceptor.connect(&mut socket, &target).unwrap_err())
    })
    .await
    .unwrap();

    assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    let request = server.await.unwrap();
    assert_eq!(&request[..4], &[0x05, 0x01, 0x00, 0x04]);
    assert_eq!(request.len(), 4 + 16 + 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn nonblocking_caller_gets_its_mode_back() {
    let (listener, endpoint) = proxy().await;
    let server = tokio::spawn(serve_one(listener, 0x00, 0x00));

    tokio::task::spawn_blocking(move || {
        let interceptor = Interceptor::new(endpoint);
        let mut socket = CallerSocket::new(Domain::IPV4, Type::STREAM);
        socket.set_nonblocking(true).unwrap();
        let target = SockAddr::from("198.51.100.1:80".parse::<SocketAddr>().unwrap());
        interceptor.connect(&mut socket, &target).unwrap();
        assert!(socket.nonblocking().unwrap());
    })
    .await
    .unwrap();

    server.await.unwrap();
}

#[test]
fn unreachable_proxy_reports_connect_error() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let interceptor = Interceptor::new(ProxyEndpoint::new(addr));
    let mut socket = CallerSocket::new(Domain::IPV4, Type::STREAM);
    socket.set_nonblocking(true).unwrap();
    let target = SockAddr::from("198.51.100.1:80".parse::<SocketAddr>().unwrap());

    let err = interceptor.connect(&mut socket, &target).unwrap_err();
    assert_eq!(err.errno(), libc::ECONNREFUSED);
    assert!(socket.nonblocking().unwrap());
}

#[test]
fn datagram_socket_bypasses_proxy() {
    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = peer.local_addr().unwrap();
    let interceptor = Interceptor::new(ProxyEndpoint::new("127.0.0.1:9".parse().unwrap()));
    interceptor.resolve_by_name(&NumericResolver, c"example.test");

    let mut socket = CallerSocket::new(Domain::IPV4, Type::DGRAM);
    assert_eq!(
        interceptor.connect(&mut socket, &SockAddr::from(addr)).unwrap(),
        Route::Direct
    );
    assert_eq!(socket.0.peer_addr().unwrap().as_socket(), Some(addr));
}
