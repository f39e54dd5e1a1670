use std::{
    fmt::Debug,
    sync::{Mutex, PoisonError},
};

/// Longest hostname kept verbatim; also the largest SOCKS5 domain length.
pub const HOSTNAME_CAPACITY: usize = 255;

/// A hostname captured from a resolution call, held in a fixed buffer.
///
/// Names longer than [`HOSTNAME_CAPACITY`] are cut short, but the original
/// length is remembered so the handshake can refuse them instead of asking
/// the proxy for the wrong host.
#[derive(Clone, Copy)]
pub struct HostName {
    buf: [u8; HOSTNAME_CAPACITY],
    len: usize,
    original_len: usize,
}

impl HostName {
    pub const fn empty() -> Self {
        HostName {
            buf: [0; HOSTNAME_CAPACITY],
            len: 0,
            original_len: 0,
        }
    }
    pub fn new(name: &[u8]) -> Self {
        let mut host = HostName::empty();
        host.len = name.len().min(HOSTNAME_CAPACITY);
        host.buf[..host.len].copy_from_slice(&name[..host.len]);
        host.original_len = name.len();
        host
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
    pub fn original_len(&self) -> usize {
        self.original_len
    }
    pub fn is_truncated(&self) -> bool {
        self.original_len > self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for HostName {
    fn default() -> Self {
        HostName::empty()
    }
}

impl Debug for HostName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostName")
            .field("name", &String::from_utf8_lossy(self.as_bytes()))
            .field("original_len", &self.original_len)
            .finish()
    }
}

/// The single pending-hostname slot.
///
/// Every resolution overwrites it; a connect to the sentinel reads it without
/// clearing it.
pub struct PendingHost {
    slot: Mutex<HostName>,
}

impl PendingHost {
    pub const fn new() -> Self {
        PendingHost {
            slot: Mutex::new(HostName::empty()),
        }
    }
    pub fn record(&self, name: &[u8]) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = HostName::new(name);
    }
    pub fn current(&self) -> HostName {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PendingHost {
    fn default() -> Self {
        PendingHost::new()
    }
}
