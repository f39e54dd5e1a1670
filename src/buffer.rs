use std::io::{ErrorKind, Read, Write};

use crate::error::socks::SocksError;

pub const HANDSHAKE_CAPACITY: usize = 512;

/// Scratch space shared by every phase of one handshake.
///
/// Never grows. Each write is checked against the room left and fails with
/// [`SocksError::BufferOverflow`] instead of truncating.
pub struct HandshakeBuffer {
    buf: [u8; HANDSHAKE_CAPACITY],
    len: usize,
}

impl HandshakeBuffer {
    pub fn new() -> Self {
        HandshakeBuffer {
            buf: [0; HANDSHAKE_CAPACITY],
            len: 0,
        }
    }
    pub fn clear(&mut self) {
        self.len = 0;
    }
    pub fn remaining(&self) -> usize {
        HANDSHAKE_CAPACITY - self.len
    }
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.len]
    }
    pub fn put(&mut self, bytes: &[u8]) -> Result<(), SocksError> {
        if bytes.len() > self.remaining() {
            return Err(SocksError::BufferOverflow {
                needed: bytes.len(),
                remaining: self.remaining(),
            });
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
    pub fn put_u8(&mut self, v: u8) -> Result<(), SocksError> {
        self.put(&[v])
    }
    pub fn put_u16(&mut self, v: u16) -> Result<(), SocksError> {
        self.put(&v.to_be_bytes())
    }

    /// Sends everything buffered in a single `write_all`, then empties the buffer.
    pub fn flush_to(&mut self, mut writer: impl Write) -> Result<(), SocksError> {
        writer.write_all(self.filled())?;
        self.clear();
        Ok(())
    }

    /// Replaces the contents with exactly `n` bytes read from `reader`.
    ///
    /// A peer that closes early yields [`SocksError::TruncatedReply`].
    pub fn read_exact_from(&mut self, mut reader: impl Read, n: usize) -> Result<&[u8], SocksError> {
        self.clear();
        if n > HANDSHAKE_CAPACITY {
            return Err(SocksError::BufferOverflow {
                needed: n,
                remaining: HANDSHAKE_CAPACITY,
            });
        }
        while self.len < n {
            match reader.read(&mut self.buf[self.len..n]) {
                Ok(0) => return Err(SocksError::TruncatedReply(self.len)),
                Ok(read) => self.len += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.filled())
    }
}

impl Default for HandshakeBuffer {
    fn default() -> Self {
        HandshakeBuffer::new()
    }
}
