//! Forward-only entry readers.

use std::fmt;
use std::io::{self, Read};

use crate::{Error, Result};

/// Forward-only reader over one committed container entry.
///
/// `position() + remaining() == total_size()` holds at all times. Once every
/// byte was delivered the reader is exhausted and further reads return 0.
/// When the container records a CRC-32 for the entry, it is checked as the
/// last byte is delivered.
pub struct EntryReader {
    path: String,
    stream: Box<dyn Read>,
    total_size: u64,
    remaining: u64,
    hasher: crc32fast::Hasher,
    expected_crc: Option<u32>,
}

impl EntryReader {
    pub(crate) fn new(
        path: String,
        stream: Box<dyn Read>,
        total_size: u64,
        expected_crc: Option<u32>,
    ) -> Self {
        Self {
            path,
            stream,
            total_size,
            remaining: total_size,
            hasher: crc32fast::Hasher::new(),
            expected_crc,
        }
    }

    /// Reads up to `buf.len()` bytes, returning how many were read.
    ///
    /// Short reads are normal; 0 means the entry is exhausted.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the container cannot be read or ends early
    /// - [`Error::CrcMismatch`] on the read that delivers the last byte, if
    ///   the data does not match the recorded checksum
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = (buf.len() as u64).min(self.remaining) as usize;
        let n = loop {
            match self.stream.read(&mut buf[..want]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        };

        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry '{}' ended {} bytes early", self.path, self.remaining),
            )));
        }

        self.hasher.update(&buf[..n]);
        self.remaining -= n as u64;
        if self.remaining == 0 {
            self.verify_crc()?;
        }
        Ok(n)
    }

    fn verify_crc(&self) -> Result<()> {
        let Some(expected) = self.expected_crc else {
            return Ok(());
        };
        let actual = self.hasher.clone().finalize();
        if actual != expected {
            return Err(Error::CrcMismatch {
                entry_name: self.path.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Reads the rest of the entry into a vector.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.remaining.min(1 << 20) as usize);
        let mut buf = [0u8; 8192];
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Uncompressed size of the entry, fixed at open time.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes delivered so far.
    pub fn position(&self) -> u64 {
        self.total_size - self.remaining
    }

    /// Bytes not yet delivered.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Returns true once every byte was delivered.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// The entry name.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        EntryReader::read(self, buf).map_err(io::Error::from)
    }
}

impl fmt::Debug for EntryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryReader")
            .field("path", &self.path)
            .field("total_size", &self.total_size)
            .field("remaining", &self.remaining)
            .field("expected_crc", &self.expected_crc)
            .finish_non_exhaustive()
    }
}
