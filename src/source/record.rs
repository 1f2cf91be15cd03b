//! Fixed-layout records exchanged through STAT and ERROR.
//!
//! All fields are little endian.
//!
//! Stat record (20 bytes):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | valid flags |
//! | 2 | 2 | compression method (ZIP method id) |
//! | 4 | 8 | uncompressed size |
//! | 12 | 8 | modification time, Unix seconds |
//!
//! Error record (8 bytes): two `i32` codes.

use super::{SourceFailure, SourceResult};
use crate::timestamp::Timestamp;

/// Length of an encoded [`StatRecord`].
pub const STAT_RECORD_LEN: usize = 20;

/// Length of an encoded [`ErrorRecord`].
pub const ERROR_RECORD_LEN: usize = 8;

/// The size field is meaningful.
pub const STAT_VALID_SIZE: u16 = 0x0001;
/// The modification time field is meaningful.
pub const STAT_VALID_MTIME: u16 = 0x0002;
/// The compression method field is meaningful.
pub const STAT_VALID_METHOD: u16 = 0x0004;

/// How the engine should store an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoredMethod {
    /// Stored without compression (ZIP method 0).
    Store,
    /// Raw deflate (ZIP method 8).
    Deflate,
}

impl StoredMethod {
    /// Returns the ZIP method id.
    pub fn code(&self) -> u16 {
        match self {
            Self::Store => 0,
            Self::Deflate => 8,
        }
    }

    /// Looks up a method by ZIP method id.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Store),
            8 => Some(Self::Deflate),
            _ => None,
        }
    }

    /// Method for a writer that did or did not request compression.
    pub fn for_compression(compressed: bool) -> Self {
        if compressed { Self::Deflate } else { Self::Store }
    }

    pub(crate) fn to_zip(self) -> zip::CompressionMethod {
        match self {
            Self::Store => zip::CompressionMethod::Stored,
            Self::Deflate => zip::CompressionMethod::Deflated,
        }
    }
}

/// Entry metadata a source reports for STAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatRecord {
    /// Which fields carry information (`STAT_VALID_*`).
    pub valid: u16,
    /// Requested compression method.
    pub method: StoredMethod,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Modification time.
    pub mtime: Timestamp,
}

impl StatRecord {
    /// Creates a record with every field marked valid.
    pub fn new(size: u64, mtime: Timestamp, method: StoredMethod) -> Self {
        Self {
            valid: STAT_VALID_SIZE | STAT_VALID_MTIME | STAT_VALID_METHOD,
            method,
            size,
            mtime,
        }
    }

    /// Returns true if every bit of `flag` is set in `valid`.
    pub fn has(&self, flag: u16) -> bool {
        self.valid & flag == flag
    }

    /// Writes the record into `buf`, returning the encoded length.
    pub fn encode_into(&self, buf: &mut [u8]) -> SourceResult {
        if buf.len() < STAT_RECORD_LEN {
            return Err(SourceFailure::BufferTooSmall {
                needed: STAT_RECORD_LEN,
                got: buf.len(),
            });
        }
        buf[0..2].copy_from_slice(&self.valid.to_le_bytes());
        buf[2..4].copy_from_slice(&self.method.code().to_le_bytes());
        buf[4..12].copy_from_slice(&self.size.to_le_bytes());
        buf[12..20].copy_from_slice(&self.mtime.as_unix_secs().to_le_bytes());
        Ok(STAT_RECORD_LEN)
    }

    /// Decodes a record from `buf`.
    ///
    /// An unknown method id is only an error when the method field is marked
    /// valid.
    pub fn decode(buf: &[u8]) -> Result<Self, SourceFailure> {
        if buf.len() < STAT_RECORD_LEN {
            return Err(SourceFailure::BufferTooSmall {
                needed: STAT_RECORD_LEN,
                got: buf.len(),
            });
        }
        let valid = u16::from_le_bytes([buf[0], buf[1]]);
        let code = u16::from_le_bytes([buf[2], buf[3]]);
        let method = match StoredMethod::from_code(code) {
            Some(method) => method,
            None if valid & STAT_VALID_METHOD != 0 => return Err(SourceFailure::InvalidState),
            None => StoredMethod::Deflate,
        };

        let mut size = [0u8; 8];
        size.copy_from_slice(&buf[4..12]);
        let mut mtime = [0u8; 8];
        mtime.copy_from_slice(&buf[12..20]);

        Ok(Self {
            valid,
            method,
            size: u64::from_le_bytes(size),
            mtime: Timestamp::from_unix_secs(i64::from_le_bytes(mtime)),
        })
    }
}

/// Error codes a source reports for ERROR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Archive-level error code (0 = none).
    pub zip_code: i32,
    /// System error code (0 = none).
    pub sys_code: i32,
}

impl ErrorRecord {
    /// Writes the record into `buf`, returning the encoded length.
    pub fn encode_into(&self, buf: &mut [u8]) -> SourceResult {
        if buf.len() < ERROR_RECORD_LEN {
            return Err(SourceFailure::BufferTooSmall {
                needed: ERROR_RECORD_LEN,
                got: buf.len(),
            });
        }
        buf[0..4].copy_from_slice(&self.zip_code.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sys_code.to_le_bytes());
        Ok(ERROR_RECORD_LEN)
    }

    /// Decodes a record from `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, SourceFailure> {
        if buf.len() < ERROR_RECORD_LEN {
            return Err(SourceFailure::BufferTooSmall {
                needed: ERROR_RECORD_LEN,
                got: buf.len(),
            });
        }
        Ok(Self {
            zip_code: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            sys_code: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}
