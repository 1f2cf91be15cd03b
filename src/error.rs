//! Error types for container operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when working with ZIP containers, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Lookups
//! that have a lenient counterpart (for example [`Container::reader_at_path`])
//! return `Option` instead and log the reason at debug level.
//!
//! ```rust,no_run
//! use zipstage::{Container, Error};
//!
//! fn read_entry(container: &Container, path: &str) -> zipstage::Result<Vec<u8>> {
//!     match container.open_reader(path) {
//!         Ok(mut reader) => reader.read_to_vec(),
//!         Err(Error::EntryNotFound { path }) => {
//!             eprintln!("no such entry: {}", path);
//!             Ok(Vec::new())
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```
//!
//! Failures that happen inside the pull protocol never unwind across the
//! engine boundary. A data source reports them through its return value as a
//! [`SourceFailure`]; the engine then queries the source's error record and
//! surfaces [`Error::SourceFailed`] from [`Container::close`].
//!
//! [`Container::reader_at_path`]: crate::Container::reader_at_path
//! [`Container::close`]: crate::Container::close

use std::io;
use std::path::PathBuf;

use crate::source::{SourceCommand, SourceFailure};

/// Helper struct for formatting CrcMismatch error messages.
struct CrcMismatchDisplay<'a> {
    entry_name: &'a str,
    expected: u32,
    actual: u32,
}

impl std::fmt::Display for CrcMismatchDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CRC mismatch for entry '{}': expected {:#x}, got {:#x}",
            self.entry_name, self.expected, self.actual
        )
    }
}

/// The main error type for container operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Open | [`OpenFailed`][Self::OpenFailed], [`Io`][Self::Io] | Container or scratch file cannot be created |
/// | Lookup | [`EntryNotFound`][Self::EntryNotFound], [`EntryExists`][Self::EntryExists], [`EntryPending`][Self::EntryPending] | Path does not match the slot table |
/// | Protocol | [`SourceFailed`][Self::SourceFailed], [`WriterReleased`][Self::WriterReleased] | Data source misbehaved or was freed |
/// | Format | [`Zip`][Self::Zip], [`UnsupportedMethod`][Self::UnsupportedMethod] | Invalid or unsupported container data |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch] | Entry data corrupted |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the container or on a scratch file.
    ///
    /// A scratch file I/O error is fatal for the owning writer: the buffer is
    /// poisoned and the engine's OPEN on it will fail.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The container could not be opened or created.
    #[error("Failed to open container {}: {reason}", path.display())]
    OpenFailed {
        /// The container path.
        path: PathBuf,
        /// Why the open failed.
        reason: String,
    },

    /// The ZIP layer rejected the container data.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// No live entry matches the requested path.
    #[error("Entry not found: {path}")]
    EntryNotFound {
        /// The sanitized path that was not found.
        path: String,
    },

    /// An entry with the requested path already exists.
    #[error("Entry already exists: {path}")]
    EntryExists {
        /// The sanitized path that already exists.
        path: String,
    },

    /// The entry has staged changes and cannot be read until the container
    /// is committed.
    #[error("Entry has uncommitted changes: {path}")]
    EntryPending {
        /// The sanitized path of the pending entry.
        path: String,
    },

    /// The archive path is invalid (empty, contains NUL or `..`, too long).
    #[error("Invalid archive path: {0}")]
    InvalidArchivePath(String),

    /// The entry is encrypted or uses a compression method this crate cannot
    /// decode.
    #[error("Unsupported compression method {method} for entry '{path}'")]
    UnsupportedMethod {
        /// The entry path.
        path: String,
        /// The ZIP method name reported by the container, or `encrypted`.
        method: String,
    },

    /// The CRC-32 of the delivered entry data does not match the directory.
    #[error("{}", CrcMismatchDisplay { entry_name: entry_name.as_str(), expected: *expected, actual: *actual })]
    CrcMismatch {
        /// The entry path.
        entry_name: String,
        /// The CRC stored in the container.
        expected: u32,
        /// The CRC of the data actually read.
        actual: u32,
    },

    /// A data source reported failure while the engine was pulling from it.
    ///
    /// `zip_code` and `sys_code` are the pair the source returned for the
    /// ERROR command (both zero for writer sources, which do not track
    /// granular codes).
    #[error("Data source for '{path}' failed on {command}: {failure} (codes {zip_code}/{sys_code})")]
    SourceFailed {
        /// The entry whose source failed.
        path: String,
        /// The command that failed.
        command: SourceCommand,
        /// The failure the source reported.
        failure: SourceFailure,
        /// First code from the source's error record.
        zip_code: i32,
        /// Second code from the source's error record.
        sys_code: i32,
    },

    /// The writer's buffered state was already released by the engine.
    #[error("Writer for '{path}' was released by the container")]
    WriterReleased {
        /// The entry the writer was bound to.
        path: String,
    },

    /// The writer's scratch buffer failed earlier and can no longer be used.
    #[error("Writer for '{path}' is poisoned by an earlier I/O failure")]
    WriterPoisoned {
        /// The entry the writer was bound to.
        path: String,
    },
}

/// A specialized Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::EntryNotFound { .. } => io::Error::new(io::ErrorKind::NotFound, err),
            Error::WriterReleased { .. } => io::Error::new(io::ErrorKind::BrokenPipe, err),
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_mismatch_display() {
        let err = Error::CrcMismatch {
            entry_name: "a.txt".into(),
            expected: 0xdead,
            actual: 0xbeef,
        };
        assert_eq!(
            err.to_string(),
            "CRC mismatch for entry 'a.txt': expected 0xdead, got 0xbeef"
        );
    }

    #[test]
    fn test_source_failed_display() {
        let err = Error::SourceFailed {
            path: "doc.xml".into(),
            command: SourceCommand::Stat,
            failure: SourceFailure::BufferTooSmall { needed: 20, got: 4 },
            zip_code: 0,
            sys_code: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("doc.xml"));
        assert!(msg.contains("STAT"));
        assert!(msg.contains("need 20"));
    }

    #[test]
    fn test_into_io_error_kind() {
        let err: io::Error = Error::EntryNotFound { path: "x".into() }.into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err: io::Error = Error::WriterReleased { path: "x".into() }.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let inner = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let err: io::Error = Error::Io(inner).into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
