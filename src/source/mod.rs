//! Pull-based data sources.
//!
//! The engine never receives entry data by push. Instead every replaced or
//! added entry is backed by a [`DataSource`] that the engine drives with
//! [`SourceCommand`]s when it commits the container:
//!
//! ```text
//! OPEN → STAT → READ … READ (returns 0) → CLOSE → FREE
//! ```
//!
//! STAT may also be issued on its own when a caller asks for the metadata of
//! a staged entry. On any failure the engine issues ERROR to fetch the
//! source's error record before FREE. FREE is always the last command a
//! source receives, and it is delivered exactly once.
//!
//! Commands carry a byte buffer whose meaning depends on the command: READ
//! fills it with entry data, STAT with a [`StatRecord`], ERROR with an
//! [`ErrorRecord`]. Failures are returned as [`SourceFailure`] values and are
//! never raised across the engine boundary.

mod record;

pub use record::{
    ERROR_RECORD_LEN, ErrorRecord, STAT_RECORD_LEN, STAT_VALID_METHOD, STAT_VALID_MTIME,
    STAT_VALID_SIZE, StatRecord, StoredMethod,
};

use std::fmt;
use std::io;

/// A command the engine issues to a [`DataSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCommand {
    /// Prepare for reading.
    Open,
    /// Copy the next chunk of entry data into the buffer.
    Read,
    /// A read pass has finished; the entry itself is still alive.
    Close,
    /// Write a [`StatRecord`] into the buffer.
    Stat,
    /// Write an [`ErrorRecord`] into the buffer.
    Error,
    /// Release the source. No further commands follow.
    Free,
}

impl SourceCommand {
    /// Every command, in protocol order.
    pub const ALL: [SourceCommand; 6] = [
        SourceCommand::Open,
        SourceCommand::Stat,
        SourceCommand::Read,
        SourceCommand::Close,
        SourceCommand::Error,
        SourceCommand::Free,
    ];

    /// Returns the protocol name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Read => "READ",
            Self::Close => "CLOSE",
            Self::Stat => "STAT",
            Self::Error => "ERROR",
            Self::Free => "FREE",
        }
    }
}

impl fmt::Display for SourceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure a data source reports back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SourceFailure {
    /// The buffer cannot hold the requested record.
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Bytes the record needs.
        needed: usize,
        /// Bytes the engine provided.
        got: usize,
    },

    /// The source is not in a state that allows the command.
    #[error("source is in an invalid state")]
    InvalidState,

    /// The source's backing storage failed.
    #[error("source I/O failed ({0:?})")]
    Io(io::ErrorKind),
}

impl From<io::Error> for SourceFailure {
    fn from(err: io::Error) -> Self {
        Self::Io(err.kind())
    }
}

/// Outcome of one command: the number of buffer bytes produced, or a failure.
pub type SourceResult = std::result::Result<usize, SourceFailure>;

/// A producer of entry data that the engine pulls from on its own schedule.
///
/// Implementations must not block indefinitely and must tolerate any command
/// order the engine chooses, except that nothing follows FREE. The engine
/// owns the source once it is registered and drops it right after FREE.
pub trait DataSource {
    /// Handles one command, reading from or writing into `data`.
    fn call(&mut self, data: &mut [u8], cmd: SourceCommand) -> SourceResult;
}

impl<F> DataSource for F
where
    F: FnMut(&mut [u8], SourceCommand) -> SourceResult,
{
    fn call(&mut self, data: &mut [u8], cmd: SourceCommand) -> SourceResult {
        self(data, cmd)
    }
}
