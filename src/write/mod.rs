//! Entry writers.
//!
//! An [`EntryWriter`] stages bytes for one container entry in a
//! [`ScratchBuffer`]. The engine, not the caller, decides when those bytes
//! are consumed and when the staged state is destroyed:
//!
//! - [`EntryWriter::with_source`] creates the buffered state together with a
//!   [`WriterSource`], the data source that is registered with the engine.
//! - The `WriterSource` holds the only strong handle to the state. The
//!   caller's `EntryWriter` holds a weak one, so dropping it neither discards
//!   the staged bytes nor deletes the scratch file.
//! - When the engine issues FREE, the source releases the state and the
//!   scratch file is removed. From then on writes fail with
//!   [`Error::WriterReleased`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipstage::Container;
//!
//! # fn main() -> zipstage::Result<()> {
//! let mut container = Container::open("book.epub")?;
//! if let Some(mut writer) = container.writer_at_path("OEBPS/notes.xhtml", true, true) {
//!     writer.write_all(b"<html/>")?;
//! }
//! // Commit pulls the staged bytes and frees the writer state.
//! container.close()?;
//! # Ok(())
//! # }
//! ```

mod bridge;

pub use bridge::WriterSource;

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::scratch::ScratchBuffer;
use crate::{ArchivePath, Error, Result};

/// Buffered state of one writer, owned by its [`WriterSource`].
#[derive(Debug)]
pub(crate) struct WriterState {
    compressed: bool,
    scratch: ScratchBuffer,
}

/// Caller-facing handle for staging one entry's bytes.
///
/// Every write is appended to the scratch buffer and accepted in full; the
/// engine pulls the bytes later, during commit.
#[derive(Debug)]
pub struct EntryWriter {
    path: ArchivePath,
    compressed: bool,
    state: Weak<RefCell<WriterState>>,
}

impl EntryWriter {
    /// Creates a writer and the data source that feeds its bytes to an
    /// engine.
    ///
    /// The scratch file is created in `scratch_dir` or the platform temporary
    /// directory. The returned [`WriterSource`] owns the buffered state; once
    /// it is dropped or receives FREE, the writer is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the scratch file cannot be created.
    pub fn with_source(
        path: ArchivePath,
        compressed: bool,
        scratch_dir: Option<&Path>,
    ) -> Result<(EntryWriter, WriterSource)> {
        let scratch = ScratchBuffer::new_in(scratch_dir)?;
        let state = Rc::new(RefCell::new(WriterState {
            compressed,
            scratch,
        }));

        let writer = EntryWriter {
            path: path.clone(),
            compressed,
            state: Rc::downgrade(&state),
        };
        Ok((writer, WriterSource::new(path, state)))
    }

    /// Appends `data` to the staged entry, returning `data.len()`.
    ///
    /// # Errors
    ///
    /// - [`Error::WriterReleased`] if the engine already freed the writer
    /// - [`Error::WriterPoisoned`] if an earlier scratch I/O failure occurred
    /// - [`Error::Io`] if appending to the scratch file fails (the writer is
    ///   poisoned afterwards)
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let state = self.live_state()?;
        let mut state = state.borrow_mut();
        if state.scratch.is_poisoned() {
            return Err(Error::WriterPoisoned {
                path: self.path.to_string(),
            });
        }
        state.scratch.append(data)?;
        Ok(data.len())
    }

    fn live_state(&self) -> Result<Rc<RefCell<WriterState>>> {
        self.state.upgrade().ok_or_else(|| Error::WriterReleased {
            path: self.path.to_string(),
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&WriterState) -> T) -> Option<T> {
        let state = self.state.upgrade()?;
        let guard = state.borrow();
        Some(f(&guard))
    }

    /// Total bytes staged so far (0 once released).
    pub fn total_size(&self) -> u64 {
        self.with_state(|s| s.scratch.size()).unwrap_or(0)
    }

    /// Current write position. Nothing is evicted before the engine pulls,
    /// so this equals [`total_size`](Self::total_size).
    pub fn position(&self) -> u64 {
        self.total_size()
    }

    /// The entry path this writer is bound to.
    pub fn path(&self) -> &ArchivePath {
        &self.path
    }

    /// Whether the entry will be deflated.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Returns true once the engine has freed the writer state.
    pub fn is_released(&self) -> bool {
        self.state.strong_count() == 0
    }

    /// Returns true if the writer can still accept bytes.
    pub fn is_valid(&self) -> bool {
        self.with_state(|s| !s.scratch.is_poisoned()).unwrap_or(false)
    }

    /// Path of the scratch file while the writer state is alive.
    pub fn scratch_path(&self) -> Option<PathBuf> {
        self.with_state(|s| s.scratch.path().to_path_buf())
    }
}

impl io::Write for EntryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        EntryWriter::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Truncates the scratch file behind `source` after flushing one byte
/// through READ, so the next READ hits end of file and poisons the buffer.
#[cfg(test)]
pub(crate) fn truncate_scratch(source: &mut WriterSource) {
    use crate::source::{DataSource, SourceCommand};

    let path = source
        .scratch_path()
        .expect("writer source already released");
    assert_eq!(source.call(&mut [0u8; 1], SourceCommand::Read), Ok(1));
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(0)
        .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DataSource, SourceCommand, SourceFailure};

    fn pair(compressed: bool) -> (EntryWriter, WriterSource) {
        EntryWriter::with_source(ArchivePath::new("a.txt").unwrap(), compressed, None).unwrap()
    }

    #[test]
    fn test_write_accepts_full_length() {
        let (mut writer, _source) = pair(true);
        assert_eq!(writer.write(b"hello").unwrap(), 5);
        assert_eq!(writer.write(b"").unwrap(), 0);
        assert_eq!(writer.total_size(), 5);
        assert_eq!(writer.position(), 5);
        assert!(writer.is_valid());
        assert!(writer.is_compressed());
    }

    #[test]
    fn test_dropping_writer_keeps_state() {
        let (mut writer, mut source) = pair(false);
        writer.write(b"kept").unwrap();
        let scratch = writer.scratch_path().unwrap();
        drop(writer);

        assert!(scratch.exists());
        let mut buf = [0u8; 16];
        assert_eq!(source.call(&mut buf, SourceCommand::Read), Ok(4));
        assert_eq!(&buf[..4], b"kept");
    }

    #[test]
    fn test_write_after_free_fails() {
        let (mut writer, mut source) = pair(false);
        writer.write(b"x").unwrap();
        source.call(&mut [], SourceCommand::Free).unwrap();

        assert!(writer.is_released());
        assert!(!writer.is_valid());
        assert_eq!(writer.total_size(), 0);
        assert!(writer.scratch_path().is_none());
        assert!(matches!(
            writer.write(b"y"),
            Err(Error::WriterReleased { .. })
        ));
    }

    #[test]
    fn test_scratch_failure_poisons_writer() {
        let (mut writer, mut source) = pair(false);
        writer.write(b"staged bytes").unwrap();
        truncate_scratch(&mut source);

        assert_eq!(
            source.call(&mut [0u8; 4], SourceCommand::Read),
            Err(SourceFailure::Io(io::ErrorKind::UnexpectedEof))
        );
        assert!(!writer.is_valid());
        assert!(!writer.is_released());
        assert!(matches!(
            writer.write(b"more"),
            Err(Error::WriterPoisoned { .. })
        ));

        // Poisoned, not released: the state lives until FREE
        source.call(&mut [], SourceCommand::Free).unwrap();
        assert!(writer.is_released());
    }

    #[test]
    fn test_io_write_impl() {
        use std::io::Write;

        let (mut writer, _source) = pair(true);
        write!(writer, "{}-{}", 1, 2).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.total_size(), 3);
    }
}
