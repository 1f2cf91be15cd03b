//! The data source that feeds a writer's staged bytes to the engine.

use std::cell::RefCell;
use std::rc::Rc;

use super::WriterState;
use crate::ArchivePath;
use crate::source::{
    DataSource, ErrorRecord, SourceCommand, SourceFailure, SourceResult, StatRecord,
    StoredMethod,
};
use crate::timestamp::Timestamp;

/// Engine-facing half of an [`EntryWriter`](super::EntryWriter).
///
/// | Command | Behavior | Result |
/// |---------|----------|--------|
/// | OPEN | fails if the state is released or poisoned | 0 |
/// | STAT | size = bytes staged now, mtime = now, deflate or store | record length |
/// | READ | next unread staged bytes | bytes copied, 0 at end |
/// | ERROR | `(0, 0)`; no granular codes are tracked | record length |
/// | CLOSE | nothing; the entry is still alive | 0 |
/// | FREE | releases the writer state and its scratch file | 0 |
///
/// The source holds the only strong handle to the writer state, so FREE is
/// the one place the state is destroyed. A repeated FREE finds nothing to
/// release and is ignored.
#[derive(Debug)]
pub struct WriterSource {
    path: ArchivePath,
    state: Option<Rc<RefCell<WriterState>>>,
}

impl WriterSource {
    pub(super) fn new(path: ArchivePath, state: Rc<RefCell<WriterState>>) -> Self {
        Self {
            path,
            state: Some(state),
        }
    }

    /// The entry path the source feeds.
    pub fn path(&self) -> &ArchivePath {
        &self.path
    }

    /// Returns true once FREE has been handled.
    pub fn is_released(&self) -> bool {
        self.state.is_none()
    }

    #[cfg(test)]
    pub(crate) fn scratch_path(&self) -> Option<std::path::PathBuf> {
        let state = self.state.as_ref()?;
        Some(state.borrow().scratch.path().to_path_buf())
    }

    fn state(&self) -> Result<&Rc<RefCell<WriterState>>, SourceFailure> {
        self.state.as_ref().ok_or(SourceFailure::InvalidState)
    }

    fn open(&self) -> SourceResult {
        if self.state()?.borrow().scratch.is_poisoned() {
            return Err(SourceFailure::InvalidState);
        }
        Ok(0)
    }

    fn stat(&self, data: &mut [u8]) -> SourceResult {
        let state = self.state()?.borrow();
        let record = StatRecord::new(
            state.scratch.size(),
            Timestamp::now(),
            StoredMethod::for_compression(state.compressed),
        );
        record.encode_into(data)
    }

    fn read(&self, data: &mut [u8]) -> SourceResult {
        let mut state = self.state()?.borrow_mut();
        Ok(state.scratch.read(data)?)
    }

    fn free(&mut self) -> SourceResult {
        match self.state.take() {
            Some(state) => {
                log::debug!("releasing writer for '{}'", self.path);
                drop(state);
            }
            None => log::warn!("ignoring repeated FREE for '{}'", self.path),
        }
        Ok(0)
    }
}

impl DataSource for WriterSource {
    fn call(&mut self, data: &mut [u8], cmd: SourceCommand) -> SourceResult {
        log::trace!("{} '{}' ({} byte buffer)", cmd, self.path, data.len());
        match cmd {
            SourceCommand::Open => self.open(),
            SourceCommand::Stat => self.stat(data),
            SourceCommand::Read => self.read(data),
            SourceCommand::Error => ErrorRecord::default().encode_into(data),
            SourceCommand::Close => Ok(0),
            SourceCommand::Free => self.free(),
        }
    }
}

impl Drop for WriterSource {
    fn drop(&mut self) {
        if self.state.is_some() {
            log::warn!("writer source for '{}' dropped without FREE", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ERROR_RECORD_LEN, STAT_RECORD_LEN};
    use crate::write::{EntryWriter, truncate_scratch};

    fn pair(compressed: bool) -> (EntryWriter, WriterSource) {
        EntryWriter::with_source(ArchivePath::new("doc.txt").unwrap(), compressed, None).unwrap()
    }

    fn stat(source: &mut WriterSource) -> StatRecord {
        let mut buf = [0u8; STAT_RECORD_LEN];
        assert_eq!(source.call(&mut buf, SourceCommand::Stat), Ok(STAT_RECORD_LEN));
        StatRecord::decode(&buf).unwrap()
    }

    #[test]
    fn test_open_on_healthy_writer() {
        let (_writer, mut source) = pair(true);
        assert_eq!(source.call(&mut [], SourceCommand::Open), Ok(0));
    }

    #[test]
    fn test_open_on_poisoned_writer() {
        let (mut writer, mut source) = pair(true);
        writer.write(b"abc").unwrap();
        truncate_scratch(&mut source);
        assert!(source.call(&mut [0u8; 2], SourceCommand::Read).is_err());

        assert_eq!(
            source.call(&mut [], SourceCommand::Open),
            Err(SourceFailure::InvalidState)
        );
        // Later reads fail without touching the file
        assert!(source.call(&mut [0u8; 2], SourceCommand::Read).is_err());
        assert_eq!(source.call(&mut [], SourceCommand::Free), Ok(0));
        assert!(writer.is_released());
    }

    #[test]
    fn test_stat_reports_method() {
        let (_writer, mut deflated) = pair(true);
        assert_eq!(stat(&mut deflated).method, StoredMethod::Deflate);

        let (_writer, mut stored) = pair(false);
        assert_eq!(stat(&mut stored).method, StoredMethod::Store);
    }

    #[test]
    fn test_stat_tracks_appends_not_reads() {
        let (mut writer, mut source) = pair(false);
        assert_eq!(stat(&mut source).size, 0);

        writer.write(b"he").unwrap();
        writer.write(b"llo").unwrap();
        assert_eq!(stat(&mut source).size, 5);

        let mut buf = [0u8; 3];
        source.call(&mut buf, SourceCommand::Read).unwrap();
        assert_eq!(stat(&mut source).size, 5);

        // Appends after STAT are still accepted
        writer.write(b"!").unwrap();
        assert_eq!(stat(&mut source).size, 6);
    }

    #[test]
    fn test_stat_buffer_too_small() {
        let (_writer, mut source) = pair(true);
        let mut buf = [0u8; 4];
        assert_eq!(
            source.call(&mut buf, SourceCommand::Stat),
            Err(SourceFailure::BufferTooSmall {
                needed: STAT_RECORD_LEN,
                got: 4
            })
        );
    }

    #[test]
    fn test_read_sequence() {
        let (mut writer, mut source) = pair(false);
        writer.write(b"he").unwrap();
        writer.write(b"llo").unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(source.call(&mut buf, SourceCommand::Read), Ok(3));
        assert_eq!(&buf, b"hel");

        let mut buf = [0u8; 10];
        assert_eq!(source.call(&mut buf, SourceCommand::Read), Ok(2));
        assert_eq!(&buf[..2], b"lo");

        assert_eq!(source.call(&mut buf, SourceCommand::Read), Ok(0));
    }

    #[test]
    fn test_error_record_is_zeroed() {
        let (_writer, mut source) = pair(true);
        let mut buf = [0xFFu8; ERROR_RECORD_LEN];
        assert_eq!(source.call(&mut buf, SourceCommand::Error), Ok(ERROR_RECORD_LEN));
        assert_eq!(ErrorRecord::decode(&buf).unwrap(), ErrorRecord::default());

        let mut small = [0u8; ERROR_RECORD_LEN - 1];
        assert!(source.call(&mut small, SourceCommand::Error).is_err());
    }

    #[test]
    fn test_close_is_noop() {
        let (mut writer, mut source) = pair(true);
        writer.write(b"abc").unwrap();
        assert_eq!(source.call(&mut [], SourceCommand::Close), Ok(0));
        assert!(!writer.is_released());
        assert_eq!(writer.total_size(), 3);
    }

    #[test]
    fn test_free_releases_scratch_once() {
        let (mut writer, mut source) = pair(true);
        writer.write(b"bytes").unwrap();
        let scratch = writer.scratch_path().unwrap();

        assert_eq!(source.call(&mut [], SourceCommand::Free), Ok(0));
        assert!(source.is_released());
        assert!(writer.is_released());
        assert!(!scratch.exists());

        // A second FREE is ignored; other commands now fail
        assert_eq!(source.call(&mut [], SourceCommand::Free), Ok(0));
        assert_eq!(
            source.call(&mut [], SourceCommand::Open),
            Err(SourceFailure::InvalidState)
        );
        assert_eq!(
            source.call(&mut [0u8; 8], SourceCommand::Read),
            Err(SourceFailure::InvalidState)
        );
    }

    #[test]
    fn test_empty_writer_then_free() {
        let (_writer, mut source) = pair(false);
        assert_eq!(stat(&mut source).size, 0);
        assert_eq!(source.call(&mut [0u8; 8], SourceCommand::Read), Ok(0));
        assert_eq!(source.call(&mut [], SourceCommand::Free), Ok(0));
    }
}
