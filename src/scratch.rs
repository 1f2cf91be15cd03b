//! Disk-backed scratch buffers for staged entry data.
//!
//! A [`ScratchBuffer`] decouples the caller's write cadence from the engine's
//! read cadence: bytes are appended as the caller produces them and consumed
//! in order when the engine pulls them during commit. The backing file is
//! created by [`create_unique_temp_file`] and removed when the buffer is
//! dropped, including during unwinding.

use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// File name prefix for every scratch file this crate creates.
pub const SCRATCH_PREFIX: &str = "zipstage.";

/// Creates a uniquely named, writable temporary file.
///
/// The file lives in `dir` when given, otherwise in the platform temporary
/// directory, and is named `zipstage.<random>.<ext>`. The returned handle
/// deletes the file when dropped; call [`NamedTempFile::into_temp_path`] or
/// [`NamedTempFile::keep`] to take over deletion.
pub fn create_unique_temp_file(ext: &str, dir: Option<&Path>) -> io::Result<NamedTempFile> {
    let ext = ext.trim_start_matches('.');
    let suffix = if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX).suffix(&suffix);
    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Appending,
    Reading,
}

/// Append-only, read-once byte buffer backed by a temporary file.
///
/// Appends always go to the end of the file; reads consume bytes in the order
/// they were appended. `size() >= position()` holds at all times and
/// `avail() == size() - position()`.
///
/// Any I/O failure poisons the buffer: later appends and reads fail without
/// touching the file again.
#[derive(Debug)]
pub struct ScratchBuffer {
    file: BufWriter<NamedTempFile>,
    write_pos: u64,
    read_pos: u64,
    cursor: Cursor,
    poisoned: bool,
}

impl ScratchBuffer {
    /// Creates an empty buffer in the platform temporary directory.
    pub fn new() -> io::Result<Self> {
        Self::new_in(None)
    }

    /// Creates an empty buffer, placing the scratch file in `dir` if given.
    pub fn new_in(dir: Option<&Path>) -> io::Result<Self> {
        let file = create_unique_temp_file("tmp", dir)?;
        log::trace!("created scratch file {}", file.path().display());
        Ok(Self {
            file: BufWriter::new(file),
            write_pos: 0,
            read_pos: 0,
            cursor: Cursor::Appending,
            poisoned: false,
        })
    }

    /// Appends `data` to the end of the buffer.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.ensure_healthy()?;
        if data.is_empty() {
            return Ok(());
        }

        let result = self.append_inner(data);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn append_inner(&mut self, data: &[u8]) -> io::Result<()> {
        if self.cursor == Cursor::Reading {
            self.file.seek(SeekFrom::Start(self.write_pos))?;
            self.cursor = Cursor::Appending;
        }
        self.file.write_all(data)?;
        self.write_pos += data.len() as u64;
        Ok(())
    }

    /// Reads up to `buf.len()` unread bytes, returning how many were copied.
    ///
    /// Returns 0 once every appended byte has been consumed. Reading before
    /// anything was appended is not an error.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_healthy()?;
        let want = (buf.len() as u64).min(self.avail()) as usize;
        if want == 0 {
            return Ok(0);
        }

        match self.read_inner(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Pending appends sit in the BufWriter until flushed.
        self.file.flush()?;
        self.cursor = Cursor::Reading;

        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(self.read_pos))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "scratch file shorter than appended length",
                    ));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.read_pos += filled as u64;
        Ok(filled)
    }

    fn ensure_healthy(&self) -> io::Result<()> {
        if self.poisoned {
            Err(io::Error::other("scratch buffer poisoned by an earlier failure"))
        } else {
            Ok(())
        }
    }

    /// Total bytes ever appended.
    pub fn size(&self) -> u64 {
        self.write_pos
    }

    /// Bytes consumed by reads so far.
    pub fn position(&self) -> u64 {
        self.read_pos
    }

    /// Bytes appended but not yet read.
    pub fn avail(&self) -> u64 {
        self.write_pos - self.read_pos
    }

    /// Returns true if an earlier I/O failure made the buffer unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Path of the backing scratch file.
    pub fn path(&self) -> &Path {
        self.file.get_ref().path()
    }
}
