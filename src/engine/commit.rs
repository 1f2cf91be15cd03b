//! Committing staged changes.
//!
//! The new container is written to a temporary file next to the target and
//! persisted over it once complete, so a failed commit leaves the original
//! untouched. Sources are pulled in slot order with this sequence:
//!
//! ```text
//! OPEN → STAT → READ … READ (0) → CLOSE → FREE
//! ```
//!
//! If any command fails the engine issues ERROR to collect the source's error
//! codes, then FREE, and aborts the commit.

use std::io::{Seek, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::{SlotChange, ZipEngine, free_source};
use crate::scratch::create_unique_temp_file;
use crate::source::{
    DataSource, ERROR_RECORD_LEN, ErrorRecord, STAT_RECORD_LEN, STAT_VALID_METHOD,
    STAT_VALID_MTIME, STAT_VALID_SIZE, SourceCommand, SourceFailure, StatRecord, StoredMethod,
};
use crate::timestamp::Timestamp;
use crate::{Error, Result};

/// Entries at or above this size need ZIP64 headers.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Result of committing a container.
#[must_use = "commit result should be checked to verify the container was written as expected"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// Number of entries copied without changes.
    pub entries_kept: usize,
    /// Number of existing entries whose data was replaced.
    pub entries_replaced: usize,
    /// Number of new file entries.
    pub entries_added: usize,
    /// Number of existing entries that were removed.
    pub entries_deleted: usize,
    /// Number of new folder entries.
    pub folders_added: usize,
    /// Total bytes pulled from data sources.
    pub bytes_pulled: u64,
    /// Whether a container file was written. False when nothing changed or
    /// when the container ended up empty and was removed.
    pub written: bool,
}

impl CommitResult {
    /// Returns the number of entries in the resulting container.
    pub fn total_entries(&self) -> usize {
        self.entries_kept + self.entries_replaced + self.entries_added + self.folders_added
    }
}

impl ZipEngine {
    /// Writes all staged changes to disk.
    ///
    /// Afterwards the engine holds no entries; sources that were not pulled
    /// because of an earlier failure are freed when the engine is dropped.
    pub(crate) fn commit(&mut self) -> Result<CommitResult> {
        if !self.is_dirty() {
            let result = CommitResult {
                entries_kept: self.len(),
                ..Default::default()
            };
            log::debug!("{}: nothing to commit", self.path.display());
            self.release_sources();
            return Ok(result);
        }

        if self.is_empty() {
            let result = CommitResult {
                entries_deleted: self
                    .slots
                    .iter()
                    .filter(|s| s.origin.is_some())
                    .count(),
                ..Default::default()
            };
            self.release_sources();
            match std::fs::remove_file(&self.path) {
                Ok(()) => log::debug!("removed empty container {}", self.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(result);
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        let mut tmp = create_unique_temp_file("zip", Some(&dir))?;
        let mut result = CommitResult::default();

        {
            let mut zip = ZipWriter::new(&mut tmp);
            let mut buf = vec![0u8; self.pull_buffer_size];
            let Self { slots, archive, .. } = self;

            for slot in slots.iter_mut() {
                match std::mem::replace(&mut slot.change, SlotChange::Deleted) {
                    SlotChange::Deleted => {
                        if slot.origin.is_some() {
                            result.entries_deleted += 1;
                        }
                    }
                    SlotChange::Unchanged => {
                        let (Some(origin), Some(archive)) = (&slot.origin, archive.as_mut()) else {
                            continue;
                        };
                        zip.raw_copy_file(archive.by_index_raw(origin.index)?)?;
                        result.entries_kept += 1;
                    }
                    SlotChange::NewFolder => {
                        let options = SimpleFileOptions::default()
                            .last_modified_time(Timestamp::now().to_dos());
                        zip.add_directory(slot.name.as_str(), options)?;
                        result.folders_added += 1;
                    }
                    SlotChange::Replaced(source) => {
                        let mut source = source.into_inner();
                        result.bytes_pulled +=
                            pull_entry(&mut zip, &slot.name, source.as_mut(), &mut buf)?;
                        if slot.origin.is_some() {
                            result.entries_replaced += 1;
                        } else {
                            result.entries_added += 1;
                        }
                    }
                }
            }

            zip.finish()?;
        }

        // The old container must be closed before it is replaced.
        self.archive = None;
        self.slots.clear();
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        result.written = true;
        log::debug!(
            "committed {}: {} kept, {} replaced, {} added, {} deleted, {} folders, {} bytes pulled",
            self.path.display(),
            result.entries_kept,
            result.entries_replaced,
            result.entries_added,
            result.entries_deleted,
            result.folders_added,
            result.bytes_pulled
        );
        Ok(result)
    }
}

fn source_error(name: &str, command: SourceCommand) -> impl FnOnce(SourceFailure) -> Error + '_ {
    move |failure| Error::SourceFailed {
        path: name.to_string(),
        command,
        failure,
        zip_code: 0,
        sys_code: 0,
    }
}

/// Pulls one source into the writer. FREE is issued whatever the outcome.
fn pull_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    source: &mut dyn DataSource,
    buf: &mut [u8],
) -> Result<u64> {
    let result = match stream_entry(zip, name, source, buf) {
        Err(Error::SourceFailed {
            path,
            command,
            failure,
            ..
        }) => {
            let codes = query_error(name, source);
            Err(Error::SourceFailed {
                path,
                command,
                failure,
                zip_code: codes.zip_code,
                sys_code: codes.sys_code,
            })
        }
        other => other,
    };
    free_source(name, source);
    result
}

fn stream_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    source: &mut dyn DataSource,
    buf: &mut [u8],
) -> Result<u64> {
    source
        .call(&mut [], SourceCommand::Open)
        .map_err(source_error(name, SourceCommand::Open))?;

    let mut record = [0u8; STAT_RECORD_LEN];
    let len = source
        .call(&mut record, SourceCommand::Stat)
        .map_err(source_error(name, SourceCommand::Stat))?;
    let stat = StatRecord::decode(&record[..len.min(STAT_RECORD_LEN)])
        .map_err(source_error(name, SourceCommand::Stat))?;

    let method = if stat.has(STAT_VALID_METHOD) {
        stat.method
    } else {
        StoredMethod::Deflate
    };
    let mtime = if stat.has(STAT_VALID_MTIME) {
        stat.mtime
    } else {
        Timestamp::now()
    };
    let options = SimpleFileOptions::default()
        .compression_method(method.to_zip())
        .last_modified_time(mtime.to_dos())
        .large_file(stat.has(STAT_VALID_SIZE) && stat.size >= ZIP64_THRESHOLD);
    zip.start_file(name, options)?;

    let mut pulled = 0u64;
    loop {
        let n = source
            .call(buf, SourceCommand::Read)
            .map_err(source_error(name, SourceCommand::Read))?;
        if n == 0 {
            break;
        }
        let chunk = buf
            .get(..n)
            .ok_or_else(|| source_error(name, SourceCommand::Read)(SourceFailure::InvalidState))?;
        zip.write_all(chunk)?;
        pulled += n as u64;
    }

    source
        .call(&mut [], SourceCommand::Close)
        .map_err(source_error(name, SourceCommand::Close))?;

    if stat.has(STAT_VALID_SIZE) && stat.size != pulled {
        log::warn!(
            "'{}' reported {} bytes at STAT but delivered {}",
            name,
            stat.size,
            pulled
        );
    }
    log::trace!("pulled {} bytes for '{}'", pulled, name);
    Ok(pulled)
}

fn query_error(name: &str, source: &mut dyn DataSource) -> ErrorRecord {
    let mut record = [0u8; ERROR_RECORD_LEN];
    match source.call(&mut record, SourceCommand::Error) {
        Ok(len) => ErrorRecord::decode(&record[..len.min(ERROR_RECORD_LEN)]).unwrap_or_default(),
        Err(failure) => {
            log::warn!("source for '{}' failed on ERROR: {}", name, failure);
            ErrorRecord::default()
        }
    }
}
