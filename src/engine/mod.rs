//! The staged ZIP editing engine.
//!
//! [`ZipEngine`] opens a container, keeps a slot per entry and records every
//! change (replacement, deletion, new folder) without touching the file.
//! Entry data for replaced or added entries is not handed over up front; each
//! such slot holds a [`DataSource`] which the engine pulls from when the
//! container is committed.
//!
//! Unchanged entries are copied raw into the new container, so they are never
//! recompressed.

mod commit;

pub use commit::CommitResult;

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;

use crate::config::DEFAULT_PULL_BUFFER_SIZE;
use crate::entry::EntryInfo;
use crate::read::EntryReader;
use crate::source::{DataSource, STAT_RECORD_LEN, SourceCommand, StatRecord, StoredMethod};
use crate::{Error, Result};

/// Central directory data captured when the container was opened.
#[derive(Debug, Clone)]
struct OriginEntry {
    index: usize,
    data_start: u64,
    compressed_size: u64,
    size: u64,
    crc32: u32,
    method: CompressionMethod,
    encrypted: bool,
    is_dir: bool,
}

enum SlotChange {
    Unchanged,
    Replaced(RefCell<Box<dyn DataSource>>),
    Deleted,
    NewFolder,
}

struct Slot {
    name: String,
    origin: Option<OriginEntry>,
    change: SlotChange,
}

impl Slot {
    fn is_live(&self) -> bool {
        !matches!(self.change, SlotChange::Deleted)
    }

    fn is_folder(&self) -> bool {
        match self.change {
            SlotChange::NewFolder => true,
            SlotChange::Unchanged => self.origin.as_ref().is_some_and(|o| o.is_dir),
            _ => false,
        }
    }

    fn is_changed(&self) -> bool {
        match self.change {
            SlotChange::Unchanged => false,
            SlotChange::Deleted => self.origin.is_some(),
            SlotChange::Replaced(_) | SlotChange::NewFolder => true,
        }
    }
}

/// Sends FREE to a source that will not be pulled (again).
fn free_source(name: &str, source: &mut dyn DataSource) {
    if let Err(failure) = source.call(&mut [], SourceCommand::Free) {
        log::warn!("source for '{}' failed on FREE: {}", name, failure);
    }
}

/// A ZIP container opened for staged editing.
///
/// Every source registered with the engine receives FREE exactly once:
/// after it was pulled during commit, when it is replaced or deleted, or
/// when the engine is dropped without committing.
pub struct ZipEngine {
    path: PathBuf,
    archive: Option<zip::ZipArchive<File>>,
    slots: Vec<Slot>,
    pull_buffer_size: usize,
}

impl ZipEngine {
    /// Opens the container at `path`.
    ///
    /// A missing file is treated as an empty container when
    /// `create_if_missing` is set. A zero-length file is always an empty
    /// container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailed`] if the file cannot be opened or is not a
    /// valid ZIP container.
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |reason: String| Error::OpenFailed {
            path: path.clone(),
            reason,
        };

        let archive = match File::open(&path) {
            Ok(file) => {
                let len = file.metadata().map_err(|e| open_failed(e.to_string()))?.len();
                if len == 0 {
                    None
                } else {
                    Some(zip::ZipArchive::new(file).map_err(|e| open_failed(e.to_string()))?)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && create_if_missing => None,
            Err(e) => return Err(open_failed(e.to_string())),
        };

        let mut slots = Vec::new();
        let archive = match archive {
            Some(mut archive) => {
                slots.reserve(archive.len());
                for index in 0..archive.len() {
                    let file = archive
                        .by_index_raw(index)
                        .map_err(|e| open_failed(e.to_string()))?;
                    slots.push(Slot {
                        name: file.name().to_string(),
                        origin: Some(OriginEntry {
                            index,
                            data_start: file.data_start(),
                            compressed_size: file.compressed_size(),
                            size: file.size(),
                            crc32: file.crc32(),
                            method: file.compression(),
                            encrypted: file.encrypted(),
                            is_dir: file.is_dir(),
                        }),
                        change: SlotChange::Unchanged,
                    });
                }
                Some(archive)
            }
            None => None,
        };

        log::debug!("opened {} with {} entries", path.display(), slots.len());
        Ok(Self {
            path,
            archive,
            slots,
            pull_buffer_size: DEFAULT_PULL_BUFFER_SIZE,
        })
    }

    /// Sets the READ buffer size used while pulling sources (at least 1).
    pub fn with_pull_buffer_size(mut self, size: usize) -> Self {
        self.pull_buffer_size = size.max(1);
        self
    }

    /// The container path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_live()).count()
    }

    /// Returns true if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if any change is staged.
    pub fn is_dirty(&self) -> bool {
        self.slots.iter().any(Slot::is_changed)
    }

    /// Indices of the live slots, in container order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_live())
            .map(|(i, _)| i)
    }

    /// Finds the live slot whose name is exactly `name`.
    pub fn locate(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_live() && s.name == name)
    }

    fn live_slot(&self, index: usize) -> Result<&Slot> {
        self.slots
            .get(index)
            .filter(|s| s.is_live())
            .ok_or_else(|| Error::EntryNotFound {
                path: format!("#{}", index),
            })
    }

    /// Returns metadata for the live slot at `index`.
    ///
    /// For a slot with a registered source this issues STAT to the source, so
    /// the sizes are whatever the source reports at this moment.
    pub fn stat_index(&self, index: usize) -> Result<EntryInfo> {
        let slot = self.live_slot(index)?;
        match (&slot.change, &slot.origin) {
            (SlotChange::Unchanged, Some(origin)) => Ok(EntryInfo {
                path: slot.name.clone(),
                is_compressed: origin.method != CompressionMethod::Stored,
                compressed_size: origin.compressed_size,
                uncompressed_size: origin.size,
                is_folder: origin.is_dir,
                is_pending: false,
            }),
            (SlotChange::NewFolder, _) => Ok(EntryInfo {
                path: slot.name.clone(),
                is_compressed: false,
                compressed_size: 0,
                uncompressed_size: 0,
                is_folder: true,
                is_pending: true,
            }),
            (SlotChange::Replaced(source), _) => {
                let stat = stat_source(&slot.name, &mut **source.borrow_mut())?;
                Ok(EntryInfo {
                    path: slot.name.clone(),
                    is_compressed: stat.method == StoredMethod::Deflate,
                    compressed_size: 0,
                    uncompressed_size: stat.size,
                    is_folder: false,
                    is_pending: true,
                })
            }
            _ => Err(Error::EntryNotFound {
                path: slot.name.clone(),
            }),
        }
    }

    /// Returns metadata for the live entry named `name`.
    pub fn stat(&self, name: &str) -> Result<EntryInfo> {
        let index = self.locate(name).ok_or_else(|| Error::EntryNotFound {
            path: name.to_string(),
        })?;
        self.stat_index(index)
    }

    /// Marks the live slot at `index` as deleted.
    ///
    /// A source registered for the slot is freed immediately.
    pub fn delete(&mut self, index: usize) -> Result<()> {
        self.live_slot(index)?;
        let slot = &mut self.slots[index];
        if let SlotChange::Replaced(source) = std::mem::replace(&mut slot.change, SlotChange::Deleted)
        {
            free_source(&slot.name, source.into_inner().as_mut());
        }
        log::debug!("staged deletion of '{}'", slot.name);
        Ok(())
    }

    /// Adds a folder entry. `name` must end with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryExists`] if a live entry already has this name.
    pub fn add_dir(&mut self, name: &str) -> Result<usize> {
        if self.locate(name).is_some() {
            return Err(Error::EntryExists {
                path: name.to_string(),
            });
        }
        self.slots.push(Slot {
            name: name.to_string(),
            origin: None,
            change: SlotChange::NewFolder,
        });
        log::debug!("staged folder '{}'", name);
        Ok(self.slots.len() - 1)
    }

    /// Binds `source` to the entry named `name`.
    ///
    /// An existing entry is replaced (a source registered earlier is freed).
    /// A missing entry is added when `create` is set. When binding fails the
    /// engine takes ownership anyway and frees the source.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if the entry is missing and `create` is unset
    /// - [`Error::EntryExists`] if the name belongs to a folder
    pub fn set_source(
        &mut self,
        name: &str,
        mut source: Box<dyn DataSource>,
        create: bool,
    ) -> Result<usize> {
        let index = match self.locate(name) {
            Some(index) if self.slots[index].is_folder() => {
                free_source(name, source.as_mut());
                return Err(Error::EntryExists {
                    path: name.to_string(),
                });
            }
            Some(index) => {
                let slot = &mut self.slots[index];
                let previous = std::mem::replace(
                    &mut slot.change,
                    SlotChange::Replaced(RefCell::new(source)),
                );
                if let SlotChange::Replaced(old) = previous {
                    log::debug!("replacing staged source for '{}'", name);
                    free_source(name, old.into_inner().as_mut());
                }
                index
            }
            None if create => {
                self.slots.push(Slot {
                    name: name.to_string(),
                    origin: None,
                    change: SlotChange::Replaced(RefCell::new(source)),
                });
                self.slots.len() - 1
            }
            None => {
                free_source(name, source.as_mut());
                return Err(Error::EntryNotFound {
                    path: name.to_string(),
                });
            }
        };
        log::debug!("bound source to '{}' (slot {})", name, index);
        Ok(index)
    }

    /// Opens a forward-only reader over the committed data of `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if no live entry has this name
    /// - [`Error::EntryPending`] if the entry has staged changes
    /// - [`Error::UnsupportedMethod`] for encrypted entries and for methods
    ///   other than store and deflate
    pub fn open_entry(&self, name: &str, verify_crc: bool) -> Result<EntryReader> {
        let index = self.locate(name).ok_or_else(|| Error::EntryNotFound {
            path: name.to_string(),
        })?;
        let slot = &self.slots[index];
        let origin = match (&slot.change, &slot.origin) {
            (SlotChange::Unchanged, Some(origin)) => origin,
            (SlotChange::Replaced(_) | SlotChange::NewFolder, _) => {
                return Err(Error::EntryPending {
                    path: name.to_string(),
                });
            }
            _ => {
                return Err(Error::EntryNotFound {
                    path: name.to_string(),
                });
            }
        };

        if origin.encrypted {
            return Err(Error::UnsupportedMethod {
                path: name.to_string(),
                method: "encrypted".to_string(),
            });
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(origin.data_start))?;
        let raw = BufReader::new(file).take(origin.compressed_size);
        let stream: Box<dyn Read> = match origin.method {
            CompressionMethod::Stored => Box::new(raw),
            CompressionMethod::Deflated => Box::new(flate2::read::DeflateDecoder::new(raw)),
            other => {
                return Err(Error::UnsupportedMethod {
                    path: name.to_string(),
                    method: format!("{:?}", other),
                });
            }
        };

        log::trace!(
            "reading '{}' ({} bytes at offset {})",
            name,
            origin.size,
            origin.data_start
        );
        Ok(EntryReader::new(
            name.to_string(),
            stream,
            origin.size,
            verify_crc.then_some(origin.crc32),
        ))
    }

    /// Commits all staged changes and closes the engine.
    pub fn close(mut self) -> Result<CommitResult> {
        self.commit()
    }

    /// Drops all staged changes. Every registered source receives FREE.
    pub fn discard(mut self) {
        self.release_sources();
    }

    fn release_sources(&mut self) {
        let mut released = 0;
        for slot in &mut self.slots {
            if let SlotChange::Replaced(source) =
                std::mem::replace(&mut slot.change, SlotChange::Deleted)
            {
                free_source(&slot.name, source.into_inner().as_mut());
                released += 1;
            }
        }
        if released > 0 {
            log::debug!("released {} uncommitted sources", released);
        }
        self.slots.clear();
        self.archive = None;
    }
}

/// Issues STAT to `source` and decodes the record.
fn stat_source(name: &str, source: &mut dyn DataSource) -> Result<StatRecord> {
    let failed = |failure| Error::SourceFailed {
        path: name.to_string(),
        command: SourceCommand::Stat,
        failure,
        zip_code: 0,
        sys_code: 0,
    };
    let mut record = [0u8; STAT_RECORD_LEN];
    let len = source.call(&mut record, SourceCommand::Stat).map_err(failed)?;
    StatRecord::decode(&record[..len.min(STAT_RECORD_LEN)]).map_err(failed)
}

impl Drop for ZipEngine {
    fn drop(&mut self) {
        self.release_sources();
    }
}

impl fmt::Debug for ZipEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipEngine")
            .field("path", &self.path)
            .field("entries", &self.len())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}
