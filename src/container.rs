//! The container facade.
//!
//! A [`Container`] binds a [`ZipEngine`] to a path and exposes entry access by
//! archive path. Every path argument is sanitized with
//! [`ArchivePath::sanitized`] before it reaches the engine.
//!
//! Lookups come in two flavors: strict ones return [`Result`] and say why
//! they failed, lenient ones (`reader_at_path`, `writer_at_path`) return
//! `Option` and log the reason at debug level.

use std::path::Path;

use tempfile::TempPath;

use crate::config::ContainerOptions;
use crate::engine::{CommitResult, ZipEngine};
use crate::entry::EntryInfo;
use crate::read::EntryReader;
use crate::scratch::create_unique_temp_file;
use crate::source::DataSource;
use crate::write::EntryWriter;
use crate::{ArchivePath, Error, Result};

/// A ZIP container opened for reading and staged writing.
///
/// Changes are committed when the container is closed or dropped. Dropping
/// swallows commit errors (they are logged as warnings); call
/// [`close`](Self::close) to observe them.
///
/// # Example
///
/// ```rust,no_run
/// use std::io::Write;
/// use zipstage::Container;
///
/// # fn main() -> zipstage::Result<()> {
/// let mut container = Container::open("book.epub")?;
/// container.each_item(|info| println!("{} ({} bytes)", info.path, info.uncompressed_size));
///
/// let mut writer = container.writer("META-INF/container.xml")?;
/// writer.write_all(b"<container/>")?;
///
/// let result = container.close()?;
/// println!("{} entries written", result.total_entries());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Container {
    engine: ZipEngine,
    options: ContainerOptions,
    closed: bool,
}

impl Container {
    /// Opens the container at `path` with default options, creating it on
    /// commit if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ContainerOptions::default())
    }

    /// Opens the container at `path` with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailed`] if the file cannot be opened, is not a ZIP
    /// container, or is missing while `create_if_missing` is unset.
    pub fn open_with_options(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        let engine = ZipEngine::open(path, options.create_if_missing)?
            .with_pull_buffer_size(options.pull_buffer_size);
        Ok(Self {
            engine,
            options,
            closed: false,
        })
    }

    /// Creates a uniquely named, empty `.zip` file in the system temporary
    /// directory and returns its path.
    ///
    /// The file is removed when the returned path is dropped. Opening a
    /// container on it yields an empty container.
    pub fn temp_file_path() -> Result<TempPath> {
        Ok(create_unique_temp_file("zip", None)?.into_temp_path())
    }

    /// The container path.
    pub fn path(&self) -> &Path {
        self.engine.path()
    }

    /// The options the container was opened with.
    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    /// Number of live entries, folders included.
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    /// Returns true if the container has no entries.
    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    /// Calls `visit` with the metadata of every entry, in container order.
    ///
    /// Entries whose metadata cannot be obtained are skipped.
    pub fn each_item(&self, mut visit: impl FnMut(&EntryInfo)) {
        for index in self.engine.indices() {
            match self.engine.stat_index(index) {
                Ok(info) => visit(&info),
                Err(e) => log::debug!("skipping entry #{}: {}", index, e),
            }
        }
    }

    /// Returns the metadata of every entry.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let mut entries = Vec::with_capacity(self.engine.len());
        self.each_item(|info| entries.push(info.clone()));
        entries
    }

    fn locate(&self, path: &ArchivePath) -> Option<usize> {
        self.engine
            .locate(path.as_str())
            .or_else(|| self.engine.locate(&path.folder_name()))
    }

    /// Returns true if a file or folder named `path` exists.
    pub fn contains_item(&self, path: &str) -> bool {
        ArchivePath::sanitized(path)
            .map(|p| self.locate(&p).is_some())
            .unwrap_or(false)
    }

    /// Removes the file or folder named `path`. Returns false if it does not
    /// exist.
    pub fn delete_item(&mut self, path: &str) -> bool {
        let Ok(path) = ArchivePath::sanitized(path) else {
            return false;
        };
        match self.locate(&path) {
            Some(index) => self.engine.delete(index).is_ok(),
            None => false,
        }
    }

    /// Adds a folder entry. Returns false if it already exists or the path is
    /// invalid.
    pub fn create_folder(&mut self, path: &str) -> bool {
        match ArchivePath::sanitized(path) {
            Ok(path) => self.engine.add_dir(&path.folder_name()).is_ok(),
            Err(e) => {
                log::debug!("cannot create folder: {}", e);
                false
            }
        }
    }

    /// Returns the metadata of the file or folder named `path`.
    pub fn info_at_path(&self, path: &str) -> Result<EntryInfo> {
        let path = ArchivePath::sanitized(path)?;
        let index = self.locate(&path).ok_or_else(|| Error::EntryNotFound {
            path: path.to_string(),
        })?;
        self.engine.stat_index(index)
    }

    /// Opens a reader over the committed data of `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if there is no such entry
    /// - [`Error::EntryPending`] if the entry was written or replaced and the
    ///   container has not been committed yet
    /// - [`Error::UnsupportedMethod`] if the entry is encrypted or uses a
    ///   method other than store and deflate
    pub fn open_reader(&self, path: &str) -> Result<EntryReader> {
        let path = ArchivePath::sanitized(path)?;
        self.engine
            .open_entry(path.as_str(), self.options.verify_crc)
    }

    /// Like [`open_reader`](Self::open_reader), returning `None` on failure.
    pub fn reader_at_path(&self, path: &str) -> Option<EntryReader> {
        self.open_reader(path)
            .map_err(|e| log::debug!("no reader for '{}': {}", path, e))
            .ok()
    }

    /// Creates a writer bound to `path`.
    ///
    /// The writer replaces an existing entry. A missing entry is added when
    /// `create` is set. Creating a second writer for the same path releases
    /// the first one.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if the entry is missing and `create` is unset
    /// - [`Error::EntryExists`] if `path` names a folder
    /// - [`Error::Io`] if the scratch file cannot be created
    pub fn create_writer(&mut self, path: &str, compressed: bool, create: bool) -> Result<EntryWriter> {
        let path = ArchivePath::sanitized(path)?;
        if self.engine.locate(&path.folder_name()).is_some() {
            return Err(Error::EntryExists {
                path: path.to_string(),
            });
        }
        if !create && self.engine.locate(path.as_str()).is_none() {
            return Err(Error::EntryNotFound {
                path: path.to_string(),
            });
        }

        let (writer, source) =
            EntryWriter::with_source(path.clone(), compressed, self.options.scratch_dir_path())?;
        self.engine
            .set_source(path.as_str(), Box::new(source), create)?;
        Ok(writer)
    }

    /// Like [`create_writer`](Self::create_writer), returning `None` on
    /// failure.
    pub fn writer_at_path(&mut self, path: &str, compressed: bool, create: bool) -> Option<EntryWriter> {
        self.create_writer(path, compressed, create)
            .map_err(|e| log::debug!("no writer for '{}': {}", path, e))
            .ok()
    }

    /// Creates a writer for `path` using the default compression, adding the
    /// entry if needed.
    pub fn writer(&mut self, path: &str) -> Result<EntryWriter> {
        self.create_writer(path, self.options.default_compression, true)
    }

    /// Binds a custom data source to `path`.
    ///
    /// The engine pulls from the source on commit and issues FREE exactly
    /// once, also when binding fails.
    pub fn add_source(
        &mut self,
        path: &str,
        source: Box<dyn DataSource>,
        create: bool,
    ) -> Result<()> {
        let path = ArchivePath::sanitized(path)?;
        self.engine.set_source(path.as_str(), source, create)?;
        Ok(())
    }

    /// Commits all changes and closes the container.
    pub fn close(mut self) -> Result<CommitResult> {
        self.closed = true;
        self.engine.commit()
    }

    /// Closes the container without committing. Staged writers are released.
    pub fn discard(mut self) {
        self.closed = true;
        log::debug!("discarding changes to {}", self.engine.path().display());
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.engine.commit() {
            log::warn!(
                "failed to commit {} on drop: {}",
                self.engine.path().display(),
                e
            );
        }
    }
}
