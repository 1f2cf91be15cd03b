//! Configuration for opening containers.
//!
//! This module provides [`ContainerOptions`] for controlling how a container
//! is opened, where writers stage their bytes and how the engine pulls them.

use std::path::{Path, PathBuf};

/// Default size of the buffer the engine pulls source data through (64 KiB).
pub const DEFAULT_PULL_BUFFER_SIZE: usize = 64 * 1024;

/// Options for [`Container::open_with_options`].
///
/// # Example
///
/// ```rust
/// use zipstage::ContainerOptions;
///
/// // Default configuration (create if missing, system temp dir, 64 KiB pulls)
/// let options = ContainerOptions::default();
///
/// // Open only existing containers and stage writes next to them
/// let options = ContainerOptions::new()
///     .create_if_missing(false)
///     .scratch_dir("/var/tmp/books")
///     .pull_buffer_size(16 * 1024);
/// ```
///
/// [`Container::open_with_options`]: crate::Container::open_with_options
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    /// Create the container when the path does not exist.
    ///
    /// Default: true.
    pub create_if_missing: bool,

    /// Directory for writer scratch files.
    ///
    /// `None` uses the platform temporary directory.
    /// Default: None.
    pub scratch_dir: Option<PathBuf>,

    /// Buffer size the engine uses for each READ it issues to a data source.
    ///
    /// Values below 1 are raised to 1.
    /// Default: 64 KiB.
    pub pull_buffer_size: usize,

    /// Verify CRC-32 when an entry reader delivers its last byte.
    ///
    /// Default: true.
    pub verify_crc: bool,

    /// Compression used by [`Container::writer`].
    ///
    /// Default: true (deflate).
    ///
    /// [`Container::writer`]: crate::Container::writer
    pub default_compression: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            scratch_dir: None,
            pull_buffer_size: DEFAULT_PULL_BUFFER_SIZE,
            verify_crc: true,
            default_compression: true,
        }
    }
}

impl ContainerOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether a missing container is created.
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Sets the directory for writer scratch files.
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Sets the engine's pull buffer size.
    pub fn pull_buffer_size(mut self, size: usize) -> Self {
        self.pull_buffer_size = size.max(1);
        self
    }

    /// Sets whether readers verify CRC-32.
    pub fn verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Sets the compression used by [`Container::writer`].
    ///
    /// [`Container::writer`]: crate::Container::writer
    pub fn default_compression(mut self, compressed: bool) -> Self {
        self.default_compression = compressed;
        self
    }

    /// Returns the configured scratch directory, if any.
    pub fn scratch_dir_path(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ContainerOptions::default();
        assert!(options.create_if_missing);
        assert!(options.scratch_dir.is_none());
        assert_eq!(options.pull_buffer_size, DEFAULT_PULL_BUFFER_SIZE);
        assert!(options.verify_crc);
        assert!(options.default_compression);
    }

    #[test]
    fn test_builder_chain() {
        let options = ContainerOptions::new()
            .create_if_missing(false)
            .scratch_dir("/tmp/scratch")
            .pull_buffer_size(0)
            .verify_crc(false)
            .default_compression(false);

        assert!(!options.create_if_missing);
        assert_eq!(options.scratch_dir_path(), Some(Path::new("/tmp/scratch")));
        assert_eq!(options.pull_buffer_size, 1);
        assert!(!options.verify_crc);
        assert!(!options.default_compression);
    }
}
