//! # zipstage
//!
//! Read and write entries of a ZIP container (EPUB, OOXML, plain `.zip`)
//! through a pull-based data source.
//!
//! Writers never push bytes into the archive. Each [`EntryWriter`] stages
//! what the caller writes in a disk-backed [`ScratchBuffer`] and registers a
//! [`WriterSource`] with the container's engine. When the container is
//! committed, the engine pulls the staged bytes on its own schedule, compresses
//! them, and finally releases the writer state and its scratch file. Staged
//! data therefore never has to fit in memory.
//!
//! ## Quick Start
//!
//! ### Writing Entries
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipstage::{Container, Result};
//!
//! fn main() -> Result<()> {
//!     let mut container = Container::open("book.epub")?;
//!
//!     // Stored (uncompressed), created if missing
//!     if let Some(mut mimetype) = container.writer_at_path("mimetype", false, true) {
//!         mimetype.write_all(b"application/epub+zip")?;
//!     }
//!
//!     // Deflated, using the default compression setting
//!     let mut chapter = container.writer("OEBPS/chapter1.xhtml")?;
//!     chapter.write_all(b"<html>...</html>")?;
//!
//!     let result = container.close()?;
//!     println!("{} entries, {} bytes pulled", result.total_entries(), result.bytes_pulled);
//!     Ok(())
//! }
//! ```
//!
//! ### Reading Entries
//!
//! ```rust,no_run
//! use zipstage::{Container, Result};
//!
//! fn main() -> Result<()> {
//!     let container = Container::open("book.epub")?;
//!
//!     for info in container.entries() {
//!         println!("{}: {} bytes", info.path, info.uncompressed_size);
//!     }
//!
//!     if let Some(mut reader) = container.reader_at_path("mimetype") {
//!         let mut buf = [0u8; 64];
//!         let n = reader.read(&mut buf)?;
//!         println!("{}", String::from_utf8_lossy(&buf[..n]));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Commit Semantics
//!
//! All changes (writers, deletions, new folders) are staged and only reach
//! the file when the container is closed or dropped. A commit writes a new
//! container next to the target and atomically replaces it. Readers only
//! see committed data; reading an entry with staged changes fails with
//! [`Error::EntryPending`].
//!
//! ## Custom Data Sources
//!
//! Anything implementing [`DataSource`] can feed an entry through
//! [`Container::add_source`]. The engine drives it with [`SourceCommand`]s
//! and issues [`SourceCommand::Free`] exactly once.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Failures inside the pull protocol are
//! reported by the source as [`SourceFailure`] values and surface from
//! [`Container::close`] as [`Error::SourceFailed`].
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and installs no logger.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive_path;
pub mod config;
pub mod container;
pub mod engine;
pub mod entry;
pub mod error;
pub mod read;
pub mod scratch;
pub mod source;
pub mod timestamp;
pub mod write;

pub use archive_path::ArchivePath;
pub use config::ContainerOptions;
pub use container::Container;
pub use engine::{CommitResult, ZipEngine};
pub use entry::EntryInfo;
pub use error::{Error, Result};
pub use read::EntryReader;
pub use scratch::ScratchBuffer;
pub use source::{DataSource, SourceCommand, SourceFailure, StatRecord, StoredMethod};
pub use timestamp::Timestamp;
pub use write::{EntryWriter, WriterSource};
