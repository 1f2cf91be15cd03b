//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// A scratch directory holding one container path.
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

/// Creates a temporary directory and a (not yet existing) container path in it.
pub fn fixture(name: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    Fixture { dir, path }
}

/// Writes a ZIP file with the given entries using the `zip` crate directly.
///
/// Entries whose name ends with `/` become folders. `stored` selects
/// the store method instead of deflate for file entries.
pub fn seed_zip(path: &Path, entries: &[(&str, &[u8])], stored: bool) {
    let method = if stored {
        zip::CompressionMethod::Stored
    } else {
        zip::CompressionMethod::Deflated
    };
    let options = SimpleFileOptions::default().compression_method(method);

    let mut zip = zip::ZipWriter::new(File::create(path).expect("create zip"));
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).expect("add directory");
        } else {
            zip.start_file(*name, options).expect("start file");
            zip.write_all(data).expect("write entry");
        }
    }
    zip.finish().expect("finish zip");
}

/// Reads every file entry of a ZIP with the `zip` crate, in archive order.
pub fn read_zip(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(File::open(path).expect("open zip")).expect("parse zip");
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).expect("entry");
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data).expect("read entry");
        entries.push((file.name().to_string(), data));
    }
    entries
}

/// Returns every entry name of a ZIP, folders included.
pub fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).expect("open zip")).expect("parse zip");
    archive.file_names().map(str::to_string).collect()
}

/// Returns the compression method of one entry.
pub fn zip_method(path: &Path, name: &str) -> zip::CompressionMethod {
    let mut archive = zip::ZipArchive::new(File::open(path).expect("open zip")).expect("parse zip");
    let method = archive.by_name(name).expect("entry").compression();
    method
}

/// Deterministic, moderately compressible test data.
pub fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ (i / 1024) as u8).collect()
}
