//! Entry metadata snapshots.

/// Metadata for one container entry.
///
/// A value snapshot produced on demand; it does not track later changes to
/// the container. For entries with staged data the sizes reflect what the
/// data source reported at the time of the query and `compressed_size` is 0
/// until the container is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry name as stored in the container (folders end with `/`).
    pub path: String,
    /// Whether the entry data is compressed.
    pub is_compressed: bool,
    /// Stored size in bytes.
    pub compressed_size: u64,
    /// Size of the entry data in bytes.
    pub uncompressed_size: u64,
    /// Whether the entry is a folder.
    pub is_folder: bool,
    /// Whether the entry has staged changes that are not committed yet.
    pub is_pending: bool,
}

impl EntryInfo {
    /// Returns the stored/uncompressed ratio (1.0 for empty entries).
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed_size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.uncompressed_size as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_ratio() {
        let mut info = EntryInfo {
            path: "a".into(),
            is_compressed: true,
            compressed_size: 25,
            uncompressed_size: 100,
            is_folder: false,
            is_pending: false,
        };
        assert!((info.compression_ratio() - 0.25).abs() < f64::EPSILON);

        info.uncompressed_size = 0;
        assert_eq!(info.compression_ratio(), 1.0);
    }
}
