//! Archive path type with normalization for container entry names.

use crate::{Error, Result};
use std::fmt;

/// Maximum length for archive paths (in bytes).
///
/// ZIP stores name lengths in a 16-bit field.
const MAX_PATH_LENGTH: usize = u16::MAX as usize;

/// A validated entry path inside a container.
///
/// `ArchivePath` uses forward slashes and guarantees that:
/// - No NUL bytes are present
/// - The path is not absolute (does not start with `/`)
/// - No empty segments exist (no `//` or trailing `/`)
/// - No `.` or `..` segments are present
///
/// Callers usually go through [`ArchivePath::sanitized`], which normalizes the
/// common spellings (`/OEBPS/a.xhtml`, `.\OEBPS\a.xhtml`) before validating.
///
/// # Examples
///
/// ```
/// use zipstage::ArchivePath;
///
/// let path = ArchivePath::sanitized("/META-INF//container.xml").unwrap();
/// assert_eq!(path.as_str(), "META-INF/container.xml");
///
/// assert!(ArchivePath::new("../secret").is_err());
/// assert!(ArchivePath::sanitized("a/../../secret").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Creates a new `ArchivePath` from an already normalized string.
    ///
    /// # Errors
    ///
    /// Returns an error if the path:
    /// - Contains NUL bytes
    /// - Is an absolute path (starts with `/`)
    /// - Contains empty segments (e.g., `a//b`) or a trailing slash
    /// - Contains `.` or `..` segments
    /// - Is empty
    pub fn new(s: &str) -> Result<Self> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Normalizes a caller-supplied path and validates the result.
    ///
    /// Backslashes become `/`, leading and repeated separators are dropped,
    /// `.` segments are removed and a trailing `/` is ignored. `..` is never
    /// resolved: it is rejected.
    pub fn sanitized(s: &str) -> Result<Self> {
        if s.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }

        let normalized = s.replace('\\', "/");
        let segments: Vec<&str> = normalized
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();

        Self::new(&segments.join("/"))
    }

    /// Validates an archive path string.
    fn validate(s: &str) -> Result<()> {
        if s.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }

        if s.is_empty() {
            return Err(Error::InvalidArchivePath("empty path".into()));
        }

        if s.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidArchivePath(format!(
                "path exceeds maximum length of {} bytes",
                MAX_PATH_LENGTH
            )));
        }

        if s.starts_with('/') {
            return Err(Error::InvalidArchivePath(
                "absolute path not allowed".into(),
            ));
        }

        if s.ends_with('/') {
            return Err(Error::InvalidArchivePath(
                "trailing slash not allowed".into(),
            ));
        }

        for segment in s.split('/') {
            if segment.is_empty() {
                return Err(Error::InvalidArchivePath(
                    "empty segment (consecutive slashes)".into(),
                ));
            }
            if segment == "." {
                return Err(Error::InvalidArchivePath("'.' segment not allowed".into()));
            }
            if segment == ".." {
                return Err(Error::InvalidArchivePath(
                    "'..' segment not allowed (path traversal)".into(),
                ));
            }
        }

        Ok(())
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the container name used for a folder entry at this path.
    pub fn folder_name(&self) -> String {
        format!("{}/", self.0)
    }

    /// Returns the parent directory of this path, if any.
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Returns the file name (last segment) of this path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for ArchivePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::sanitized(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nested_path() {
        let path = ArchivePath::new("OEBPS/chapter1.xhtml").unwrap();
        assert_eq!(path.as_str(), "OEBPS/chapter1.xhtml");
    }

    #[test]
    fn test_valid_unicode() {
        let path = ArchivePath::new("日本語/файл.txt").unwrap();
        assert_eq!(path.as_str(), "日本語/файл.txt");
    }

    #[test]
    fn test_invalid_empty() {
        let err = ArchivePath::new("").unwrap_err();
        assert!(matches!(err, Error::InvalidArchivePath(_)));
    }

    #[test]
    fn test_invalid_nul_byte() {
        let err = ArchivePath::sanitized("file\0.txt").unwrap_err();
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn test_new_rejects_absolute_and_trailing() {
        assert!(ArchivePath::new("/etc/passwd").is_err());
        assert!(ArchivePath::new("dir/").is_err());
        assert!(ArchivePath::new("a//b").is_err());
        assert!(ArchivePath::new("./file").is_err());
    }

    #[test]
    fn test_sanitized_strips_leading_slash() {
        let path = ArchivePath::sanitized("/mimetype").unwrap();
        assert_eq!(path.as_str(), "mimetype");
    }

    #[test]
    fn test_sanitized_normalizes_separators() {
        let path = ArchivePath::sanitized(".\\OEBPS\\\\images/./cover.png").unwrap();
        assert_eq!(path.as_str(), "OEBPS/images/cover.png");
    }

    #[test]
    fn test_sanitized_ignores_trailing_slash() {
        let path = ArchivePath::sanitized("OEBPS/images/").unwrap();
        assert_eq!(path.as_str(), "OEBPS/images");
        assert_eq!(path.folder_name(), "OEBPS/images/");
    }

    #[test]
    fn test_sanitized_rejects_traversal() {
        let err = ArchivePath::sanitized("OEBPS/../../etc/passwd").unwrap_err();
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn test_sanitized_rejects_only_separators() {
        assert!(ArchivePath::sanitized("/").is_err());
        assert!(ArchivePath::sanitized("./.").is_err());
    }

    #[test]
    fn test_parent_and_file_name() {
        let path = ArchivePath::new("a/b/c.txt").unwrap();
        assert_eq!(path.file_name(), "c.txt");
        assert_eq!(path.parent().unwrap().as_str(), "a/b");
        assert!(ArchivePath::new("c.txt").unwrap().parent().is_none());
    }
}
