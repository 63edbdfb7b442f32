//! File reading utilities with memory mapping support.
//!
//! Knowledge-base documents and department directories are read through
//! [`FileReader`], which maps large files instead of copying them through a
//! read buffer.

// Memory mapping requires unsafe but is well-documented and safe for read-only access
#![allow(unsafe_code)]

use crate::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Threshold for using memory mapping (1MB).
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Maximum document size accepted into the knowledge base (256MB).
const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// File reader with support for memory mapping.
///
/// - Small files (< 1MB): read directly into memory
/// - Large files (>= 1MB): memory mapped
///
/// # Examples
///
/// ```no_run
/// use medchat_rs::io::FileReader;
///
/// let reader = FileReader::open("guides/visiting-hours.md").unwrap();
/// let content = reader.read_to_string().unwrap();
/// ```
pub struct FileReader {
    file: File,
    size: u64,
    path: String,
}

impl FileReader {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, can't be opened, or
    /// exceeds the size limit.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        if !path_ref.exists() {
            return Err(IoError::FileNotFound { path: path_str }.into());
        }

        let read_failed = |e: std::io::Error| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        };
        let file = File::open(path_ref).map_err(read_failed)?;
        let size = file.metadata().map_err(read_failed)?.len();

        if size > MAX_FILE_SIZE {
            return Err(IoError::ReadFailed {
                path: path_str,
                reason: format!("file too large: {size} bytes (max: {MAX_FILE_SIZE} bytes)"),
            }
            .into());
        }

        Ok(Self {
            file,
            size,
            path: path_str,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Reads the file content as a UTF-8 string.
    ///
    /// A leading byte-order mark is stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or content is not valid UTF-8.
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = if self.size >= MMAP_THRESHOLD {
            self.read_mmap_bytes()?
        } else {
            self.read_direct_bytes()?
        };
        let mut text = String::from_utf8(bytes).map_err(|e| IoError::ReadFailed {
            path: self.path.clone(),
            reason: format!("invalid UTF-8: {e}"),
        })?;
        if text.starts_with('\u{feff}') {
            text.drain(..'\u{feff}'.len_utf8());
        }
        Ok(text)
    }

    fn read_mmap_bytes(&self) -> Result<Vec<u8>> {
        // Safety: the mapping is read-only and dropped before returning
        let mmap = unsafe {
            Mmap::map(&self.file).map_err(|e| IoError::MmapFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?
        };
        Ok(mmap.to_vec())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_direct_bytes(&self) -> Result<Vec<u8>> {
        let mut file = &self.file;
        let mut buffer = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut buffer)
            .map_err(|e| IoError::ReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(buffer)
    }
}

/// Reads a file to string, choosing the reading strategy by size.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    FileReader::open(path)?.read_to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_small_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "내과\n외과\n").unwrap();
        assert_eq!(read_file(file.path()).unwrap(), "내과\n외과\n");
    }

    #[test]
    fn test_read_large_file_uses_mmap() {
        let mut file = NamedTempFile::new().unwrap();
        let line = "응급실은 24시간 운영합니다.\n";
        let repeats = (MMAP_THRESHOLD as usize / line.len()) + 1;
        for _ in 0..repeats {
            file.write_all(line.as_bytes()).unwrap();
        }
        let reader = FileReader::open(file.path()).unwrap();
        assert!(reader.size() >= MMAP_THRESHOLD);
        let content = reader.read_to_string().unwrap();
        assert_eq!(content.len(), line.len() * repeats);
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("\u{feff}안내".as_bytes()).unwrap();
        assert_eq!(read_file(file.path()).unwrap(), "안내");
    }

    #[test]
    fn test_missing_file() {
        let err = read_file("/nonexistent/departments.txt").unwrap_err();
        assert!(matches!(err, Error::Io(IoError::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00]).unwrap();
        let err = read_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid UTF-8"));
    }
}
