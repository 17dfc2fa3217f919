//! Temporary file storage for large file parts
//!
//! File parts that do not fit in the in-memory budget are written to a temp
//! file instead. The file is removed when the handle is dropped.
//!
//! # Example
//!
//! ```no_run
//! use party::upload::temp_file::TempFile;
//! use std::io::{Read, Seek, Write};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut temp = TempFile::create()?;
//! temp.write_all(b"Hello, World!")?;
//! temp.rewind()?;
//!
//! let mut contents = String::new();
//! temp.read_to_string(&mut contents)?;
//! println!("File: {:?}", temp.path());
//! # Ok(())
//! # }
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Temporary file removed on drop (RAII pattern)
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    file: File,
}

impl TempFile {
    /// Create an empty temp file open for reading and writing
    ///
    /// Lives in [`std::env::temp_dir`].
    pub fn create() -> io::Result<Self> {
        let path = std::env::temp_dir().join(format!("party-{}.tmp", uuid::Uuid::new_v4()));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self { path, file })
    }

    /// Get the path to the temp file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the file in bytes
    #[cfg(test)]
    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    #[cfg(test)]
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Read for TempFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for TempFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for TempFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up temp file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut temp = TempFile::create().unwrap();
        temp.write_all(b"test data").unwrap();
        temp.rewind().unwrap();

        let mut buf = Vec::new();
        temp.read_to_end(&mut buf).unwrap();

        assert!(temp.path().exists());
        assert!(temp.path().starts_with(std::env::temp_dir()));
        assert_eq!(buf, b"test data");
        assert_eq!(temp.len().unwrap(), 9);
    }

    #[test]
    fn test_cleanup_on_drop() {
        let path;
        {
            let temp = TempFile::create().unwrap();
            path = temp.path().to_path_buf();
            assert!(path.exists());
            assert!(temp.is_empty().unwrap());
        }
        // Dropped
        assert!(!path.exists());
    }
}
