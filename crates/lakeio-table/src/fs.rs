//! Filesystem adapter
//!
//! Narrow capability over the substrate holding the metadata directory.
//! The store needs only existence checks, whole-file reads, truncating
//! writes, rename, and idempotent delete. Rename is the closest thing to
//! an atomicity primitive and even that is not assumed atomic: after a
//! successful return the destination holds the old source content and
//! the source is gone, nothing more.

use lakeio_common::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

/// Filesystem capability consumed by the table config store.
///
/// Implementations over object stores must ensure `exists` and
/// `open_read` reflect the caller's own completed writes.
pub trait FileSystem: Send + Sync {
    /// Check whether a path exists.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Open a path for reading.
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read>>;

    /// Create (or truncate) a path for writing.
    ///
    /// Flushing the returned writer must make the content visible to a
    /// subsequent `open_read` through the same adapter.
    fn create_write(&self, path: &Path) -> Result<Box<dyn Write>>;

    /// Rename `src` to `dst`, replacing any existing `dst`.
    fn rename(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Delete a path. Deleting a missing path is not an error.
    fn delete(&self, path: &Path) -> Result<()>;
}

/// Local filesystem implementation over `std::fs`.
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> Result<bool> {
        match std::fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read>> {
        match File::open(path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound {
                path: path.to_path_buf(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn create_write(&self, path: &Path) -> Result<Box<dyn Write>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(DurableFile(file)))
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        Ok(std::fs::rename(src, dst)?)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// File handle whose flush carries the durability barrier.
struct DurableFile(File);

impl Write for DurableFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()?;
        self.0.sync_all()
    }
}

/// Read a file fully into memory.
pub fn read_bytes(fs: &dyn FileSystem, path: &Path) -> Result<Vec<u8>> {
    let mut reader = fs.open_read(path)?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Write a whole file, flushing before returning.
pub fn write_bytes(fs: &dyn FileSystem, path: &Path, data: &[u8]) -> Result<()> {
    let mut writer = fs.create_write(path)?;
    writer.write_all(data)?;
    writer.flush()?;
    Ok(())
}
