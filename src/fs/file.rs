use std::io::{self, Read, Seek, SeekFrom, Write};

use fatfs::File;
use log::{debug, warn};

use super::Volume;
use crate::{Result, SdBenchError};

/// How [`super::Mount::open_file`] treats the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read access
    Read,
    /// Create the file, or truncate it to zero length if present
    CreateTruncate,
}

/// One open file on a mounted volume
///
/// The handle holds the mount's mutable borrow, so only one file is open
/// at a time. Dropping the handle releases the file; `close` does the
/// same but reports a failed final flush.
pub struct FileHandle<'a, 'd> {
    path: String,
    mode: OpenMode,
    file: File<'a, Volume<'d>>,
}

impl<'a, 'd> FileHandle<'a, 'd> {
    pub(crate) fn new(path: &str, mode: OpenMode, file: File<'a, Volume<'d>>) -> Self {
        debug!("opened {} ({:?})", path, mode);
        Self {
            path: path.to_string(),
            mode,
            file,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Move the file position; returns the new offset
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file.seek(pos).map_err(|source| SdBenchError::Seek {
            path: self.path.clone(),
            source,
        })
    }

    /// Read until `buf` is full or the end of the file; returns the byte
    /// count, which is short only at end of file
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            match self.file.read(&mut buf[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(done)
    }

    /// Write all of `buf` unless the volume runs out of space; returns the
    /// byte count, which is short only when the volume is full
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.mode == OpenMode::Read {
            return Err(SdBenchError::Open {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "opened read-only"),
            });
        }
        let mut done = 0;
        while done < buf.len() {
            match self.file.write(&buf[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if done > 0 && is_volume_full(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(done)
    }

    /// Flush cached data and the directory entry to the device
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flush and release the file
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }
}

impl Drop for FileHandle<'_, '_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.flush() {
            warn!("flush on close failed for {}: {}", self.path, e);
        }
        debug!("closed {}", self.path);
    }
}

fn is_volume_full(err: &io::Error) -> bool {
    // fatfs reports cluster exhaustion as Other with this message; any
    // other Other error is a device fault and must not be swallowed
    match err.kind() {
        io::ErrorKind::WriteZero => true,
        io::ErrorKind::Other => err
            .to_string()
            .to_ascii_lowercase()
            .contains("no space left"),
        _ => false,
    }
}
