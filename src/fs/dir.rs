use fatfs::{Dir, DirIter};
use log::debug;
use serde::{Deserialize, Serialize};

use super::Volume;
use crate::{Result, SdBenchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Dir,
}

/// One directory entry as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes; zero for directories
    pub size: u64,
}

/// Open directory being enumerated; released on drop
pub struct DirHandle<'a, 'd> {
    path: String,
    iter: DirIter<'a, Volume<'d>>,
}

impl<'a, 'd> DirHandle<'a, 'd> {
    pub(crate) fn new(path: &str, dir: Dir<'a, Volume<'d>>) -> Self {
        Self {
            path: path.to_string(),
            iter: dir.iter(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next entry, or `None` at the end of the directory
    pub fn read_entry(&mut self) -> Result<Option<DirEntryInfo>> {
        loop {
            let entry = match self.iter.next() {
                None => return Ok(None),
                Some(entry) => entry.map_err(|source| SdBenchError::ReadDir {
                    path: self.path.clone(),
                    source,
                })?,
            };
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let (kind, size) = if entry.is_dir() {
                (EntryKind::Dir, 0)
            } else {
                (EntryKind::File, entry.len())
            };
            return Ok(Some(DirEntryInfo { name, kind, size }));
        }
    }
}

impl Drop for DirHandle<'_, '_> {
    fn drop(&mut self) {
        debug!("closed dir {}", self.path);
    }
}
