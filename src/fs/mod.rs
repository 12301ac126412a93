//! Filesystem layer
//!
//! Mounts the FAT volume found on a [`BlockDevice`] under a mount point
//! such as `/SD:` and exposes directory and file operations addressed by
//! absolute paths below that mount point. The FAT implementation itself
//! is the `fatfs` crate.

use std::io::{self, SeekFrom};

use fatfs::{FileSystem, FormatVolumeOptions, FsOptions};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::disk::BlockDevice;
use crate::{Result, SdBenchError};

pub mod dir;
pub mod file;

pub use dir::{DirEntryInfo, DirHandle, EntryKind};
pub use file::{FileHandle, OpenMode};

/// Device handle as seen by the FAT layer
pub type Volume<'d> = &'d mut (dyn BlockDevice + 'static);

/// Filesystem implementation behind a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsKind {
    FatFs,
}

/// What to mount and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountDescriptor {
    pub kind: FsKind,
    pub mount_point: String,
}

impl MountDescriptor {
    pub fn fat(mount_point: impl Into<String>) -> Self {
        Self {
            kind: FsKind::FatFs,
            mount_point: mount_point.into(),
        }
    }
}

/// Facts about a mounted volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub fat_type: String,
    pub label: String,
    pub volume_id: u32,
    pub cluster_size: u32,
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// A mounted FAT volume
pub struct Mount<'d> {
    descriptor: MountDescriptor,
    fs: FileSystem<Volume<'d>>,
}

impl<'d> Mount<'d> {
    /// Mount the filesystem on `device` at the descriptor's mount point
    pub fn mount(descriptor: MountDescriptor, device: Volume<'d>) -> Result<Self> {
        let mount_err = |source: io::Error| SdBenchError::Mount {
            mount_point: descriptor.mount_point.clone(),
            source,
        };
        device.seek(SeekFrom::Start(0)).map_err(mount_err)?;
        let fs = FileSystem::new(device, FsOptions::new()).map_err(mount_err)?;
        debug!(
            "mounted {:?} volume at {}",
            fs.fat_type(),
            descriptor.mount_point
        );
        Ok(Self { descriptor, fs })
    }

    pub fn mount_point(&self) -> &str {
        &self.descriptor.mount_point
    }

    pub fn descriptor(&self) -> &MountDescriptor {
        &self.descriptor
    }

    pub fn volume_info(&self) -> Result<VolumeInfo> {
        let stats = self.fs.stats()?;
        let cluster_size = stats.cluster_size();
        Ok(VolumeInfo {
            fat_type: format!("{:?}", self.fs.fat_type()),
            label: self.fs.volume_label().trim_end().to_string(),
            volume_id: self.fs.volume_id(),
            cluster_size,
            total_bytes: stats.total_clusters() as u64 * cluster_size as u64,
            free_bytes: stats.free_clusters() as u64 * cluster_size as u64,
        })
    }

    /// Path relative to the volume root, or an error if `path` is not
    /// below the mount point
    pub fn resolve<'p>(&self, path: &'p str) -> Result<&'p str> {
        let rest = path
            .strip_prefix(self.descriptor.mount_point.as_str())
            .ok_or_else(|| SdBenchError::InvalidPath(path.to_string()))?;
        if rest.is_empty() {
            return Ok(rest);
        }
        match rest.strip_prefix('/') {
            Some(inner) => Ok(inner.trim_end_matches('/')),
            None => Err(SdBenchError::InvalidPath(path.to_string())),
        }
    }

    /// Open a directory for enumeration
    pub fn open_dir(&self, path: &str) -> Result<DirHandle<'_, 'd>> {
        let rel = self.resolve(path)?;
        let root = self.fs.root_dir();
        let dir = if rel.is_empty() {
            root
        } else {
            root.open_dir(rel).map_err(|source| SdBenchError::ReadDir {
                path: path.to_string(),
                source,
            })?
        };
        Ok(DirHandle::new(path, dir))
    }

    /// List the entries of a directory, logging each one
    ///
    /// Enumeration stops at the end of the directory or at the first
    /// error; the directory handle is released either way.
    pub fn lsdir(&self, path: &str) -> Result<Vec<DirEntryInfo>> {
        let mut dir = self.open_dir(path)?;
        info!("Listing dir {} ...", dir.path());

        let mut entries = Vec::new();
        while let Some(entry) = dir.read_entry()? {
            match entry.kind {
                EntryKind::Dir => info!("[DIR ] {}", entry.name),
                EntryKind::File => info!("[FILE] {} (size = {})", entry.name, entry.size),
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Look up a single entry by path; the mount point itself is the
    /// root directory
    pub fn stat(&self, path: &str) -> Result<DirEntryInfo> {
        let rel = self.resolve(path)?;
        if rel.is_empty() {
            return Ok(DirEntryInfo {
                name: self.descriptor.mount_point.clone(),
                kind: EntryKind::Dir,
                size: 0,
            });
        }
        let (parent, name) = match rel.rfind('/') {
            Some(idx) => (&rel[..idx], &rel[idx + 1..]),
            None => ("", rel),
        };
        let parent_path = if parent.is_empty() {
            self.descriptor.mount_point.clone()
        } else {
            format!("{}/{}", self.descriptor.mount_point, parent)
        };

        let mut dir = self.open_dir(&parent_path)?;
        while let Some(entry) = dir.read_entry()? {
            if entry.name.eq_ignore_ascii_case(name) {
                return Ok(entry);
            }
        }
        Err(SdBenchError::Open {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
        })
    }

    /// Open a file; the handle borrows the mount until it is closed
    pub fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle<'_, 'd>> {
        let rel = self.resolve(path)?;
        let open_err = |source: io::Error| SdBenchError::Open {
            path: path.to_string(),
            source,
        };
        if rel.is_empty() {
            return Err(open_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path names the volume root",
            )));
        }

        let root = self.fs.root_dir();
        let file = match mode {
            OpenMode::Read => root.open_file(rel).map_err(open_err)?,
            OpenMode::CreateTruncate => {
                let mut file = root.create_file(rel).map_err(open_err)?;
                file.truncate().map_err(open_err)?;
                file
            }
        };
        Ok(FileHandle::new(path, mode, file))
    }

    /// Flush and release the volume
    pub fn unmount(self) -> Result<()> {
        debug!("unmounting {}", self.descriptor.mount_point);
        self.fs.unmount()?;
        Ok(())
    }
}

/// Write a fresh FAT filesystem over the whole device
pub fn format(device: Volume<'_>, label: &str) -> Result<()> {
    let mut volume_label = [b' '; 11];
    for (slot, byte) in volume_label.iter_mut().zip(label.bytes()) {
        *slot = byte.to_ascii_uppercase();
    }
    device.seek(SeekFrom::Start(0))?;
    fatfs::format_volume(&mut *device, FormatVolumeOptions::new().volume_label(volume_label))?;
    device.sync()?;
    info!("Formatted volume {}", label);
    Ok(())
}
