//! Block-device access layer
//!
//! Disks are registered under a driver name and addressed by that name,
//! the way the card's driver is reached as `"SD"`. The registry tracks
//! which disks have been initialized and answers geometry queries.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, Write};

use log::debug;

use crate::{Result, SdBenchError};

pub mod image;
#[cfg(test)]
pub(crate) mod fault;

pub use image::{ImageDisk, MemoryDisk, SECTOR_SIZE};

/// A sector-addressed storage medium exposed as a byte stream
///
/// The stream view is what the FAT layer consumes; the geometry methods
/// back the ioctl queries.
pub trait BlockDevice: Read + Write + Seek {
    /// Bring the medium up; fails when no medium is present
    fn init(&mut self) -> io::Result<()>;

    /// Number of addressable sectors
    fn sector_count(&self) -> io::Result<u32>;

    /// Size of one sector in bytes
    fn sector_size(&self) -> u32;

    /// Flush cached writes to the medium
    fn sync(&mut self) -> io::Result<()>;
}

/// Control requests understood by [`DiskAccess::ioctl`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskIoctl {
    GetSectorCount,
    GetSectorSize,
    CtrlSync,
}

struct DiskSlot {
    device: Box<dyn BlockDevice>,
    initialized: bool,
}

/// Named registry of block devices
#[derive(Default)]
pub struct DiskAccess {
    disks: BTreeMap<String, DiskSlot>,
}

impl DiskAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device` under `name`, replacing any previous device
    pub fn register(&mut self, name: impl Into<String>, device: impl BlockDevice + 'static) {
        self.disks.insert(
            name.into(),
            DiskSlot {
                device: Box::new(device),
                initialized: false,
            },
        );
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.disks.get(name).map(|s| s.initialized).unwrap_or(false)
    }

    /// Initialize the disk registered as `name`
    pub fn init(&mut self, name: &str) -> Result<()> {
        let slot = self.slot_mut(name)?;
        slot.device.init().map_err(|e| driver_error(name, e))?;
        slot.initialized = true;
        debug!("disk {} initialized", name);
        Ok(())
    }

    /// Query or control an initialized disk
    pub fn ioctl(&mut self, name: &str, cmd: DiskIoctl) -> Result<u32> {
        let slot = self.slot_mut(name)?;
        if !slot.initialized {
            return Err(SdBenchError::Driver {
                disk: name.to_string(),
                message: "disk not initialized".to_string(),
            });
        }
        match cmd {
            DiskIoctl::GetSectorCount => slot
                .device
                .sector_count()
                .map_err(|e| driver_error(name, e)),
            DiskIoctl::GetSectorSize => Ok(slot.device.sector_size()),
            DiskIoctl::CtrlSync => {
                slot.device.sync().map_err(|e| driver_error(name, e))?;
                Ok(0)
            }
        }
    }

    /// Hand the device to a filesystem, initializing it first if needed
    pub fn volume(&mut self, name: &str) -> Result<&mut (dyn BlockDevice + 'static)> {
        if !self.is_initialized(name) {
            self.init(name)?;
        }
        let slot = self.slot_mut(name)?;
        Ok(slot.device.as_mut())
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut DiskSlot> {
        self.disks.get_mut(name).ok_or_else(|| SdBenchError::Driver {
            disk: name.to_string(),
            message: "no such disk".to_string(),
        })
    }
}

fn driver_error(name: &str, err: io::Error) -> SdBenchError {
    SdBenchError::Driver {
        disk: name.to_string(),
        message: err.to_string(),
    }
}
