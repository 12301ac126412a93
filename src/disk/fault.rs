//! Block device that fails reads or writes touching chosen byte ranges

use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::rc::Rc;

use super::{BlockDevice, MemoryDisk};

#[derive(Debug, Default)]
struct Faults {
    reads: Option<Range<u64>>,
    writes: Option<Range<u64>>,
}

/// Handle for arming and clearing the faults of a [`FailingDisk`] while
/// a filesystem holds the disk
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Rc<RefCell<Faults>>);

impl FaultSwitch {
    pub fn fail_reads(&self, range: Range<u64>) {
        self.0.borrow_mut().reads = Some(range);
    }

    pub fn fail_writes(&self, range: Range<u64>) {
        self.0.borrow_mut().writes = Some(range);
    }

    pub fn clear(&self) {
        *self.0.borrow_mut() = Faults::default();
    }
}

pub struct FailingDisk {
    inner: MemoryDisk,
    faults: FaultSwitch,
}

impl FailingDisk {
    pub fn new(inner: MemoryDisk) -> (Self, FaultSwitch) {
        let faults = FaultSwitch::default();
        let disk = Self {
            inner,
            faults: faults.clone(),
        };
        (disk, faults)
    }

    fn check(&mut self, len: usize, write: bool) -> io::Result<()> {
        let start = self.inner.stream_position()?;
        let end = start + len as u64;
        let faults = self.faults.0.borrow();
        let range = if write { &faults.writes } else { &faults.reads };
        match range {
            Some(r) if start < r.end && r.start < end => {
                Err(io::Error::new(io::ErrorKind::Other, "device fault"))
            }
            _ => Ok(()),
        }
    }
}

impl Read for FailingDisk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check(buf.len(), false)?;
        self.inner.read(buf)
    }
}

impl Write for FailingDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check(buf.len(), true)?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FailingDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl BlockDevice for FailingDisk {
    fn init(&mut self) -> io::Result<()> {
        self.inner.init()
    }

    fn sector_count(&self) -> io::Result<u32> {
        self.inner.sector_count()
    }

    fn sector_size(&self) -> u32 {
        self.inner.sector_size()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.inner.sync()
    }
}

/// Byte regions of a FAT12/16 volume, taken from its boot sector
#[derive(Debug, Clone)]
pub struct FatLayout {
    pub fat: Range<u64>,
    pub root_dir: Range<u64>,
    pub data_start: u64,
    pub cluster_size: u64,
}

impl FatLayout {
    pub fn of(disk: &MemoryDisk) -> Self {
        let b = disk.as_bytes();
        let u16_at = |off: usize| u16::from_le_bytes([b[off], b[off + 1]]) as u64;

        let bytes_per_sector = u16_at(11);
        let sectors_per_cluster = b[13] as u64;
        let reserved_sectors = u16_at(14);
        let fats = b[16] as u64;
        let root_entries = u16_at(17);
        let sectors_per_fat = u16_at(22);
        assert!(sectors_per_fat > 0, "not a FAT12/16 volume");

        let fat_start = reserved_sectors * bytes_per_sector;
        let root_start = fat_start + fats * sectors_per_fat * bytes_per_sector;
        let root_sectors = (root_entries * 32 + bytes_per_sector - 1) / bytes_per_sector;
        let data_start = root_start + root_sectors * bytes_per_sector;

        Self {
            fat: fat_start..fat_start + sectors_per_fat * bytes_per_sector,
            root_dir: root_start..data_start,
            data_start,
            cluster_size: sectors_per_cluster * bytes_per_sector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs;

    #[test]
    fn test_faults_only_hit_armed_range() {
        let (mut disk, faults) = FailingDisk::new(MemoryDisk::new(4096));
        faults.fail_reads(1024..2048);

        let mut buf = [0u8; 512];
        disk.seek(SeekFrom::Start(0)).unwrap();
        assert!(disk.read(&mut buf).is_ok());
        disk.seek(SeekFrom::Start(768)).unwrap();
        assert!(disk.read(&mut buf).is_err());
        assert!(disk.write(&buf).is_ok());

        faults.clear();
        disk.seek(SeekFrom::Start(1024)).unwrap();
        assert!(disk.read(&mut buf).is_ok());
    }

    #[test]
    fn test_layout_regions_are_ordered() {
        let mut disk = MemoryDisk::new(8 * 1024 * 1024);
        fs::format(&mut disk, "LAYOUT").unwrap();
        let layout = FatLayout::of(&disk);

        assert!(layout.fat.start >= 512);
        assert!(layout.fat.end <= layout.root_dir.start);
        assert_eq!(layout.root_dir.end, layout.data_start);
        assert!(layout.cluster_size >= 512);
    }
}
