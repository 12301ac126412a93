use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::BlockDevice;

/// Sector size of SD/SDHC cards
pub const SECTOR_SIZE: u32 = 512;

fn sectors_in(len: u64) -> io::Result<u32> {
    u32::try_from(len / SECTOR_SIZE as u64).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} bytes exceeds the addressable sector range", len),
        )
    })
}

fn no_media() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "no medium present")
}

/// SD card image stored in a regular file (or a raw device node)
pub struct ImageDisk {
    path: PathBuf,
    file: File,
}

impl ImageDisk {
    /// Open an existing image for reading and writing
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Create (or truncate) an image of `size` bytes, rounded down to whole
    /// sectors. The image is blank; format it before mounting.
    pub fn create(path: impl AsRef<Path>, size: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = size - size % SECTOR_SIZE as u64;
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "image must hold at least one sector",
            ));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(size)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl Read for ImageDisk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for ImageDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for ImageDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl BlockDevice for ImageDisk {
    fn init(&mut self) -> io::Result<()> {
        if self.len()? < SECTOR_SIZE as u64 {
            return Err(no_media());
        }
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn sector_count(&self) -> io::Result<u32> {
        sectors_in(self.len()?)
    }

    fn sector_size(&self) -> u32 {
        SECTOR_SIZE
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// RAM-backed disk
pub struct MemoryDisk {
    data: Cursor<Vec<u8>>,
    present: bool,
}

impl MemoryDisk {
    /// Blank disk of `size` bytes
    pub fn new(size: usize) -> Self {
        Self::from_bytes(vec![0u8; size])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Cursor::new(bytes),
            present: true,
        }
    }

    /// Disk whose slot is empty; `init` fails
    pub fn ejected() -> Self {
        Self {
            data: Cursor::new(Vec::new()),
            present: false,
        }
    }

    /// Raw contents of the disk
    pub fn as_bytes(&self) -> &[u8] {
        self.data.get_ref()
    }
}

impl Read for MemoryDisk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl Write for MemoryDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.data.seek(pos)
    }
}

impl BlockDevice for MemoryDisk {
    fn init(&mut self) -> io::Result<()> {
        if !self.present || self.data.get_ref().len() < SECTOR_SIZE as usize {
            return Err(no_media());
        }
        self.data.set_position(0);
        Ok(())
    }

    fn sector_count(&self) -> io::Result<u32> {
        sectors_in(self.data.get_ref().len() as u64)
    }

    fn sector_size(&self) -> u32 {
        SECTOR_SIZE
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_image_create_rounds_to_sectors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("card.img");
        let mut disk = ImageDisk::create(&path, 1024 * 1024 + 100).unwrap();

        disk.init().unwrap();
        assert_eq!(disk.sector_count().unwrap(), 2048);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024 * 1024);
    }

    #[test]
    fn test_image_create_rejects_tiny_size() {
        let dir = tempdir().unwrap();
        assert!(ImageDisk::create(dir.path().join("tiny.img"), 100).is_err());
    }

    #[test]
    fn test_image_open_missing_file() {
        let dir = tempdir().unwrap();
        let err = ImageDisk::open(dir.path().join("absent.img")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_image_has_no_media() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.img");
        File::create(&path).unwrap();
        let mut disk = ImageDisk::open(&path).unwrap();
        assert!(disk.init().is_err());
    }

    #[test]
    fn test_memory_disk_stream() {
        let mut disk = MemoryDisk::new(2048);
        disk.init().unwrap();
        disk.seek(SeekFrom::Start(512)).unwrap();
        disk.write_all(b"card").unwrap();
        assert_eq!(&disk.as_bytes()[512..516], b"card");
        assert_eq!(disk.sector_count().unwrap(), 4);
    }
}
