//! Sequential speed tests
//!
//! The write test appends one block at a time to a fresh file, seeking
//! to the end before every write. The read test re-reads the first
//! block of a file, seeking to the start before every read. Both time
//! the whole sequence from just before the open to just after the close.

use std::io::SeekFrom;

use indicatif::ProgressBar;
use log::{debug, error, info};

use super::buffer::ScratchBuffer;
use crate::clock::UptimeClock;
use crate::config::SdBenchConfig;
use crate::fs::{Mount, OpenMode};
use crate::report::{TestKind, TestReport};
use crate::{IoOp, Result, SdBenchError};

/// Runs the speed tests for one configuration
pub struct SequentialBenchmark<'c> {
    config: &'c SdBenchConfig,
    clock: &'c dyn UptimeClock,
    progress: ProgressBar,
}

impl<'c> SequentialBenchmark<'c> {
    pub fn new(config: &'c SdBenchConfig, clock: &'c dyn UptimeClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            progress: ProgressBar::hidden(),
        })
    }

    /// Track transferred bytes on `progress` while a test runs
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Write test: `iterations` appends of the filled buffer to a
    /// truncated `write_file`
    pub fn write_speed(&self, mount: &mut Mount<'_>, buffer: &mut ScratchBuffer) -> Result<TestReport> {
        self.check_buffer(buffer)?;
        let cfg = self.config;
        buffer.fill(cfg.fill_byte);

        info!("----- Testing sd card write performance -----");
        info!(
            "Test 1: write a file to sd card with size of {} bytes",
            cfg.total_bytes()
        );
        self.start_progress();

        let mut stamp = self.clock.uptime_ms();
        let mut file = mount
            .open_file(&cfg.write_file, OpenMode::CreateTruncate)
            .map_err(|e| log_failure("Test 1 Error: FS_OPEN failed", e))?;

        for i in 0..cfg.iterations {
            file.seek(SeekFrom::End(0))
                .map_err(|e| log_failure("Test 1 Error: FS_SEEK failed", e))?;
            let written = file
                .write(buffer.as_slice())
                .map_err(|e| log_failure("Test 1 Error: Write error", e))?;
            if written != buffer.len() {
                return Err(log_failure(
                    "Test 1 Error: Write error",
                    SdBenchError::ShortCount {
                        op: IoOp::Write,
                        path: cfg.write_file.clone(),
                        expected: buffer.len(),
                        actual: written,
                    },
                ));
            }
            debug!("block {} appended", i);
            self.progress.inc(written as u64);
        }

        file.sync()
            .map_err(|e| log_failure("Test 1 Error: Sync error", e))?;
        file.close()?;

        let elapsed_ms = self.clock.delta(&mut stamp);
        self.progress.finish_and_clear();
        let report = TestReport::new(
            TestKind::Write,
            &cfg.write_file,
            buffer.len(),
            cfg.iterations,
            elapsed_ms,
        );
        info!(
            "Performance Result - write time for {} byte: {} ms",
            report.bytes, report.elapsed_ms
        );
        info!("----- End: testing SD Card write performance: Passed -----");
        Ok(report)
    }

    /// Read test: `iterations` reads of the first block of `read_file`
    pub fn read_speed(&self, mount: &mut Mount<'_>, buffer: &mut ScratchBuffer) -> Result<TestReport> {
        self.check_buffer(buffer)?;
        let cfg = self.config;
        buffer.zero();

        info!("----- Testing sd card read performance -----");
        info!(
            "Test 2: read a file from sd card with size of {} bytes",
            cfg.total_bytes()
        );
        self.start_progress();

        let mut stamp = self.clock.uptime_ms();
        let mut file = mount
            .open_file(&cfg.read_file, OpenMode::Read)
            .map_err(|e| log_failure("Test 2 Error: FS_OPEN failed", e))?;

        for i in 0..cfg.iterations {
            file.seek(SeekFrom::Start(0))
                .map_err(|e| log_failure("Test 2 Error: FS_SEEK failed", e))?;
            let read = file
                .read(buffer.as_mut_slice())
                .map_err(|e| log_failure("Test 2 Error: Read error", e))?;
            if read != buffer.len() {
                return Err(log_failure(
                    "Test 2 Error: Read error",
                    SdBenchError::ShortCount {
                        op: IoOp::Read,
                        path: cfg.read_file.clone(),
                        expected: buffer.len(),
                        actual: read,
                    },
                ));
            }
            debug!("block {} read", i);
            self.progress.inc(read as u64);
        }

        file.close()?;

        let elapsed_ms = self.clock.delta(&mut stamp);
        self.progress.finish_and_clear();
        let report = TestReport::new(
            TestKind::Read,
            &cfg.read_file,
            buffer.len(),
            cfg.iterations,
            elapsed_ms,
        );
        info!(
            "Performance Result - read time for {} byte: {} ms",
            report.bytes, report.elapsed_ms
        );
        info!("----- End: testing SD Card read performance: Passed -----");
        Ok(report)
    }

    fn check_buffer(&self, buffer: &ScratchBuffer) -> Result<()> {
        if buffer.len() != self.config.block_size {
            return Err(SdBenchError::ConfigError(format!(
                "Scratch buffer holds {} bytes, block size is {}",
                buffer.len(),
                self.config.block_size
            )));
        }
        Ok(())
    }

    fn start_progress(&self) {
        self.progress.reset();
        self.progress.set_length(self.config.total_bytes());
    }
}

fn log_failure(context: &str, err: SdBenchError) -> SdBenchError {
    error!("{}: {}", context, err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::disk::fault::{FailingDisk, FatLayout};
    use crate::disk::MemoryDisk;
    use crate::fs::{self, MountDescriptor};

    fn formatted_disk(size: usize) -> MemoryDisk {
        let mut disk = MemoryDisk::new(size);
        fs::format(&mut disk, "BENCH").unwrap();
        disk
    }

    #[test]
    fn test_write_produces_full_file() {
        let mut disk = formatted_disk(8 * 1024 * 1024);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default();
        let clock = ManualClock::new(1_000).with_auto_step(7);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();

        let bench = SequentialBenchmark::new(&config, &clock).unwrap();
        let report = bench.write_speed(&mut mount, &mut buffer).unwrap();

        assert_eq!(report.kind, TestKind::Write);
        assert_eq!(report.bytes, 1_024_000);
        assert_eq!(report.elapsed_ms, 7);
        assert_eq!(mount.stat("/SD:/test.log").unwrap().size, 1_024_000);
    }

    #[test]
    fn test_repeated_write_does_not_grow_file() {
        let mut disk = formatted_disk(4 * 1024 * 1024);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default().with_iterations(100);
        let clock = ManualClock::new(0);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();

        bench.write_speed(&mut mount, &mut buffer).unwrap();
        bench.write_speed(&mut mount, &mut buffer).unwrap();
        assert_eq!(mount.stat("/SD:/test.log").unwrap().size, 102_400);
    }

    #[test]
    fn test_read_after_write() {
        let mut disk = formatted_disk(8 * 1024 * 1024);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default();
        let clock = ManualClock::new(0).with_auto_step(3);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();

        bench.write_speed(&mut mount, &mut buffer).unwrap();
        let report = bench.read_speed(&mut mount, &mut buffer).unwrap();

        assert_eq!(report.kind, TestKind::Read);
        assert_eq!(report.bytes, 1_024_000);
        assert_eq!(report.elapsed_ms, 3);
        assert!(buffer.as_slice().iter().all(|&b| b == b'X'));
    }

    #[test]
    fn test_read_short_file_is_short_count() {
        let mut disk = formatted_disk(4 * 1024 * 1024);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        {
            let mut file = mount
                .open_file("/SD:/test.log", OpenMode::CreateTruncate)
                .unwrap();
            file.write(&[7u8; 100]).unwrap();
            file.close().unwrap();
        }

        let config = SdBenchConfig::default().with_iterations(5);
        let clock = ManualClock::new(0);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();

        match bench.read_speed(&mut mount, &mut buffer) {
            Err(SdBenchError::ShortCount {
                op: IoOp::Read,
                expected: 1024,
                actual: 100,
                ..
            }) => {}
            other => panic!("expected short read, got {:?}", other.map(|r| r.bytes)),
        }
        // handle was released: the file can be opened again
        assert!(mount.open_file("/SD:/test.log", OpenMode::Read).is_ok());
    }

    #[test]
    fn test_read_missing_file() {
        let mut disk = formatted_disk(4 * 1024 * 1024);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default().with_read_file("/SD:/TEST");
        let clock = ManualClock::new(0);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();

        let err = bench.read_speed(&mut mount, &mut buffer).unwrap_err();
        assert!(matches!(err, SdBenchError::Open { .. }));
        assert_eq!(err.status_code(), -crate::error::ENOENT);
    }

    #[test]
    fn test_write_on_full_volume_fails() {
        let mut disk = formatted_disk(1024 * 1024);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default().with_iterations(2048);
        let clock = ManualClock::new(0);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();

        let err = bench.write_speed(&mut mount, &mut buffer).unwrap_err();
        assert!(matches!(
            err,
            SdBenchError::ShortCount {
                op: IoOp::Write,
                expected: 1024,
                actual: 512,
                ..
            }
        ));
        assert_eq!(err.status_code(), -crate::error::EIO);
        assert!(mount.open_file("/SD:/test.log", OpenMode::Read).is_ok());
    }

    #[test]
    fn test_buffer_must_match_block_size() {
        let mut disk = formatted_disk(4 * 1024 * 1024);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default();
        let clock = ManualClock::new(0);
        let mut buffer = ScratchBuffer::new(512).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();

        assert!(matches!(
            bench.write_speed(&mut mount, &mut buffer),
            Err(SdBenchError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SdBenchConfig::default().with_iterations(0);
        let clock = ManualClock::new(0);
        assert!(SequentialBenchmark::new(&config, &clock).is_err());
    }

    #[test]
    fn test_device_read_error_mid_read_test() {
        let base = formatted_disk(8 * 1024 * 1024);
        let layout = FatLayout::of(&base);
        let (mut disk, faults) = FailingDisk::new(base);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default().with_iterations(50);
        let clock = ManualClock::new(0);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();
        bench.write_speed(&mut mount, &mut buffer).unwrap();

        // the directory stays readable, file data does not
        faults.fail_reads(layout.data_start..u64::MAX);
        let err = bench.read_speed(&mut mount, &mut buffer).unwrap_err();
        assert!(matches!(err, SdBenchError::IoError(_)));
        assert_eq!(err.status_code(), -crate::error::EIO);

        faults.clear();
        let mut file = mount.open_file("/SD:/test.log", OpenMode::Read).unwrap();
        let mut block = [0u8; 1024];
        assert_eq!(file.read(&mut block).unwrap(), 1024);
        assert!(block.iter().all(|&b| b == b'X'));
    }

    #[test]
    fn test_device_write_error_mid_write_test() {
        let base = formatted_disk(8 * 1024 * 1024);
        let layout = FatLayout::of(&base);
        let (mut disk, faults) = FailingDisk::new(base);
        let mut mount = Mount::mount(MountDescriptor::fat("/SD:"), &mut disk).unwrap();
        let config = SdBenchConfig::default();
        let clock = ManualClock::new(0);
        let mut buffer = ScratchBuffer::new(config.block_size).unwrap();
        let bench = SequentialBenchmark::new(&config, &clock).unwrap();

        faults.fail_writes(layout.data_start..u64::MAX);
        let err = bench.write_speed(&mut mount, &mut buffer).unwrap_err();
        assert!(matches!(err, SdBenchError::IoError(_)));
        assert_eq!(err.status_code(), -crate::error::EIO);

        // the failed test released its handle
        faults.clear();
        assert!(mount.open_file("/SD:/test.log", OpenMode::Read).is_ok());
        bench.write_speed(&mut mount, &mut buffer).unwrap();
        assert_eq!(mount.stat("/SD:/test.log").unwrap().size, 1_024_000);
    }
}
