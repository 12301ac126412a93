//! Card diagnostics
//!
//! Runs the card report in stages: driver geometry, mount, root listing.
//! Each stage produces its own outcome. A geometry failure does not stop
//! the mount attempt; a mount failure skips the listing and the speed
//! tests.

use indicatif::ProgressBar;
use log::{error, info, warn};

use crate::bench::{ScratchBuffer, SequentialBenchmark};
use crate::clock::UptimeClock;
use crate::config::SdBenchConfig;
use crate::disk::{DiskAccess, DiskIoctl};
use crate::fs::{Mount, MountDescriptor};
use crate::report::{CardReport, Geometry, SessionReport, StageOutcome};
use crate::Result;

/// Report plus the mount it produced, if any
pub struct CardSession<'d> {
    pub report: CardReport,
    pub mount: Option<Mount<'d>>,
}

/// Initialize `disk` and query its geometry
pub fn read_geometry(disks: &mut DiskAccess, disk: &str) -> Result<Geometry> {
    disks.init(disk).map_err(|e| {
        error!("Storage init ERROR! ({})", e);
        e
    })?;

    let sector_count = disks.ioctl(disk, DiskIoctl::GetSectorCount).map_err(|e| {
        error!("Unable to get sector count ({})", e);
        e
    })?;
    info!("Block count {}", sector_count);

    let sector_size = disks.ioctl(disk, DiskIoctl::GetSectorSize).map_err(|e| {
        error!("Unable to get sector size ({})", e);
        e
    })?;
    info!("Sector size {}", sector_size);

    let geometry = Geometry {
        sector_count,
        sector_size,
    };
    info!("Memory Size(MB) {}", geometry.capacity_mb());
    Ok(geometry)
}

/// Geometry report, mount, and listing of the mount root
pub fn sd_card_info<'d>(disks: &'d mut DiskAccess, config: &SdBenchConfig) -> CardSession<'d> {
    let geometry = StageOutcome::from_result(read_geometry(disks, &config.disk_name));

    let descriptor = MountDescriptor::fat(config.mount_point.as_str());
    let mounted = disks
        .volume(&config.disk_name)
        .and_then(|device| Mount::mount(descriptor, device));

    let (mount_outcome, volume, listing, mount) = match mounted {
        Ok(mount) => {
            info!("Disk mounted.");
            let mounted = StageOutcome::Completed {
                value: mount.descriptor().clone(),
            };
            let volume = StageOutcome::from_result(mount.volume_info());
            if let StageOutcome::Failed { message, .. } = &volume {
                warn!("Volume statistics unavailable: {}", message);
            }
            let listing = StageOutcome::from_result(mount.lsdir(mount.mount_point()));
            (mounted, volume, listing, Some(mount))
        }
        Err(e) => {
            error!("Error mounting disk. ({})", e);
            (
                StageOutcome::failed(&e),
                StageOutcome::skipped("disk not mounted"),
                StageOutcome::skipped("disk not mounted"),
                None,
            )
        }
    };

    CardSession {
        report: CardReport {
            disk: config.disk_name.clone(),
            mount_point: config.mount_point.clone(),
            geometry,
            mount: mount_outcome,
            volume,
            listing,
        },
        mount,
    }
}

/// Card report followed by the write and read tests
pub fn run_session(
    disks: &mut DiskAccess,
    config: &SdBenchConfig,
    clock: &dyn UptimeClock,
    progress: ProgressBar,
) -> Result<SessionReport> {
    let benchmark = SequentialBenchmark::new(config, clock)?.with_progress(progress);
    let mut buffer = ScratchBuffer::new(config.block_size)?;
    if config.test_files_differ() {
        warn!(
            "read test uses {} but write test writes {}",
            config.read_file, config.write_file
        );
    }

    let CardSession { report, mount } = sd_card_info(disks, config);
    let (write, read) = match mount {
        Some(mut mount) => {
            let write = StageOutcome::from_result(benchmark.write_speed(&mut mount, &mut buffer));
            let read = StageOutcome::from_result(benchmark.read_speed(&mut mount, &mut buffer));
            if let Err(e) = mount.unmount() {
                warn!("unmount failed: {}", e);
            }
            (write, read)
        }
        None => (
            StageOutcome::skipped("disk not mounted"),
            StageOutcome::skipped("disk not mounted"),
        ),
    };

    Ok(SessionReport {
        card: report,
        write,
        read,
    })
}
