use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use serde::Serialize;

use sdbench::bench::{ScratchBuffer, SequentialBenchmark};
use sdbench::clock::SystemUptime;
use sdbench::config::SdBenchConfig;
use sdbench::diag::{run_session, sd_card_info};
use sdbench::disk::{DiskAccess, ImageDisk, MemoryDisk};
use sdbench::fs::{self, Mount, MountDescriptor};
use sdbench::report::{TestKind, TestReport};
use sdbench::util::units::{format_bytes, parse_bytes};
use sdbench::{error as sd_error, Result, SdBenchError};

#[derive(Debug, Parser)]
#[command(name = "sdbench")]
#[command(about = "SD card geometry, listing and sequential speed tests")]
struct Cli {
    /// Card image (or raw device) backing the SD disk
    #[arg(long, global = true)]
    image: Option<PathBuf>,
    /// Config file; defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print reports as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true)]
    iterations: Option<u32>,
    #[arg(long = "block-size", global = true)]
    block_size: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Geometry, mount and root listing
    Info,
    /// List a directory on the card
    Ls { path: Option<String> },
    /// Sequential write test
    Write,
    /// Sequential read test
    Read,
    /// Info, then the write and read tests
    Bench,
    /// Create and format a card image
    Format {
        #[arg(long, default_value = "16MiB")]
        size: String,
        #[arg(long, default_value = "SDCARD")]
        label: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => exit_code(code),
        Err(e) => {
            error!("{}", sd_error::user_friendly_message(&e));
            exit_code(e.status_code())
        }
    }
}

fn exit_code(status: i32) -> ExitCode {
    ExitCode::from(status.unsigned_abs().min(255) as u8)
}

fn load_config(cli: &Cli) -> Result<SdBenchConfig> {
    let mut config = match &cli.config {
        Some(path) => SdBenchConfig::load_from(path)?,
        None => SdBenchConfig::load()?,
    };
    if let Some(image) = &cli.image {
        config = config.with_image_path(image);
    }
    if let Some(iterations) = cli.iterations {
        config = config.with_iterations(iterations);
    }
    if let Some(size) = &cli.block_size {
        let bytes = parse_bytes(size).map_err(SdBenchError::ConfigError)?;
        config = config.with_block_size(bytes as usize);
    }
    if cli.json {
        config = config.with_json_output(true);
    }
    config.validate()?;
    Ok(config)
}

fn image_path(config: &SdBenchConfig) -> Result<&PathBuf> {
    config.image_path.as_ref().ok_or_else(|| {
        SdBenchError::ConfigError("no card image configured; pass --image PATH".to_string())
    })
}

/// Register the card image as the configured disk. A missing image is
/// an empty card slot, so the geometry and mount stages report it.
fn attach_card(config: &SdBenchConfig) -> Result<DiskAccess> {
    let path = image_path(config)?;
    let mut disks = DiskAccess::new();
    match ImageDisk::open(path) {
        Ok(disk) => disks.register(config.disk_name.as_str(), disk),
        Err(e) => {
            warn!("cannot open card image {}: {}", path.display(), e);
            disks.register(config.disk_name.as_str(), MemoryDisk::ejected());
        }
    }
    Ok(disks)
}

fn progress_bar(config: &SdBenchConfig) -> ProgressBar {
    if config.json_output {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(config.total_bytes());
    if let Ok(style) = ProgressStyle::with_template("{spinner} {bytes}/{total_bytes} ({eta}) {msg}") {
        pb.set_style(style);
    }
    pb
}

fn emit<T: Serialize>(config: &SdBenchConfig, value: &T) -> Result<()> {
    if config.json_output {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    let clock = SystemUptime::new();

    match cli.command {
        Commands::Format { size, label } => {
            let bytes = parse_bytes(&size).map_err(SdBenchError::ConfigError)?;
            let path = image_path(&config)?;
            let mut disk = ImageDisk::create(path, bytes)?;
            fs::format(&mut disk, &label)?;
            info!("Created {} card image at {}", format_bytes(bytes), path.display());
            Ok(0)
        }
        Commands::Info => {
            let mut disks = attach_card(&config)?;
            let session = sd_card_info(&mut disks, &config);
            emit(&config, &session.report)?;
            Ok(session.report.status_code())
        }
        Commands::Ls { path } => {
            let mut disks = attach_card(&config)?;
            let device = disks.volume(&config.disk_name)?;
            let mount = Mount::mount(MountDescriptor::fat(config.mount_point.as_str()), device)?;
            let target = path.unwrap_or_else(|| config.mount_point.clone());
            let entries = mount.lsdir(&target)?;
            emit(&config, &entries)?;
            Ok(0)
        }
        Commands::Write => run_single_test(&config, &clock, TestKind::Write),
        Commands::Read => run_single_test(&config, &clock, TestKind::Read),
        Commands::Bench => {
            let mut disks = attach_card(&config)?;
            let report = run_session(&mut disks, &config, &clock, progress_bar(&config))?;
            emit(&config, &report)?;
            if !config.json_output {
                for test in [&report.write, &report.read] {
                    if let Some(test) = test.value() {
                        println!("{}", test.summary());
                    }
                }
            }
            Ok(report.status_code())
        }
    }
}

fn run_single_test(config: &SdBenchConfig, clock: &SystemUptime, kind: TestKind) -> Result<i32> {
    let mut disks = attach_card(config)?;
    let device = disks.volume(&config.disk_name)?;
    let mut mount = Mount::mount(MountDescriptor::fat(config.mount_point.as_str()), device)?;
    let benchmark = SequentialBenchmark::new(config, clock)?.with_progress(progress_bar(config));
    let mut buffer = ScratchBuffer::new(config.block_size)?;

    let report = match kind {
        TestKind::Write => benchmark.write_speed(&mut mount, &mut buffer)?,
        TestKind::Read => {
            if config.test_files_differ() {
                warn!(
                    "read test uses {} but write test writes {}",
                    config.read_file, config.write_file
                );
            }
            benchmark.read_speed(&mut mount, &mut buffer)?
        }
    };
    mount.unmount()?;
    print_summary(config, &report)?;
    Ok(0)
}

fn print_summary(config: &SdBenchConfig, report: &TestReport) -> Result<()> {
    if config.json_output {
        emit(config, report)
    } else {
        println!("{}", report.summary());
        Ok(())
    }
}
