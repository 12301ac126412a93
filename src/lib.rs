//! SDBENCH - SD card diagnostics
//!
//! Initializes a named disk driver, reports its geometry, mounts the FAT
//! volume it carries, lists the volume and runs sequential write/read
//! throughput tests against it.

use std::fmt;
use std::io;

pub mod bench;
pub mod clock;
pub mod config;
pub mod diag;
pub mod disk;
pub mod fs;
pub mod report;
pub mod util;

/// Direction of a transfer that came up short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Write,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOp::Read => write!(f, "read"),
            IoOp::Write => write!(f, "write"),
        }
    }
}

// Common error types
#[derive(Debug)]
pub enum SdBenchError {
    /// Disk driver initialization or ioctl query failed
    Driver { disk: String, message: String },
    /// Filesystem could not be mounted
    Mount { mount_point: String, source: io::Error },
    /// Path is not below the mount point
    InvalidPath(String),
    /// Directory could not be opened or enumerated
    ReadDir { path: String, source: io::Error },
    /// File could not be opened
    Open { path: String, source: io::Error },
    /// Seek inside an open file failed
    Seek { path: String, source: io::Error },
    /// Read or write transferred fewer bytes than requested
    ShortCount {
        op: IoOp,
        path: String,
        expected: usize,
        actual: usize,
    },
    /// Any other I/O failure
    IoError(io::Error),
    /// Configuration validation or parsing error
    ConfigError(String),
    /// Report or config serialization error
    SerializationError(String),
}

impl fmt::Display for SdBenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdBenchError::Driver { disk, message } => {
                write!(f, "Disk driver error on {}: {}", disk, message)
            }
            SdBenchError::Mount { mount_point, source } => {
                write!(f, "Error mounting {}: {}", mount_point, source)
            }
            SdBenchError::InvalidPath(path) => {
                write!(f, "Path is not on the mounted volume: {}", path)
            }
            SdBenchError::ReadDir { path, source } => {
                write!(f, "Error reading dir {}: {}", path, source)
            }
            SdBenchError::Open { path, source } => write!(f, "Error opening {}: {}", path, source),
            SdBenchError::Seek { path, source } => write!(f, "Seek failed on {}: {}", path, source),
            SdBenchError::ShortCount {
                op,
                path,
                expected,
                actual,
            } => write!(
                f,
                "Short {} on {}: {} of {} bytes",
                op, path, actual, expected
            ),
            SdBenchError::IoError(err) => write!(f, "I/O error: {}", err),
            SdBenchError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            SdBenchError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for SdBenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SdBenchError::Mount { source, .. }
            | SdBenchError::ReadDir { source, .. }
            | SdBenchError::Open { source, .. }
            | SdBenchError::Seek { source, .. } => Some(source),
            SdBenchError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SdBenchError {
    fn from(err: io::Error) -> Self {
        SdBenchError::IoError(err)
    }
}

impl From<serde_json::Error> for SdBenchError {
    fn from(err: serde_json::Error) -> Self {
        SdBenchError::SerializationError(format!("JSON: {}", err))
    }
}

impl From<toml::de::Error> for SdBenchError {
    fn from(err: toml::de::Error) -> Self {
        SdBenchError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for SdBenchError {
    fn from(err: toml::ser::Error) -> Self {
        SdBenchError::ConfigError(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for SDBENCH operations
pub type Result<T> = std::result::Result<T, SdBenchError>;

/// Error handling utilities
pub mod error {
    use super::SdBenchError;
    use std::io;

    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EACCES: i32 = 13;
    pub const EEXIST: i32 = 17;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ENOSPC: i32 = 28;

    /// Negative errno-style status for an I/O error
    pub fn errno_of(err: &io::Error) -> i32 {
        if let Some(raw) = err.raw_os_error() {
            return -raw.abs();
        }
        -match err.kind() {
            io::ErrorKind::NotFound => ENOENT,
            io::ErrorKind::PermissionDenied => EACCES,
            io::ErrorKind::AlreadyExists => EEXIST,
            io::ErrorKind::InvalidInput => EINVAL,
            io::ErrorKind::WriteZero => ENOSPC,
            _ => EIO,
        }
    }

    impl SdBenchError {
        /// Status code in the disk/filesystem layer's convention:
        /// always negative, never zero.
        pub fn status_code(&self) -> i32 {
            match self {
                SdBenchError::Driver { .. } => -ENODEV,
                SdBenchError::Mount { source, .. }
                | SdBenchError::ReadDir { source, .. }
                | SdBenchError::Open { source, .. }
                | SdBenchError::Seek { source, .. } => errno_of(source),
                SdBenchError::IoError(err) => errno_of(err),
                SdBenchError::InvalidPath(_) => -ENOENT,
                SdBenchError::ShortCount { .. } => -EIO,
                SdBenchError::ConfigError(_) => -EINVAL,
                SdBenchError::SerializationError(_) => -EIO,
            }
        }
    }

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &SdBenchError) -> String {
        match error {
            SdBenchError::Driver { disk, .. } => format!(
                "Storage init failed for disk '{}'. Check that the card or image is present.",
                disk
            ),
            SdBenchError::Mount { .. } => {
                "Error mounting disk. The card may be unformatted or corrupt; try `sdbench format`."
                    .to_string()
            }
            SdBenchError::ShortCount { op, .. } => format!(
                "The card returned a short {}. The test file may be too small or the card full.",
                op
            ),
            SdBenchError::ConfigError(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            _ => error.to_string(),
        }
    }
}

pub const APP_NAME: &str = "sdbench";
pub const CONFIG_FILE: &str = "sdbench.toml";

/// Driver name of the card's block device
pub const DEFAULT_DISK_NAME: &str = "SD";
/// Mount point; the FAT layer only mounts names from its volume table
pub const DEFAULT_MOUNT_POINT: &str = "/SD:";
pub const TEST_BLOCK_SIZE: usize = 1024;
pub const TEST_ITERATIONS: u32 = 1000;
pub const TEST_FILL_BYTE: u8 = b'X';
pub const DEFAULT_TEST_FILE: &str = "/SD:/test.log";
