//! Configuration management module
//!
//! Handles loading, saving, and validation of the diagnostic and
//! speed-test parameters.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    Result, SdBenchError, APP_NAME, CONFIG_FILE, DEFAULT_DISK_NAME, DEFAULT_MOUNT_POINT,
    DEFAULT_TEST_FILE, TEST_BLOCK_SIZE, TEST_FILL_BYTE, TEST_ITERATIONS,
};

const MAX_BLOCK_SIZE: usize = 1024 * 1024; // 1 MiB

/// Parameters for a diagnostic session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdBenchConfig {
    /// Driver name of the card's block device
    pub disk_name: String,
    /// Mount point of the card's filesystem
    pub mount_point: String,
    /// Card image backing the disk, when not running against a real device
    pub image_path: Option<PathBuf>,
    /// Bytes moved per write/read call
    pub block_size: usize,
    /// Number of write/read calls per test
    pub iterations: u32,
    /// Byte the write test fills its buffer with
    pub fill_byte: u8,
    /// File the write test creates
    pub write_file: String,
    /// File the read test reads
    pub read_file: String,
    /// Emit JSON reports instead of log lines
    pub json_output: bool,
}

impl Default for SdBenchConfig {
    fn default() -> Self {
        Self {
            disk_name: DEFAULT_DISK_NAME.to_string(),
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
            image_path: None,
            block_size: TEST_BLOCK_SIZE,
            iterations: TEST_ITERATIONS,
            fill_byte: TEST_FILL_BYTE,
            write_file: DEFAULT_TEST_FILE.to_string(),
            read_file: DEFAULT_TEST_FILE.to_string(),
            json_output: false,
        }
    }
}

impl SdBenchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes one speed test moves
    pub fn total_bytes(&self) -> u64 {
        self.block_size as u64 * self.iterations as u64
    }

    /// The read test targets a different file than the write test
    /// produces, so it does not measure what was just written
    pub fn test_files_differ(&self) -> bool {
        self.write_file != self.read_file
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.disk_name.is_empty() {
            return Err(SdBenchError::ConfigError(
                "Disk name must not be empty".to_string(),
            ));
        }

        if !self.mount_point.starts_with('/') || self.mount_point.len() < 2 {
            return Err(SdBenchError::ConfigError(format!(
                "Mount point must be an absolute name like /SD: (got {:?})",
                self.mount_point
            )));
        }
        if self.mount_point.ends_with('/') {
            return Err(SdBenchError::ConfigError(
                "Mount point must not end with '/'".to_string(),
            ));
        }

        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(SdBenchError::ConfigError(format!(
                "Block size must be between 1 and {} bytes",
                MAX_BLOCK_SIZE
            )));
        }

        if self.iterations == 0 {
            return Err(SdBenchError::ConfigError(
                "Iterations must be greater than 0".to_string(),
            ));
        }

        for (label, path) in [("write", &self.write_file), ("read", &self.read_file)] {
            let prefix = format!("{}/", self.mount_point);
            match path.strip_prefix(&prefix) {
                Some(rest) if !rest.is_empty() => {}
                _ => {
                    return Err(SdBenchError::ConfigError(format!(
                        "The {} file must live under {} (got {})",
                        label, self.mount_point, path
                    )))
                }
            }
        }

        Ok(())
    }

    pub fn with_disk_name(mut self, name: impl Into<String>) -> Self {
        self.disk_name = name.into();
        self
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = mount_point.into();
        self
    }

    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_fill_byte(mut self, byte: u8) -> Self {
        self.fill_byte = byte;
        self
    }

    pub fn with_write_file(mut self, path: impl Into<String>) -> Self {
        self.write_file = path.into();
        self
    }

    pub fn with_read_file(mut self, path: impl Into<String>) -> Self {
        self.read_file = path.into();
        self
    }

    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    /// Load configuration from the standard config file location
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SdBenchError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            SdBenchError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the standard config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SdBenchError::ConfigError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            SdBenchError::ConfigError(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/sdbench/sdbench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            SdBenchError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
