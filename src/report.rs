//! Report data models
//!
//! Results of the diagnostic stages and speed tests, serializable for
//! the CLI's JSON output.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs::{DirEntryInfo, MountDescriptor, VolumeInfo};
use crate::util::units::{calculate_throughput_kib_s, format_duration, format_throughput};
use crate::{Result, SdBenchError};

/// Outcome of one stage of a diagnostic run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Completed { value: T },
    Failed { code: i32, message: String },
    Skipped { reason: String },
}

impl<T> StageOutcome<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed { value },
            Err(err) => StageOutcome::failed(&err),
        }
    }

    pub fn failed(err: &SdBenchError) -> Self {
        StageOutcome::Failed {
            code: err.status_code(),
            message: err.to_string(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed { value } => Some(value),
            _ => None,
        }
    }

    /// Zero unless the stage failed
    pub fn status_code(&self) -> i32 {
        match self {
            StageOutcome::Failed { code, .. } => *code,
            _ => 0,
        }
    }
}

/// Card geometry as reported by the disk driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub sector_count: u32,
    pub sector_size: u32,
}

impl Geometry {
    pub fn capacity_bytes(&self) -> u64 {
        self.sector_count as u64 * self.sector_size as u64
    }

    /// Capacity in whole MiB
    pub fn capacity_mb(&self) -> u64 {
        self.capacity_bytes() >> 20
    }
}

/// Everything learned about the card before any speed test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardReport {
    pub disk: String,
    pub mount_point: String,
    pub geometry: StageOutcome<Geometry>,
    /// Whether the filesystem mounted, and what was mounted where
    pub mount: StageOutcome<MountDescriptor>,
    /// Volume statistics; read after a successful mount
    pub volume: StageOutcome<VolumeInfo>,
    pub listing: StageOutcome<Vec<DirEntryInfo>>,
}

impl CardReport {
    /// First non-zero stage status, in stage order
    pub fn status_code(&self) -> i32 {
        [
            self.geometry.status_code(),
            self.mount.status_code(),
            self.volume.status_code(),
            self.listing.status_code(),
        ]
        .into_iter()
        .find(|code| *code != 0)
        .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    Write,
    Read,
}

impl TestKind {
    pub fn label(&self) -> &'static str {
        match self {
            TestKind::Write => "write",
            TestKind::Read => "read",
        }
    }
}

/// Result of one sequential speed test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub timestamp: DateTime<Utc>,
    pub kind: TestKind,
    pub path: String,
    pub block_size: usize,
    pub iterations: u32,
    /// Bytes moved: iterations x block size
    pub bytes: u64,
    /// Wall time from just before open to just after close
    pub elapsed_ms: u64,
}

impl TestReport {
    pub fn new(kind: TestKind, path: &str, block_size: usize, iterations: u32, elapsed_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            path: path.to_string(),
            block_size,
            iterations,
            bytes: block_size as u64 * iterations as u64,
            elapsed_ms,
        }
    }

    /// Bytes per millisecond; zero when no time was measured
    pub fn bytes_per_ms(&self) -> f64 {
        if self.elapsed_ms == 0 {
            0.0
        } else {
            self.bytes as f64 / self.elapsed_ms as f64
        }
    }

    pub fn throughput_kib_s(&self) -> f64 {
        calculate_throughput_kib_s(self.bytes, self.elapsed_ms)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} time for {} byte: {} ms ({}, {})",
            self.kind.label(),
            self.bytes,
            self.elapsed_ms,
            format_duration(Duration::from_millis(self.elapsed_ms)),
            format_throughput(self.throughput_kib_s())
        )
    }
}

/// A full run: card report followed by both speed tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub card: CardReport,
    pub write: StageOutcome<TestReport>,
    pub read: StageOutcome<TestReport>,
}

impl SessionReport {
    pub fn status_code(&self) -> i32 {
        [
            self.card.status_code(),
            self.write.status_code(),
            self.read.status_code(),
        ]
        .into_iter()
        .find(|code| *code != 0)
        .unwrap_or(0)
    }
}
