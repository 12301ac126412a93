//! Units formatting and conversion utilities
//!
//! Human-readable sizes and durations, and throughput figures for the
//! speed tests.

use std::time::Duration;

/// Format bytes into human-readable size with appropriate units
///
/// # Examples
/// ```
/// use sdbench::util::units::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1048576), "1.0 MiB");
/// assert_eq!(format_bytes(1073741824), "1.0 GiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Parse human-readable size string into bytes
///
/// Supports units: B, KB, MB, GB, KiB, MiB, GiB, with or without a space.
///
/// # Examples
/// ```
/// use sdbench::util::units::parse_bytes;
///
/// assert_eq!(parse_bytes("1 KiB").unwrap(), 1024);
/// assert_eq!(parse_bytes("16MiB").unwrap(), 16 * 1024 * 1024);
/// assert_eq!(parse_bytes("2 GB").unwrap(), 2_000_000_000);
/// ```
pub fn parse_bytes(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let split_pos = input
        .find(|c: char| c.is_alphabetic())
        .unwrap_or(input.len());
    let (number_part, unit_part) = (input[..split_pos].trim(), input[split_pos..].trim());

    let number: f64 = number_part
        .parse()
        .map_err(|_| format!("Invalid number: {}", number_part))?;

    if number < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier = match unit_part.to_uppercase().as_str() {
        "" | "B" => 1u64,
        "KB" => 1_000,
        "MB" => 1_000_000,
        "GB" => 1_000_000_000,
        "K" | "KIB" => 1_024,
        "M" | "MIB" => 1_048_576,
        "G" | "GIB" => 1_073_741_824,
        _ => return Err(format!("Unknown unit: {}", unit_part)),
    };

    Ok((number * multiplier as f64) as u64)
}

/// Format duration into human-readable string
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use sdbench::util::units::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else if total_secs > 0 {
        if millis > 0 {
            format!("{}.{:02}s", total_secs, millis / 10)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        format!("{}ms", millis)
    }
}

/// Throughput in KiB/s from a byte count and elapsed milliseconds
///
/// # Examples
/// ```
/// use sdbench::util::units::calculate_throughput_kib_s;
///
/// let throughput = calculate_throughput_kib_s(1_024_000, 12_500);
/// assert!((throughput - 80.0).abs() < 0.01);
/// ```
pub fn calculate_throughput_kib_s(bytes: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }

    let kib = bytes as f64 / 1024.0;
    kib / (elapsed_ms as f64 / 1000.0)
}

/// Format a KiB/s figure with appropriate units
///
/// # Examples
/// ```
/// use sdbench::util::units::format_throughput;
///
/// assert_eq!(format_throughput(79.9), "79.9 KiB/s");
/// assert_eq!(format_throughput(2048.0), "2.0 MiB/s");
/// ```
pub fn format_throughput(kib_s: f64) -> String {
    if kib_s >= 1024.0 {
        format!("{:.1} MiB/s", kib_s / 1024.0)
    } else {
        format!("{:.1} KiB/s", kib_s)
    }
}
