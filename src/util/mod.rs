//! Utility functions module
//!
//! Helpers for unit formatting and parsing.

pub mod units;

pub use units::{
    calculate_throughput_kib_s, format_bytes, format_duration, format_throughput, parse_bytes,
};
