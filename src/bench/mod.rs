//! Speed test module
//!
//! Sequential write and read throughput tests against a mounted card.

pub mod buffer;
pub mod sequential;

pub use buffer::ScratchBuffer;
pub use sequential::SequentialBenchmark;
