use crate::{Result, SdBenchError};

/// Fixed-size block buffer shared by the write and read tests
///
/// Each test overwrites the contents before use: the write test fills it
/// with its pattern byte, the read test zeroes it.
#[derive(Debug, Clone)]
pub struct ScratchBuffer {
    data: Vec<u8>,
}

impl ScratchBuffer {
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(SdBenchError::ConfigError(
                "Buffer size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            data: vec![0u8; block_size],
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn fill(&mut self, byte: u8) {
        self.data.fill(byte);
    }

    pub fn zero(&mut self) {
        self.data.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
