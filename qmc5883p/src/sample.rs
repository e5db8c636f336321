//! Decoding of the X/Y/Z output registers.
//!
//! The data block is six bytes starting at `OutXL`, each axis stored
//! LSB first as a two's-complement 16-bit count.

use core::fmt;

use crate::registers::DATA_BLOCK_LEN;
use crate::types::ThreeAxes;

/// Raw counts from one data-block read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl RawSample {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    pub fn as_array(&self) -> [i16; 3] {
        [self.x, self.y, self.z]
    }

    pub fn to_axes(&self) -> ThreeAxes {
        ThreeAxes::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than a full X/Y/Z block.
    ShortBlock { expected: usize, actual: usize },
    /// Every axis reads zero, which the part only reports before its first conversion.
    AllZero,
    /// At least one axis is pinned at a 16-bit rail.
    Saturated,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::ShortBlock { expected, actual } => {
                write!(f, "short data block: expected {} bytes, got {}", expected, actual)
            }
            DecodeError::AllZero => write!(f, "all axes read zero"),
            DecodeError::Saturated => write!(f, "axis saturated"),
        }
    }
}

/// Decode the data block into signed counts.
pub fn decode(block: &[u8]) -> Result<RawSample, DecodeError> {
    if block.len() < DATA_BLOCK_LEN {
        return Err(DecodeError::ShortBlock {
            expected: DATA_BLOCK_LEN,
            actual: block.len(),
        });
    }

    let word = |lo: usize| i16::from_le_bytes([block[lo], block[lo + 1]]);
    let sample = RawSample::new(word(0), word(2), word(4));

    if sample.as_array().iter().all(|&v| v == 0) {
        return Err(DecodeError::AllZero);
    }
    if sample
        .as_array()
        .iter()
        .any(|&v| v == i16::MAX || v == i16::MIN)
    {
        return Err(DecodeError::Saturated);
    }

    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lsb_first_pairs() {
        let block = [0x34, 0x12, 0xFF, 0xFF, 0x01, 0x80];
        let sample = decode(&block).unwrap();
        assert_eq!(sample, RawSample::new(0x1234, -1, -32767));
    }

    #[test]
    fn rejects_short_block() {
        assert_eq!(
            decode(&[0x01, 0x00, 0x02]),
            Err(DecodeError::ShortBlock { expected: 6, actual: 3 })
        );
    }

    #[test]
    fn ignores_trailing_bytes() {
        let block = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0xAA, 0xBB];
        assert_eq!(decode(&block).unwrap(), RawSample::new(1, 2, 3));
    }

    #[test]
    fn rejects_all_zero_block() {
        assert_eq!(decode(&[0u8; 6]), Err(DecodeError::AllZero));
    }

    #[test]
    fn rejects_saturated_axis() {
        let high = [0x01, 0x00, 0xFF, 0x7F, 0x01, 0x00];
        let low = [0x01, 0x00, 0x01, 0x00, 0x00, 0x80];
        assert_eq!(decode(&high), Err(DecodeError::Saturated));
        assert_eq!(decode(&low), Err(DecodeError::Saturated));
    }
}
