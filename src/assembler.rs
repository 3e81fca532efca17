use crate::error::{DecodeError, Result};

/// Packs a bit stream MSB-first into fixed-width values.
///
/// Both receivers emit loose bits; the authentication side works on whole
/// identifiers (8-bit vehicle and user ids, 16-bit vehicle info).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitAssembler {
    width: u32,
    value: u32,
    filled: u32,
}

impl BitAssembler {
    pub fn new(width: u32) -> Result<Self> {
        if !(1..=32).contains(&width) {
            return Err(DecodeError::invalid(format!("value width {width} not in 1..=32")));
        }
        Ok(Self {
            width,
            value: 0,
            filled: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Bits collected toward the next value.
    pub fn pending(&self) -> u32 {
        self.filled
    }

    /// Appends one bit (any non-zero input counts as 1). Returns the finished
    /// value when this bit completes it.
    pub fn push(&mut self, bit: u8) -> Option<u32> {
        self.value = (self.value << 1) | u32::from(bit != 0);
        self.filled += 1;
        if self.filled < self.width {
            return None;
        }
        let value = self.value;
        self.reset();
        Some(value)
    }

    pub fn extend<I: IntoIterator<Item = u8>>(&mut self, bits: I) -> Vec<u32> {
        bits.into_iter().filter_map(|bit| self.push(bit)).collect()
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.filled = 0;
    }
}
