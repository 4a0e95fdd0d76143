//! XOR encoding for float values.
//!
//! Each value after the first is XORed with its predecessor:
//! - XOR = 0: `'0'` (1 bit)
//! - XOR fits the previous window: `'10'` + meaningful bits
//! - otherwise: `'11'` + 5 bits leading zeros + 6 bits (length - 1) + meaningful bits
//!
//! Leading zeros are capped at 31 to fit the 5-bit field. No window exists
//! until the first non-zero XOR, which therefore always opens one.

use super::bits::BitCursor;
use crate::error::Result;

const MAX_LEADING: u32 = 31;

/// Leading/trailing zero window shared by encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    leading: u32,
    trailing: u32,
}

impl Window {
    fn meaningful_bits(self) -> u32 {
        64 - self.leading - self.trailing
    }

    fn contains(self, leading: u32, trailing: u32) -> bool {
        leading >= self.leading && trailing >= self.trailing
    }
}

/// Encoder for float values using XOR compression.
#[derive(Debug, Clone, Copy)]
pub struct ValueEncoder {
    prev_value: u64,
    window: Option<Window>,
}

impl ValueEncoder {
    /// Creates an encoder whose first XOR is taken against `first`.
    pub fn new(first: f64) -> Self {
        Self {
            prev_value: first.to_bits(),
            window: None,
        }
    }

    /// Appends `value` to the stream.
    ///
    /// The required bit count is checked before anything is written, so a
    /// [`ChunkError::CapacityExceeded`](crate::ChunkError::CapacityExceeded)
    /// leaves the cursor and encoder unchanged.
    pub fn append<B>(&mut self, value: f64, cursor: &mut BitCursor<B>) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        let bits = value.to_bits();
        let xor = bits ^ self.prev_value;

        if xor == 0 {
            cursor.write_bit(false)?;
            return Ok(());
        }

        let leading = xor.leading_zeros().min(MAX_LEADING);
        let trailing = xor.trailing_zeros();

        match self.window {
            Some(window) if window.contains(leading, trailing) => {
                let meaningful = window.meaningful_bits();
                cursor.ensure(2 + meaningful)?;

                cursor.write_bits(0b10, 2)?;
                cursor.write_bits(xor >> window.trailing, meaningful as u8)?;
            }
            _ => {
                let window = Window { leading, trailing };
                let meaningful = window.meaningful_bits();
                cursor.ensure(2 + 5 + 6 + meaningful)?;

                cursor.write_bits(0b11, 2)?;
                cursor.write_bits(leading as u64, 5)?;
                cursor.write_bits((meaningful - 1) as u64, 6)?;
                cursor.write_bits(xor >> trailing, meaningful as u8)?;
                self.window = Some(window);
            }
        }

        self.prev_value = bits;
        Ok(())
    }
}

/// Decoder for XOR-encoded float values.
#[derive(Debug, Clone, Copy)]
pub struct ValueDecoder {
    prev_value: u64,
    window: Window,
}

impl ValueDecoder {
    /// Creates a decoder that reconstructs values following `first`.
    pub fn new(first: f64) -> Self {
        Self {
            prev_value: first.to_bits(),
            window: Window {
                leading: 0,
                trailing: 0,
            },
        }
    }

    /// Decodes the next value.
    pub fn read<B: AsRef<[u8]>>(&mut self, cursor: &mut BitCursor<B>) -> Result<f64> {
        if !cursor.read_bit()? {
            return Ok(f64::from_bits(self.prev_value));
        }

        if cursor.read_bit()? {
            let leading = cursor.read_bits(5)? as u32;
            let meaningful = cursor.read_bits(6)? as u32 + 1;
            // A corrupt header could describe more than 64 bits.
            let trailing = 64u32.saturating_sub(leading + meaningful);
            self.window = Window { leading, trailing };
        }

        let meaningful = self.window.meaningful_bits();
        let xor = cursor.read_bits(meaningful as u8)? << self.window.trailing;

        self.prev_value ^= xor;
        Ok(f64::from_bits(self.prev_value))
    }
}
