//! Delta encoding for timestamps.
//!
//! Each timestamp after the first is stored as the difference from the
//! previous one, bucketed by magnitude:
//!
//! | bucket | prefix | field bits | total bits |
//! |--------|--------|------------|------------|
//! | small  | `10`   | 8          | 10         |
//! | medium | `110`  | 9          | 12         |
//! | large  | `1110` | 12         | 16         |
//! | huge   | `1111` | 32         | 36         |
//!
//! A code is `(prefix << field_bits) | delta`, written as one bit group. The
//! encoder picks the smallest bucket that holds the delta; the decoder is
//! driven by the prefix alone. The first timestamp of a stream lives in the
//! chunk header and never passes through this codec.

use super::bits::BitCursor;
use crate::error::{ChunkError, Result};
use crate::meas::Time;

const SMALL_MASK: u16 = 0b10 << 8;
const SMALL_FIELD_BITS: u8 = 8;

const MEDIUM_MASK: u16 = 0b110 << 9;
const MEDIUM_FIELD_BITS: u8 = 9;

const LARGE_MASK: u16 = 0b1110 << 12;
const LARGE_FIELD_BITS: u8 = 12;

const HUGE_MASK: u64 = 0b1111 << 32;
const HUGE_FIELD_BITS: u8 = 32;

/// A bucketed delta code ready to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaCode {
    /// Prefix and field packed into the low `width` bits.
    pub bits: u64,
    /// Total number of bits in the code.
    pub width: u8,
}

/// Encoder for timestamp deltas.
#[derive(Debug, Clone, Copy)]
pub struct TimestampEncoder {
    prev_time: Time,
}

impl TimestampEncoder {
    /// Creates an encoder whose first delta is taken against `first`.
    pub fn new(first: Time) -> Self {
        Self { prev_time: first }
    }

    /// Timestamp the next delta is measured from.
    pub fn prev_time(&self) -> Time {
        self.prev_time
    }

    /// Small bucket code: `10` followed by 8 bits.
    pub fn small_code(delta: u64) -> u16 {
        SMALL_MASK | (delta as u16 & 0xFF)
    }

    /// Medium bucket code: `110` followed by 9 bits.
    pub fn medium_code(delta: u64) -> u16 {
        MEDIUM_MASK | (delta as u16 & 0x1FF)
    }

    /// Large bucket code: `1110` followed by 12 bits.
    pub fn large_code(delta: u64) -> u16 {
        LARGE_MASK | (delta as u16 & 0xFFF)
    }

    /// Huge bucket code: `1111` followed by 32 bits.
    pub fn huge_code(delta: u64) -> u64 {
        HUGE_MASK | (delta & 0xFFFF_FFFF)
    }

    /// Picks the smallest bucket for `delta`, or `None` if it needs more than 32 bits.
    pub fn encode_delta(delta: u64) -> Option<DeltaCode> {
        let code = if delta < 1 << SMALL_FIELD_BITS {
            DeltaCode {
                bits: Self::small_code(delta) as u64,
                width: 2 + SMALL_FIELD_BITS,
            }
        } else if delta < 1 << MEDIUM_FIELD_BITS {
            DeltaCode {
                bits: Self::medium_code(delta) as u64,
                width: 3 + MEDIUM_FIELD_BITS,
            }
        } else if delta < 1 << LARGE_FIELD_BITS {
            DeltaCode {
                bits: Self::large_code(delta) as u64,
                width: 4 + LARGE_FIELD_BITS,
            }
        } else if delta < 1 << HUGE_FIELD_BITS {
            DeltaCode {
                bits: Self::huge_code(delta),
                width: 4 + HUGE_FIELD_BITS,
            }
        } else {
            return None;
        };
        Some(code)
    }

    /// Appends `time` to the stream.
    ///
    /// Fails with [`ChunkError::DeltaOutOfRange`] when `time` precedes the
    /// previous timestamp or the gap needs more than 32 bits, and with
    /// [`ChunkError::CapacityExceeded`] when the code does not fit. Either
    /// way the cursor and encoder are left unchanged.
    pub fn append<B>(&mut self, time: Time, cursor: &mut BitCursor<B>) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        let code = time
            .checked_sub(self.prev_time)
            .and_then(Self::encode_delta)
            .ok_or(ChunkError::DeltaOutOfRange {
                previous: self.prev_time,
                current: time,
            })?;

        cursor.write_bits(code.bits, code.width)?;
        self.prev_time = time;
        Ok(())
    }
}

/// Decoder for timestamp deltas.
#[derive(Debug, Clone, Copy)]
pub struct TimestampDecoder {
    prev_time: Time,
}

impl TimestampDecoder {
    /// Creates a decoder that reconstructs timestamps following `first`.
    pub fn new(first: Time) -> Self {
        Self { prev_time: first }
    }

    /// Decodes the next timestamp.
    pub fn read<B: AsRef<[u8]>>(&mut self, cursor: &mut BitCursor<B>) -> Result<Time> {
        let start = cursor.position();

        if !cursor.read_bit()? {
            return Err(ChunkError::MalformedPrefix { position: start });
        }
        let field_bits = if !cursor.read_bit()? {
            SMALL_FIELD_BITS
        } else if !cursor.read_bit()? {
            MEDIUM_FIELD_BITS
        } else if !cursor.read_bit()? {
            LARGE_FIELD_BITS
        } else {
            HUGE_FIELD_BITS
        };

        let delta = cursor.read_bits(field_bits)?;
        self.prev_time = self
            .prev_time
            .checked_add(delta)
            .ok_or(ChunkError::TimestampOverflow {
                position: start,
                previous: self.prev_time,
                delta,
            })?;
        Ok(self.prev_time)
    }
}
