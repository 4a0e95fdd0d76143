//! Bit cursor over a borrowed or owned byte region.
//!
//! Bits are packed most-significant-bit first within each byte, the same
//! `Msb0` ordering the Gorilla block format uses. Position and capacity are
//! counted in bits.

use crate::error::{ChunkError, Result};
use bitvec::prelude::*;

/// Position-tracked bit window over a fixed-size byte region.
///
/// Writes never extend the region and never write partially: a write that
/// does not fit returns [`ChunkError::CapacityExceeded`] and leaves the cursor
/// untouched.
#[derive(Debug, Clone)]
pub struct BitCursor<B> {
    buf: B,
    pos: u32,
    cap: u32,
}

impl<B: AsRef<[u8]>> BitCursor<B> {
    /// Creates a cursor at bit 0 of `buf`.
    pub fn new(buf: B) -> Self {
        let cap = (buf.as_ref().len() as u64 * 8).min(u32::MAX as u64) as u32;
        Self { buf, pos: 0, cap }
    }

    /// Creates a cursor positioned at bit `pos` of `buf`.
    pub fn with_position(buf: B, pos: u32) -> Self {
        let mut cursor = Self::new(buf);
        cursor.seek(pos);
        cursor
    }

    /// Current bit position.
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Size of the region in bits.
    pub fn capacity(&self) -> u32 {
        self.cap
    }

    /// Bits left between the position and the end of the region.
    pub fn remaining(&self) -> u32 {
        self.cap - self.pos
    }

    /// Returns true once the position has reached the end of the region.
    pub fn is_full(&self) -> bool {
        self.pos >= self.cap
    }

    /// Number of bytes touched so far, counting a partial last byte.
    pub fn used_bytes(&self) -> usize {
        self.pos.div_ceil(8) as usize
    }

    /// Moves the cursor back to bit 0.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Moves the cursor to an absolute bit position.
    ///
    /// # Panics
    ///
    /// Panics if `pos` lies beyond the capacity.
    pub fn seek(&mut self, pos: u32) {
        assert!(
            pos <= self.cap,
            "bit position {} beyond capacity {}",
            pos,
            self.cap
        );
        self.pos = pos;
    }

    /// Returns a reference to the underlying region.
    pub fn get_ref(&self) -> &B {
        &self.buf
    }

    /// Returns a mutable reference to the underlying region.
    ///
    /// Bytes changed through this reference are not tracked by the cursor.
    pub fn get_mut(&mut self) -> &mut B {
        &mut self.buf
    }

    /// Consumes the cursor and returns the region.
    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Reads `count` bits (at most 64) as a big-endian integer.
    pub fn read_bits(&mut self, count: u8) -> Result<u64> {
        debug_assert!(count <= 64, "cannot read {} bits into a u64", count);
        self.check_read(count as u32)?;

        let bits = self.buf.as_ref().view_bits::<Msb0>();
        let start = self.pos as usize;
        let mut value = 0u64;
        for i in start..start + count as usize {
            value = (value << 1) | bits[i] as u64;
        }
        self.pos += count as u32;
        Ok(value)
    }

    /// Reads a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        self.read_bits(1).map(|b| b == 1)
    }

    /// Reads eight bits.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.read_bits(8).map(|b| b as u8)
    }

    fn check_read(&self, requested: u32) -> Result<()> {
        if requested > self.remaining() {
            return Err(ChunkError::ReadPastEnd {
                position: self.pos,
                requested,
                capacity: self.cap,
            });
        }
        Ok(())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BitCursor<B> {
    /// Writes the low `count` bits (at most 64) of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, count: u8) -> Result<()> {
        debug_assert!(count <= 64, "cannot write {} bits from a u64", count);
        self.ensure(count as u32)?;

        let bits = self.buf.as_mut().view_bits_mut::<Msb0>();
        let mut at = self.pos as usize;
        for i in (0..count).rev() {
            bits.set(at, (value >> i) & 1 == 1);
            at += 1;
        }
        self.pos += count as u32;
        Ok(())
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(bit as u64, 1)
    }

    /// Writes eight bits.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bits(byte as u64, 8)
    }

    /// Checks that `requested` more bits fit without moving the cursor.
    pub fn ensure(&self, requested: u32) -> Result<()> {
        if requested > self.remaining() {
            return Err(ChunkError::CapacityExceeded {
                requested,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Clears every bit between `pos` and the current position, then seeks to `pos`.
    ///
    /// Used to undo a partially encoded sample.
    pub fn rewind(&mut self, pos: u32) {
        assert!(
            pos <= self.pos,
            "cannot rewind forward from {} to {}",
            self.pos,
            pos
        );
        let bits = self.buf.as_mut().view_bits_mut::<Msb0>();
        bits[pos as usize..self.pos as usize].fill(false);
        self.pos = pos;
    }
}
