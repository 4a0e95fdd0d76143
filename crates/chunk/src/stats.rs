//! Running statistics over the samples of one or more chunks.
//!
//! The block is updated on every append and merged across chunks for range
//! queries. Merging is componentwise min/max/sum/count plus a bitwise OR of
//! the flag bloom filters, so it is associative and commutative. The sample
//! count saturates at `u32::MAX`.
//!
//! ## Persisted layout (52 bytes, little-endian)
//!
//! ```text
//! min_time: u64 │ max_time: u64 │ count: u32 │ flag_bloom: u64 │
//! min_value: f64 │ max_value: f64 │ sum: f64
//! ```

use crate::error::Result;
use crate::le::{u32_at, u64_at};
use crate::meas::{Flag, Sample, Time, MAX_TIME, MIN_TIME};
use std::io::{Read, Write};

/// Size of the persisted statistics block in bytes.
pub const STATS_BLOCK_SIZE: usize = 52;

/// Number of bloom bits set per flag.
const FLAG_BLOOM_HASH_COUNT: u64 = 3;

/// Bloom filter mask for a single flag.
pub fn flag_bloom_bits(flag: Flag) -> u64 {
    let key = flag.to_le_bytes();
    (0..FLAG_BLOOM_HASH_COUNT).fold(0u64, |acc, seed| {
        let hash = xxhash_rust::xxh64::xxh64(&key, seed);
        acc | 1u64 << (hash % 64)
    })
}

/// Summary of a sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStatistics {
    /// Smallest timestamp seen.
    pub min_time: Time,
    /// Largest timestamp seen.
    pub max_time: Time,
    /// Number of samples, clamped at `u32::MAX`.
    pub count: u32,
    /// Bloom filter over the flags seen.
    pub flag_bloom: u64,
    /// Smallest value seen.
    pub min_value: f64,
    /// Largest value seen.
    pub max_value: f64,
    /// Sum of all values.
    pub sum: f64,
}

impl Default for RunningStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStatistics {
    /// Statistics of the empty set.
    pub fn new() -> Self {
        Self {
            min_time: MAX_TIME,
            max_time: MIN_TIME,
            count: 0,
            flag_bloom: 0,
            min_value: f64::MAX,
            max_value: f64::MIN,
            sum: 0.0,
        }
    }

    /// All-zero block, as found in freshly zeroed storage.
    pub const fn zeroed() -> Self {
        Self {
            min_time: 0,
            max_time: 0,
            count: 0,
            flag_bloom: 0,
            min_value: 0.0,
            max_value: 0.0,
            sum: 0.0,
        }
    }

    /// Returns true if no sample has been absorbed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Absorbs one sample.
    pub fn update(&mut self, sample: &Sample) {
        self.count = self.count.saturating_add(1);

        self.min_time = self.min_time.min(sample.time);
        self.max_time = self.max_time.max(sample.time);

        self.flag_bloom |= flag_bloom_bits(sample.flag);

        self.min_value = self.min_value.min(sample.value);
        self.max_value = self.max_value.max(sample.value);
        self.sum += sample.value;
    }

    /// Absorbs another statistics block.
    pub fn merge(&mut self, other: &RunningStatistics) {
        self.count = self.count.saturating_add(other.count);

        self.min_time = self.min_time.min(other.min_time);
        self.max_time = self.max_time.max(other.max_time);

        self.flag_bloom |= other.flag_bloom;

        self.min_value = self.min_value.min(other.min_value);
        self.max_value = self.max_value.max(other.max_value);
        self.sum += other.sum;
    }

    /// Merges any number of blocks, starting from the empty set.
    pub fn merged<'a, I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = &'a RunningStatistics>,
    {
        blocks.into_iter().fold(Self::new(), |mut acc, block| {
            acc.merge(block);
            acc
        })
    }

    /// Returns false only if `flag` was certainly never absorbed.
    pub fn may_contain_flag(&self, flag: Flag) -> bool {
        let bits = flag_bloom_bits(flag);
        self.flag_bloom & bits == bits
    }

    /// Writes the 52-byte block.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.min_time.to_le_bytes())?;
        writer.write_all(&self.max_time.to_le_bytes())?;
        writer.write_all(&self.count.to_le_bytes())?;
        writer.write_all(&self.flag_bloom.to_le_bytes())?;
        writer.write_all(&self.min_value.to_le_bytes())?;
        writer.write_all(&self.max_value.to_le_bytes())?;
        writer.write_all(&self.sum.to_le_bytes())?;
        Ok(())
    }

    /// Reads a 52-byte block.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; STATS_BLOCK_SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }

    /// Decodes a block from its fixed-size byte form.
    pub fn decode(buf: &[u8; STATS_BLOCK_SIZE]) -> Result<Self> {
        Ok(Self {
            min_time: u64_at(buf, 0)?,
            max_time: u64_at(buf, 8)?,
            count: u32_at(buf, 16)?,
            flag_bloom: u64_at(buf, 20)?,
            min_value: f64::from_bits(u64_at(buf, 28)?),
            max_value: f64::from_bits(u64_at(buf, 36)?),
            sum: f64::from_bits(u64_at(buf, 44)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(time: Time, value: f64, flag: Flag) -> Sample {
        Sample::new(1, time, value, flag)
    }

    #[test]
    fn test_empty_statistics() {
        let stats = RunningStatistics::new();
        assert!(stats.is_empty());
        assert_eq!(stats.min_time, Time::MAX);
        assert_eq!(stats.max_time, Time::MIN);
        assert_eq!(stats.min_value, f64::MAX);
        assert_eq!(stats.max_value, f64::MIN);
        assert_eq!(stats.sum, 0.0);
        assert_eq!(stats.flag_bloom, 0);
    }

    #[test]
    fn test_update() {
        let mut stats = RunningStatistics::new();
        stats.update(&sample(20, 5.0, 1));
        stats.update(&sample(10, -2.0, 2));
        stats.update(&sample(30, 7.0, 1));

        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_time, 10);
        assert_eq!(stats.max_time, 30);
        assert_eq!(stats.min_value, -2.0);
        assert_eq!(stats.max_value, 7.0);
        assert_eq!(stats.sum, 10.0);
        assert!(stats.may_contain_flag(1));
        assert!(stats.may_contain_flag(2));
    }

    #[test]
    fn test_merge_matches_update() {
        let samples: Vec<Sample> = (0..20)
            .map(|i| sample(i * 7 % 13, (i as f64) - 8.0, (i % 4) as u32))
            .collect();

        let mut all = RunningStatistics::new();
        samples.iter().for_each(|s| all.update(s));

        for split in 0..=samples.len() {
            let (a, b) = samples.split_at(split);
            let mut left = RunningStatistics::new();
            a.iter().for_each(|s| left.update(s));
            let mut right = RunningStatistics::new();
            b.iter().for_each(|s| right.update(s));

            let mut ab = left;
            ab.merge(&right);
            let mut ba = right;
            ba.merge(&left);

            assert_eq!(ab, all, "split at {}", split);
            assert_eq!(ba, all, "split at {}", split);
        }
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let mut stats = RunningStatistics::new();
        stats.update(&sample(5, 1.5, 3));
        let before = stats;
        stats.merge(&RunningStatistics::new());
        assert_eq!(stats, before);
    }

    #[test]
    fn test_merged_many() {
        let blocks: Vec<RunningStatistics> = (0..4)
            .map(|i| {
                let mut s = RunningStatistics::new();
                s.update(&sample(i * 100, i as f64, i as u32));
                s
            })
            .collect();

        let total = RunningStatistics::merged(&blocks);
        assert_eq!(total.count, 4);
        assert_eq!(total.min_time, 0);
        assert_eq!(total.max_time, 300);
        assert_eq!(total.sum, 6.0);
    }

    #[test]
    fn test_count_saturates() {
        let mut full = RunningStatistics::new();
        full.update(&sample(1, 1.0, 0));
        full.count = u32::MAX;

        let mut one = RunningStatistics::new();
        one.update(&sample(2, 2.0, 0));

        let mut merged = full;
        merged.merge(&one);
        assert_eq!(merged.count, u32::MAX);
        assert_eq!(merged.max_time, 2);
        assert_eq!(merged.sum, 3.0);

        let mut updated = full;
        updated.update(&sample(2, 2.0, 0));
        assert_eq!(updated, merged);
    }

    #[test]
    fn test_bloom_bits_stable() {
        let bits = flag_bloom_bits(42);
        assert_ne!(bits, 0);
        assert!(bits.count_ones() <= 3);
        assert_eq!(bits, flag_bloom_bits(42));
    }

    #[test]
    fn test_block_layout() {
        let mut stats = RunningStatistics::new();
        stats.update(&sample(0x0102, 1.0, 9));

        let mut buf = Vec::new();
        stats.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), STATS_BLOCK_SIZE);
        assert_eq!(&buf[0..8], &0x0102u64.to_le_bytes());
        assert_eq!(&buf[16..20], &1u32.to_le_bytes());
        assert_eq!(&buf[20..28], &stats.flag_bloom.to_le_bytes());
        assert_eq!(&buf[44..52], &1.0f64.to_le_bytes());

        let decoded = RunningStatistics::read_from(&mut &buf[..]).unwrap();
        assert_eq!(decoded, stats);
    }
}
