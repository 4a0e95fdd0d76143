//! Chunks: the unit of storage for one series' compressed samples.
//!
//! A chunk pairs a [`ChunkHeader`] with a fixed-size byte buffer holding the
//! compressed sample stream. The memory comes either from the heap or from a
//! [`ChunkArena`](crate::ChunkArena) slot; arena memory goes back to the
//! arena when the chunk is dropped.
//!
//! A chunk is filled by [`Chunk::append`] until it reports
//! [`AppendStatus::Full`] or is closed, and is then read with
//! [`Chunk::reader`]. Reading and appending are separate phases.
//!
//! ## Persisted Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Chunk Header (140 bytes, little-endian)                     │
//! │  - Magic: "ACHK" (4 bytes)                                   │
//! │  - Version: u16 (2 bytes) = 1                                │
//! │  - Flags: u8 (bit 0 full, bit 1 closed), reserved u8         │
//! │  - Series ID: u64                                            │
//! │  - Min Time / Max Time: u64 + u64                            │
//! │  - Count: u32                                                │
//! │  - Buffer Size: u32 (bytes)                                  │
//! │  - Bit Position: u32 (end of the compressed stream)          │
//! │  - First Sample: time u64, value u64 bits, flag u32          │
//! │  - Last Sample: time u64, value u64 bits, flag u32           │
//! │  - Statistics block (52 bytes)                               │
//! │  - Buffer CRC32: u32                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Compressed buffer (Buffer Size bytes)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::arena::ArenaSlot;
use crate::codec::{AppendStatus, BitCursor, SampleStreamReader, SampleStreamWriter};
use crate::error::{ChunkError, Result};
use crate::le::{array_at, u16_at, u32_at, u64_at};
use crate::meas::{Flag, Sample, SeriesId, Time, MAX_TIME, MIN_TIME};
use crate::stats::RunningStatistics;
use std::fmt;
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Magic bytes for a persisted chunk header: "ACHK"
pub const CHUNK_MAGIC: [u8; 4] = *b"ACHK";

/// Current persisted chunk format version.
pub const CHUNK_VERSION: u16 = 1;

/// Persisted header size in bytes.
pub const CHUNK_HEADER_SIZE: usize = 140;

/// Largest buffer a persisted chunk may declare (16 MiB).
pub const MAX_CHUNK_BUFFER_SIZE: u32 = 16 * 1024 * 1024;

const FLAG_FULL: u8 = 0b01;
const FLAG_CLOSED: u8 = 0b10;

/// Chunk header: identity, time range, statistics and write state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkHeader {
    /// Series the chunk belongs to.
    pub id: SeriesId,
    /// Smallest timestamp stored.
    pub min_time: Time,
    /// Largest timestamp stored.
    pub max_time: Time,
    /// Number of samples stored, including the first.
    pub count: u32,
    /// Set once an append found no room.
    pub is_full: bool,
    /// Set once the write phase was ended explicitly.
    pub is_closed: bool,
    /// Size of the compressed buffer in bytes.
    pub buffer_size: u32,
    /// Bit position where the compressed stream ends.
    pub bit_position: u32,
    /// First sample, stored uncompressed.
    pub first: Sample,
    /// Most recently appended sample.
    pub last: Sample,
    /// Running statistics of all stored samples.
    pub stats: RunningStatistics,
}

impl ChunkHeader {
    /// Header of an empty chunk.
    pub fn new(id: SeriesId, buffer_size: u32) -> Self {
        Self {
            id,
            min_time: MAX_TIME,
            max_time: MIN_TIME,
            count: 0,
            is_full: false,
            is_closed: false,
            buffer_size,
            bit_position: 0,
            first: Sample::zeroed(),
            last: Sample::zeroed(),
            stats: RunningStatistics::new(),
        }
    }

    /// All-zero header, as found in freshly zeroed storage.
    pub const fn zeroed() -> Self {
        Self {
            id: 0,
            min_time: 0,
            max_time: 0,
            count: 0,
            is_full: false,
            is_closed: false,
            buffer_size: 0,
            bit_position: 0,
            first: Sample::zeroed(),
            last: Sample::zeroed(),
            stats: RunningStatistics::zeroed(),
        }
    }

    /// Checks that the buffer size and stream end describe a possible chunk.
    fn check_layout(&self) -> Result<()> {
        if self.buffer_size > MAX_CHUNK_BUFFER_SIZE {
            return Err(ChunkError::CorruptHeader(format!(
                "buffer size {} exceeds {}",
                self.buffer_size, MAX_CHUNK_BUFFER_SIZE
            )));
        }
        if self.bit_position as u64 > self.buffer_size as u64 * 8 {
            return Err(ChunkError::CorruptHeader(format!(
                "bit position {} beyond {} byte buffer",
                self.bit_position, self.buffer_size
            )));
        }
        Ok(())
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.is_full {
            flags |= FLAG_FULL;
        }
        if self.is_closed {
            flags |= FLAG_CLOSED;
        }
        flags
    }

    /// Writes the header followed by `buffer_crc`.
    pub fn write_to<W: Write>(&self, writer: &mut W, buffer_crc: u32) -> Result<()> {
        writer.write_all(&CHUNK_MAGIC)?;
        writer.write_all(&CHUNK_VERSION.to_le_bytes())?;
        writer.write_all(&[self.flags(), 0])?;
        writer.write_all(&self.id.to_le_bytes())?;
        writer.write_all(&self.min_time.to_le_bytes())?;
        writer.write_all(&self.max_time.to_le_bytes())?;
        writer.write_all(&self.count.to_le_bytes())?;
        writer.write_all(&self.buffer_size.to_le_bytes())?;
        writer.write_all(&self.bit_position.to_le_bytes())?;
        writer.write_all(&self.first.time.to_le_bytes())?;
        writer.write_all(&self.first.value.to_bits().to_le_bytes())?;
        writer.write_all(&self.first.flag.to_le_bytes())?;
        writer.write_all(&self.last.time.to_le_bytes())?;
        writer.write_all(&self.last.value.to_bits().to_le_bytes())?;
        writer.write_all(&self.last.flag.to_le_bytes())?;
        self.stats.write_to(writer)?;
        writer.write_all(&buffer_crc.to_le_bytes())?;
        Ok(())
    }

    /// Reads a header and the buffer CRC that follows it.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::InvalidMagic` if the magic bytes don't match.
    /// Returns `ChunkError::UnsupportedVersion` if the version is newer than this build.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<(Self, u32)> {
        let mut buf = [0u8; CHUNK_HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        let magic: [u8; 4] = array_at(&buf, 0)?;
        if magic != CHUNK_MAGIC {
            return Err(ChunkError::InvalidMagic(magic));
        }

        let version = u16_at(&buf, 4)?;
        if version > CHUNK_VERSION {
            return Err(ChunkError::UnsupportedVersion(version));
        }

        let flags = buf[6];
        let id = u64_at(&buf, 8)?;
        let sample_at = |at: usize| -> Result<Sample> {
            let time = u64_at(&buf, at)?;
            let value = f64::from_bits(u64_at(&buf, at + 8)?);
            Ok(Sample::new(id, time, value, u32_at(&buf, at + 16)?))
        };

        let header = Self {
            id,
            min_time: u64_at(&buf, 16)?,
            max_time: u64_at(&buf, 24)?,
            count: u32_at(&buf, 32)?,
            is_full: flags & FLAG_FULL != 0,
            is_closed: flags & FLAG_CLOSED != 0,
            buffer_size: u32_at(&buf, 36)?,
            bit_position: u32_at(&buf, 40)?,
            first: sample_at(44)?,
            last: sample_at(64)?,
            stats: RunningStatistics::read_from(&mut &buf[84..136])?,
        };

        Ok((header, u32_at(&buf, 136)?))
    }
}

/// Memory backing a chunk: the header and the compressed buffer.
#[derive(Debug)]
pub enum ChunkMemory {
    /// Heap-allocated header and buffer.
    Heap {
        /// Chunk header.
        header: ChunkHeader,
        /// Compressed buffer.
        buffer: Box<[u8]>,
    },
    /// Leased from a chunk arena.
    Arena(ArenaSlot),
}

impl ChunkMemory {
    fn header(&self) -> &ChunkHeader {
        match self {
            Self::Heap { header, .. } => header,
            Self::Arena(slot) => slot.header(),
        }
    }

    fn header_mut(&mut self) -> &mut ChunkHeader {
        match self {
            Self::Heap { header, .. } => header,
            Self::Arena(slot) => slot.header_mut(),
        }
    }
}

impl AsRef<[u8]> for ChunkMemory {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Heap { buffer, .. } => buffer,
            Self::Arena(slot) => slot.as_ref(),
        }
    }
}

impl AsMut<[u8]> for ChunkMemory {
    fn as_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Heap { buffer, .. } => buffer,
            Self::Arena(slot) => slot.as_mut(),
        }
    }
}

/// Compressed samples of one series.
pub struct Chunk {
    writer: SampleStreamWriter<ChunkMemory>,
}

impl Chunk {
    /// Creates an empty heap-backed chunk with a `buffer_size`-byte buffer.
    pub fn new(id: SeriesId, buffer_size: usize) -> Self {
        let buffer = vec![0u8; buffer_size].into_boxed_slice();
        let header = ChunkHeader::new(id, buffer_size as u32);
        Self::from_memory(ChunkMemory::Heap { header, buffer })
    }

    /// Creates an empty chunk in an arena slot.
    ///
    /// The slot goes back to its arena when the chunk is dropped.
    pub fn with_slot(id: SeriesId, mut slot: ArenaSlot) -> Self {
        *slot.header_mut() = ChunkHeader::new(id, slot.as_ref().len() as u32);
        Self::from_memory(ChunkMemory::Arena(slot))
    }

    fn from_memory(memory: ChunkMemory) -> Self {
        Self {
            writer: SampleStreamWriter::new(BitCursor::new(memory)),
        }
    }

    /// Rebuilds a closed, heap-backed chunk from a header and its buffer.
    pub fn from_parts(header: ChunkHeader, buffer: Box<[u8]>) -> Result<Self> {
        if buffer.len() != header.buffer_size as usize {
            return Err(ChunkError::BufferSizeMismatch {
                expected: header.buffer_size,
                actual: buffer.len() as u32,
            });
        }
        header.check_layout()?;

        let position = header.bit_position;
        let mut header = header;
        header.is_closed = true;

        let memory = ChunkMemory::Heap { header, buffer };
        let mut writer = SampleStreamWriter::new(BitCursor::with_position(memory, position));
        writer.seal();
        Ok(Self { writer })
    }

    /// The chunk header.
    pub fn header(&self) -> &ChunkHeader {
        self.writer.get_ref().header()
    }

    /// The whole compressed buffer, including unused tail bytes.
    pub fn raw_buffer(&self) -> &[u8] {
        self.writer.get_ref().as_ref()
    }

    /// Series the chunk belongs to.
    pub fn id(&self) -> SeriesId {
        self.header().id
    }

    /// Number of stored samples.
    pub fn count(&self) -> u32 {
        self.header().count
    }

    /// Returns true if the chunk holds no samples.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Smallest stored timestamp.
    pub fn min_time(&self) -> Time {
        self.header().min_time
    }

    /// Largest stored timestamp.
    pub fn max_time(&self) -> Time {
        self.header().max_time
    }

    /// Returns true once an append found no room.
    pub fn is_full(&self) -> bool {
        self.header().is_full
    }

    /// Returns true once the write phase was ended with [`Chunk::close`].
    pub fn is_closed(&self) -> bool {
        self.header().is_closed
    }

    /// Running statistics of the stored samples.
    pub fn stats(&self) -> &RunningStatistics {
        &self.header().stats
    }

    /// The first sample, if any was stored.
    pub fn first(&self) -> Option<&Sample> {
        let header = self.header();
        (header.count > 0).then_some(&header.first)
    }

    /// The most recently appended sample, if any was stored.
    pub fn last(&self) -> Option<&Sample> {
        let header = self.header();
        (header.count > 0).then_some(&header.last)
    }

    /// Returns true if the memory is leased from an arena.
    pub fn is_arena_backed(&self) -> bool {
        matches!(self.writer.get_ref(), ChunkMemory::Arena(_))
    }

    /// Bytes of the buffer occupied by the compressed stream.
    pub fn used_bytes(&self) -> usize {
        self.writer.cursor().used_bytes()
    }

    /// Returns false only if no stored sample can carry `flag`.
    ///
    /// Flag `0` matches every chunk.
    pub fn check_flag(&self, flag: Flag) -> bool {
        flag == 0 || self.stats().may_contain_flag(flag)
    }

    /// Appends a sample.
    ///
    /// Returns [`AppendStatus::Full`] without storing the sample once the
    /// buffer has no room or the chunk is closed; the chunk then stays full.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::SeriesMismatch` for a sample of another series and
    /// `ChunkError::DeltaOutOfRange` for a timestamp the codec cannot follow.
    /// Neither changes the chunk.
    pub fn append(&mut self, sample: &Sample) -> Result<AppendStatus> {
        let header = self.header();
        if header.is_full || header.is_closed {
            return Ok(AppendStatus::Full);
        }
        if sample.id != header.id {
            return Err(ChunkError::SeriesMismatch {
                expected: header.id,
                actual: sample.id,
            });
        }

        let status = self.writer.append(sample)?;
        let position = self.writer.cursor().position();
        let writer_full = self.writer.is_full();
        let header = self.writer.get_mut().header_mut();

        if status == AppendStatus::Written {
            if header.count == 0 {
                header.first = *sample;
            }
            header.last = *sample;
            header.count += 1;
            header.min_time = header.min_time.min(sample.time);
            header.max_time = header.max_time.max(sample.time);
            header.stats.update(sample);
            header.bit_position = position;
        }

        if writer_full {
            header.is_full = true;
            debug!(
                "Chunk for series {} full: {} samples in {} bits",
                header.id, header.count, header.bit_position
            );
        }

        Ok(status)
    }

    /// Ends the write phase; later appends report [`AppendStatus::Full`].
    pub fn close(&mut self) {
        self.writer.seal();
        let header = self.writer.get_mut().header_mut();
        header.is_closed = true;
        debug!(
            "Closed chunk for series {} with {} samples",
            header.id, header.count
        );
    }

    /// Creates a reader over the stored samples, first sample included.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::EmptyChunk` if nothing has been appended.
    pub fn reader(&self) -> Result<ChunkReader<'_>> {
        let header = self.header();
        if header.count == 0 {
            return Err(ChunkError::EmptyChunk);
        }

        let stream = &self.raw_buffer()[..self.used_bytes()];
        Ok(ChunkReader {
            stream: SampleStreamReader::new(BitCursor::new(stream), &header.first),
            first: header.first,
            count: header.count,
            emitted: 0,
        })
    }

    /// Decodes every stored sample.
    pub fn read_all(&self) -> Result<Vec<Sample>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.reader()?.collect()
    }

    /// Writes the header and the full buffer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let buffer = self.raw_buffer();
        self.header().write_to(writer, crc32fast::hash(buffer))?;
        writer.write_all(buffer)?;
        Ok(())
    }

    /// Reads a chunk written by [`Chunk::write_to`].
    ///
    /// The restored chunk is heap-backed and closed.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::CorruptHeader` if the header declares an
    /// impossible buffer, checked before the buffer is allocated, and
    /// `ChunkError::ChecksumMismatch` if the buffer does not match the CRC
    /// recorded in the header.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let (header, expected) = ChunkHeader::read_from(reader)?;
        header.check_layout()?;

        let mut buffer = vec![0u8; header.buffer_size as usize].into_boxed_slice();
        reader.read_exact(&mut buffer)?;

        let actual = crc32fast::hash(&buffer);
        if actual != expected {
            warn!(
                "Chunk for series {} failed checksum: expected {}, got {}",
                header.id, expected, actual
            );
            return Err(ChunkError::ChecksumMismatch { expected, actual });
        }

        Self::from_parts(header, buffer)
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("header", self.header())
            .field("used_bytes", &self.used_bytes())
            .field("arena", &self.is_arena_backed())
            .finish()
    }
}

/// Reads the samples of a chunk in append order.
///
/// Yields exactly `count` samples; asking for more is an error.
#[derive(Debug)]
pub struct ChunkReader<'a> {
    stream: SampleStreamReader<&'a [u8]>,
    first: Sample,
    count: u32,
    emitted: u32,
}

impl ChunkReader<'_> {
    /// Returns the next sample.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::ReadPastCount` once every sample has been read,
    /// or a decode error if the buffer is corrupt.
    pub fn read_next(&mut self) -> Result<Sample> {
        if self.emitted >= self.count {
            return Err(ChunkError::ReadPastCount { count: self.count });
        }

        let sample = if self.emitted == 0 {
            self.first
        } else {
            self.stream.read()?
        };
        self.emitted += 1;
        Ok(sample)
    }

    /// Returns true once every sample has been read.
    pub fn is_end(&self) -> bool {
        self.emitted >= self.count
    }

    /// Number of samples not read yet.
    pub fn remaining(&self) -> u32 {
        self.count - self.emitted
    }
}

impl Iterator for ChunkReader<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        Some(self.read_next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}
