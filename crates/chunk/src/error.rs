//! Error and Result types for chunk and codec operations.

use crate::meas::{SeriesId, Time};
use std::io;
use thiserror::Error;

/// A convenience `Result` type for chunk operations.
pub type Result<T> = std::result::Result<T, ChunkError>;

/// The error type for chunk, codec and arena operations.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// A write would run past the end of the cursor's region.
    ///
    /// Codecs use this to signal a full chunk; [`Chunk::append`](crate::Chunk::append)
    /// turns it into [`AppendStatus::Full`](crate::AppendStatus::Full).
    #[error("Capacity exceeded: requested {requested} bits, {remaining} remaining")]
    CapacityExceeded {
        /// Number of bits the write needed.
        requested: u32,
        /// Number of bits left in the region.
        remaining: u32,
    },

    /// The delta between two timestamps cannot be represented by the time codec.
    #[error("Time delta out of range: previous {previous}, current {current}")]
    DeltaOutOfRange {
        /// Timestamp of the previously stored sample.
        previous: Time,
        /// Timestamp of the rejected sample.
        current: Time,
    },

    /// Sample belongs to a different series than the chunk.
    #[error("Series mismatch: chunk holds {expected}, sample has {actual}")]
    SeriesMismatch {
        /// Series id of the chunk.
        expected: SeriesId,
        /// Series id carried by the sample.
        actual: SeriesId,
    },

    /// Prefix bits at `position` do not select any timestamp bucket.
    #[error("Malformed delta prefix at bit {position}")]
    MalformedPrefix {
        /// Bit position where the prefix starts.
        position: u32,
    },

    /// A decoded delta carries the timestamp past `Time::MAX`.
    #[error("Timestamp overflow at bit {position}: {previous} + {delta}")]
    TimestampOverflow {
        /// Bit position where the delta code starts.
        position: u32,
        /// Timestamp the delta was added to.
        previous: Time,
        /// Decoded delta.
        delta: u64,
    },

    /// A flag varint is longer than a `u32` allows.
    #[error("Malformed flag varint at bit {position}")]
    MalformedVarint {
        /// Bit position where the varint starts.
        position: u32,
    },

    /// A read would run past the end of the cursor's region.
    #[error("Read past end: {requested} bits at {position}, capacity {capacity}")]
    ReadPastEnd {
        /// Current cursor position in bits.
        position: u32,
        /// Number of bits requested.
        requested: u32,
        /// Capacity of the region in bits.
        capacity: u32,
    },

    /// Reader was asked for more samples than the chunk holds.
    #[error("Read past sample count {count}")]
    ReadPastCount {
        /// Number of samples stored in the chunk.
        count: u32,
    },

    /// Chunk has no samples to read.
    #[error("Chunk is empty")]
    EmptyChunk,

    /// Invalid magic bytes in a persisted chunk header.
    #[error("Invalid magic bytes: expected ACHK, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported persisted chunk format version.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// Chunk buffer checksum does not match the header.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// CRC32 recorded in the header.
        expected: u32,
        /// CRC32 computed over the buffer.
        actual: u32,
    },

    /// Header describes a buffer of a different size than the one supplied.
    #[error("Buffer size mismatch: header says {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        /// Size recorded in the header.
        expected: u32,
        /// Size of the supplied buffer.
        actual: u32,
    },

    /// Persisted header describes an impossible chunk.
    #[error("Corrupt chunk header: {0}")]
    CorruptHeader(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}
