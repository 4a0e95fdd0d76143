//! Alopex Chunk - compressed sample chunks for time series storage
//!
//! This crate provides the in-memory chunk layer of the Alopex time series
//! storage engine: bit-level codecs for timestamps, values and flags, chunks
//! that pack one series' samples into a fixed-size buffer, running statistics
//! for pruning range queries, and an arena of reusable chunk slots.
//!
//! # Components
//!
//! - [`BitCursor`]: bit-granular reads and writes over a byte region
//! - [`SampleStreamWriter`] / [`SampleStreamReader`]: delta, XOR and varint coding
//! - [`Chunk`] / [`ChunkReader`]: append-until-full storage for one series
//! - [`RunningStatistics`]: mergeable per-chunk summary
//! - [`ChunkArena`]: fixed pool of chunk slots
//!
//! # Example
//!
//! ```rust
//! use alopex_chunk::{AppendStatus, ArenaConfig, Chunk, ChunkArena, Sample};
//!
//! let arena = ChunkArena::new(ArenaConfig::new(64 * 1024, 256));
//! let mut chunk = arena
//!     .allocate_chunk(1)
//!     .unwrap_or_else(|| Chunk::new(1, 256));
//!
//! for i in 0..10u64 {
//!     let sample = Sample::new(1, 1_000 + i * 10, 0.5 * i as f64, 0);
//!     if chunk.append(&sample)? == AppendStatus::Full {
//!         break;
//!     }
//! }
//!
//! let samples = chunk.read_all()?;
//! assert_eq!(samples.len(), 10);
//! # Ok::<(), alopex_chunk::ChunkError>(())
//! ```

#![deny(missing_docs)]

pub mod arena;
pub mod chunk;
pub mod codec;
pub mod error;
mod le;
pub mod meas;
pub mod stats;

pub use arena::{
    ArenaConfig, ArenaSlot, ChunkArena, DEFAULT_ARENA_BYTES, DEFAULT_CHUNK_BUFFER_SIZE,
};
pub use chunk::{
    Chunk, ChunkHeader, ChunkMemory, ChunkReader, CHUNK_HEADER_SIZE, CHUNK_MAGIC, CHUNK_VERSION,
    MAX_CHUNK_BUFFER_SIZE,
};
pub use codec::{AppendStatus, BitCursor, SampleStreamReader, SampleStreamWriter};
pub use error::{ChunkError, Result};
pub use meas::{Flag, Sample, SeriesId, Time};
pub use stats::{RunningStatistics, STATS_BLOCK_SIZE};
