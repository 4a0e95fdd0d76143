//! Measurement compression.
//!
//! A chunk's buffer holds one bit stream in which every sample after the
//! first is stored as three consecutive bit groups:
//!
//! ```text
//! ┌──────────────┬──────────────────────┬───────────────┐
//! │ time delta   │ value XOR            │ flag varint   │
//! │ 10..36 bits  │ 1 | 2+n | 13+n bits  │ 1..5 bytes    │
//! └──────────────┴──────────────────────┴───────────────┘
//! ```
//!
//! - [`TimestampEncoder`]: prefix-bucketed delta from the previous timestamp
//! - [`ValueEncoder`]: Gorilla XOR with leading/trailing-zero window reuse
//! - [`FlagEncoder`]: LEB128 varint
//!
//! [`SampleStreamWriter`] drives all three against one [`BitCursor`] and makes
//! each append atomic; [`SampleStreamReader`] undoes it.

pub mod bits;
pub mod flag;
pub mod stream;
pub mod timestamp;
pub mod value;

pub use bits::BitCursor;
pub use flag::{varint_len, FlagDecoder, FlagEncoder};
pub use stream::{AppendStatus, SampleStreamReader, SampleStreamWriter};
pub use timestamp::{DeltaCode, TimestampDecoder, TimestampEncoder};
pub use value::{ValueDecoder, ValueEncoder};
