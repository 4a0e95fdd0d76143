//! Sample stream: the three codecs sharing one bit cursor.

use super::bits::BitCursor;
use super::flag::{FlagDecoder, FlagEncoder};
use super::timestamp::{TimestampDecoder, TimestampEncoder};
use super::value::{ValueDecoder, ValueEncoder};
use crate::error::{ChunkError, Result};
use crate::meas::{Sample, SeriesId};

/// Outcome of an append that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendStatus {
    /// The sample was stored.
    Written,
    /// The stream has no room; the sample was not stored.
    Full,
}

impl AppendStatus {
    /// Returns true if the sample was stored.
    pub fn is_written(self) -> bool {
        self == Self::Written
    }
}

#[derive(Debug, Clone, Copy)]
struct Encoders {
    time: TimestampEncoder,
    value: ValueEncoder,
    flag: FlagEncoder,
}

impl Encoders {
    fn new(first: &Sample) -> Self {
        Self {
            time: TimestampEncoder::new(first.time),
            value: ValueEncoder::new(first.value),
            flag: FlagEncoder::new(),
        }
    }

    fn append<B>(&mut self, sample: &Sample, cursor: &mut BitCursor<B>) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.time.append(sample.time, cursor)?;
        self.value.append(sample.value, cursor)?;
        self.flag.append(sample.flag, cursor)
    }
}

/// Writes whole samples onto a bit cursor.
///
/// The first sample is kept aside uncompressed; every later sample is split
/// into a time delta, a value XOR and a flag varint. An append is all or
/// nothing: if any part fails, the cursor position, the bits behind it and
/// the codec states are restored.
#[derive(Debug)]
pub struct SampleStreamWriter<B> {
    cursor: BitCursor<B>,
    first: Option<Sample>,
    encoders: Option<Encoders>,
    is_full: bool,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> SampleStreamWriter<B> {
    /// Creates a writer; samples are encoded from the cursor's position on.
    pub fn new(cursor: BitCursor<B>) -> Self {
        Self {
            cursor,
            first: None,
            encoders: None,
            is_full: false,
        }
    }

    /// Appends a sample.
    ///
    /// Returns [`AppendStatus::Full`] once the cursor runs out of room; the
    /// writer stays full from then on. Samples the time codec cannot express
    /// are rejected with [`ChunkError::DeltaOutOfRange`] without marking the
    /// writer full.
    pub fn append(&mut self, sample: &Sample) -> Result<AppendStatus> {
        if self.is_full {
            return Ok(AppendStatus::Full);
        }

        let Some(encoders) = self.encoders.as_mut() else {
            self.first = Some(*sample);
            self.encoders = Some(Encoders::new(sample));
            self.is_full = self.cursor.is_full();
            return Ok(AppendStatus::Written);
        };

        let saved = *encoders;
        let mark = self.cursor.position();

        match encoders.append(sample, &mut self.cursor) {
            Ok(()) => {
                self.is_full = self.cursor.is_full();
                Ok(AppendStatus::Written)
            }
            Err(err) => {
                *encoders = saved;
                self.cursor.rewind(mark);
                match err {
                    ChunkError::CapacityExceeded { .. } => {
                        self.is_full = true;
                        Ok(AppendStatus::Full)
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Marks the stream full so that later appends are refused.
    pub fn seal(&mut self) {
        self.is_full = true;
    }
}

impl<B: AsRef<[u8]>> SampleStreamWriter<B> {
    /// Returns true once the writer refuses further samples.
    pub fn is_full(&self) -> bool {
        self.is_full
    }

    /// The first sample, once one has been appended.
    pub fn first(&self) -> Option<&Sample> {
        self.first.as_ref()
    }

    /// The shared cursor.
    pub fn cursor(&self) -> &BitCursor<B> {
        &self.cursor
    }

    /// The underlying region.
    pub fn get_ref(&self) -> &B {
        self.cursor.get_ref()
    }

    /// Mutable access to the underlying region, bypassing the cursor.
    pub(crate) fn get_mut(&mut self) -> &mut B {
        self.cursor.get_mut()
    }

    /// Consumes the writer and returns the region.
    pub fn into_inner(self) -> B {
        self.cursor.into_inner()
    }
}

/// Reads samples written by a [`SampleStreamWriter`].
///
/// The reader does not know how many samples the stream holds; callers bound
/// iteration with the stored count.
#[derive(Debug)]
pub struct SampleStreamReader<B> {
    cursor: BitCursor<B>,
    id: SeriesId,
    time: TimestampDecoder,
    value: ValueDecoder,
    flag: FlagDecoder,
}

impl<B: AsRef<[u8]>> SampleStreamReader<B> {
    /// Creates a reader for the samples that follow `first`.
    pub fn new(cursor: BitCursor<B>, first: &Sample) -> Self {
        Self {
            cursor,
            id: first.id,
            time: TimestampDecoder::new(first.time),
            value: ValueDecoder::new(first.value),
            flag: FlagDecoder::new(),
        }
    }

    /// Decodes the next sample in append order.
    pub fn read(&mut self) -> Result<Sample> {
        let time = self.time.read(&mut self.cursor)?;
        let value = self.value.read(&mut self.cursor)?;
        let flag = self.flag.read(&mut self.cursor)?;
        Ok(Sample::new(self.id, time, value, flag))
    }

    /// Current bit position of the underlying cursor.
    pub fn position(&self) -> u32 {
        self.cursor.position()
    }
}
