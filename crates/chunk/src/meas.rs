//! Measurement types shared by the codecs and chunks.

/// Timestamp in milliseconds.
pub type Time = u64;

/// Identifier of a time series.
pub type SeriesId = u64;

/// Per-sample flag word.
pub type Flag = u32;

/// Largest representable timestamp.
pub const MAX_TIME: Time = Time::MAX;

/// Smallest representable timestamp.
pub const MIN_TIME: Time = Time::MIN;

/// A single measurement of one series.
///
/// Equality compares the raw bit pattern of `value`, so `NaN` samples compare
/// equal to themselves and `0.0` differs from `-0.0`. That is the equality the
/// codecs preserve.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// Series the sample belongs to.
    pub id: SeriesId,
    /// Timestamp in milliseconds.
    pub time: Time,
    /// Measured value.
    pub value: f64,
    /// Flag word.
    pub flag: Flag,
}

impl Sample {
    /// Creates a new sample.
    pub fn new(id: SeriesId, time: Time, value: f64, flag: Flag) -> Self {
        Self {
            id,
            time,
            value,
            flag,
        }
    }

    /// Returns the all-zero sample.
    pub const fn zeroed() -> Self {
        Self {
            id: 0,
            time: 0,
            value: 0.0,
            flag: 0,
        }
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.time == other.time
            && self.value.to_bits() == other.value.to_bits()
            && self.flag == other.flag
    }
}

impl Eq for Sample {}
