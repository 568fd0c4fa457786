//! ED2 stream description.
//!
//! An ED2 system is carried over 1..=16 parallel streams; each stream
//! announces the total count, its own index, the system frame rate and its
//! DE program config and compression. The owning record keeps a received
//! bitmap so a system split across streams can be assembled from several
//! independent reads.

use crate::utils::errors::ModelError;

pub const MAX_ED2_STREAMS: usize = 16;

/// Video frame rates. On the wire the code is the enum value plus one,
/// because 0 is reserved; only rates up to 30 fps are valid for ED2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameRate {
    #[default]
    Fps2398 = 0,
    Fps2400 = 1,
    Fps2500 = 2,
    Fps2997 = 3,
    Fps3000 = 4,
    Fps5000 = 5,
    Fps5994 = 6,
    Fps6000 = 7,
    Fps10000 = 8,
    Fps11988 = 9,
    Fps12000 = 10,
}

impl FrameRate {
    pub const LAST_VALID: u8 = FrameRate::Fps12000 as u8;
    const LAST_ED2: u8 = FrameRate::Fps3000 as u8;

    pub fn from_code(code: u8) -> Option<Self> {
        (code <= Self::LAST_VALID)
            .then(|| unsafe { std::mem::transmute::<u8, FrameRate>(code) })
    }

    /// ED2 only runs at film and broadcast rates up to 30 fps.
    pub fn valid_for_ed2(self) -> bool {
        (self as u8) <= Self::LAST_ED2
    }
}

/// DE program config, 5-bit coded, 0..=23 valid.
pub const MAX_DE_PROGRAM_CONFIG: u8 = 23;

/// DE compression, 3-bit coded; 0 means none, 1..=7 step the bit-allocation
/// reduction from 97.5% down to 82.5%.
pub const MAX_DE_COMPRESSION: u8 = 7;

/// Per-stream description within an ED2 system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ed2Stream {
    pub config: u8,
    pub compression: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub count: u8,
    pub rate: FrameRate,
    pub streams: [Ed2Stream; MAX_ED2_STREAMS],
    received: u16,
}

impl StreamDescription {
    pub fn new(count: u8, rate: FrameRate) -> Result<Self, ModelError> {
        if count == 0 || count as usize > MAX_ED2_STREAMS {
            return Err(ModelError::OutOfRange {
                what: "ED2 stream count",
                value: count as f64,
                min: 1.0,
                max: MAX_ED2_STREAMS as f64,
            });
        }
        if !rate.valid_for_ed2() {
            return Err(ModelError::OutOfRange {
                what: "ED2 frame rate code",
                value: rate as u8 as f64,
                min: 0.0,
                max: 4.0,
            });
        }
        Ok(Self {
            count,
            rate,
            streams: [Ed2Stream::default(); MAX_ED2_STREAMS],
            received: 0,
        })
    }

    /// Record one stream's description; `index` < `count`.
    pub fn set_stream(&mut self, index: u8, stream: Ed2Stream) -> Result<(), ModelError> {
        if index >= self.count {
            return Err(ModelError::OutOfRange {
                what: "ED2 stream index",
                value: index as f64,
                min: 0.0,
                max: (self.count - 1) as f64,
            });
        }
        if stream.config > MAX_DE_PROGRAM_CONFIG {
            return Err(ModelError::OutOfRange {
                what: "DE program config",
                value: stream.config as f64,
                min: 0.0,
                max: MAX_DE_PROGRAM_CONFIG as f64,
            });
        }
        self.streams[index as usize] = stream;
        self.received |= 1 << index;
        Ok(())
    }

    pub fn received(&self, index: u8) -> bool {
        self.received & (1 << index) != 0
    }

    /// All `count` streams have been described.
    pub fn complete(&self) -> bool {
        self.received.count_ones() as u8 >= self.count
    }
}
