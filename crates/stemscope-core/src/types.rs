//! Common types for Stemscope
//!
//! This module contains the fundamental value types used throughout the
//! engine: the instrument taxonomy, per-song channel counts, and the track
//! layout types consumed by the partitioner and render pipeline.

use serde::{Deserialize, Serialize};

/// Number of distinct instrument parts a song can declare
pub const NUM_INSTRUMENTS: usize = 7;

/// Instrument part identifiers, in canonical layout order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Instrument {
    Drums = 0,
    Bass = 1,
    Guitar = 2,
    Vocals = 3,
    Keys = 4,
    Backing = 5,
    Crowd = 6,
}

impl Instrument {
    /// All instruments in canonical layout order
    pub const ALL: [Instrument; NUM_INSTRUMENTS] = [
        Instrument::Drums,
        Instrument::Bass,
        Instrument::Guitar,
        Instrument::Vocals,
        Instrument::Keys,
        Instrument::Backing,
        Instrument::Crowd,
    ];

    /// Get the display name of this instrument
    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Drums => "Drums",
            Instrument::Bass => "Bass",
            Instrument::Guitar => "Guitar",
            Instrument::Vocals => "Vocals",
            Instrument::Keys => "Keys",
            Instrument::Backing => "Backing",
            Instrument::Crowd => "Crowd",
        }
    }
}

/// Per-instrument channel counts declared by a song
///
/// Supplied once per loaded song, absent for plain stereo/mono audio files
/// with no instrument metadata. `backing` is the *effective* backing channel
/// count, already computed by the song model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentChannelCounts {
    /// Drums channel count (0, 2, 3, 4, 5, or 6)
    pub drums: u8,
    /// Bass channel count (0, 1, or 2)
    pub bass: u8,
    /// Guitar channel count (0, 1, or 2)
    pub guitar: u8,
    /// Vocals channel count (0, 1, or 2)
    pub vocals: u8,
    /// Keys channel count (0, 1, or 2)
    pub keys: u8,
    /// Effective backing channel count (0, 1, or 2)
    pub backing: u8,
    /// Crowd channel count (0, 1, or 2)
    pub crowd: u8,
}

impl InstrumentChannelCounts {
    /// Get the declared channel count for one instrument
    pub fn count(&self, instrument: Instrument) -> u8 {
        match instrument {
            Instrument::Drums => self.drums,
            Instrument::Bass => self.bass,
            Instrument::Guitar => self.guitar,
            Instrument::Vocals => self.vocals,
            Instrument::Keys => self.keys,
            Instrument::Backing => self.backing,
            Instrument::Crowd => self.crowd,
        }
    }

    /// Total declared channels across all instruments
    pub fn total(&self) -> usize {
        Instrument::ALL
            .iter()
            .map(|&i| self.count(i) as usize)
            .sum()
    }
}

/// One named track band in the composite, with its stereo flag
///
/// Produced by the layout resolver in a fixed total order that every
/// downstream stage relies on; the list is never reordered or deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    /// Display name ("Drums (Kick)", "Bass", "chan. 3", ...)
    pub name: String,
    /// True if this track consumes two raw channels
    pub is_stereo: bool,
}

impl TrackSpec {
    /// Create a mono track spec
    pub fn mono(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_stereo: false,
        }
    }

    /// Create a stereo track spec
    pub fn stereo(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_stereo: true,
        }
    }

    /// Number of raw channels this track consumes (1 or 2)
    #[inline]
    pub fn channel_width(&self) -> usize {
        if self.is_stereo {
            2
        } else {
            1
        }
    }
}

/// The raw channel indices feeding one track
///
/// Assigned by walking the arranged index list in track order, consuming one
/// index for mono tracks and two for stereo tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAssignment {
    /// The track this assignment feeds
    pub spec: TrackSpec,
    /// Left (or only) raw channel index in the decoded stream
    pub left: usize,
    /// Right raw channel index, present for stereo tracks
    pub right: Option<usize>,
}

impl ChannelAssignment {
    /// Create a mono assignment
    pub fn mono(spec: TrackSpec, channel: usize) -> Self {
        Self {
            spec,
            left: channel,
            right: None,
        }
    }

    /// Create a stereo assignment
    pub fn stereo(spec: TrackSpec, left: usize, right: usize) -> Self {
        Self {
            spec,
            left,
            right: Some(right),
        }
    }

    /// The raw channel indices of this assignment, in order
    pub fn channel_indices(&self) -> Vec<usize> {
        match self.right {
            Some(right) => vec![self.left, right],
            None => vec![self.left],
        }
    }

    /// Number of raw channels consumed (1 or 2)
    #[inline]
    pub fn channel_width(&self) -> usize {
        if self.right.is_some() {
            2
        } else {
            1
        }
    }
}

/// Container family of an input, used for canonical channel arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Multi-channel song payload extracted from a song container
    SongArchive,
    /// A plain encoded audio file with no container
    PlainAudio,
}
