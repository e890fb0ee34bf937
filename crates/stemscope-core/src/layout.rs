//! Track layout resolver
//!
//! Maps a song's declared per-instrument channel counts into the ordered
//! list of named tracks with stereo flags. The order is a contract: drums
//! subparts first, then Bass, Guitar, Vocals, Keys, Backing, Crowd. Every
//! downstream stage (partitioner, render pipeline, assembler) consumes the
//! list in this order and must never see it reordered.

use crate::error::LayoutError;
use crate::types::{Instrument, InstrumentChannelCounts, TrackSpec};

/// Drums decomposition rules, one row per recognized channel count.
///
/// Each row lists the drums subparts as (name, is_stereo) pairs whose widths
/// sum to the declared count.
const DRUMS_SCHEMES: &[(u8, &[(&str, bool)])] = &[
    (0, &[]),
    (2, &[("Drums", true)]),
    (3, &[("Drums (Kick)", false), ("Drums (Kit)", true)]),
    (
        4,
        &[
            ("Drums (Kick)", false),
            ("Drums (Snare)", false),
            ("Drums (Kit)", true),
        ],
    ),
    (
        5,
        &[
            ("Drums (Kick)", false),
            ("Drums (Snare)", true),
            ("Drums (Kit)", true),
        ],
    ),
    (
        6,
        &[
            ("Drums (Kick)", true),
            ("Drums (Snare)", true),
            ("Drums (Kit)", true),
        ],
    ),
];

/// Resolve instrument channel counts into the ordered track layout.
///
/// Returns an empty list when `counts` is absent (plain audio files); the
/// caller then falls back to per-raw-channel naming. Drums counts outside
/// the recognized schemes are an `UnrecognizedDrumsSchema` error, which the
/// pipeline treats as a fall-back-to-degenerate condition, never fatal.
pub fn resolve(
    counts: Option<&InstrumentChannelCounts>,
) -> Result<Vec<TrackSpec>, LayoutError> {
    let counts = match counts {
        Some(counts) => counts,
        None => return Ok(Vec::new()),
    };

    let drums_parts = DRUMS_SCHEMES
        .iter()
        .find(|(count, _)| *count == counts.drums)
        .map(|(_, parts)| *parts)
        .ok_or(LayoutError::UnrecognizedDrumsSchema(counts.drums))?;

    let mut layout: Vec<TrackSpec> = drums_parts
        .iter()
        .map(|&(name, is_stereo)| TrackSpec {
            name: name.to_string(),
            is_stereo,
        })
        .collect();

    // Remaining instruments follow the 0/1/2 rule: absent at 0, mono at 1,
    // stereo at 2. Out-of-range declarations contribute nothing; any
    // resulting channel shortfall is caught by the partitioner.
    for instrument in [
        Instrument::Bass,
        Instrument::Guitar,
        Instrument::Vocals,
        Instrument::Keys,
        Instrument::Backing,
        Instrument::Crowd,
    ] {
        match counts.count(instrument) {
            1 => layout.push(TrackSpec::mono(instrument.name())),
            2 => layout.push(TrackSpec::stereo(instrument.name())),
            _ => {}
        }
    }

    Ok(layout)
}

/// Total raw channels a layout consumes
pub fn channel_width(layout: &[TrackSpec]) -> usize {
    layout.iter().map(TrackSpec::channel_width).sum()
}
