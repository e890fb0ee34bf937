//! Sub-stream partitioner
//!
//! Walks the resolved track layout in order, assigning raw channel indices
//! from the arranged index list: one index per mono track, two per stereo
//! track. Leftover indices are tolerated (logged, the engine proceeds with
//! the assigned set); running out of indices is a `ChannelCountMismatch`.

use crate::error::LayoutError;
use crate::types::{ChannelAssignment, TrackSpec};

/// Assign arranged channel indices to the tracks of a layout.
///
/// If `layout` is empty (no instrument metadata), falls back to one mono
/// assignment per raw index, labeled "chan. i". True stereo pairings of the
/// native mapping are not recoverable in that case and are intentionally not
/// guessed; each physical channel gets its own band.
pub fn partition(
    arranged: &[usize],
    layout: &[TrackSpec],
) -> Result<Vec<ChannelAssignment>, LayoutError> {
    if layout.is_empty() {
        return Ok(arranged
            .iter()
            .enumerate()
            .map(|(i, &channel)| {
                ChannelAssignment::mono(TrackSpec::mono(format!("chan. {}", i)), channel)
            })
            .collect());
    }

    let mut assignments = Vec::with_capacity(layout.len());
    let mut cursor = 0usize;

    for spec in layout {
        let width = spec.channel_width();
        if cursor + width > arranged.len() {
            return Err(LayoutError::ChannelCountMismatch {
                needed: crate::layout::channel_width(layout),
                available: arranged.len(),
            });
        }
        let assignment = if spec.is_stereo {
            ChannelAssignment::stereo(spec.clone(), arranged[cursor], arranged[cursor + 1])
        } else {
            ChannelAssignment::mono(spec.clone(), arranged[cursor])
        };
        assignments.push(assignment);
        cursor += width;
    }

    if cursor < arranged.len() {
        log::warn!(
            "{} of {} arranged channels unused by the track layout",
            arranged.len() - cursor,
            arranged.len()
        );
    }

    Ok(assignments)
}
