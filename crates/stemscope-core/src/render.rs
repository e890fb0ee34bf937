//! Per-track waveform rendering
//!
//! Renders one sub-stream (one or two channels) into an RGBA bitmap of
//! min/max peak columns. Peaks are computed at a fixed time resolution and
//! then mapped onto pixel columns, so every track bitmap spans the same
//! wall-clock duration as the full mix regardless of its channel count.

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::decode::SubStream;

/// Seconds of audio per waveform peak cell (fixed resolution knob)
pub const FRAME_RESOLUTION: f64 = 0.01;

/// Band background
pub const COLOR_BACKGROUND: Rgba<u8> = Rgba([192, 192, 192, 255]);
/// Waveform body
pub const COLOR_WAVEFORM: Rgba<u8> = Rgba([50, 50, 200, 255]);
/// Zero-amplitude centerline
pub const COLOR_CENTERLINE: Rgba<u8> = Rgba([50, 50, 200, 255]);

/// Frame stride used when scanning peaks without the quality flag
const FAST_SCAN_STRIDE: usize = 8;

/// Vertical headroom factor within a band
const AMPLITUDE_SCALE: f32 = 0.9;

/// Waveform draw mode, matching the track's stereo flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// One centered band
    Mono,
    /// Two half-height bands, left on top
    Stereo,
}

/// Rendering failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The sub-stream holds no frames
    #[error("cannot render an empty stream")]
    EmptyStream,

    /// Degenerate bitmap dimensions
    #[error("render target must be at least 1x1, got {width}x{height}")]
    BadDimensions { width: u32, height: u32 },
}

/// Convert a sample position within a sub-stream into waveform frame cells.
///
/// `position_samples` counts samples across all `channels` of the
/// sub-stream; the result is the terminal cell index at the fixed
/// resolution, the unit `render` expects for `end_frame`.
pub fn position_to_frames(position_samples: u64, channels: u32, sample_rate: u32) -> u64 {
    if channels == 0 || sample_rate == 0 {
        return 0;
    }
    let frames = position_samples / channels as u64;
    let seconds = frames as f64 / sample_rate as f64;
    (seconds / FRAME_RESOLUTION).round() as u64
}

/// Waveform bitmap collaborator
pub trait WaveformRenderer: Send + Sync {
    /// Render a sub-stream into a `width` x `height` bitmap.
    ///
    /// The x axis spans `0..end_frame` peak cells; columns past the end of
    /// the actual audio stay at the background color. `high_quality` scans
    /// every sample when computing peaks instead of a fast stride.
    fn render(
        &self,
        stream: &SubStream<'_>,
        mode: DrawMode,
        width: u32,
        height: u32,
        end_frame: u64,
        high_quality: bool,
    ) -> Result<RgbaImage, RenderError>;
}

/// Default renderer: min/max peak columns with a centerline per band
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakRenderer;

impl PeakRenderer {
    /// Compute (min, max) peak cells at the fixed time resolution
    fn peak_cells(samples: &[f32], frames_per_cell: usize, stride: usize) -> Vec<(f32, f32)> {
        samples
            .chunks(frames_per_cell)
            .map(|cell| {
                let mut min = f32::INFINITY;
                let mut max = f32::NEG_INFINITY;
                for &sample in cell.iter().step_by(stride) {
                    min = min.min(sample);
                    max = max.max(sample);
                }
                if min.is_infinite() {
                    min = 0.0;
                }
                if max.is_infinite() {
                    max = 0.0;
                }
                (min, max)
            })
            .collect()
    }

    /// Draw one column's peak span into a band
    fn draw_column(
        image: &mut RgbaImage,
        x: u32,
        band_top: u32,
        band_height: u32,
        peak: (f32, f32),
    ) {
        let half = band_height as f32 / 2.0;
        let center = band_top as f32 + half;
        let y_top = center - peak.1.clamp(-1.0, 1.0) * half * AMPLITUDE_SCALE;
        let y_bottom = center - peak.0.clamp(-1.0, 1.0) * half * AMPLITUDE_SCALE;

        let band_end = band_top + band_height - 1;
        let y_top = (y_top.floor() as i64).clamp(band_top as i64, band_end as i64) as u32;
        let y_bottom = (y_bottom.ceil() as i64).clamp(band_top as i64, band_end as i64) as u32;

        for y in y_top..=y_bottom {
            image.put_pixel(x, y, COLOR_WAVEFORM);
        }
    }

    /// Draw the zero-amplitude centerline across a band
    fn draw_centerline(image: &mut RgbaImage, width: u32, band_top: u32, band_height: u32) {
        let y = band_top + band_height / 2;
        for x in 0..width {
            image.put_pixel(x, y, COLOR_CENTERLINE);
        }
    }
}

impl WaveformRenderer for PeakRenderer {
    fn render(
        &self,
        stream: &SubStream<'_>,
        mode: DrawMode,
        width: u32,
        height: u32,
        end_frame: u64,
        high_quality: bool,
    ) -> Result<RgbaImage, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::BadDimensions { width, height });
        }
        if stream.len_frames() == 0 {
            return Err(RenderError::EmptyStream);
        }

        let frames_per_cell =
            ((stream.sample_rate() as f64 * FRAME_RESOLUTION) as usize).max(1);
        let stride = if high_quality { 1 } else { FAST_SCAN_STRIDE };

        // Per drawn band: mono mixes down, stereo duplicates a lone channel
        let bands: Vec<Vec<(f32, f32)>> = match mode {
            DrawMode::Mono => {
                let mixed: Vec<f32> = if stream.channel_count() == 2 {
                    stream
                        .channel(0)
                        .iter()
                        .zip(stream.channel(1))
                        .map(|(&l, &r)| (l + r) / 2.0)
                        .collect()
                } else {
                    stream.channel(0).to_vec()
                };
                vec![Self::peak_cells(&mixed, frames_per_cell, stride)]
            }
            DrawMode::Stereo => {
                let left = Self::peak_cells(stream.channel(0), frames_per_cell, stride);
                let right = if stream.channel_count() == 2 {
                    Self::peak_cells(stream.channel(1), frames_per_cell, stride)
                } else {
                    left.clone()
                };
                vec![left, right]
            }
        };

        let end_frame = end_frame.max(1);
        let mut image = RgbaImage::from_pixel(width, height, COLOR_BACKGROUND);

        let band_count = bands.len() as u32;
        for (band_index, cells) in bands.iter().enumerate() {
            let band_height = height / band_count;
            let band_top = band_index as u32 * band_height;
            // Last band picks up the division remainder
            let band_height = if band_index as u32 == band_count - 1 {
                height - band_top
            } else {
                band_height
            };

            Self::draw_centerline(&mut image, width, band_top, band_height);

            for x in 0..width {
                let cell_lo = (x as u64 * end_frame / width as u64) as usize;
                let cell_hi = (((x as u64 + 1) * end_frame) / width as u64).max(
                    cell_lo as u64 + 1,
                ) as usize;
                if cell_lo >= cells.len() {
                    continue;
                }
                let cell_hi = cell_hi.min(cells.len());

                let mut min = f32::INFINITY;
                let mut max = f32::NEG_INFINITY;
                for &(lo, hi) in &cells[cell_lo..cell_hi] {
                    min = min.min(lo);
                    max = max.max(hi);
                }
                Self::draw_column(&mut image, x, band_top, band_height, (min, max));
            }
        }

        Ok(image)
    }
}
