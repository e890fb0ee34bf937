//! Composition assembler
//!
//! Stacks per-track waveform bitmaps top-to-bottom into the final composite.
//! The builder is an explicit value threaded through the pipeline: created
//! per file, filled in resolver order, consumed by `finish`. A failed render
//! drops the builder, so no half-built canvas outlives it.
//!
//! Labels are carried as overlay data (text plus inset position) rather than
//! rasterized into the bitmap; the interactive shell draws them, and their
//! visibility can be toggled without touching any bitmap.

use image::{imageops, Rgba, RgbaImage};

use crate::types::TrackSpec;

/// 1-px outline color between bands
pub const COLOR_OUTLINE: Rgba<u8> = Rgba([90, 90, 90, 255]);

/// Label inset from a band's top-left corner, in pixels
pub const LABEL_INSET: (u32, u32) = (3, 3);

/// One rendered track band, positioned in the composite
#[derive(Debug, Clone)]
pub struct RenderedTrack {
    pub spec: TrackSpec,
    pub bitmap: RgbaImage,
    pub top_offset_px: u32,
    pub height_px: u32,
}

/// A track label overlay, positioned in composite coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLabel {
    pub text: String,
    pub x: u32,
    pub y: u32,
}

/// Band geometry retained on the composite for the shell and for
/// partition-stability checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandGeometry {
    pub name: String,
    pub is_stereo: bool,
    pub top: u32,
    pub height: u32,
}

/// File facts shown in the legend strip
#[derive(Debug, Clone, PartialEq)]
pub struct LegendInfo {
    pub file_name: String,
    pub channel_count: usize,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub payload_bytes: usize,
}

impl LegendInfo {
    /// Duration as "m:ss"
    pub fn duration_display(&self) -> String {
        let total = self.duration_seconds.round() as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }

    /// Payload size as "x.xx MB" or "x.xx KB"
    pub fn size_display(&self) -> String {
        if self.payload_bytes >= 1_048_576 {
            format!("{} MB", (self.payload_bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0)
        } else {
            format!("{} KB", (self.payload_bytes as f64 / 1024.0 * 100.0).round() / 100.0)
        }
    }

    /// The one-line file info summary
    pub fn summary(&self) -> String {
        format!(
            "Channels: {}   |   Sample rate: {} Hz   |   Length: {:.2} seconds ({})   |   File size: {} bytes ({})",
            self.channel_count,
            self.sample_rate,
            self.duration_seconds,
            self.duration_display(),
            self.payload_bytes,
            self.size_display(),
        )
    }
}

/// The final stacked image for one input file
#[derive(Debug, Clone)]
pub struct CompositeImage {
    /// The stacked waveform bands
    pub image: RgbaImage,
    /// Per-band label overlays, in band order
    pub labels: Vec<TrackLabel>,
    /// Band geometry, in band order
    pub bands: Vec<BandGeometry>,
    /// File facts for the legend strip, when available
    pub legend: Option<LegendInfo>,
}

impl CompositeImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Partition a canvas height into band heights.
///
/// Each band gets `canvas_height / total units` per unit of channel width
/// (stereo bands span two units); the integer-division remainder is absorbed
/// by the final band so the heights always sum exactly to `canvas_height`.
pub fn band_heights(canvas_height: u32, multipliers: &[u32]) -> Vec<u32> {
    let units: u32 = multipliers.iter().sum();
    if units == 0 {
        return Vec::new();
    }
    let unit_height = canvas_height / units;
    let mut heights: Vec<u32> = multipliers.iter().map(|&m| unit_height * m).collect();
    let used: u32 = heights.iter().sum();
    if let Some(last) = heights.last_mut() {
        *last += canvas_height - used;
    }
    heights
}

/// Builder for one composite, filled in resolver order
#[derive(Debug)]
pub struct CompositeBuilder {
    canvas_width: u32,
    outline: bool,
    tracks: Vec<RenderedTrack>,
    cursor_y: u32,
}

impl CompositeBuilder {
    /// Start a composite of the given width
    pub fn new(canvas_width: u32) -> Self {
        Self {
            canvas_width,
            outline: false,
            tracks: Vec::new(),
            cursor_y: 0,
        }
    }

    /// Draw a 1-px outline around every band except the last
    pub fn with_outline(mut self, outline: bool) -> Self {
        self.outline = outline;
        self
    }

    /// Stack a rendered band below the previous one.
    ///
    /// The bitmap must be exactly canvas-width wide; bands are never scaled
    /// horizontally.
    pub fn push_track(&mut self, spec: TrackSpec, bitmap: RgbaImage) {
        debug_assert_eq!(bitmap.width(), self.canvas_width, "band width mismatch");
        let height = bitmap.height();
        self.tracks.push(RenderedTrack {
            spec,
            bitmap,
            top_offset_px: self.cursor_y,
            height_px: height,
        });
        self.cursor_y += height;
    }

    /// Number of bands pushed so far
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Assemble the composite: exactly canvas-width wide, exactly as tall as
    /// the sum of band heights.
    pub fn finish(self, legend: Option<LegendInfo>) -> CompositeImage {
        let total_height = self.cursor_y.max(1);
        let mut image = RgbaImage::new(self.canvas_width.max(1), total_height);

        let mut labels = Vec::with_capacity(self.tracks.len());
        let mut bands = Vec::with_capacity(self.tracks.len());
        let last = self.tracks.len().saturating_sub(1);

        for (index, track) in self.tracks.into_iter().enumerate() {
            imageops::replace(&mut image, &track.bitmap, 0, track.top_offset_px as i64);

            if self.outline && index < last {
                draw_outline(
                    &mut image,
                    track.top_offset_px,
                    track.height_px,
                    self.canvas_width,
                );
            }

            // Unnamed bands (plain stereo/mono fast path) carry no label
            if !track.spec.name.is_empty() {
                labels.push(TrackLabel {
                    text: track.spec.name.clone(),
                    x: LABEL_INSET.0,
                    y: track.top_offset_px + LABEL_INSET.1,
                });
            }
            bands.push(BandGeometry {
                name: track.spec.name,
                is_stereo: track.spec.is_stereo,
                top: track.top_offset_px,
                height: track.height_px,
            });
        }

        CompositeImage {
            image,
            labels,
            bands,
            legend,
        }
    }
}

fn draw_outline(image: &mut RgbaImage, top: u32, height: u32, width: u32) {
    if width == 0 || height == 0 {
        return;
    }
    let bottom = top + height - 1;
    for x in 0..width {
        image.put_pixel(x, top, COLOR_OUTLINE);
        image.put_pixel(x, bottom, COLOR_OUTLINE);
    }
    for y in top..=bottom {
        image.put_pixel(0, y, COLOR_OUTLINE);
        image.put_pixel(width - 1, y, COLOR_OUTLINE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::COLOR_BACKGROUND;

    fn band(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, COLOR_BACKGROUND)
    }

    #[test]
    fn test_band_heights_sum_to_canvas() {
        // drums(kick m, snare m, kit s), bass s, vocals m, backing s on 600px
        let heights = band_heights(600, &[1, 1, 2, 2, 1, 2]);
        assert_eq!(heights.iter().sum::<u32>(), 600);
        assert_eq!(heights[0], 66);
        assert_eq!(heights[2], 132);
        // Remainder lands in the last band
        assert_eq!(*heights.last().unwrap(), 600 - 66 - 66 - 132 - 132 - 66);
    }

    #[test]
    fn test_band_heights_single_stereo_takes_all() {
        assert_eq!(band_heights(480, &[2]), vec![480]);
        assert!(band_heights(480, &[]).is_empty());
    }

    #[test]
    fn test_composite_dimensions_and_geometry() {
        let mut builder = CompositeBuilder::new(200);
        builder.push_track(TrackSpec::mono("Drums (Kick)"), band(200, 50));
        builder.push_track(TrackSpec::stereo("Drums (Kit)"), band(200, 100));
        builder.push_track(TrackSpec::stereo("Bass"), band(200, 102));
        let composite = builder.finish(None);

        assert_eq!(composite.width(), 200);
        assert_eq!(composite.height(), 252);
        assert_eq!(composite.bands.len(), 3);
        assert_eq!(composite.bands[1].top, 50);
        assert_eq!(composite.bands[2].top, 150);
        assert_eq!(composite.bands[2].height, 102);
        assert!(composite.bands[2].is_stereo);
    }

    #[test]
    fn test_labels_at_fixed_inset() {
        let mut builder = CompositeBuilder::new(64);
        builder.push_track(TrackSpec::mono("Vocals"), band(64, 40));
        builder.push_track(TrackSpec::mono("Crowd"), band(64, 40));
        let composite = builder.finish(None);

        assert_eq!(
            composite.labels,
            vec![
                TrackLabel {
                    text: "Vocals".into(),
                    x: 3,
                    y: 3
                },
                TrackLabel {
                    text: "Crowd".into(),
                    x: 3,
                    y: 43
                },
            ]
        );
    }

    #[test]
    fn test_outline_on_all_but_last() {
        let mut builder = CompositeBuilder::new(32).with_outline(true);
        builder.push_track(TrackSpec::mono("Bass"), band(32, 20));
        builder.push_track(TrackSpec::mono("Keys"), band(32, 20));
        let composite = builder.finish(None);

        // First band's bottom edge is outlined
        assert_eq!(*composite.image.get_pixel(16, 19), COLOR_OUTLINE);
        assert_eq!(*composite.image.get_pixel(0, 10), COLOR_OUTLINE);
        // Last band is not
        assert_eq!(*composite.image.get_pixel(16, 39), COLOR_BACKGROUND);
    }

    #[test]
    fn test_no_outline_by_default() {
        let mut builder = CompositeBuilder::new(32);
        builder.push_track(TrackSpec::mono("Bass"), band(32, 20));
        builder.push_track(TrackSpec::mono("Keys"), band(32, 20));
        let composite = builder.finish(None);
        assert_eq!(*composite.image.get_pixel(16, 19), COLOR_BACKGROUND);
    }

    #[test]
    fn test_legend_summary() {
        let legend = LegendInfo {
            file_name: "take5.ogg".into(),
            channel_count: 10,
            sample_rate: 44100,
            duration_seconds: 215.0,
            payload_bytes: 2_097_152,
        };
        assert_eq!(legend.duration_display(), "3:35");
        assert_eq!(legend.size_display(), "2 MB");
        let summary = legend.summary();
        assert!(summary.contains("Channels: 10"));
        assert!(summary.contains("44100 Hz"));
        assert!(summary.contains("(3:35)"));
    }
}
