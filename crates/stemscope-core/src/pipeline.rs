//! Per-file render pipeline
//!
//! Runs the full chain for one input: extract payload, decode, arrange
//! channels, resolve the track layout, partition, render each track, and
//! assemble the composite. A file either yields a finished composite or an
//! error; no partially built visual state ever escapes this module.

use std::path::Path;

use crate::arrange::ChannelArranger;
use crate::compose::{band_heights, CompositeBuilder, CompositeImage, LegendInfo};
use crate::config::ViewConfig;
use crate::decode::DecodedStream;
use crate::error::EngineError;
use crate::extract::{AudioPayload, PayloadExtractor};
use crate::layout;
use crate::partition::partition;
use crate::render::{position_to_frames, DrawMode, WaveformRenderer};
use crate::types::{ContainerKind, InstrumentChannelCounts, TrackSpec};

/// Render one input file into a composite
pub fn render_file(
    path: &Path,
    extractor: &dyn PayloadExtractor,
    arranger: &dyn ChannelArranger,
    renderer: &dyn WaveformRenderer,
    view: &ViewConfig,
) -> Result<CompositeImage, EngineError> {
    let payload = extractor.extract(path)?;
    render_payload(payload, arranger, renderer, view)
}

/// Render an already-extracted payload into a composite
pub fn render_payload(
    payload: AudioPayload,
    arranger: &dyn ChannelArranger,
    renderer: &dyn WaveformRenderer,
    view: &ViewConfig,
) -> Result<CompositeImage, EngineError> {
    let payload_bytes = payload.bytes.len();
    let extension = Path::new(&payload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_string());

    let stream = DecodedStream::open(payload.bytes, extension.as_deref())?;

    let legend = LegendInfo {
        file_name: payload.file_name,
        channel_count: stream.channel_count(),
        sample_rate: stream.sample_rate(),
        duration_seconds: stream.duration_seconds(),
        payload_bytes,
    };

    render_stream(
        &stream,
        payload.song.as_ref(),
        payload.container,
        legend,
        arranger,
        renderer,
        view,
    )
}

/// Render a decoded stream into a composite.
///
/// Exposed for hosts that decode elsewhere and hand the engine planar
/// buffers directly.
pub fn render_stream(
    stream: &DecodedStream,
    song: Option<&InstrumentChannelCounts>,
    container: ContainerKind,
    legend: LegendInfo,
    arranger: &dyn ChannelArranger,
    renderer: &dyn WaveformRenderer,
    view: &ViewConfig,
) -> Result<CompositeImage, EngineError> {
    let (wave_width, wave_height) = view.wave_area();
    let channel_count = stream.channel_count();
    let sample_rate = stream.sample_rate();

    // Plain mono/stereo streams draw a single unlabeled full-height band,
    // instrument metadata or not.
    if channel_count <= 2 {
        let indices: Vec<usize> = (0..channel_count).collect();
        let mode = if channel_count == 2 {
            DrawMode::Stereo
        } else {
            DrawMode::Mono
        };
        let sub = stream.split(&indices)?;
        let end_frame = position_to_frames(stream.total_samples(), channel_count as u32, sample_rate);
        let bitmap = renderer.render(
            &sub,
            mode,
            wave_width,
            wave_height,
            end_frame,
            view.high_quality,
        )?;

        let mut builder = CompositeBuilder::new(wave_width);
        builder.push_track(
            TrackSpec {
                name: String::new(),
                is_stereo: channel_count == 2,
            },
            bitmap,
        );
        return Ok(builder.finish(Some(legend)));
    }

    let arranged = arranger.arrange(channel_count, container);

    // Layout errors are never fatal: fall back to one band per raw channel
    let layout = match layout::resolve(song) {
        Ok(layout) => layout,
        Err(e) => {
            log::warn!("{}; falling back to per-channel bands", e);
            Vec::new()
        }
    };
    let layout = if layout::channel_width(&layout) > arranged.len() {
        log::warn!(
            "layout needs {} channels but the stream has {}; falling back to per-channel bands",
            layout::channel_width(&layout),
            arranged.len()
        );
        Vec::new()
    } else {
        layout
    };

    // Any overrun surviving the check above is an invariant violation and
    // surfaces as a stream-init-class failure.
    let assignments = partition(&arranged, &layout)?;

    let multipliers: Vec<u32> = assignments
        .iter()
        .map(|a| a.channel_width() as u32)
        .collect();
    let heights = band_heights(wave_height, &multipliers);

    let mut builder = CompositeBuilder::new(wave_width).with_outline(view.outline);

    for (assignment, &height) in assignments.iter().zip(&heights) {
        // Sub-stream handle lives exactly as long as this track's render
        let sub = stream.split(&assignment.channel_indices())?;

        let multiplier = assignment.channel_width() as u64;
        let position = stream.total_samples() / channel_count as u64 * multiplier;
        let end_frame = position_to_frames(position, multiplier as u32, sample_rate);

        let mode = if assignment.spec.is_stereo {
            DrawMode::Stereo
        } else {
            DrawMode::Mono
        };

        let bitmap = renderer.render(
            &sub,
            mode,
            wave_width,
            height,
            end_frame,
            view.high_quality,
        )?;
        builder.push_track(assignment.spec.clone(), bitmap);
    }

    log::info!(
        "composited {} track bands for '{}'",
        builder.track_count(),
        legend.file_name
    );
    Ok(builder.finish(Some(legend)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrange::CanonicalArranger;
    use crate::render::{PeakRenderer, RenderError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn planar_stream(channels: usize, frames: usize) -> DecodedStream {
        let data = (0..channels)
            .map(|c| {
                (0..frames)
                    .map(|i| ((c * 31 + i) % 100) as f32 / 100.0 - 0.5)
                    .collect()
            })
            .collect();
        DecodedStream::from_planar(data, 44100)
    }

    fn test_legend(channels: usize) -> LegendInfo {
        LegendInfo {
            file_name: "test.ogg".into(),
            channel_count: channels,
            sample_rate: 44100,
            duration_seconds: 1.0,
            payload_bytes: 1000,
        }
    }

    fn bare_view(width: u32, height: u32) -> ViewConfig {
        ViewConfig {
            show_legend: false,
            canvas_width: width,
            canvas_height: height,
            ..Default::default()
        }
    }

    /// Renderer that fails on its nth call
    struct FailingRenderer {
        fail_at: usize,
        calls: AtomicUsize,
    }

    impl WaveformRenderer for FailingRenderer {
        fn render(
            &self,
            stream: &crate::decode::SubStream<'_>,
            mode: DrawMode,
            width: u32,
            height: u32,
            end_frame: u64,
            high_quality: bool,
        ) -> Result<image::RgbaImage, RenderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call + 1 == self.fail_at {
                return Err(RenderError::EmptyStream);
            }
            PeakRenderer.render(stream, mode, width, height, end_frame, high_quality)
        }
    }

    #[test]
    fn test_instrumented_round_trip() {
        let counts = InstrumentChannelCounts {
            drums: 4,
            bass: 2,
            guitar: 0,
            vocals: 1,
            keys: 0,
            backing: 2,
            crowd: 0,
        };
        let stream = planar_stream(10, 44100);
        let composite = render_stream(
            &stream,
            Some(&counts),
            ContainerKind::SongArchive,
            test_legend(10),
            &CanonicalArranger,
            &PeakRenderer,
            &bare_view(300, 600),
        )
        .unwrap();

        // Track count matches the resolved layout, total height matches the
        // canvas, bands sit in resolver order
        assert_eq!(composite.bands.len(), 6);
        assert_eq!(composite.width(), 300);
        assert_eq!(composite.height(), 600);
        assert_eq!(
            composite.bands.iter().map(|b| b.height).sum::<u32>(),
            600
        );
        assert_eq!(composite.bands[0].name, "Drums (Kick)");
        assert_eq!(composite.bands[5].name, "Backing");
        assert!(composite.bands[2].is_stereo);
        // Stereo bands span twice the unit height
        assert_eq!(composite.bands[2].height, composite.bands[0].height * 2);
        assert_eq!(composite.labels.len(), 6);
    }

    #[test]
    fn test_pipeline_idempotence() {
        let counts = InstrumentChannelCounts {
            drums: 2,
            bass: 2,
            vocals: 1,
            ..Default::default()
        };
        let stream = planar_stream(5, 22050);
        let run = || {
            render_stream(
                &stream,
                Some(&counts),
                ContainerKind::SongArchive,
                test_legend(5),
                &CanonicalArranger,
                &PeakRenderer,
                &bare_view(200, 400),
            )
            .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.width(), b.width());
        assert_eq!(a.height(), b.height());
        assert_eq!(a.bands, b.bands);
    }

    #[test]
    fn test_plain_stereo_single_unlabeled_band() {
        let stream = planar_stream(2, 44100);
        let composite = render_stream(
            &stream,
            None,
            ContainerKind::PlainAudio,
            test_legend(2),
            &CanonicalArranger,
            &PeakRenderer,
            &bare_view(320, 240),
        )
        .unwrap();

        assert_eq!(composite.bands.len(), 1);
        assert!(composite.bands[0].is_stereo);
        assert_eq!(composite.bands[0].height, 240);
        assert!(composite.labels.is_empty());
    }

    #[test]
    fn test_degenerate_per_channel_fallback() {
        // No metadata on a 4-channel stream: one mono band per raw channel
        let stream = planar_stream(4, 22050);
        let composite = render_stream(
            &stream,
            None,
            ContainerKind::SongArchive,
            test_legend(4),
            &CanonicalArranger,
            &PeakRenderer,
            &bare_view(100, 400),
        )
        .unwrap();

        assert_eq!(composite.bands.len(), 4);
        assert!(composite.bands.iter().all(|b| !b.is_stereo));
        assert_eq!(composite.bands[3].name, "chan. 3");
        assert_eq!(composite.height(), 400);
    }

    #[test]
    fn test_count_mismatch_falls_back() {
        // Layout wants 9 channels but the stream only has 6
        let counts = InstrumentChannelCounts {
            drums: 4,
            bass: 2,
            vocals: 1,
            backing: 2,
            ..Default::default()
        };
        let stream = planar_stream(6, 22050);
        let composite = render_stream(
            &stream,
            Some(&counts),
            ContainerKind::SongArchive,
            test_legend(6),
            &CanonicalArranger,
            &PeakRenderer,
            &bare_view(100, 300),
        )
        .unwrap();

        assert_eq!(composite.bands.len(), 6);
        assert_eq!(composite.bands[0].name, "chan. 0");
    }

    #[test]
    fn test_unrecognized_drums_falls_back() {
        let counts = InstrumentChannelCounts {
            drums: 7,
            ..Default::default()
        };
        let stream = planar_stream(7, 22050);
        let composite = render_stream(
            &stream,
            Some(&counts),
            ContainerKind::SongArchive,
            test_legend(7),
            &CanonicalArranger,
            &PeakRenderer,
            &bare_view(100, 350),
        )
        .unwrap();
        assert_eq!(composite.bands.len(), 7);
    }

    #[test]
    fn test_render_failure_aborts_file() {
        let counts = InstrumentChannelCounts {
            drums: 4,
            bass: 2,
            vocals: 1,
            backing: 2,
            ..Default::default()
        };
        let stream = planar_stream(10, 22050);
        let renderer = FailingRenderer {
            fail_at: 3,
            calls: AtomicUsize::new(0),
        };
        let result = render_stream(
            &stream,
            Some(&counts),
            ContainerKind::SongArchive,
            test_legend(10),
            &CanonicalArranger,
            &renderer,
            &bare_view(100, 500),
        );
        assert!(matches!(result, Err(EngineError::Render(_))));
        // The failing call was the third of six tracks
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_legend_insets_shrink_wave_area() {
        let stream = planar_stream(2, 22050);
        let view = ViewConfig {
            show_legend: true,
            canvas_width: 400,
            canvas_height: 300,
            ..Default::default()
        };
        let composite = render_stream(
            &stream,
            None,
            ContainerKind::PlainAudio,
            test_legend(2),
            &CanonicalArranger,
            &PeakRenderer,
            &view,
        )
        .unwrap();
        assert_eq!(composite.width(), 400 - 2 * crate::config::LEGEND_HORIZONTAL_INSET);
        assert_eq!(composite.height(), 300 - 2 * crate::config::LEGEND_VERTICAL_INSET);
        assert_eq!(composite.legend.as_ref().unwrap().channel_count, 2);
    }
}
