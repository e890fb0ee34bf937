//! Stream decode collaborator
//!
//! Decodes an extracted audio payload into planar per-channel buffers using
//! Symphonia. Keeping the whole stream in memory makes channel-subset
//! sub-streams cheap views: splitting never re-decodes, and a `SubStream`
//! handle is released the moment it goes out of scope.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Decode failures
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a decodable audio format
    #[error("unsupported audio payload: {0}")]
    Unsupported(String),

    /// The container holds no audio track
    #[error("no decodable audio track in payload")]
    NoAudioTrack,

    /// The payload decoded to zero frames
    #[error("payload decoded to zero frames")]
    EmptyStream,

    /// A sub-stream split referenced a channel that does not exist
    #[error("channel index {index} out of range for {channels}-channel stream")]
    BadChannelIndex { index: usize, channels: usize },

    /// Sub-streams carry one or two channels only
    #[error("sub-stream must take 1 or 2 channels, got {0}")]
    BadSplitWidth(usize),
}

/// A fully decoded multi-channel stream, planar in memory
#[derive(Debug)]
pub struct DecodedStream {
    /// One buffer per raw channel, all the same length
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedStream {
    /// Decode an audio payload (OGG Vorbis, WAV, ...) into planar buffers.
    ///
    /// `extension` is an optional probe hint taken from the input file name.
    pub fn open(bytes: Vec<u8>, extension: Option<&str>) -> Result<Self, DecodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    log::warn!("error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("error decoding packet: {}", e);
                    continue;
                }
            };

            let spec = *decoded.spec();
            if sample_buf.is_none() {
                sample_rate = spec.rate;
                channels = vec![Vec::new(); spec.channels.count()];
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }

            if let Some(ref mut buf) = sample_buf {
                buf.copy_interleaved_ref(decoded);
                let channel_count = channels.len();
                for frame in buf.samples().chunks_exact(channel_count) {
                    for (channel, &sample) in channels.iter_mut().zip(frame) {
                        channel.push(sample);
                    }
                }
            }
        }

        if channels.is_empty() || channels[0].is_empty() {
            return Err(DecodeError::EmptyStream);
        }

        log::debug!(
            "decoded stream: {} channels, {} Hz, {} frames",
            channels.len(),
            sample_rate,
            channels[0].len()
        );

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Build a stream from already-decoded planar buffers.
    ///
    /// All channel buffers must have the same length.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(
            channels.windows(2).all(|w| w[0].len() == w[1].len()),
            "planar channels must have equal lengths"
        );
        Self {
            channels,
            sample_rate,
        }
    }

    /// Number of raw channels in the stream
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the stream in frames (samples per channel)
    pub fn len_frames(&self) -> u64 {
        self.channels.first().map(|c| c.len() as u64).unwrap_or(0)
    }

    /// Total sample count across all channels
    pub fn total_samples(&self) -> u64 {
        self.len_frames() * self.channel_count() as u64
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len_frames() as f64 / self.sample_rate as f64
    }

    /// Derive a sub-stream view restricted to the given channel indices.
    ///
    /// No audio is copied or re-decoded; the view borrows the planar
    /// buffers and is released when dropped.
    pub fn split(&self, indices: &[usize]) -> Result<SubStream<'_>, DecodeError> {
        if indices.is_empty() || indices.len() > 2 {
            return Err(DecodeError::BadSplitWidth(indices.len()));
        }
        let mut channels = Vec::with_capacity(indices.len());
        for &index in indices {
            let channel = self.channels.get(index).ok_or(DecodeError::BadChannelIndex {
                index,
                channels: self.channel_count(),
            })?;
            channels.push(channel.as_slice());
        }
        Ok(SubStream {
            channels,
            sample_rate: self.sample_rate,
        })
    }
}

/// A borrowed view of one or two channels of a decoded stream
#[derive(Debug)]
pub struct SubStream<'a> {
    channels: Vec<&'a [f32]>,
    sample_rate: u32,
}

impl<'a> SubStream<'a> {
    /// Number of channels in this view (1 or 2)
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in frames
    pub fn len_frames(&self) -> u64 {
        self.channels.first().map(|c| c.len() as u64).unwrap_or(0)
    }

    /// One channel's samples
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        self.channels[index]
    }
}

/// Build an in-memory PCM16 WAV payload from planar channel data (test
/// fixture). Streams with more than two channels get a WAVE_FORMAT_EXTENSIBLE
/// fmt chunk with a positional channel mask, as multi-channel writers emit.
#[cfg(test)]
pub(crate) fn wav_bytes(channels: &[Vec<i16>], sample_rate: u32) -> Vec<u8> {
    const PCM_SUBFORMAT: [u8; 16] = [
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38,
        0x9B, 0x71,
    ];

    let num_channels = channels.len() as u16;
    let frames = channels.first().map(|c| c.len()).unwrap_or(0);
    let data_size = (frames * channels.len() * 2) as u32;
    let extensible = num_channels > 2;
    let fmt_size: u32 = if extensible { 40 } else { 16 };

    let mut bytes = Vec::with_capacity(28 + fmt_size as usize + data_size as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(20 + fmt_size + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&fmt_size.to_le_bytes());
    let format_tag: u16 = if extensible { 0xFFFE } else { 1 };
    bytes.extend_from_slice(&format_tag.to_le_bytes());
    bytes.extend_from_slice(&num_channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * num_channels as u32 * 2).to_le_bytes());
    bytes.extend_from_slice(&(num_channels * 2).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    if extensible {
        bytes.extend_from_slice(&22u16.to_le_bytes()); // cbSize
        bytes.extend_from_slice(&16u16.to_le_bytes()); // valid bits
        bytes.extend_from_slice(&((1u32 << num_channels) - 1).to_le_bytes()); // channel mask
        bytes.extend_from_slice(&PCM_SUBFORMAT);
    }
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    for frame in 0..frames {
        for channel in channels {
            bytes.extend_from_slice(&channel[frame].to_le_bytes());
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_wav_payload() {
        // 4-channel ramp, 100 frames
        let channels: Vec<Vec<i16>> = (0..4)
            .map(|c| (0..100).map(|i| (c * 1000 + i) as i16).collect())
            .collect();
        let stream = DecodedStream::open(wav_bytes(&channels, 44100), Some("wav")).unwrap();

        assert_eq!(stream.channel_count(), 4);
        assert_eq!(stream.sample_rate(), 44100);
        assert_eq!(stream.len_frames(), 100);
        assert_eq!(stream.total_samples(), 400);

        // De-interleaving kept channels apart
        let sub = stream.split(&[2]).unwrap();
        assert!((sub.channel(0)[0] - 2000.0 / 32768.0).abs() < 1e-3);
    }

    #[test]
    fn test_open_garbage_fails() {
        let err = DecodedStream::open(vec![0u8; 64], None).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported(_)));
    }

    #[test]
    fn test_split_views() {
        let stream = DecodedStream::from_planar(
            vec![vec![0.1; 50], vec![0.2; 50], vec![0.3; 50]],
            48000,
        );

        let mono = stream.split(&[1]).unwrap();
        assert_eq!(mono.channel_count(), 1);
        assert_eq!(mono.len_frames(), 50);
        assert!((mono.channel(0)[0] - 0.2).abs() < f32::EPSILON);

        let stereo = stream.split(&[2, 0]).unwrap();
        assert_eq!(stereo.channel_count(), 2);
        assert!((stereo.channel(0)[0] - 0.3).abs() < f32::EPSILON);
        assert!((stereo.channel(1)[0] - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_split_rejects_bad_requests() {
        let stream = DecodedStream::from_planar(vec![vec![0.0; 10]; 2], 48000);
        assert!(matches!(
            stream.split(&[]).unwrap_err(),
            DecodeError::BadSplitWidth(0)
        ));
        assert!(matches!(
            stream.split(&[0, 1, 0]).unwrap_err(),
            DecodeError::BadSplitWidth(3)
        ));
        assert!(matches!(
            stream.split(&[5]).unwrap_err(),
            DecodeError::BadChannelIndex { index: 5, channels: 2 }
        ));
    }

    #[test]
    fn test_duration() {
        let stream = DecodedStream::from_planar(vec![vec![0.0; 48000]], 48000);
        assert!((stream.duration_seconds() - 1.0).abs() < 1e-9);
    }
}
