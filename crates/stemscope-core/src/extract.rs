//! Container extraction collaborator
//!
//! Turns an input path into a decodable audio payload plus optional
//! instrument metadata. Protected song containers (archive parsing, payload
//! decryption) are the host's business: implement `PayloadExtractor` and
//! hand the engine the decoded-but-still-compressed bytes. The default
//! extractor handles plain `.ogg` / `.wav` files and reads instrument
//! channel counts from an optional sidecar song description.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{ContainerKind, InstrumentChannelCounts};

/// Extracted audio payload, ready for the decode collaborator
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// Decoded-but-still-compressed audio bytes (OGG Vorbis or WAV)
    pub bytes: Vec<u8>,
    /// Container family, for canonical channel arrangement
    pub container: ContainerKind,
    /// Declared instrument channel counts, absent for plain audio
    pub song: Option<InstrumentChannelCounts>,
    /// Display name of the input (file name without directories)
    pub file_name: String,
}

/// Extraction failures, carrying a multi-line diagnostic log
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Not a recognized input file type
    #[error("'{}' is not a valid input file", path.display())]
    UnsupportedInput { path: PathBuf, log: Vec<String> },

    /// The input could not be read
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// The input path this error refers to
    pub fn path(&self) -> &Path {
        match self {
            ExtractError::UnsupportedInput { path, .. } => path,
            ExtractError::Io { path, .. } => path,
        }
    }

    /// The diagnostic log lines to show the user
    pub fn diagnostic_log(&self) -> Vec<String> {
        match self {
            ExtractError::UnsupportedInput { log, .. } => log.clone(),
            ExtractError::Io { source, .. } => vec![source.to_string()],
        }
    }
}

/// Container extraction collaborator
pub trait PayloadExtractor: Send + Sync {
    /// Extract the audio payload (and any song metadata) from an input file
    fn extract(&self, path: &Path) -> Result<AudioPayload, ExtractError>;
}

/// Default extractor for plain `.ogg` / `.wav` inputs.
///
/// Instrument channel counts are read from a sidecar song description named
/// `<input stem>.song.yaml` next to the input, when present. A sidecar that
/// fails to parse is logged and ignored rather than failing the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl FileExtractor {
    fn read_sidecar_song(path: &Path) -> Option<InstrumentChannelCounts> {
        let sidecar = path.with_extension("song.yaml");
        if !sidecar.exists() {
            return None;
        }
        match std::fs::read_to_string(&sidecar) {
            Ok(contents) => match serde_yaml::from_str::<InstrumentChannelCounts>(&contents) {
                Ok(counts) => {
                    log::info!(
                        "loaded song description {:?}: {} declared channels",
                        sidecar,
                        counts.total()
                    );
                    Some(counts)
                }
                Err(e) => {
                    log::warn!("ignoring unparsable song description {:?}: {}", sidecar, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("ignoring unreadable song description {:?}: {}", sidecar, e);
                None
            }
        }
    }
}

impl PayloadExtractor for FileExtractor {
    fn extract(&self, path: &Path) -> Result<AudioPayload, ExtractError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let container = match extension.as_str() {
            "wav" => ContainerKind::PlainAudio,
            "ogg" => ContainerKind::SongArchive,
            other => {
                return Err(ExtractError::UnsupportedInput {
                    path: path.to_path_buf(),
                    log: vec![
                        format!("unrecognized extension '{}'", other),
                        "expected a .ogg or .wav input".to_string(),
                    ],
                });
            }
        };

        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(AudioPayload {
            bytes,
            container,
            song: Self::read_sidecar_song(path),
            file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension() {
        let err = FileExtractor.extract(Path::new("song.mp4")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedInput { .. }));
        assert!(!err.diagnostic_log().is_empty());
        assert_eq!(err.path(), Path::new("song.mp4"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FileExtractor
            .extract(Path::new("/nonexistent/take5.ogg"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
        assert_eq!(err.diagnostic_log().len(), 1);
    }

    #[test]
    fn test_extension_maps_to_container_kind() {
        let dir = std::env::temp_dir().join("stemscope-extract-test");
        std::fs::create_dir_all(&dir).unwrap();

        let wav = dir.join("plain.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        let payload = FileExtractor.extract(&wav).unwrap();
        assert_eq!(payload.container, ContainerKind::PlainAudio);
        assert_eq!(payload.file_name, "plain.wav");
        assert!(payload.song.is_none());

        let ogg = dir.join("song.ogg");
        std::fs::write(&ogg, b"OggS").unwrap();
        let payload = FileExtractor.extract(&ogg).unwrap();
        assert_eq!(payload.container, ContainerKind::SongArchive);
    }

    #[test]
    fn test_sidecar_song_description() {
        let dir = std::env::temp_dir().join("stemscope-sidecar-test");
        std::fs::create_dir_all(&dir).unwrap();

        let ogg = dir.join("multitrack.ogg");
        std::fs::write(&ogg, b"OggS").unwrap();
        std::fs::write(
            dir.join("multitrack.song.yaml"),
            "drums: 4\nbass: 2\nvocals: 1\nbacking: 2\n",
        )
        .unwrap();

        let payload = FileExtractor.extract(&ogg).unwrap();
        let song = payload.song.expect("sidecar should be picked up");
        assert_eq!(song.drums, 4);
        assert_eq!(song.total(), 9);
    }

    #[test]
    fn test_bad_sidecar_is_ignored() {
        let dir = std::env::temp_dir().join("stemscope-badsidecar-test");
        std::fs::create_dir_all(&dir).unwrap();

        let ogg = dir.join("broken.ogg");
        std::fs::write(&ogg, b"OggS").unwrap();
        std::fs::write(dir.join("broken.song.yaml"), "drums: [not a count]").unwrap();

        let payload = FileExtractor.extract(&ogg).unwrap();
        assert!(payload.song.is_none());
    }
}
