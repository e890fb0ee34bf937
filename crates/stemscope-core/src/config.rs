//! View configuration
//!
//! Configuration is stored as YAML. Missing or invalid files fall back to
//! defaults with a logged warning; saving creates parent directories.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::export::UploadConfig;

/// Horizontal inset around the wave area when the legend is shown
pub const LEGEND_HORIZONTAL_INSET: u32 = 14;
/// Vertical inset around the wave area when the legend is shown
pub const LEGEND_VERTICAL_INSET: u32 = 42;

/// View options driving a render
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Show the legend strip (file info, time ruler) around the wave area
    pub show_legend: bool,
    /// Track label overlays visible
    pub track_labels: bool,
    /// 1-px outline between bands
    pub outline: bool,
    /// Scan every sample when computing peaks
    pub high_quality: bool,
    /// Canvas width in pixels
    pub canvas_width: u32,
    /// Canvas height in pixels
    pub canvas_height: u32,
    /// Upload service settings
    pub upload: UploadConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            track_labels: true,
            outline: true,
            high_quality: false,
            canvas_width: 1280,
            canvas_height: 720,
            upload: UploadConfig::default(),
        }
    }
}

impl ViewConfig {
    /// The wave area inside the canvas, after legend insets
    pub fn wave_area(&self) -> (u32, u32) {
        if self.show_legend {
            (
                self.canvas_width
                    .saturating_sub(LEGEND_HORIZONTAL_INSET * 2)
                    .max(1),
                self.canvas_height
                    .saturating_sub(LEGEND_VERTICAL_INSET * 2)
                    .max(1),
            )
        } else {
            (self.canvas_width.max(1), self.canvas_height.max(1))
        }
    }
}

/// Get the default config file path
///
/// Returns: `<config dir>/stemscope/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemscope")
        .join("config.yaml")
}

/// Load configuration from a YAML file.
///
/// If the file doesn't exist, returns the default config. If the file exists
/// but is invalid, logs a warning and returns the default config.
pub fn load_config(path: &Path) -> ViewConfig {
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return ViewConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<ViewConfig>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("load_config: failed to parse config: {}, using defaults", e);
                ViewConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read config file: {}, using defaults", e);
            ViewConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config(config: &ViewConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}
