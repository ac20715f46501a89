//! Analysis settings and the per-file pipeline configuration derived from
//! them.

use crate::dsp::window::WindowKind;
use crate::source::PcmSpec;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

fn config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spectrostream")
}

/// User-tunable analysis parameters, persisted as JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Transform window length in samples; must be a power of two.
    pub chunk_size: usize,
    /// Ring-buffer depth in chunk units; one publication covers this many
    /// chunks of freshly decoded samples.
    pub lookahead_chunks: usize,
    pub window: WindowKind,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            lookahead_chunks: 32,
            window: WindowKind::default(),
        }
    }
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

impl AnalysisSettings {
    pub fn load_or_default() -> Self {
        Self::load_from(&settings_path())
    }

    fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| {
                serde_json::from_str(&s)
                    .map_err(|e| warn!("[settings] parse error {path:?}: {e}"))
                    .ok()
            })
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&settings_path())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &json)
            .and_then(|()| fs::rename(&temp_path, path))
            .with_context(|| format!("failed to persist settings to {}", path.display()))
    }
}

/// Byte layout of one interleaved PCM frame.
#[derive(Debug, Clone, Copy)]
pub struct SampleLayout {
    pub bytes_per_frame: usize,
    pub bytes_per_sample: usize,
    pub big_endian: bool,
    /// Channel extracted for analysis.
    pub channel: usize,
}

/// Everything one pipeline run needs, derived once per loaded file.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub lookahead_chunks: usize,
    pub window: WindowKind,
    pub pixel_columns: usize,
    pub total_frames: u64,
    pub frame_rate: f64,
    pub layout: SampleLayout,
}

impl PipelineConfig {
    pub fn derive(
        settings: &AnalysisSettings,
        spec: &PcmSpec,
        pixel_columns: usize,
    ) -> Result<Self> {
        if !settings.chunk_size.is_power_of_two() || settings.chunk_size < 2 {
            bail!("chunk size {} is not a power of two", settings.chunk_size);
        }
        if settings.lookahead_chunks == 0 {
            bail!("lookahead must cover at least one chunk");
        }
        if pixel_columns == 0 {
            bail!("target column count must be positive");
        }
        if spec.channels == 0 {
            bail!("stream reports zero channels");
        }
        if !matches!(spec.bits_per_sample, 8 | 16 | 24 | 32) {
            bail!("unsupported sample width: {} bits", spec.bits_per_sample);
        }
        if spec.total_frames == 0 {
            bail!("stream reports zero frames");
        }
        if spec.sample_rate == 0 {
            bail!("stream reports zero sample rate");
        }

        let bytes_per_sample = spec.bits_per_sample as usize / 8;
        let channels = spec.channels as usize;
        let bytes_per_frame = spec.bytes_per_frame.max(bytes_per_sample * channels);

        Ok(Self {
            chunk_size: settings.chunk_size,
            lookahead_chunks: settings.lookahead_chunks,
            window: settings.window,
            pixel_columns,
            total_frames: spec.total_frames,
            frame_rate: spec.sample_rate as f64,
            layout: SampleLayout {
                bytes_per_frame,
                bytes_per_sample,
                big_endian: spec.big_endian,
                channel: 0,
            },
        })
    }

    /// Ring capacity: one chunk beyond two publication windows, so the
    /// producer can run a full window ahead of the consumer.
    pub fn ring_len(&self) -> usize {
        self.chunk_size * (2 * self.lookahead_chunks + 1)
    }

    /// Samples written between watermark publications.
    pub fn read_size(&self) -> usize {
        self.chunk_size * self.lookahead_chunks
    }

    pub fn samples_per_column(&self) -> usize {
        self.total_frames.div_ceil(self.pixel_columns as u64) as usize
    }
}
